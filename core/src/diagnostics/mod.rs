//! Whole-document findings. Recomputed from scratch on every rescan.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blocks::{BlockMap, BlockTracker, LineState};
use crate::command::{Keyword, SCRIPT_FEATURES, SPECIAL_SUBPROGRAMS};
use crate::config::EngineConfig;
use crate::document::Document;
use crate::rules::ValidityMatrix;
use crate::text::{Range, utf16_len};

#[cfg(test)]
mod diagnostics_test;

pub const SOURCE: &str = "TST Editor";

pub const INVALID_COMMAND: &str = "Invalid command, type TEST. to see all command values";
pub const MISSING_UNIT: &str = "TEST.UNIT is required but missing";
pub const MISSING_SUBPROGRAM: &str = "TEST.SUBPROGRAM is required but missing";
pub const MISSING_TEST_START: &str = "TEST.NEW | TEST.REPLACE | TEST.ADD is required but missing";
pub const INVALID_FEATURE: &str = "Invalid feature flag, type TEST.SCRIPT_FEATURE: to see all flags";
pub const TEST_SCOPE_ONLY: &str = "Command is only valid within a TEST.NEW | REPLACE -> TEST.END block";
pub const NO_REQUIREMENTS_GATEWAY: &str =
    "TEST.REQUIREMENT_KEY is not valid when the requirements gateway is not present in the environment";

/// What the host knows about the script's environment on disk. `None` means
/// unknown, and the rules that depend on it stay quiet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvironmentFacts {
    pub requirements_gateway: Option<bool>,
}

impl EnvironmentFacts {
    pub fn with_requirements_gateway(mut self, present: bool) -> Self {
        self.requirements_gateway = Some(present);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub range: Range,
    pub severity: Severity,
    pub message: String,
    pub code: &'static str,
    pub source: &'static str,
}

impl Diagnostic {
    /// A finding covering the whole of `line`.
    pub fn on_line(document: &Document, line: usize, severity: Severity, code: &'static str, message: impl Into<String>) -> Self {
        let width = document.line(line).map_or(0, |l| utf16_len(&l.text));
        Self {
            range: Range::on_line(line as u32, 0, width),
            severity,
            message: message.into(),
            code,
            source: SOURCE,
        }
    }

    pub fn line(&self) -> usize {
        self.range.start.line as usize
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}] {}", self.range.start.line + 1, self.severity, self.code, self.message)
    }
}

#[derive(Debug, Clone)]
pub struct DiagnosticsScanner {
    max_lines: usize,
    max_diagnostics: usize,
    structural: bool,
    rules: ValidityMatrix,
}

impl Default for DiagnosticsScanner {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl DiagnosticsScanner {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_lines: config.max_lines,
            max_diagnostics: config.max_diagnostics,
            structural: config.structural_checks,
            rules: config.rules.clone(),
        }
    }

    pub fn scan(&self, document: &Document) -> Vec<Diagnostic> {
        self.scan_in(document, EnvironmentFacts::default())
    }

    /// [`scan`](Self::scan) plus the rules that need to know about the environment.
    pub fn scan_in(&self, document: &Document, facts: EnvironmentFacts) -> Vec<Diagnostic> {
        let blocks = BlockTracker::new(self.max_lines).scan(document);
        self.scan_with(document, &blocks, facts)
    }

    /// Same as [`scan_in`](Self::scan_in) against a block snapshot computed elsewhere.
    pub fn scan_with(&self, document: &Document, blocks: &BlockMap, facts: EnvironmentFacts) -> Vec<Diagnostic> {
        let mut out: Vec<Diagnostic> = blocks
            .findings()
            .iter()
            .map(|f| Diagnostic::on_line(document, f.line, Severity::Warning, f.code(), f.message()))
            .collect();

        for index in 0..blocks.scanned_lines() {
            if let Some(state) = blocks.line(index) {
                self.check_line(document, index, state, facts, &mut out);
            }
        }

        // unterminated-block findings are only known at the end of the pass
        out.sort_by_key(Diagnostic::line);
        if out.len() > self.max_diagnostics {
            debug!(found = out.len(), cap = self.max_diagnostics, "diagnostics truncated");
            out.truncate(self.max_diagnostics);
        }
        out
    }

    fn check_line(
        &self,
        document: &Document,
        index: usize,
        state: &LineState,
        facts: EnvironmentFacts,
        out: &mut Vec<Diagnostic>,
    ) {
        // block bodies are free text; nested commands were already reported
        if state.block.is_some() {
            return;
        }
        let Some(command) = state.command.as_ref() else {
            return;
        };
        // a bare `TEST.` is still being typed
        if command.name.is_empty() {
            return;
        }
        let mut push = |severity, code, message: &str| {
            out.push(Diagnostic::on_line(document, index, severity, code, message));
        };

        let Some(keyword) = command.keyword else {
            if self.structural {
                push(Severity::Warning, "invalid-command", INVALID_COMMAND);
            }
            return;
        };

        if let Some(rule) = self.rules.violation(keyword.as_str(), state.subprogram.as_deref()) {
            push(rule.severity, "invalid-field", rule.message.as_str());
        }
        if keyword == Keyword::RequirementKey && facts.requirements_gateway == Some(false) {
            push(Severity::Warning, "requirements-gateway", NO_REQUIREMENTS_GATEWAY);
        }
        if !self.structural {
            return;
        }

        match keyword {
            Keyword::Subprogram => {
                let special = command
                    .trimmed_value()
                    .is_some_and(|v| SPECIAL_SUBPROGRAMS.contains(&v));
                if state.unit.is_none() && !special {
                    push(Severity::Warning, "missing-unit", MISSING_UNIT);
                }
            }
            Keyword::New | Keyword::Replace | Keyword::Add if state.subprogram.is_none() => {
                push(Severity::Warning, "missing-subprogram", MISSING_SUBPROGRAM);
            }
            Keyword::End if !state.in_test => {
                push(Severity::Warning, "missing-test-start", MISSING_TEST_START);
            }
            Keyword::ScriptFeature => {
                if let Some(feature) = command.trimmed_value() {
                    if !SCRIPT_FEATURES.contains(&feature) {
                        push(Severity::Warning, "invalid-feature", INVALID_FEATURE);
                    }
                }
            }
            kw if !kw.is_file_scope() && !state.in_test => {
                push(Severity::Warning, "test-scope-only", TEST_SCOPE_ONLY);
            }
            _ => {}
        }
    }
}
