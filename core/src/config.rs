use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::rules::ValidityMatrix;

// Soft limits keeping whole-document rescans cheap on huge or broken scripts
pub const DEFAULT_MAX_LINES: usize = 20_000;
pub const DEFAULT_MAX_DIAGNOSTICS: usize = 500;
pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_millis(2_000);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid rules table: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Lines beyond this are not analyzed.
    pub max_lines: usize,
    pub max_diagnostics: usize,
    pub oracle_timeout: Duration,
    /// Script-structure lint (unknown commands, missing UNIT / SUBPROGRAM, scope).
    /// Off by default: only block findings and validity rules are reported.
    pub structural_checks: bool,
    pub rules: ValidityMatrix,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
            max_diagnostics: DEFAULT_MAX_DIAGNOSTICS,
            oracle_timeout: DEFAULT_ORACLE_TIMEOUT,
            structural_checks: false,
            rules: ValidityMatrix::builtin(),
        }
    }
}

impl EngineConfig {
    pub fn with_rules(mut self, rules: ValidityMatrix) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_structural_checks(mut self, enabled: bool) -> Self {
        self.structural_checks = enabled;
        self
    }

    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }
}
