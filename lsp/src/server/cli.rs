use anyhow::Context;
use std::path::{Component, Path, PathBuf};

use tst_core::{Engine, EngineConfig, OracleClient, Severity};

use super::gateway::script_facts;

/// Startup flags the editor extension passes when it spawns the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub vpython: Option<String>,
    pub interface_script: Option<PathBuf>,
    pub use_server: Option<bool>,
}

impl LaunchOptions {
    /// Reads `--vpython <cmd>`, `--interface-script <path>` and `--use-server <bool>`.
    /// Anything else (including `--stdio`) is ignored.
    pub fn from_args(args: &[String]) -> Self {
        let mut options = Self::default();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--vpython" => options.vpython = iter.next().cloned(),
                "--interface-script" => options.interface_script = iter.next().map(PathBuf::from),
                "--use-server" => options.use_server = iter.next().map(|v| v.eq_ignore_ascii_case("true")),
                _ => {}
            }
        }
        options
    }
}

const USAGE: &str = "Usage: tst-lsp --analyze [--errors-only] [--strict] <relative-file-path>\n  --analyze <file>     : Full analysis with JSON output\n  --errors-only        : Show only errors in simple format\n  --strict             : Include script-structure warnings";

/// `--analyze` runs one diagnostics pass over a file and exits instead of serving.
pub(crate) fn try_cli_analyze(args: &[String]) -> anyhow::Result<Option<String>> {
    let Some(i) = args.iter().position(|a| a == "--analyze") else {
        return Ok(None);
    };

    let path = args[i + 1..]
        .iter()
        .find(|a| !a.starts_with("--"))
        .ok_or_else(|| anyhow::anyhow!(USAGE))?;
    let errors_only = args.iter().any(|a| a == "--errors-only");
    let strict = args.iter().any(|a| a == "--strict");

    let content = read_file_content(path)?;
    let document = tst_core::Document::from_text(&content);
    let engine = Engine::new(
        EngineConfig::default().with_structural_checks(strict),
        std::sync::Arc::new(OracleClient::default()),
    );
    let facts = script_facts(Some(Path::new(path)), &document);
    let diagnostics = engine.diagnostics_in(&document, facts);

    if errors_only {
        let errors: Vec<String> = diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| {
                format!(
                    "Line {}:{}: {}",
                    d.range.start.line + 1,
                    d.range.start.character + 1,
                    d.message
                )
            })
            .collect();
        if errors.is_empty() {
            return Ok(Some("No errors found".to_string()));
        }
        return Ok(Some(errors.join("\n")));
    }

    let output = serde_json::json!({
        "environment": document.environment_name(),
        "lines": document.len(),
        "diagnostics": diagnostics,
    });
    Ok(Some(serde_json::to_string_pretty(&output)?))
}

pub(crate) fn is_safe_path(path: &str) -> bool {
    let p = Path::new(path);
    if p.as_os_str().is_empty() || p.is_absolute() {
        return false;
    }
    if p.components().any(|c| c == Component::ParentDir) {
        return false;
    }
    if path.chars().any(|c| matches!(c, '\0' | '\n' | '\r' | '\t')) {
        return false;
    }
    // drive-letter paths such as `C:foo`
    !matches!(path.as_bytes(), [_, b':', ..])
}

pub(crate) fn read_file_content(path: &str) -> anyhow::Result<String> {
    if !is_safe_path(path) {
        return Err(anyhow::anyhow!("Unsafe file path: {}", path));
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read file '{}'", path))
}
