use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Semaphore;
use tower_lsp::lsp_types::{ConfigurationItem, MessageType};
use tracing::{info, warn};

use tst_core::config::{DEFAULT_MAX_DIAGNOSTICS, DEFAULT_MAX_LINES, DEFAULT_ORACLE_TIMEOUT};
use tst_core::{Engine, EngineConfig, ValidityMatrix};

use super::cli::LaunchOptions;
use super::oracle::build_backend;
use super::state::TstLanguageServer;

pub(crate) const CONFIG_SECTION: &str = "tstLanguageServer";
pub(crate) const DEFAULT_SERVER_PORT: u16 = 60461;

/// Where choice data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum OracleMode {
    /// The environment data server, over HTTP.
    Server,
    /// One interface-script process per query.
    Python,
    Off,
}

#[derive(Debug, Clone)]
pub(crate) struct ServerConfig {
    pub(crate) oracle_mode: OracleMode,
    pub(crate) oracle_host: String,
    pub(crate) oracle_port: u16,
    pub(crate) oracle_timeout: Duration,
    pub(crate) vpython_command: Option<String>,
    pub(crate) interface_script: Option<PathBuf>,
    pub(crate) max_lines: usize,
    pub(crate) max_diagnostics: usize,
    pub(crate) structural_checks: bool,
    pub(crate) max_concurrent: usize,
    pub(crate) rules_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            oracle_mode: OracleMode::Server,
            oracle_host: "localhost".to_string(),
            oracle_port: DEFAULT_SERVER_PORT,
            oracle_timeout: DEFAULT_ORACLE_TIMEOUT,
            vpython_command: None,
            interface_script: None,
            max_lines: DEFAULT_MAX_LINES,
            max_diagnostics: DEFAULT_MAX_DIAGNOSTICS,
            structural_checks: true,
            max_concurrent: 2,
            rules_file: None,
        }
    }
}

impl ServerConfig {
    pub(crate) fn from_launch(launch: &LaunchOptions) -> Self {
        let mut config = Self::default();
        if let Some(use_server) = launch.use_server {
            config.oracle_mode = if use_server { OracleMode::Server } else { OracleMode::Python };
        }
        config.vpython_command = launch.vpython.clone();
        config.interface_script = launch.interface_script.clone();
        config
    }

    pub(crate) fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_lines: self.max_lines,
            max_diagnostics: self.max_diagnostics,
            oracle_timeout: self.oracle_timeout,
            structural_checks: self.structural_checks,
            rules: ValidityMatrix::builtin(),
        }
    }

    /// Folds one `tstLanguageServer` section into this config. Missing or zero
    /// values keep their current setting.
    fn merge(&mut self, section: TstConfigSection) {
        let oracle = section.oracle;
        if let Some(mode) = oracle.mode {
            self.oracle_mode = mode;
        }
        if let Some(host) = oracle.host.filter(|h| !h.is_empty()) {
            self.oracle_host = host;
        }
        if let Some(port) = oracle.port.filter(|p| *p > 0) {
            self.oracle_port = port;
        }
        if let Some(ms) = oracle.timeout_ms.filter(|v| *v > 0) {
            self.oracle_timeout = Duration::from_millis(ms);
        }
        if let Some(cmd) = oracle.vpython_command.filter(|c| !c.is_empty()) {
            self.vpython_command = Some(cmd);
        }
        if let Some(script) = oracle.interface_script {
            self.interface_script = Some(script);
        }

        if let Some(v) = section.diagnostics.max_lines.filter(|v| *v > 0) {
            self.max_lines = v;
        }
        if let Some(v) = section.diagnostics.max_diagnostics.filter(|v| *v > 0) {
            self.max_diagnostics = v;
        }
        if let Some(v) = section.diagnostics.structural_checks {
            self.structural_checks = v;
        }
        if let Some(v) = section.performance.max_concurrent.filter(|v| *v > 0) {
            self.max_concurrent = v;
        }
        if section.rules_file.is_some() {
            self.rules_file = section.rules_file;
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct TstConfigSection {
    #[serde(default)]
    oracle: OracleSection,
    #[serde(default)]
    diagnostics: DiagnosticsSection,
    #[serde(default)]
    performance: PerformanceSection,
    #[serde(default)]
    rules_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct OracleSection {
    mode: Option<OracleMode>,
    host: Option<String>,
    port: Option<u16>,
    timeout_ms: Option<u64>,
    vpython_command: Option<String>,
    interface_script: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DiagnosticsSection {
    max_lines: Option<usize>,
    max_diagnostics: Option<usize>,
    structural_checks: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PerformanceSection {
    max_concurrent: Option<usize>,
}

impl TstLanguageServer {
    pub(crate) async fn load_config(&self) {
        let items = vec![ConfigurationItem {
            scope_uri: None,
            section: Some(CONFIG_SECTION.to_string()),
        }];

        let Ok(values) = self.client.configuration(items).await else {
            return;
        };
        let Some(value) = values.into_iter().next().filter(|v| !v.is_null()) else {
            return;
        };
        match serde_json::from_value::<TstConfigSection>(value) {
            Ok(section) => {
                if let Ok(mut guard) = self.config.lock() {
                    guard.merge(section);
                }
                self.apply_config().await;
            }
            Err(e) => warn!("ignoring malformed {CONFIG_SECTION} settings: {e}"),
        }
    }

    /// Rebuilds everything derived from the config: the engine (caps and rules),
    /// the oracle transport and the rescan limiter.
    pub(crate) async fn apply_config(&self) {
        let Some(config) = self.config.lock().ok().map(|g| g.clone()) else {
            return;
        };

        let mut engine_config = config.engine_config();
        if let Some(path) = &config.rules_file {
            match ValidityMatrix::load(path) {
                Ok(rules) => engine_config.rules = rules,
                Err(e) => {
                    warn!("keeping built-in validity rules: {e}");
                    self.client
                        .log_message(MessageType::WARNING, format!("TST rules file not loaded: {e}"))
                        .await;
                }
            }
        }

        self.oracle.set_backend(build_backend(&config));
        let engine = Arc::new(Engine::new(engine_config, self.oracle.clone()));
        if let Ok(mut guard) = self.engine.lock() {
            *guard = engine;
        }
        if let Ok(mut sem) = self.compute_limiter.lock() {
            *sem = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        }
        info!(
            backend = self.oracle.backend_name(),
            structural = config.structural_checks,
            "configuration applied"
        );
    }
}
