//! Choice-data transports: the environment data server over HTTP, or one
//! interface-script process per query.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use tst_core::{ChoiceOracle, ChoiceQuery, ChoiceResponse, OracleError, UnavailableOracle};

use super::config::{OracleMode, ServerConfig};

/// Everything the interface script prints before this marker is noise from the
/// tool's own startup.
const OUTPUT_MARKER: &str = "ACTUAL-DATA";
const SERVER_ERROR: &str = "server-error";

pub(crate) fn build_backend(config: &ServerConfig) -> Arc<dyn ChoiceOracle> {
    match config.oracle_mode {
        OracleMode::Server => match HttpOracle::new(&config.oracle_host, config.oracle_port) {
            Ok(oracle) => Arc::new(oracle),
            Err(e) => Arc::new(UnavailableOracle::new(e.to_string())),
        },
        OracleMode::Python => match (&config.vpython_command, &config.interface_script) {
            (Some(vpython), Some(script)) => Arc::new(ProcessOracle::new(vpython.clone(), script.clone())),
            _ => Arc::new(UnavailableOracle::new("vpython command or interface script not configured")),
        },
        OracleMode::Off => Arc::new(UnavailableOracle::new("choice data disabled")),
    }
}

#[derive(Debug, Serialize)]
struct ServerRequest<'a> {
    command: &'static str,
    path: &'a str,
    /// The data server reuses `options` for the line fragment.
    options: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ServerReply {
    data: ChoiceResponse,
}

/// `GET /vassistant?request=<json>` against the environment data server.
#[derive(Debug)]
pub(crate) struct HttpOracle {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpOracle {
    pub(crate) fn new(host: &str, port: u16) -> Result<Self, OracleError> {
        let endpoint = Url::parse(&format!("http://{host}:{port}/vassistant"))
            .map_err(|e| OracleError::Unavailable(format!("bad data server address {host}:{port}: {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
        })
    }
}

#[async_trait]
impl ChoiceOracle for HttpOracle {
    async fn fetch(&self, query: &ChoiceQuery) -> Result<ChoiceResponse, OracleError> {
        let request = serde_json::to_string(&ServerRequest {
            command: query.choice_kind.mode(),
            path: &query.environment,
            options: &query.line_so_far,
            unit: query.unit.as_deref(),
        })
        .map_err(|e| OracleError::Malformed(e.to_string()))?;

        let response = self
            .http
            .get(self.endpoint.clone())
            .query(&[("request", request)])
            .send()
            .await
            .map_err(|e| OracleError::Unavailable(format!("enviro server error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            // reachable but unhappy: surfaced to the user like a backend failure
            return Ok(ChoiceResponse {
                extra_text: Some(SERVER_ERROR.to_string()),
                messages: vec![format!("Enviro server response status: {status}")],
                ..ChoiceResponse::default()
            });
        }

        let reply: ServerReply = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(format!("enviro server reply: {e}")))?;
        Ok(reply.data)
    }

    fn name(&self) -> &'static str {
        "server"
    }
}

/// Runs `<vpython> <script> --mode .. --enviroName .. --inputLine .. [--unit ..]`
/// and parses the JSON it prints.
#[derive(Debug, Clone)]
pub(crate) struct ProcessOracle {
    vpython: String,
    script: PathBuf,
}

impl ProcessOracle {
    pub(crate) fn new(vpython: String, script: PathBuf) -> Self {
        Self { vpython, script }
    }
}

#[async_trait]
impl ChoiceOracle for ProcessOracle {
    async fn fetch(&self, query: &ChoiceQuery) -> Result<ChoiceResponse, OracleError> {
        let mut cmd = tokio::process::Command::new(&self.vpython);
        cmd.arg(&self.script)
            .args(["--mode", query.choice_kind.mode()])
            .args(["--enviroName", query.environment.as_str()])
            .args(["--inputLine", query.line_so_far.as_str()]);
        if let Some(unit) = &query.unit {
            cmd.args(["--unit", unit.as_str()]);
        }
        // a timed-out query drops this future; take the child down with it
        cmd.kill_on_drop(true);

        let output = cmd
            .output()
            .await
            .map_err(|e| OracleError::Unavailable(format!("{}: {e}", self.vpython)))?;
        if !output.status.success() {
            return Err(OracleError::Unavailable(format!(
                "interface script exited with {}",
                output.status
            )));
        }
        parse_script_output(&String::from_utf8_lossy(&output.stdout))
    }

    fn name(&self) -> &'static str {
        "python"
    }
}

pub(crate) fn parse_script_output(stdout: &str) -> Result<ChoiceResponse, OracleError> {
    let payload = match stdout.split_once(OUTPUT_MARKER) {
        Some((noise, data)) => {
            if !noise.trim().is_empty() {
                debug!("discarding interface script preamble: {}", noise.trim());
            }
            data.trim()
        }
        None => stdout.trim(),
    };
    serde_json::from_str(payload).map_err(|e| OracleError::Malformed(format!("interface script output: {e}")))
}
