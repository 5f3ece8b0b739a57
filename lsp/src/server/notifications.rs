//! `vcasttesteditor/*` notifications the editor extension pushes at the server.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use tower_lsp::lsp_types::MessageType;
use tracing::info;

use super::config::OracleMode;
use super::state::{CodedTestFile, TstLanguageServer};

pub(crate) const LOAD_TESTFILE: &str = "vcasttesteditor/loadTestfile";
pub(crate) const VMOCK_STATUS: &str = "vcasttesteditor/vmockstatus";
pub(crate) const UPDATE_VPYTHON_COMMAND: &str = "vcasttesteditor/updateVPythonCommand";
pub(crate) const UPDATE_SERVER_PORT: &str = "vcasttesteditor/updateServerPort";
pub(crate) const UPDATE_SERVER_STATE: &str = "vcasttesteditor/updateServerState";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoadTestfileParams {
    pub(crate) test_file_path: PathBuf,
    pub(crate) enviro_path: String,
    #[serde(default)]
    pub(crate) enviro_has_mock_support: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VmockStatusParams {
    pub(crate) vmock_available: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct VPythonCommandParams {
    #[serde(rename = "vPythonCommand")]
    pub(crate) vpython_command: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerPortParams {
    pub(crate) port_number: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerStateParams {
    pub(crate) use_server: bool,
}

impl TstLanguageServer {
    pub(crate) async fn load_testfile(&self, params: LoadTestfileParams) {
        let message = format!(
            "Notification received: test file: {} environment: {} supports mocks: {}",
            params.test_file_path.display(),
            params.enviro_path,
            params.enviro_has_mock_support
        );
        self.coded_tests.insert(
            params.test_file_path,
            CodedTestFile {
                enviro_path: params.enviro_path,
                has_mock_support: params.enviro_has_mock_support,
            },
        );
        self.notice(message).await;
    }

    pub(crate) async fn vmock_status(&self, params: VmockStatusParams) {
        self.vmock_available.store(params.vmock_available, Ordering::Relaxed);
        self.notice(format!("Notification received: vMock Available: {}", params.vmock_available))
            .await;
    }

    pub(crate) async fn update_vpython_command(&self, params: VPythonCommandParams) {
        let message = format!("Notification received: vPython Path: {}", params.vpython_command);
        if let Ok(mut guard) = self.config.lock() {
            guard.vpython_command = Some(params.vpython_command);
        }
        self.apply_config().await;
        self.notice(message).await;
    }

    pub(crate) async fn update_server_port(&self, params: ServerPortParams) {
        if let Ok(mut guard) = self.config.lock() {
            guard.oracle_port = params.port_number;
        }
        self.apply_config().await;
        self.notice(format!(
            "Notification received: vectorcast data server port: {}",
            params.port_number
        ))
        .await;
    }

    pub(crate) async fn update_server_state(&self, params: ServerStateParams) {
        if let Ok(mut guard) = self.config.lock() {
            guard.oracle_mode = if params.use_server {
                OracleMode::Server
            } else {
                OracleMode::Python
            };
        }
        self.apply_config().await;
        self.notice(format!(
            "Notification received: use vectorcast data server: {}",
            params.use_server
        ))
        .await;
    }

    async fn notice(&self, message: String) {
        info!("{message}");
        self.client.log_message(MessageType::INFO, message).await;
    }
}
