use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use ropey::Rope;
use tokio::sync::Semaphore;
use tower_lsp::lsp_types::Url;
use tower_lsp::Client;

use tst_core::{Engine, LexicalMode, OracleClient};

use super::cli::LaunchOptions;
use super::config::ServerConfig;
use super::oracle::build_backend;
use super::text::snapshot;
use super::utils::{environment_path, file_path, is_test_script};

/// An open buffer. `debounce_seq` bumps on every edit so a pending scan can tell
/// it has been overtaken.
#[derive(Debug, Default)]
pub(crate) struct Document {
    pub(crate) content: Rope,
    pub(crate) version: i32,
    pub(crate) debounce_seq: u64,
    pub(crate) content_hash: u64,
}

/// Association pushed by the client for a coded-test source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CodedTestFile {
    pub(crate) enviro_path: String,
    pub(crate) has_mock_support: bool,
}

/// What the server does for a given document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    /// A `.tst` script; `environment` is empty when the script names none or
    /// the named environment directory does not exist.
    Script { environment: String },
    CodedTest(CodedTestFile),
}

impl Target {
    pub(crate) fn mode(&self) -> LexicalMode {
        match self {
            Target::Script { .. } => LexicalMode::Script,
            Target::CodedTest(_) => LexicalMode::EmbeddedComment,
        }
    }
}

pub struct TstLanguageServer {
    pub(crate) client: Client,
    pub(crate) documents: Arc<DashMap<Url, Document>>,
    pub(crate) coded_tests: DashMap<PathBuf, CodedTestFile>,
    pub(crate) vmock_available: AtomicBool,
    pub(crate) config: Mutex<ServerConfig>,
    pub(crate) oracle: Arc<OracleClient>,
    pub(crate) engine: Mutex<Arc<Engine>>,
    pub(crate) compute_limiter: Mutex<Arc<Semaphore>>,
}

impl TstLanguageServer {
    pub fn new(client: Client) -> Self {
        Self::with_launch(client, LaunchOptions::default())
    }

    pub fn with_launch(client: Client, launch: LaunchOptions) -> Self {
        let config = ServerConfig::from_launch(&launch);
        let oracle = Arc::new(OracleClient::new(build_backend(&config)));
        let engine = Arc::new(Engine::new(config.engine_config(), oracle.clone()));
        Self {
            client,
            documents: Arc::new(DashMap::new()),
            coded_tests: DashMap::new(),
            vmock_available: AtomicBool::new(false),
            compute_limiter: Mutex::new(Arc::new(Semaphore::new(config.max_concurrent.max(1)))),
            config: Mutex::new(config),
            oracle,
            engine: Mutex::new(engine),
        }
    }

    pub(crate) fn engine(&self) -> Option<Arc<Engine>> {
        self.engine.lock().ok().map(|g| g.clone())
    }

    pub(crate) fn vmock_available(&self) -> bool {
        self.vmock_available.load(Ordering::Relaxed)
    }

    /// Engine snapshot plus the version it was taken at.
    pub(crate) fn snapshot(&self, uri: &Url) -> Option<(tst_core::Document, i32)> {
        let doc = self.documents.get(uri)?;
        Some((snapshot(&doc.content), doc.version))
    }

    /// `None` for files the server has nothing to say about.
    pub(crate) fn target(&self, uri: &Url, document: &tst_core::Document) -> Option<Target> {
        if is_test_script(uri) {
            // choice data needs a built environment on disk
            let environment = document
                .environment_name()
                .map(|name| environment_path(uri, &name))
                .filter(|path| Path::new(path).is_dir())
                .unwrap_or_default();
            return Some(Target::Script { environment });
        }
        let path = file_path(uri)?;
        let coded = self.coded_tests.get(&path)?;
        (!coded.enviro_path.is_empty()).then(|| Target::CodedTest(coded.clone()))
    }
}
