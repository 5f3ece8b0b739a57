use tower_lsp::{ClientSocket, LspService, Server};
use tracing_subscriber::EnvFilter;

use super::{
    cli::{try_cli_analyze, LaunchOptions},
    notifications::{LOAD_TESTFILE, UPDATE_SERVER_PORT, UPDATE_SERVER_STATE, UPDATE_VPYTHON_COMMAND, VMOCK_STATUS},
    state::TstLanguageServer,
};

const DEFAULT_LOG_FILTER: &str = "tst_lsp=info,tst_core=info";

/// The server plus its `vcasttesteditor/*` notification handlers.
pub fn build_service(launch: LaunchOptions) -> (LspService<TstLanguageServer>, ClientSocket) {
    LspService::build(move |client| TstLanguageServer::with_launch(client, launch.clone()))
        .custom_method(LOAD_TESTFILE, TstLanguageServer::load_testfile)
        .custom_method(VMOCK_STATUS, TstLanguageServer::vmock_status)
        .custom_method(UPDATE_VPYTHON_COMMAND, TstLanguageServer::update_vpython_command)
        .custom_method(UPDATE_SERVER_PORT, TstLanguageServer::update_server_port)
        .custom_method(UPDATE_SERVER_STATE, TstLanguageServer::update_server_state)
        .finish()
}

pub async fn run() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(output) = try_cli_analyze(&args).unwrap_or_else(|e| {
        eprintln!("tst-lsp analyze error: {e:#}");
        std::process::exit(2);
    }) {
        println!("{}", output);
        return;
    }

    // stdout carries JSON-RPC
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .init();

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = build_service(LaunchOptions::from_args(&args));
    Server::new(stdin, stdout, socket).serve(service).await;
}
