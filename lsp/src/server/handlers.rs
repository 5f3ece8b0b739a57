use ropey::Rope;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::LanguageServer;
use tracing::{debug, info};

use tst_core::context::TRIGGER_CHARACTERS;

use super::{
    state::{Document, TstLanguageServer},
    text::apply_change,
    utils::compute_content_hash,
    CHANGE_DEBOUNCE_MS, OPEN_DEBOUNCE_MS,
};

#[tower_lsp::async_trait]
impl LanguageServer for TstLanguageServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        info!("TST Language Server initializing with params: {:?}", params.root_uri);

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::INCREMENTAL),
                    save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                    ..Default::default()
                })),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(false),
                    trigger_characters: Some(TRIGGER_CHARACTERS.iter().map(char::to_string).collect()),
                    work_done_progress_options: Default::default(),
                    all_commit_characters: None,
                    completion_item: None,
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "TST Language Server".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        info!("TST Language Server initialized");
        self.client
            .log_message(MessageType::INFO, "TST Language Server started")
            .await;
        self.load_config().await;
    }

    async fn shutdown(&self) -> Result<()> {
        info!("TST Language Server shutting down");
        Ok(())
    }

    async fn did_change_configuration(&self, _params: DidChangeConfigurationParams) {
        self.load_config().await;
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        let text = params.text_document.text;
        let document = Document {
            content_hash: compute_content_hash(&text),
            content: Rope::from_str(&text),
            version,
            debounce_seq: 0,
        };
        self.documents.insert(uri.clone(), document);
        self.schedule_diagnostics(uri, version, OPEN_DEBOUNCE_MS).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        let changed = {
            let mut entry = self.documents.entry(uri.clone()).or_default();
            entry.version = version;
            for change in &params.content_changes {
                apply_change(&mut entry.content, change);
            }
            entry.debounce_seq = entry.debounce_seq.wrapping_add(1);

            let hash = compute_content_hash(&entry.content.to_string());
            let changed = hash != entry.content_hash;
            entry.content_hash = hash;
            changed
        };

        if changed {
            self.schedule_diagnostics(uri, version, CHANGE_DEBOUNCE_MS).await;
        } else {
            debug!(%uri, version, "content unchanged, keeping published diagnostics");
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = self.documents.get(&uri).map(|doc| doc.version);
        if let Some(version) = version {
            self.schedule_diagnostics(uri, version, 0).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.remove(&uri);
        self.oracle.forget(uri.as_str());
        self.client.publish_diagnostics(uri, Vec::new(), None).await;
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        Ok(self.hover_at(uri, position).await)
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = &params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;
        let trigger = params
            .context
            .and_then(|c| c.trigger_character)
            .and_then(|t| t.chars().next());

        let items = self.complete_at(uri, position, trigger).await;
        Ok(Some(CompletionResponse::Array(items)))
    }
}
