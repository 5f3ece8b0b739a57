use tokio::task;
use tokio::time::{sleep, Duration};
use tower_lsp::lsp_types::*;
use tracing::{debug, warn};

use tst_core::{CompletionRequest, ContextKind, Severity};

use super::convert::{to_core_position, to_lsp_completion, to_lsp_diagnostic};
use super::state::{Target, TstLanguageServer};
use super::gateway::script_facts;
use super::utils::{file_path, is_test_script};

pub(crate) const NO_MOCK_SUPPORT: &str =
    "This environment does not support mocks, no auto-completion is available.\nRebuild the environment to use mocks";
pub(crate) const VMOCK_UNAVAILABLE: &str = "This currently configured version of VectorCAST does not support mocks.\nUpdate to version 24-SP4 or later to use mocks";

impl TstLanguageServer {
    /// Publishes diagnostics for `uri` after `delay_ms`, unless the document moved
    /// past `scheduled_version` in the meantime. Only scripts are scanned.
    pub(crate) async fn schedule_diagnostics(&self, uri: Url, scheduled_version: i32, delay_ms: u64) {
        if !is_test_script(&uri) {
            return;
        }
        let Some(engine) = self.engine() else {
            return;
        };
        let documents = self.documents.clone();
        let client = self.client.clone();
        let limiter = self.compute_limiter.lock().ok().map(|s| s.clone());

        tokio::spawn(async move {
            if delay_ms > 0 {
                sleep(Duration::from_millis(delay_ms)).await;
            }

            let (snapshot, seq_snapshot, version_snapshot) = match documents.get(&uri) {
                Some(doc) => (super::text::snapshot(&doc.content), doc.debounce_seq, doc.version),
                None => return,
            };
            if version_snapshot != scheduled_version {
                return;
            }

            let _permit = match &limiter {
                Some(sem) => sem.clone().acquire_owned().await.ok(),
                None => None,
            };
            let script = file_path(&uri);
            let found = match task::spawn_blocking(move || {
                let facts = script_facts(script.as_deref(), &snapshot);
                engine.diagnostics_in(&snapshot, facts)
            })
            .await
            {
                Ok(found) => found,
                Err(e) => {
                    warn!("diagnostics scan for {uri} failed: {e}");
                    return;
                }
            };

            // an edit landed while scanning; its own scan will publish
            let current = documents
                .get(&uri)
                .is_some_and(|doc| doc.debounce_seq == seq_snapshot && doc.version == version_snapshot);
            if !current {
                debug!(%uri, "dropping outdated diagnostics");
                return;
            }

            let diagnostics = found.iter().map(to_lsp_diagnostic).collect();
            client
                .publish_diagnostics(uri, diagnostics, Some(version_snapshot))
                .await;
        });
    }

    pub(crate) async fn complete_at(&self, uri: &Url, position: Position, trigger: Option<char>) -> Vec<CompletionItem> {
        let Some((document, _)) = self.snapshot(uri) else {
            return Vec::new();
        };
        let Some(target) = self.target(uri, &document) else {
            return Vec::new();
        };
        let Some(engine) = self.engine() else {
            return Vec::new();
        };
        let core_position = to_core_position(position);

        let environment = match &target {
            Target::Script { environment } => environment.clone(),
            Target::CodedTest(coded) => {
                // a vmock warning only lives until the next completion request
                self.client.publish_diagnostics(uri.clone(), Vec::new(), None).await;

                let context = engine.context(&document, core_position, target.mode());
                if context.kind != ContextKind::VmockComment {
                    return Vec::new();
                }
                if !self.vmock_available() {
                    self.warn_on_line(uri, position.line, VMOCK_UNAVAILABLE).await;
                    return Vec::new();
                }
                if !coded.has_mock_support {
                    self.warn_on_line(uri, position.line, NO_MOCK_SUPPORT).await;
                    return Vec::new();
                }
                coded.enviro_path.clone()
            }
        };

        let request = CompletionRequest {
            document_id: uri.to_string(),
            document,
            position: core_position,
            mode: target.mode(),
            trigger,
            environment,
        };
        let outcome = engine.complete(&request).await;

        for notice in &outcome.notices {
            self.client.log_message(MessageType::WARNING, notice).await;
        }
        if outcome.stale {
            return Vec::new();
        }
        if let Some(failure) = &outcome.backend_failure {
            self.client
                .publish_diagnostics(uri.clone(), vec![to_lsp_diagnostic(failure)], None)
                .await;
        }
        outcome.items.iter().map(to_lsp_completion).collect()
    }

    pub(crate) async fn hover_at(&self, uri: &Url, position: Position) -> Option<Hover> {
        let (document, _) = self.snapshot(uri)?;
        let Target::Script { environment } = self.target(uri, &document)? else {
            return None;
        };
        let engine = self.engine()?;
        let text = engine
            .hover(uri.as_str(), &document, to_core_position(position), &environment)
            .await?;
        Some(Hover {
            contents: HoverContents::Scalar(MarkedString::String(text)),
            range: None,
        })
    }

    // Replaces whatever is published for `uri` with a single warning on `line`.
    async fn warn_on_line(&self, uri: &Url, line: u32, message: &str) {
        let Some((document, _)) = self.snapshot(uri) else {
            return;
        };
        let diag = tst_core::Diagnostic::on_line(&document, line as usize, Severity::Warning, "mock-support", message);
        self.client
            .publish_diagnostics(uri.clone(), vec![to_lsp_diagnostic(&diag)], None)
            .await;
    }
}
