//! Host-independent entry points. A host (language server, CLI) owns the
//! documents and the oracle transport and calls into an [`Engine`] with
//! immutable snapshots.

use std::sync::Arc;

use tracing::debug;

use crate::blocks::{BlockMap, BlockTracker};
use crate::completion::{CompletionBuilder, CompletionItem, CompletionPlan};
use crate::config::EngineConfig;
use crate::context::{CompletionContext, ContextResolver, LexicalMode};
use crate::diagnostics::{Diagnostic, DiagnosticsScanner, EnvironmentFacts, Severity};
use crate::document::Document;
use crate::hover::{HoverBuilder, HoverOutcome, REQUIREMENT_QUERY_LINE};
use crate::oracle::{ChoiceKind, ChoiceQuery, OracleClient, OracleError};
use crate::text::Position;

const HOVER_KEY: &str = "hover";

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Identifies the document for generation tracking (usually its URI).
    pub document_id: String,
    pub document: Document,
    pub position: Position,
    pub mode: LexicalMode,
    pub trigger: Option<char>,
    /// Environment the choice data comes from.
    pub environment: String,
}

#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub context: CompletionContext,
    pub items: Vec<CompletionItem>,
    /// Advisory oracle messages and degraded-path reasons, for the host log.
    pub notices: Vec<String>,
    /// Set when the backend flagged its own failure; shown on the cursor line.
    pub backend_failure: Option<Diagnostic>,
    /// A newer request for the same field won; the host should drop this result.
    pub stale: bool,
}

impl CompletionOutcome {
    fn new(context: CompletionContext, items: Vec<CompletionItem>) -> Self {
        Self {
            context,
            items,
            notices: Vec::new(),
            backend_failure: None,
            stale: false,
        }
    }
}

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    oracle: Arc<OracleClient>,
    completion: CompletionBuilder,
    hover: HoverBuilder,
    diagnostics: DiagnosticsScanner,
}

impl Engine {
    pub fn new(config: EngineConfig, oracle: Arc<OracleClient>) -> Self {
        oracle.set_timeout(config.oracle_timeout);
        Self {
            completion: CompletionBuilder::new(config.rules.clone()),
            hover: HoverBuilder::new(config.rules.clone()),
            diagnostics: DiagnosticsScanner::new(&config),
            config,
            oracle,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn oracle(&self) -> &Arc<OracleClient> {
        &self.oracle
    }

    pub fn blocks(&self, document: &Document) -> BlockMap {
        BlockTracker::new(self.config.max_lines).scan(document)
    }

    pub fn context(&self, document: &Document, position: Position, mode: LexicalMode) -> CompletionContext {
        let blocks = self.blocks(document);
        ContextResolver::resolve_with(document, &blocks, position, mode, None)
    }

    pub fn diagnostics(&self, document: &Document) -> Vec<Diagnostic> {
        self.diagnostics.scan(document)
    }

    pub fn diagnostics_in(&self, document: &Document, facts: EnvironmentFacts) -> Vec<Diagnostic> {
        self.diagnostics.scan_in(document, facts)
    }

    pub async fn complete(&self, request: &CompletionRequest) -> CompletionOutcome {
        let blocks = self.blocks(&request.document);
        let context = ContextResolver::resolve_with(
            &request.document,
            &blocks,
            request.position,
            request.mode,
            request.trigger,
        );

        let query = match self.completion.plan(&context) {
            CompletionPlan::Local(items) => return CompletionOutcome::new(context, items),
            CompletionPlan::Nothing => return CompletionOutcome::new(context, Vec::new()),
            CompletionPlan::Query(query) => query,
        };
        // choice data only exists for a known environment
        if request.environment.trim().is_empty() {
            debug!(document_id = %request.document_id, "no environment, skipping choice query");
            return CompletionOutcome::new(context, Vec::new());
        }

        let choice_query =
            ChoiceQuery::new(query.kind, request.environment.as_str(), query.line_so_far).with_unit(query.unit);
        match self
            .oracle
            .fetch(&request.document_id, &query.field_key, &choice_query)
            .await
        {
            Ok(response) => {
                let items = self.completion.build(&context, &response);
                let backend_failure = response.backend_failure().map(|message| {
                    Diagnostic::on_line(
                        &request.document,
                        request.position.line as usize,
                        Severity::Warning,
                        "choice-data-error",
                        message,
                    )
                });
                let mut outcome = CompletionOutcome::new(context, items);
                outcome.notices = response.messages;
                outcome.backend_failure = backend_failure;
                outcome
            }
            Err(OracleError::Stale) => {
                let mut outcome = CompletionOutcome::new(context, Vec::new());
                outcome.stale = true;
                outcome
            }
            Err(err) => {
                let mut outcome = CompletionOutcome::new(context, Vec::new());
                outcome.notices.push(err.to_string());
                outcome
            }
        }
    }

    /// Hover text at `position`, or `None`. Oracle trouble degrades to `None`,
    /// and lookups are skipped when `environment` is empty.
    pub async fn hover(&self, document_id: &str, document: &Document, position: Position, environment: &str) -> Option<String> {
        let blocks = self.blocks(document);
        match self.hover.hover(document, &blocks, position) {
            HoverOutcome::Text(text) => Some(text),
            HoverOutcome::None => None,
            _ if environment.trim().is_empty() => None,
            HoverOutcome::Requirement { key } => {
                let query = ChoiceQuery::new(ChoiceKind::Requirement, environment, REQUIREMENT_QUERY_LINE);
                let response = self.fetch_for_hover(document_id, &query).await?;
                self.hover.requirement_text(&key, &response)
            }
            HoverOutcome::FieldDetail { line_so_far, piece } => {
                let query = ChoiceQuery::new(ChoiceKind::Field, environment, line_so_far);
                let response = self.fetch_for_hover(document_id, &query).await?;
                self.hover.field_detail(&piece, &response)
            }
        }
    }

    async fn fetch_for_hover(&self, document_id: &str, query: &ChoiceQuery) -> Option<crate::oracle::ChoiceResponse> {
        match self.oracle.fetch(document_id, HOVER_KEY, query).await {
            Ok(response) => Some(response),
            Err(err) => {
                if !err.is_silent() {
                    debug!(document_id, "hover lookup failed: {err}");
                }
                None
            }
        }
    }
}
