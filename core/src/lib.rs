pub mod blocks;
pub mod command;
pub mod completion;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod document;
pub mod engine;
pub mod hover;
pub mod oracle;
pub mod rules;
pub mod text;

pub use blocks::{BlockKind, BlockMap, BlockTracker};
pub use command::{Command, Keyword};
pub use completion::{CompletionBuilder, CompletionItem, CompletionPlan, ItemKind, OracleRequest, TextEdit};
pub use config::{ConfigError, EngineConfig};
pub use context::{CompletionContext, ContextKind, ContextResolver, LexicalMode};
pub use diagnostics::{Diagnostic, DiagnosticsScanner, EnvironmentFacts, Severity};
pub use document::{Document, Line};
pub use engine::{CompletionOutcome, CompletionRequest, Engine};
pub use hover::{HoverBuilder, HoverOutcome};
pub use oracle::{
    ChoiceKind, ChoiceOracle, ChoiceQuery, ChoiceResponse, OracleClient, OracleError, StaticOracle, UnavailableOracle,
};
pub use rules::ValidityMatrix;
pub use text::{Position, Range};
