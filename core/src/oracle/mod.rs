//! Choice-data oracle: the external provider of unit, function, global and
//! requirement lists. The engine only sees the [`ChoiceOracle`] trait; transports
//! live with the host.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod client;
mod generation;
mod static_oracle;

pub use client::OracleClient;
pub use generation::{Generation, GenerationTracker};
pub use static_oracle::{StaticOracle, UnavailableOracle};

/// What a query is asking for. The backend infers most of this from the line
/// itself; the kind selects the backend mode and keys generation tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChoiceKind {
    Unit,
    Function,
    Global,
    Requirement,
    Field,
    Slot,
    Stub,
    Mock,
}

impl ChoiceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChoiceKind::Unit => "unit",
            ChoiceKind::Function => "function",
            ChoiceKind::Global => "global",
            ChoiceKind::Requirement => "requirement",
            ChoiceKind::Field => "field",
            ChoiceKind::Slot => "slot",
            ChoiceKind::Stub => "stub",
            ChoiceKind::Mock => "mock",
        }
    }

    /// Backend mode: coded-test sources and scripts are answered by different lists.
    pub fn mode(self) -> &'static str {
        match self {
            ChoiceKind::Mock => "choiceList-ct",
            _ => "choiceList-tst",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceQuery {
    pub choice_kind: ChoiceKind,
    /// Environment path (or name) the lists come from.
    pub environment: String,
    pub line_so_far: String,
    /// Unit scope for subprogram lists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl ChoiceQuery {
    pub fn new(choice_kind: ChoiceKind, environment: impl Into<String>, line_so_far: impl Into<String>) -> Self {
        Self {
            choice_kind,
            environment: environment.into(),
            line_so_far: line_so_far.into(),
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: Option<String>) -> Self {
        self.unit = unit;
        self
    }
}

/// Reply from the oracle. Read-only and never cached across requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChoiceResponse {
    pub choice_kind: String,
    pub choice_list: Vec<String>,
    pub extra_text: Option<String>,
    pub messages: Vec<String>,
}

impl ChoiceResponse {
    pub fn with_choices<I, S>(choice_kind: &str, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            choice_kind: choice_kind.to_string(),
            choice_list: choices.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// `extraText` values the backend uses to flag its own failure.
    pub fn backend_failure(&self) -> Option<&str> {
        match self.extra_text.as_deref() {
            Some("server-error") | Some("migration-error") => {
                Some(self.messages.first().map_or("choice data backend failed", String::as_str))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("choice data unavailable: {0}")]
    Unavailable(String),
    #[error("choice data request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("malformed choice data: {0}")]
    Malformed(String),
    #[error("superseded by a newer request")]
    Stale,
}

impl OracleError {
    /// Stale responses are dropped without telling anyone.
    pub fn is_silent(&self) -> bool {
        matches!(self, OracleError::Stale)
    }
}

#[async_trait]
pub trait ChoiceOracle: Send + Sync {
    async fn fetch(&self, query: &ChoiceQuery) -> Result<ChoiceResponse, OracleError>;

    /// Short name for logs.
    fn name(&self) -> &'static str {
        "oracle"
    }
}
