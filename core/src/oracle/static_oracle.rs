use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ChoiceOracle, ChoiceQuery, ChoiceResponse, OracleError};
use rustc_hash::FxHashMap;

/// In-memory oracle keyed by the exact line-so-far of the query. Used by the CLI
/// and by tests; a missing key answers with an empty list.
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    answers: FxHashMap<String, ChoiceResponse>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FixtureEntry {
    // lists first: a struct also accepts a JSON array
    List(Vec<String>),
    Full(ChoiceResponse),
}

impl StaticOracle {
    pub fn new() -> Self {
        Self {
            answers: FxHashMap::default(),
        }
    }

    pub fn with(mut self, line_so_far: impl Into<String>, response: ChoiceResponse) -> Self {
        self.insert(line_so_far, response);
        self
    }

    pub fn insert(&mut self, line_so_far: impl Into<String>, response: ChoiceResponse) {
        self.answers.insert(line_so_far.into(), response);
    }

    /// Fixture format: a JSON object mapping a line-so-far either to a full
    /// `{choiceKind, choiceList, extraText, messages}` response or to a bare list.
    pub fn from_json(text: &str) -> Result<Self, OracleError> {
        let raw: FxHashMap<String, FixtureEntry> =
            serde_json::from_str(text).map_err(|e| OracleError::Malformed(e.to_string()))?;
        let mut oracle = Self::new();
        for (line, entry) in raw {
            let response = match entry {
                FixtureEntry::Full(response) => response,
                FixtureEntry::List(list) => ChoiceResponse::with_choices("Keyword", list),
            };
            oracle.insert(line, response);
        }
        Ok(oracle)
    }

    pub fn load(path: &Path) -> Result<Self, OracleError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| OracleError::Unavailable(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

#[async_trait]
impl ChoiceOracle for StaticOracle {
    async fn fetch(&self, query: &ChoiceQuery) -> Result<ChoiceResponse, OracleError> {
        Ok(self.answers.get(&query.line_so_far).cloned().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Backend used when no transport is configured.
#[derive(Debug, Clone, Default)]
pub struct UnavailableOracle {
    reason: Option<String>,
}

impl UnavailableOracle {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }
}

#[async_trait]
impl ChoiceOracle for UnavailableOracle {
    async fn fetch(&self, _query: &ChoiceQuery) -> Result<ChoiceResponse, OracleError> {
        Err(OracleError::Unavailable(
            self.reason.clone().unwrap_or_else(|| "no choice data backend configured".into()),
        ))
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::ChoiceKind;

    #[tokio::test]
    async fn answers_by_line_so_far() {
        let oracle = StaticOracle::from_json(
            r#"{
                "TEST.VALUE:": ["database", "manager"],
                "// vmock ": {"choiceKind": "Function", "choiceList": ["manager"], "extraText": "some extra data"}
            }"#,
        )
        .expect("fixture");
        assert_eq!(oracle.len(), 2);

        let value = oracle.fetch(&ChoiceQuery::new(ChoiceKind::Field, "ENV", "TEST.VALUE:")).await.expect("value");
        assert_eq!(value.choice_list, vec!["database", "manager"]);
        assert_eq!(value.choice_kind, "Keyword");

        let vmock = oracle.fetch(&ChoiceQuery::new(ChoiceKind::Mock, "ENV", "// vmock ")).await.expect("vmock");
        assert_eq!(vmock.extra_text.as_deref(), Some("some extra data"));

        let missing = oracle.fetch(&ChoiceQuery::new(ChoiceKind::Unit, "ENV", "TEST.UNIT:")).await.expect("missing");
        assert!(missing.choice_list.is_empty());
    }

    #[test]
    fn bad_fixture_is_malformed() {
        assert!(matches!(StaticOracle::from_json("[1, 2]"), Err(OracleError::Malformed(_))));
    }
}
