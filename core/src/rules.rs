//! Field validity as a function of the current `TEST.SUBPROGRAM`.
//!
//! The matrix is data: the built-in table covers the coded-test driver, and a
//! TOML file can replace it.
//!
//! ```toml
//! [[rule]]
//! fields = ["VALUE", "EXPECTED"]
//! subprogram = "coded_tests_driver"
//! relation = "is"
//! message = "TEST.VALUE and TEST.EXPECTED are not valid when TEST.SUBPROGRAM is set to coded_tests_driver"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::command::CODED_TESTS_DRIVER;
use crate::config::ConfigError;
use crate::diagnostics::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Violated when the current subprogram equals the rule's subprogram.
    Is,
    /// Violated when the current subprogram is anything else, including unset.
    IsNot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityRule {
    pub fields: Vec<String>,
    pub subprogram: String,
    pub relation: Relation,
    pub message: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
}

fn default_severity() -> Severity {
    Severity::Error
}

impl ValidityRule {
    fn covers(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.eq_ignore_ascii_case(field))
    }

    fn violated_by(&self, subprogram: Option<&str>) -> bool {
        let matches = subprogram.map(str::trim) == Some(self.subprogram.as_str());
        match self.relation {
            Relation::Is => matches,
            Relation::IsNot => !matches,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityMatrix {
    #[serde(default, rename = "rule")]
    rules: Vec<ValidityRule>,
}

impl Default for ValidityMatrix {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ValidityMatrix {
    pub fn builtin() -> Self {
        Self {
            rules: vec![
                ValidityRule {
                    fields: vec!["VALUE".into(), "EXPECTED".into()],
                    subprogram: CODED_TESTS_DRIVER.into(),
                    relation: Relation::Is,
                    message: "TEST.VALUE and TEST.EXPECTED are not valid when TEST.SUBPROGRAM is set to coded_tests_driver"
                        .into(),
                    severity: Severity::Error,
                },
                ValidityRule {
                    fields: vec!["CODED_TEST_FILE".into()],
                    subprogram: CODED_TESTS_DRIVER.into(),
                    relation: Relation::IsNot,
                    message: "TEST.CODED_TEST_FILE is not valid when TEST.SUBPROGRAM is not set to coded_tests_driver"
                        .into(),
                    severity: Severity::Error,
                },
            ],
        }
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn rules(&self) -> &[ValidityRule] {
        &self.rules
    }

    /// First rule the field breaks under `subprogram`, in table order.
    pub fn violation(&self, field: &str, subprogram: Option<&str>) -> Option<&ValidityRule> {
        self.rules
            .iter()
            .find(|rule| rule.covers(field) && rule.violated_by(subprogram))
    }

    pub fn allows(&self, field: &str, subprogram: Option<&str>) -> bool {
        self.violation(field, subprogram).is_none()
    }
}
