//! Completion items for a resolved [`CompletionContext`].
//!
//! Completion is split in two steps so the oracle round-trip stays outside the
//! builder: [`CompletionBuilder::plan`] decides whether the answer is local, needs
//! one oracle query, or is empty; [`CompletionBuilder::build`] turns the oracle
//! response into items. Both are pure.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::command::{Keyword, SCRIPT_FEATURES};
use crate::context::{CompletionContext, ContextKind};
use crate::oracle::{ChoiceKind, ChoiceResponse};
use crate::rules::ValidityMatrix;
use crate::text::Range;

#[cfg(test)]
mod completion_test;

/// Generated global instances the backend lists for C++ `<<GLOBAL>>` scopes.
static GENERATED_INSTANCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"C_\d+_\d+").expect("instance pattern"));

const VARY_SNIPPET: &str = "VARY FROM:$1 TO:$2 BY:$3";
const RANGE_MARKERS: [&str; 3] = ["<<MIN>>", "<<MID>>", "<<MAX>>"];
const GLOBAL_SCOPE: &str = "<<GLOBAL>>";
const COMPOUND: &str = "<<COMPOUND>>";

/// A `TEST.VALUE` line is complete once it carries this many colons.
const VALUE_COLON_LIMIT: usize = 5;
/// Same, for globals and prototype-stub lines which have no `Unit::Function` scope.
const SHORT_VALUE_COLON_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ItemKind {
    Constant,
    Enum,
    Field,
    File,
    Function,
    Keyword,
    Property,
    Value,
    Variable,
    Text,
    Snippet,
}

impl ItemKind {
    /// Maps the backend's `choiceKind` string; anything unknown is a keyword.
    pub fn from_choice_kind(kind: &str) -> Self {
        match kind {
            "Constant" => ItemKind::Constant,
            "Enum" => ItemKind::Enum,
            "Field" => ItemKind::Field,
            "File" => ItemKind::File,
            "Function" => ItemKind::Function,
            "Property" => ItemKind::Property,
            "Value" => ItemKind::Value,
            "Variable" => ItemKind::Variable,
            "Text" => ItemKind::Text,
            _ => ItemKind::Keyword,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEdit {
    pub range: Range,
    pub new_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionItem {
    pub label: String,
    pub kind: ItemKind,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_text: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_snippet: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_text_edits: Vec<TextEdit>,
}

impl CompletionItem {
    pub fn new(label: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            label: label.into(),
            kind,
            detail: String::new(),
            insert_text: None,
            is_snippet: false,
            additional_text_edits: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    fn snippet(label: &str, body: &str) -> Self {
        Self {
            insert_text: Some(body.to_string()),
            is_snippet: true,
            ..Self::new(label, ItemKind::Snippet)
        }
    }
}

/// A single oracle round-trip the builder needs before it can answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleRequest {
    pub kind: ChoiceKind,
    pub line_so_far: String,
    pub unit: Option<String>,
    /// Generation key: requests for the same document and key supersede each other.
    pub field_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionPlan {
    Local(Vec<CompletionItem>),
    Query(OracleRequest),
    Nothing,
}

#[derive(Debug, Clone, Default)]
pub struct CompletionBuilder {
    rules: ValidityMatrix,
}

impl CompletionBuilder {
    pub fn new(rules: ValidityMatrix) -> Self {
        Self { rules }
    }

    pub fn plan(&self, ctx: &CompletionContext) -> CompletionPlan {
        match ctx.kind {
            ContextKind::TopLevelCommand => self.keywords(ctx),
            ContextKind::CommandValue => self.field_value(ctx),
            ContextKind::VmockComment => CompletionPlan::Query(OracleRequest {
                kind: ChoiceKind::Mock,
                line_so_far: ctx.line_so_far.trim().to_string(),
                unit: None,
                field_key: "vmock".into(),
            }),
            ContextKind::NotesBody | ContextKind::Unrecognized => CompletionPlan::Nothing,
        }
    }

    /// Items for an oracle response, in oracle order.
    pub fn build(&self, ctx: &CompletionContext, response: &ChoiceResponse) -> Vec<CompletionItem> {
        let kind = ItemKind::from_choice_kind(&response.choice_kind);
        let rows = response
            .choice_list
            .iter()
            .filter(|row| !GENERATED_INSTANCE.is_match(row))
            .filter(|row| ctx.field != Some(Keyword::Subprogram) || row.as_str() != GLOBAL_SCOPE);

        let mut items = Vec::with_capacity(response.choice_list.len());
        for row in rows {
            if ctx.field == Some(Keyword::RequirementKey) {
                items.push(CompletionItem::new(requirement_label(row), kind));
            } else {
                expand_row(row, kind, &mut items);
            }
        }

        if ctx.kind == ContextKind::VmockComment && response.backend_failure().is_none() {
            let extra = response.extra_text.as_deref().filter(|t| !t.is_empty());
            if let (Some(extra), Some(first)) = (extra, items.first_mut()) {
                first.additional_text_edits.push(TextEdit {
                    range: Range::default(),
                    new_text: format!("// {extra}"),
                });
            }
        }
        items
    }

    fn keywords(&self, ctx: &CompletionContext) -> CompletionPlan {
        let subprogram = ctx.subprogram_context.as_deref();
        let partial = ctx.keyword_partial().to_ascii_uppercase();

        let items: Vec<CompletionItem> = if ctx.has_test_prefix() {
            Keyword::ALL
                .iter()
                .filter(|kw| kw.as_str().starts_with(&partial))
                .filter(|kw| self.rules.allows(kw.as_str(), subprogram))
                .map(|kw| CompletionItem::new(kw.as_str(), ItemKind::Keyword))
                .collect()
        } else {
            let starters: &[&str] = if subprogram == Some(COMPOUND) {
                &["TEST", "TEST.SLOT"]
            } else {
                &["TEST", "TEST.VALUE", "TEST.EXPECTED"]
            };
            starters
                .iter()
                .filter(|s| s.starts_with(&partial))
                .filter(|s| s.strip_prefix("TEST.").is_none_or(|field| self.rules.allows(field, subprogram)))
                .map(|s| CompletionItem::new(*s, ItemKind::Keyword))
                .collect()
        };
        CompletionPlan::Local(items)
    }

    fn field_value(&self, ctx: &CompletionContext) -> CompletionPlan {
        let Some(field) = ctx.field else {
            return CompletionPlan::Nothing;
        };
        let value = ctx.field_value.trim();
        let query = |kind: ChoiceKind| {
            CompletionPlan::Query(OracleRequest {
                kind,
                line_so_far: ctx.line_so_far.clone(),
                unit: None,
                field_key: field.as_str().to_string(),
            })
        };

        match field {
            Keyword::Name if value.is_empty() => {
                CompletionPlan::Local(vec![CompletionItem::new("<test-name>", ItemKind::Text)])
            }
            Keyword::ScriptFeature => {
                let partial = value.to_ascii_uppercase();
                CompletionPlan::Local(
                    SCRIPT_FEATURES
                        .iter()
                        .filter(|f| f.starts_with(&partial))
                        .map(|f| CompletionItem::new(*f, ItemKind::Keyword))
                        .collect(),
                )
            }
            Keyword::Unit => query(ChoiceKind::Unit),
            Keyword::Subprogram => match &ctx.unit_context {
                Some(unit) => CompletionPlan::Query(OracleRequest {
                    kind: ChoiceKind::Function,
                    line_so_far: ctx.line_so_far.clone(),
                    unit: Some(unit.clone()),
                    field_key: field.as_str().to_string(),
                }),
                None => CompletionPlan::Nothing,
            },
            Keyword::Value if value_is_complete(ctx) => CompletionPlan::Nothing,
            Keyword::Value | Keyword::Expected => query(ChoiceKind::Field),
            Keyword::ValueUserCode | Keyword::ExpectedUserCode => query(ChoiceKind::Field),
            Keyword::Slot => query(ChoiceKind::Slot),
            Keyword::Stub => query(ChoiceKind::Stub),
            Keyword::RequirementKey => query(ChoiceKind::Requirement),
            _ => CompletionPlan::Nothing,
        }
    }
}

/// No more value completion once a `TEST.VALUE` line is fully specified, and none
/// right after typing a `:` behind a dotted path (that colon is a scope operator or
/// the value separator, where the popup only gets in the way).
fn value_is_complete(ctx: &CompletionContext) -> bool {
    if ctx.trigger_char == Some(':') && ctx.field_value.contains('.') {
        return true;
    }
    let limit = if ctx.line_so_far.contains("USER_GLOBALS_VCAST") || ctx.line_so_far.contains("uut_prototype_stubs")
    {
        SHORT_VALUE_COLON_LIMIT
    } else {
        VALUE_COLON_LIMIT
    };
    ctx.line_so_far.matches(':').count() >= limit
}

/// `label@detail` rows; `scalar@<type>` expands into the type plus the value helpers.
fn expand_row(row: &str, kind: ItemKind, items: &mut Vec<CompletionItem>) {
    let mut pieces = row.split('@');
    let label = pieces.next().unwrap_or_default();
    let detail = pieces.next().unwrap_or_default();

    if label == "scalar" {
        items.push(CompletionItem::new(detail, kind));
        items.push(CompletionItem::snippet("vary", VARY_SNIPPET));
        items.extend(RANGE_MARKERS.iter().map(|m| CompletionItem::new(*m, ItemKind::Constant)));
    } else {
        items.push(CompletionItem::new(label, kind).with_detail(detail));
    }
}

/// Requirement rows look like `<key> ||| <title> ||| <description>`.
fn requirement_label(row: &str) -> String {
    let mut pieces = row.split("|||");
    let key = pieces.next().unwrap_or_default().trim();
    match pieces.next() {
        Some(title) => format!("{key} | {}", strip_quotes(title.trim())),
        None => key.to_string(),
    }
}

pub(crate) fn strip_quotes(text: &str) -> String {
    text.chars().filter(|c| *c != '"' && *c != '\'').collect()
}
