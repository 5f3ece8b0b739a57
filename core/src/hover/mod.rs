//! Hover text as an ordered rule table over the block snapshot; first match wins.
//! Two rules need choice data, so they return a lookup for the caller to run and
//! finish with [`HoverBuilder::requirement_text`] or [`HoverBuilder::field_detail`].

use crate::blocks::BlockMap;
use crate::command::{Command, Keyword};
use crate::completion::strip_quotes;
use crate::document::Document;
use crate::oracle::ChoiceResponse;
use crate::rules::ValidityMatrix;
use crate::text::{Position, byte_offset_at};

pub const SLOT_FORMAT: &str = "format: slot-number, unit-name, function-name, iteration-count, test-name";

/// Line the requirement list is requested with; the backend returns every key.
pub const REQUIREMENT_QUERY_LINE: &str = "TEST.REQUIREMENT_KEY:";

/// Pieces before this index are `TEST`, the command, the unit and the function.
const PARAMETER_PIECE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoverOutcome {
    Text(String),
    /// Needs the requirement list; render with [`HoverBuilder::requirement_text`].
    Requirement { key: String },
    /// Needs the choice list for `line_so_far`; render with [`HoverBuilder::field_detail`].
    FieldDetail { line_so_far: String, piece: String },
    None,
}

impl HoverOutcome {
    pub fn is_none(&self) -> bool {
        matches!(self, HoverOutcome::None)
    }
}

type Rule = fn(&HoverBuilder, &Line<'_>) -> Option<HoverOutcome>;

/// What the rules get to look at.
struct Line<'a> {
    text: &'a str,
    command: &'a Command,
    subprogram: Option<&'a str>,
    position: Position,
    document: &'a Document,
}

#[derive(Debug, Clone, Default)]
pub struct HoverBuilder {
    rules: ValidityMatrix,
}

impl HoverBuilder {
    const RULES: [Rule; 4] = [
        HoverBuilder::invalid_field,
        HoverBuilder::requirement_key,
        HoverBuilder::slot_format,
        HoverBuilder::parameter_detail,
    ];

    pub fn new(rules: ValidityMatrix) -> Self {
        Self { rules }
    }

    pub fn hover(&self, document: &Document, blocks: &BlockMap, position: Position) -> HoverOutcome {
        let index = position.line as usize;
        let Some(state) = blocks.line(index) else {
            return HoverOutcome::None;
        };
        // free text inside a block never hovers, even when it looks like a command
        if state.block.is_some() {
            return HoverOutcome::None;
        }
        let (Some(command), Some(text)) = (state.command.as_ref(), document.line(index)) else {
            return HoverOutcome::None;
        };
        let line = Line {
            text: &text.text,
            command,
            subprogram: state.subprogram.as_deref(),
            position,
            document,
        };
        Self::RULES
            .iter()
            .find_map(|rule| rule(self, &line))
            .unwrap_or(HoverOutcome::None)
    }

    fn invalid_field(&self, line: &Line<'_>) -> Option<HoverOutcome> {
        line.command.keyword?;
        self.rules
            .violation(&line.command.name, line.subprogram)
            .map(|rule| HoverOutcome::Text(rule.message.clone()))
    }

    fn requirement_key(&self, line: &Line<'_>) -> Option<HoverOutcome> {
        if !line.command.is(Keyword::RequirementKey) {
            return None;
        }
        // the value may be a bare key or a completed `key | title`
        let key = line.command.trimmed_value()?.split('|').next()?.trim();
        (!key.is_empty()).then(|| HoverOutcome::Requirement { key: key.to_string() })
    }

    fn slot_format(&self, line: &Line<'_>) -> Option<HoverOutcome> {
        line.command
            .is(Keyword::Slot)
            .then(|| HoverOutcome::Text(SLOT_FORMAT.to_string()))
    }

    fn parameter_detail(&self, line: &Line<'_>) -> Option<HoverOutcome> {
        if !line.command.keyword.is_some_and(Keyword::is_dotted_path) || line.command.value.is_none() {
            return None;
        }
        let column = byte_offset_at(line.text, line.position.character);
        let (index, piece) = piece_at(line.text, column)?;
        if index < PARAMETER_PIECE {
            return None;
        }
        // array elements hover like their array: `data[23]` -> `data`
        let piece = piece.split('[').next().unwrap_or(piece);
        let line_so_far = line.document.line_so_far(line.position)?;
        Some(HoverOutcome::FieldDetail {
            line_so_far: line_so_far.to_string(),
            piece: piece.to_string(),
        })
    }

    /// Title and description of the requirement row whose key matches.
    pub fn requirement_text(&self, key: &str, response: &ChoiceResponse) -> Option<String> {
        response.choice_list.iter().find_map(|row| {
            let mut pieces = row.split("|||").map(str::trim);
            if pieces.next()? != key {
                return None;
            }
            let title = strip_quotes(pieces.next().unwrap_or_default());
            let description = pieces.next().unwrap_or_default();
            Some(format!("{title}\n\n{description}"))
        })
    }

    /// The `@detail` of the choice row naming `piece`.
    pub fn field_detail(&self, piece: &str, response: &ChoiceResponse) -> Option<String> {
        response.choice_list.iter().find_map(|row| {
            let (label, detail) = row.split_once('@')?;
            let detail = detail.split('@').next().unwrap_or(detail);
            (label == piece && !detail.is_empty()).then(|| detail.to_string())
        })
    }
}

/// Splits on `.` and `:` except where either touches a `::` scope operator, and
/// returns the piece under byte `column` with its index.
fn piece_at(text: &str, column: usize) -> Option<(usize, &str)> {
    let bytes = text.as_bytes();
    let is_delimiter = |i: usize| {
        matches!(bytes[i], b'.' | b':')
            && (i == 0 || bytes[i - 1] != b':')
            && bytes.get(i + 1) != Some(&b':')
    };

    let mut start = 0;
    let mut index = 0;
    for i in 0..bytes.len() {
        if is_delimiter(i) {
            // the delimiter belongs to the piece before it
            if column <= i {
                return Some((index, &text[start..i]));
            }
            start = i + 1;
            index += 1;
        }
    }
    (column <= bytes.len()).then(|| (index, &text[start..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hover_at(text: &str, line: u32, character: u32) -> HoverOutcome {
        let doc = Document::from_text(text);
        let blocks = BlockMap::scan(&doc);
        HoverBuilder::default().hover(&doc, &blocks, Position::new(line, character))
    }

    #[test]
    fn value_under_coded_test_driver() {
        let outcome = hover_at("TEST.SUBPROGRAM:coded_tests_driver\nTEST.VALUE", 1, 3);
        assert_eq!(
            outcome,
            HoverOutcome::Text(
                "TEST.VALUE and TEST.EXPECTED are not valid when TEST.SUBPROGRAM is set to coded_tests_driver".into()
            )
        );
    }

    #[test]
    fn coded_test_file_outside_the_driver() {
        let outcome = hover_at("TEST.SUBPROGRAM:Manager::PlaceOrder\nTEST.CODED_TEST_FILE", 1, 0);
        assert_eq!(
            outcome,
            HoverOutcome::Text(
                "TEST.CODED_TEST_FILE is not valid when TEST.SUBPROGRAM is not set to coded_tests_driver".into()
            )
        );
    }

    #[test]
    fn requirement_key_needs_a_value() {
        assert_eq!(
            hover_at("TEST.REQUIREMENT_KEY:FR11 | Clearing a table", 0, 24),
            HoverOutcome::Requirement { key: "FR11".into() }
        );
        assert_eq!(hover_at("TEST.REQUIREMENT_KEY:", 0, 5), HoverOutcome::None);
    }

    #[test]
    fn slot_lines_show_the_format() {
        assert_eq!(
            hover_at("TEST.SLOT: 1, manager, Manager::PlaceOrder, 1, test1", 0, 12),
            HoverOutcome::Text(SLOT_FORMAT.into())
        );
    }

    #[test]
    fn parameter_pieces_ask_for_details() {
        let line = "TEST.VALUE:manager.Manager::PlaceOrder.Order.Entree:Chicken";
        // cursor inside `Order`
        assert_eq!(
            hover_at(line, 0, 41),
            HoverOutcome::FieldDetail {
                line_so_far: "TEST.VALUE:manager.Manager::PlaceOrder.Or".into(),
                piece: "Order".into(),
            }
        );
        // the function piece is not a parameter
        assert_eq!(hover_at(line, 0, 30), HoverOutcome::None);
        let array = "TEST.EXPECTED:uut.func.data[2].x:1";
        match hover_at(array, 0, 25) {
            HoverOutcome::FieldDetail { piece, .. } => assert_eq!(piece, "data"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn notes_and_plain_lines_have_no_hover() {
        assert_eq!(hover_at("TEST.NOTES:\nTEST.SLOT:\nTEST.END_NOTES:", 1, 3), HoverOutcome::None);
        assert_eq!(hover_at("-- comment", 0, 3), HoverOutcome::None);
        assert_eq!(hover_at("TEST.NAME:x", 0, 3), HoverOutcome::None);
        assert_eq!(hover_at("TEST.NAME:x", 4, 0), HoverOutcome::None);
    }

    #[test]
    fn matrix_from_config_drives_the_first_rules() {
        let matrix = ValidityMatrix::from_toml_str(
            r#"
            [[rule]]
            fields = ["STUB"]
            subprogram = "<<INIT>>"
            relation = "is"
            message = "no stubs in init"
            "#,
        )
        .expect("rules");
        let doc = Document::from_text("TEST.SUBPROGRAM:<<INIT>>\nTEST.STUB:manager.Add");
        let blocks = BlockMap::scan(&doc);
        let outcome = HoverBuilder::new(matrix).hover(&doc, &blocks, Position::new(1, 2));
        assert_eq!(outcome, HoverOutcome::Text("no stubs in init".into()));
    }

    #[test]
    fn renders_requirement_rows() {
        let builder = HoverBuilder::default();
        let response = ChoiceResponse::with_choices(
            "Keyword",
            [
                "FR1 ||| Adding a table ||| Tables are numbered",
                "FR11 ||| \"Clearing a table\" ||| Clearing resets the occupied flag",
            ],
        );
        assert_eq!(
            builder.requirement_text("FR11", &response).as_deref(),
            Some("Clearing a table\n\nClearing resets the occupied flag")
        );
        assert_eq!(builder.requirement_text("FR2", &response), None);
    }

    #[test]
    fn renders_field_details() {
        let builder = HoverBuilder::default();
        let response = ChoiceResponse::with_choices("Field", ["Entree@enum Entrees", "Dessert"]);
        assert_eq!(builder.field_detail("Entree", &response).as_deref(), Some("enum Entrees"));
        assert_eq!(builder.field_detail("Dessert", &response), None);
    }

    #[test]
    fn pieces_respect_the_scope_operator() {
        let text = "TEST.VALUE:manager.Manager::PlaceOrder.Order";
        assert_eq!(piece_at(text, 0), Some((0, "TEST")));
        assert_eq!(piece_at(text, 5), Some((1, "VALUE")));
        assert_eq!(piece_at(text, 25), Some((3, "Manager::PlaceOrder")));
        assert_eq!(piece_at(text, 44), Some((4, "Order")));
        assert_eq!(piece_at(text, 45), None);
    }
}
