use ropey::Rope;
use tower_lsp::lsp_types::{Position, TextDocumentContentChangeEvent};

// LSP positions count UTF-16 units; the rope indexes chars. Positions past the end
// of a line clamp to the line end, positions past the last line to the buffer end.
pub(crate) fn position_to_char_idx(text: &Rope, pos: Position) -> usize {
    let line_idx = pos.line as usize;
    if line_idx >= text.len_lines() {
        return text.len_chars();
    }
    let line_start = text.line_to_char(line_idx);
    let line = text.line(line_idx);
    let target = pos.character as usize;

    if let Some(s) = line.as_str() {
        if s.is_ascii() {
            return line_start + target.min(content_len(s));
        }
    }

    let mut units = 0usize;
    let mut chars = 0usize;
    for ch in line.chars() {
        if ch == '\n' || ch == '\r' {
            break;
        }
        let width = ch.len_utf16();
        if units + width > target {
            break;
        }
        units += width;
        chars += 1;
    }
    line_start + chars
}

// Line length without its terminator.
fn content_len(line: &str) -> usize {
    line.trim_end_matches(['\n', '\r']).len()
}

// Applies one change event; a change without a range replaces the buffer.
pub(crate) fn apply_change(text: &mut Rope, change: &TextDocumentContentChangeEvent) {
    let Some(range) = &change.range else {
        *text = Rope::from_str(&change.text);
        return;
    };
    let a = position_to_char_idx(text, range.start);
    let b = position_to_char_idx(text, range.end);
    let (start, end) = if a <= b { (a, b) } else { (b, a) };
    if start != end {
        text.remove(start..end);
    }
    if !change.text.is_empty() {
        text.insert(start, &change.text);
    }
}

/// Immutable engine snapshot of the live buffer.
pub(crate) fn snapshot(text: &Rope) -> tst_core::Document {
    tst_core::Document::from_text(&text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::Range;

    fn edit(start: (u32, u32), end: (u32, u32), text: &str) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent {
            range: Some(Range::new(Position::new(start.0, start.1), Position::new(end.0, end.1))),
            range_length: None,
            text: text.to_string(),
        }
    }

    #[test]
    fn positions_clamp_to_the_line() {
        let rope = Rope::from_str("TEST.NEW\nTEST.END\n");
        assert_eq!(position_to_char_idx(&rope, Position::new(0, 4)), 4);
        assert_eq!(position_to_char_idx(&rope, Position::new(0, 99)), 8);
        assert_eq!(position_to_char_idx(&rope, Position::new(1, 0)), 9);
        assert_eq!(position_to_char_idx(&rope, Position::new(9, 0)), rope.len_chars());
    }

    #[test]
    fn surrogate_pairs_count_twice() {
        let rope = Rope::from_str("TEST.NAME:\u{1F600}x\n");
        // the emoji spans columns 10..12
        assert_eq!(position_to_char_idx(&rope, Position::new(0, 12)), 11);
        assert_eq!(position_to_char_idx(&rope, Position::new(0, 13)), 12);
    }

    #[test]
    fn incremental_edits_apply_in_order() {
        let mut rope = Rope::from_str("TEST.UNIT:\nTEST.NEW\n");
        apply_change(&mut rope, &edit((0, 10), (0, 10), "manager"));
        apply_change(&mut rope, &edit((1, 5), (1, 8), "REPLACE"));
        assert_eq!(rope.to_string(), "TEST.UNIT:manager\nTEST.REPLACE\n");
    }

    #[test]
    fn full_change_replaces_everything() {
        let mut rope = Rope::from_str("old");
        apply_change(
            &mut rope,
            &TextDocumentContentChangeEvent {
                range: None,
                range_length: None,
                text: "TEST.NOTES:\n".into(),
            },
        );
        assert_eq!(snapshot(&rope).len(), 2);
    }

    #[test]
    fn snapshot_drops_carriage_returns() {
        let rope = Rope::from_str("TEST.UNIT:manager\r\nTEST.NEW\r\n");
        let doc = snapshot(&rope);
        assert_eq!(doc.line(0).map(|l| l.text.as_str()), Some("TEST.UNIT:manager"));
    }
}
