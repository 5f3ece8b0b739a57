//! Maps a cursor position to the grammar context used by completion.
//!
//! Only the text before the cursor on the cursor line is consulted, plus the
//! block snapshot for the whole document.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::blocks::{BlockKind, BlockMap};
use crate::command::{Command, Keyword};
use crate::document::Document;
use crate::text::{Position, Range, column_at, utf16_len};


static VMOCK_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*//\s*vmock(?:\s+(.*))?$").expect("vmock pattern"));

/// Characters an editor may send as the completion trigger.
pub const TRIGGER_CHARACTERS: [char; 6] = ['\n', ':', '.', ',', ' ', '='];

/// Which lexical domain the buffer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LexicalMode {
    /// `.tst` script files.
    Script,
    /// C++ coded-test sources where only `// vmock` comments are recognized.
    EmbeddedComment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextKind {
    TopLevelCommand,
    CommandValue,
    NotesBody,
    VmockComment,
    /// Nothing the engine can complete: comments, a colon after an unknown command,
    /// a non-vmock line in a source file, a cursor past the end of the document.
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionContext {
    pub kind: ContextKind,
    /// Line text from just after the last unescaped `:` (or line start) to the cursor.
    pub prefix_text: String,
    pub trigger_char: Option<char>,
    pub subprogram_context: Option<String>,
    pub unit_context: Option<String>,
    pub position: Position,
    /// Whole line up to the cursor.
    pub line_so_far: String,
    /// Span of the token the cursor is completing.
    pub replace_range: Range,
    /// Field keyword for `CommandValue` contexts.
    pub field: Option<Keyword>,
    /// Value typed after the field separator so far.
    pub field_value: String,
    /// Free-text block holding the line for `NotesBody` contexts.
    pub block: Option<BlockKind>,
    /// Whitespace-delimited tokens after `// vmock`; a trailing empty token means
    /// the cursor sits after whitespace and starts a new token.
    pub vmock_tokens: Vec<String>,
}

impl CompletionContext {
    fn empty(kind: ContextKind, position: Position) -> Self {
        Self {
            kind,
            prefix_text: String::new(),
            trigger_char: None,
            subprogram_context: None,
            unit_context: None,
            position,
            line_so_far: String::new(),
            replace_range: Range::single(position),
            field: None,
            field_value: String::new(),
            block: None,
            vmock_tokens: Vec::new(),
        }
    }

    /// Segments of a dotted field value typed so far; the last one is the partial segment.
    pub fn path_segments(&self) -> Vec<&str> {
        self.field_value.split('.').collect()
    }

    /// Number of completed `.` steps in the field value.
    pub fn path_depth(&self) -> usize {
        self.field_value.matches('.').count()
    }

    /// Partial command name for `TopLevelCommand` contexts.
    pub fn keyword_partial(&self) -> &str {
        let trimmed = self.line_so_far.trim_start();
        match trimmed.get(..5) {
            Some(head) if head.eq_ignore_ascii_case("TEST.") => &trimmed[5..],
            _ => trimmed,
        }
    }

    /// Whether the partial line already carries the `TEST.` prefix.
    pub fn has_test_prefix(&self) -> bool {
        let trimmed = self.line_so_far.trim_start();
        trimmed.get(..5).is_some_and(|h| h.eq_ignore_ascii_case("TEST."))
    }
}

/// Byte index of the last field separator in `text`: a `:` that is neither escaped
/// with a backslash nor half of a `::` scope operator.
pub fn last_unescaped_colon(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    (0..bytes.len()).rev().find(|&i| {
        bytes[i] == b':'
            && (i == 0 || (bytes[i - 1] != b'\\' && bytes[i - 1] != b':'))
            && bytes.get(i + 1) != Some(&b':')
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContextResolver;

impl ContextResolver {
    pub fn resolve(document: &Document, position: Position, mode: LexicalMode) -> CompletionContext {
        let blocks = BlockMap::scan(document);
        Self::resolve_with(document, &blocks, position, mode, None)
    }

    /// Resolve against a precomputed block snapshot. `trigger` is the character the
    /// host reported, if any; otherwise it is inferred from the text before the cursor.
    pub fn resolve_with(
        document: &Document,
        blocks: &BlockMap,
        position: Position,
        mode: LexicalMode,
        trigger: Option<char>,
    ) -> CompletionContext {
        let Some(line_so_far) = document.line_so_far(position) else {
            return CompletionContext::empty(ContextKind::Unrecognized, position);
        };
        let line_index = position.line as usize;
        let cursor = Position::new(position.line, utf16_len(line_so_far));

        let mut ctx = CompletionContext::empty(ContextKind::Unrecognized, cursor);
        ctx.line_so_far = line_so_far.to_string();
        ctx.trigger_char = trigger.or_else(|| line_so_far.chars().last().filter(|c| TRIGGER_CHARACTERS.contains(c)));
        let separator = last_unescaped_colon(line_so_far);
        let prefix_start = separator.map_or(0, |i| i + 1);
        ctx.prefix_text = line_so_far[prefix_start..].to_string();
        ctx.replace_range = Range::new(Position::new(position.line, column_at(line_so_far, prefix_start)), cursor);

        match mode {
            LexicalMode::EmbeddedComment => resolve_vmock(&mut ctx, line_so_far),
            LexicalMode::Script => {
                ctx.subprogram_context = blocks.subprogram_at(line_index).map(str::to_string);
                ctx.unit_context = blocks.unit_at(line_index).map(str::to_string);
                if let Some(kind) = blocks.block_at(line_index) {
                    ctx.kind = ContextKind::NotesBody;
                    ctx.block = Some(kind);
                } else {
                    resolve_script(&mut ctx, line_so_far, line_index, separator);
                }
            }
        }
        ctx
    }
}

fn resolve_script(ctx: &mut CompletionContext, line_so_far: &str, line_index: usize, separator: Option<usize>) {
    let line = ctx.position.line;
    let command = Command::parse(line_so_far, line_index);
    match (command, separator) {
        (Some(cmd), _) if cmd.separator.is_some() => {
            let Some(keyword) = cmd.keyword else { return };
            let value_start = cmd.separator.map_or(0, |s| s + 1);
            ctx.kind = ContextKind::CommandValue;
            ctx.field = Some(keyword);
            ctx.field_value = line_so_far[value_start..].to_string();
            if keyword.is_dotted_path() {
                // each `.` narrows the scope; only the last segment is replaced
                let floor = line_so_far.len() - ctx.prefix_text.len();
                if let Some(dot) = line_so_far[floor..].rfind('.') {
                    ctx.replace_range.start = Position::new(line, column_at(line_so_far, floor + dot + 1));
                }
            }
        }
        (Some(_), Some(_)) => {}
        (_, None) => {
            let trimmed = line_so_far.trim_start();
            if trimmed.starts_with("--") || trimmed.starts_with("//") {
                return;
            }
            let looks_like_command = (trimmed.len() <= 5 && "TEST.".starts_with(&trimmed.to_ascii_uppercase()))
                || ctx.has_test_prefix();
            if !looks_like_command {
                return;
            }
            ctx.kind = ContextKind::TopLevelCommand;
            let lead = line_so_far.len() - trimmed.len();
            let start = if ctx.has_test_prefix() { lead + 5 } else { lead };
            ctx.replace_range.start = Position::new(line, column_at(line_so_far, start));
        }
        (None, Some(_)) => {}
    }
}

fn resolve_vmock(ctx: &mut CompletionContext, line_so_far: &str) {
    let Some(caps) = VMOCK_COMMENT.captures(line_so_far) else {
        return;
    };
    ctx.kind = ContextKind::VmockComment;
    let rest = caps.get(1).map_or("", |m| m.as_str());
    let mut tokens: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
    let ends_in_space = line_so_far.ends_with(char::is_whitespace);
    if ends_in_space || tokens.is_empty() {
        tokens.push(String::new());
    }
    let partial_len = tokens.last().map_or(0, |t| t.len());
    let start = line_so_far.len() - partial_len;
    ctx.replace_range.start = Position::new(ctx.position.line, column_at(line_so_far, start));
    ctx.vmock_tokens = tokens;
}
