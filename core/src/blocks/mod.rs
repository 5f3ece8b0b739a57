//! Single forward pass over a script that recovers free-text block structure
//! and threads the current unit / subprogram through every line.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::command::{Command, Keyword};
use crate::document::Document;


/// Regions whose body is free text rather than commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockKind {
    Notes,
    Flow,
    ValueUserCode,
    ExpectedUserCode,
    ImportFailures,
}

impl BlockKind {
    pub const ALL: [BlockKind; 5] = [
        BlockKind::Notes,
        BlockKind::Flow,
        BlockKind::ValueUserCode,
        BlockKind::ExpectedUserCode,
        BlockKind::ImportFailures,
    ];

    pub fn opener(self) -> Keyword {
        match self {
            BlockKind::Notes => Keyword::Notes,
            BlockKind::Flow => Keyword::Flow,
            BlockKind::ValueUserCode => Keyword::ValueUserCode,
            BlockKind::ExpectedUserCode => Keyword::ExpectedUserCode,
            BlockKind::ImportFailures => Keyword::ImportFailures,
        }
    }

    pub fn terminator(self) -> Keyword {
        match self {
            BlockKind::Notes => Keyword::EndNotes,
            BlockKind::Flow => Keyword::EndFlow,
            BlockKind::ValueUserCode => Keyword::EndValueUserCode,
            BlockKind::ExpectedUserCode => Keyword::EndExpectedUserCode,
            BlockKind::ImportFailures => Keyword::EndImportFailures,
        }
    }

    pub fn label(self) -> &'static str {
        self.opener().as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    /// Line holding the opening command.
    pub start: usize,
    /// Line holding the terminator; `None` while the block runs to end of document.
    pub end: Option<usize>,
}

impl Block {
    pub fn contains_body_line(&self, line: usize) -> bool {
        line > self.start && self.end.is_none_or(|end| line < end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    NestedCommand(BlockKind),
    StrayTerminator(BlockKind),
    Unterminated(BlockKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub line: usize,
    pub kind: FindingKind,
}

impl Finding {
    pub fn message(&self) -> String {
        match self.kind {
            FindingKind::NestedCommand(kind) => {
                format!("Commands cannot be nested in a \"{}\" block", kind.label())
            }
            FindingKind::StrayTerminator(kind) => format!(
                "TEST.{} has no matching TEST.{}",
                kind.terminator().as_str(),
                kind.label()
            ),
            FindingKind::Unterminated(kind) => format!(
                "\"{}\" block is not closed by TEST.{}",
                kind.label(),
                kind.terminator().as_str()
            ),
        }
    }

    pub fn code(&self) -> &'static str {
        match self.kind {
            FindingKind::NestedCommand(_) => "nested-command",
            FindingKind::StrayTerminator(_) => "stray-terminator",
            FindingKind::Unterminated(_) => "unterminated-block",
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line + 1, self.message())
    }
}

/// What the scan knows about one line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineState {
    /// Nearest preceding (or own) `TEST.SUBPROGRAM` value.
    pub subprogram: Option<Arc<str>>,
    /// Nearest preceding (or own) `TEST.UNIT` value.
    pub unit: Option<Arc<str>>,
    /// Set when the line sits inside a block body.
    pub block: Option<BlockKind>,
    /// Whether the line is inside a test, judged before its own command takes effect.
    pub in_test: bool,
    pub command: Option<Command>,
}

/// Output of [`BlockTracker::scan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockMap {
    blocks: Vec<Block>,
    lines: Vec<LineState>,
    findings: Vec<Finding>,
}

impl BlockMap {
    pub fn scan(document: &Document) -> Self {
        BlockTracker::default().scan(document)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn line(&self, index: usize) -> Option<&LineState> {
        self.lines.get(index)
    }

    /// Number of lines the scan covered (bounded by the tracker's line cap).
    pub fn scanned_lines(&self) -> usize {
        self.lines.len()
    }

    pub fn subprogram_at(&self, index: usize) -> Option<&str> {
        self.line(index).and_then(|s| s.subprogram.as_deref())
    }

    pub fn unit_at(&self, index: usize) -> Option<&str> {
        self.line(index).and_then(|s| s.unit.as_deref())
    }

    pub fn block_at(&self, index: usize) -> Option<BlockKind> {
        self.line(index).and_then(|s| s.block)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BlockTracker {
    max_lines: usize,
}

impl Default for BlockTracker {
    fn default() -> Self {
        Self {
            max_lines: crate::config::DEFAULT_MAX_LINES,
        }
    }
}

impl BlockTracker {
    pub fn new(max_lines: usize) -> Self {
        Self { max_lines }
    }

    pub fn scan(&self, document: &Document) -> BlockMap {
        let mut map = BlockMap::default();
        let mut open: Option<usize> = None; // index into map.blocks
        let mut subprogram: Option<Arc<str>> = None;
        let mut unit: Option<Arc<str>> = None;
        let mut in_test = false;

        let limit = document.len().min(self.max_lines);
        let truncated = limit < document.len();
        if truncated {
            debug!(lines = document.len(), limit, "block scan truncated");
        }
        map.lines.reserve(limit);

        for line in &document.lines()[..limit] {
            let command = Command::parse(&line.text, line.index);
            let open_kind = open.map(|i| map.blocks[i].kind);
            let mut state = LineState {
                in_test,
                ..LineState::default()
            };

            match (open_kind, &command) {
                (Some(kind), Some(cmd)) if cmd.is(kind.terminator()) => {
                    if let Some(i) = open.take() {
                        map.blocks[i].end = Some(line.index);
                    }
                }
                (Some(kind), Some(_)) => {
                    state.block = Some(kind);
                    map.findings.push(Finding {
                        line: line.index,
                        kind: FindingKind::NestedCommand(kind),
                    });
                }
                (Some(kind), None) => state.block = Some(kind),
                (None, Some(cmd)) => match cmd.keyword {
                    Some(Keyword::Subprogram) => subprogram = cmd.trimmed_value().map(Arc::from),
                    Some(Keyword::Unit) => unit = cmd.trimmed_value().map(Arc::from),
                    Some(kw) if kw.starts_test() => in_test = true,
                    Some(Keyword::End) => in_test = false,
                    Some(kw) => {
                        if let Some(kind) = kw.opens_block() {
                            open = Some(map.blocks.len());
                            map.blocks.push(Block {
                                kind,
                                start: line.index,
                                end: None,
                            });
                        } else if let Some(kind) = kw.closes_block() {
                            map.findings.push(Finding {
                                line: line.index,
                                kind: FindingKind::StrayTerminator(kind),
                            });
                        }
                    }
                    None => {}
                },
                (None, None) => {}
            }

            state.subprogram = subprogram.clone();
            state.unit = unit.clone();
            state.command = command;
            map.lines.push(state);
        }

        // the terminator may sit past the cap
        if let Some(i) = open.filter(|_| !truncated) {
            let block = &map.blocks[i];
            map.findings.push(Finding {
                line: block.start,
                kind: FindingKind::Unterminated(block.kind),
            });
        }
        map
    }
}
