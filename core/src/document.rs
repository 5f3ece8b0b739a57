use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::text::{Position, byte_offset_at};

static ENVIRONMENT_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"--.*Environment.*:(.*)").expect("environment comment pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub index: usize,
    pub text: String,
}

/// Immutable snapshot of an open buffer. Cloning shares the line storage,
/// so a request can hold on to its snapshot across an await without
/// observing later edits.
#[derive(Debug, Clone, Default)]
pub struct Document {
    lines: Arc<[Line]>,
}

impl Document {
    pub fn from_text(text: &str) -> Self {
        let lines: Vec<Line> = text
            .split('\n')
            .enumerate()
            .map(|(index, raw)| Line {
                index,
                text: raw.strip_suffix('\r').unwrap_or(raw).to_string(),
            })
            .collect();
        Self { lines: lines.into() }
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Text of the cursor line up to (not including) the cursor column.
    pub fn line_so_far(&self, position: Position) -> Option<&str> {
        let line = self.line(position.line as usize)?;
        let end = byte_offset_at(&line.text, position.character);
        line.text.get(..end)
    }

    /// Environment named by the first `-- Environment: <name>` comment, if any.
    pub fn environment_name(&self) -> Option<String> {
        self.lines.iter().find_map(|line| {
            ENVIRONMENT_COMMENT
                .captures(&line.text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|name| !name.is_empty())
        })
    }

    pub fn to_text(&self) -> String {
        self.lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>().join("\n")
    }
}
