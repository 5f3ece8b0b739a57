//! Line-level lexing of `TEST.<KEYWORD>[:<value>]` commands.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::blocks::BlockKind;
use rustc_hash::FxHashMap;


static COMMAND_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?i:TEST)\.([A-Za-z0-9_]*)[ \t]*(:)?").expect("command pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Keyword {
    ScriptFeature,
    Unit,
    Subprogram,
    New,
    Replace,
    Add,
    End,
    Name,
    Notes,
    EndNotes,
    Flow,
    EndFlow,
    Value,
    Slot,
    Expected,
    Stub,
    RequirementKey,
    ValueUserCode,
    EndValueUserCode,
    ExpectedUserCode,
    EndExpectedUserCode,
    ImportFailures,
    EndImportFailures,
    CompoundOnly,
    CodedTestFile,
}

impl Keyword {
    /// Every command the script language accepts, in the order offered after `TEST.`.
    pub const ALL: [Keyword; 25] = [
        Keyword::ScriptFeature,
        Keyword::Unit,
        Keyword::Subprogram,
        Keyword::New,
        Keyword::Replace,
        Keyword::Add,
        Keyword::End,
        Keyword::Name,
        Keyword::Notes,
        Keyword::EndNotes,
        Keyword::Flow,
        Keyword::EndFlow,
        Keyword::Value,
        Keyword::Slot,
        Keyword::Expected,
        Keyword::Stub,
        Keyword::RequirementKey,
        Keyword::ValueUserCode,
        Keyword::EndValueUserCode,
        Keyword::ExpectedUserCode,
        Keyword::EndExpectedUserCode,
        Keyword::ImportFailures,
        Keyword::EndImportFailures,
        Keyword::CompoundOnly,
        Keyword::CodedTestFile,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::ScriptFeature => "SCRIPT_FEATURE",
            Keyword::Unit => "UNIT",
            Keyword::Subprogram => "SUBPROGRAM",
            Keyword::New => "NEW",
            Keyword::Replace => "REPLACE",
            Keyword::Add => "ADD",
            Keyword::End => "END",
            Keyword::Name => "NAME",
            Keyword::Notes => "NOTES",
            Keyword::EndNotes => "END_NOTES",
            Keyword::Flow => "FLOW",
            Keyword::EndFlow => "END_FLOW",
            Keyword::Value => "VALUE",
            Keyword::Slot => "SLOT",
            Keyword::Expected => "EXPECTED",
            Keyword::Stub => "STUB",
            Keyword::RequirementKey => "REQUIREMENT_KEY",
            Keyword::ValueUserCode => "VALUE_USER_CODE",
            Keyword::EndValueUserCode => "END_VALUE_USER_CODE",
            Keyword::ExpectedUserCode => "EXPECTED_USER_CODE",
            Keyword::EndExpectedUserCode => "END_EXPECTED_USER_CODE",
            Keyword::ImportFailures => "IMPORT_FAILURES",
            Keyword::EndImportFailures => "END_IMPORT_FAILURES",
            Keyword::CompoundOnly => "COMPOUND_ONLY",
            Keyword::CodedTestFile => "CODED_TEST_FILE",
        }
    }

    /// Case-insensitive lookup of a command name.
    pub fn lookup(name: &str) -> Option<Keyword> {
        static BY_NAME: Lazy<FxHashMap<&'static str, Keyword>> = Lazy::new(|| {
            let mut map = FxHashMap::with_capacity_and_hasher(Keyword::ALL.len(), Default::default());
            for kw in Keyword::ALL {
                map.insert(kw.as_str(), kw);
            }
            map
        });
        BY_NAME.get(name.to_ascii_uppercase().as_str()).copied()
    }

    /// Commands that may appear outside a `TEST.NEW | REPLACE | ADD ... TEST.END` test.
    pub fn is_file_scope(self) -> bool {
        matches!(
            self,
            Keyword::ScriptFeature
                | Keyword::Unit
                | Keyword::Subprogram
                | Keyword::New
                | Keyword::Replace
                | Keyword::Add
                | Keyword::End
        )
    }

    pub fn starts_test(self) -> bool {
        matches!(self, Keyword::New | Keyword::Replace | Keyword::Add)
    }

    pub fn opens_block(self) -> Option<BlockKind> {
        match self {
            Keyword::Notes => Some(BlockKind::Notes),
            Keyword::Flow => Some(BlockKind::Flow),
            Keyword::ValueUserCode => Some(BlockKind::ValueUserCode),
            Keyword::ExpectedUserCode => Some(BlockKind::ExpectedUserCode),
            Keyword::ImportFailures => Some(BlockKind::ImportFailures),
            _ => None,
        }
    }

    pub fn closes_block(self) -> Option<BlockKind> {
        BlockKind::ALL.into_iter().find(|kind| kind.terminator() == self)
    }

    /// Fields whose value is a `unit.function.parameter...` path resolved one segment at a time.
    pub fn is_dotted_path(self) -> bool {
        matches!(self, Keyword::Value | Keyword::Expected)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TEST.{}", self.as_str())
    }
}

pub const SCRIPT_FEATURES: [&str; 18] = [
    "ACCEPTING_MISSING_CONST",
    "ADA_DIRECT_ARRAY_INDEXING",
    "C_DIRECT_ARRAY_INDEXING",
    "REMOVED_CL_PREFIX",
    "CPP_CLASS_OBJECT_REVISION",
    "DATA_SPACING_FORMAT",
    "FULL_PARAMETER_TYPES",
    "IGNORE_NAME_VALUE_ERRORS",
    "MIXED_CASE_NAMES",
    "MULTIPLE_UUT_SUPPORT",
    "OVERLOADED_CONST_SUPPORT",
    "STANDARD_SPACING_R2",
    "STRUCT_BASE_CTOR_ADDS_POINTER",
    "STRUCT_DTOR_ADDS_POINTER",
    "STRUCT_FIELD_CTOR_ADDS_POINTER",
    "STATIC_HEADER_FUNCS_IN_UUTS",
    "UNDERSCORE_NULLPTR",
    "VCAST_MAIN_NOT_RENAMED",
];

/// Subprogram names that are not functions of a unit.
pub const SPECIAL_SUBPROGRAMS: [&str; 2] = ["<<INIT>>", "<<COMPOUND>>"];

pub const CODED_TESTS_DRIVER: &str = "coded_tests_driver";

/// One line matching the command pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command name as typed, upper-cased. Empty for a bare `TEST.`.
    pub name: String,
    pub keyword: Option<Keyword>,
    /// Text after the field separator, untrimmed. `None` when there is no separator.
    pub value: Option<String>,
    pub line: usize,
    /// Byte offset of the command name inside the line.
    pub name_start: usize,
    /// Byte offset of the field separator inside the line.
    pub separator: Option<usize>,
}

impl Command {
    pub fn parse(text: &str, line: usize) -> Option<Command> {
        let lead = text.len() - text.trim_start().len();
        let body = &text[lead..];
        let caps = COMMAND_PATTERN.captures(body)?;
        let name_match = caps.get(1)?;
        let name = name_match.as_str().to_ascii_uppercase();
        let separator = caps.get(2).map(|m| lead + m.start());
        let value = separator.map(|sep| text[sep + 1..].to_string());
        Some(Command {
            keyword: Keyword::lookup(&name),
            name,
            value,
            line,
            name_start: lead + name_match.start(),
            separator,
        })
    }

    pub fn is(&self, keyword: Keyword) -> bool {
        self.keyword == Some(keyword)
    }

    /// Trimmed value, `None` when absent or blank.
    pub fn trimmed_value(&self) -> Option<&str> {
        self.value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }
}
