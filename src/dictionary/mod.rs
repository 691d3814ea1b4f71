//! Read-only lookups the decoder consults: EVR definitions, command stems, sequence names and
//! opcode formatting.
//!
//! Dictionaries are loaded once and shared between worker threads, so every collaborator is
//! `Send + Sync` and handed around as an `Arc<dyn ...>`.

mod memory;

pub use self::memory::{
    DictionaryBundle, HexOpcodeFormatter, InMemoryCommandDictionary, InMemoryEvrDictionary,
    InMemorySequenceDictionary,
};

use crate::err::DictionaryResult;

use hashbrown::HashMap as FastMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub(crate) type FastHashMap<K, V> = FastMap<K, V, ahash::RandomState>;

/// Level keyword that marks an EVR as fatal unless the dictionary says otherwise.
pub const DEFAULT_FATAL_KEYWORD: &str = "FATAL";

/// The declared type of one EVR argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArgumentKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
    FixedString,
    VarString,
    #[serde(alias = "ENUM")]
    Enumeration,
    Opcode,
    #[serde(alias = "SEQID")]
    SequenceId,
}

/// Symbolic names for the integer codes of an enumerated argument.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnumerationTable {
    values: FastHashMap<i64, String>,
}

impl EnumerationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, code: i64, symbol: impl Into<String>) -> Self {
        self.values.insert(code, symbol.into());
        self
    }

    pub fn symbol(&self, code: i64) -> Option<&str> {
        self.values.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(i64, S)> for EnumerationTable {
    fn from_iter<T: IntoIterator<Item = (i64, S)>>(iter: T) -> Self {
        EnumerationTable {
            values: iter.into_iter().map(|(k, v)| (k, v.into())).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentSpec {
    #[serde(default)]
    pub name: String,
    pub kind: ArgumentKind,
    #[serde(default)]
    pub declared_length: Option<u8>,
    #[serde(default)]
    pub enumeration: Option<EnumerationTable>,
}

impl ArgumentSpec {
    pub fn new(name: impl Into<String>, kind: ArgumentKind) -> Self {
        ArgumentSpec {
            name: name.into(),
            kind,
            declared_length: None,
            enumeration: None,
        }
    }

    pub fn with_declared_length(mut self, length: u8) -> Self {
        self.declared_length = Some(length);
        self
    }

    pub fn with_enumeration(mut self, table: EnumerationTable) -> Self {
        self.enumeration = Some(table);
        self
    }
}

/// Dictionary entry for one event id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvrDefinition {
    pub event_id: u32,
    #[serde(default)]
    pub name: String,
    pub level: String,
    #[serde(alias = "format")]
    pub format_template: String,
    #[serde(default)]
    pub args: Vec<ArgumentSpec>,
}

impl EvrDefinition {
    pub fn new(
        event_id: u32,
        name: impl Into<String>,
        level: impl Into<String>,
        format_template: impl Into<String>,
    ) -> Self {
        EvrDefinition {
            event_id,
            name: name.into(),
            level: level.into(),
            format_template: format_template.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: ArgumentSpec) -> Self {
        self.args.push(arg);
        self
    }

    /// Placeholder attached to records whose event id is not in the dictionary.
    pub fn unknown(event_id: u32) -> Self {
        EvrDefinition::new(event_id, "", "UNKNOWN", "")
    }

    /// Fatal levels are matched case-insensitively against the dictionary's keyword.
    pub fn is_fatal(&self, fatal_keyword: &str) -> bool {
        self.level.eq_ignore_ascii_case(fatal_keyword)
    }
}

pub trait EvrDictionary: Send + Sync {
    fn lookup(&self, event_id: u32) -> Option<&EvrDefinition>;

    fn fatal_level_keyword(&self) -> &str {
        DEFAULT_FATAL_KEYWORD
    }

    /// Whether a leading `(source)` tag should be moved from the message into metadata.
    fn save_source(&self) -> bool {
        false
    }
}

pub trait CommandDictionary: Send + Sync {
    /// Command stems keyed by upper-case hex opcode, without a `0x` prefix.
    fn opcode_to_stem_map(&self) -> &FastHashMap<String, String>;
}

pub trait SequenceDictionary: Send + Sync {
    fn name_for_sequence_id_bytes(&self, bytes: &[u8]) -> DictionaryResult<Option<String>>;
}

pub trait OpcodeFormatter: Send + Sync {
    fn format(&self, opcode: u64, with_prefix: bool) -> String;

    fn hide_opcode(&self) -> bool;

    fn strip_hex_prefix<'a>(&self, opcode: &'a str) -> &'a str {
        opcode
            .strip_prefix("0x")
            .or_else(|| opcode.strip_prefix("0X"))
            .unwrap_or(opcode)
    }
}

/// The set of collaborators an extractor decodes against.
///
/// Clones share the one-time "dictionary missing" warnings, so a process that builds several
/// extractors from the same set only warns once.
#[derive(Clone)]
pub struct Dictionaries {
    pub evr: Arc<dyn EvrDictionary>,
    pub commands: Option<Arc<dyn CommandDictionary>>,
    pub sequences: Option<Arc<dyn SequenceDictionary>>,
    pub opcode_formatter: Arc<dyn OpcodeFormatter>,
    pub(crate) missing_commands_warned: Arc<AtomicBool>,
    pub(crate) missing_sequences_warned: Arc<AtomicBool>,
}

impl Dictionaries {
    /// Only an EVR dictionary; opcodes are formatted but never resolved.
    pub fn new(evr: Arc<dyn EvrDictionary>) -> Self {
        Dictionaries {
            evr,
            commands: None,
            sequences: None,
            opcode_formatter: Arc::new(HexOpcodeFormatter::default()),
            missing_commands_warned: Arc::new(AtomicBool::new(false)),
            missing_sequences_warned: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_commands(mut self, commands: Arc<dyn CommandDictionary>) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn with_sequences(mut self, sequences: Arc<dyn SequenceDictionary>) -> Self {
        self.sequences = Some(sequences);
        self
    }

    pub fn with_opcode_formatter(mut self, formatter: Arc<dyn OpcodeFormatter>) -> Self {
        self.opcode_formatter = formatter;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_keyword_is_case_insensitive() {
        let def = EvrDefinition::new(1, "BOOM", "Fatal", "boom");
        assert!(def.is_fatal("FATAL"));
        assert!(!def.is_fatal("WARNING_HI"));
        assert_eq!(EvrDefinition::unknown(9).level, "UNKNOWN");
    }

    #[test]
    fn test_enumeration_table() {
        let table: EnumerationTable = [(0, "OFF"), (1, "ON")].into_iter().collect();
        assert_eq!(table.symbol(1), Some("ON"));
        assert_eq!(table.symbol(2), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_argument_kind_names() {
        let kinds: Vec<ArgumentKind> =
            serde_json::from_str(r#"["U32", "ENUM", "SEQID", "FIXED_STRING", "OPCODE"]"#).unwrap();
        assert_eq!(
            kinds,
            vec![
                ArgumentKind::U32,
                ArgumentKind::Enumeration,
                ArgumentKind::SequenceId,
                ArgumentKind::FixedString,
                ArgumentKind::Opcode
            ]
        );
    }

    #[test]
    fn test_default_strip_hex_prefix() {
        let formatter = HexOpcodeFormatter::default();
        assert_eq!(formatter.strip_hex_prefix("0x1A2B"), "1A2B");
        assert_eq!(formatter.strip_hex_prefix("0X1A2B"), "1A2B");
        assert_eq!(formatter.strip_hex_prefix("1A2B"), "1A2B");
    }
}
