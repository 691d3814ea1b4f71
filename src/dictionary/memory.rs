use super::{
    CommandDictionary, DEFAULT_FATAL_KEYWORD, Dictionaries, EvrDefinition, EvrDictionary,
    FastHashMap, OpcodeFormatter, SequenceDictionary,
};
use crate::err::{DictionaryError, DictionaryResult};
use crate::utils::bytes;

use log::debug;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct InMemoryEvrDictionary {
    definitions: FastHashMap<u32, EvrDefinition>,
    fatal_keyword: String,
    save_source: bool,
}

impl Default for InMemoryEvrDictionary {
    fn default() -> Self {
        InMemoryEvrDictionary {
            definitions: FastHashMap::default(),
            fatal_keyword: DEFAULT_FATAL_KEYWORD.to_string(),
            save_source: false,
        }
    }
}

impl InMemoryEvrDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition, replacing any previous one with the same event id.
    pub fn with_definition(mut self, definition: EvrDefinition) -> Self {
        self.definitions.insert(definition.event_id, definition);
        self
    }

    /// Add a definition, refusing to overwrite an existing event id.
    pub fn insert(&mut self, definition: EvrDefinition) -> DictionaryResult<()> {
        if self.definitions.contains_key(&definition.event_id) {
            return Err(DictionaryError::DuplicateEventId(definition.event_id));
        }
        self.definitions.insert(definition.event_id, definition);
        Ok(())
    }

    pub fn with_fatal_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.fatal_keyword = keyword.into();
        self
    }

    pub fn with_save_source(mut self, save_source: bool) -> Self {
        self.save_source = save_source;
        self
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl EvrDictionary for InMemoryEvrDictionary {
    fn lookup(&self, event_id: u32) -> Option<&EvrDefinition> {
        self.definitions.get(&event_id)
    }

    fn fatal_level_keyword(&self) -> &str {
        &self.fatal_keyword
    }

    fn save_source(&self) -> bool {
        self.save_source
    }
}

/// Normalize an opcode key to the prefix-less hex `formatter` produces, so `0x1` matches `0001`.
fn opcode_key(opcode: &str, formatter: &HexOpcodeFormatter) -> String {
    let trimmed = opcode.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    match u64::from_str_radix(digits, 16) {
        Ok(value) => formatter.format(value, false),
        Err(_) => digits.to_ascii_uppercase(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCommandDictionary {
    stems: FastHashMap<String, String>,
    formatter: HexOpcodeFormatter,
}

impl InMemoryCommandDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pad keys to `digits` hex digits. Must match the width of the opcode formatter in use.
    pub fn with_opcode_digits(mut self, digits: usize) -> Self {
        self.formatter = HexOpcodeFormatter::new(digits, false);
        let formatter = self.formatter;
        self.stems = self
            .stems
            .into_iter()
            .map(|(k, v)| (opcode_key(&k, &formatter), v))
            .collect();
        self
    }

    pub fn with_stem(mut self, opcode: &str, stem: impl Into<String>) -> Self {
        self.stems.insert(opcode_key(opcode, &self.formatter), stem.into());
        self
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for InMemoryCommandDictionary {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let formatter = HexOpcodeFormatter::default();
        InMemoryCommandDictionary {
            stems: iter
                .into_iter()
                .map(|(k, v)| (opcode_key(k.as_ref(), &formatter), v.into()))
                .collect(),
            formatter,
        }
    }
}

impl CommandDictionary for InMemoryCommandDictionary {
    fn opcode_to_stem_map(&self) -> &FastHashMap<String, String> {
        &self.stems
    }
}

/// Sequence names keyed by the numeric sequence id.
#[derive(Debug, Clone, Default)]
pub struct InMemorySequenceDictionary {
    names: FastHashMap<u32, String>,
}

impl InMemorySequenceDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, sequence_id: u32, name: impl Into<String>) -> Self {
        self.names.insert(sequence_id, name.into());
        self
    }
}

impl SequenceDictionary for InMemorySequenceDictionary {
    fn name_for_sequence_id_bytes(&self, raw: &[u8]) -> DictionaryResult<Option<String>> {
        let id = bytes::fold_be(raw)
            .filter(|_| raw.len() <= 4)
            .ok_or_else(|| {
                DictionaryError::Lookup(format!(
                    "sequence id must be 1 to 4 bytes, got {}",
                    raw.len()
                ))
            })?;
        Ok(self.names.get(&(id as u32)).cloned())
    }
}

/// Formats opcodes as zero-padded upper-case hex, `0x1A2B` style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexOpcodeFormatter {
    digits: usize,
    hide: bool,
}

impl Default for HexOpcodeFormatter {
    fn default() -> Self {
        HexOpcodeFormatter {
            digits: 4,
            hide: false,
        }
    }
}

impl HexOpcodeFormatter {
    pub fn new(digits: usize, hide: bool) -> Self {
        HexOpcodeFormatter { digits, hide }
    }
}

impl OpcodeFormatter for HexOpcodeFormatter {
    fn format(&self, opcode: u64, with_prefix: bool) -> String {
        let width = self.digits;
        if with_prefix {
            format!("0x{opcode:0width$X}")
        } else {
            format!("{opcode:0width$X}")
        }
    }

    fn hide_opcode(&self) -> bool {
        self.hide
    }
}

/// A complete set of dictionaries in one JSON document.
///
/// ```json
/// {
///   "fatal_keyword": "FATAL",
///   "hide_opcodes": false,
///   "evrs": [
///     { "event_id": 42, "name": "PWR_STATE", "level": "ACTIVITY_LO",
///       "format_template": "State is %d",
///       "args": [ { "name": "state", "kind": "ENUM", "enumeration": { "0": "OFF", "1": "ON" } } ] }
///   ],
///   "commands": { "0x0101": "PWR_ON" },
///   "sequences": { "7": "SEQ_A" }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DictionaryBundle {
    pub fatal_keyword: Option<String>,
    pub save_source: bool,
    pub hide_opcodes: bool,
    pub opcode_digits: Option<usize>,
    pub evrs: Vec<EvrDefinition>,
    pub commands: Option<FastHashMap<String, String>>,
    pub sequences: Option<FastHashMap<u32, String>>,
}

impl DictionaryBundle {
    pub fn from_json_str(json: &str) -> DictionaryResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> DictionaryResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| DictionaryError::FailedToOpenFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(serde_json::from_reader(BufReader::new(f))?)
    }

    /// Build the shared collaborators. Duplicate event ids are rejected.
    pub fn into_dictionaries(self) -> DictionaryResult<Dictionaries> {
        let mut evr = InMemoryEvrDictionary::new().with_save_source(self.save_source);
        if let Some(keyword) = self.fatal_keyword {
            evr = evr.with_fatal_keyword(keyword);
        }
        for definition in self.evrs {
            evr.insert(definition)?;
        }
        debug!("Loaded {} EVR definitions", evr.len());

        let digits = self.opcode_digits.unwrap_or(4);
        let formatter = HexOpcodeFormatter::new(digits, self.hide_opcodes);
        let mut dictionaries = Dictionaries::new(Arc::new(evr)).with_opcode_formatter(Arc::new(formatter));

        if let Some(commands) = self.commands {
            debug!("Loaded {} command stems", commands.len());
            let commands = commands
                .into_iter()
                .collect::<InMemoryCommandDictionary>()
                .with_opcode_digits(digits);
            dictionaries = dictionaries.with_commands(Arc::new(commands));
        }
        if let Some(sequences) = self.sequences {
            let names = InMemorySequenceDictionary {
                names: sequences.into_iter().collect(),
            };
            dictionaries = dictionaries.with_sequences(Arc::new(names));
        }

        Ok(dictionaries)
    }
}
