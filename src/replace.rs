//! Parameter replacement: turning raw enumeration codes, opcodes and sequence ids into names.
//!
//! Enumerations and opcodes substitute the value, so the specifier they were bound to is
//! rewritten as `%s`. Sequence ids keep their numeric value and get the name spliced in after
//! the specifier instead.

use crate::dictionary::{
    ArgumentKind, ArgumentSpec, CommandDictionary, Dictionaries, EvrDefinition, OpcodeFormatter,
    SequenceDictionary,
};
use crate::err::{BadEvrReason, ReplacementError, ReplacementResult};
use crate::raw_field::RawField;
use crate::template::{insert_after_specifier, rewrite_specifier_as_string};

use log::{trace, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shown in place of an opcode that has no command stem when opcodes are hidden.
pub const HIDDEN_OPCODE: &str = "<opcode hidden>";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReplacementInput<'a> {
    /// A signed value together with its width in bytes.
    Integer { value: i64, width: usize },
    Float(f64),
    Text(&'a str),
    Bytes(&'a [u8]),
}

impl ReplacementInput<'_> {
    fn kind_name(&self) -> &'static str {
        match self {
            ReplacementInput::Integer { .. } => "integer",
            ReplacementInput::Float(_) => "floating point",
            ReplacementInput::Text(_) => "text",
            ReplacementInput::Bytes(_) => "raw bytes",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// Replace the value with this text and rewrite its specifier as `%s`.
    Substitute(String),
    /// Keep the value and insert this text right after its specifier.
    Annotate(String),
    Unchanged,
}

pub trait ParameterReplacer: Send + Sync {
    fn name(&self) -> &'static str;

    fn replace(
        &self,
        input: ReplacementInput<'_>,
        arg: &ArgumentSpec,
    ) -> ReplacementResult<Replacement>;
}

fn invalid(replacer: &'static str, input: &ReplacementInput<'_>) -> ReplacementError {
    ReplacementError::InvalidArgument {
        replacer,
        got: input.kind_name(),
    }
}

/// Looks integer codes up in the argument's enumeration table.
#[derive(Debug, Default)]
pub struct EnumerationReplacer;

impl ParameterReplacer for EnumerationReplacer {
    fn name(&self) -> &'static str {
        "enumeration"
    }

    fn replace(
        &self,
        input: ReplacementInput<'_>,
        arg: &ArgumentSpec,
    ) -> ReplacementResult<Replacement> {
        let code = match input {
            ReplacementInput::Integer { value, .. } => value,
            other => return Err(invalid(self.name(), &other)),
        };
        let symbol = arg
            .enumeration
            .as_ref()
            .and_then(|table| table.symbol(code));
        Ok(Replacement::Substitute(match symbol {
            Some(symbol) => symbol.to_string(),
            None => code.to_string(),
        }))
    }
}

/// Resolves opcodes to command stems.
pub struct OpcodeReplacer {
    commands: Option<Arc<dyn CommandDictionary>>,
    formatter: Arc<dyn OpcodeFormatter>,
    warned_missing_dictionary: Arc<AtomicBool>,
}

impl OpcodeReplacer {
    pub fn new(
        commands: Option<Arc<dyn CommandDictionary>>,
        formatter: Arc<dyn OpcodeFormatter>,
    ) -> Self {
        OpcodeReplacer {
            commands,
            formatter,
            warned_missing_dictionary: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn sharing_warning(mut self, flag: Arc<AtomicBool>) -> Self {
        self.warned_missing_dictionary = flag;
        self
    }

    fn parse_text(text: &str) -> Option<u64> {
        let text = text.trim();
        let hex = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"));
        match hex {
            Some(digits) => u64::from_str_radix(digits, 16).ok(),
            None => text.parse().ok(),
        }
    }
}

impl ParameterReplacer for OpcodeReplacer {
    fn name(&self) -> &'static str {
        "opcode"
    }

    fn replace(
        &self,
        input: ReplacementInput<'_>,
        _arg: &ArgumentSpec,
    ) -> ReplacementResult<Replacement> {
        let opcode = match input {
            ReplacementInput::Integer { value, width } => mask_to_width(value, width),
            ReplacementInput::Text(text) => {
                Self::parse_text(text).ok_or_else(|| invalid(self.name(), &input))?
            }
            other => return Err(invalid(self.name(), &other)),
        };

        let formatted = self.formatter.format(opcode, true);
        let commands = match &self.commands {
            Some(commands) => commands,
            None => {
                if !self.warned_missing_dictionary.swap(true, Ordering::Relaxed) {
                    warn!("No command dictionary available, opcodes will not be resolved to stems");
                }
                return Ok(Replacement::Substitute(formatted));
            }
        };

        let key = self.formatter.strip_hex_prefix(&formatted);
        let text = match commands.opcode_to_stem_map().get(key) {
            Some(stem) => stem.clone(),
            None if self.formatter.hide_opcode() => HIDDEN_OPCODE.to_string(),
            None => formatted,
        };
        trace!("opcode {opcode:#x} resolved to {text}");
        Ok(Replacement::Substitute(text))
    }
}

/// Annotates sequence ids with their sequence name.
pub struct SequenceIdReplacer {
    sequences: Option<Arc<dyn SequenceDictionary>>,
    warned_missing_dictionary: Arc<AtomicBool>,
}

impl SequenceIdReplacer {
    pub fn new(sequences: Option<Arc<dyn SequenceDictionary>>) -> Self {
        SequenceIdReplacer {
            sequences,
            warned_missing_dictionary: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn sharing_warning(mut self, flag: Arc<AtomicBool>) -> Self {
        self.warned_missing_dictionary = flag;
        self
    }
}

impl ParameterReplacer for SequenceIdReplacer {
    fn name(&self) -> &'static str {
        "sequence id"
    }

    fn replace(
        &self,
        input: ReplacementInput<'_>,
        _arg: &ArgumentSpec,
    ) -> ReplacementResult<Replacement> {
        let bytes = match input {
            ReplacementInput::Bytes(bytes) => bytes,
            other => return Err(invalid(self.name(), &other)),
        };
        let sequences = match &self.sequences {
            Some(sequences) => sequences,
            None => {
                if !self.warned_missing_dictionary.swap(true, Ordering::Relaxed) {
                    warn!("No sequence dictionary available, sequence ids will not be resolved");
                }
                return Ok(Replacement::Unchanged);
            }
        };

        match sequences.name_for_sequence_id_bytes(bytes) {
            Ok(Some(name)) => Ok(Replacement::Annotate(format!("({name})"))),
            Ok(None) => Ok(Replacement::Unchanged),
            Err(e) => {
                trace!("sequence dictionary lookup failed: {e}");
                Ok(Replacement::Unchanged)
            }
        }
    }
}

fn mask_to_width(value: i64, width: usize) -> u64 {
    match width {
        1..=7 => (value as u64) & ((1u64 << (8 * width)) - 1),
        _ => value as u64,
    }
}

/// The three replacers an extractor applies, built from its dictionaries.
pub struct ParameterReplacers {
    enumeration: EnumerationReplacer,
    opcode: OpcodeReplacer,
    sequence_id: SequenceIdReplacer,
}

impl ParameterReplacers {
    pub fn new(dictionaries: &Dictionaries) -> Self {
        ParameterReplacers {
            enumeration: EnumerationReplacer,
            opcode: OpcodeReplacer::new(
                dictionaries.commands.clone(),
                Arc::clone(&dictionaries.opcode_formatter),
            )
            .sharing_warning(Arc::clone(&dictionaries.missing_commands_warned)),
            sequence_id: SequenceIdReplacer::new(dictionaries.sequences.clone())
                .sharing_warning(Arc::clone(&dictionaries.missing_sequences_warned)),
        }
    }

    pub fn for_kind(&self, kind: ArgumentKind) -> Option<&dyn ParameterReplacer> {
        match kind {
            ArgumentKind::Enumeration => Some(&self.enumeration),
            ArgumentKind::Opcode => Some(&self.opcode),
            ArgumentKind::SequenceId => Some(&self.sequence_id),
            _ => None,
        }
    }

    /// Run every applicable replacer over `fields`, returning the rewritten template.
    pub(crate) fn apply(
        &self,
        fields: &mut [RawField],
        template: &str,
        definition: &EvrDefinition,
    ) -> Result<String, BadEvrReason> {
        let mut template = template.to_string();

        for (i, (field, arg)) in fields.iter_mut().zip(&definition.args).enumerate() {
            let replacer = match self.for_kind(arg.kind) {
                Some(replacer) => replacer,
                None => continue,
            };

            let text;
            let input = match arg.kind {
                ArgumentKind::SequenceId => ReplacementInput::Bytes(field.bytes()),
                _ if field.logical_type().is_integer() => ReplacementInput::Integer {
                    value: field
                        .as_signed()
                        .map_err(|source| BadEvrReason::Field { index: i + 1, source })?,
                    width: field.bytes().len(),
                },
                _ => {
                    text = field.as_text().into_owned();
                    ReplacementInput::Text(&text)
                }
            };

            let replacement = replacer
                .replace(input, arg)
                .map_err(|source| BadEvrReason::Replacement { index: i + 1, source })?;
            trace!("{} replacement for parameter #{}: {:?}", replacer.name(), i + 1, replacement);

            match replacement {
                Replacement::Substitute(value) => {
                    field.replace_data(&value);
                    template = rewrite_specifier_as_string(&template, i + 1);
                }
                Replacement::Annotate(annotation) => {
                    template = insert_after_specifier(&template, &annotation, i + 1);
                }
                Replacement::Unchanged => {}
            }
        }

        Ok(template)
    }
}
