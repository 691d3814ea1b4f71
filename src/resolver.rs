//! Where argument types come from.
//!
//! Flight EVRs declare every argument in the dictionary. SSE EVRs only carry a message template,
//! so their argument types are inferred from its conversion letters and the wire lengths.

use crate::dictionary::{ArgumentKind, ArgumentSpec, EvrDefinition};
use crate::raw_field::LogicalType;

pub trait ArgumentTypeResolver: Send + Sync {
    /// Whether records decoded with this resolver come from simulation and support equipment.
    fn from_sse(&self) -> bool;

    /// Whether the wire parameter count must equal the dictionary's argument count.
    fn enforces_argument_count(&self) -> bool;

    /// A warning for a wire length that does not suit the argument's declared type.
    fn length_warning(&self, definition: &EvrDefinition, index: usize, length: u8) -> Option<String>;

    /// One logical type per parameter.
    ///
    /// `letters` are the conversion letters of the message template and `lengths` the wire
    /// lengths of the parameters that were scanned.
    fn resolve(&self, definition: &EvrDefinition, letters: &[char], lengths: &[u8]) -> Vec<LogicalType>;
}

/// Types come from the dictionary's argument list.
#[derive(Debug, Default, Clone, Copy)]
pub struct DictionaryTypeResolver;

impl DictionaryTypeResolver {
    pub fn logical_type(arg: &ArgumentSpec) -> LogicalType {
        match arg.kind {
            ArgumentKind::F32 => LogicalType::F32,
            ArgumentKind::F64 => LogicalType::F64,
            ArgumentKind::I64 | ArgumentKind::U64 => LogicalType::I64,
            ArgumentKind::I32 | ArgumentKind::U32 => LogicalType::I32,
            ArgumentKind::I16 | ArgumentKind::U16 => LogicalType::I16,
            ArgumentKind::I8 | ArgumentKind::U8 | ArgumentKind::Bool => LogicalType::I8,
            ArgumentKind::Opcode | ArgumentKind::SequenceId => {
                if arg.declared_length == Some(2) {
                    LogicalType::I16
                } else {
                    LogicalType::I32
                }
            }
            ArgumentKind::Enumeration => LogicalType::I32,
            ArgumentKind::FixedString | ArgumentKind::VarString => LogicalType::Str,
        }
    }
}

impl ArgumentTypeResolver for DictionaryTypeResolver {
    fn from_sse(&self) -> bool {
        false
    }

    fn enforces_argument_count(&self) -> bool {
        true
    }

    fn length_warning(&self, definition: &EvrDefinition, index: usize, length: u8) -> Option<String> {
        let kind = definition.args.get(index)?.kind;
        let allowed: &[u8] = match kind {
            ArgumentKind::I64 | ArgumentKind::U64 => &[1, 2, 4, 8],
            ArgumentKind::I32 | ArgumentKind::U32 => &[1, 2, 4],
            ArgumentKind::F64 => &[4, 8],
            _ => return None,
        };
        (!allowed.contains(&length)).then(|| {
            format!(
                "Parameter length in EVR ({length} bytes) is invalid for type in dictionary entry ({kind:?})"
            )
        })
    }

    fn resolve(&self, definition: &EvrDefinition, _letters: &[char], _lengths: &[u8]) -> Vec<LogicalType> {
        definition.args.iter().map(Self::logical_type).collect()
    }
}

/// Types are inferred from the template's conversion letters.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateTypeResolver;

impl ArgumentTypeResolver for TemplateTypeResolver {
    fn from_sse(&self) -> bool {
        true
    }

    fn enforces_argument_count(&self) -> bool {
        false
    }

    fn length_warning(&self, _definition: &EvrDefinition, _index: usize, _length: u8) -> Option<String> {
        None
    }

    fn resolve(&self, _definition: &EvrDefinition, letters: &[char], lengths: &[u8]) -> Vec<LogicalType> {
        // Stops early when the template has more specifiers than the packet has parameters.
        letters
            .iter()
            .zip(lengths)
            .filter_map(|(&letter, &length)| LogicalType::from_conversion(letter, usize::from(length)))
            .collect()
    }
}
