use crate::evr_record::DecodedEvr;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DecodeError>;
pub type FieldResult<T> = std::result::Result<T, FieldError>;
pub type TemplateResult<T> = std::result::Result<T, TemplateError>;
pub type ReplacementResult<T> = std::result::Result<T, ReplacementError>;
pub type DictionaryResult<T> = std::result::Result<T, DictionaryError>;

/// A bounded read ran past the end of the packet buffer.
///
/// This is the single error produced by the byte cursor; callers decide whether it is a hard
/// failure (`DecodeError`) or a soft one (`BadEvrReason`) depending on how far decoding got.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Ran out of bytes getting {what} (offset={offset}, need={need}, have={have})")]
pub struct Truncated {
    pub what: &'static str,
    pub offset: u64,
    pub need: usize,
    pub have: usize,
}

/// Hard failures: the record is discarded and the error is propagated to the caller.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Truncated(#[from] Truncated),

    /// The event id is not in the EVR dictionary.
    ///
    /// `record` carries the partially decoded record, attached to a placeholder definition
    /// whose level is `UNKNOWN`, so that callers can still log the event id.
    #[error("Could not find EVR event id {event_id} in EVR dictionary")]
    UnknownEventId {
        event_id: u32,
        record: Box<DecodedEvr>,
    },
}

impl DecodeError {
    /// The partial record attached to this failure, if any.
    pub fn partial_record(&self) -> Option<&DecodedEvr> {
        match self {
            DecodeError::UnknownEventId { record, .. } => Some(record),
            DecodeError::Truncated(_) => None,
        }
    }
}

/// Soft failures: the record is kept, flagged as a bad EVR, and carries this reason as its
/// diagnostic message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BadEvrReason {
    #[error(transparent)]
    Truncated(#[from] Truncated),

    #[error("Fatal EVR had bad stack dump length {length}")]
    BadStackDumpLength { length: u8 },

    #[error(
        "Number of parameters specified in EVR ({wire}) does not match nargs in dictionary entry ({dictionary})"
    )]
    ArgumentCountMismatch { wire: i32, dictionary: usize },

    #[error("Invalid EVR parameter count {count}")]
    InvalidParameterCount { count: i32 },

    #[error("Could not format EVR message using format string ( {template}): {source}")]
    Template {
        template: String,
        source: TemplateError,
    },

    #[error("Evr parameter count was 0, but message \"{template}\" contains format statements")]
    SpecifiersWithoutParameters { template: String },

    #[error("Invalid parameter length {length}")]
    ParameterTooLong { length: u8 },

    #[error(
        "number of parameter types {types}, derived from EVR message format is not equal to the parameter count {count} specified in the EVR--EVR DUMP:: {dump}; Message format: {template}"
    )]
    TypeCountMismatch {
        types: usize,
        count: usize,
        dump: String,
        template: String,
    },

    #[error("Invalid string found in EVR (parameter #{index})")]
    InvalidString { index: usize },

    #[error("Could not process formatted EVR data element #{index}: {source}")]
    Field { index: usize, source: FieldError },

    #[error("Could not replace EVR parameter #{index}: {source}")]
    Replacement {
        index: usize,
        source: ReplacementError,
    },

    #[error(
        "EVR Extraction failed for event ID {event_id}--parameter list length {fields} is not equal to the number of parameters {specifiers} to be formatted."
    )]
    SpecifierCountMismatch {
        event_id: u32,
        fields: usize,
        specifiers: usize,
    },

    #[error(
        "EVR extraction failed for event ID {event_id}--mismatch between format statement and argument type: {source}"
    )]
    Render {
        event_id: u32,
        source: TemplateError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("malformed conversion specifier at index {index}: {reason}")]
    Syntax { index: usize, reason: &'static str },

    #[error("value `{value}` cannot satisfy conversion specifier #{position} (`%{letter}`)")]
    TypeMismatch {
        position: usize,
        letter: char,
        value: String,
    },

    #[error("template has {specifiers} conversion specifiers but {values} values were supplied")]
    ArityMismatch { specifiers: usize, values: usize },

    #[error("A value was supplied without a format string")]
    EmptyTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("cannot build a field from a zero-length slice, use `RawField::empty_string`")]
    ZeroLength,

    #[error("field of {length} bytes at offset {offset} runs past a {buffer_len} byte buffer")]
    OutOfBounds {
        offset: usize,
        length: usize,
        buffer_len: usize,
    },

    #[error("field length {length} exceeds the maximum of {max} bytes")]
    TooLong { length: usize, max: usize },

    #[error("cannot reinterpret {length} bytes as an integer")]
    BadIntegerLength { length: usize },

    #[error("cannot reinterpret {length} bytes as a floating point value")]
    BadFloatLength { length: usize },

    #[error("unsupported conversion letter `{0}`")]
    UnsupportedConversion(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplacementError {
    #[error("{replacer} replacement does not accept {got} input")]
    InvalidArgument {
        replacer: &'static str,
        got: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("dictionary lookup failed: {0}")]
    Lookup(String),

    #[error("duplicate EVR definition for event id {0}")]
    DuplicateEventId(u32),

    #[error("Failed to open dictionary file {}: {source}", path.display())]
    FailedToOpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("`serde_json` failed with error: {0}")]
    Json(#[from] serde_json::Error),
}
