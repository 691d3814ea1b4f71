#![deny(unused_must_use)]
#![forbid(unsafe_code)]
// Don't allow dbg! prints in release.
#![cfg_attr(not(debug_assertions), deny(clippy::dbg_macro))]

pub mod decoder;
pub mod dictionary;
pub mod err;
pub mod evr_record;
pub mod extractor;
pub mod packet;
pub mod raw_field;
pub mod replace;
pub mod resolver;
pub mod template;

mod utils;

pub use decoder::EvrRecordDecoder;
pub use dictionary::{
    ArgumentKind, ArgumentSpec, CommandDictionary, Dictionaries, DictionaryBundle,
    EnumerationTable, EvrDefinition, EvrDictionary, HexOpcodeFormatter, InMemoryCommandDictionary,
    InMemoryEvrDictionary, InMemorySequenceDictionary, OpcodeFormatter, SequenceDictionary,
};
pub use err::{BadEvrReason, DecodeError, Result};
pub use evr_record::{DecodedEvr, EvrTimestamps, MetadataEntry, MetadataKey};
pub use extractor::{EvrExtractor, ExtractorSettings, ExtractorVariant};
pub use packet::{PacketInfo, Sclk, TelemetryPacket};
pub use raw_field::{LogicalType, RawField};
pub use resolver::{ArgumentTypeResolver, DictionaryTypeResolver, TemplateTypeResolver};

// For tests, we only initialize logging once.
#[cfg(test)]
use std::sync::Once;

#[cfg(test)]
static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}
