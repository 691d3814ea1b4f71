#![allow(dead_code)]
use evr::{
    ArgumentKind, ArgumentSpec, Dictionaries, EnumerationTable, EvrDefinition,
    InMemoryCommandDictionary, InMemoryEvrDictionary, InMemorySequenceDictionary, PacketInfo,
};
use std::sync::{Arc, Once};

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

/// Builds an EVR packet: a zeroed primary header followed by the EVR body.
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    header_len: usize,
    task: [u8; 6],
    event_id: u32,
    sequence_id: i32,
    category_sequence_id: u32,
    parameter_count: Option<u8>,
    stack: Option<(u8, Vec<u32>)>,
    params: Vec<Vec<u8>>,
    trailer: Vec<u8>,
    truncate_to: Option<usize>,
}

impl PacketBuilder {
    pub fn new(event_id: u32) -> Self {
        PacketBuilder {
            header_len: 6,
            task: *b"TASK\0\0",
            event_id,
            sequence_id: 1,
            category_sequence_id: 2,
            parameter_count: None,
            stack: None,
            params: Vec::new(),
            trailer: Vec::new(),
            truncate_to: None,
        }
    }

    pub fn header_len(mut self, len: usize) -> Self {
        self.header_len = len;
        self
    }

    pub fn task(mut self, task: &[u8; 6]) -> Self {
        self.task = *task;
        self
    }

    pub fn sequence_id(mut self, id: i32) -> Self {
        self.sequence_id = id;
        self
    }

    pub fn category_sequence_id(mut self, id: u32) -> Self {
        self.category_sequence_id = id;
        self
    }

    /// Overrides the parameter count byte, which otherwise counts params plus the stack dump.
    pub fn parameter_count(mut self, count: u8) -> Self {
        self.parameter_count = Some(count);
        self
    }

    pub fn stack(mut self, addresses: &[u32]) -> Self {
        self.stack = Some(((addresses.len() * 4) as u8, addresses.to_vec()));
        self
    }

    pub fn stack_with_length(mut self, length: u8, addresses: &[u32]) -> Self {
        self.stack = Some((length, addresses.to_vec()));
        self
    }

    pub fn param(mut self, bytes: &[u8]) -> Self {
        self.params.push(bytes.to_vec());
        self
    }

    pub fn u32_param(self, value: u32) -> Self {
        self.param(&value.to_be_bytes())
    }

    pub fn i32_param(self, value: i32) -> Self {
        self.param(&value.to_be_bytes())
    }

    pub fn u16_param(self, value: u16) -> Self {
        self.param(&value.to_be_bytes())
    }

    pub fn f64_param(self, value: f64) -> Self {
        self.param(&value.to_be_bytes())
    }

    pub fn str_param(self, value: &str) -> Self {
        self.param(value.as_bytes())
    }

    /// Raw bytes appended after the parameters.
    pub fn trailer(mut self, bytes: &[u8]) -> Self {
        self.trailer.extend_from_slice(bytes);
        self
    }

    pub fn truncate_to(mut self, len: usize) -> Self {
        self.truncate_to = Some(len);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![0_u8; self.header_len];
        out.extend_from_slice(&self.task);
        out.extend_from_slice(&self.event_id.to_be_bytes());
        out.extend_from_slice(&self.sequence_id.to_be_bytes());
        out.extend_from_slice(&self.category_sequence_id.to_be_bytes());

        let count = self.parameter_count.unwrap_or_else(|| {
            (self.params.len() + usize::from(self.stack.is_some())) as u8
        });
        out.push(count);

        if let Some((length, addresses)) = &self.stack {
            out.push(*length);
            for address in addresses {
                out.extend_from_slice(&address.to_be_bytes());
            }
        }

        for param in &self.params {
            out.push(param.len() as u8);
            out.extend_from_slice(param);
        }
        out.extend_from_slice(&self.trailer);

        if let Some(len) = self.truncate_to {
            out.truncate(len);
        }
        out
    }
}

pub fn info() -> PacketInfo {
    PacketInfo::ccsds(0).with_apid(5).with_dss_id(14).with_seq_count(9)
}

pub fn power_state_table() -> EnumerationTable {
    [(0, "OFF"), (1, "ON")].into_iter().collect()
}

/// A small flight dictionary that covers every argument kind the scenarios use.
pub fn flight_dictionary() -> InMemoryEvrDictionary {
    InMemoryEvrDictionary::new()
        .with_definition(
            EvrDefinition::new(100, "HEATER_ON", "ACTIVITY_HI", "Heater %u on")
                .with_arg(ArgumentSpec::new("heater", ArgumentKind::U32)),
        )
        .with_definition(EvrDefinition::new(101, "BOOT_DONE", "ACTIVITY_LO", "Boot complete"))
        .with_definition(
            EvrDefinition::new(102, "PWR_STATE", "ACTIVITY_LO", "State is %d")
                .with_arg(
                    ArgumentSpec::new("state", ArgumentKind::Enumeration)
                        .with_enumeration(power_state_table()),
                ),
        )
        .with_definition(
            EvrDefinition::new(103, "CMD_DISPATCH", "COMMAND", "Dispatched %x")
                .with_arg(ArgumentSpec::new("opcode", ArgumentKind::Opcode).with_declared_length(2)),
        )
        .with_definition(
            EvrDefinition::new(104, "SEQ_START", "SEQ", "Sequence %u started")
                .with_arg(ArgumentSpec::new("seq", ArgumentKind::SequenceId)),
        )
        .with_definition(
            EvrDefinition::new(105, "FSW_PANIC", "FATAL", "Panic in %s")
                .with_arg(ArgumentSpec::new("module", ArgumentKind::VarString)),
        )
        .with_definition(
            EvrDefinition::new(106, "TEMP", "ACTIVITY_LO", "\"Temp %.2f C\"")
                .with_arg(ArgumentSpec::new("temp", ArgumentKind::F64)),
        )
        .with_definition(
            EvrDefinition::new(107, "NEEDS_ARG", "WARNING_LO", "Value %d")
                .with_arg(ArgumentSpec::new("v", ArgumentKind::I32)),
        )
        .with_definition(EvrDefinition::new(108, "NO_ARGS", "WARNING_LO", "Value %d"))
        .with_definition(
            EvrDefinition::new(109, "SOURCED", "ACTIVITY_LO", "(%s) Boot complete")
                .with_arg(ArgumentSpec::new("file", ArgumentKind::VarString)),
        )
        .with_definition(EvrDefinition::new(110, "HALT", "FATAL", "Halted"))
        .with_definition(
            EvrDefinition::new(111, "LABEL", "ACTIVITY_LO", "Label '%s' slot %u")
                .with_arg(ArgumentSpec::new("label", ArgumentKind::FixedString).with_declared_length(0))
                .with_arg(ArgumentSpec::new("slot", ArgumentKind::U8)),
        )
}

pub fn flight_dictionaries() -> Dictionaries {
    Dictionaries::new(Arc::new(flight_dictionary()))
        .with_commands(Arc::new(
            InMemoryCommandDictionary::new().with_stem("0x0101", "PWR_ON"),
        ))
        .with_sequences(Arc::new(InMemorySequenceDictionary::new().with_name(7, "SEQ_A")))
}

/// The same dictionary without the save-source policy or any command/sequence dictionaries.
pub fn bare_dictionaries() -> Dictionaries {
    Dictionaries::new(Arc::new(flight_dictionary()))
}

pub fn sourced_dictionaries() -> Dictionaries {
    Dictionaries::new(Arc::new(flight_dictionary().with_save_source(true)))
}

/// SSE dictionaries carry templates only.
pub fn sse_dictionaries() -> Dictionaries {
    let dictionary = InMemoryEvrDictionary::new()
        .with_definition(EvrDefinition::new(
            200,
            "SSE_STATUS",
            "ACTIVITY_LO",
            "Count %d ratio %f name %s",
        ))
        .with_definition(EvrDefinition::new(201, "SSE_SHORT", "ACTIVITY_LO", "%d %d"));
    Dictionaries::new(Arc::new(dictionary))
}

pub const DICTIONARY_JSON: &str = r#"{
  "evrs": [
    { "event_id": 100, "name": "HEATER_ON", "level": "ACTIVITY_HI",
      "format_template": "Heater %u on",
      "args": [ { "name": "heater", "kind": "U32" } ] },
    { "event_id": 102, "name": "PWR_STATE", "level": "ACTIVITY_LO",
      "format_template": "State is %d",
      "args": [ { "name": "state", "kind": "ENUM", "enumeration": { "0": "OFF", "1": "ON" } } ] }
  ],
  "commands": { "0x0101": "PWR_ON" },
  "sequences": { "7": "SEQ_A" }
}"#;

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
