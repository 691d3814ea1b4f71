use crate::packet::{PacketInfo, Sclk};

use jiff::Timestamp;
use serde::Serialize;
use std::fmt;

/// Keys of the per-record metadata list, in the order the decoder attaches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MetadataKey {
    TaskName,
    SequenceId,
    CategorySequenceId,
    AddressStack,
    Source,
}

impl MetadataKey {
    pub fn as_str(self) -> &'static str {
        match self {
            MetadataKey::TaskName => "TaskName",
            MetadataKey::SequenceId => "SequenceId",
            MetadataKey::CategorySequenceId => "CategorySequenceId",
            MetadataKey::AddressStack => "AddressStack",
            MetadataKey::Source => "Source",
        }
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataEntry {
    pub key: MetadataKey,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EvrTimestamps {
    pub sclk: Option<Sclk>,
    pub scet: Option<Timestamp>,
    pub ert: Option<Timestamp>,
    pub sol: Option<String>,
    pub rct: Option<Timestamp>,
}

/// One decoded Event Verification Record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedEvr {
    pub event_id: u32,
    pub name: String,
    pub level: String,
    pub is_fatal: bool,
    pub is_bad_evr: bool,
    pub message: String,
    pub timestamps: EvrTimestamps,
    pub apid: u16,
    pub station_id: u16,
    pub virtual_channel_id: Option<u32>,
    pub packet_sequence_count: u32,
    pub metadata: Vec<MetadataEntry>,
    pub from_sse: bool,
}

impl DecodedEvr {
    /// An empty record carrying the packet's transport metadata.
    pub fn from_packet_info(info: &PacketInfo, from_sse: bool) -> Self {
        DecodedEvr {
            event_id: 0,
            name: String::new(),
            level: String::new(),
            is_fatal: false,
            is_bad_evr: false,
            message: String::new(),
            timestamps: EvrTimestamps {
                sclk: info.sclk,
                scet: info.scet,
                ert: info.ert,
                sol: info.lst.clone(),
                rct: info.rct,
            },
            apid: info.apid,
            station_id: info.dss_id,
            virtual_channel_id: info.vcid,
            packet_sequence_count: info.seq_count,
            metadata: Vec::new(),
            from_sse,
        }
    }

    pub fn add_metadata(&mut self, key: MetadataKey, value: impl Into<String>) {
        self.metadata.push(MetadataEntry {
            key,
            value: value.into(),
        });
    }

    /// The first metadata value stored under `key`.
    pub fn metadata_value(&self, key: MetadataKey) -> Option<&str> {
        self.metadata
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    /// `NAME (id): message SCLK = … SCET = … LST = … ERT = …`
    pub fn one_line_summary(&self) -> String {
        let message = if self.message.is_empty() {
            "No Message"
        } else {
            self.message.as_str()
        };
        let sclk = self
            .timestamps
            .sclk
            .map(|s| s.to_string())
            .unwrap_or_else(|| "No SCLK".to_string());
        let scet = self
            .timestamps
            .scet
            .map(|t| t.to_string())
            .unwrap_or_else(|| "No SCET".to_string());
        let sol = self.timestamps.sol.as_deref().unwrap_or("No LST");
        let ert = self
            .timestamps
            .ert
            .map(|t| t.to_string())
            .unwrap_or_else(|| "No ERT".to_string());

        format!(
            "{} ({}): {} SCLK = {} SCET = {} LST = {} ERT = {}",
            self.name, self.event_id, message, sclk, scet, sol, ert
        )
    }

    pub fn to_json_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
