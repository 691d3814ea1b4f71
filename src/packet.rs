use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a CCSDS space packet primary header.
pub const CCSDS_PRIMARY_HEADER_LEN: usize = 6;

/// Spacecraft clock reading: coarse seconds plus fine ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Sclk {
    pub coarse: u64,
    pub fine: u32,
}

impl Sclk {
    pub fn new(coarse: u64, fine: u32) -> Self {
        Sclk { coarse, fine }
    }
}

impl fmt::Display for Sclk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:010}-{:05}", self.coarse, self.fine)
    }
}

/// What the transport layer knows about a packet before its EVR body is decoded.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PacketInfo {
    pub primary_header_len: usize,
    pub secondary_header_len: usize,
    pub apid: u16,
    pub vcid: Option<u32>,
    pub dss_id: u16,
    pub seq_count: u32,
    pub sclk: Option<Sclk>,
    pub scet: Option<Timestamp>,
    pub ert: Option<Timestamp>,
    /// Local solar time, already formatted by the mission's time service.
    pub lst: Option<String>,
    pub rct: Option<Timestamp>,
}

impl PacketInfo {
    pub fn new(primary_header_len: usize, secondary_header_len: usize) -> Self {
        PacketInfo {
            primary_header_len,
            secondary_header_len,
            ..Default::default()
        }
    }

    /// A CCSDS packet with the given secondary header length.
    pub fn ccsds(secondary_header_len: usize) -> Self {
        PacketInfo::new(CCSDS_PRIMARY_HEADER_LEN, secondary_header_len)
    }

    /// Combined header length, `None` if the two lengths overflow.
    pub fn header_len(&self) -> Option<usize> {
        self.primary_header_len.checked_add(self.secondary_header_len)
    }

    pub fn with_apid(mut self, apid: u16) -> Self {
        self.apid = apid;
        self
    }

    pub fn with_vcid(mut self, vcid: u32) -> Self {
        self.vcid = Some(vcid);
        self
    }

    pub fn with_dss_id(mut self, dss_id: u16) -> Self {
        self.dss_id = dss_id;
        self
    }

    pub fn with_seq_count(mut self, seq_count: u32) -> Self {
        self.seq_count = seq_count;
        self
    }

    pub fn with_sclk(mut self, sclk: Sclk) -> Self {
        self.sclk = Some(sclk);
        self
    }

    pub fn with_scet(mut self, scet: Timestamp) -> Self {
        self.scet = Some(scet);
        self
    }

    pub fn with_ert(mut self, ert: Timestamp) -> Self {
        self.ert = Some(ert);
        self
    }

    pub fn with_lst(mut self, lst: impl Into<String>) -> Self {
        self.lst = Some(lst.into());
        self
    }

    pub fn with_rct(mut self, rct: Timestamp) -> Self {
        self.rct = Some(rct);
        self
    }

    /// `[apid=…, vcid=…, dss_id=…, spsc=…, sclk=…, event_id=…]`, appended to diagnostics.
    pub(crate) fn context(&self, event_id: Option<u32>) -> String {
        let vcid = self
            .vcid
            .map(|v| v.to_string())
            .unwrap_or_else(|| "none".to_string());
        let sclk = self
            .sclk
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".to_string());
        let event_id = event_id
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        format!(
            "[apid={}, vcid={}, dss_id={}, spsc={}, sclk={}, event_id={}]",
            self.apid, vcid, self.dss_id, self.seq_count, sclk, event_id
        )
    }
}

/// A whole packet plus its transport metadata, as fed to batch decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryPacket {
    pub info: PacketInfo,
    pub data: Vec<u8>,
}

impl TelemetryPacket {
    pub fn new(info: PacketInfo, data: Vec<u8>) -> Self {
        TelemetryPacket { info, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sclk_display() {
        assert_eq!(Sclk::new(123456, 42).to_string(), "0000123456-00042");
    }

    #[test]
    fn test_context_line() {
        let info = PacketInfo::ccsds(10)
            .with_apid(1234)
            .with_vcid(2)
            .with_dss_id(14)
            .with_seq_count(99)
            .with_sclk(Sclk::new(5, 1));
        assert_eq!(info.header_len(), Some(16));
        assert_eq!(PacketInfo::new(usize::MAX, 1).header_len(), None);
        assert_eq!(
            info.context(Some(42)),
            "[apid=1234, vcid=2, dss_id=14, spsc=99, sclk=0000000005-00001, event_id=42]"
        );
        assert_eq!(
            PacketInfo::new(0, 0).context(None),
            "[apid=0, vcid=none, dss_id=0, spsc=0, sclk=none, event_id=unknown]"
        );
    }
}
