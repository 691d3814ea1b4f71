use crate::decoder::EvrRecordDecoder;
use crate::dictionary::Dictionaries;
use crate::err::Result;
use crate::evr_record::DecodedEvr;
use crate::packet::{PacketInfo, TelemetryPacket};
use crate::raw_field::MAX_FIELD_LENGTH;
use crate::resolver::{ArgumentTypeResolver, DictionaryTypeResolver, TemplateTypeResolver};

#[cfg(feature = "multithreading")]
use rayon::prelude::*;

use log::{debug, warn};
use std::fmt;

/// Default limit on the number of parameters one EVR may carry.
pub const DEFAULT_MAX_PARAMETER_COUNT: usize = 11;

/// Flight (multimission) EVRs are typed by the dictionary, SSE EVRs by their templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractorVariant {
    Multimission,
    Sse,
}

impl ExtractorVariant {
    pub fn resolver(self) -> Box<dyn ArgumentTypeResolver> {
        match self {
            ExtractorVariant::Multimission => Box::new(DictionaryTypeResolver),
            ExtractorVariant::Sse => Box::new(TemplateTypeResolver),
        }
    }
}

impl fmt::Display for ExtractorVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractorVariant::Multimission => f.write_str("multimission"),
            ExtractorVariant::Sse => f.write_str("sse"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorSettings {
    num_threads: usize,
    scrub_message_control_chars: bool,
    max_parameter_count: usize,
    max_parameter_length: u8,
    strip_template_quotes: bool,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        ExtractorSettings {
            num_threads: 0,
            scrub_message_control_chars: false,
            max_parameter_count: DEFAULT_MAX_PARAMETER_COUNT,
            max_parameter_length: MAX_FIELD_LENGTH as u8,
            strip_template_quotes: true,
        }
    }
}

impl ExtractorSettings {
    pub fn new() -> Self {
        ExtractorSettings::default()
    }

    /// Sets the number of worker threads used by `decode_batch`.
    /// `0` will let rayon decide.
    #[cfg(feature = "multithreading")]
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = if num_threads == 0 {
            rayon::current_num_threads()
        } else {
            num_threads
        };
        self
    }

    /// Does nothing and will log a warning when `multithreading` is disabled.
    #[cfg(not(feature = "multithreading"))]
    pub fn num_threads(mut self, _num_threads: usize) -> Self {
        warn!("Setting num_threads has no effect when `multithreading` is disabled");
        self.num_threads = 1;
        self
    }

    /// Replace characters outside printable ASCII in rendered messages with spaces.
    pub fn scrub_message_control_chars(mut self, scrub: bool) -> Self {
        self.scrub_message_control_chars = scrub;
        self
    }

    pub fn max_parameter_count(mut self, count: usize) -> Self {
        self.max_parameter_count = count;
        self
    }

    /// Values above the 80 byte field limit are clamped to it.
    pub fn max_parameter_length(mut self, length: u8) -> Self {
        if usize::from(length) > MAX_FIELD_LENGTH {
            warn!("max_parameter_length {length} exceeds the field limit, using {MAX_FIELD_LENGTH}");
        }
        self.max_parameter_length = length.min(MAX_FIELD_LENGTH as u8);
        self
    }

    /// Remove one pair of double quotes wrapping the whole message template.
    pub fn strip_template_quotes(mut self, strip: bool) -> Self {
        self.strip_template_quotes = strip;
        self
    }

    pub fn get_num_threads(&self) -> &usize {
        &self.num_threads
    }

    pub fn get_max_parameter_count(&self) -> usize {
        self.max_parameter_count
    }

    pub fn get_max_parameter_length(&self) -> u8 {
        self.max_parameter_length
    }

    pub fn should_scrub_message_control_chars(&self) -> bool {
        self.scrub_message_control_chars
    }

    pub fn should_strip_template_quotes(&self) -> bool {
        self.strip_template_quotes
    }
}

/// Decodes EVR packets against a set of dictionaries.
///
/// ```rust,no_run
/// use evr::{Dictionaries, EvrExtractor, ExtractorSettings, InMemoryEvrDictionary, PacketInfo};
/// use std::sync::Arc;
///
/// let dictionary = InMemoryEvrDictionary::new();
/// let extractor = EvrExtractor::multimission(Dictionaries::new(Arc::new(dictionary)))
///     .with_configuration(ExtractorSettings::new().num_threads(1));
///
/// let packet: Vec<u8> = std::fs::read("evr.pkt").unwrap();
/// match extractor.extract(&packet, &PacketInfo::ccsds(0)) {
///     Ok(evr) => println!("{}", evr.one_line_summary()),
///     Err(e) => eprintln!("{}", e),
/// }
/// ```
pub struct EvrExtractor {
    variant: ExtractorVariant,
    decoder: EvrRecordDecoder,
}

impl EvrExtractor {
    pub fn new(variant: ExtractorVariant, dictionaries: Dictionaries) -> Self {
        EvrExtractor {
            variant,
            decoder: EvrRecordDecoder::new(
                dictionaries,
                variant.resolver(),
                ExtractorSettings::default(),
            ),
        }
    }

    pub fn multimission(dictionaries: Dictionaries) -> Self {
        Self::new(ExtractorVariant::Multimission, dictionaries)
    }

    pub fn sse(dictionaries: Dictionaries) -> Self {
        Self::new(ExtractorVariant::Sse, dictionaries)
    }

    pub fn with_configuration(mut self, configuration: ExtractorSettings) -> Self {
        self.decoder.set_settings(configuration);
        self
    }

    pub fn variant(&self) -> ExtractorVariant {
        self.variant
    }

    pub fn settings(&self) -> &ExtractorSettings {
        self.decoder.settings()
    }

    /// Decode the EVR carried by a whole packet, headers included.
    pub fn extract(&self, packet: &[u8], info: &PacketInfo) -> Result<DecodedEvr> {
        self.decoder.decode(packet, info)
    }

    /// Decode an EVR body that starts at `start_offset` in `buf`.
    pub fn extract_body(&self, buf: &[u8], start_offset: usize, info: &PacketInfo) -> Result<DecodedEvr> {
        self.decoder.decode_at(buf, start_offset, info)
    }

    /// Threads `decode_batch` will use. A setting of `0` resolves to rayon's global pool.
    pub fn worker_threads(&self) -> usize {
        let configured = *self.settings().get_num_threads();
        #[cfg(feature = "multithreading")]
        {
            if configured == 0 {
                return rayon::current_num_threads();
            }
        }
        configured.max(1)
    }

    /// Decode many packets, in parallel when more than one worker thread is available.
    ///
    /// Results are returned in the same order as `packets`.
    pub fn decode_batch(&self, packets: &[TelemetryPacket]) -> Vec<Result<DecodedEvr>> {
        let num_threads = self.worker_threads();
        debug!(
            "Decoding {} {} packets with {} threads",
            packets.len(),
            self.variant,
            num_threads
        );

        #[cfg(feature = "multithreading")]
        {
            if num_threads > 1 {
                let decode_all = || -> Vec<Result<DecodedEvr>> {
                    packets
                        .par_iter()
                        .map(|p| self.extract(&p.data, &p.info))
                        .collect()
                };
                if *self.settings().get_num_threads() == 0 {
                    return decode_all();
                }
                match rayon::ThreadPoolBuilder::new().num_threads(num_threads).build() {
                    Ok(pool) => return pool.install(decode_all),
                    Err(e) => warn!("Failed to build thread pool ({e}), decoding sequentially"),
                }
            }
        }

        packets
            .iter()
            .map(|p| self.extract(&p.data, &p.info))
            .collect()
    }
}
