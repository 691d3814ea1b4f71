use crate::dictionary::{Dictionaries, EvrDefinition};
use crate::err::{BadEvrReason, DecodeError, Result};
use crate::evr_record::{DecodedEvr, MetadataKey};
use crate::extractor::ExtractorSettings;
use crate::packet::PacketInfo;
use crate::raw_field::{LogicalType, RawField};
use crate::replace::ParameterReplacers;
use crate::resolver::ArgumentTypeResolver;
use crate::template::{self, conversion_letters, strip_surrounding_quotes};
use crate::utils::{ByteCursor, bytes, dump_parameters};

use log::{debug, error, trace, warn};

const TASK_NAME_LEN: usize = 6;
const BAD_EVR_PREFIX: &str = "EVR processing error: ";

type SoftResult<T> = std::result::Result<T, BadEvrReason>;

/// Task names are NUL padded ASCII. Anything unprintable shows up as `?`.
fn task_name(raw: &[u8; TASK_NAME_LEN]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    raw[..end]
        .iter()
        .map(|&b| if (32..=126).contains(&b) { char::from(b) } else { '?' })
        .collect::<String>()
        .trim()
        .to_string()
}

/// The sign bit of the sequence number marks records from the real-time ring.
fn sequence_id_text(raw: i32) -> String {
    if raw < 0 {
        format!("RT:{}", raw & 0x7fff_ffff)
    } else {
        raw.to_string()
    }
}

/// Split `(source) message` into its source tag and the rest of the message.
///
/// The character right after the closing parenthesis is dropped along with it.
fn split_source(message: &str) -> Option<(&str, &str)> {
    if !message.starts_with('(') {
        return None;
    }
    let end = message.find(')')?;
    let mut rest = message[end + 1..].chars();
    rest.next();
    Some((&message[1..end], rest.as_str()))
}

fn clean_message(message: &str, scrub_control_chars: bool) -> String {
    let trimmed = message.trim();
    if scrub_control_chars {
        trimmed
            .chars()
            .map(|c| if (' '..='~').contains(&c) { c } else { ' ' })
            .collect()
    } else {
        trimmed.to_string()
    }
}

/// Where one parameter's value sits in the packet.
#[derive(Debug, Clone, Copy)]
struct ScannedParameter {
    offset: usize,
    length: u8,
}

/// Per-call decode state. Nothing in here outlives a single `decode` call.
struct DecodeContext<'a> {
    cursor: ByteCursor<'a>,
    packet: &'a PacketInfo,
    record: DecodedEvr,
}

impl DecodeContext<'_> {
    fn context(&self) -> String {
        self.packet.context(Some(self.record.event_id))
    }

    fn finish(mut self, message: String, save_source: bool, settings: &ExtractorSettings) -> DecodedEvr {
        let mut message = message.as_str();
        if save_source && let Some((source, rest)) = split_source(message) {
            self.record.add_metadata(MetadataKey::Source, source);
            message = rest;
        }
        self.record.message = clean_message(message, settings.should_scrub_message_control_chars());

        debug!(
            "Decoded EVR {} ({}) level={} from APID {}",
            self.record.name, self.record.event_id, self.record.level, self.record.apid
        );
        self.record
    }

    fn finish_bad(mut self, reason: BadEvrReason, settings: &ExtractorSettings) -> DecodedEvr {
        warn!("Bad EVR: {reason} {}", self.context());
        self.record.is_bad_evr = true;
        self.record.message = clean_message(
            &format!("{BAD_EVR_PREFIX}{reason}"),
            settings.should_scrub_message_control_chars(),
        );
        self.record
    }
}

/// Walks one EVR out of a packet buffer and renders its message.
///
/// The decoder holds only read-only state, so a single instance can decode packets from many
/// threads at once.
pub struct EvrRecordDecoder {
    dictionaries: Dictionaries,
    replacers: ParameterReplacers,
    resolver: Box<dyn ArgumentTypeResolver>,
    settings: ExtractorSettings,
}

impl EvrRecordDecoder {
    pub fn new(
        dictionaries: Dictionaries,
        resolver: Box<dyn ArgumentTypeResolver>,
        settings: ExtractorSettings,
    ) -> Self {
        EvrRecordDecoder {
            replacers: ParameterReplacers::new(&dictionaries),
            dictionaries,
            resolver,
            settings,
        }
    }

    pub fn settings(&self) -> &ExtractorSettings {
        &self.settings
    }

    pub(crate) fn set_settings(&mut self, settings: ExtractorSettings) {
        self.settings = settings;
    }

    pub fn dictionaries(&self) -> &Dictionaries {
        &self.dictionaries
    }

    /// Decode the EVR in `packet`, skipping the headers described by `info`.
    pub fn decode(&self, packet: &[u8], info: &PacketInfo) -> Result<DecodedEvr> {
        let header_len = match info.header_len() {
            Some(len) if len <= packet.len() => len,
            need => {
                let err = DecodeError::from(bytes::truncated(
                    "EVR packet header",
                    0,
                    need.unwrap_or(usize::MAX),
                    packet.len(),
                ));
                error!("{err} {}", info.context(None));
                return Err(err);
            }
        };
        self.decode_at(packet, header_len, info)
    }

    /// Decode the EVR body that starts at `offset` in `buf`.
    pub fn decode_at(&self, buf: &[u8], offset: usize, info: &PacketInfo) -> Result<DecodedEvr> {
        let (mut ctx, definition) = match self.read_header(buf, offset, info) {
            Ok(header) => header,
            Err(err) => {
                let event_id = match &err {
                    DecodeError::UnknownEventId { event_id, .. } => Some(*event_id),
                    DecodeError::Truncated(_) => None,
                };
                error!("{err} {}", info.context(event_id));
                return Err(err);
            }
        };

        Ok(match self.decode_body(&mut ctx, definition) {
            Ok(message) => ctx.finish(message, self.dictionaries.evr.save_source(), &self.settings),
            Err(reason) => ctx.finish_bad(reason, &self.settings),
        })
    }

    /// Task name and event id. Failures here are hard: without an event id the record is
    /// meaningless.
    fn read_header<'a, 's>(
        &'s self,
        buf: &'a [u8],
        offset: usize,
        info: &'a PacketInfo,
    ) -> Result<(DecodeContext<'a>, &'s EvrDefinition)> {
        let mut cursor = ByteCursor::with_pos(buf, offset)?;
        let mut record = DecodedEvr::from_packet_info(info, self.resolver.from_sse());

        let task = task_name(&cursor.array::<TASK_NAME_LEN>("EVR task name")?);
        trace!("EVR task name {task:?}");
        record.add_metadata(MetadataKey::TaskName, task);

        let event_id = cursor.u32_named("EVR event ID")?;
        trace!("EVR event id {event_id}");
        record.event_id = event_id;

        let definition = match self.dictionaries.evr.lookup(event_id) {
            Some(definition) => definition,
            None => {
                let placeholder = EvrDefinition::unknown(event_id);
                record.name = placeholder.name;
                record.level = placeholder.level;
                return Err(DecodeError::UnknownEventId {
                    event_id,
                    record: Box::new(record),
                });
            }
        };

        record.name = definition.name.clone();
        record.level = definition.level.clone();
        record.is_fatal = definition.is_fatal(self.dictionaries.evr.fatal_level_keyword());

        Ok((
            DecodeContext {
                cursor,
                packet: info,
                record,
            },
            definition,
        ))
    }

    /// Everything after the event id. Any failure here yields a bad EVR, not an error.
    fn decode_body(&self, ctx: &mut DecodeContext<'_>, definition: &EvrDefinition) -> SoftResult<String> {
        let sequence_id = ctx.cursor.i32_named("EVR overall sequence number")?;
        trace!("EVR sequence id {sequence_id}");
        ctx.record
            .add_metadata(MetadataKey::SequenceId, sequence_id_text(sequence_id));

        let category_sequence_id = ctx.cursor.u32_named("EVR category sequence number")?;
        ctx.record.add_metadata(
            MetadataKey::CategorySequenceId,
            category_sequence_id.to_string(),
        );

        let mut parameter_count = i32::from(ctx.cursor.u8_named("EVR parameter count")?);
        trace!("EVR parameter count {parameter_count}");

        if ctx.record.is_fatal && ctx.cursor.remaining() > 0 {
            self.read_stack_dump(ctx)?;
            // The stack dump occupies one parameter slot on the wire.
            parameter_count -= 1;
        }

        if self.resolver.enforces_argument_count() && parameter_count != definition.args.len() as i32 {
            return Err(BadEvrReason::ArgumentCountMismatch {
                wire: parameter_count,
                dictionary: definition.args.len(),
            });
        }
        if parameter_count < 0 || parameter_count as usize > self.settings.get_max_parameter_count() {
            return Err(BadEvrReason::InvalidParameterCount {
                count: parameter_count,
            });
        }
        let parameter_count = parameter_count as usize;

        let template = if self.settings.should_strip_template_quotes() {
            strip_surrounding_quotes(&definition.format_template)
        } else {
            definition.format_template.as_str()
        };
        let letters = conversion_letters(template).map_err(|source| BadEvrReason::Template {
            template: template.to_string(),
            source,
        })?;

        if letters.is_empty() {
            return Ok(template.to_string());
        }
        if parameter_count == 0 {
            return Err(BadEvrReason::SpecifiersWithoutParameters {
                template: template.to_string(),
            });
        }

        let scanned = self.scan_parameters(ctx, definition, parameter_count)?;
        let lengths: Vec<u8> = scanned.iter().map(|p| p.length).collect();
        let types = self.resolver.resolve(definition, &letters, &lengths);
        if types.len() != parameter_count {
            return Err(BadEvrReason::TypeCountMismatch {
                types: types.len(),
                count: parameter_count,
                dump: self.dump_parameters(ctx, &scanned),
                template: template.to_string(),
            });
        }

        let mut fields = self.build_fields(ctx, &scanned, &types)?;

        let rewritten = self.replacers.apply(&mut fields, template, definition)?;
        let letters = if rewritten != template {
            conversion_letters(&rewritten).map_err(|source| BadEvrReason::Template {
                template: rewritten.clone(),
                source,
            })?
        } else {
            letters
        };

        if letters.len() != fields.len() {
            return Err(BadEvrReason::SpecifierCountMismatch {
                event_id: definition.event_id,
                fields: fields.len(),
                specifiers: letters.len(),
            });
        }

        let values = fields
            .iter()
            .zip(&letters)
            .enumerate()
            .map(|(i, (field, &letter))| {
                field
                    .format_data(letter)
                    .map_err(|source| BadEvrReason::Field { index: i + 1, source })
            })
            .collect::<SoftResult<Vec<_>>>()?;

        template::render(&rewritten, &values).map_err(|source| BadEvrReason::Render {
            event_id: definition.event_id,
            source,
        })
    }

    fn read_stack_dump(&self, ctx: &mut DecodeContext<'_>) -> SoftResult<()> {
        let length = ctx.cursor.u8_named("EVR stack dump length")?;
        trace!("EVR stack dump length {length}");
        if length % 4 != 0 {
            return Err(BadEvrReason::BadStackDumpLength { length });
        }

        let addresses = ctx
            .cursor
            .u32_vec(usize::from(length / 4), "EVR stack dump address")?;
        let stack = addresses
            .iter()
            .map(|a| format!("0x{a:08x}"))
            .collect::<Vec<_>>()
            .join(",");
        ctx.record.add_metadata(MetadataKey::AddressStack, stack);
        Ok(())
    }

    fn scan_parameters(
        &self,
        ctx: &mut DecodeContext<'_>,
        definition: &EvrDefinition,
        count: usize,
    ) -> SoftResult<Vec<ScannedParameter>> {
        let mut scanned = Vec::with_capacity(count);
        for i in 0..count {
            let length = ctx.cursor.u8_named("EVR parameter length")?;
            if let Some(warning) = self.resolver.length_warning(definition, i, length) {
                warn!("{warning} {}", ctx.context());
            }
            if length > self.settings.get_max_parameter_length() {
                return Err(BadEvrReason::ParameterTooLong { length });
            }

            let offset = ctx.cursor.pos();
            ctx.cursor
                .take_bytes(usize::from(length), "EVR parameter value")?;
            trace!("parameter #{} at offset {offset}, {length} bytes", i + 1);
            scanned.push(ScannedParameter { offset, length });
        }
        Ok(scanned)
    }

    fn build_fields(
        &self,
        ctx: &DecodeContext<'_>,
        scanned: &[ScannedParameter],
        types: &[LogicalType],
    ) -> SoftResult<Vec<RawField>> {
        let buf = ctx.cursor.buf();
        let mut fields = Vec::with_capacity(scanned.len());

        for (i, (param, &logical_type)) in scanned.iter().zip(types).enumerate() {
            let index = i + 1;
            let length = usize::from(param.length);
            let field = match logical_type {
                LogicalType::Str if length == 0 => RawField::empty_string(),
                LogicalType::Str => {
                    let field = RawField::printable_string(buf, length, param.offset)
                        .map_err(|source| BadEvrReason::Field { index, source })?;
                    if !field.is_valid() {
                        return Err(BadEvrReason::InvalidString { index });
                    }
                    field
                }
                _ => {
                    if !logical_type.expected_lengths().contains(&length) {
                        warn!(
                            "Parameter #{index} is {length} bytes long, which is unusual for {logical_type:?} {}",
                            ctx.context()
                        );
                    }
                    RawField::from_slice(buf, length, param.offset, logical_type)
                        .map_err(|source| BadEvrReason::Field { index, source })?
                }
            };
            fields.push(field);
        }

        Ok(fields)
    }

    fn dump_parameters(&self, ctx: &DecodeContext<'_>, scanned: &[ScannedParameter]) -> String {
        let buf = ctx.cursor.buf();
        let record = &ctx.record;
        let or_null = |v: Option<String>| v.unwrap_or_else(|| "null".to_string());

        format!(
            "Event ID: {}; Level: {}; SCLK: {}; SCET: {}; ERT: {};LST: {};Parameter Dump: {}",
            record.event_id,
            record.level,
            or_null(record.timestamps.sclk.map(|s| s.to_string())),
            or_null(record.timestamps.scet.map(|t| t.to_string())),
            or_null(record.timestamps.ert.map(|t| t.to_string())),
            or_null(record.timestamps.sol.clone()),
            dump_parameters(
                scanned
                    .iter()
                    .map(|p| &buf[p.offset..p.offset + usize::from(p.length)])
            )
        )
    }
}
