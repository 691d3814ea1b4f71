use crate::err::{FieldError, FieldResult};
use crate::template::Value;
use crate::utils::{bytes, hex_bytes};

use serde::Serialize;
use std::borrow::Cow;

/// Parameters longer than this are rejected by the EVR wire format.
pub const MAX_FIELD_LENGTH: usize = 80;

/// How the bytes of a parameter are meant to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LogicalType {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Str,
}

impl LogicalType {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            LogicalType::I8 | LogicalType::I16 | LogicalType::I32 | LogicalType::I64
        )
    }

    /// Wire lengths that make sense for this type. Empty for strings, which take any length.
    pub fn expected_lengths(self) -> &'static [usize] {
        match self {
            LogicalType::I8 | LogicalType::I16 | LogicalType::I32 | LogicalType::I64 => &[1, 2, 4, 8],
            LogicalType::F32 | LogicalType::F64 => &[4, 8],
            LogicalType::Str => &[],
        }
    }

    /// Infer a type from a conversion letter and the parameter's wire length.
    ///
    /// Integer letters pick the narrowest width holding `length` bytes, float letters pick
    /// `F32` for 4 bytes and `F64` otherwise. Unknown letters yield `None`.
    pub fn from_conversion(letter: char, length: usize) -> Option<Self> {
        match letter {
            'c' | 'd' | 'i' | 'o' | 'u' | 'x' | 'X' => Some(match length {
                1 => LogicalType::I8,
                2 => LogicalType::I16,
                0..=4 => LogicalType::I32,
                _ => LogicalType::I64,
            }),
            'e' | 'E' | 'f' | 'g' | 'G' => Some(if length == 4 {
                LogicalType::F32
            } else {
                LogicalType::F64
            }),
            's' => Some(LogicalType::Str),
            _ => None,
        }
    }
}

/// Result of checking a string parameter for printable ASCII.
pub(crate) enum Printable {
    Valid(Vec<u8>),
    Invalid { index: usize },
}

/// Check that `bytes` is printable ASCII, turning newlines into spaces.
pub(crate) fn sanitize_printable(bytes: &[u8]) -> Printable {
    let mut out = Vec::with_capacity(bytes.len());
    for (index, &b) in bytes.iter().enumerate() {
        match b {
            b'\n' => out.push(b' '),
            32..=126 => out.push(b),
            _ => return Printable::Invalid { index },
        }
    }
    Printable::Valid(out)
}

/// An owned copy of one parameter slice from an EVR packet.
///
/// The bytes are interpreted lazily, at formatting time, according to the conversion letter
/// the value is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawField {
    bytes: Vec<u8>,
    declared_length: u8,
    logical_type: LogicalType,
    valid: bool,
    replaced: bool,
}

impl RawField {
    /// Copy `length` bytes at `offset` out of `buf`.
    pub fn from_slice(
        buf: &[u8],
        length: usize,
        offset: usize,
        logical_type: LogicalType,
    ) -> FieldResult<Self> {
        if length == 0 {
            return Err(FieldError::ZeroLength);
        }
        if length > MAX_FIELD_LENGTH {
            return Err(FieldError::TooLong {
                length,
                max: MAX_FIELD_LENGTH,
            });
        }
        let slice = bytes::slice_r(buf, offset, length, "EVR parameter").map_err(|_| {
            FieldError::OutOfBounds {
                offset,
                length,
                buffer_len: buf.len(),
            }
        })?;

        Ok(RawField {
            bytes: slice.to_vec(),
            declared_length: length as u8,
            logical_type,
            valid: true,
            replaced: false,
        })
    }

    /// A zero-length string parameter, which renders as `""`.
    pub fn empty_string() -> Self {
        RawField {
            bytes: Vec::new(),
            declared_length: 0,
            logical_type: LogicalType::Str,
            valid: true,
            replaced: false,
        }
    }

    /// A string parameter whose bytes have been checked for printable ASCII.
    pub(crate) fn printable_string(buf: &[u8], length: usize, offset: usize) -> FieldResult<Self> {
        let mut field = RawField::from_slice(buf, length, offset, LogicalType::Str)?;
        match sanitize_printable(&field.bytes) {
            Printable::Valid(clean) => field.bytes = clean,
            Printable::Invalid { .. } => field.valid = false,
        }
        Ok(field)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The length byte that preceded this parameter on the wire.
    pub fn declared_length(&self) -> u8 {
        self.declared_length
    }

    pub fn logical_type(&self) -> LogicalType {
        self.logical_type
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_replaced(&self) -> bool {
        self.replaced
    }

    /// The bytes as text, with anything that is not UTF-8 replaced.
    pub fn as_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// The bytes as a big-endian signed integer, sign-extended from their own width.
    pub fn as_signed(&self) -> FieldResult<i64> {
        let len = self.bytes.len();
        let raw = bytes::fold_be(&self.bytes).ok_or(FieldError::BadIntegerLength { length: len })?;
        let shift = 64 - 8 * len as u32;
        Ok(((raw << shift) as i64) >> shift)
    }

    /// The bytes as a big-endian unsigned integer.
    pub fn as_unsigned(&self) -> FieldResult<u64> {
        bytes::fold_be(&self.bytes).ok_or(FieldError::BadIntegerLength {
            length: self.bytes.len(),
        })
    }

    fn integer_value(&self) -> FieldResult<Value> {
        let raw = self.as_unsigned()?;
        Ok(match self.bytes.len() {
            1 => Value::I8(raw as u8 as i8),
            2 => Value::I16(raw as u16 as i16),
            3 | 4 => Value::I32(raw as u32 as i32),
            _ => Value::I64(raw as i64),
        })
    }

    fn float_value(&self) -> FieldResult<Value> {
        match self.bytes.len() {
            4 => Ok(Value::F32(f32::from_bits(self.as_unsigned()? as u32))),
            8 => Ok(Value::F64(f64::from_bits(self.as_unsigned()?))),
            length => Err(FieldError::BadFloatLength { length }),
        }
    }

    /// Reinterpret the bytes as the value a conversion letter expects.
    pub fn format_data(&self, letter: char) -> FieldResult<Value> {
        match letter {
            'c' | 'd' | 'i' | 'o' | 'u' | 'x' | 'X' => self.integer_value(),
            'e' | 'E' | 'f' | 'g' | 'G' => self.float_value(),
            's' => Ok(Value::Str(self.as_text().into_owned())),
            other => Err(FieldError::UnsupportedConversion(other)),
        }
    }

    /// Overwrite the value with replacement text; the field becomes a string.
    pub fn replace_data(&mut self, text: &str) {
        self.bytes = text.as_bytes().to_vec();
        self.logical_type = LogicalType::Str;
        self.valid = true;
        self.replaced = true;
    }

    pub fn hex_dump(&self) -> String {
        hex_bytes(&self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rejects_zero_and_oversized_slices() {
        let buf = [0u8; 100];
        assert_eq!(
            RawField::from_slice(&buf, 0, 0, LogicalType::I32),
            Err(FieldError::ZeroLength)
        );
        assert_eq!(
            RawField::from_slice(&buf, 81, 0, LogicalType::Str),
            Err(FieldError::TooLong { length: 81, max: 80 })
        );
        assert_eq!(
            RawField::from_slice(&buf, 4, 98, LogicalType::I32),
            Err(FieldError::OutOfBounds {
                offset: 98,
                length: 4,
                buffer_len: 100
            })
        );
    }

    #[test]
    fn test_integer_width_follows_length() {
        let buf = [0xFF, 0xFE, 0x00, 0x00, 0x01, 0x00];
        let one = RawField::from_slice(&buf, 1, 0, LogicalType::I8).unwrap();
        assert_eq!(one.format_data('d').unwrap(), Value::I8(-1));

        let two = RawField::from_slice(&buf, 2, 0, LogicalType::I16).unwrap();
        assert_eq!(two.format_data('d').unwrap(), Value::I16(-2));

        let three = RawField::from_slice(&buf, 3, 2, LogicalType::I32).unwrap();
        assert_eq!(three.format_data('u').unwrap(), Value::I32(1));

        let six = RawField::from_slice(&buf, 6, 0, LogicalType::I64).unwrap();
        assert_eq!(six.format_data('x').unwrap(), Value::I64(0xFFFE_0000_0100));

        let ones = [0xFF; 8];
        let eight = RawField::from_slice(&ones, 8, 0, LogicalType::I64).unwrap();
        assert_eq!(eight.format_data('x').unwrap(), Value::I64(-1));

        let one = RawField::from_slice(&[0, 0, 0, 1], 4, 0, LogicalType::I32).unwrap();
        assert_eq!(one.format_data('d').unwrap(), Value::I32(1));
    }

    #[test]
    fn test_signed_and_unsigned_views() {
        let buf = [0x80, 0x01];
        let field = RawField::from_slice(&buf, 2, 0, LogicalType::I16).unwrap();
        assert_eq!(field.as_signed().unwrap(), -32767);
        assert_eq!(field.as_unsigned().unwrap(), 0x8001);
    }

    #[test]
    fn test_float_lengths() {
        let f32_bytes = 1.5f32.to_be_bytes();
        let field = RawField::from_slice(&f32_bytes, 4, 0, LogicalType::F32).unwrap();
        assert_eq!(field.format_data('f').unwrap(), Value::F32(1.5));

        let f64_bytes = (-0.25f64).to_be_bytes();
        let field = RawField::from_slice(&f64_bytes, 8, 0, LogicalType::F64).unwrap();
        assert_eq!(field.format_data('g').unwrap(), Value::F64(-0.25));

        let field = RawField::from_slice(&f64_bytes, 2, 0, LogicalType::F64).unwrap();
        assert_eq!(
            field.format_data('e'),
            Err(FieldError::BadFloatLength { length: 2 })
        );
    }

    #[test]
    fn test_strings_and_replacement() {
        let empty = RawField::empty_string();
        assert_eq!(empty.format_data('s').unwrap(), Value::Str(String::new()));
        assert_eq!(empty.declared_length(), 0);

        let buf = *b"line one\nline two";
        let text = RawField::printable_string(&buf, buf.len(), 0).unwrap();
        assert!(text.is_valid());
        assert_eq!(text.as_text(), "line one line two");

        let bad = RawField::printable_string(&[b'o', b'k', 0x07], 3, 0).unwrap();
        assert!(!bad.is_valid());

        let mut field = RawField::from_slice(&[0, 3], 2, 0, LogicalType::I16).unwrap();
        field.replace_data("ON");
        assert!(field.is_replaced());
        assert_eq!(field.logical_type(), LogicalType::Str);
        assert_eq!(field.declared_length(), 2);
        assert_eq!(field.format_data('s').unwrap(), Value::Str("ON".into()));
    }

    #[test]
    fn test_unsupported_letter() {
        let field = RawField::from_slice(&[1], 1, 0, LogicalType::I8).unwrap();
        assert_eq!(
            field.format_data('p'),
            Err(FieldError::UnsupportedConversion('p'))
        );
        assert_eq!(field.hex_dump(), "01 ");
    }

    #[test]
    fn test_type_inference_from_conversion() {
        assert_eq!(LogicalType::from_conversion('d', 1), Some(LogicalType::I8));
        assert_eq!(LogicalType::from_conversion('x', 2), Some(LogicalType::I16));
        assert_eq!(LogicalType::from_conversion('u', 3), Some(LogicalType::I32));
        assert_eq!(LogicalType::from_conversion('i', 8), Some(LogicalType::I64));
        assert_eq!(LogicalType::from_conversion('f', 4), Some(LogicalType::F32));
        assert_eq!(LogicalType::from_conversion('g', 8), Some(LogicalType::F64));
        assert_eq!(LogicalType::from_conversion('s', 20), Some(LogicalType::Str));
        assert_eq!(LogicalType::from_conversion('p', 4), None);
    }
}
