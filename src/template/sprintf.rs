//! C `printf` semantics for a single conversion specifier.

use super::Value;
use super::specifier::ConversionSpecifier;
use crate::err::{TemplateError, TemplateResult};

const DEFAULT_FLOAT_PRECISION: usize = 6;

fn mismatch(spec: &ConversionSpecifier, position: usize, value: &Value) -> TemplateError {
    TemplateError::TypeMismatch {
        position,
        letter: spec.letter,
        value: value.to_string(),
    }
}

/// Format `value` according to `spec`. `position` is 1-based and only used in errors.
pub(crate) fn format_value(
    spec: &ConversionSpecifier,
    position: usize,
    value: &Value,
) -> TemplateResult<String> {
    match spec.letter {
        _ if spec.is_string() => match value {
            Value::Str(s) => Ok(format_str(spec, s)),
            _ => Err(mismatch(spec, position, value)),
        },
        'c' => match value {
            Value::Str(s) => Ok(pad_text(spec, s.chars().next().map(String::from).unwrap_or_default())),
            _ => {
                let v = value
                    .as_unsigned()
                    .ok_or_else(|| mismatch(spec, position, value))?;
                let b = (v & 0xFF) as u8;
                let c = if (32..=126).contains(&b) { char::from(b) } else { '.' };
                Ok(pad_text(spec, c.to_string()))
            }
        },
        'd' | 'i' => {
            let v = value
                .as_signed()
                .ok_or_else(|| mismatch(spec, position, value))?;
            Ok(format_signed(spec, v))
        }
        _ if spec.is_float() => {
            let v = value
                .as_float()
                .ok_or_else(|| mismatch(spec, position, value))?;
            Ok(format_float(spec, v))
        }
        // u, o, x, X
        _ if spec.is_integer() => {
            let v = value
                .as_unsigned()
                .ok_or_else(|| mismatch(spec, position, value))?;
            Ok(format_unsigned(spec, v))
        }
        _ => Err(mismatch(spec, position, value)),
    }
}

fn pad_text(spec: &ConversionSpecifier, body: String) -> String {
    let width = spec.width.unwrap_or(0);
    let len = body.chars().count();
    if len >= width {
        return body;
    }
    let fill = " ".repeat(width - len);
    if spec.flags.left_align {
        body + &fill
    } else {
        fill + &body
    }
}

fn format_str(spec: &ConversionSpecifier, s: &str) -> String {
    let body = match spec.precision {
        Some(p) => s.chars().take(p).collect(),
        None => s.to_string(),
    };
    pad_text(spec, body)
}

/// Assemble `sign`, `prefix` and `digits` inside the field width.
fn finish_numeric(
    spec: &ConversionSpecifier,
    sign: &str,
    prefix: &str,
    digits: &str,
    zero_pad_allowed: bool,
) -> String {
    let len = sign.len() + prefix.len() + digits.len();
    let width = spec.width.unwrap_or(0);
    if len >= width {
        return format!("{sign}{prefix}{digits}");
    }
    let fill = width - len;
    if spec.flags.left_align {
        format!("{sign}{prefix}{digits}{}", " ".repeat(fill))
    } else if spec.flags.zero_pad && zero_pad_allowed {
        format!("{sign}{prefix}{}{digits}", "0".repeat(fill))
    } else {
        format!("{}{sign}{prefix}{digits}", " ".repeat(fill))
    }
}

fn apply_precision(spec: &ConversionSpecifier, digits: String, is_zero: bool) -> String {
    match spec.precision {
        Some(0) if is_zero => String::new(),
        Some(p) if digits.len() < p => format!("{}{digits}", "0".repeat(p - digits.len())),
        _ => digits,
    }
}

fn sign_for(spec: &ConversionSpecifier, negative: bool) -> &'static str {
    if negative {
        "-"
    } else if spec.flags.plus {
        "+"
    } else if spec.flags.space {
        " "
    } else {
        ""
    }
}

fn format_signed(spec: &ConversionSpecifier, v: i64) -> String {
    let digits = apply_precision(spec, v.unsigned_abs().to_string(), v == 0);
    finish_numeric(spec, sign_for(spec, v < 0), "", &digits, spec.precision.is_none())
}

fn format_unsigned(spec: &ConversionSpecifier, v: u64) -> String {
    let raw = match spec.letter {
        'o' => format!("{v:o}"),
        'x' => format!("{v:x}"),
        'X' => format!("{v:X}"),
        _ => v.to_string(),
    };
    let digits = apply_precision(spec, raw, v == 0);

    let prefix = match spec.letter {
        'x' if spec.flags.alternate && v != 0 => "0x",
        'X' if spec.flags.alternate && v != 0 => "0X",
        'o' if spec.flags.alternate && v != 0 && !digits.starts_with('0') => "0",
        _ => "",
    };
    finish_numeric(spec, "", prefix, &digits, spec.precision.is_none())
}

/// `{:e}` in Rust prints `1.5e3`; C prints `1.5e+03`.
fn exp_notation(a: f64, precision: usize, upper: bool) -> String {
    let s = format!("{a:.precision$e}");
    let (mantissa, exp) = match s.split_once('e') {
        Some(parts) => parts,
        None => return s,
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    format!(
        "{mantissa}{}{}{:02}",
        if upper { 'E' } else { 'e' },
        if exp < 0 { '-' } else { '+' },
        exp.unsigned_abs()
    )
}

fn decimal_exponent(a: f64, precision: usize) -> i32 {
    if a == 0.0 {
        return 0;
    }
    let s = format!("{a:.precision$e}");
    s.split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0)
}

fn strip_trailing_zeros(s: String) -> String {
    let (mantissa, exp) = match s.find(['e', 'E']) {
        Some(idx) => s.split_at(idx),
        None => (s.as_str(), ""),
    };
    if !mantissa.contains('.') {
        return s;
    }
    let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
    format!("{mantissa}{exp}")
}

fn general_notation(a: f64, precision: usize, alternate: bool, upper: bool) -> String {
    let p = precision.max(1);
    let x = decimal_exponent(a, p - 1);
    let s = if x < -4 || x >= p as i32 {
        exp_notation(a, p - 1, upper)
    } else {
        let decimals = (p as i32 - 1 - x).max(0) as usize;
        format!("{a:.decimals$}")
    };
    if alternate { s } else { strip_trailing_zeros(s) }
}

fn format_float(spec: &ConversionSpecifier, v: f64) -> String {
    let upper = spec.letter.is_ascii_uppercase();
    if v.is_nan() {
        let body = if upper { "NAN" } else { "nan" };
        return finish_numeric(spec, "", "", body, false);
    }

    let negative = v.is_sign_negative() && v != 0.0;
    let sign = sign_for(spec, negative);
    let a = v.abs();
    if a.is_infinite() {
        let body = if upper { "INF" } else { "inf" };
        return finish_numeric(spec, sign, "", body, false);
    }

    let precision = spec.precision.unwrap_or(DEFAULT_FLOAT_PRECISION);
    let body = match spec.letter {
        'e' | 'E' => exp_notation(a, precision, upper),
        'g' | 'G' => general_notation(a, precision, spec.flags.alternate, upper),
        _ => {
            let mut s = format!("{a:.precision$}");
            if spec.flags.alternate && precision == 0 {
                s.push('.');
            }
            s
        }
    };
    finish_numeric(spec, sign, "", &body, true)
}
