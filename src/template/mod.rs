//! Message templates: C-style format strings with `%` conversion specifiers.
//!
//! Templates come straight out of flight software dictionaries, so the engine follows C
//! `printf` rules rather than Rust's `format!`.

mod specifier;
mod sprintf;

pub use self::specifier::{
    CONVERSION_LETTERS, ConversionSpecifier, Flags, LengthModifier, conversion_letters,
    insert_after_specifier, list_conversion_specifiers, rewrite_specifier_as_string,
};

use crate::err::{TemplateError, TemplateResult};

use serde::Serialize;
use std::fmt;

/// A typed value bound to a conversion specifier.
///
/// Integers keep their wire width so that `%x`, `%o` and `%u` can mask them the way C would.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
}

impl Value {
    /// The value as a signed integer. Floats are rounded, strings have no integer value.
    pub fn as_signed(&self) -> Option<i64> {
        match *self {
            Value::I8(v) => Some(i64::from(v)),
            Value::I16(v) => Some(i64::from(v)),
            Value::I32(v) => Some(i64::from(v)),
            Value::I64(v) => Some(v),
            Value::F32(v) => Some(f64::from(v).round() as i64),
            Value::F64(v) => Some(v.round() as i64),
            Value::Str(_) => None,
        }
    }

    /// The value reinterpreted as unsigned at its own width.
    pub fn as_unsigned(&self) -> Option<u64> {
        match *self {
            Value::I8(v) => Some(u64::from(v as u8)),
            Value::I16(v) => Some(u64::from(v as u16)),
            Value::I32(v) => Some(u64::from(v as u32)),
            Value::I64(v) => Some(v as u64),
            Value::F32(_) | Value::F64(_) => self.as_signed().map(|v| v as u64),
            Value::Str(_) => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Value::F32(v) => Some(f64::from(v)),
            Value::F64(v) => Some(v),
            Value::Str(_) => None,
            _ => self.as_signed().map(|v| v as f64),
        }
    }

    pub fn is_str(&self) -> bool {
        matches!(self, Value::Str(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
        }
    }
}

/// Remove one pair of surrounding double quotes, if present.
pub fn strip_surrounding_quotes(template: &str) -> &str {
    template
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(template)
}

fn push_literal(out: &mut String, literal: &str) {
    if literal.contains("%%") {
        out.push_str(&literal.replace("%%", "%"));
    } else {
        out.push_str(literal);
    }
}

/// Render `template` with one value per conversion specifier.
///
/// A single value goes through [`render_single`], anything else through [`render_many`].
pub fn render(template: &str, values: &[Value]) -> TemplateResult<String> {
    match values {
        [single] => render_single(template, single),
        _ => render_many(template, values),
    }
}

/// Render a template that takes exactly one value.
///
/// Unlike [`render_many`], an empty template is an error: there is nowhere to put the value.
pub fn render_single(template: &str, value: &Value) -> TemplateResult<String> {
    if template.is_empty() {
        return Err(TemplateError::EmptyTemplate);
    }
    render_many(template, std::slice::from_ref(value))
}

/// Render `template`, binding `values` to its specifiers in order.
///
/// `%%` collapses to `%` in the literal text. The number of values must match the number of
/// specifiers.
pub fn render_many(template: &str, values: &[Value]) -> TemplateResult<String> {
    let specifiers = list_conversion_specifiers(template)?;
    if specifiers.len() != values.len() {
        return Err(TemplateError::ArityMismatch {
            specifiers: specifiers.len(),
            values: values.len(),
        });
    }

    let mut out = String::with_capacity(template.len() + 16 * values.len());
    let mut last = 0;
    for (i, (spec, value)) in specifiers.iter().zip(values).enumerate() {
        push_literal(&mut out, &template[last..spec.start]);
        out.push_str(&sprintf::format_value(spec, i + 1, value)?);
        last = spec.end;
    }
    push_literal(&mut out, &template[last..]);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_many() {
        let out = render(
            "Battery at %d%% (%.1f V) on %s",
            &[Value::I8(87), Value::F32(28.5), Value::Str("BUS_A".into())],
        )
        .unwrap();
        assert_eq!(out, "Battery at 87% (28.5 V) on BUS_A");
    }

    #[test]
    fn test_render_single() {
        assert_eq!(render("Count=%u", &[Value::I16(-1)]).unwrap(), "Count=65535");
        assert_eq!(
            render("", &[Value::I16(1)]),
            Err(TemplateError::EmptyTemplate)
        );
    }

    #[test]
    fn test_render_without_values_collapses_percent() {
        assert_eq!(render("100%% done", &[]).unwrap(), "100% done");
    }

    #[test]
    fn test_render_arity_mismatch() {
        assert_eq!(
            render("%d and %d", &[Value::I32(1)]),
            Err(TemplateError::ArityMismatch {
                specifiers: 2,
                values: 1
            })
        );
    }

    #[test]
    fn test_strip_surrounding_quotes() {
        assert_eq!(strip_surrounding_quotes("\"Hello %d\""), "Hello %d");
        assert_eq!(strip_surrounding_quotes("\"unbalanced"), "\"unbalanced");
        assert_eq!(strip_surrounding_quotes("plain"), "plain");
    }
}
