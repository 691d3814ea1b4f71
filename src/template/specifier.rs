use crate::err::{TemplateError, TemplateResult};

use log::warn;

/// Conversion letters accepted by the template engine.
pub const CONVERSION_LETTERS: &[u8] = b"diouxXcseEfgG";

/// Largest field width or precision a specifier may ask for.
pub const MAX_FIELD_WIDTH: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    pub left_align: bool,
    pub plus: bool,
    pub space: bool,
    pub alternate: bool,
    pub zero_pad: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthModifier {
    /// `hh`
    Char,
    /// `h`
    Short,
    /// `l`
    Long,
    /// `ll`
    LongLong,
    /// `L`
    LongDouble,
    /// `q`
    Quad,
    /// `j`
    Max,
    /// `z`
    Size,
    /// `t`
    PtrDiff,
}

/// A single `%...` directive inside a message template.
///
/// `start..end` is the byte range of the directive in the template it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionSpecifier {
    pub start: usize,
    pub end: usize,
    pub letter: char,
    pub flags: Flags,
    pub width: Option<usize>,
    pub precision: Option<usize>,
    pub length: Option<LengthModifier>,
}

impl ConversionSpecifier {
    pub fn is_integer(&self) -> bool {
        matches!(self.letter, 'd' | 'i' | 'o' | 'u' | 'x' | 'X' | 'c')
    }

    pub fn is_float(&self) -> bool {
        matches!(self.letter, 'e' | 'E' | 'f' | 'g' | 'G')
    }

    pub fn is_string(&self) -> bool {
        self.letter == 's'
    }
}

fn syntax(index: usize, reason: &'static str) -> TemplateError {
    TemplateError::Syntax { index, reason }
}

fn read_number(bytes: &[u8], i: &mut usize) -> Option<usize> {
    let start = *i;
    let mut value = 0usize;
    while let Some(d) = bytes.get(*i).filter(|b| b.is_ascii_digit()) {
        value = value.saturating_mul(10).saturating_add(usize::from(d - b'0'));
        *i += 1;
    }
    (*i > start).then_some(value)
}

fn read_length_modifier(bytes: &[u8], i: &mut usize) -> Option<LengthModifier> {
    let (modifier, consumed) = match (bytes.get(*i), bytes.get(*i + 1)) {
        (Some(b'h'), Some(b'h')) => (LengthModifier::Char, 2),
        (Some(b'h'), _) => (LengthModifier::Short, 1),
        (Some(b'l'), Some(b'l')) => (LengthModifier::LongLong, 2),
        (Some(b'l'), _) => (LengthModifier::Long, 1),
        (Some(b'L'), _) => (LengthModifier::LongDouble, 1),
        (Some(b'q'), _) => (LengthModifier::Quad, 1),
        (Some(b'j'), _) => (LengthModifier::Max, 1),
        (Some(b'z'), _) => (LengthModifier::Size, 1),
        (Some(b't'), _) => (LengthModifier::PtrDiff, 1),
        _ => return None,
    };
    *i += consumed;
    Some(modifier)
}

/// Find every conversion specifier in `template`, in order.
///
/// `%%` is a literal percent sign and is not reported. A `%` at the end of the template, or one
/// followed by an unknown conversion letter, is a syntax error.
pub fn list_conversion_specifiers(template: &str) -> TemplateResult<Vec<ConversionSpecifier>> {
    let bytes = template.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }

        let start = i;
        i += 1;
        match bytes.get(i) {
            None => return Err(syntax(start, "template ends inside a conversion specifier")),
            Some(b'%') => {
                i += 1;
                continue;
            }
            Some(_) => {}
        }

        let mut flags = Flags::default();
        while let Some(b) = bytes.get(i) {
            match b {
                b'-' => flags.left_align = true,
                b'+' => flags.plus = true,
                b' ' => flags.space = true,
                b'#' => flags.alternate = true,
                b'0' => flags.zero_pad = true,
                _ => break,
            }
            i += 1;
        }

        let width = read_number(bytes, &mut i);
        if width.is_some_and(|w| w > MAX_FIELD_WIDTH) {
            return Err(syntax(start, "width too large"));
        }
        let precision = if bytes.get(i) == Some(&b'.') {
            i += 1;
            Some(read_number(bytes, &mut i).unwrap_or(0))
        } else {
            None
        };
        if precision.is_some_and(|p| p > MAX_FIELD_WIDTH) {
            return Err(syntax(start, "precision too large"));
        }
        let length = read_length_modifier(bytes, &mut i);

        let letter = match bytes.get(i) {
            None => return Err(syntax(start, "template ends inside a conversion specifier")),
            Some(b) if CONVERSION_LETTERS.contains(b) => char::from(*b),
            Some(_) => return Err(syntax(start, "unknown conversion letter")),
        };
        i += 1;

        out.push(ConversionSpecifier {
            start,
            end: i,
            letter,
            flags,
            width,
            precision,
            length,
        });
    }

    Ok(out)
}

/// The conversion letters of `template`, in order.
pub fn conversion_letters(template: &str) -> TemplateResult<Vec<char>> {
    Ok(list_conversion_specifiers(template)?
        .into_iter()
        .map(|s| s.letter)
        .collect())
}

fn nth_specifier(template: &str, position: usize) -> Option<ConversionSpecifier> {
    match list_conversion_specifiers(template) {
        Ok(specifiers) => {
            let found = position
                .checked_sub(1)
                .and_then(|idx| specifiers.into_iter().nth(idx));
            if found.is_none() {
                warn!("Template `{template}` has no conversion specifier #{position}");
            }
            found
        }
        Err(e) => {
            warn!("Cannot locate conversion specifier #{position} in `{template}`: {e}");
            None
        }
    }
}

/// Rewrite the `position`-th (1-based) specifier of `template` as `%s`.
///
/// Out-of-range positions leave the template untouched.
pub fn rewrite_specifier_as_string(template: &str, position: usize) -> String {
    match nth_specifier(template, position) {
        Some(spec) => {
            let mut out = String::with_capacity(template.len());
            out.push_str(&template[..spec.start]);
            out.push_str("%s");
            out.push_str(&template[spec.end..]);
            out
        }
        None => template.to_string(),
    }
}

/// Splice literal `text` immediately after the `position`-th (1-based) specifier of `template`.
///
/// `%` in `text` is escaped so it renders as itself. Out-of-range positions leave the template
/// untouched.
pub fn insert_after_specifier(template: &str, text: &str, position: usize) -> String {
    match nth_specifier(template, position) {
        Some(spec) => {
            let mut out = String::with_capacity(template.len() + text.len());
            out.push_str(&template[..spec.end]);
            out.push_str(&text.replace('%', "%%"));
            out.push_str(&template[spec.end..]);
            out
        }
        None => template.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lists_specifiers_with_ranges() {
        let specs = list_conversion_specifiers("Temp %5.2f C, count=%lu, 100%% ok %s").unwrap();
        let letters: Vec<char> = specs.iter().map(|s| s.letter).collect();
        assert_eq!(letters, vec!['f', 'u', 's']);

        assert_eq!((specs[0].start, specs[0].end), (5, 10));
        assert_eq!(specs[0].width, Some(5));
        assert_eq!(specs[0].precision, Some(2));
        assert_eq!(specs[1].length, Some(LengthModifier::Long));
    }

    #[test]
    fn test_flags_and_length_modifiers() {
        let specs = list_conversion_specifiers("%-+ #08hhx %lld %.s").unwrap();
        let f = specs[0].flags;
        assert!(f.left_align && f.plus && f.space && f.alternate && f.zero_pad);
        assert_eq!(specs[0].width, Some(8));
        assert_eq!(specs[0].length, Some(LengthModifier::Char));
        assert_eq!(specs[1].length, Some(LengthModifier::LongLong));
        assert_eq!(specs[2].precision, Some(0));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            list_conversion_specifiers("trailing %"),
            Err(TemplateError::Syntax { index: 9, .. })
        ));
        assert!(matches!(
            list_conversion_specifiers("bad %y here"),
            Err(TemplateError::Syntax { index: 4, .. })
        ));
        assert!(list_conversion_specifiers("just 100%%").unwrap().is_empty());
    }

    #[test]
    fn test_oversized_width_and_precision_are_rejected() {
        let max = format!("%{MAX_FIELD_WIDTH}.{MAX_FIELD_WIDTH}f");
        assert_eq!(list_conversion_specifiers(&max).unwrap().len(), 1);

        assert_eq!(
            list_conversion_specifiers("v=%.70000f"),
            Err(TemplateError::Syntax { index: 2, reason: "precision too large" })
        );
        assert_eq!(
            list_conversion_specifiers("v=%99999999999999999999d"),
            Err(TemplateError::Syntax { index: 2, reason: "width too large" })
        );
    }

    #[test]
    fn test_rewrite_and_insert() {
        let t = "Opcode %04x from %d";
        assert_eq!(rewrite_specifier_as_string(t, 1), "Opcode %s from %d");
        assert_eq!(insert_after_specifier(t, "(SEQ)", 2), "Opcode %04x from %d(SEQ)");
        assert_eq!(rewrite_specifier_as_string(t, 3), t);
        assert_eq!(insert_after_specifier(t, "x", 0), t);
        assert_eq!(
            insert_after_specifier("Seq %u started", "(FILL_100%)", 1),
            "Seq %u(FILL_100%%) started"
        );
    }
}
