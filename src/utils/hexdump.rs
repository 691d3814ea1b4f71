use std::fmt::Write;

/// Render bytes as space-separated upper-case hex pairs, each followed by a space.
pub(crate) fn hex_bytes(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for b in data {
        let _ = write!(out, "{b:02X} ");
    }
    out
}

/// Dump a list of EVR parameter values for diagnostics.
///
/// Each entry reads `Parameter Number <n>; Bytes: <len>; Hex Value: <hex>;`.
pub(crate) fn dump_parameters<'a>(parameters: impl IntoIterator<Item = &'a [u8]>) -> String {
    let mut out = String::new();
    let mut any = false;
    for (i, bytes) in parameters.into_iter().enumerate() {
        any = true;
        let _ = write!(
            out,
            "Parameter Number {}; Bytes: {}; Hex Value: {};",
            i + 1,
            bytes.len(),
            hex_bytes(bytes)
        );
    }
    if !any {
        out.push_str("  No parameters to dump\n");
    }
    out
}
