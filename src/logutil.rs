//! Logging utilities for raw protocol payloads so logs stay single-line.
//! Escapes control and non-ASCII bytes that otherwise break log readability.

/// Render a byte payload for single-line logging:
/// - `\n` => `\\n`, `\r` => `\\r`, `\t` => `\\t`, backslash => `\\\\`
/// - other control and non-ASCII bytes as `\xNN`
///
/// Truncates long payloads with an ellipsis to cap log noise.
pub fn preview(bytes: &[u8]) -> String {
    const MAX_PREVIEW: usize = 160;
    let mut out = String::with_capacity(bytes.len().min(MAX_PREVIEW) + 8);
    for (count, &b) in bytes.iter().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(b as char),
            _ => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", b);
            }
        }
    }
    out
}
