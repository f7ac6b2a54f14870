//! ISO-8859-1 to UTF-8 conversion for the server-to-client direction.
//!
//! The game server speaks ISO-8859-1; terminal clients expect UTF-8. Bytes
//! 0x7F..0x9F are control codes with no printable mapping and become U+FFFD.

const REPLACEMENT: &[u8] = b"\xef\xbf\xbd"; // U+FFFD

/// Append `input`, interpreted as ISO-8859-1, to `out` as UTF-8.
pub fn append(out: &mut Vec<u8>, input: &[u8]) {
    out.reserve(input.len());
    for &b in input {
        if b <= 0x7e {
            out.push(b);
        } else if b >= 0xa0 {
            // The byte value is the codepoint; 8 bits split over two bytes.
            out.push(0xc0 | (b >> 6));
            out.push(0x80 | (b & 0x3f));
        } else {
            out.extend_from_slice(REPLACEMENT);
        }
    }
}
