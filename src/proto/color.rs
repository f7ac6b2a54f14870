//! RGB to terminal color escape sequences.
//!
//! Two strategies: `Direct` emits ISO-8613-3-style true-color sequences with
//! the literal RGB values, `Xterm256` quantizes onto the 256-color palette
//! (exact 16-color match first, then the grayscale ramp, then the 6x6x6
//! cube). Semicolons are used as parameter separators throughout: colons
//! would be the standards-correct choice, but tinyfugue - the client this
//! exists for - only understands semicolons.

use serde::{Deserialize, Serialize};

/// Resets all colors and attributes.
pub const RESET: &str = "\x1b[0m";

/// Which kind of color sequence to generate for tags 20/21.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// 24-bit `ESC[38;2;R;G;Bm` sequences.
    Direct,
    /// Indexed `ESC[38;5;Nm` sequences quantized to the xterm palette.
    #[default]
    Xterm256,
}

/// The 16 standard ANSI colors, in palette order.
const BASE_COLORS: [u32; 16] = [
    0x000000, 0x800000, 0x008000, 0x808000, 0x000080, 0x800080, 0x008080, 0xc0c0c0, 0x808080,
    0xff0000, 0x00ff00, 0xffff00, 0x0000ff, 0xff00ff, 0x00ffff, 0xffffff,
];

/// Linearly scale `x` from [a,b] to [c,d] with integer floor division.
fn scale(x: i32, a: i32, b: i32, c: i32, d: i32) -> i32 {
    c + (x - a) * (d - c) / (b - a)
}

/// Quantize an RGB triple onto the xterm 256-color palette.
pub fn rgb_to_xterm(r: u8, g: u8, b: u8) -> u8 {
    let rgb = ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
    for (i, &base) in BASE_COLORS.iter().enumerate() {
        if rgb == base {
            return i as u8;
        }
    }
    if r == g && r == b {
        // Grayscale: a 24-step ramp at index 232, with the endpoints aliased
        // to palette black and white.
        let index = scale(r as i32, 0, u8::MAX as i32, 0, 25);
        return match index {
            0 => 0,
            25 => 15,
            _ => (231 + index) as u8,
        };
    }
    // 6x6x6 color cube starting at index 16.
    let rx = scale(r as i32, 0, u8::MAX as i32, 0, 5);
    let gx = scale(g as i32, 0, u8::MAX as i32, 0, 5);
    let bx = scale(b as i32, 0, u8::MAX as i32, 0, 5);
    (16 + 36 * rx + 6 * gx + bx) as u8
}

/// Build the escape sequence selecting the given color as foreground or
/// background. Deterministic in all arguments.
pub fn sequence(mode: ColorMode, foreground: bool, r: u8, g: u8, b: u8) -> String {
    let select = if foreground { 38 } else { 48 };
    match mode {
        ColorMode::Direct => format!("\x1b[{select};2;{r};{g};{b}m"),
        ColorMode::Xterm256 => format!("\x1b[{select};5;{}m", rgb_to_xterm(r, g, b)),
    }
}

/// Parse a tag 20/21 color argument: up to six hex digits, most significant
/// first, as in `00ff7f`.
pub fn parse_rgb(arg: &str) -> Option<(u8, u8, u8)> {
    let hex: String = arg
        .trim_start()
        .chars()
        .take(6)
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    if hex.is_empty() {
        return None;
    }
    let v = u32::from_str_radix(&hex, 16).ok()?;
    Some((
        ((v >> 16) & 0xff) as u8,
        ((v >> 8) & 0xff) as u8,
        (v & 0xff) as u8,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_ansi_matches() {
        assert_eq!(rgb_to_xterm(0, 0, 0), 0);
        assert_eq!(rgb_to_xterm(255, 255, 255), 15);
        assert_eq!(rgb_to_xterm(255, 0, 0), 9);
        assert_eq!(rgb_to_xterm(0x80, 0x80, 0x80), 8);
        assert_eq!(rgb_to_xterm(0xc0, 0xc0, 0xc0), 7);
    }

    #[test]
    fn cube_quantization_by_formula() {
        // 128 -> 2, 64 -> 1, 32 -> 0 under floor(v * 5 / 255)
        assert_eq!(rgb_to_xterm(128, 64, 32), 16 + 36 * 2 + 6 * 1);
    }

    #[test]
    fn grayscale_ramp() {
        // 231 + v * 25 / 255 under integer floor division.
        assert_eq!(rgb_to_xterm(100, 100, 100), 240);
        assert_eq!(rgb_to_xterm(200, 200, 200), 250);
        // Near-black aliases to palette black; the top of the ramp is 255.
        assert_eq!(rgb_to_xterm(5, 5, 5), 0);
        assert_eq!(rgb_to_xterm(250, 250, 250), 255);
        // Everything else stays inside the ramp (or the 16-color table).
        for v in 1..=254u8 {
            let idx = rgb_to_xterm(v, v, v);
            assert!(
                idx == 0 || idx == 15 || idx == 7 || idx == 8 || (232..=255).contains(&idx),
                "gray {v} mapped to {idx}"
            );
        }
    }

    #[test]
    fn direct_sequences() {
        assert_eq!(
            sequence(ColorMode::Direct, true, 1, 2, 3),
            "\x1b[38;2;1;2;3m"
        );
        assert_eq!(
            sequence(ColorMode::Direct, false, 255, 0, 127),
            "\x1b[48;2;255;0;127m"
        );
    }

    #[test]
    fn indexed_sequences() {
        assert_eq!(
            sequence(ColorMode::Xterm256, true, 255, 0, 0),
            "\x1b[38;5;9m"
        );
        assert_eq!(sequence(ColorMode::Xterm256, false, 0, 0, 0), "\x1b[48;5;0m");
    }

    #[test]
    fn rgb_argument_parsing() {
        assert_eq!(parse_rgb("ff00ff"), Some((255, 0, 255)));
        assert_eq!(parse_rgb("00ff7f"), Some((0, 255, 127)));
        assert_eq!(parse_rgb("  ffffff"), Some((255, 255, 255)));
        assert_eq!(parse_rgb("zz"), None);
        assert_eq!(parse_rgb(""), None);
    }
}
