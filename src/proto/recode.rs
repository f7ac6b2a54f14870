//! Client keystroke recoding: UTF-8 to ISO-8859-1 with TELNET passthrough.
//!
//! The server expects ISO-8859-1; modern terminals send UTF-8. Codepoints in
//! [0xA0, 0xFF] map onto their single byte, everything else that decodes maps
//! to `?`, as do invalid sequences. TELNET commands from the client are
//! forwarded untouched, and an IAC may arrive at any point - even between the
//! bytes of one UTF-8 sequence - so the transducer saves the interrupted
//! state and resumes it once the command has passed.

const IAC: u8 = 0xff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    /// Mid UTF-8 sequence: continuation bytes left, codepoint so far.
    Utf8 { left: u8, codepoint: u32 },
    Iac,
    /// IAC WILL/WONT/DO/DONT seen, one option byte outstanding.
    Iac3,
}

/// Streaming transducer; one per connection.
#[derive(Debug)]
pub struct InputRecoder {
    state: State,
    /// State to restore once a TELNET command has been passed through.
    resume: State,
}

impl Default for InputRecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl InputRecoder {
    pub fn new() -> Self {
        Self {
            state: State::Text,
            resume: State::Text,
        }
    }

    /// Recode one chunk. Incomplete sequences carry over to the next call.
    pub fn recode(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(chunk.len());
        for &b in chunk {
            if b == IAC && self.state != State::Iac && self.state != State::Iac3 {
                self.resume = self.state;
                self.state = State::Iac;
                continue;
            }
            match self.state {
                State::Text => {
                    if b < 0x80 {
                        out.push(b);
                    } else if b & 0xe0 == 0xc0 {
                        self.state = State::Utf8 {
                            left: 1,
                            codepoint: ((b & 0x1f) as u32) << 6,
                        };
                    } else if b & 0xf0 == 0xe0 {
                        self.state = State::Utf8 {
                            left: 2,
                            codepoint: ((b & 0x0f) as u32) << 12,
                        };
                    } else if b & 0xf8 == 0xf0 {
                        self.state = State::Utf8 {
                            left: 3,
                            codepoint: ((b & 0x07) as u32) << 18,
                        };
                    } else {
                        out.push(b'?');
                    }
                }
                State::Utf8 { left, codepoint } => {
                    if b & 0xc0 != 0x80 {
                        // Not a continuation byte; drop the sequence.
                        out.push(b'?');
                        self.state = State::Text;
                        continue;
                    }
                    let left = left - 1;
                    let codepoint = codepoint | ((b & 0x3f) as u32) << (6 * left as u32);
                    if left == 0 {
                        if (0xa0..=0xff).contains(&codepoint) {
                            out.push(codepoint as u8);
                        } else {
                            out.push(b'?');
                        }
                        self.state = State::Text;
                    } else {
                        self.state = State::Utf8 { left, codepoint };
                    }
                }
                State::Iac => {
                    if b == IAC {
                        // An escaped 0xFF makes no sense from a UTF-8 client.
                        out.push(b'?');
                        self.state = self.resume;
                        continue;
                    }
                    out.push(IAC);
                    out.push(b);
                    self.state = if (0xfb..=0xfe).contains(&b) {
                        State::Iac3
                    } else {
                        self.resume
                    };
                }
                State::Iac3 => {
                    out.push(b);
                    self.state = self.resume;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        let mut r = InputRecoder::new();
        assert_eq!(r.recode(b"look at sword\n"), b"look at sword\n");
    }

    #[test]
    fn latin1_codepoints_become_single_bytes() {
        let mut r = InputRecoder::new();
        // "päivää" as UTF-8
        assert_eq!(r.recode("p\u{e4}iv\u{e4}\u{e4}".as_bytes()), b"p\xe4iv\xe4\xe4");
    }

    #[test]
    fn codepoints_above_latin1_become_question_marks() {
        let mut r = InputRecoder::new();
        assert_eq!(r.recode("€".as_bytes()), b"?");
        assert_eq!(r.recode("𝄞".as_bytes()), b"?");
    }

    #[test]
    fn invalid_lead_byte() {
        let mut r = InputRecoder::new();
        assert_eq!(r.recode(&[0x80, b'a']), b"?a");
    }

    #[test]
    fn invalid_continuation_byte() {
        let mut r = InputRecoder::new();
        // 0xC3 expects a continuation; 'x' is not one and is consumed with it.
        assert_eq!(r.recode(&[0xc3, b'x', b'y']), b"?y");
    }

    #[test]
    fn utf8_sequence_split_across_chunks() {
        let mut r = InputRecoder::new();
        let mut out = r.recode(&[0xc3]);
        out.extend(r.recode(&[0xa4]));
        assert_eq!(out, b"\xe4");
    }

    #[test]
    fn telnet_negotiation_passes_through() {
        let mut r = InputRecoder::new();
        assert_eq!(r.recode(&[0xff, 0xfd, 0x18]), [0xff, 0xfd, 0x18]);
        // Two-byte command: IAC NOP
        assert_eq!(r.recode(&[0xff, 0xf1]), [0xff, 0xf1]);
    }

    #[test]
    fn iac_interrupts_utf8_sequence() {
        let mut r = InputRecoder::new();
        // First byte of a three-byte sequence, then IAC DO <opt> in its own
        // chunk, then the two continuation bytes: the command passes through
        // first, then the decoded character (out of Latin-1 range here).
        let mut out = r.recode(&[0xe2]);
        out.extend(r.recode(&[0xff, 0xfd, 0x18]));
        out.extend(r.recode(&[0x82, 0xac]));
        assert_eq!(out, [0xff, 0xfd, 0x18, b'?']);
    }

    #[test]
    fn iac_interrupt_preserves_latin1_decoding() {
        let mut r = InputRecoder::new();
        let mut out = r.recode(&[0xc3]);
        out.extend(r.recode(&[0xff, 0xf1]));
        out.extend(r.recode(&[0xa4]));
        assert_eq!(out, [0xff, 0xf1, 0xe4]);
    }

    #[test]
    fn double_iac_is_invalid_here() {
        let mut r = InputRecoder::new();
        assert_eq!(r.recode(&[0xff, 0xff, b'a']), b"?a");
    }
}
