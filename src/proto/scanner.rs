//! Incremental scanner for the BC tag protocol.
//!
//! The game server multiplexes control data into its text stream as numbered
//! tags (`ESC < D D` ... `ESC > D D`), argument markers (`ESC |`) and TELNET
//! commands. The scanner is fed arbitrary chunks and emits [`Event`]s; all
//! state that can span a chunk boundary (a half-received tag code, a pending
//! IAC) lives inside the scanner, so feeding a stream in any chunking yields
//! the same output as feeding it at once.
//!
//! The scanner never fails: every malformed introducer degrades to replaying
//! the bytes as literal text. The server is known to send extraneous closing
//! tags, so a close whose code does not match the innermost open tag is
//! dropped without an event.

const ESC: u8 = 0x1b;
const IAC: u8 = 0xff;
const GA: u8 = 0xf9;
const WILL: u8 = 0xfb;
const DONT: u8 = 0xfe;

/// One decoded unit of the server stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Literal bytes outside any tag.
    Text(Vec<u8>),
    /// Literal bytes belonging to the innermost open tag's body.
    TagText(Vec<u8>),
    /// A tag with the given two-digit code was opened.
    TagOpen(u8),
    /// The innermost tag was closed with a matching code.
    TagClose(u8),
    /// `ESC |`: the bytes seen so far inside the tag were its argument.
    ArgEnd,
    /// IAC GA immediately after closing tag 10: an interactive prompt.
    /// The two marker bytes are consumed, not forwarded.
    Prompt,
    /// A TELNET command, 2 or 3 raw bytes including the leading IAC.
    Telnet(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    Esc,
    OpenDigit1,
    OpenDigit2,
    CloseDigit1,
    CloseDigit2,
    Iac,
    /// IAC WILL/WONT/DO/DONT seen, awaiting the option byte.
    IacVerb(u8),
    /// Tag 10 just closed; an IAC GA may follow.
    PromptTag,
    PromptIac,
}

/// Streaming scanner; one per connection.
#[derive(Debug)]
pub struct TagScanner {
    state: State,
    code: u8,
    stack: Vec<u8>,
}

impl Default for TagScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl TagScanner {
    pub fn new() -> Self {
        Self {
            state: State::Text,
            code: 0,
            stack: Vec::new(),
        }
    }

    /// Nesting depth of currently open tags.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Tag codes currently open, outermost first.
    pub fn open_tags(&self) -> &[u8] {
        &self.stack
    }

    /// Feed one chunk, returning the events it completes.
    pub fn scan(&mut self, chunk: &[u8]) -> Vec<Event> {
        let mut events = Vec::new();
        // Start of the pending literal run within this chunk, if any.
        let mut text_start: Option<usize> = None;
        let mut i = 0;
        while i < chunk.len() {
            let b = chunk[i];
            match self.state {
                State::Text => {
                    if b == ESC || b == IAC {
                        self.flush(&mut events, chunk, text_start.take(), i);
                        self.state = if b == ESC { State::Esc } else { State::Iac };
                    } else if text_start.is_none() {
                        text_start = Some(i);
                    }
                }
                State::Esc => match b {
                    b'<' => {
                        self.state = State::OpenDigit1;
                        self.code = 0;
                    }
                    b'|' => {
                        events.push(Event::ArgEnd);
                        self.state = State::Text;
                    }
                    b'>' => {
                        self.state = State::CloseDigit1;
                        self.code = 0;
                    }
                    _ => {
                        // Not an introducer after all. The ESC may have been
                        // the last byte of the previous chunk, in which case
                        // it can only be replayed as its own one-byte run.
                        if i == 0 {
                            self.emit_literal(&mut events, vec![ESC]);
                        } else {
                            text_start = Some(i - 1);
                        }
                        self.state = State::Text;
                        continue;
                    }
                },
                State::OpenDigit1 | State::CloseDigit1 => {
                    if b.is_ascii_digit() {
                        self.code = b - b'0';
                        self.state = if self.state == State::OpenDigit1 {
                            State::OpenDigit2
                        } else {
                            State::CloseDigit2
                        };
                    } else {
                        // Partial tag dropped, byte consumed.
                        self.state = State::Text;
                    }
                }
                State::OpenDigit2 => {
                    if b.is_ascii_digit() {
                        self.code = self.code * 10 + (b - b'0');
                        self.stack.push(self.code);
                        events.push(Event::TagOpen(self.code));
                    }
                    self.state = State::Text;
                }
                State::CloseDigit2 => {
                    self.state = State::Text;
                    if b.is_ascii_digit() {
                        self.code = self.code * 10 + (b - b'0');
                        if self.stack.last() == Some(&self.code) {
                            self.stack.pop();
                            events.push(Event::TagClose(self.code));
                            if self.code == 10 {
                                self.state = State::PromptTag;
                            }
                        }
                        // Mismatched close: no event, stack untouched.
                    }
                }
                State::PromptTag => {
                    if b == IAC {
                        self.state = State::PromptIac;
                    } else {
                        self.state = State::Text;
                        continue;
                    }
                }
                State::PromptIac => {
                    if b == GA {
                        events.push(Event::Prompt);
                        self.state = State::Text;
                    } else {
                        // Ordinary TELNET traffic; the buffered IAC is still
                        // pending, so redo this byte in the IAC state.
                        self.state = State::Iac;
                        continue;
                    }
                }
                State::Iac => {
                    self.state = State::Text;
                    if b == IAC {
                        // Escaped literal 0xFF data byte.
                        if text_start.is_none() {
                            text_start = Some(i);
                        }
                    } else if (WILL..=DONT).contains(&b) {
                        self.state = State::IacVerb(b);
                    } else {
                        events.push(Event::Telnet(vec![IAC, b]));
                    }
                }
                State::IacVerb(verb) => {
                    events.push(Event::Telnet(vec![IAC, verb, b]));
                    self.state = State::Text;
                }
            }
            i += 1;
        }
        if self.state == State::Text {
            self.flush(&mut events, chunk, text_start, chunk.len());
        }
        events
    }

    fn flush(&self, events: &mut Vec<Event>, chunk: &[u8], start: Option<usize>, end: usize) {
        if let Some(start) = start {
            if end > start {
                self.emit_literal(events, chunk[start..end].to_vec());
            }
        }
    }

    /// Literal bytes belong to the innermost open tag's body when the stack
    /// is non-empty, to top-level prose otherwise.
    fn emit_literal(&self, events: &mut Vec<Event>, bytes: Vec<u8>) {
        if self.stack.is_empty() {
            events.push(Event::Text(bytes));
        } else {
            events.push(Event::TagText(bytes));
        }
    }
}
