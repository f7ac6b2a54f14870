//! spec_prompt keep-alives through the full pipeline: the server sends one
//! every second, but only the one coinciding with a real interactive prompt
//! (IAC GA right after the tag close) may reach the client.

use batproxy::proto::scanner::TagScanner;
use batproxy::proto::session::{RenderConfig, Session};
use batproxy::storage::MemoryMapStore;

struct Pipe {
    scanner: TagScanner,
    session: Session<MemoryMapStore>,
}

impl Pipe {
    fn new() -> Self {
        Self {
            scanner: TagScanner::new(),
            session: Session::new(RenderConfig::default(), MemoryMapStore::new()),
        }
    }

    fn feed(&mut self, bytes: &[u8]) -> Vec<u8> {
        for event in self.scanner.scan(bytes) {
            self.session.handle(event);
        }
        self.session.take_output()
    }
}

#[test]
fn deferred_until_go_ahead_then_flushed_once() {
    let mut pipe = Pipe::new();
    let out = pipe.feed(b"\x1b<10spec_prompt\x1b|hp 100>\x1b>10");
    assert!(out.is_empty(), "keep-alive prompt leaked: {out:?}");

    let out = pipe.feed(b"\xff\xf9");
    assert_eq!(out, b"hp 100>");

    // A later prompt marker with no new keep-alive body flushes nothing
    // beyond the message itself.
    let out = pipe.feed(b"\x1b<10chan_bat\x1b|hi\x1b>10\xff\xf9");
    assert_eq!(out, b"chan_bat: hi");
}

#[test]
fn periodic_prompts_without_ga_stay_silent() {
    let mut pipe = Pipe::new();
    for _ in 0..5 {
        let out = pipe.feed(b"\x1b<10spec_prompt\x1b|hp 100>\x1b>10");
        assert!(out.is_empty());
    }
    // The prompt that finally matters carries the newest body.
    let out = pipe.feed(b"\x1b<10spec_prompt\x1b|hp 64>\x1b>10\xff\xf9");
    assert_eq!(out, b"hp 64>");
}

#[test]
fn interleaved_text_still_flows() {
    let mut pipe = Pipe::new();
    let out = pipe.feed(b"The orc arrives.\r\n\x1b<10spec_prompt\x1b|hp 100>\x1b>10");
    assert_eq!(out, b"The orc arrives.\r\n");
    let out = pipe.feed(b"\xff\xf9");
    assert_eq!(out, b"hp 100>");
}

#[test]
fn other_message_types_are_not_deferred() {
    let mut pipe = Pipe::new();
    let out = pipe.feed(b"\x1b<10chan_bat\x1b|Zin the wizard\x1b>10");
    assert_eq!(out, b"chan_bat: Zin the wizard");
}
