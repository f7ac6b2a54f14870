//! Tag semantics: turning scanner events into client-visible output.
//!
//! One [`Session`] per connection. It owns the output buffer the transport
//! flushes to the client, the tag body/argument buffers, the current room,
//! and the deferred-prompt slot. Rooms and exits are handed to the
//! [`MapStore`] collaborator; a store failure is logged and never disturbs
//! the session.
//!
//! Structured data the terminal cannot render directly (hit points, combat
//! status and the like) is re-emitted as marker lines starting with U+2234
//! so client-side triggers can match on them.

use log::warn;

use crate::logutil::preview;
use crate::proto::color::{self, ColorMode};
use crate::proto::latin1;
use crate::proto::room::{Room, MAPPER_MARKER, FIELD_SEP};
use crate::proto::scanner::Event;
use crate::storage::MapStore;

/// U+2234 THEREFORE, the prefix of every structured marker line.
pub const MARKER: &str = "\u{2234}";

/// Per-session rendering options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderConfig {
    pub color_mode: ColorMode,
    /// Render tag 50 (full hp/sp/ep status) instead of dropping it.
    pub full_status: bool,
}

/// Interpreter state for one connection.
pub struct Session<S: MapStore> {
    out: Vec<u8>,
    body: Vec<u8>,
    arg: Option<String>,
    /// Codes of tags the interpreter has seen opened, innermost last.
    open: Vec<u8>,
    room: Option<Room>,
    /// The newest spec_prompt body, withheld until a real prompt arrives.
    deferred_prompt: Option<Vec<u8>>,
    render: RenderConfig,
    store: S,
}

impl<S: MapStore> Session<S> {
    pub fn new(render: RenderConfig, store: S) -> Self {
        Self {
            out: Vec::new(),
            body: Vec::new(),
            arg: None,
            open: Vec::new(),
            room: None,
            deferred_prompt: None,
            render,
            store,
        }
    }

    /// The room the player was last reported in, if any.
    pub fn current_room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    /// Take everything rendered so far; the transport sends this verbatim.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out)
    }

    pub fn handle(&mut self, event: Event) {
        match event {
            Event::Text(bytes) => latin1::append(&mut self.out, &bytes),
            Event::TagText(bytes) => latin1::append(&mut self.body, &bytes),
            Event::Telnet(bytes) => self.out.extend_from_slice(&bytes),
            Event::ArgEnd => {
                self.arg = Some(String::from_utf8_lossy(&self.body).into_owned());
                self.body.clear();
            }
            Event::TagOpen(code) => {
                // The server sometimes opens a new tag without closing the
                // previous one; finalize the pending body under the enclosing
                // tag so it is not lost or misattributed.
                if let Some(&enclosing) = self.open.last() {
                    if !self.body.is_empty() || self.arg.is_some() {
                        self.finalize(enclosing);
                    }
                }
                self.open.push(code);
            }
            Event::TagClose(code) => {
                self.finalize(code);
                self.open.pop();
            }
            Event::Prompt => {
                if let Some(body) = self.deferred_prompt.take() {
                    self.out.extend_from_slice(&body);
                }
            }
        }
    }

    fn finalize(&mut self, code: u8) {
        let body = std::mem::take(&mut self.body);
        let arg = self.arg.take();
        match code {
            5 | 6 => {}   // connection success/failure
            10 => self.render_message(arg.as_deref(), body),
            11 => {}      // clear screen
            20 | 21 => self.render_colored(code == 20, arg.as_deref(), &body),
            22..=25 | 31 => self.out.extend_from_slice(&body), // attributes, links
            40 => self.marker_line("cast clear", &body),
            41 => self.marker_line("cast", &body),
            42 => self.marker_line("skill", &body),
            50 => self.render_full_status(&body),
            51 => self.render_status(&body),
            // Telemetry the terminal has no use for: player info, exp,
            // party status, location.
            52..=54 | 60 | 62 | 63 => {}
            64 => self.marker_line("prot", &body),
            70 => self.marker_line("target", &body),
            99 => self.render_mapper(&body),
            other => {
                self.out.extend_from_slice(MARKER.as_bytes());
                self.out
                    .extend_from_slice(format!("unknown tag {other} ").as_bytes());
                self.out.extend_from_slice(&body);
                self.out.push(b'\n');
            }
        }
    }

    /// Tag 10: a typed message. The subtype argument decides the rendering.
    fn render_message(&mut self, arg: Option<&str>, body: Vec<u8>) {
        match arg {
            // spec_prompt arrives every second as a keep-alive; only the one
            // coinciding with a real prompt (IAC GA) may be shown. Later
            // keep-alives replace earlier ones.
            Some("spec_prompt") => {
                self.deferred_prompt = Some(body);
                return;
            }
            Some("spec_map") if body.as_slice() == b"NoMapSupport" => return,
            Some("spec_map") | Some("spec_news") | None => {}
            Some(kind) => {
                self.out.extend_from_slice(kind.as_bytes());
                self.out.extend_from_slice(b": ");
            }
        }
        self.out.extend_from_slice(&body);
    }

    /// Tags 20/21: wrap the body in a color sequence built from the six hex
    /// digit RGB argument. Without a usable argument the body is dropped, as
    /// it repeats in an uncolored tag anyway.
    fn render_colored(&mut self, foreground: bool, arg: Option<&str>, body: &[u8]) {
        let Some(arg) = arg else { return };
        let Some((r, g, b)) = color::parse_rgb(arg) else {
            warn!("unparseable color argument {:?}", arg);
            return;
        };
        let seq = color::sequence(self.render.color_mode, foreground, r, g, b);
        self.out.extend_from_slice(seq.as_bytes());
        self.out.extend_from_slice(body);
        self.out.extend_from_slice(color::RESET.as_bytes());
    }

    /// Tag 51: "hp sp ep".
    fn render_status(&mut self, body: &[u8]) {
        let Some(n) = parse_ints(body, 3) else {
            warn!("malformed hp status: {}", preview(body));
            return;
        };
        let line = format!("{MARKER}hp {} {} {}\n", n[0], n[1], n[2]);
        self.out.extend_from_slice(line.as_bytes());
    }

    /// Tag 50: "hp hpmax sp spmax ep epmax", behind the full_status flag.
    fn render_full_status(&mut self, body: &[u8]) {
        if !self.render.full_status {
            return;
        }
        let Some(n) = parse_ints(body, 6) else {
            warn!("malformed full status: {}", preview(body));
            return;
        };
        let line = format!(
            "{MARKER}fhp {}/{} {}/{} {}/{}\n",
            n[0], n[1], n[2], n[3], n[4], n[5]
        );
        self.out.extend_from_slice(line.as_bytes());
    }

    fn marker_line(&mut self, label: &str, body: &[u8]) {
        self.out.extend_from_slice(MARKER.as_bytes());
        self.out.extend_from_slice(label.as_bytes());
        if !body.is_empty() {
            self.out.push(b' ');
            self.out.extend_from_slice(body);
        }
        self.out.push(b'\n');
    }

    /// Tag 99: mapper payload. Parse failures leave the session and the
    /// store untouched.
    fn render_mapper(&mut self, body: &[u8]) {
        let text = String::from_utf8_lossy(body);
        let Some(rest) = text.strip_prefix(MAPPER_MARKER) else { return };
        let Some(rest) = rest.strip_prefix(FIELD_SEP) else { return };
        if rest == "REALM_MAP" {
            let area = self
                .room
                .as_ref()
                .map(|r| r.area.as_str())
                .unwrap_or("(unknown)");
            let msg = format!("Exited to map from {area}.\n");
            self.out.extend_from_slice(msg.as_bytes());
            self.room = None;
            return;
        }
        match Room::parse(&text) {
            Ok(new) => {
                if let Err(e) = self.store.add_room(&new) {
                    warn!("add_room {}: {e}", new.id);
                }
                match self.room.as_ref() {
                    Some(prev) if prev.area == new.area => {
                        if let Err(e) = self.store.add_exit(prev, &new) {
                            warn!("add_exit {} -> {}: {e}", prev.id, new.id);
                        }
                        let msg = format!("Moved {}: {}\n", new.direction, new.short_desc);
                        self.out.extend_from_slice(msg.as_bytes());
                    }
                    _ => {
                        let msg = format!(
                            "Entered area {} with direction {}, {}doors\n",
                            new.area,
                            new.direction,
                            if new.indoors { "in" } else { "out" }
                        );
                        self.out.extend_from_slice(msg.as_bytes());
                    }
                }
                self.room = Some(new);
            }
            Err(e) => warn!("unparseable mapper payload ({e}): {}", preview(body)),
        }
    }
}

/// Take the first `count` whitespace-separated integers; None unless all of
/// them parse.
fn parse_ints(body: &[u8], count: usize) -> Option<Vec<i64>> {
    let text = String::from_utf8_lossy(body);
    let nums: Vec<i64> = text
        .split_whitespace()
        .take(count)
        .map_while(|w| w.parse().ok())
        .collect();
    (nums.len() == count).then_some(nums)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryMapStore;

    fn session() -> Session<MemoryMapStore> {
        Session::new(RenderConfig::default(), MemoryMapStore::new())
    }

    fn render(session: &mut Session<MemoryMapStore>, code: u8, arg: Option<&str>, body: &[u8]) {
        session.handle(Event::TagOpen(code));
        if let Some(arg) = arg {
            session.handle(Event::TagText(arg.as_bytes().to_vec()));
            session.handle(Event::ArgEnd);
        }
        if !body.is_empty() {
            session.handle(Event::TagText(body.to_vec()));
        }
        session.handle(Event::TagClose(code));
    }

    #[test]
    fn plain_text_is_recoded_to_utf8() {
        let mut s = session();
        s.handle(Event::Text(b"n\xe4kymiss\xe4".to_vec()));
        assert_eq!(s.take_output(), "näkymissä".as_bytes());
    }

    #[test]
    fn typed_message_gets_its_kind_as_prefix() {
        let mut s = session();
        render(&mut s, 10, Some("chan_newbie"), b"hello\n");
        assert_eq!(s.take_output(), b"chan_newbie: hello\n");
    }

    #[test]
    fn news_messages_have_no_prefix() {
        let mut s = session();
        render(&mut s, 10, Some("spec_news"), b"MOTD\n");
        assert_eq!(s.take_output(), b"MOTD\n");
    }

    #[test]
    fn no_map_support_notice_is_suppressed() {
        let mut s = session();
        render(&mut s, 10, Some("spec_map"), b"NoMapSupport");
        assert!(s.take_output().is_empty());
    }

    #[test]
    fn connection_and_clear_tags_emit_nothing() {
        let mut s = session();
        for code in [5, 6, 11, 52, 53, 54, 60, 62, 63] {
            render(&mut s, code, None, b"ignored");
        }
        assert!(s.take_output().is_empty());
    }

    #[test]
    fn attribute_tags_pass_their_body() {
        let mut s = session();
        for code in [22, 23, 24, 25, 31] {
            render(&mut s, code, None, b"x");
        }
        assert_eq!(s.take_output(), b"xxxxx");
    }

    #[test]
    fn foreground_color_wraps_body() {
        let mut s = session();
        render(&mut s, 20, Some("ff0000"), b"red text");
        assert_eq!(s.take_output(), b"\x1b[38;5;9mred text\x1b[0m");
    }

    #[test]
    fn background_color_uses_48() {
        let mut s = Session::new(
            RenderConfig {
                color_mode: ColorMode::Direct,
                full_status: false,
            },
            MemoryMapStore::new(),
        );
        render(&mut s, 21, Some("000080"), b"navy");
        assert_eq!(s.take_output(), b"\x1b[48;2;0;0;128mnavy\x1b[0m");
    }

    #[test]
    fn color_without_argument_drops_body() {
        let mut s = session();
        render(&mut s, 20, None, b"body");
        assert!(s.take_output().is_empty());
    }

    #[test]
    fn hp_status_becomes_marker_line() {
        let mut s = session();
        render(&mut s, 51, None, b"100 200 300");
        assert_eq!(s.take_output(), "\u{2234}hp 100 200 300\n".as_bytes());
    }

    #[test]
    fn malformed_hp_status_is_dropped() {
        let mut s = session();
        render(&mut s, 51, None, b"100 two 300");
        assert!(s.take_output().is_empty());
    }

    #[test]
    fn full_status_is_gated_by_config() {
        let mut s = session();
        render(&mut s, 50, None, b"1 2 3 4 5 6");
        assert!(s.take_output().is_empty());

        let mut s = Session::new(
            RenderConfig {
                color_mode: ColorMode::Xterm256,
                full_status: true,
            },
            MemoryMapStore::new(),
        );
        render(&mut s, 50, None, b"1 2 3 4 5 6");
        assert_eq!(s.take_output(), "\u{2234}fhp 1/2 3/4 5/6\n".as_bytes());
    }

    #[test]
    fn cast_and_skill_markers_carry_their_body() {
        let mut s = session();
        render(&mut s, 40, None, b"");
        render(&mut s, 41, None, b"magic missile");
        render(&mut s, 42, None, b"looting");
        assert_eq!(
            s.take_output(),
            "\u{2234}cast clear\n\u{2234}cast magic missile\n\u{2234}skill looting\n".as_bytes()
        );
        // A clear that does carry a payload keeps it.
        render(&mut s, 40, None, b"residue");
        assert_eq!(s.take_output(), "\u{2234}cast clear residue\n".as_bytes());
    }

    #[test]
    fn prot_and_target_markers() {
        let mut s = session();
        render(&mut s, 64, None, b"force field");
        render(&mut s, 70, None, b"orc (hurt)");
        assert_eq!(
            s.take_output(),
            "\u{2234}prot force field\n\u{2234}target orc (hurt)\n".as_bytes()
        );
    }

    #[test]
    fn unknown_tag_is_flagged() {
        let mut s = session();
        render(&mut s, 77, None, b"mystery");
        assert_eq!(s.take_output(), "\u{2234}unknown tag 77 mystery\n".as_bytes());
    }

    #[test]
    fn telnet_bytes_pass_verbatim() {
        let mut s = session();
        s.handle(Event::Telnet(vec![0xff, 0xfb, 0x01]));
        assert_eq!(s.take_output(), [0xff, 0xfb, 0x01]);
    }

    #[test]
    fn spec_prompt_is_deferred_until_prompt_event() {
        let mut s = session();
        render(&mut s, 10, Some("spec_prompt"), b"hp 10>");
        assert!(s.take_output().is_empty());
        s.handle(Event::Prompt);
        assert_eq!(s.take_output(), b"hp 10>");
        // Flushed exactly once.
        s.handle(Event::Prompt);
        assert!(s.take_output().is_empty());
    }

    #[test]
    fn newer_keepalive_prompt_replaces_older() {
        let mut s = session();
        render(&mut s, 10, Some("spec_prompt"), b"old>");
        render(&mut s, 10, Some("spec_prompt"), b"new>");
        s.handle(Event::Prompt);
        assert_eq!(s.take_output(), b"new>");
    }

    #[test]
    fn unclosed_tag_is_finalized_on_next_open() {
        let mut s = session();
        // Outer tag 22 never closes before 23 opens inside it; its pending
        // body flushes under the enclosing code rather than vanishing.
        s.handle(Event::TagOpen(22));
        s.handle(Event::TagText(b"bold ".to_vec()));
        s.handle(Event::TagOpen(23));
        s.handle(Event::TagText(b"italic".to_vec()));
        s.handle(Event::TagClose(23));
        assert_eq!(s.take_output(), b"bold italic");
    }

    #[test]
    fn entering_area_reports_and_stores_room() {
        let mut s = session();
        render(
            &mut s,
            99,
            None,
            b"BAT_MAPPER;;arelium;;room1;;north;;0;;Gate;;The city gate.;;s,n;;",
        );
        assert_eq!(
            s.take_output(),
            b"Entered area arelium with direction north, outdoors\n"
        );
        assert_eq!(s.current_room().unwrap().id, "room1");
    }

    #[test]
    fn bad_mapper_payload_changes_nothing() {
        let mut s = session();
        render(&mut s, 99, None, b"BAT_MAPPER;;broken");
        assert!(s.take_output().is_empty());
        assert!(s.current_room().is_none());
    }

    #[test]
    fn non_mapper_body_in_tag_99_is_ignored() {
        let mut s = session();
        render(&mut s, 99, None, b"something else entirely");
        assert!(s.take_output().is_empty());
    }
}
