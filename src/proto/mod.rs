//! # BC protocol engine
//!
//! Everything needed to translate between the BatMUD "batclient" wire
//! protocol and what a plain terminal client understands, independent of any
//! socket handling:
//!
//! - [`scanner`] - byte-level tag/TELNET scanner producing [`scanner::Event`]s
//! - [`session`] - tag-semantics interpreter and per-connection state
//! - [`recode`] - client-side UTF-8 to ISO-8859-1 transducer
//! - [`color`] - RGB to terminal escape sequence encoding
//! - [`room`] - mapper payload parsing
//! - [`latin1`] - ISO-8859-1 to UTF-8 buffer append helper
//!
//! All of these are pure transformations over in-memory buffers. One
//! [`scanner::TagScanner`] plus one [`session::Session`] serve exactly one
//! connection; nothing here is shared between connections.

pub mod color;
pub mod latin1;
pub mod recode;
pub mod room;
pub mod scanner;
pub mod session;
