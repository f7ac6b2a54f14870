//! # batproxy - a batclient-protocol proxy for plain terminal MUD clients
//!
//! BatMUD's "batclient mode" multiplexes a control protocol (BC tags) into
//! the game's text stream: colors, status telemetry, prompts and mapper data
//! arrive as numbered in-band tags. Graphical clients consume it natively;
//! terminal clients like tinyfugue just see garbage. batproxy sits between a
//! terminal client and the game, decodes the tags back into ANSI escapes and
//! greppable marker lines, stores the mapper's room graph locally, and
//! recodes client keystrokes from UTF-8 to the ISO-8859-1 the server expects.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batproxy::config::Config;
//! use batproxy::proxy::ProxyServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let server = ProxyServer::new(config)?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`proto`] - the protocol engine: tag scanner, interpreter, input
//!   recoder, color encoding, mapper payload parsing
//! - [`proxy`] - TCP accept loop and per-connection byte pump
//! - [`storage`] - sled-backed persistence for rooms and exits
//! - [`config`] - configuration management and validation
//! - [`logutil`] - payload-safe logging helpers
//!
//! ## Architecture
//!
//! ```text
//! server bytes ──> TagScanner ──> events ──> Session ──> output ──> client
//!                      │                        │
//!                  tag stack              MapStore (sled)
//!
//! client bytes ──> InputRecoder ─────────────────────────────────> server
//! ```
//!
//! Everything in [`proto`] is a synchronous, allocation-only transformation;
//! sockets and socket errors live entirely in [`proxy`]. One scanner and one
//! session serve exactly one connection, so the transport layer can run one
//! task per connection without any shared protocol state.

pub mod config;
pub mod logutil;
pub mod proto;
pub mod proxy;
pub mod storage;
