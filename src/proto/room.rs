//! Mapper payload parsing.
//!
//! With `set client_mapper_toggle on`, the server describes the player's
//! location inside tag 99 as a `;;`-delimited record:
//!
//! `BAT_MAPPER;;area;;id;;direction;;indoors;;short;;long;;exits`
//!
//! The exits field is opaque here (the in-game format packs it further); it
//! runs to the next `;;` if one follows, otherwise to the end of the payload.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Leading marker token of every mapper payload.
pub const MAPPER_MARKER: &str = "BAT_MAPPER";

/// Field delimiter.
pub const FIELD_SEP: &str = ";;";

/// One visited room as reported by the mapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub direction: String,
    pub short_desc: String,
    pub long_desc: String,
    pub area: String,
    /// Raw exits string, not parsed further.
    pub exits: String,
    pub indoors: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomParseError {
    #[error("payload does not start with the mapper marker")]
    MissingMarker,
    #[error("missing field separator before {0}")]
    MissingField(&'static str),
}

impl Room {
    /// Parse a full mapper payload. On failure the caller must leave its own
    /// state untouched; parsing has no side effects of its own.
    pub fn parse(payload: &str) -> Result<Room, RoomParseError> {
        use RoomParseError::MissingField;
        let mut fields = payload.splitn(8, FIELD_SEP);
        if fields.next() != Some(MAPPER_MARKER) {
            return Err(RoomParseError::MissingMarker);
        }
        let area = fields.next().ok_or(MissingField("area"))?;
        let id = fields.next().ok_or(MissingField("id"))?;
        let direction = fields.next().ok_or(MissingField("direction"))?;
        let indoors = fields.next().ok_or(MissingField("indoors"))?;
        let short_desc = fields.next().ok_or(MissingField("short description"))?;
        let long_desc = fields.next().ok_or(MissingField("long description"))?;
        let rest = fields.next().ok_or(MissingField("exits"))?;
        let exits = rest.split(FIELD_SEP).next().unwrap_or_default();
        Ok(Room {
            id: id.to_string(),
            direction: direction.to_string(),
            short_desc: short_desc.to_string(),
            long_desc: long_desc.to_string(),
            area: area.to_string(),
            exits: exits.to_string(),
            // A single digit; anything unreadable counts as outdoors.
            indoors: indoors.trim().parse::<i32>().map(|v| v != 0).unwrap_or(false),
        })
    }
}
