//! # Map persistence layer
//!
//! Rooms and exits discovered through the mapper protocol outlive the
//! connection that saw them, so the interpreter reports them to a
//! [`MapStore`]. The store contract is deliberately small and idempotent:
//! re-adding a known room id or a duplicate edge is not an error, and the
//! first write wins. Interpreter code treats every store call as
//! fire-and-forget - a failure is logged and the session carries on.
//!
//! [`SledMapStore`] is the production implementation (embedded sled database,
//! one tree for rooms, one for exits); [`MemoryMapStore`] backs the offline
//! filter mode and tests.

use std::path::Path;
use std::sync::{Arc, Mutex};

use log::debug;
use thiserror::Error;

use crate::proto::room::Room;

const TREE_ROOMS: &str = "rooms";
const TREE_EXITS: &str = "exits";

/// Separator between the two room ids in an exit key. Room ids are
/// apr1-crypt strings and never contain control bytes.
const EXIT_KEY_SEP: u8 = 0x1f;

/// Errors that can arise while persisting map data.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around room serialization errors.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistence collaborator for the tag interpreter.
pub trait MapStore {
    /// Record a room. Idempotent: a known id is left as it was.
    fn add_room(&self, room: &Room) -> Result<(), StoreError>;

    /// Record a traversal from `from` to `to` in `to.direction`. Idempotent
    /// on duplicate edges.
    fn add_exit(&self, from: &Room, to: &Room) -> Result<(), StoreError>;
}

impl<S: MapStore + ?Sized> MapStore for &S {
    fn add_room(&self, room: &Room) -> Result<(), StoreError> {
        (**self).add_room(room)
    }

    fn add_exit(&self, from: &Room, to: &Room) -> Result<(), StoreError> {
        (**self).add_exit(from, to)
    }
}

impl<S: MapStore + ?Sized> MapStore for Arc<S> {
    fn add_room(&self, room: &Room) -> Result<(), StoreError> {
        (**self).add_room(room)
    }

    fn add_exit(&self, from: &Room, to: &Room) -> Result<(), StoreError> {
        (**self).add_exit(from, to)
    }
}

/// Sled-backed store shared by all connections of one proxy process.
pub struct SledMapStore {
    _db: sled::Db,
    rooms: sled::Tree,
    exits: sled::Tree,
}

impl SledMapStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        let db = sled::open(path)?;
        let rooms = db.open_tree(TREE_ROOMS)?;
        let exits = db.open_tree(TREE_EXITS)?;
        Ok(Self {
            _db: db,
            rooms,
            exits,
        })
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn exit_count(&self) -> usize {
        self.exits.len()
    }

    pub fn get_room(&self, id: &str) -> Result<Option<Room>, StoreError> {
        match self.rooms.get(id.as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    fn exit_key(from: &Room, to: &Room) -> Vec<u8> {
        let mut key = Vec::with_capacity(from.id.len() + to.id.len() + 1);
        key.extend_from_slice(from.id.as_bytes());
        key.push(EXIT_KEY_SEP);
        key.extend_from_slice(to.id.as_bytes());
        key
    }
}

impl MapStore for SledMapStore {
    fn add_room(&self, room: &Room) -> Result<(), StoreError> {
        if self.rooms.contains_key(room.id.as_bytes())? {
            return Ok(());
        }
        self.rooms
            .insert(room.id.as_bytes(), serde_json::to_vec(room)?)?;
        debug!("stored room {} ({})", room.id, room.short_desc);
        Ok(())
    }

    fn add_exit(&self, from: &Room, to: &Room) -> Result<(), StoreError> {
        let key = Self::exit_key(from, to);
        if self.exits.contains_key(&key)? {
            return Ok(());
        }
        self.exits.insert(key, to.direction.as_bytes())?;
        debug!("stored exit {} -> {} ({})", from.id, to.id, to.direction);
        Ok(())
    }
}

/// In-memory store for the filter mode and tests; records everything it is
/// given and lets callers inspect it.
#[derive(Default)]
pub struct MemoryMapStore {
    rooms: Mutex<Vec<Room>>,
    /// (from id, to id, direction)
    exits: Mutex<Vec<(String, String, String)>>,
}

impl MemoryMapStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rooms(&self) -> Vec<Room> {
        self.rooms.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn exits(&self) -> Vec<(String, String, String)> {
        self.exits.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl MapStore for MemoryMapStore {
    fn add_room(&self, room: &Room) -> Result<(), StoreError> {
        if let Ok(mut rooms) = self.rooms.lock() {
            if !rooms.iter().any(|r| r.id == room.id) {
                rooms.push(room.clone());
            }
        }
        Ok(())
    }

    fn add_exit(&self, from: &Room, to: &Room) -> Result<(), StoreError> {
        if let Ok(mut exits) = self.exits.lock() {
            let edge = (from.id.clone(), to.id.clone(), to.direction.clone());
            if !exits.iter().any(|e| e.0 == edge.0 && e.1 == edge.1) {
                exits.push(edge);
            }
        }
        Ok(())
    }
}
