//! Save-state plumbing.
//!
//! Boards gather their mutable state into a serde snapshot struct and encode
//! it with bincode behind a small header, so a snapshot from one board (or an
//! older layout) is rejected before any state is touched.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SaveStateError {
    #[error("failed to encode save state: {0}")]
    Encode(#[source] bincode::Error),
    #[error("failed to decode save state: {0}")]
    Decode(#[source] bincode::Error),
    #[error("save state belongs to board `{found}`, expected `{expected}`")]
    BoardMismatch { expected: String, found: String },
    #[error("save state format version {found}, expected {expected}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("save state field `{field}` holds {found} entries, expected {expected}")]
    SizeMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveHeader {
    pub board: String,
    pub version: u32,
}

impl SaveHeader {
    pub fn new(board: &str, version: u32) -> Self {
        Self {
            board: board.to_string(),
            version,
        }
    }
}

pub trait SaveState {
    fn save_state(&self) -> Result<Vec<u8>, SaveStateError>;
    fn load_state(&mut self, data: &[u8]) -> Result<(), SaveStateError>;
}

/// Buffer sizes a decoded snapshot must share with the live state.
///
/// Boards check every fixed-size buffer before they assign any part of a
/// snapshot, so a well-formed header with a damaged body is refused whole.
pub trait Layout {
    fn check_layout(&self, saved: &Self, field: &'static str) -> Result<(), SaveStateError>;
}

pub fn check_len(field: &'static str, expected: usize, found: usize) -> Result<(), SaveStateError> {
    if expected == found {
        Ok(())
    } else {
        Err(SaveStateError::SizeMismatch { field, expected, found })
    }
}

impl<T> Layout for Vec<T> {
    fn check_layout(&self, saved: &Self, field: &'static str) -> Result<(), SaveStateError> {
        check_len(field, self.len(), saved.len())
    }
}

impl<T: Layout, const N: usize> Layout for [T; N] {
    fn check_layout(&self, saved: &Self, field: &'static str) -> Result<(), SaveStateError> {
        self.iter().zip(saved).try_for_each(|(live, saved)| live.check_layout(saved, field))
    }
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    header: &'a SaveHeader,
    body: &'a T,
}

#[derive(Deserialize)]
struct OwnedEnvelope<T> {
    header: SaveHeader,
    body: T,
}

pub fn encode<T: Serialize>(header: &SaveHeader, body: &T) -> Result<Vec<u8>, SaveStateError> {
    bincode::serialize(&Envelope { header, body }).map_err(SaveStateError::Encode)
}

pub fn decode<T: DeserializeOwned>(expected: &SaveHeader, data: &[u8]) -> Result<T, SaveStateError> {
    // Check the header on its own first so a foreign body never gets parsed.
    let header: SaveHeader = bincode::deserialize(data).map_err(SaveStateError::Decode)?;
    if header.board != expected.board {
        return Err(SaveStateError::BoardMismatch {
            expected: expected.board.clone(),
            found: header.board,
        });
    }
    if header.version != expected.version {
        return Err(SaveStateError::VersionMismatch {
            expected: expected.version,
            found: header.version,
        });
    }
    let envelope: OwnedEnvelope<T> = bincode::deserialize(data).map_err(SaveStateError::Decode)?;
    Ok(envelope.body)
}
