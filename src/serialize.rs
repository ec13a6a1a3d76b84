//! Binary archive of a [`DocumentState`].
//!
//! A compact rkyv encoding for callers that keep many documents in a cache
//! and do not need the human-readable JSON files. Archives carry magic bytes
//! and a schema version; anything else is rejected before decoding.

use rkyv::rancor::Error as RkyvError;
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};

use crate::error::{ReconcileError, ReconcileResult};
use crate::key::Key;
use crate::snapshot::DocumentState;

/// Current schema version.
/// Increment this when making breaking changes to `SerState`.
pub const SCHEMA_VERSION: u32 = 1;

/// Magic bytes for parakeet archives.
const MAGIC: [u8; 4] = *b"PKT1";

/// Flat serializable form of a document state.
#[derive(Archive, RkyvSerialize, RkyvDeserialize, Debug)]
struct SerState {
    magic: [u8; 4],
    schema_version: u32,
    /// (key, paragraph) in key order
    entries: Vec<(String, String)>,
    /// Retained keys in sorted order
    retained: Vec<String>,
}

/// Serialize a document state to bytes.
pub fn to_bytes(state: &DocumentState) -> ReconcileResult<Vec<u8>> {
    let ser = SerState {
        magic: MAGIC,
        schema_version: SCHEMA_VERSION,
        entries: state
            .snapshot
            .iter()
            .map(|(k, v)| (k.as_str().to_owned(), v.to_owned()))
            .collect(),
        retained: state.retained.iter().map(|k| k.as_str().to_owned()).collect(),
    };
    Ok(rkyv::to_bytes::<RkyvError>(&ser)?.to_vec())
}

/// Deserialize a document state.
///
/// # Errors
///
/// - [`ReconcileError::Serialize`] if the archive is corrupted
/// - [`ReconcileError::InvalidMagic`] if it is not a parakeet archive
/// - [`ReconcileError::VersionMismatch`] if it was written by another schema
pub fn from_bytes(bytes: &[u8]) -> ReconcileResult<DocumentState> {
    // Archived data must be aligned; caller buffers may not be
    let mut aligned = AlignedVec::<16>::with_capacity(bytes.len());
    aligned.extend_from_slice(bytes);

    let archived = rkyv::access::<ArchivedSerState, RkyvError>(&aligned)?;

    let magic: [u8; 4] = archived.magic;
    if magic != MAGIC {
        return Err(ReconcileError::InvalidMagic {
            expected: MAGIC,
            found: magic,
        });
    }

    let version: u32 = archived.schema_version.into();
    if version != SCHEMA_VERSION {
        return Err(ReconcileError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found: version,
        });
    }

    let ser = rkyv::deserialize::<SerState, RkyvError>(archived)?;
    Ok(DocumentState::new(
        ser.entries.into_iter().map(|(k, v)| (Key::from_raw(k), v)).collect(),
        ser.retained.into_iter().map(Key::from_raw).collect(),
    ))
}
