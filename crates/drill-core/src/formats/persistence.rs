//! # Persistence Format
//!
//! Serialization for the stage store.
//!
//! Two encodings are supported:
//!
//! - **JSON** (default): the nested `learner -> question id -> state` map with
//!   camelCase fields and RFC 3339 timestamps. Human-readable and stable
//!   across rebuilds.
//! - **Binary**: Header (5 bytes) + postcard-serialized store.
//!   - 4 bytes: Magic ("DRIL")
//!   - 1 byte: Version
//!
//! ## Validation
//!
//! Both decoders check the payload size against
//! [`MAX_STORE_PAYLOAD_SIZE`](crate::primitives::MAX_STORE_PAYLOAD_SIZE)
//! before parsing; the binary decoder also validates the header first.

use crate::store::StageStore;
use crate::{DrillError, primitives};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum valid binary size (header only).
const MIN_FILE_SIZE: usize = 5;

// =============================================================================
// STORE FORMAT
// =============================================================================

/// On-disk encoding of the stage store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreFormat {
    #[default]
    Json,
    Binary,
}

impl StoreFormat {
    /// File name used inside a subject directory.
    #[must_use]
    pub const fn file_name(&self) -> &'static str {
        match self {
            StoreFormat::Json => "stages.json",
            StoreFormat::Binary => "stages.bin",
        }
    }

    /// Encode a store in this format.
    pub fn encode(&self, store: &StageStore) -> Result<Vec<u8>, DrillError> {
        match self {
            StoreFormat::Json => store_to_json(store),
            StoreFormat::Binary => store_to_bytes(store),
        }
    }

    /// Decode a store from this format.
    pub fn decode(&self, bytes: &[u8]) -> Result<StageStore, DrillError> {
        match self {
            StoreFormat::Json => store_from_json(bytes),
            StoreFormat::Binary => store_from_bytes(bytes),
        }
    }
}

impl fmt::Display for StoreFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreFormat::Json => f.write_str("json"),
            StoreFormat::Binary => f.write_str("binary"),
        }
    }
}

// =============================================================================
// FILE HEADER
// =============================================================================

/// The header that precedes binary store data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl StoreHeader {
    /// Create a header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), DrillError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(DrillError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(DrillError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DrillError> {
        if bytes.len() < MIN_FILE_SIZE {
            return Err(DrillError::DeserializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for StoreHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// BINARY
// =============================================================================

/// Serialize a store to bytes (header + postcard payload).
pub fn store_to_bytes(store: &StageStore) -> Result<Vec<u8>, DrillError> {
    let payload =
        postcard::to_stdvec(store).map_err(|e| DrillError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(MIN_FILE_SIZE + payload.len());
    result.extend_from_slice(&StoreHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a store from header-prefixed bytes.
pub fn store_from_bytes(bytes: &[u8]) -> Result<StageStore, DrillError> {
    check_size(bytes)?;
    let header = StoreHeader::from_bytes(bytes)?;
    header.validate()?;

    postcard::from_bytes(&bytes[MIN_FILE_SIZE..]).map_err(|e| {
        DrillError::DeserializationError(format!("Failed to decode stage store: {}", e))
    })
}

// =============================================================================
// JSON
// =============================================================================

/// Serialize a store as pretty-printed JSON with a trailing newline.
pub fn store_to_json(store: &StageStore) -> Result<Vec<u8>, DrillError> {
    let mut bytes = serde_json::to_vec_pretty(store)
        .map_err(|e| DrillError::SerializationError(e.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Deserialize a store from JSON.
pub fn store_from_json(bytes: &[u8]) -> Result<StageStore, DrillError> {
    check_size(bytes)?;
    serde_json::from_slice(bytes).map_err(|e| {
        DrillError::DeserializationError(format!("Failed to decode stage store: {}", e))
    })
}

fn check_size(bytes: &[u8]) -> Result<(), DrillError> {
    if bytes.len() > primitives::MAX_STORE_PAYLOAD_SIZE {
        return Err(DrillError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            primitives::MAX_STORE_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestor::Ingestor;
    use serde_json::json;

    fn sample_store() -> StageStore {
        let record = Ingestor::parse_record(&json!({
            "user": "alice",
            "endedAt": "2024-01-01T10:00:00Z",
            "answered": [
                {"id": "q1", "correct": true},
                {"id": "q2", "correct": false, "at": "2024-01-01T09:30:00.250Z"},
            ]
        }))
        .expect("record");
        let mut store = StageStore::new();
        store.apply_session(&record);
        store
    }

    #[test]
    fn header_layout() {
        let bytes = StoreHeader::new().to_bytes();
        assert_eq!(&bytes[0..4], b"DRIL");
        assert_eq!(bytes[4], primitives::FORMAT_VERSION);
        let restored = StoreHeader::from_bytes(&bytes).expect("parse header");
        assert!(restored.validate().is_ok());
    }

    #[test]
    fn binary_save_load_save_is_bit_exact() {
        let store = sample_store();
        let first = store_to_bytes(&store).expect("serialize");
        let restored = store_from_bytes(&first).expect("deserialize");
        assert_eq!(restored, store);
        assert_eq!(store_to_bytes(&restored).expect("reserialize"), first);
    }

    #[test]
    fn json_preserves_sub_second_timestamps() {
        let store = sample_store();
        let bytes = store_to_json(&store).expect("serialize");
        let restored = store_from_json(&bytes).expect("deserialize");
        assert_eq!(restored, store);
        let text = String::from_utf8(bytes).expect("utf8");
        assert!(text.contains("2024-01-01T09:30:00.250Z"));
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = vec![0u8; 10];
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(store_from_bytes(&bytes).is_err());
    }

    #[test]
    fn short_data_rejected() {
        assert!(store_from_bytes(b"DRI").is_err());
    }

    #[test]
    fn corrupt_json_rejected() {
        assert!(store_from_json(b"{\"alice\": [").is_err());
    }

    #[test]
    fn format_file_names() {
        assert_eq!(StoreFormat::Json.file_name(), "stages.json");
        assert_eq!(StoreFormat::Binary.file_name(), "stages.bin");
        assert_eq!(StoreFormat::default(), StoreFormat::Json);
    }
}
