//! # Persistence Format
//!
//! Binary encoding of a [`RecordStore`]. File I/O is in the app layer.
//!
//! Format: Header (5 bytes) + postcard-serialized [`StoreDocument`].
//! - 4 bytes: Magic ("FTRE")
//! - 1 byte: Version
//!
//! Size and header are checked before the payload is parsed, and the
//! decoded document passes through [`RecordStore::from_document`], so a
//! file with broken references is rejected rather than loaded.

use crate::formats::StoreDocument;
use crate::{FamtreeError, RecordStore, primitives};

/// Maximum accepted size of an encoded store.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 256 * 1024 * 1024; // 256 MB

const HEADER_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), FamtreeError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(FamtreeError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(FamtreeError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FamtreeError> {
        let Some(header) = bytes.get(..HEADER_SIZE) else {
            return Err(FamtreeError::DeserializationError(
                "Header too short".to_string(),
            ));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[0..4]);
        Ok(Self {
            magic,
            version: header[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Encode a store as header + payload.
pub fn store_to_bytes(store: &RecordStore) -> Result<Vec<u8>, FamtreeError> {
    let payload = postcard::to_stdvec(&store.to_document())
        .map_err(|e| FamtreeError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE.saturating_add(payload.len()));
    result.extend_from_slice(&PersistenceHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Decode a store, validating size and header before the payload.
pub fn store_from_bytes(bytes: &[u8]) -> Result<RecordStore, FamtreeError> {
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(FamtreeError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = bytes.get(HEADER_SIZE..).unwrap_or_default();
    let document: StoreDocument = postcard::from_bytes(payload).map_err(|e| {
        FamtreeError::DeserializationError(format!("Failed to decode store data: {e}"))
    })?;
    RecordStore::from_document(document)
}

// =============================================================================
// TESTS
// =============================================================================
