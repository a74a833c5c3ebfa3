//! # Canonical Export Module
//!
//! Store iteration order is user-visible (insertion order) and is preserved
//! by the regular persistence format. The canonical export instead sorts
//! both record collections by id, so two stores holding the same records
//! export to the same bytes and the same checksum regardless of the order
//! the records were created in.
//!
//! Per-record lists (`FAMILY_SPOUSE`, `CHILD`) keep their order: it is data.

use crate::formats::StoreDocument;
use crate::{Family, FamtreeError, Individual, RecordStore, primitives};
use serde::{Deserialize, Serialize};

// =============================================================================
// CANONICAL FORMAT
// =============================================================================

/// Magic bytes for canonical export format.
pub const CANONICAL_MAGIC: [u8; 4] = *b"FTRX";

/// Current canonical format version.
pub const CANONICAL_VERSION: u8 = 1;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Header for canonical export files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalHeader {
    pub magic: [u8; 4],
    pub version: u8,
    pub individual_count: u64,
    pub family_count: u64,
    /// FNV-1a of the postcard-encoded data section.
    pub checksum: u64,
}

impl CanonicalHeader {
    #[must_use]
    pub fn new(individual_count: u64, family_count: u64, checksum: u64) -> Self {
        Self {
            magic: CANONICAL_MAGIC,
            version: CANONICAL_VERSION,
            individual_count,
            family_count,
            checksum,
        }
    }

    /// Error messages stay generic.
    pub fn validate(&self) -> Result<(), FamtreeError> {
        if self.magic != CANONICAL_MAGIC {
            return Err(FamtreeError::DeserializationError(
                "Invalid file format".to_string(),
            ));
        }
        if self.version != CANONICAL_VERSION {
            return Err(FamtreeError::DeserializationError(
                "Unsupported file version".to_string(),
            ));
        }
        Ok(())
    }
}

/// Both collections sorted by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalStore {
    pub individuals: Vec<Individual>,
    pub families: Vec<Family>,
}

impl CanonicalStore {
    #[must_use]
    pub fn from_store(store: &RecordStore) -> Self {
        let mut individuals: Vec<Individual> = store.individuals().cloned().collect();
        individuals.sort_by(|a, b| a.id().cmp(b.id()));
        let mut families: Vec<Family> = store.families().cloned().collect();
        families.sort_by(|a, b| a.id().cmp(b.id()));
        Self {
            individuals,
            families,
        }
    }

    /// Rebuild a store in id order.
    pub fn to_store(&self) -> Result<RecordStore, FamtreeError> {
        RecordStore::from_document(StoreDocument {
            individuals: self.individuals.clone(),
            families: self.families.clone(),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, FamtreeError> {
        postcard::to_stdvec(self).map_err(|e| FamtreeError::SerializationError(format!("Data: {e}")))
    }

    /// Deterministic 64-bit checksum of the encoded data.
    ///
    /// Detects accidental corruption. Not a cryptographic hash; see
    /// `canonical_crypto_hash` for that.
    pub fn checksum(&self) -> Result<u64, FamtreeError> {
        Ok(fnv1a(&self.to_bytes()?))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

// =============================================================================
// EXPORT FUNCTIONS
// =============================================================================

/// Export a store to canonical postcard format.
///
/// ```text
/// [header_len: u32 LE] [CanonicalHeader (postcard)] [CanonicalStore (postcard)]
/// ```
pub fn export_canonical(store: &RecordStore) -> Result<Vec<u8>, FamtreeError> {
    let canonical = CanonicalStore::from_store(store);
    let data_bytes = canonical.to_bytes()?;

    let header = CanonicalHeader::new(
        canonical.individuals.len() as u64,
        canonical.families.len() as u64,
        fnv1a(&data_bytes),
    );
    let header_bytes = postcard::to_stdvec(&header)
        .map_err(|e| FamtreeError::SerializationError(format!("Header: {e}")))?;
    let header_len = u32::try_from(header_bytes.len())
        .map_err(|_| FamtreeError::SerializationError("Header too large".to_string()))?;

    let mut result =
        Vec::with_capacity(4usize.saturating_add(header_bytes.len()).saturating_add(data_bytes.len()));
    result.extend_from_slice(&header_len.to_le_bytes());
    result.extend_from_slice(&header_bytes);
    result.extend_from_slice(&data_bytes);
    Ok(result)
}

/// Import a store from canonical format, verifying counts and checksum.
pub fn import_canonical(data: &[u8]) -> Result<RecordStore, FamtreeError> {
    let short = || FamtreeError::DeserializationError("Data too short".to_string());

    let len_bytes: [u8; 4] = data
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(short)?;
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    let header_end = header_len.checked_add(4).ok_or_else(short)?;
    let header_bytes = data.get(4..header_end).ok_or_else(short)?;

    let header: CanonicalHeader = postcard::from_bytes(header_bytes)
        .map_err(|e| FamtreeError::DeserializationError(format!("Header: {e}")))?;
    header.validate()?;

    let total = header.individual_count.saturating_add(header.family_count);
    if total > primitives::MAX_RECORDS as u64 {
        return Err(FamtreeError::DeserializationError(format!(
            "Record count {total} exceeds maximum allowed {}",
            primitives::MAX_RECORDS
        )));
    }

    let data_bytes = data.get(header_end..).ok_or_else(short)?;
    let computed = fnv1a(data_bytes);
    if computed != header.checksum {
        return Err(FamtreeError::DeserializationError(format!(
            "Checksum mismatch: expected {}, got {computed}",
            header.checksum
        )));
    }

    let canonical: CanonicalStore = postcard::from_bytes(data_bytes)
        .map_err(|e| FamtreeError::DeserializationError(format!("Data: {e}")))?;
    if canonical.individuals.len() as u64 != header.individual_count
        || canonical.families.len() as u64 != header.family_count
    {
        return Err(FamtreeError::DeserializationError(
            "Record count mismatch".to_string(),
        ));
    }
    canonical.to_store()
}

/// Whether `store` holds exactly the records in a canonical export.
pub fn verify_canonical(store: &RecordStore, canonical_data: &[u8]) -> Result<bool, FamtreeError> {
    let imported = import_canonical(canonical_data)?;
    Ok(CanonicalStore::from_store(store) == CanonicalStore::from_store(&imported))
}

/// The canonical checksum of a store.
pub fn canonical_checksum(store: &RecordStore) -> Result<u64, FamtreeError> {
    CanonicalStore::from_store(store).checksum()
}

/// BLAKE3 hex digest of the canonical data section.
#[cfg(feature = "crypto-hash")]
pub fn canonical_crypto_hash(store: &RecordStore) -> Result<String, FamtreeError> {
    let bytes = CanonicalStore::from_store(store).to_bytes()?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// =============================================================================
// TESTS
// =============================================================================
