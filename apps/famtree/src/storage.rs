//! # Store Files
//!
//! Load and save a [`RecordStore`] on disk. Loading detects the encoding
//! from the leading magic bytes. Saving back keeps that encoding unless a
//! format is requested explicitly.

use crate::config::StoreFormat;
use famtree_core::{
    FamtreeError, RecordStore, StoreDocument, formats::MAX_PERSISTENCE_PAYLOAD_SIZE, primitives,
    store_from_bytes, store_to_bytes,
};
use std::path::{Path, PathBuf};

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: usize) -> Result<(), FamtreeError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| FamtreeError::IoError(format!("Cannot read file metadata: {e}")))?;

    if metadata.len() > max_size as u64 {
        return Err(FamtreeError::IoError(format!(
            "File size {} bytes exceeds maximum allowed {max_size} bytes",
            metadata.len()
        )));
    }
    Ok(())
}

/// Validate an output path: the parent directory must exist.
pub fn validate_output_path(path: &Path) -> Result<PathBuf, FamtreeError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let canonical_parent = parent.canonicalize().map_err(|e| {
        FamtreeError::IoError(format!(
            "Invalid output directory '{}': {e}",
            parent.display()
        ))
    })?;
    if !canonical_parent.is_dir() {
        return Err(FamtreeError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }
    let filename = path
        .file_name()
        .ok_or_else(|| FamtreeError::IoError("Output path has no filename".to_string()))?;
    Ok(canonical_parent.join(filename))
}

/// The encoding `data` was written in.
#[must_use]
pub fn detect_format(data: &[u8]) -> StoreFormat {
    if data.starts_with(primitives::MAGIC_BYTES) {
        StoreFormat::Binary
    } else {
        StoreFormat::Json
    }
}

/// The encoding of an existing store file, or `None` if it cannot be read.
#[must_use]
pub fn stored_format(path: &Path) -> Option<StoreFormat> {
    std::fs::read(path).ok().map(|data| detect_format(&data))
}

/// Decode a store from either encoding.
pub fn decode_store(data: &[u8]) -> Result<RecordStore, FamtreeError> {
    if detect_format(data) == StoreFormat::Binary {
        return store_from_bytes(data);
    }
    let document: StoreDocument = serde_json::from_slice(data)
        .map_err(|e| FamtreeError::DeserializationError(format!("Invalid JSON store: {e}")))?;
    RecordStore::from_document(document)
}

/// Encode a store in `format`.
pub fn encode_store(store: &RecordStore, format: StoreFormat) -> Result<Vec<u8>, FamtreeError> {
    match format {
        StoreFormat::Binary => store_to_bytes(store),
        StoreFormat::Json => {
            let mut data = serde_json::to_vec_pretty(&store.to_document())
                .map_err(|e| FamtreeError::SerializationError(e.to_string()))?;
            data.push(b'\n');
            Ok(data)
        }
    }
}

/// Load an existing store file.
pub fn load_store(path: &Path) -> Result<RecordStore, FamtreeError> {
    if !path.is_file() {
        return Err(FamtreeError::IoError(format!(
            "Database '{}' not found. Run `famtree init` first.",
            path.display()
        )));
    }
    validate_file_size(path, MAX_PERSISTENCE_PAYLOAD_SIZE)?;
    let data = std::fs::read(path)
        .map_err(|e| FamtreeError::IoError(format!("Read db '{}': {e}", path.display())))?;
    let store = decode_store(&data)?;
    tracing::debug!(
        path = %path.display(),
        individuals = store.individual_count(),
        families = store.family_count(),
        "loaded store"
    );
    Ok(store)
}

/// Write a store file.
pub fn save_store(store: &RecordStore, path: &Path, format: StoreFormat) -> Result<(), FamtreeError> {
    let data = encode_store(store, format)?;
    std::fs::write(path, &data)
        .map_err(|e| FamtreeError::IoError(format!("Write db '{}': {e}", path.display())))?;
    tracing::debug!(
        path = %path.display(),
        bytes = data.len(),
        ?format,
        "saved store"
    );
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
