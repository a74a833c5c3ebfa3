//! # Formats Module
//!
//! The record document and its binary encoding. File I/O lives in the app.

mod document;
mod persistence;

pub use document::StoreDocument;
pub use persistence::{
    MAX_PERSISTENCE_PAYLOAD_SIZE, PersistenceHeader, store_from_bytes, store_to_bytes,
};
