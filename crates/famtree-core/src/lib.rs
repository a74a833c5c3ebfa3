//! # famtree-core
//!
//! The deterministic record engine for famtree.
//!
//! A store of `Individual` and `Family` records joined by bidirectional
//! references. Every mutation of a relationship goes through the
//! [`IntegrityEngine`], which keeps both ends of each reference in step and
//! removes families that become empty. Everything else reads:
//!
//! - [`QueryEngine`] resolves parents, siblings, spouses, children and
//!   ancestor roots.
//! - [`collate`] copies connected subsets into a new store.
//! - [`projection`] turns a store into nodes and edges for rendering.
//!
//! ## Architectural Constraints
//!
//! - Pure Rust: no async, no network, no file I/O.
//! - Deterministic: ordered maps only, no randomness.
//! - No logging: the app layer traces what the core returns.

// =============================================================================
// MODULES
// =============================================================================

pub mod collate;
pub mod export;
pub mod formats;
pub mod integrity;
pub mod primitives;
pub mod projection;
pub mod query;
pub mod session;
pub mod store;
pub mod system;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Event, EventField, Family, FamilyAttribute, FamilyId, FamtreeError, Individual,
    IndividualAttribute, IndividualId, Name, PartialDate, Sex, Slot,
};

// =============================================================================
// RE-EXPORTS: Engines
// =============================================================================

pub use collate::{
    Collator, collate_ancestors, collate_descendants, collate_family_members, collate_siblings,
};
#[cfg(feature = "crypto-hash")]
pub use export::canonical_crypto_hash;
pub use export::{
    CanonicalHeader, CanonicalStore, canonical_checksum, export_canonical, import_canonical,
    verify_canonical,
};
pub use integrity::IntegrityEngine;
pub use projection::{
    GroupKind, NodeShape, Projection, ProjectionBuilder, ProjectionEdge, ProjectionGroup,
    ProjectionNode, ProjectionOptions, UnionStrength,
};
pub use query::{Parents, Query, QueryEngine, QueryResult, Siblings, SpouseLink};
pub use session::Session;
pub use store::RecordStore;

// =============================================================================
// RE-EXPORTS: Formats and System
// =============================================================================

pub use formats::{PersistenceHeader, StoreDocument, store_from_bytes, store_to_bytes};
pub use system::StoreMetrics;
