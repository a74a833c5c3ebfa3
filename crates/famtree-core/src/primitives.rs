//! # Store Primitives
//!
//! Fixed constants of the famtree store: id allocation, file header and
//! input bounds. These are compiled in and never change at runtime.

/// Prefix of allocated Individual ids.
pub const INDIVIDUAL_ID_PREFIX: &str = "I";

/// Prefix of allocated Family ids.
pub const FAMILY_ID_PREFIX: &str = "F";

/// Minimum number of digits in an allocated id (`I001`).
///
/// Sequence numbers past 999 simply grow wider.
pub const ID_DIGITS: usize = 3;

/// Magic bytes for the famtree binary file header.
///
/// - File Header = Magic Bytes ("FTRE") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"FTRE";

/// Current serialization format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length of a single attribute value.
pub const MAX_ATTRIBUTE_VALUE_LENGTH: usize = 4096;

/// Maximum number of records (individuals plus families) accepted on load.
pub const MAX_RECORDS: usize = 1_000_000;

/// Maximum generations walked by ancestor and descendant traversals.
///
/// Deeper chains are truncated rather than walked.
pub const MAX_GENERATIONS: usize = 1000;
