//! Pure per-entity transformations: classification, reshaping, serialization.

/// Logical type and mutation-state extraction.
pub mod classify;
/// Wire-record to store-document reshaping.
pub mod reshape;
/// Result entity and key-mapping construction.
pub mod serialize;
