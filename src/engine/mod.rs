//! Store-facing mutation execution.

/// Create/update/delete against a persistence handle.
pub mod executor;
