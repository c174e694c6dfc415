//! Batch dispatch, per-batch state and completion tracking.

/// Per-invocation batch state.
pub mod batch;
/// Change-set entry point and configuration.
pub mod processor;
/// Completion barrier.
pub mod tracker;
