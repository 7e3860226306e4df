//! Small extensions to the Rust std library shared across the workspace.

/// Exponential backoff.
pub mod backoff;
/// `Display` helpers for collections.
pub mod fmt;
