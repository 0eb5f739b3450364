//! Codebase context for the conversation.
//!
//! This module turns source trees into snapshots, detects changes to them
//! between turns, and renders them into the context block sent to the model:
//! - Full walk on startup (`snapshot::build`)
//! - mtime-based change detection before each turn (`diff::diff_many`)
//! - Snapshot folding after a check (`diff::apply`)

mod diff;
mod serializer;
mod snapshot;
mod types;
#[cfg(test)]
mod tests;

// Re-exports
pub use diff::{apply, diff_many};
pub use serializer::{format_size, serialize};
pub use snapshot::{build, merge, normalize_extensions, ScanOptions, MAX_READABLE_FILE_SIZE};
pub use types::Codebase;
