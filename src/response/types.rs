//! Types produced by the response parser and the turn controller.

use serde::{Deserialize, Serialize};

use crate::api::Usage;

/// One file the model asked to write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileData {
    /// Path relative to the output directory
    pub path: String,
    /// Full file content
    pub content: String,
    /// Human-readable description of the change
    pub changes: String,
}

impl FileData {
    pub fn new(
        path: impl Into<String>,
        content: impl Into<String>,
        changes: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            changes: changes.into(),
        }
    }
}

/// How far the parser got through the accumulated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// The document parsed; `finished` tells whether it was closed.
    Complete,
    /// The input stops inside markup; another continuation may complete it.
    NeedMore,
    /// The markup is broken in a way more input cannot repair.
    Malformed,
}

/// Result of parsing the output accumulated so far.
///
/// `files == None` means "not parseable (yet)", which is distinct from
/// `Some(vec![])`, a successful parse with zero files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    pub finished: bool,
    pub files: Option<Vec<FileData>>,
    pub status: ParseStatus,
}

/// Final outcome of a structured code-generation run.
#[derive(Debug, Clone, Default)]
pub struct CodeResponse {
    /// Raw text of every turn, joined with [`TURN_SEPARATOR`](crate::turn::TURN_SEPARATOR)
    pub content: String,
    /// Parsed files; empty when parsing failed or the turn budget ran out
    pub files: Vec<FileData>,
    /// Token usage summed over all turns of the run
    pub usage: Usage,
}
