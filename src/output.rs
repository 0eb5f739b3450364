//! Writing model-generated files to the output directory.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::response::FileData;

/// Full raw output of a structured run
pub const CONCATENATED_OUTPUT_FILE: &str = "concatenated_output.txt";

/// Raw reply of the plaintext fallback
pub const FALLBACK_OUTPUT_FILE: &str = "fallback_output.txt";

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Refusing to write outside the output directory: {0}")]
    UnsafePath(String),

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What happened to one file of a batch.
#[derive(Debug)]
pub enum WriteOutcome {
    Written,
    /// Target exists and overwriting was not forced
    Skipped,
    Failed(WriteError),
}

#[derive(Debug)]
pub struct WriteResult {
    pub path: PathBuf,
    pub outcome: WriteOutcome,
}

/// Resolve `relative` under `output_dir`, rejecting absolute paths and `..`.
fn resolve(output_dir: &Path, relative: &str) -> Result<PathBuf, WriteError> {
    let relative_path = Path::new(relative);
    let safe = relative_path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

    if !safe || relative.trim().is_empty() {
        return Err(WriteError::UnsafePath(relative.to_string()));
    }

    Ok(output_dir.join(relative_path))
}

fn write_text(path: &Path, content: &str) -> Result<(), WriteError> {
    let io_err = |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, content).map_err(io_err)
}

/// Write every file of the batch, keeping relative paths under `output_dir`.
///
/// Existing files are skipped unless `force` is set. A failure only affects
/// its own file; the rest of the batch is still written.
pub fn write_files(output_dir: &Path, files: &[FileData], force: bool) -> Vec<WriteResult> {
    files
        .iter()
        .map(|file| {
            let target = match resolve(output_dir, &file.path) {
                Ok(target) => target,
                Err(e) => {
                    warn!("{}", e);
                    return WriteResult {
                        path: PathBuf::from(&file.path),
                        outcome: WriteOutcome::Failed(e),
                    };
                }
            };

            if !force && target.exists() {
                debug!("Skipping existing file: {}", target.display());
                return WriteResult {
                    path: target,
                    outcome: WriteOutcome::Skipped,
                };
            }

            let outcome = match write_text(&target, &file.content) {
                Ok(()) => WriteOutcome::Written,
                Err(e) => {
                    warn!("{}", e);
                    WriteOutcome::Failed(e)
                }
            };

            WriteResult {
                path: target,
                outcome,
            }
        })
        .collect()
}

/// Dump the raw text of a structured run, replacing any earlier dump.
pub fn write_concatenated_output(output_dir: &Path, content: &str) -> Result<PathBuf, WriteError> {
    let path = output_dir.join(CONCATENATED_OUTPUT_FILE);
    write_text(&path, content)?;
    Ok(path)
}

/// Save the plaintext fallback reply verbatim.
pub fn write_fallback_output(output_dir: &Path, content: &str) -> Result<PathBuf, WriteError> {
    let path = output_dir.join(FALLBACK_OUTPUT_FILE);
    write_text(&path, content)?;
    Ok(path)
}
