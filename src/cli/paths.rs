use anyhow::{bail, Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const CODER_PROMPT_FILE: &str = ".claudecli_coder_system_prompt.txt";
pub const GENERAL_PROMPT_FILE: &str = ".claudecli_general_system_prompt.txt";

/// Resolve the output directory, defaulting to the current directory.
///
/// The directory must already exist.
pub fn resolve_output_dir(output_dir: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match output_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    if !dir.is_dir() {
        bail!("Output directory does not exist: {}", dir.display());
    }

    dir.canonicalize()
        .with_context(|| format!("Failed to canonicalize output directory: {}", dir.display()))
}

/// `~/<file_name>`, used when no prompt file is given on the command line.
pub fn default_prompt_path(file_name: &str) -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("Could not determine home directory")?
        .join(file_name))
}

/// Read a prompt file. A missing file is `Ok(None)`; other I/O errors fail.
pub fn read_prompt_file(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to read prompt file: {}", path.display()))
        }
    }
}
