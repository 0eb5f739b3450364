//! Saved conversation transcripts.
//!
//! One JSON file per CLI session under
//! `$XDG_CONFIG_HOME/claudecli/session-history/`, rewritten after every
//! completed turn.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::api::Usage;
use crate::config::config_dir;
use crate::conversation::ConversationHistory;

const HISTORY_DIR_NAME: &str = "session-history";

/// Contents of a transcript file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub model: String,
    /// RFC 3339 timestamp of the last save
    pub saved_at: String,
    pub messages: ConversationHistory,
    #[serde(default)]
    pub usage: Usage,
}

/// Writes the transcript of the running session
pub struct TranscriptStore {
    path: PathBuf,
}

impl TranscriptStore {
    /// Create a store in `dir`, defaulting to the session-history directory.
    ///
    /// The file name is fixed at creation time from the local clock.
    pub fn new(dir: Option<PathBuf>) -> Result<Self> {
        let dir = match dir {
            Some(dir) => dir,
            None => config_dir()?.join(HISTORY_DIR_NAME),
        };

        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create session history directory: {:?}", dir))?;

        let file_name = format!(
            "claudecli-session-{}.json",
            chrono::Local::now().format("%Y%m%d-%H%M%S")
        );

        Ok(Self {
            path: dir.join(file_name),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, model: &str, history: &ConversationHistory, usage: Usage) -> Result<()> {
        let transcript = Transcript {
            model: model.to_string(),
            saved_at: chrono::Utc::now().to_rfc3339(),
            messages: history.clone(),
            usage,
        };

        let content =
            serde_json::to_string_pretty(&transcript).context("Failed to serialize transcript")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write transcript: {:?}", self.path))?;

        debug!("Transcript saved to {:?}", self.path);
        Ok(())
    }

    #[cfg(test)]
    pub fn load(path: &Path) -> Result<Transcript> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read transcript: {:?}", path))?;
        serde_json::from_str(&content).context("Failed to parse transcript JSON")
    }
}
