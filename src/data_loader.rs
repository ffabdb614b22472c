//! Data loader module for the on-disk session layout
//!
//! A Droid installation keeps, under one sessions directory:
//! - `<id>.settings.json` — per-session settings snapshot,
//! - `<id>.jsonl` — per-session conversation transcript,
//!
//! plus a single shared streaming log `droid-log-single.log` in a sibling
//! `logs/` directory. The default location is `~/.factory/sessions`,
//! overridable with the `DROID_SESSIONS_PATH` environment variable.
//!
//! Only the directory listing is fatal on failure: a sessions directory
//! that cannot be read at all is a misconfiguration. Individual settings,
//! transcript or log reads degrade to "no data" and the caller falls back
//! to whatever sources remain.
//!
//! # Examples
//!
//! ```no_run
//! use droidusage::data_loader::DataLoader;
//!
//! # async fn example() -> droidusage::Result<()> {
//! let loader = DataLoader::discover()?;
//! let ids = loader.list_session_ids().await?;
//! println!("{} sessions on disk", ids.len());
//! # Ok(())
//! # }
//! ```

use crate::error::{DroidusageError, Result};
use crate::types::SessionId;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Filename suffix identifying a session settings snapshot
pub const SETTINGS_SUFFIX: &str = ".settings.json";

/// Filename suffix of a per-session conversation transcript
pub const TRANSCRIPT_SUFFIX: &str = ".jsonl";

/// Name of the shared streaming log inside the sibling `logs/` directory
pub const SHARED_LOG_FILE: &str = "droid-log-single.log";

/// File access for one sessions directory and its sibling logs directory
pub struct DataLoader {
    sessions_dir: PathBuf,
    logs_dir: PathBuf,
}

impl DataLoader {
    /// Create a loader for an explicit sessions directory.
    ///
    /// The shared log is expected in `<parent-of-sessions>/logs/`.
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Self {
        let sessions_dir = sessions_dir.into();
        let logs_dir = sessions_dir
            .parent()
            .map(|p| p.join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"));
        Self {
            sessions_dir,
            logs_dir,
        }
    }

    /// Locate the default sessions directory.
    ///
    /// Honors `DROID_SESSIONS_PATH`, otherwise uses `~/.factory/sessions`.
    ///
    /// # Errors
    ///
    /// Returns [`DroidusageError::SessionsDirectory`] when the resolved
    /// directory does not exist.
    pub fn discover() -> Result<Self> {
        let sessions_dir = match std::env::var("DROID_SESSIONS_PATH") {
            Ok(custom) => PathBuf::from(custom),
            Err(_) => dirs::home_dir()
                .map(|home| home.join(".factory").join("sessions"))
                .unwrap_or_else(|| PathBuf::from(".factory/sessions")),
        };

        if !sessions_dir.is_dir() {
            return Err(DroidusageError::SessionsDirectory(sessions_dir));
        }

        debug!("Using sessions directory {}", sessions_dir.display());
        Ok(Self::new(sessions_dir))
    }

    /// The sessions directory backing this loader
    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    /// Enumerate session ids by listing `*.settings.json` files.
    ///
    /// # Errors
    ///
    /// Failing to read the directory is fatal for the whole operation and
    /// surfaces as [`DroidusageError::SessionsDirectory`].
    pub async fn list_session_ids(&self) -> Result<Vec<SessionId>> {
        let mut entries = tokio::fs::read_dir(&self.sessions_dir)
            .await
            .map_err(|_| DroidusageError::SessionsDirectory(self.sessions_dir.clone()))?;

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|_| DroidusageError::SessionsDirectory(self.sessions_dir.clone()))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(stem) = name.strip_suffix(SETTINGS_SUFFIX) {
                ids.push(SessionId::new(stem));
            }
        }

        debug!("Found {} session settings files", ids.len());
        Ok(ids)
    }

    /// Read one session's settings snapshot, `None` when missing/unreadable
    pub async fn read_session_settings(&self, id: &SessionId) -> Option<String> {
        let path = self
            .sessions_dir
            .join(format!("{}{}", id.as_str(), SETTINGS_SUFFIX));
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Could not read settings for session {id}: {e}");
                None
            }
        }
    }

    /// Read one session's transcript as ordered lines, `None` when
    /// missing/unreadable
    pub async fn read_session_transcript(&self, id: &SessionId) -> Option<Vec<String>> {
        let path = self
            .sessions_dir
            .join(format!("{}{}", id.as_str(), TRANSCRIPT_SUFFIX));
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Some(text.lines().map(str::to_string).collect()),
            Err(e) => {
                debug!("No transcript for session {id}: {e}");
                None
            }
        }
    }

    /// Read the shared streaming log, `None` when missing/unreadable
    pub async fn read_shared_log(&self) -> Option<String> {
        let path = self.logs_dir.join(SHARED_LOG_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Some(text),
            Err(e) => {
                debug!("No shared log at {}: {e}", path.display());
                None
            }
        }
    }
}
