//! Append-only version history for notes.
//!
//! Each note path gets its own JSON-lines log file under the history
//! directory; every accepted save appends one entry recording the new
//! content. Recency is line order: the last line is the current state.
//!
//! Retention is coarse and all-or-nothing: if the most recent change across
//! the *whole* history store is older than the inactivity window, the entire
//! directory is discarded and history restarts empty. This bounds history
//! growth for abandoned deployments at the cost of losing all prior versions
//! after a long quiet period.
//!
//! All failures here are the caller's to swallow — history is a best-effort
//! feature layered on top of the authoritative content store.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

/// One recorded state of a note.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    /// When this state was accepted.
    pub timestamp: DateTime<Utc>,
    /// Full content snapshot.
    pub content: String,
}

/// File-backed append-only version log, one JSON-lines file per note path.
#[derive(Debug)]
pub struct VersionLog {
    dir: PathBuf,
}

impl VersionLog {
    /// Open (or create) the history directory.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self::at(dir))
    }

    /// Point at a history directory without touching the filesystem.
    ///
    /// Used when directory initialization fails: the log runs degraded,
    /// every append fails and gets logged by the store, and content
    /// storage carries on.
    pub(crate) fn at(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn log_path(&self, path: &str) -> PathBuf {
        // Paths are validated by the store before they reach the log.
        self.dir.join(format!("{path}.log"))
    }

    /// Append a new state as the most-recent entry for `path`.
    pub fn append(&self, path: &str, content: &str, timestamp: DateTime<Utc>) -> StoreResult<()> {
        let entry = VersionEntry {
            timestamp,
            content: content.to_string(),
        };
        let line = serde_json::to_string(&entry)
            .map_err(|e| StoreError::History(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(path))?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        debug!(path, len = content.len(), "history append");
        Ok(())
    }

    /// Look up the `index`-th-from-newest recorded state for `path`.
    ///
    /// Index 0 is the current state and is not retrievable here (callers
    /// fetch current content from the note store). Returns the snapshot and
    /// the total number of recorded states, or `None` when `index` is out of
    /// range or the path has no history.
    pub fn version(&self, path: &str, index: i64) -> StoreResult<Option<(String, usize)>> {
        let entries = match self.read_entries(path)? {
            Some(entries) => entries,
            None => return Ok(None),
        };

        let total = entries.len();
        if index <= 0 || index as usize >= total {
            return Ok(None);
        }

        // Entries are in append order; newest last.
        let entry = &entries[total - 1 - index as usize];
        Ok(Some((entry.content.clone(), total)))
    }

    /// Discard all history if the store has been inactive longer than
    /// `window`; initialize the directory if it does not exist yet.
    pub fn prune(&self, window: Duration) -> StoreResult<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
            return Ok(());
        }

        let newest = self.latest_activity()?;
        let Some(newest) = newest else {
            // No history recorded yet; nothing to reset.
            return Ok(());
        };

        let idle = SystemTime::now()
            .duration_since(newest)
            .unwrap_or(Duration::ZERO);
        if idle > window {
            info!(idle_secs = idle.as_secs(), "no recent activity, resetting version history");
            fs::remove_dir_all(&self.dir)?;
            fs::create_dir_all(&self.dir)?;
        }
        Ok(())
    }

    /// Most recent modification time across all history files.
    fn latest_activity(&self) -> StoreResult<Option<SystemTime>> {
        let mut newest: Option<SystemTime> = None;
        for dent in fs::read_dir(&self.dir)? {
            let dent = dent?;
            let meta = dent.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let mtime = meta.modified()?;
            if newest.map_or(true, |n| mtime > n) {
                newest = Some(mtime);
            }
        }
        Ok(newest)
    }

    /// Read all entries for `path`, skipping lines that fail to parse
    /// (torn writes from a crash).
    fn read_entries(&self, path: &str) -> StoreResult<Option<Vec<VersionEntry>>> {
        let file = match File::open(self.log_path(path)) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<VersionEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(path, error = %e, "skipping malformed history entry");
                }
            }
        }
        Ok(Some(entries))
    }
}
