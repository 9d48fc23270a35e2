//! The note store: normalizing, quota-enforcing, history-recording
//! persistence for note content.
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/<path>            # current content, one file per note
//! <root>/.history/<path>.log   # append-only version log (see history.rs)
//! ```
//!
//! A note with empty or whitespace-only content is *absent*: there is no
//! note record, only a file whose presence implies existence.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::history::VersionLog;
use crate::path::is_valid_path;
use crate::quota::QuotaTracker;

/// Name of the history directory under the storage root. Dot-prefixed so it
/// stays out of the way of the flat note namespace.
const HISTORY_DIR: &str = ".history";

/// Tuning knobs for a [`NoteStore`].
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Maximum total bytes of current note content (default 10 MiB).
    pub max_storage_size: i64,
    /// Maximum bytes for a single note (default 100 KiB).
    pub max_note_size: u64,
    /// Inactivity window after which `prune_history` resets all history
    /// (default 72 hours).
    pub history_reset: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_storage_size: 10 * 1024 * 1024,
            max_note_size: 100 * 1024,
            history_reset: Duration::from_secs(72 * 3600),
        }
    }
}

/// What a successful save actually did.
///
/// The save pipeline broadcasts only on `Saved`; `Unchanged` and `Deleted`
/// produce no live notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// New content was persisted and recorded in the version log.
    Saved,
    /// Whitespace-only content removed the note.
    Deleted,
    /// The content matched what is stored; nothing happened.
    Unchanged,
}

/// Filesystem-backed note storage with quota accounting and version history.
#[derive(Debug)]
pub struct NoteStore {
    root: PathBuf,
    quota: QuotaTracker,
    history: VersionLog,
    max_note_size: u64,
    history_reset: Duration,
    /// Serializes the whole check-and-commit sequence in `save`. Covers the
    /// quota read-check-update race and the same-path lost-update window.
    save_lock: Mutex<()>,
}

impl NoteStore {
    /// Open a store rooted at `root`, creating the directory tree if needed.
    ///
    /// Performs the startup duties: an initial history prune and a scan of
    /// existing notes to seed the quota accumulator. History faults are
    /// logged and the store opens with history degraded; only a content
    /// store fault aborts.
    pub fn open(root: &Path, config: StoreConfig) -> StoreResult<Self> {
        fs::create_dir_all(root)?;
        let history_dir = root.join(HISTORY_DIR);
        let history = match VersionLog::open(&history_dir) {
            Ok(history) => history,
            Err(err) => {
                warn!(error = %err, "history store unavailable, versions disabled");
                VersionLog::at(&history_dir)
            }
        };
        if let Err(err) = history.prune(config.history_reset) {
            warn!(error = %err, "history prune failed at startup");
        }

        let initial = scan_usage(root)?;
        info!(root = %root.display(), used = initial, ceiling = config.max_storage_size, "note store opened");

        Ok(Self {
            root: root.to_path_buf(),
            quota: QuotaTracker::new(config.max_storage_size, initial),
            history,
            max_note_size: config.max_note_size,
            history_reset: config.history_reset,
            save_lock: Mutex::new(()),
        })
    }

    /// Open the current content of a note for streaming.
    ///
    /// Returns the file handle and its size, or `None` if no note exists at
    /// that path (distinct from an I/O failure).
    pub fn open_note(&self, path: &str) -> StoreResult<Option<(File, u64)>> {
        if !is_valid_path(path) {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        let file_path = self.root.join(path);
        let file = match File::open(&file_path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata()?.len();
        Ok(Some((file, size)))
    }

    /// Read the full current content of a note.
    pub fn read(&self, path: &str) -> StoreResult<Option<String>> {
        if !is_valid_path(path) {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        match fs::read(self.root.join(path)) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The single write entry point.
    ///
    /// Normalizes the content, deduplicates against the stored state,
    /// treats whitespace-only content as deletion, enforces the quota with
    /// the precise size delta, persists via temp-file-then-rename, and
    /// records the accepted state in the version log (best-effort).
    pub fn save(&self, path: &str, content: &str) -> StoreResult<SaveOutcome> {
        if !is_valid_path(path) {
            return Err(StoreError::InvalidPath(path.to_string()));
        }

        let normalized = normalize(content);
        if normalized.len() as u64 > self.max_note_size {
            return Err(StoreError::ContentTooLarge {
                size: normalized.len() as u64,
                max: self.max_note_size,
            });
        }

        let _guard = self.save_lock.lock().expect("save mutex poisoned");
        let file_path = self.root.join(path);

        let old = match fs::read(&file_path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        let old_size = old.as_ref().map_or(0, |b| b.len() as i64);

        // Idempotent no-op when nothing meaningful changed.
        if let Some(old) = &old {
            if String::from_utf8_lossy(old).trim() == normalized.trim() {
                return Ok(SaveOutcome::Unchanged);
            }
        }

        // Whitespace-only content deletes the note.
        if normalized.trim().is_empty() {
            if old_size > 0 {
                fs::remove_file(&file_path)?;
                self.quota.record(-old_size);
                debug!(path, freed = old_size, "note deleted");
            }
            return Ok(SaveOutcome::Deleted);
        }

        let new_size = normalized.len() as i64;
        let delta = new_size - old_size;
        if self.quota.would_exceed(delta) {
            return Err(StoreError::StorageFull {
                needed: delta,
                ceiling: self.quota.ceiling(),
            });
        }

        // Write to a temp file in the same directory, then atomically rename
        // over the final path. A half-written file is never observable.
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(normalized.as_bytes())?;
        tmp.persist(&file_path).map_err(|e| StoreError::Io(e.error))?;

        self.quota.record(delta);

        if let Err(err) = self.history.append(path, &normalized, Utc::now()) {
            warn!(path, error = %err, "history append failed, content write kept");
        }

        debug!(path, size = new_size, delta, "note saved");
        Ok(SaveOutcome::Saved)
    }

    /// Look up a prior version of a note. See [`VersionLog::version`].
    pub fn version(&self, path: &str, index: i64) -> StoreResult<Option<(String, usize)>> {
        if !is_valid_path(path) {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        self.history.version(path, index)
    }

    /// Reset all version history after the configured inactivity window.
    /// Called at startup (via `open`) and on the server's daily cadence.
    pub fn prune_history(&self) -> StoreResult<()> {
        self.history.prune(self.history_reset)
    }

    /// Fast-path admission check; `save` remains the authority.
    pub fn is_overloaded(&self) -> bool {
        self.quota.is_overloaded()
    }

    /// The quota accumulator, exposed for admission checks and tests.
    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }
}

/// Collapse a trailing all-whitespace run containing four or more newlines
/// down to exactly three trailing newlines.
///
/// Repeated edits tend to grow unbounded trailing blank lines; this bounds
/// them without touching meaningful content. A trailing run that does not
/// end in a newline is left alone.
pub fn normalize(content: &str) -> Cow<'_, str> {
    let trimmed = content.trim_end_matches(|c: char| c.is_ascii_whitespace());
    let tail = &content[trimmed.len()..];
    let newlines = tail.bytes().filter(|b| *b == b'\n').count();
    if newlines >= 4 && tail.ends_with('\n') {
        Cow::Owned(format!("{trimmed}\n\n\n"))
    } else {
        Cow::Borrowed(content)
    }
}

/// Sum the sizes of all current note files directly under `root`.
/// Subdirectories (the history store) are excluded from the quota.
fn scan_usage(root: &Path) -> StoreResult<i64> {
    let mut total = 0i64;
    for dent in fs::read_dir(root)? {
        let dent = dent?;
        let meta = dent.metadata()?;
        if meta.is_file() {
            total += meta.len() as i64;
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn temp_store(config: StoreConfig) -> (tempfile::TempDir, NoteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = NoteStore::open(dir.path(), config).unwrap();
        (dir, store)
    }

    fn disk_usage(store: &NoteStore) -> i64 {
        scan_usage(&store.root).unwrap()
    }

    #[test]
    fn save_then_read_roundtrip() {
        let (_dir, store) = temp_store(StoreConfig::default());

        assert_eq!(store.save("abc", "hello").unwrap(), SaveOutcome::Saved);
        assert_eq!(store.read("abc").unwrap().unwrap(), "hello");

        let (_file, size) = store.open_note("abc").unwrap().unwrap();
        assert_eq!(size, 5);
    }

    #[test]
    fn absent_note_reads_as_none() {
        let (_dir, store) = temp_store(StoreConfig::default());
        assert!(store.read("nothing").unwrap().is_none());
        assert!(store.open_note("nothing").unwrap().is_none());
    }

    #[test]
    fn invalid_path_is_rejected_everywhere() {
        let (_dir, store) = temp_store(StoreConfig::default());
        assert!(matches!(
            store.save("../etc", "x"),
            Err(StoreError::InvalidPath(_))
        ));
        assert!(matches!(
            store.read("a/b"),
            Err(StoreError::InvalidPath(_))
        ));
        assert!(matches!(
            store.version("..", 1),
            Err(StoreError::InvalidPath(_))
        ));
    }

    #[test]
    fn whitespace_save_deletes() {
        let (_dir, store) = temp_store(StoreConfig::default());
        store.save("abc", "hello").unwrap();
        assert_eq!(store.save("abc", "   \n\t").unwrap(), SaveOutcome::Deleted);
        assert!(store.read("abc").unwrap().is_none());
        assert_eq!(store.quota().usage(), 0);
    }

    #[test]
    fn quota_tracks_disk_exactly() {
        let (_dir, store) = temp_store(StoreConfig::default());

        store.save("a", "hello").unwrap();
        assert_eq!(store.quota().usage(), disk_usage(&store));

        store.save("b", "wider content").unwrap();
        assert_eq!(store.quota().usage(), disk_usage(&store));

        store.save("a", "shrunk").unwrap();
        assert_eq!(store.quota().usage(), disk_usage(&store));

        store.save("b", "").unwrap();
        assert_eq!(store.quota().usage(), disk_usage(&store));
    }

    #[test]
    fn quota_rejection_leaves_state_untouched() {
        let config = StoreConfig {
            max_storage_size: 10,
            ..StoreConfig::default()
        };
        let (_dir, store) = temp_store(config);
        store.save("abc", "12345").unwrap();

        let err = store.save("big", "this is way past ten bytes").unwrap_err();
        assert!(matches!(err, StoreError::StorageFull { .. }));

        // Content, quota, and history are all exactly as before.
        assert!(store.read("big").unwrap().is_none());
        assert_eq!(store.quota().usage(), 5);
        assert!(store.version("big", 1).unwrap().is_none());
        assert_eq!(store.read("abc").unwrap().unwrap(), "12345");
    }

    #[test]
    fn usage_may_sit_exactly_at_ceiling() {
        let config = StoreConfig {
            max_storage_size: 5,
            ..StoreConfig::default()
        };
        let (_dir, store) = temp_store(config);
        assert_eq!(store.save("abc", "12345").unwrap(), SaveOutcome::Saved);
        assert!(!store.is_overloaded());
        assert!(matches!(
            store.save("xyz", "a"),
            Err(StoreError::StorageFull { .. })
        ));
    }

    #[test]
    fn content_cap_is_checked_before_mutation() {
        let config = StoreConfig {
            max_note_size: 8,
            ..StoreConfig::default()
        };
        let (_dir, store) = temp_store(config);
        let err = store.save("abc", "123456789").unwrap_err();
        assert!(matches!(err, StoreError::ContentTooLarge { size: 9, max: 8 }));
        assert!(store.read("abc").unwrap().is_none());
        assert_eq!(store.quota().usage(), 0);
    }

    #[test]
    fn dedup_save_is_a_noop() {
        let (_dir, store) = temp_store(StoreConfig::default());
        store.save("abc", "hello").unwrap();
        let usage = store.quota().usage();

        // Same content modulo surrounding whitespace.
        assert_eq!(store.save("abc", "hello\n").unwrap(), SaveOutcome::Unchanged);
        assert_eq!(store.save("abc", "  hello  ").unwrap(), SaveOutcome::Unchanged);

        assert_eq!(store.quota().usage(), usage);
        // No version entry was added: one recorded state, so no history index
        // is addressable yet.
        assert!(store.version("abc", 1).unwrap().is_none());
    }

    #[test]
    fn version_indexing_after_distinct_saves() {
        let (_dir, store) = temp_store(StoreConfig::default());
        for content in ["one", "two", "three", "four"] {
            store.save("abc", content).unwrap();
        }

        let (content, total) = store.version("abc", 1).unwrap().unwrap();
        assert_eq!(content, "three");
        assert_eq!(total, 4);
        assert_eq!(store.version("abc", 3).unwrap().unwrap().0, "one");

        assert!(store.version("abc", 0).unwrap().is_none());
        assert!(store.version("abc", 4).unwrap().is_none());
    }

    #[test]
    fn history_survives_deletion_but_not_prune() {
        let config = StoreConfig {
            history_reset: Duration::ZERO,
            ..StoreConfig::default()
        };
        let (_dir, store) = temp_store(config);
        store.save("abc", "one").unwrap();
        store.save("abc", "two").unwrap();
        store.save("abc", "").unwrap();
        // Deletion appends nothing, so the prior states remain addressable.
        assert_eq!(store.version("abc", 1).unwrap().unwrap().0, "one");

        std::thread::sleep(Duration::from_millis(20));
        store.prune_history().unwrap();
        assert!(store.version("abc", 1).unwrap().is_none());
    }

    #[test]
    fn prune_leaves_current_content_alone() {
        let config = StoreConfig {
            history_reset: Duration::ZERO,
            ..StoreConfig::default()
        };
        let (_dir, store) = temp_store(config);
        store.save("abc", "keep me").unwrap();

        std::thread::sleep(Duration::from_millis(20));
        store.prune_history().unwrap();

        assert_eq!(store.read("abc").unwrap().unwrap(), "keep me");
        assert!(store.version("abc", 1).unwrap().is_none());
    }

    #[test]
    fn history_is_outside_quota() {
        // Deliberate scope decision: the quota governs current content only,
        // so total disk use can exceed the ceiling once history is counted.
        let config = StoreConfig {
            max_storage_size: 20,
            ..StoreConfig::default()
        };
        let (dir, store) = temp_store(config);
        store.save("abc", "version one").unwrap();
        store.save("abc", "version two").unwrap();

        assert!(store.quota().usage() <= 20);
        let history_bytes: u64 = fs::read_dir(dir.path().join(HISTORY_DIR))
            .unwrap()
            .map(|d| d.unwrap().metadata().unwrap().len())
            .sum();
        assert!(history_bytes > 0);
    }

    #[test]
    fn reopen_reseeds_quota_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = NoteStore::open(dir.path(), StoreConfig::default()).unwrap();
            store.save("a", "hello").unwrap();
            store.save("b", "world!").unwrap();
        }
        let store = NoteStore::open(dir.path(), StoreConfig::default()).unwrap();
        assert_eq!(store.quota().usage(), 11);
    }

    #[test]
    fn open_survives_history_store_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A stray file squatting on the history path blocks its creation.
        fs::write(dir.path().join(HISTORY_DIR), b"in the way").unwrap();

        let store = NoteStore::open(dir.path(), StoreConfig::default()).unwrap();

        // Content storage is unaffected; the failed history append inside
        // save is logged and swallowed.
        assert_eq!(store.save("abc", "hello").unwrap(), SaveOutcome::Saved);
        assert_eq!(store.read("abc").unwrap().unwrap(), "hello");
    }

    #[test]
    fn readers_never_observe_partial_writes() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;
        use std::thread;

        const LEN: usize = 4096;

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(NoteStore::open(dir.path(), StoreConfig::default()).unwrap());
        store.save("abc", &"a".repeat(LEN)).unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            readers.push(thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    // Every read must be a complete version: full length,
                    // one uniform fill byte, never a prefix or a mixture.
                    let content = store.read("abc").unwrap().unwrap();
                    assert_eq!(content.len(), LEN);
                    let first = content.as_bytes()[0];
                    assert!(first == b'a' || first == b'b');
                    assert!(content.bytes().all(|b| b == first));
                }
            }));
        }

        for i in 0..50 {
            let fill = if i % 2 == 0 { "b" } else { "a" };
            store.save("abc", &fill.repeat(LEN)).unwrap();
        }
        done.store(true, Ordering::Relaxed);
        for r in readers {
            r.join().unwrap();
        }
    }

    #[test]
    fn concurrent_saves_respect_quota() {
        use std::sync::Arc;
        use std::thread;

        let config = StoreConfig {
            max_storage_size: 50,
            ..StoreConfig::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(NoteStore::open(dir.path(), config).unwrap());

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                // 10 bytes each; at most 5 can fit under the 50-byte ceiling.
                let _ = store.save(&format!("note{i}"), "0123456789");
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert!(store.quota().usage() <= 50);
        assert_eq!(store.quota().usage(), disk_usage(&store));
    }

    #[test]
    fn normalize_collapses_trailing_blank_lines() {
        assert_eq!(normalize("text\n\n\n\n\n"), "text\n\n\n");
        assert_eq!(normalize("text\n \n\t\n \n\n"), "text\n\n\n");
        // Three or fewer trailing newlines are left as-is.
        assert_eq!(normalize("text\n\n\n"), "text\n\n\n");
        assert_eq!(normalize("text\n"), "text\n");
        assert_eq!(normalize("text"), "text");
        // A run not ending in a newline is untouched.
        assert_eq!(normalize("text\n\n\n\n  "), "text\n\n\n\n  ");
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(s in "[ab \t\n]{0,64}") {
            let once = normalize(&s).into_owned();
            let twice = normalize(&once).into_owned();
            prop_assert_eq!(&once, &twice);
        }

        #[test]
        fn normalize_bounds_trailing_newlines(body in "[ab]{0,8}", tail in "[ \t\n]{0,32}") {
            let input = format!("{body}{tail}");
            let out = normalize(&input).into_owned();
            if out.ends_with('\n') {
                let trimmed = out.trim_end_matches(|c: char| c.is_ascii_whitespace());
                let newlines = out[trimmed.len()..].bytes().filter(|b| *b == b'\n').count();
                prop_assert!(newlines <= 3);
            }
        }
    }
}
