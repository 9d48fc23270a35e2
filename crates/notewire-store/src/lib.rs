//! Versioned note storage for notewire.
//!
//! Notes are small text blobs addressed by a short path token and stored as
//! one file per path under a flat storage root. The store normalizes
//! content, deduplicates writes, enforces a process-wide storage quota, and
//! records every accepted change in an append-only version log.
//!
//! # Components
//!
//! - [`path::is_valid_path`] -- pure predicate guarding every user-supplied path
//! - [`QuotaTracker`] -- atomic accumulator of current note bytes vs. ceiling
//! - [`NoteStore`] -- the single read/write surface ([`NoteStore::save`] is
//!   the only write entry point)
//! - [`VersionLog`] -- per-path JSON-lines history with all-or-nothing pruning
//!
//! # Design Rules
//!
//! 1. Writes are atomic at the filesystem level: temp file, then rename.
//!    Readers never observe a half-written note.
//! 2. The quota check and the commit are one serialized sequence; two
//!    concurrent saves can never jointly exceed the ceiling.
//! 3. Quota and path errors are detected before any durable mutation.
//! 4. History is best-effort: a version-log failure is logged and swallowed,
//!    never rolled into the content write's outcome.
//! 5. Whitespace-only content means "no note": saving it deletes.

pub mod error;
pub mod history;
pub mod path;
pub mod quota;
pub mod store;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use history::{VersionEntry, VersionLog};
pub use path::is_valid_path;
pub use quota::QuotaTracker;
pub use store::{normalize, NoteStore, SaveOutcome, StoreConfig};
