//! Note path validation.
//!
//! A note path is a single opaque token used directly as a file name under
//! the storage root. Valid paths:
//! - Must be non-empty
//! - Must not contain `..` (parent traversal)
//! - Must not contain `/` or `\` (path separators)
//!
//! Every entry point that accepts a user-supplied path checks it here before
//! touching storage or the hub; a violation is reported as
//! [`StoreError::InvalidPath`](crate::StoreError::InvalidPath), never
//! silently corrected.

/// Returns `true` if `path` is safe to use as a note name.
pub fn is_valid_path(path: &str) -> bool {
    !path.is_empty() && !path.contains("..") && !path.contains('/') && !path.contains('\\')
}
