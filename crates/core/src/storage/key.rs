//! Object key checks.
//!
//! OpenDAL normalizes every path it is given: surrounding whitespace is
//! trimmed, leading `/` is stripped and empty segments are collapsed. A key
//! it would rewrite cannot be stored or addressed verbatim, so it is refused
//! before any request is made.

/// How a key is about to be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyUse {
    /// Read, written, copied or signed as a file object.
    Object,
    /// Deleted; folder markers ending in `/` are accepted.
    Delete,
}

/// Why `key` cannot be passed through OpenDAL unchanged, if it cannot.
pub(crate) fn key_defect(key: &str, usage: KeyUse) -> Option<&'static str> {
    if key.is_empty() {
        return Some("must not be empty");
    }
    if key.trim() != key {
        return Some("must not start or end with whitespace");
    }
    if key.starts_with('/') {
        return Some("must not start with '/'");
    }
    if key.contains("//") {
        return Some("must not contain empty path segments");
    }
    if usage == KeyUse::Object && key.ends_with('/') {
        return Some("names a folder marker, not an object");
    }
    None
}
