//! Unsigned public URLs for stored objects.
//!
//! Keys are encoded with `application/x-www-form-urlencoded` byte
//! serialization: ASCII alphanumerics and `*-._` pass through, a space becomes
//! `+`, every other byte (slashes included) is percent-encoded. Callers compare
//! these URLs textually, so the encoding must not change.

use url::form_urlencoded;

/// Encode an object key for use in a public URL path.
#[must_use]
pub fn encode_key(key: &str) -> String {
    form_urlencoded::byte_serialize(key.as_bytes()).collect()
}

/// Build `https://{bucket}.{domain}/{encoded key}`.
#[must_use]
pub fn public_url(bucket: &str, domain: &str, key: &str) -> String {
    format!("https://{bucket}.{domain}/{}", encode_key(key))
}
