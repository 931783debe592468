// Content fingerprinting for cheap equality and version checks.
//
// A fingerprint is the lowercase hex SHA-256 of the raw bytes. It is never
// stored next to a document; callers recompute it from the bytes they hold.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of some content.
pub type Fingerprint = String;

/// Compute the fingerprint of the given bytes.
pub fn fingerprint(content: &[u8]) -> Fingerprint {
    format!("{:x}", Sha256::digest(content))
}

/// Compute the fingerprint of a text blob (its UTF-8 bytes).
pub fn fingerprint_str(content: &str) -> Fingerprint {
    fingerprint(content.as_bytes())
}

/// Returns true when `content` hashes to `expected`.
pub fn matches(content: &str, expected: &str) -> bool {
    fingerprint_str(content) == expected
}
