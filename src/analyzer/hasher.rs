use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of a chunk's content, used to key cached results.
pub fn hash_bytes(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}
