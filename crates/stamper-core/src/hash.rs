//! Content digests used to recognise identical media parts.

use sha2::{Digest, Sha256};

pub fn sha256_hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
