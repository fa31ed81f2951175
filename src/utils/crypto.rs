// src/utils/crypto.rs
//! Cryptographic utilities shared across the attestation pipeline.
//!
//! Uses SHA-256 for all digest operations: the Merkle fold, the
//! multi-instance nonce, and deterministic address derivation all commit to
//! the same 256-bit function, so previously published attestations remain
//! reproducible.

use rand::RngCore;
use ring::digest;

/// Computes a SHA-256 digest of the input data.
///
/// # Arguments
/// * `data` - Binary data to hash (as bytes slice)
///
/// # Returns
/// Fixed-size 32-byte array (`[u8; 32]`) containing the hash.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(digest::digest(&digest::SHA256, data).as_ref());
    out
}

/// Generates a random 128-bit token as a lowercase hex string.
///
/// Used for request ids and the single-use `nonce`/`state` values handed to
/// the wallet. Values are compared verbatim, never parsed.
pub fn random_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256("abc") from FIPS 180-2
        let hash = sha256(b"abc");
        assert_eq!(
            hex::encode(hash),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_random_token_shape() {
        let a = random_token();
        let b = random_token();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
