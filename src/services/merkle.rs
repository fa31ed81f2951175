// src/services/merkle.rs
//! Merkle commitment over disclosure digests.
//!
//! Folds the ordered digest list into one 256-bit root. The fold uses a
//! promotion rule for odd levels: an unpaired trailing node moves up to the
//! next level unchanged, never duplicated or hashed alone. Attestations
//! already on the ledger were committed under this rule, so it must be
//! reproduced bit-for-bit.

use crate::error::Error;
use crate::utils::crypto::sha256;
use crate::utils::encoding::b64url_decode;

/// Digest strings may carry an algorithm tag that is not part of the
/// committed bytes.
const DIGEST_TAG: &str = "sha-256:";

/// Computes the Merkle root of an ordered list of disclosure digests.
///
/// - No digests: returns `""`.
/// - One digest: returns its tag-stripped bytes hex-encoded, unhashed.
/// - Otherwise: pairwise SHA-256 left-to-right, promoting an unpaired
///   trailing node, until one digest remains; hex-encoded.
///
/// # Errors
/// Returns [`Error::MalformedToken`] when a digest is not base64url.
pub fn merkle_root(digests: &[String]) -> Result<String, Error> {
    if digests.is_empty() {
        return Ok(String::new());
    }

    let mut level: Vec<Vec<u8>> = digests
        .iter()
        .map(|digest| {
            b64url_decode(digest.strip_prefix(DIGEST_TAG).unwrap_or(digest))
                .map_err(|e| Error::MalformedToken(format!("digest is not base64url: {}", e)))
        })
        .collect::<Result<_, _>>()?;

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len() / 2 + 1);
        let mut nodes = level.chunks_exact(2);
        for pair in nodes.by_ref() {
            let mut combined = pair[0].clone();
            combined.extend_from_slice(&pair[1]);
            next.push(sha256(&combined).to_vec());
        }
        // unpaired trailing node is promoted unchanged
        if let [odd] = nodes.remainder() {
            next.push(odd.clone());
        }
        level = next;
    }

    Ok(hex::encode(&level[0]))
}
