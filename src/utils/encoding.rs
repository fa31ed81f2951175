// src/utils/encoding.rs
//! Base64url helpers for token segments and disclosures.
//!
//! Wallets are inconsistent about padding, so decoding strips trailing `=`
//! before applying the unpadded URL-safe alphabet.

use base64::{decode_config, encode_config, DecodeError, URL_SAFE_NO_PAD};

/// Decodes a base64url string, tolerating optional `=` padding.
pub fn b64url_decode(input: &str) -> Result<Vec<u8>, DecodeError> {
    decode_config(input.trim_end_matches('='), URL_SAFE_NO_PAD)
}

/// Encodes bytes as unpadded base64url.
pub fn b64url_encode(input: &[u8]) -> String {
    encode_config(input, URL_SAFE_NO_PAD)
}
