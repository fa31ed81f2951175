// src/models/attestation.rs
//! On-ledger attestation payload and its binary codec.
//!
//! The attestation program stores an opaque byte blob per record; this
//! module owns the layout of that blob. Two layouts exist historically:
//!
//! - **Variant A** (canonical, written by this service):
//!   `u32-LE len ‖ merkle_root_bytes ‖ u32-LE len ‖ credential_reference`
//! - **Variant B** (legacy, read-only):
//!   fixed 32-byte merkle root ‖ `u32-LE len ‖ credential_reference`
//!
//! Mixing the two on write would break read compatibility with records
//! already on the ledger, so encoding always produces variant A and the
//! legacy decoder is only consulted when variant A parsing fails.

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The privacy-preserving payload of one attestation record: a commitment
/// digest plus the credential instance it attests, never raw claim data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationData {
    /// Hex-encoded 32-byte Merkle root over the disclosure digests.
    pub merkle_root: String,
    /// Credential instance id the attestation refers to.
    pub credential_reference: String,
}

impl AttestationData {
    /// Encodes the payload in the canonical variant-A layout.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let root_bytes = hex::decode(&self.merkle_root)
            .map_err(|e| Error::MalformedRecord(format!("merkle root is not hex: {}", e)))?;
        let reference_bytes = self.credential_reference.as_bytes();

        let mut buf = BytesMut::with_capacity(8 + root_bytes.len() + reference_bytes.len());
        buf.put_u32_le(root_bytes.len() as u32);
        buf.put_slice(&root_bytes);
        buf.put_u32_le(reference_bytes.len() as u32);
        buf.put_slice(reference_bytes);
        Ok(buf.to_vec())
    }

    /// Decodes a variant-A payload, falling back to the legacy variant-B
    /// layout when the length prefixes do not add up.
    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        Self::decode_prefixed(data).or_else(|_| Self::decode_legacy(data))
    }

    fn decode_prefixed(data: &[u8]) -> Result<Self, Error> {
        let mut buf = data;
        let root = read_chunk(&mut buf)?;
        let reference = read_chunk(&mut buf)?;
        if buf.has_remaining() {
            return Err(Error::MalformedRecord("trailing bytes".into()));
        }
        Ok(AttestationData {
            merkle_root: hex::encode(root),
            credential_reference: String::from_utf8(reference)
                .map_err(|e| Error::MalformedRecord(e.to_string()))?,
        })
    }

    /// Legacy layout: fixed 32-byte root, then a length-prefixed reference.
    fn decode_legacy(data: &[u8]) -> Result<Self, Error> {
        let mut buf = data;
        if buf.remaining() < 32 {
            return Err(Error::MalformedRecord("record shorter than root".into()));
        }
        let mut root = [0u8; 32];
        buf.copy_to_slice(&mut root);
        let reference = read_chunk(&mut buf)?;
        if buf.has_remaining() {
            return Err(Error::MalformedRecord("trailing bytes".into()));
        }
        Ok(AttestationData {
            merkle_root: hex::encode(root),
            credential_reference: String::from_utf8(reference)
                .map_err(|e| Error::MalformedRecord(e.to_string()))?,
        })
    }
}

/// Reads one `u32-LE length ‖ bytes` chunk with bounds checks.
fn read_chunk(buf: &mut &[u8]) -> Result<Vec<u8>, Error> {
    if buf.remaining() < 4 {
        return Err(Error::MalformedRecord("truncated length prefix".into()));
    }
    let len = buf.get_u32_le() as usize;
    if buf.remaining() < len {
        return Err(Error::MalformedRecord("truncated chunk".into()));
    }
    Ok(buf.copy_to_bytes(len).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AttestationData {
        AttestationData {
            merkle_root: hex::encode([7u8; 32]),
            credential_reference: "urn:uuid:parcel-42".into(),
        }
    }

    #[test]
    fn test_encode_layout_is_variant_a() {
        let encoded = sample().encode().unwrap();
        assert_eq!(&encoded[0..4], &32u32.to_le_bytes());
        assert_eq!(&encoded[4..36], &[7u8; 32]);
        assert_eq!(&encoded[36..40], &(18u32).to_le_bytes());
        assert_eq!(&encoded[40..], b"urn:uuid:parcel-42");
    }

    #[test]
    fn test_decode_canonical() {
        let data = sample();
        assert_eq!(AttestationData::decode(&data.encode().unwrap()).unwrap(), data);
    }

    #[test]
    fn test_decode_legacy_fixed_root() {
        let mut raw = vec![9u8; 32];
        raw.extend_from_slice(&5u32.to_le_bytes());
        raw.extend_from_slice(b"ref-1");
        let decoded = AttestationData::decode(&raw).unwrap();
        assert_eq!(decoded.merkle_root, hex::encode([9u8; 32]));
        assert_eq!(decoded.credential_reference, "ref-1");
    }

    #[test]
    fn test_decode_rejects_truncated_record() {
        let mut encoded = sample().encode().unwrap();
        encoded.truncate(10);
        assert!(AttestationData::decode(&encoded).is_err());
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut encoded = sample().encode().unwrap();
        encoded.push(0);
        assert!(AttestationData::decode(&encoded).is_err());
    }
}
