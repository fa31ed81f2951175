// src/models/token.rs
//! Selective-disclosure token data model.
//!
//! A token is a signed JWS envelope followed by zero or more independently
//! revealable disclosures, joined with `~`. The envelope commits to the
//! disclosures through digest strings in its payload; the disclosures
//! themselves are only present when the holder chose to reveal them.

use serde::{Deserialize, Serialize};

/// A parsed selective-disclosure credential token.
///
/// Only the split segments are stored verbatim; everything else is derived
/// from the envelope payload at parse time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectiveDisclosureToken {
    /// The signed JWS envelope (`header.payload.signature`, base64url).
    pub envelope: String,

    /// Revealed disclosures, in presentation order (opaque base64url).
    pub disclosures: Vec<String>,

    /// DID of the credential subject (`sub` claim).
    pub holder_did: String,

    /// DID of the credential issuer (`iss` claim).
    pub issuer_did: String,

    /// Credential instance id (`vc.id`); empty string if absent.
    pub credential_reference: String,

    /// Disclosure digest strings referenced from the payload
    /// (`vc.credentialSubject._sd`); empty if absent.
    pub disclosure_digests: Vec<String>,

    /// Expiry of the envelope (`exp`, epoch seconds), if present.
    pub expiry: Option<i64>,
}

/// A single decoded disclosure: `(salt, claim name, claim value)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Disclosure {
    pub salt: String,
    pub claim_name: String,
    pub claim_value: serde_json::Value,
}

/// The result of a successful end-to-end token verification.
///
/// Carries everything the attestation publisher needs; invalid tokens never
/// produce one of these, they surface a typed [`crate::error::Error`]
/// instead.
#[derive(Debug, Clone)]
pub struct VerifiedPresentation {
    pub holder_did: String,
    pub issuer_did: String,
    /// Hex-encoded Merkle commitment over the disclosure digests.
    pub merkle_root: String,
    pub credential_reference: String,
    /// Attestation expiry in epoch seconds; 0 when the token carries none.
    pub expiry: i64,
}
