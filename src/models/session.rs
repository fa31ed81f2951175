// src/models/session.rs
//! Short-lived protocol sessions between "verification requested" and
//! "verification consumed".
//!
//! Sessions are created by the open operation, read by the
//! request-definition endpoint, never mutated, and deleted either by
//! explicit consumption or by the TTL sweep. A `request_id` is never
//! reused.

use tokio::time::Instant;

use crate::utils::crypto::random_token;

/// A pending verification request awaiting the wallet callback.
#[derive(Debug, Clone)]
pub struct VerificationSession {
    /// Unique id for the request; doubles as the session key.
    pub request_id: String,
    /// DID the relying party claims to be verifying.
    pub holder_did: String,
    /// Single-use anti-replay value embedded in the presentation definition.
    pub nonce: String,
    /// Single-use anti-CSRF value the callback must echo verbatim.
    pub state: String,
    pub created_at: Instant,
}

impl VerificationSession {
    /// Opens a fresh session for `holder_did` with random id/nonce/state.
    pub fn open(holder_did: String) -> Self {
        VerificationSession {
            request_id: random_token(),
            holder_did,
            nonce: random_token(),
            state: random_token(),
            created_at: Instant::now(),
        }
    }
}

/// A pending data request: the configurable variant of the flow where a
/// relying party asks for specific claim fields instead of an attestation.
#[derive(Debug, Clone)]
pub struct DataRequestSession {
    pub request_id: String,
    /// Credential type the wallet should present (e.g. "CitizenCredential").
    pub credential_type: String,
    /// Claim names the relying party wants revealed, in order.
    pub required_fields: Vec<String>,
    /// Human-readable purpose shown to the holder.
    pub purpose: String,
    /// Domain of the requesting application, used as the OID4VP client id.
    pub requester_domain: String,
    pub nonce: String,
    pub state: String,
    pub created_at: Instant,
}

impl DataRequestSession {
    pub fn open(
        credential_type: String,
        required_fields: Vec<String>,
        purpose: String,
        requester_domain: String,
    ) -> Self {
        DataRequestSession {
            request_id: random_token(),
            credential_type,
            required_fields,
            purpose,
            requester_domain,
            nonce: random_token(),
            state: random_token(),
            created_at: Instant::now(),
        }
    }
}

/// Anything the [`crate::services::session_store::SessionStore`] can hold.
pub trait SessionEntry: Clone + Send + 'static {
    fn created_at(&self) -> Instant;
}

impl SessionEntry for VerificationSession {
    fn created_at(&self) -> Instant {
        self.created_at
    }
}

impl SessionEntry for DataRequestSession {
    fn created_at(&self) -> Instant {
        self.created_at
    }
}
