// src/ledger/client.rs
//! Ledger collaborator contract: deterministic address derivation plus the
//! read/create/scan operations the attestation program exposes.
//!
//! Address derivation is a pure function and therefore lives here, outside
//! any client implementation: the reconciliation scan recomputes addresses
//! and compares them against on-ledger ones, so every party must derive
//! identically.

use axum::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;
use crate::utils::crypto::sha256;

/// A deterministic ledger address, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerAddress(String);

impl LedgerAddress {
    pub fn new(address: impl Into<String>) -> Self {
        LedgerAddress(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LedgerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One attestation account as stored by the program.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationAccount {
    /// Schema address the record was created under.
    pub schema: LedgerAddress,
    /// Expiry in epoch seconds, set by the publisher.
    pub expiry: i64,
    /// Opaque payload bytes (see `models::attestation` for the layout).
    pub data: Vec<u8>,
}

/// Inputs for a create-attestation instruction.
#[derive(Debug, Clone)]
pub struct CreateAttestation {
    pub address: LedgerAddress,
    pub credential: LedgerAddress,
    pub schema: LedgerAddress,
    pub nonce: String,
    pub expiry: i64,
    pub data: Vec<u8>,
}

/// Handle returned by the ledger once a create operation is confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationHandle(pub String);

/// Operations the external attestation program exposes.
///
/// Transaction assembly, signing, and broadcast all live behind the
/// implementor; callers treat these as fail-fast I/O and never retry
/// non-idempotent operations.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Reads one attestation account; `Ok(None)` when no record exists.
    async fn read_attestation(
        &self,
        address: &LedgerAddress,
    ) -> Result<Option<AttestationAccount>, Error>;

    /// Submits a create instruction and waits for confirmation.
    async fn create_attestation(
        &self,
        input: CreateAttestation,
    ) -> Result<ConfirmationHandle, Error>;

    /// Lists every account owned by the attestation program.
    async fn list_attestations(&self)
        -> Result<Vec<(LedgerAddress, AttestationAccount)>, Error>;
}

/// Derives the credential account address from its authority and name.
pub fn derive_credential_address(authority: &str, name: &str) -> LedgerAddress {
    derive(&[b"credential", authority.as_bytes(), name.as_bytes()])
}

/// Derives a schema account address under a credential.
pub fn derive_schema_address(
    credential: &LedgerAddress,
    name: &str,
    version: u32,
) -> LedgerAddress {
    derive(&[
        b"schema",
        credential.as_str().as_bytes(),
        name.as_bytes(),
        &version.to_le_bytes(),
    ])
}

/// Derives an attestation account address from `(credential, schema, nonce)`.
pub fn derive_attestation_address(
    credential: &LedgerAddress,
    schema: &LedgerAddress,
    nonce: &str,
) -> LedgerAddress {
    derive(&[
        b"attestation",
        credential.as_str().as_bytes(),
        schema.as_str().as_bytes(),
        nonce.as_bytes(),
    ])
}

/// Seed concatenation with u32-LE length framing, then SHA-256.
///
/// The framing keeps seed boundaries unambiguous (`["ab","c"]` must not
/// collide with `["a","bc"]`). The prefix is 4 bytes because one seed is a
/// holder-derived nonce with no length bound.
fn derive(seeds: &[&[u8]]) -> LedgerAddress {
    let mut preimage = Vec::new();
    for seed in seeds {
        preimage.extend_from_slice(&(seed.len() as u32).to_le_bytes());
        preimage.extend_from_slice(seed);
    }
    LedgerAddress(hex::encode(sha256(&preimage)))
}
