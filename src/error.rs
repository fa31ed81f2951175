// src/error.rs
//! Error taxonomy for the attestation system.
//!
//! Every failure a request can hit is a distinct variant so callers receive
//! a typed reason instead of a boolean plus log output. None of these are
//! fatal to the service process; all are per-request.

use thiserror::Error;

/// Errors produced while parsing tokens, resolving keys, verifying
/// signatures, managing sessions, or talking to the ledger.
#[derive(Error, Debug)]
pub enum Error {
    /// The presented token is not a well-formed selective-disclosure token.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The issuer identifier uses a DID method other than `did:web`.
    #[error("unsupported issuer method: {0}")]
    UnsupportedIssuerMethod(String),

    /// The well-known DID document could not be fetched or parsed.
    #[error("key resolution failed: {0}")]
    KeyResolutionFailed(String),

    /// The issuer's DID document lists no verification methods.
    #[error("DID document contains no verification method")]
    NoVerificationMethod,

    /// The selected verification method is not a P-256 elliptic-curve key.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// The token header declares an algorithm other than ES256.
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The token's `exp` claim is in the past.
    #[error("token has expired")]
    TokenExpired,

    /// The token's `iat` claim is in the future.
    #[error("token is not yet valid")]
    TokenNotYetValid,

    /// The token's `iss` claim does not match the issuer it was presented for.
    #[error("issuer mismatch")]
    IssuerMismatch,

    /// The envelope signature does not verify against the issuer's key.
    #[error("invalid signature")]
    SignatureInvalid,

    /// The token's issuer is not in the configured allow-list.
    #[error("unsupported issuer: {0}")]
    UnsupportedIssuer(String),

    /// No live session exists for the given request id.
    #[error("invalid or expired request")]
    SessionNotFound,

    /// The callback's `state` does not match the session's `state`.
    #[error("invalid state parameter")]
    InvalidState,

    /// The token's subject is not the holder the session was opened for.
    #[error("holder DID mismatch")]
    HolderMismatch,

    /// An on-ledger attestation record could not be decoded.
    #[error("malformed attestation record: {0}")]
    MalformedRecord(String),

    /// The ledger collaborator could not be reached or rejected the request.
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),
}
