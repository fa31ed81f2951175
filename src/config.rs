// src/config.rs
//! Environment-driven configuration.
//!
//! All deployment knobs come from the environment (loaded from `.env` in
//! `main`). The issuer registry doubles as the allow-list: a token from a
//! DID not listed here is rejected before any key resolution happens.

use anyhow::Context;
use serde::Serialize;

/// How many attestations one holder may accumulate under an issuer's schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuerClass {
    /// One attestation per holder; the derivation nonce is the holder
    /// address itself, so re-verification lands on the same record.
    Singleton,
    /// One attestation per credential instance; the nonce commits to the
    /// holder *and* the credential reference.
    MultiInstance,
}

/// One entry in the issuer allow-list.
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    /// Short key used in status maps (e.g. "identity", "property").
    pub key: String,
    /// The issuer's DID (`did:web:...`).
    pub did: String,
    /// Credential type this issuer signs, used in presentation definitions.
    pub credential_type: String,
    /// Schema name registered with the attestation program.
    pub schema_name: String,
    /// Schema version registered with the attestation program.
    pub schema_version: u32,
    pub class: IssuerClass,
}

/// Service configuration, assembled once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Public domain of this service, used to build request URIs.
    pub domain: String,
    /// This verifier's own DID, used as the OID4VP client id.
    pub client_did: String,
    /// Base URL of the ledger gateway.
    pub ledger_rpc_url: String,
    /// Attestation program id on the ledger.
    pub attestation_program_id: String,
    /// Authority account the credential was registered under.
    pub authority_address: String,
    /// Name the credential was registered under.
    pub credential_name: String,
    /// Issuer allow-list.
    pub issuers: Vec<IssuerConfig>,
}

impl Config {
    /// Reads configuration from the environment.
    ///
    /// # Errors
    /// Returns `Err` naming the first missing variable; malformed schema
    /// versions fall back to 1.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            domain: required("DOMAIN")?,
            client_did: required("CLIENT_DID")?,
            ledger_rpc_url: required("LEDGER_RPC_URL")?,
            attestation_program_id: required("ATTESTATION_PROGRAM_ID")?,
            authority_address: required("AUTHORITY_ADDRESS")?,
            credential_name: required("CREDENTIAL_NAME")?,
            issuers: vec![
                IssuerConfig {
                    key: "identity".into(),
                    did: required("ISSUER_IDENTITY_DID")?,
                    credential_type: env_or("CREDENTIAL_TYPE_IDENTITY", "CitizenCredential"),
                    schema_name: required("SCHEMA_NAME_IDENTITY")?,
                    schema_version: version_or_default("SCHEMA_VERSION_IDENTITY"),
                    class: IssuerClass::Singleton,
                },
                IssuerConfig {
                    key: "property".into(),
                    did: required("ISSUER_PROPERTY_DID")?,
                    credential_type: env_or("CREDENTIAL_TYPE_PROPERTY", "PropertyCredential"),
                    schema_name: required("SCHEMA_NAME_PROPERTY")?,
                    schema_version: version_or_default("SCHEMA_VERSION_PROPERTY"),
                    class: IssuerClass::MultiInstance,
                },
            ],
        })
    }

    /// Looks up an issuer by DID; `None` means the issuer is not allowed.
    pub fn issuer_by_did(&self, did: &str) -> Option<&IssuerConfig> {
        self.issuers.iter().find(|issuer| issuer.did == did)
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("{} must be set in the environment", name))
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn version_or_default(name: &str) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1)
}
