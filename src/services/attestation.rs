// src/services/attestation.rs
//! Attestation publishing and querying against the ledger.
//!
//! Addresses are deterministic, so publishing is existence-checked and
//! idempotent: at most one record per derived address, and a re-publish of
//! the same verification is a successful no-op. Reads come in two shapes:
//! a single lookup for singleton issuers, and a full-scan reconciliation
//! for multi-instance issuers, where no holder index exists and membership
//! is proven by recomputing each record's expected address from its own
//! decoded credential reference.

use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{Config, IssuerClass, IssuerConfig};
use crate::error::Error;
use crate::ledger::client::{
    derive_attestation_address, derive_credential_address, derive_schema_address,
    ConfirmationHandle, CreateAttestation, LedgerAddress, LedgerClient,
};
use crate::models::attestation::AttestationData;
use crate::models::token::VerifiedPresentation;
use crate::utils::crypto::sha256;

/// Outcome of a publish: either a fresh record or an idempotent no-op.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Created(ConfirmationHandle),
    /// A record already exists at the derived address. Not an error.
    AlreadyExists,
}

/// Result of a singleton-issuer lookup.
#[derive(Debug, Clone, Serialize)]
pub struct SingletonStatus {
    pub exists: bool,
    pub address: LedgerAddress,
    pub data: Option<AttestationData>,
    pub expiry: Option<i64>,
}

/// One reconciled record belonging to the queried holder.
#[derive(Debug, Clone, Serialize)]
pub struct AttestationEntry {
    pub address: LedgerAddress,
    pub data: AttestationData,
    pub expiry: i64,
}

/// Result of a multi-instance reconciliation scan.
#[derive(Debug, Clone, Serialize)]
pub struct MultiInstanceStatus {
    pub exists: bool,
    pub attestations: Vec<AttestationEntry>,
    pub count: usize,
}

/// Per-issuer status, keyed by the issuer's registry key.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum IssuerStatus {
    Singleton(SingletonStatus),
    MultiInstance(MultiInstanceStatus),
}

/// Publishes and queries attestation records.
pub struct AttestationService {
    ledger: Arc<dyn LedgerClient>,
    config: Arc<Config>,
    /// Credential account address, derived once from authority and name.
    credential_address: LedgerAddress,
}

impl AttestationService {
    pub fn new(ledger: Arc<dyn LedgerClient>, config: Arc<Config>) -> Self {
        let credential_address =
            derive_credential_address(&config.authority_address, &config.credential_name);
        AttestationService {
            ledger,
            config,
            credential_address,
        }
    }

    /// Idempotently publishes the attestation for a verified presentation.
    ///
    /// # Process flow
    /// 1. Derive the attestation address from the issuer's nonce policy
    /// 2. Existing record at that address ⇒ `AlreadyExists`, no write
    /// 3. Otherwise encode the payload and submit a create instruction
    ///
    /// # Errors
    /// [`Error::UnsupportedIssuer`] for issuers outside the registry;
    /// [`Error::LedgerUnavailable`] when the ledger cannot be reached.
    pub async fn publish(
        &self,
        presentation: &VerifiedPresentation,
    ) -> Result<PublishOutcome, Error> {
        let issuer = self
            .config
            .issuer_by_did(&presentation.issuer_did)
            .ok_or_else(|| Error::UnsupportedIssuer(presentation.issuer_did.clone()))?;

        let schema = self.schema_address(issuer);
        let holder = holder_address(&presentation.holder_did);
        let nonce = attestation_nonce(issuer.class, &holder, &presentation.credential_reference);
        let address = derive_attestation_address(&self.credential_address, &schema, &nonce);

        if self.ledger.read_attestation(&address).await?.is_some() {
            debug!("attestation already exists at {}", address);
            return Ok(PublishOutcome::AlreadyExists);
        }

        let data = AttestationData {
            merkle_root: presentation.merkle_root.clone(),
            credential_reference: presentation.credential_reference.clone(),
        }
        .encode()?;

        let handle = self
            .ledger
            .create_attestation(CreateAttestation {
                address: address.clone(),
                credential: self.credential_address.clone(),
                schema,
                nonce,
                expiry: presentation.expiry,
                data,
            })
            .await?;
        info!("attestation created at {} ({})", address, handle.0);
        Ok(PublishOutcome::Created(handle))
    }

    /// Reads the one attestation a singleton issuer allows per holder.
    pub async fn read_singleton(
        &self,
        holder_did: &str,
        issuer: &IssuerConfig,
    ) -> Result<SingletonStatus, Error> {
        let schema = self.schema_address(issuer);
        let nonce = holder_address(holder_did);
        let address = derive_attestation_address(&self.credential_address, &schema, &nonce);

        match self.ledger.read_attestation(&address).await? {
            Some(account) => Ok(SingletonStatus {
                exists: true,
                data: Some(AttestationData::decode(&account.data)?),
                expiry: Some(account.expiry),
                address,
            }),
            None => Ok(SingletonStatus {
                exists: false,
                address,
                data: None,
                expiry: None,
            }),
        }
    }

    /// Finds every multi-instance attestation belonging to a holder.
    ///
    /// No holder index exists on the program, so this scans every account,
    /// filters by schema, and keeps a record only when the address derived
    /// from the record's own credential reference matches the address it
    /// actually lives at. Cost is O(total records on the program); the scan
    /// is read-only and may transiently miss a record published while it
    /// runs.
    pub async fn read_multi_instance(
        &self,
        holder_did: &str,
        issuer: &IssuerConfig,
    ) -> Result<MultiInstanceStatus, Error> {
        let schema = self.schema_address(issuer);
        let holder = holder_address(holder_did);

        let mut attestations = Vec::new();
        for (address, account) in self.ledger.list_attestations().await? {
            if account.schema != schema {
                continue;
            }
            // undecodable records are skipped, not fatal to the scan
            let data = match AttestationData::decode(&account.data) {
                Ok(data) => data,
                Err(e) => {
                    debug!("skipping undecodable record at {}: {}", address, e);
                    continue;
                }
            };

            let expected_nonce =
                attestation_nonce(issuer.class, &holder, &data.credential_reference);
            let expected =
                derive_attestation_address(&self.credential_address, &schema, &expected_nonce);
            if expected == address {
                attestations.push(AttestationEntry {
                    address,
                    data,
                    expiry: account.expiry,
                });
            }
        }

        Ok(MultiInstanceStatus {
            exists: !attestations.is_empty(),
            count: attestations.len(),
            attestations,
        })
    }

    /// Per-issuer attestation status for a holder, across the registry.
    pub async fn status(&self, holder_did: &str) -> Result<BTreeMap<String, IssuerStatus>, Error> {
        let mut results = BTreeMap::new();
        for issuer in &self.config.issuers {
            let status = match issuer.class {
                IssuerClass::Singleton => {
                    IssuerStatus::Singleton(self.read_singleton(holder_did, issuer).await?)
                }
                IssuerClass::MultiInstance => {
                    IssuerStatus::MultiInstance(self.read_multi_instance(holder_did, issuer).await?)
                }
            };
            results.insert(issuer.key.clone(), status);
        }
        Ok(results)
    }

    fn schema_address(&self, issuer: &IssuerConfig) -> LedgerAddress {
        derive_schema_address(
            &self.credential_address,
            &issuer.schema_name,
            issuer.schema_version,
        )
    }
}

/// Normalizes a holder DID to its bare ledger account.
///
/// `did:pkh` DIDs embed the account as the final segment; anything else is
/// used verbatim.
pub fn holder_address(holder_did: &str) -> String {
    if holder_did.starts_with("did:pkh:") {
        holder_did
            .rsplit(':')
            .next()
            .unwrap_or(holder_did)
            .to_string()
    } else {
        holder_did.to_string()
    }
}

/// The issuer-class-dependent third derivation seed.
///
/// Singleton issuers key on the holder alone, so one attestation per
/// holder. Multi-instance issuers commit to holder and credential
/// reference, so each credential instance gets its own address. The exact
/// bytes are load-bearing: the reconciliation scan recomputes them against
/// records already on the ledger.
pub fn attestation_nonce(class: IssuerClass, holder: &str, credential_reference: &str) -> String {
    match class {
        IssuerClass::Singleton => holder.to_string(),
        IssuerClass::MultiInstance => {
            let mut preimage = holder.as_bytes().to_vec();
            preimage.extend_from_slice(credential_reference.as_bytes());
            hex::encode(sha256(&preimage))
        }
    }
}
