// src/ledger/rpc.rs
//! HTTP client for the ledger gateway.
//!
//! The gateway owns keypairs, transaction assembly, signing, and broadcast;
//! this client only speaks its REST surface. Every failure maps to
//! [`Error::LedgerUnavailable`] and is surfaced to the caller unretried;
//! the idempotent operations (reads, existence-checked publish) are safe to
//! re-invoke from the outside.

use axum::async_trait;
use log::warn;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Error;
use crate::ledger::client::{
    AttestationAccount, ConfirmationHandle, CreateAttestation, LedgerAddress, LedgerClient,
};

/// Confirmation timeout for gateway calls, covering broadcast and
/// finalization on the gateway side.
const LEDGER_TIMEOUT: Duration = Duration::from_secs(30);

/// Wire shape of one attestation account.
#[derive(Serialize, Deserialize)]
struct AccountBody {
    schema: String,
    expiry: i64,
    /// Payload bytes, standard base64.
    data: String,
}

#[derive(Serialize, Deserialize)]
struct ListedAccount {
    address: String,
    #[serde(flatten)]
    account: AccountBody,
}

#[derive(Serialize)]
struct CreateBody<'a> {
    address: &'a str,
    credential: &'a str,
    schema: &'a str,
    nonce: &'a str,
    expiry: i64,
    data: String,
}

#[derive(Deserialize)]
struct CreateResponse {
    signature: String,
}

/// Ledger gateway client over HTTP.
#[derive(Clone)]
pub struct RpcLedgerClient {
    http: reqwest::Client,
    base_url: String,
    program_id: String,
}

impl RpcLedgerClient {
    /// Creates a gateway client for the attestation program.
    ///
    /// # Arguments
    /// * `base_url` - Gateway base URL, without trailing slash
    /// * `program_id` - Attestation program id used for account scans
    pub fn new(base_url: &str, program_id: &str) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(LEDGER_TIMEOUT)
            .build()
            .map_err(|e| Error::LedgerUnavailable(e.to_string()))?;
        Ok(RpcLedgerClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            program_id: program_id.to_string(),
        })
    }

    fn account_from_body(body: AccountBody) -> Result<AttestationAccount, Error> {
        let data = base64::decode(&body.data)
            .map_err(|e| Error::LedgerUnavailable(format!("undecodable account data: {}", e)))?;
        Ok(AttestationAccount {
            schema: LedgerAddress::new(body.schema),
            expiry: body.expiry,
            data,
        })
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn read_attestation(
        &self,
        address: &LedgerAddress,
    ) -> Result<Option<AttestationAccount>, Error> {
        let url = format!("{}/v1/accounts/{}", self.base_url, address);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::LedgerUnavailable(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::LedgerUnavailable(format!(
                "account read returned {}",
                response.status()
            )));
        }

        let body: AccountBody = response
            .json()
            .await
            .map_err(|e| Error::LedgerUnavailable(e.to_string()))?;
        Ok(Some(Self::account_from_body(body)?))
    }

    async fn create_attestation(
        &self,
        input: CreateAttestation,
    ) -> Result<ConfirmationHandle, Error> {
        let url = format!("{}/v1/attestations", self.base_url);
        let body = CreateBody {
            address: input.address.as_str(),
            credential: input.credential.as_str(),
            schema: input.schema.as_str(),
            nonce: &input.nonce,
            expiry: input.expiry,
            data: base64::encode(&input.data),
        };

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::LedgerUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::LedgerUnavailable(format!(
                "attestation create returned {}",
                response.status()
            )));
        }

        let confirmed: CreateResponse = response
            .json()
            .await
            .map_err(|e| Error::LedgerUnavailable(e.to_string()))?;
        Ok(ConfirmationHandle(confirmed.signature))
    }

    async fn list_attestations(
        &self,
    ) -> Result<Vec<(LedgerAddress, AttestationAccount)>, Error> {
        let url = format!(
            "{}/v1/programs/{}/accounts",
            self.base_url, self.program_id
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::LedgerUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::LedgerUnavailable(format!(
                "program scan returned {}",
                response.status()
            )));
        }

        let listed: Vec<ListedAccount> = response
            .json()
            .await
            .map_err(|e| Error::LedgerUnavailable(e.to_string()))?;

        let mut accounts = Vec::with_capacity(listed.len());
        for entry in listed {
            // one bad account must not fail the whole scan
            match Self::account_from_body(entry.account) {
                Ok(account) => accounts.push((LedgerAddress::new(entry.address), account)),
                Err(e) => warn!("skipping account {}: {}", entry.address, e),
            }
        }
        Ok(accounts)
    }
}
