// src/main.rs

//! # Attestation Service - Main Entry Point
//!
//! Verifies selective-disclosure credentials presented over OID4VP and
//! publishes attestation records to a ledger program at deterministic
//! addresses.
//!
//! ## Architecture Overview
//! 1. **Ledger Layer**: `RpcLedgerClient` for the attestation program gateway
//! 2. **Services Layer**: verification, data requests, attestation publishing
//! 3. **Session Layer**: in-memory TTL stores for pending protocol sessions
//!
//! ## Environment Variables Required
//! - `DOMAIN`: Public domain of this service
//! - `CLIENT_DID`: This verifier's DID
//! - `LEDGER_RPC_URL`: Base URL of the ledger gateway
//! - `ATTESTATION_PROGRAM_ID`: Attestation program id
//! - `AUTHORITY_ADDRESS` / `CREDENTIAL_NAME`: Credential registration
//! - `ISSUER_IDENTITY_DID`, `SCHEMA_NAME_IDENTITY`, ... : Issuer registry
//! - `PORT`: (Optional) listen port (default: 3001)

use std::net::SocketAddr;
use std::sync::Arc;

use dotenv::dotenv;

use crate::config::Config;
use crate::ledger::rpc::RpcLedgerClient;
use crate::services::api_server::ApiServer;
use crate::services::attestation::AttestationService;
use crate::services::data_request::DataRequestService;
use crate::services::keys::KeyResolver;
use crate::services::session_store::SessionStore;
use crate::services::signature::SignatureVerifier;
use crate::services::verification::VerificationService;

mod config; // environment-driven configuration
mod error; // typed error taxonomy
mod ledger; // attestation program client and address derivation
mod models; // data structures
mod services; // business logic and API
mod utils; // hashing and base64url helpers

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load environment configuration
/// 2. Build the ledger client and service graph
/// 3. Spawn the session sweepers
/// 4. Start the API server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Arc::new(Config::from_env()?);

    let ledger = Arc::new(RpcLedgerClient::new(
        &config.ledger_rpc_url,
        &config.attestation_program_id,
    )?);

    let attestations = Arc::new(AttestationService::new(ledger, config.clone()));
    let verification = Arc::new(VerificationService::new(
        config.clone(),
        SignatureVerifier::new(KeyResolver::new()?),
        attestations.clone(),
        SessionStore::new(),
    ));
    let data_requests = Arc::new(DataRequestService::new(
        config.clone(),
        attestations.clone(),
        SessionStore::new(),
    ));

    verification.sessions().spawn_sweeper();
    data_requests.sessions().spawn_sweeper();

    let api_server = ApiServer::new(verification, data_requests, attestations);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001u16);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    api_server.run(addr).await
}
