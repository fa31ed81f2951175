// src/services/api_server.rs
//! REST surface of the attestation service.
//!
//! Three route groups share one state object:
//! - `/verify/*`: the wallet-facing verification flow
//! - `/attestation/*`: attestation status lookups
//! - `/sdk/*`: relying-party permissions and data requests
//!
//! Handlers translate service results into `{ success, ... }` JSON bodies.
//! Typed errors map onto status codes in one place so the route handlers
//! stay thin: protocol violations are 400, unknown sessions 404, ledger
//! and resolution outages 502.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use log::info;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::error::Error;
use crate::services::attestation::AttestationService;
use crate::services::data_request::{DataRequestConfig, DataRequestService};
use crate::services::verification::VerificationService;

/// Body of a verification start request.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartVerificationRequest {
    holder_did: String,
}

/// Body posted by the wallet to a callback endpoint.
#[derive(Deserialize)]
struct CallbackRequest {
    state: String,
    vp_token: String,
}

/// API server state containing all service dependencies
pub struct ApiServer {
    verification: Arc<VerificationService>,
    data_requests: Arc<DataRequestService>,
    attestations: Arc<AttestationService>,
}

impl ApiServer {
    pub fn new(
        verification: Arc<VerificationService>,
        data_requests: Arc<DataRequestService>,
        attestations: Arc<AttestationService>,
    ) -> Self {
        ApiServer {
            verification,
            data_requests,
            attestations,
        }
    }

    /// Starts the API server and begins listening for requests
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "0.0.0.0:3001")
    pub async fn run(&self, addr: SocketAddr) -> anyhow::Result<()> {
        let app = Self::router(Arc::new(self.clone()));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("listening on {}", addr);
        axum::serve(listener, app).await?;
        Ok(())
    }

    /// Builds the full route table. Split out from [`run`] so tests can
    /// drive it without binding a socket.
    fn router(state: Arc<ApiServer>) -> Router {
        // wallets and relying-party frontends call from arbitrary origins
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/verify/start", post(Self::start_verification_handler))
            .route("/verify/request/:request_id", get(Self::verify_request_handler))
            .route("/verify/callback/:request_id", post(Self::verify_callback_handler))
            .route("/attestation/status/:holder_did", get(Self::attestation_status_handler))
            .route("/sdk/permissions/:holder_did", get(Self::permissions_handler))
            .route("/sdk/data-request", post(Self::open_data_request_handler))
            .route("/sdk/data-request/:request_id", get(Self::data_request_handler))
            .route("/sdk/data/:request_id", post(Self::extract_data_handler))
            .route("/sdk/callback/:request_id", post(Self::sdk_callback_handler))
            .route("/health", get(Self::health_handler))
            .layer(cors)
            .with_state(state)
    }

    // =====================
    // Verification Handlers
    // =====================

    /// Opens a verification request for a holder.
    ///
    /// # Endpoint
    /// POST /verify/start
    async fn start_verification_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<StartVerificationRequest>,
    ) -> impl IntoResponse {
        let started = state.verification.start(payload.holder_did);
        (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "requestId": started.request_id,
                "vpRequestUri": started.request_uri,
            })),
        )
    }

    /// Serves the presentation definition the wallet dereferences.
    ///
    /// # Endpoint
    /// GET /verify/request/:request_id
    ///
    /// # Responses
    /// - 200 OK: the OID4VP request object
    /// - 404 Not Found: unknown or expired request id
    async fn verify_request_handler(
        Path(request_id): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> impl IntoResponse {
        match state.verification.request_definition(&request_id) {
            Ok(definition) => (StatusCode::OK, Json(definition)),
            Err(e) => error_response(&e),
        }
    }

    /// Consumes the wallet callback and publishes the attestation.
    ///
    /// # Endpoint
    /// POST /verify/callback/:request_id
    ///
    /// # Responses
    /// - 200 OK: verification completed; `signature` carries the ledger
    ///   confirmation when a record was created
    /// - 400 Bad Request: state mismatch, bad token, or holder mismatch
    /// - 404 Not Found: unknown or expired request id
    /// - 502 Bad Gateway: ledger or key resolution unavailable
    async fn verify_callback_handler(
        Path(request_id): Path<String>,
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<CallbackRequest>,
    ) -> impl IntoResponse {
        match state
            .verification
            .handle_callback(&request_id, &payload.state, &payload.vp_token)
            .await
        {
            Ok(result) => {
                let signature = match result.outcome {
                    crate::services::attestation::PublishOutcome::Created(handle) => {
                        Some(handle.0)
                    }
                    crate::services::attestation::PublishOutcome::AlreadyExists => None,
                };
                (
                    StatusCode::OK,
                    Json(json!({
                        "success": true,
                        "message": "Verification completed and attestation created",
                        "signature": signature,
                    })),
                )
            }
            Err(e) => error_response(&e),
        }
    }

    // =====================
    // Attestation Handlers
    // =====================

    /// Per-issuer attestation status for a holder.
    ///
    /// # Endpoint
    /// GET /attestation/status/:holder_did
    async fn attestation_status_handler(
        Path(holder_did): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> impl IntoResponse {
        match state.attestations.status(&holder_did).await {
            Ok(status) => (StatusCode::OK, Json(json!(status))),
            Err(e) => error_response(&e),
        }
    }

    // =====================
    // SDK Handlers
    // =====================

    /// Reports which credentials a holder currently has attested.
    ///
    /// # Endpoint
    /// GET /sdk/permissions/:holder_did
    async fn permissions_handler(
        Path(holder_did): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> impl IntoResponse {
        match state.data_requests.check_permissions(&holder_did).await {
            Ok(permissions) => (StatusCode::OK, Json(json!(permissions))),
            Err(e) => error_response(&e),
        }
    }

    /// Opens a data request on behalf of a relying party.
    ///
    /// # Endpoint
    /// POST /sdk/data-request
    async fn open_data_request_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<DataRequestConfig>,
    ) -> impl IntoResponse {
        let opened = state.data_requests.open(payload);
        (StatusCode::OK, Json(json!(opened)))
    }

    /// Serves the presentation definition for a pending data request.
    ///
    /// # Endpoint
    /// GET /sdk/data-request/:request_id
    async fn data_request_handler(
        Path(request_id): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> impl IntoResponse {
        match state.data_requests.request_definition(&request_id) {
            Ok(definition) => (StatusCode::OK, Json(definition)),
            Err(e) => error_response(&e),
        }
    }

    /// Extracts the requested fields from a presented token.
    ///
    /// # Endpoint
    /// POST /sdk/data/:request_id
    async fn extract_data_handler(
        Path(request_id): Path<String>,
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<CallbackRequest>,
    ) -> impl IntoResponse {
        match state
            .data_requests
            .extract_data(&request_id, &payload.state, &payload.vp_token)
        {
            Ok(data) => (StatusCode::OK, Json(json!(data))),
            Err(e) => error_response(&e),
        }
    }

    /// Compatibility alias for wallets that post to the redirect URI; same
    /// extraction, enveloped response.
    ///
    /// # Endpoint
    /// POST /sdk/callback/:request_id
    async fn sdk_callback_handler(
        Path(request_id): Path<String>,
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<CallbackRequest>,
    ) -> impl IntoResponse {
        match state
            .data_requests
            .extract_data(&request_id, &payload.state, &payload.vp_token)
        {
            Ok(data) => (
                StatusCode::OK,
                Json(json!({ "success": true, "data": data })),
            ),
            Err(e) => error_response(&e),
        }
    }

    /// Liveness probe.
    ///
    /// # Endpoint
    /// GET /health
    async fn health_handler() -> impl IntoResponse {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    }
}

/// Maps a typed error onto its HTTP status and `{ success: false }` body.
fn error_response(error: &Error) -> (StatusCode, Json<serde_json::Value>) {
    let status = match error {
        Error::SessionNotFound => StatusCode::NOT_FOUND,
        Error::MalformedToken(_)
        | Error::UnsupportedIssuerMethod(_)
        | Error::NoVerificationMethod
        | Error::UnsupportedKeyType(_)
        | Error::UnsupportedAlgorithm(_)
        | Error::TokenExpired
        | Error::TokenNotYetValid
        | Error::IssuerMismatch
        | Error::SignatureInvalid
        | Error::UnsupportedIssuer(_)
        | Error::InvalidState
        | Error::HolderMismatch => StatusCode::BAD_REQUEST,
        Error::KeyResolutionFailed(_) | Error::LedgerUnavailable(_) => StatusCode::BAD_GATEWAY,
        Error::MalformedRecord(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({ "success": false, "error": error.to_string() })),
    )
}

impl Clone for ApiServer {
    fn clone(&self) -> Self {
        ApiServer {
            verification: Arc::clone(&self.verification),
            data_requests: Arc::clone(&self.data_requests),
            attestations: Arc::clone(&self.attestations),
        }
    }
}
