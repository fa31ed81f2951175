// src/services/data_request.rs
//! SDK-facing data requests: a relying party asks the holder to reveal
//! specific claim fields instead of (or in addition to) holding an
//! attestation.
//!
//! The flow mirrors verification (open a session, serve a presentation
//! definition, consume the callback) but the callback extracts claim
//! values rather than publishing anything to the ledger. Extraction is
//! permissive: only the requested fields are returned, and disclosures
//! that fail to decode are skipped rather than failing the whole request.

use log::{debug, info};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::config::Config;
use crate::error::Error;
use crate::models::session::DataRequestSession;
use crate::services::attestation::{AttestationService, IssuerStatus};
use crate::services::session_store::{SessionStore, SESSION_TTL};
use crate::services::token;

/// What a holder is entitled to, derived from their on-ledger attestations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderPermissions {
    pub has_identity_credential: bool,
    pub has_property_credential: bool,
    pub property_count: usize,
}

/// Parameters of a data request, as supplied by the relying party.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequestConfig {
    pub credential_type: String,
    pub required_fields: Vec<String>,
    pub purpose: String,
    pub requester_domain: String,
}

/// Handle returned when a data request is opened.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenedDataRequest {
    pub request_id: String,
    pub request_uri: String,
    /// Seconds until the session expires.
    pub expires_in: u64,
}

/// The claim values extracted from a presented token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedData {
    /// Requested field name to claim value, for fields the token revealed.
    pub fields: Map<String, Value>,
    pub credential_reference: String,
    /// Epoch seconds at which the extraction happened.
    pub extracted_at: i64,
}

/// Orchestrates the SDK data-request protocol.
pub struct DataRequestService {
    config: Arc<Config>,
    attestations: Arc<AttestationService>,
    sessions: SessionStore<DataRequestSession>,
}

impl DataRequestService {
    pub fn new(
        config: Arc<Config>,
        attestations: Arc<AttestationService>,
        sessions: SessionStore<DataRequestSession>,
    ) -> Self {
        DataRequestService {
            config,
            attestations,
            sessions,
        }
    }

    pub fn sessions(&self) -> &SessionStore<DataRequestSession> {
        &self.sessions
    }

    /// Reports which credentials a holder currently has attested.
    pub async fn check_permissions(&self, holder_did: &str) -> Result<HolderPermissions, Error> {
        let status = self.attestations.status(holder_did).await?;

        let mut permissions = HolderPermissions {
            has_identity_credential: false,
            has_property_credential: false,
            property_count: 0,
        };
        for (key, issuer_status) in status {
            match issuer_status {
                IssuerStatus::Singleton(s) if key == "identity" => {
                    permissions.has_identity_credential = s.exists;
                }
                IssuerStatus::MultiInstance(s) if key == "property" => {
                    permissions.has_property_credential = s.exists;
                    permissions.property_count = s.count;
                }
                _ => {}
            }
        }
        Ok(permissions)
    }

    /// Opens a data request on behalf of a relying party.
    pub fn open(&self, request: DataRequestConfig) -> OpenedDataRequest {
        let session = DataRequestSession::open(
            request.credential_type,
            request.required_fields,
            request.purpose,
            request.requester_domain,
        );
        let request_id = session.request_id.clone();
        let request_uri = format!(
            "https://{}/sdk/data-request/{}",
            self.config.domain, request_id
        );
        info!("data request {} opened", request_id);
        self.sessions.insert(request_id.clone(), session);
        OpenedDataRequest {
            request_id,
            request_uri,
            expires_in: SESSION_TTL.as_secs(),
        }
    }

    /// The presentation definition for a pending data request.
    ///
    /// One field constraint per requested claim, plus the credential-type
    /// constraint. The relying party's domain is the OID4VP client id, not
    /// this service's DID.
    ///
    /// # Errors
    /// [`Error::SessionNotFound`] when the request id is unknown or expired.
    pub fn request_definition(&self, request_id: &str) -> Result<Value, Error> {
        let session = self
            .sessions
            .get(request_id)
            .ok_or(Error::SessionNotFound)?;

        let mut fields = vec![json!({
            "path": ["$.vc.type"],
            "filter": {
                "type": "array",
                "contains": { "type": "string", "pattern": session.credential_type }
            }
        })];
        for field in &session.required_fields {
            fields.push(json!({
                "path": [format!("$.vc.credentialSubject.{}", field)],
                "filter": { "type": "string" }
            }));
        }

        Ok(json!({
            "presentation_definition": {
                "id": format!("attest-data-request-{}", request_id),
                "input_descriptors": [{
                    "id": "credential-data",
                    "name": format!("{} data", session.credential_type),
                    "purpose": session.purpose,
                    "constraints": { "fields": fields }
                }]
            },
            "response_type": "vp_token",
            "response_mode": "direct_post",
            "client_id": session.requester_domain,
            "nonce": session.nonce,
            "state": session.state,
            "redirect_uri": format!("https://{}/sdk/callback/{}", self.config.domain, request_id),
            "response_uri": format!("https://{}/sdk/data/{}", self.config.domain, request_id),
        }))
    }

    /// Extracts the requested claim fields from a presented token and
    /// consumes the session.
    ///
    /// Values come from two places: claims inlined in the envelope payload's
    /// credential subject, and revealed disclosures. A disclosure overrides
    /// an inlined claim of the same name. Fields the token does not carry
    /// are simply absent from the result.
    ///
    /// # Errors
    /// [`Error::SessionNotFound`], [`Error::InvalidState`], or
    /// [`Error::MalformedToken`] when the envelope itself cannot be parsed.
    pub fn extract_data(
        &self,
        request_id: &str,
        state: &str,
        vp_token: &str,
    ) -> Result<ExtractedData, Error> {
        let session = self
            .sessions
            .get(request_id)
            .ok_or(Error::SessionNotFound)?;
        if state != session.state {
            return Err(Error::InvalidState);
        }

        let parsed = token::parse(vp_token)?;
        let payload = token::decode_payload(&parsed.envelope)?;

        let mut fields = Map::new();
        if let Some(subject) = payload
            .pointer("/vc/credentialSubject")
            .and_then(Value::as_object)
        {
            for field in &session.required_fields {
                if let Some(value) = subject.get(field) {
                    fields.insert(field.clone(), value.clone());
                }
            }
        }
        for disclosure in &parsed.disclosures {
            let decoded = match token::decode_disclosure(disclosure) {
                Ok(decoded) => decoded,
                Err(e) => {
                    debug!("skipping undecodable disclosure: {}", e);
                    continue;
                }
            };
            if session.required_fields.contains(&decoded.claim_name) {
                fields.insert(decoded.claim_name, decoded.claim_value);
            }
        }

        self.sessions.consume(request_id);
        info!("data request {} fulfilled", request_id);

        Ok(ExtractedData {
            fields,
            credential_reference: parsed.credential_reference,
            extracted_at: chrono::Utc::now().timestamp(),
        })
    }
}
