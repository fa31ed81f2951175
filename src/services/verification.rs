// src/services/verification.rs
//! The verification flow: open a request, serve its presentation
//! definition to the wallet, and consume the callback.
//!
//! A callback runs checks in a fixed order, each with its own error so the
//! relying party can tell "expired session" from "bad token": session
//! lookup, state echo, token verification, holder binding, then the
//! attestation publish. The session is consumed only after a successful
//! publish; a failed callback leaves it in place for a retry within the
//! TTL.

use log::{info, warn};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::Config;
use crate::error::Error;
use crate::models::session::VerificationSession;
use crate::models::token::VerifiedPresentation;
use crate::services::attestation::{AttestationService, PublishOutcome};
use crate::services::merkle::merkle_root;
use crate::services::session_store::SessionStore;
use crate::services::signature::SignatureVerifier;
use crate::services::token;

/// Handle returned when a verification request is opened.
#[derive(Debug, Clone)]
pub struct StartedVerification {
    pub request_id: String,
    /// URI the wallet dereferences to fetch the presentation definition.
    pub request_uri: String,
}

/// Result of a successful callback.
#[derive(Debug, Clone)]
pub struct CallbackResult {
    pub holder_did: String,
    pub issuer_did: String,
    pub outcome: PublishOutcome,
}

/// Orchestrates the wallet-facing verification protocol.
pub struct VerificationService {
    config: Arc<Config>,
    signature: SignatureVerifier,
    attestations: Arc<AttestationService>,
    sessions: SessionStore<VerificationSession>,
}

impl VerificationService {
    pub fn new(
        config: Arc<Config>,
        signature: SignatureVerifier,
        attestations: Arc<AttestationService>,
        sessions: SessionStore<VerificationSession>,
    ) -> Self {
        VerificationService {
            config,
            signature,
            attestations,
            sessions,
        }
    }

    pub fn sessions(&self) -> &SessionStore<VerificationSession> {
        &self.sessions
    }

    /// Opens a verification request for a holder.
    pub fn start(&self, holder_did: String) -> StartedVerification {
        let session = VerificationSession::open(holder_did);
        let request_id = session.request_id.clone();
        let request_uri = format!(
            "https://{}/verify/request/{}",
            self.config.domain, request_id
        );
        info!("verification request {} opened", request_id);
        self.sessions.insert(request_id.clone(), session);
        StartedVerification {
            request_id,
            request_uri,
        }
    }

    /// The OID4VP presentation definition for a pending request.
    ///
    /// Constrains the presented credential to the registered credential
    /// types and the issuer allow-list, and carries the session's nonce and
    /// state for the callback to echo.
    ///
    /// # Errors
    /// [`Error::SessionNotFound`] when the request id is unknown or expired.
    pub fn request_definition(&self, request_id: &str) -> Result<Value, Error> {
        let session = self
            .sessions
            .get(request_id)
            .ok_or(Error::SessionNotFound)?;

        let type_pattern = self.pattern(|issuer| issuer.credential_type.clone());
        let issuer_pattern = self.pattern(|issuer| issuer.did.clone());
        let callback_uri = format!(
            "https://{}/verify/callback/{}",
            self.config.domain, request_id
        );

        Ok(json!({
            "presentation_definition": {
                "id": format!("attest-vp-request-{}", request_id),
                "input_descriptors": [{
                    "id": "supported-credential",
                    "name": "Registered credential",
                    "purpose": "A registered credential is required to create an on-chain attestation",
                    "constraints": {
                        "fields": [
                            {
                                "path": ["$.vc.type"],
                                "filter": {
                                    "type": "array",
                                    "contains": { "type": "string", "pattern": type_pattern }
                                }
                            },
                            {
                                "path": ["$.iss"],
                                "filter": { "type": "string", "pattern": issuer_pattern }
                            }
                        ]
                    }
                }]
            },
            "response_type": "vp_token",
            "response_mode": "direct_post",
            "client_id": self.config.client_did,
            "nonce": session.nonce,
            "state": session.state,
            "redirect_uri": callback_uri,
            "response_uri": callback_uri,
        }))
    }

    /// Consumes a wallet callback: verifies the token and publishes the
    /// attestation.
    ///
    /// # Errors
    /// In check order: [`Error::SessionNotFound`], [`Error::InvalidState`],
    /// any token verification error, [`Error::HolderMismatch`], then ledger
    /// errors from the publish.
    pub async fn handle_callback(
        &self,
        request_id: &str,
        state: &str,
        vp_token: &str,
    ) -> Result<CallbackResult, Error> {
        let session = self
            .sessions
            .get(request_id)
            .ok_or(Error::SessionNotFound)?;
        if state != session.state {
            return Err(Error::InvalidState);
        }

        let presentation = self.verify_presentation(vp_token).await.map_err(|e| {
            warn!("callback {} failed verification: {}", request_id, e);
            e
        })?;
        if presentation.holder_did != session.holder_did {
            return Err(Error::HolderMismatch);
        }

        let outcome = self.attestations.publish(&presentation).await?;
        self.sessions.consume(request_id);
        info!(
            "verification request {} completed for {}",
            request_id, presentation.holder_did
        );

        Ok(CallbackResult {
            holder_did: presentation.holder_did,
            issuer_did: presentation.issuer_did,
            outcome,
        })
    }

    /// Verifies a selective-disclosure token end to end.
    ///
    /// Parse, allow-list the issuer, verify the envelope signature, then
    /// commit to the disclosure digests. The allow-list check runs before
    /// key resolution so unknown issuers never trigger a network fetch.
    pub async fn verify_presentation(
        &self,
        vp_token: &str,
    ) -> Result<VerifiedPresentation, Error> {
        let parsed = token::parse(vp_token)?;
        if self.config.issuer_by_did(&parsed.issuer_did).is_none() {
            return Err(Error::UnsupportedIssuer(parsed.issuer_did));
        }

        self.signature
            .verify(&parsed.envelope, &parsed.issuer_did)
            .await?;
        let merkle_root = merkle_root(&parsed.disclosure_digests)?;

        Ok(VerifiedPresentation {
            holder_did: parsed.holder_did,
            issuer_did: parsed.issuer_did,
            merkle_root,
            credential_reference: parsed.credential_reference,
            expiry: parsed.expiry.unwrap_or(0),
        })
    }

    fn pattern(&self, field: impl Fn(&crate::config::IssuerConfig) -> String) -> String {
        let alternatives: Vec<String> = self.config.issuers.iter().map(field).collect();
        format!("({})", alternatives.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IssuerClass, IssuerConfig};
    use crate::ledger::memory::MemoryLedger;
    use crate::services::keys::KeyResolver;
    use crate::services::testing::{mint_es256_token, publish_did_document, TestSigner, MOCK_SERVER};
    use crate::utils::encoding::b64url_encode;

    const ISSUER: &str = "did:web:issuer.example.com";
    const HOLDER: &str = "did:pkh:sol:HoLdErAccount111";

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
            domain: "verifier.example.com".into(),
            client_did: "did:web:verifier.example.com".into(),
            ledger_rpc_url: "http://localhost:8899".into(),
            attestation_program_id: "attest-program".into(),
            authority_address: "authority-1".into(),
            credential_name: "national-attest".into(),
            issuers: vec![IssuerConfig {
                key: "identity".into(),
                did: ISSUER.into(),
                credential_type: "CitizenCredential".into(),
                schema_name: "Identity Verification".into(),
                schema_version: 1,
                class: IssuerClass::Singleton,
            }],
        })
    }

    fn service_with_mock_resolver() -> (VerificationService, Arc<MemoryLedger>) {
        let config = test_config();
        let ledger = Arc::new(MemoryLedger::new());
        let attestations = Arc::new(AttestationService::new(ledger.clone(), config.clone()));
        let resolver = KeyResolver::with_base_url(&mockito::server_url()).unwrap();
        let service = VerificationService::new(
            config,
            SignatureVerifier::new(resolver),
            attestations,
            SessionStore::new(),
        );
        (service, ledger)
    }

    /// A complete token: signed envelope plus two disclosures whose digests
    /// the payload commits to.
    fn sd_token(signer: &TestSigner, holder: &str) -> String {
        let d1 = b64url_encode(br#"["s-1","name","Alice"]"#);
        let d2 = b64url_encode(br#"["s-2","birth_date","1990-01-01"]"#);
        let digest = |d: &str| {
            format!(
                "sha-256:{}",
                b64url_encode(&crate::utils::crypto::sha256(d.as_bytes()))
            )
        };
        let envelope = signer.sign(json!({
            "iss": ISSUER,
            "sub": holder,
            "exp": chrono::Utc::now().timestamp() + 3600,
            "vc": {
                "id": "urn:uuid:credential-1",
                "type": ["VerifiableCredential", "CitizenCredential"],
                "credentialSubject": { "_sd": [digest(&d1), digest(&d2)] }
            }
        }));
        format!("{}~{}~{}", envelope, d1, d2)
    }

    #[test]
    fn test_start_stores_session_and_builds_request_uri() {
        let (service, _ledger) = service_with_mock_resolver();
        let started = service.start(HOLDER.into());
        assert!(started
            .request_uri
            .ends_with(&format!("/verify/request/{}", started.request_id)));
        assert!(service.sessions().get(&started.request_id).is_some());
    }

    #[test]
    fn test_request_definition_carries_session_values() {
        let (service, _ledger) = service_with_mock_resolver();
        let started = service.start(HOLDER.into());
        let session = service.sessions().get(&started.request_id).unwrap();

        let definition = service.request_definition(&started.request_id).unwrap();
        assert_eq!(definition["nonce"], json!(session.nonce));
        assert_eq!(definition["state"], json!(session.state));
        assert_eq!(definition["client_id"], json!("did:web:verifier.example.com"));
        let issuer_filter = definition["presentation_definition"]["input_descriptors"][0]
            ["constraints"]["fields"][1]["filter"]["pattern"]
            .as_str()
            .unwrap();
        assert!(issuer_filter.contains(ISSUER));
    }

    #[test]
    fn test_request_definition_for_unknown_id_fails() {
        let (service, _ledger) = service_with_mock_resolver();
        assert!(matches!(
            service.request_definition("no-such-id"),
            Err(Error::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_callback_publishes_attestation_and_consumes_session() {
        let _guard = MOCK_SERVER.lock().unwrap_or_else(|e| e.into_inner());
        let signer = mint_es256_token(ISSUER);
        let _mock = publish_did_document(&signer, ISSUER);

        let (service, ledger) = service_with_mock_resolver();
        let started = service.start(HOLDER.into());
        let state = service.sessions().get(&started.request_id).unwrap().state;

        let result = service
            .handle_callback(&started.request_id, &state, &sd_token(&signer, HOLDER))
            .await
            .unwrap();
        assert!(matches!(result.outcome, PublishOutcome::Created(_)));
        assert_eq!(result.holder_did, HOLDER);
        assert_eq!(ledger.write_count(), 1);

        // session is single-use
        let err = service
            .handle_callback(&started.request_id, &state, &sd_token(&signer, HOLDER))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotFound));
    }

    #[tokio::test]
    async fn test_callback_with_wrong_state_is_rejected_and_session_kept() {
        let _guard = MOCK_SERVER.lock().unwrap_or_else(|e| e.into_inner());
        let signer = mint_es256_token(ISSUER);
        let _mock = publish_did_document(&signer, ISSUER);

        let (service, ledger) = service_with_mock_resolver();
        let started = service.start(HOLDER.into());

        let err = service
            .handle_callback(&started.request_id, "wrong-state", &sd_token(&signer, HOLDER))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState));
        assert_eq!(ledger.write_count(), 0);
        // a failed callback leaves the session for a retry
        assert!(service.sessions().get(&started.request_id).is_some());
    }

    #[tokio::test]
    async fn test_callback_rejects_holder_mismatch() {
        let _guard = MOCK_SERVER.lock().unwrap_or_else(|e| e.into_inner());
        let signer = mint_es256_token(ISSUER);
        let _mock = publish_did_document(&signer, ISSUER);

        let (service, ledger) = service_with_mock_resolver();
        let started = service.start(HOLDER.into());
        let state = service.sessions().get(&started.request_id).unwrap().state;

        let err = service
            .handle_callback(
                &started.request_id,
                &state,
                &sd_token(&signer, "did:pkh:sol:SomeoneElse999"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HolderMismatch));
        assert_eq!(ledger.write_count(), 0);
    }

    #[tokio::test]
    async fn test_unlisted_issuer_is_rejected_without_resolution() {
        // no DID document mock: the allow-list must fail first
        let signer = mint_es256_token("did:web:rogue.example.com");
        let envelope = signer.sign(json!({
            "iss": "did:web:rogue.example.com",
            "sub": HOLDER
        }));

        let (service, _ledger) = service_with_mock_resolver();
        let err = service.verify_presentation(&envelope).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedIssuer(_)));
    }

    #[tokio::test]
    async fn test_verified_presentation_commits_to_disclosure_digests() {
        let _guard = MOCK_SERVER.lock().unwrap_or_else(|e| e.into_inner());
        let signer = mint_es256_token(ISSUER);
        let _mock = publish_did_document(&signer, ISSUER);

        let (service, _ledger) = service_with_mock_resolver();
        let token = sd_token(&signer, HOLDER);
        let presentation = service.verify_presentation(&token).await.unwrap();

        let parsed = crate::services::token::parse(&token).unwrap();
        let expected = merkle_root(&parsed.disclosure_digests).unwrap();
        assert_eq!(presentation.merkle_root, expected);
        assert_eq!(presentation.credential_reference, "urn:uuid:credential-1");
    }
}
