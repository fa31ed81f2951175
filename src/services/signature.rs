// src/services/signature.rs
//! Envelope signature verification.
//!
//! Checks run in order and short-circuit on the first failure: algorithm,
//! time window, issuer binding, then the ES256 signature itself against the
//! key resolved from the issuer's DID document. The JWS signature segment is
//! the fixed-size IEEE P1363 `r ‖ s` encoding, which is what `jsonwebtoken`
//! expects for ES256.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::warn;
use serde_json::Value;

use crate::error::Error;
use crate::services::keys::KeyResolver;
use crate::services::token::decode_payload;

/// Verifies a signed envelope against its issuer.
pub struct SignatureVerifier {
    resolver: KeyResolver,
}

impl SignatureVerifier {
    pub fn new(resolver: KeyResolver) -> Self {
        SignatureVerifier { resolver }
    }

    /// Validates header, time claims, issuer binding, and signature.
    ///
    /// # Arguments
    /// * `envelope` - The JWS (`header.payload.signature`)
    /// * `issuer_did` - The issuer the token was presented for
    ///
    /// # Errors
    /// The first failing check wins: [`Error::UnsupportedAlgorithm`],
    /// [`Error::TokenExpired`], [`Error::TokenNotYetValid`],
    /// [`Error::IssuerMismatch`], then resolution errors, then
    /// [`Error::SignatureInvalid`].
    pub async fn verify(&self, envelope: &str, issuer_did: &str) -> Result<(), Error> {
        let header = jsonwebtoken::decode_header(envelope)
            .map_err(|e| Error::MalformedToken(format!("undecodable header: {}", e)))?;
        if header.alg != Algorithm::ES256 {
            return Err(Error::UnsupportedAlgorithm(format!("{:?}", header.alg)));
        }

        let payload = decode_payload(envelope)?;
        let now = chrono::Utc::now().timestamp();
        if let Some(exp) = payload.get("exp").and_then(Value::as_i64) {
            if exp < now {
                return Err(Error::TokenExpired);
            }
        }
        if let Some(iat) = payload.get("iat").and_then(Value::as_i64) {
            if iat > now {
                return Err(Error::TokenNotYetValid);
            }
        }
        match payload.get("iss").and_then(Value::as_str) {
            Some(iss) if iss == issuer_did => {}
            _ => return Err(Error::IssuerMismatch),
        }

        let jwk = self.resolver.resolve(issuer_did, header.kid.as_deref()).await?;
        let key = DecodingKey::from_ec_components(&jwk.x, &jwk.y)
            .map_err(|e| Error::UnsupportedKeyType(e.to_string()))?;

        // exp/iat were validated above against our own clock; jsonwebtoken
        // only contributes the signature check here.
        let mut validation = Validation::new(Algorithm::ES256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = Default::default();

        decode::<Value>(envelope, &key, &validation).map_err(|e| {
            warn!("signature verification failed for {}: {}", issuer_did, e);
            Error::SignatureInvalid
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{mint_es256_token, publish_did_document, MOCK_SERVER};

    const ISSUER: &str = "did:web:issuer.example.com";

    #[tokio::test]
    async fn test_valid_signature_is_accepted() {
        let _guard = MOCK_SERVER.lock().unwrap_or_else(|e| e.into_inner());
        let signer = mint_es256_token(ISSUER);
        let _mock = publish_did_document(&signer, ISSUER);

        let envelope = signer.sign(serde_json::json!({
            "iss": ISSUER,
            "sub": "did:pkh:sol:holder-1",
            "exp": chrono::Utc::now().timestamp() + 1
        }));

        let verifier =
            SignatureVerifier::new(KeyResolver::with_base_url(&mockito::server_url()).unwrap());
        verifier.verify(&envelope, ISSUER).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected_before_resolution() {
        // no mock registered: expiry must fail before any fetch happens
        let signer = mint_es256_token(ISSUER);
        let envelope = signer.sign(serde_json::json!({
            "iss": ISSUER,
            "exp": chrono::Utc::now().timestamp() - 1
        }));

        let verifier = SignatureVerifier::new(KeyResolver::new().unwrap());
        let err = verifier.verify(&envelope, ISSUER).await.unwrap_err();
        assert!(matches!(err, Error::TokenExpired));
    }

    #[tokio::test]
    async fn test_future_iat_is_rejected() {
        let signer = mint_es256_token(ISSUER);
        let envelope = signer.sign(serde_json::json!({
            "iss": ISSUER,
            "iat": chrono::Utc::now().timestamp() + 3600
        }));

        let verifier = SignatureVerifier::new(KeyResolver::new().unwrap());
        let err = verifier.verify(&envelope, ISSUER).await.unwrap_err();
        assert!(matches!(err, Error::TokenNotYetValid));
    }

    #[tokio::test]
    async fn test_issuer_mismatch_is_rejected() {
        let signer = mint_es256_token(ISSUER);
        let envelope = signer.sign(serde_json::json!({ "iss": "did:web:other.example.com" }));

        let verifier = SignatureVerifier::new(KeyResolver::new().unwrap());
        let err = verifier.verify(&envelope, ISSUER).await.unwrap_err();
        assert!(matches!(err, Error::IssuerMismatch));
    }

    #[tokio::test]
    async fn test_non_es256_algorithm_is_rejected() {
        // HS256-shaped envelope with an arbitrary signature segment
        use crate::utils::encoding::b64url_encode;
        let envelope = format!(
            "{}.{}.{}",
            b64url_encode(br#"{"alg":"HS256","typ":"JWT"}"#),
            b64url_encode(br#"{"iss":"did:web:issuer.example.com"}"#),
            b64url_encode(b"sig")
        );

        let verifier = SignatureVerifier::new(KeyResolver::new().unwrap());
        let err = verifier.verify(&envelope, ISSUER).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedAlgorithm(_)));
    }

    #[tokio::test]
    async fn test_tampered_payload_fails_signature() {
        let _guard = MOCK_SERVER.lock().unwrap_or_else(|e| e.into_inner());
        let signer = mint_es256_token(ISSUER);
        let _mock = publish_did_document(&signer, ISSUER);

        let envelope = signer.sign(serde_json::json!({
            "iss": ISSUER,
            "sub": "did:pkh:sol:holder-1"
        }));
        // splice in a different payload while keeping the signature
        let tampered_payload = crate::utils::encoding::b64url_encode(
            format!(r#"{{"iss":"{}","sub":"did:pkh:sol:attacker"}}"#, ISSUER).as_bytes(),
        );
        let mut parts: Vec<&str> = envelope.split('.').collect();
        parts[1] = &tampered_payload;
        let tampered = parts.join(".");

        let verifier =
            SignatureVerifier::new(KeyResolver::with_base_url(&mockito::server_url()).unwrap());
        let err = verifier.verify(&tampered, ISSUER).await.unwrap_err();
        assert!(matches!(err, Error::SignatureInvalid));
    }

    #[tokio::test]
    async fn test_exp_one_second_ahead_is_accepted() {
        let _guard = MOCK_SERVER.lock().unwrap_or_else(|e| e.into_inner());
        let signer = mint_es256_token(ISSUER);
        let _mock = publish_did_document(&signer, ISSUER);

        let envelope = signer.sign(serde_json::json!({
            "iss": ISSUER,
            "exp": chrono::Utc::now().timestamp() + 1
        }));

        let verifier =
            SignatureVerifier::new(KeyResolver::with_base_url(&mockito::server_url()).unwrap());
        assert!(verifier.verify(&envelope, ISSUER).await.is_ok());
    }
}
