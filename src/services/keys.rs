// src/services/keys.rs
//! Issuer key resolution via `did:web`.
//!
//! An issuer DID of the form `did:web:<domain>` maps to
//! `https://<domain>/.well-known/did.json`. The document's verification
//! methods carry JWKs; only P-256 elliptic-curve keys are accepted because
//! the envelope algorithm is fixed to ES256.

use log::warn;
use serde::Deserialize;
use std::time::Duration;

use crate::error::Error;

/// Bounded fetch timeout for the well-known document.
const RESOLUTION_TIMEOUT: Duration = Duration::from_secs(5);

const DID_WEB_PREFIX: &str = "did:web:";

/// A JSON Web Key as published in a DID document.
#[derive(Debug, Clone, Deserialize)]
pub struct PublicKeyJwk {
    pub kty: String,
    #[serde(default)]
    pub crv: String,
    #[serde(default)]
    pub x: String,
    #[serde(default)]
    pub y: String,
}

#[derive(Debug, Clone, Deserialize)]
struct VerificationMethod {
    id: String,
    #[serde(rename = "publicKeyJwk")]
    public_key_jwk: Option<PublicKeyJwk>,
}

#[derive(Debug, Deserialize)]
struct DidDocument {
    #[serde(rename = "verificationMethod", default)]
    verification_method: Vec<VerificationMethod>,
    #[serde(rename = "assertionMethod", default)]
    assertion_method: Vec<String>,
}

/// Resolves issuer signing keys from well-known DID documents.
#[derive(Clone)]
pub struct KeyResolver {
    http: reqwest::Client,
    /// When set, the document is fetched from this base URL instead of the
    /// DID's domain. Lets tests serve the document locally.
    base_override: Option<String>,
}

impl KeyResolver {
    /// Creates a resolver with the standard 5 second fetch timeout.
    pub fn new() -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(RESOLUTION_TIMEOUT)
            .build()
            .map_err(|e| Error::KeyResolutionFailed(e.to_string()))?;
        Ok(KeyResolver {
            http,
            base_override: None,
        })
    }

    /// Resolver that fetches the document from a fixed base URL.
    #[cfg(test)]
    pub fn with_base_url(base_url: &str) -> Result<Self, Error> {
        let mut resolver = Self::new()?;
        resolver.base_override = Some(base_url.trim_end_matches('/').to_string());
        Ok(resolver)
    }

    /// Resolves the P-256 signing key for `issuer_did`.
    ///
    /// Key selection order:
    /// 1. the verification method whose id matches `kid`, when present
    /// 2. the first id listed as an assertion method
    /// 3. the first verification method overall
    ///
    /// # Errors
    /// - [`Error::UnsupportedIssuerMethod`] for non-`did:web` issuers
    /// - [`Error::KeyResolutionFailed`] on fetch or JSON failure
    /// - [`Error::NoVerificationMethod`] when the document lists none
    /// - [`Error::UnsupportedKeyType`] for anything but EC/P-256
    pub async fn resolve(&self, issuer_did: &str, kid: Option<&str>) -> Result<PublicKeyJwk, Error> {
        let domain = issuer_did
            .strip_prefix(DID_WEB_PREFIX)
            .ok_or_else(|| Error::UnsupportedIssuerMethod(issuer_did.to_string()))?;

        let url = match &self.base_override {
            Some(base) => format!("{}/.well-known/did.json", base),
            None => format!("https://{}/.well-known/did.json", domain),
        };

        let response = self.http.get(&url).send().await.map_err(|e| {
            warn!("DID document fetch failed for {}: {}", issuer_did, e);
            Error::KeyResolutionFailed(e.to_string())
        })?;
        if !response.status().is_success() {
            return Err(Error::KeyResolutionFailed(format!(
                "document fetch returned {}",
                response.status()
            )));
        }

        let document: DidDocument = response
            .json()
            .await
            .map_err(|e| Error::KeyResolutionFailed(e.to_string()))?;
        if document.verification_method.is_empty() {
            return Err(Error::NoVerificationMethod);
        }

        let method = select_method(&document, kid);
        let jwk = method
            .public_key_jwk
            .clone()
            .ok_or_else(|| Error::UnsupportedKeyType("no publicKeyJwk".into()))?;
        if jwk.kty != "EC" || jwk.crv != "P-256" {
            return Err(Error::UnsupportedKeyType(format!(
                "{}/{}",
                jwk.kty, jwk.crv
            )));
        }
        Ok(jwk)
    }
}

fn select_method<'a>(document: &'a DidDocument, kid: Option<&str>) -> &'a VerificationMethod {
    if let Some(kid) = kid {
        if let Some(method) = document
            .verification_method
            .iter()
            .find(|method| method.id == kid)
        {
            return method;
        }
    }
    if let Some(assertion_id) = document.assertion_method.first() {
        if let Some(method) = document
            .verification_method
            .iter()
            .find(|method| &method.id == assertion_id)
        {
            return method;
        }
    }
    // select_method is only called on non-empty documents
    &document.verification_method[0]
}
