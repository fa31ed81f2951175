// src/services/token.rs
//! Selective-disclosure token parsing.
//!
//! A token arrives as `<jwt>~<disclosure_1>~...~<disclosure_n>`. Parsing is
//! a pure transform: it splits the segments, decodes the envelope payload,
//! and lifts out the claims downstream stages need. No cryptography happens
//! here.

use serde_json::Value;

use crate::error::Error;
use crate::models::token::{Disclosure, SelectiveDisclosureToken};
use crate::utils::encoding::b64url_decode;

/// Parses a selective-disclosure token string.
///
/// # Errors
/// Returns [`Error::MalformedToken`] when the envelope has fewer than two
/// dot-segments or its payload is not base64url JSON.
pub fn parse(token: &str) -> Result<SelectiveDisclosureToken, Error> {
    let mut segments = token.split('~');
    // split always yields at least one element
    let envelope = segments.next().unwrap_or_default().to_string();
    let disclosures: Vec<String> = segments
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let payload = decode_payload(&envelope)?;

    let holder_did = claim_str(&payload, "sub");
    let issuer_did = claim_str(&payload, "iss");
    let credential_reference = payload
        .pointer("/vc/id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let disclosure_digests = payload
        .pointer("/vc/credentialSubject/_sd")
        .and_then(Value::as_array)
        .map(|digests| {
            digests
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let expiry = payload.get("exp").and_then(Value::as_i64);

    Ok(SelectiveDisclosureToken {
        envelope,
        disclosures,
        holder_did,
        issuer_did,
        credential_reference,
        disclosure_digests,
        expiry,
    })
}

/// Decodes the envelope's payload segment (the middle dot-segment) as JSON.
pub fn decode_payload(envelope: &str) -> Result<Value, Error> {
    let mut parts = envelope.split('.');
    let _header = parts
        .next()
        .ok_or_else(|| Error::MalformedToken("empty envelope".into()))?;
    let payload_segment = parts
        .next()
        .ok_or_else(|| Error::MalformedToken("envelope has no payload segment".into()))?;

    let bytes = b64url_decode(payload_segment)
        .map_err(|e| Error::MalformedToken(format!("payload is not base64url: {}", e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedToken(format!("payload is not JSON: {}", e)))
}

/// Decodes one disclosure into its `(salt, claim name, claim value)` tuple.
///
/// # Errors
/// Returns [`Error::MalformedToken`] when the disclosure is not base64url or
/// does not decode to a 3-element JSON array.
pub fn decode_disclosure(disclosure: &str) -> Result<Disclosure, Error> {
    let bytes = b64url_decode(disclosure)
        .map_err(|e| Error::MalformedToken(format!("disclosure is not base64url: {}", e)))?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedToken(format!("disclosure is not JSON: {}", e)))?;

    match value.as_array().map(Vec::as_slice) {
        Some([salt, name, claim_value]) => Ok(Disclosure {
            salt: salt.as_str().unwrap_or_default().to_string(),
            claim_name: name.as_str().unwrap_or_default().to_string(),
            claim_value: claim_value.clone(),
        }),
        _ => Err(Error::MalformedToken(
            "disclosure is not a 3-element tuple".into(),
        )),
    }
}

fn claim_str(payload: &Value, claim: &str) -> String {
    payload
        .get(claim)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::encoding::b64url_encode;
    use serde_json::json;

    fn envelope_with(payload: Value) -> String {
        let header = b64url_encode(br#"{"alg":"ES256","typ":"JWT"}"#);
        let body = b64url_encode(payload.to_string().as_bytes());
        format!("{}.{}.{}", header, body, b64url_encode(b"sig"))
    }

    #[test]
    fn test_parse_full_token() {
        let envelope = envelope_with(json!({
            "sub": "did:pkh:sol:holder-1",
            "iss": "did:web:issuer.example.com",
            "exp": 1_900_000_000,
            "vc": {
                "id": "urn:uuid:credential-1",
                "credentialSubject": { "_sd": ["sha-256:AAAA", "sha-256:BBBB"] }
            }
        }));
        let d1 = b64url_encode(br#"["salt1","name","Alice"]"#);
        let token = parse(&format!("{}~{}", envelope, d1)).unwrap();

        assert_eq!(token.holder_did, "did:pkh:sol:holder-1");
        assert_eq!(token.issuer_did, "did:web:issuer.example.com");
        assert_eq!(token.credential_reference, "urn:uuid:credential-1");
        assert_eq!(token.disclosure_digests.len(), 2);
        assert_eq!(token.disclosures.len(), 1);
        assert_eq!(token.expiry, Some(1_900_000_000));
    }

    #[test]
    fn test_parse_token_without_disclosures() {
        let envelope = envelope_with(json!({
            "sub": "did:pkh:sol:holder-1",
            "iss": "did:web:issuer.example.com"
        }));
        let token = parse(&envelope).unwrap();
        assert!(token.disclosures.is_empty());
        assert!(token.disclosure_digests.is_empty());
        assert_eq!(token.credential_reference, "");
        assert_eq!(token.expiry, None);
    }

    #[test]
    fn test_parse_rejects_envelope_without_payload() {
        assert!(matches!(
            parse("not-a-jwt"),
            Err(Error::MalformedToken(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_json_payload() {
        let envelope = format!("{}.{}", b64url_encode(b"{}"), b64url_encode(b"not json"));
        assert!(matches!(parse(&envelope), Err(Error::MalformedToken(_))));
    }

    #[test]
    fn test_decode_disclosure_tuple() {
        let disclosure = b64url_encode(br#"["s-1","birth_date","1990-01-01"]"#);
        let decoded = decode_disclosure(&disclosure).unwrap();
        assert_eq!(decoded.salt, "s-1");
        assert_eq!(decoded.claim_name, "birth_date");
        assert_eq!(decoded.claim_value, json!("1990-01-01"));
    }

    #[test]
    fn test_decode_disclosure_rejects_wrong_arity() {
        let disclosure = b64url_encode(br#"["salt","name"]"#);
        assert!(decode_disclosure(&disclosure).is_err());
    }
}
