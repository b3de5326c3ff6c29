//! Assertion decoding and the JWT verification boundary it depends on.
//!
//! Verification and decoding are kept separate: `AssertionVerifier` checks
//! the signature and hands back the raw claim map, `decode_assertion` turns
//! a trusted claim map into `AssertionClaims`. The cores never trust an
//! assertion whose signature fails verification.

use std::collections::HashMap;

use aegis_core::{AssertionClaims, CoreError, CoreResult, RESERVED_ASSERTION_CLAIMS};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

pub trait AssertionVerifier: Send + Sync {
    /// Verifies the assertion's signature and standard claims, returning
    /// the raw claim map on success.
    fn verify(&self, assertion: &str) -> CoreResult<Map<String, Value>>;
}

/// Verifies assertions signed by the flow engine's key using `jsonwebtoken`.
pub struct JwtAssertionVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAssertionVerifier {
    pub fn new(decoding_key: DecodingKey, algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.set_required_spec_claims(&["sub"]);
        Self {
            decoding_key,
            validation,
        }
    }
}

impl AssertionVerifier for JwtAssertionVerifier {
    fn verify(&self, assertion: &str) -> CoreResult<Map<String, Value>> {
        let data = jsonwebtoken::decode::<Map<String, Value>>(assertion, &self.decoding_key, &self.validation)
            .map_err(|e| CoreError::invalid_request(format!("invalid assertion signature: {e}")))?;
        Ok(data.claims)
    }
}

/// Decodes an already-verified claim map into `AssertionClaims`.
pub fn decode_assertion(raw: &Map<String, Value>) -> CoreResult<AssertionClaims> {
    let user_id = match raw.get("sub") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::String(_)) | None => {
            return Err(CoreError::invalid_request("assertion missing a non-empty 'sub' claim"))
        }
        Some(_) => return Err(CoreError::invalid_request("assertion 'sub' claim must be a string")),
    };

    let auth_time = match raw.get("iat") {
        None => Utc::now(),
        Some(Value::Number(n)) => {
            let seconds = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .ok_or_else(|| CoreError::jwt_verify_failure("assertion 'iat' claim has unexpected numeric form"))?;
            if seconds == 0 {
                // A zero-value auth time means the flow engine did not stamp
                // one; treat it like an absent claim.
                Utc::now()
            } else {
                DateTime::from_timestamp(seconds, 0).unwrap_or_else(Utc::now)
            }
        }
        Some(_) => return Err(CoreError::jwt_verify_failure("assertion 'iat' claim has unexpected type")),
    };

    let authorized_permissions = match raw.get("authorized_permissions") {
        Some(Value::String(s)) => s.split(' ').filter(|s| !s.is_empty()).map(str::to_string).collect(),
        _ => Vec::new(),
    };

    let user_attributes = raw
        .iter()
        .filter(|(key, _)| !RESERVED_ASSERTION_CLAIMS.contains(&key.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect::<HashMap<_, _>>();

    Ok(AssertionClaims {
        user_id,
        user_attributes,
        authorized_permissions,
        auth_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(extra: Value) -> Map<String, Value> {
        let Value::Object(map) = extra else { panic!("expected object") };
        map
    }

    #[test]
    fn decodes_sub_iat_and_authorized_permissions() {
        let raw = claims(json!({
            "sub": "u-1",
            "iat": 1_700_000_000,
            "authorized_permissions": "billing:invoices system:ou",
            "department": "eng",
        }));
        let decoded = decode_assertion(&raw).unwrap();
        assert_eq!(decoded.user_id, "u-1");
        assert_eq!(decoded.authorized_permissions, vec!["billing:invoices", "system:ou"]);
        assert_eq!(decoded.user_attributes.get("department").unwrap(), "eng");
        assert!(!decoded.user_attributes.contains_key("sub"));
    }

    #[test]
    fn missing_iat_falls_back_to_now() {
        let raw = claims(json!({"sub": "u-1"}));
        assert!(decode_assertion(&raw).is_ok());
    }

    #[test]
    fn zero_iat_is_treated_as_absent() {
        let raw = claims(json!({"sub": "u-1", "iat": 0}));
        let decoded = decode_assertion(&raw).unwrap();
        assert!(decoded.auth_time > DateTime::from_timestamp(0, 0).unwrap());
    }

    #[test]
    fn non_string_sub_is_an_error() {
        let raw = claims(json!({"sub": 123}));
        assert!(decode_assertion(&raw).is_err());
    }

    #[test]
    fn wrong_type_authorized_permissions_is_silently_ignored() {
        let raw = claims(json!({"sub": "u-1", "authorized_permissions": 42}));
        let decoded = decode_assertion(&raw).unwrap();
        assert!(decoded.authorized_permissions.is_empty());
    }

    #[test]
    fn iat_as_float_is_accepted() {
        let raw = claims(json!({"sub": "u-1", "iat": 1_700_000_000.0}));
        assert!(decode_assertion(&raw).is_ok());
    }

    #[test]
    fn iat_of_wrong_type_is_a_jwt_verify_failure() {
        let raw = claims(json!({"sub": "u-1", "iat": "not-a-number"}));
        let err = decode_assertion(&raw).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Server { kind: aegis_core::ServerErrorKind::JwtVerifyFailure, .. }
        ));
    }
}
