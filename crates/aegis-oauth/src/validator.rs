//! Validation of the initial `/authorize` parameters against the
//! registered client.

use aegis_core::{ClientErrorKind, CoreError};

use crate::registry::RegisteredApp;

/// Raw query parameters off the wire, before scope splitting or claims
/// parsing: exactly what the validator needs to see.
#[derive(Debug, Clone, Default)]
pub struct RawAuthorizeRequest {
    pub client_id: String,
    pub redirect_uri: Option<String>,
    pub response_type: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// The validator's verdict. `redirect_uri` is populated whenever a usable
/// redirect is known, including on most error paths: the caller redirects
/// with the error when it can, and serves a direct error response when it
/// cannot.
pub enum ValidationOutcome {
    Valid { redirect_uri: String },
    Invalid { redirect_uri: Option<String>, error: CoreError },
}

impl ValidationOutcome {
    pub fn send_error_to_client(&self) -> bool {
        matches!(self, Self::Invalid { redirect_uri: Some(_), .. })
    }
}

pub struct AuthorizationValidator;

impl AuthorizationValidator {
    /// Validates in the order specified: `client_id` presence, client
    /// existence, `redirect_uri` match-or-default, `response_type`, and
    /// `code_challenge_method` (only checked when a challenge is present).
    /// Unknown scopes are deliberately not checked here; the flow executor
    /// decides which it honors.
    pub fn validate(request: &RawAuthorizeRequest, app: Option<&RegisteredApp>) -> ValidationOutcome {
        if request.client_id.trim().is_empty() {
            return ValidationOutcome::Invalid {
                redirect_uri: None,
                error: CoreError::invalid_request("client_id is required"),
            };
        }

        let Some(app) = app else {
            return ValidationOutcome::Invalid {
                redirect_uri: None,
                error: CoreError::invalid_client("unknown client_id"),
            };
        };

        let redirect_uri = match &request.redirect_uri {
            Some(uri) => {
                if !app.redirect_uris.iter().any(|registered| registered == uri) {
                    return ValidationOutcome::Invalid {
                        redirect_uri: None,
                        error: CoreError::invalid_request("redirect_uri does not match any registered URI"),
                    };
                }
                uri.clone()
            }
            None => match app.redirect_uris.first() {
                Some(uri) => uri.clone(),
                None => {
                    return ValidationOutcome::Invalid {
                        redirect_uri: None,
                        error: CoreError::system_error("client has no registered redirect_uri"),
                    }
                }
            },
        };

        if request.response_type != "code" {
            return ValidationOutcome::Invalid {
                redirect_uri: Some(redirect_uri),
                error: CoreError::unsupported_response_type("only the authorization-code flow is supported"),
            };
        }

        if request.code_challenge.is_some() {
            match request.code_challenge_method.as_deref() {
                Some("plain") | Some("S256") => {}
                _ => {
                    return ValidationOutcome::Invalid {
                        redirect_uri: Some(redirect_uri),
                        error: CoreError::client(
                            ClientErrorKind::InvalidRequest,
                            "code_challenge_method must be 'plain' or 'S256'",
                        ),
                    }
                }
            }
        }

        ValidationOutcome::Valid { redirect_uri }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn app() -> RegisteredApp {
        RegisteredApp {
            client_id: "c1".into(),
            redirect_uris: vec!["https://app/cb".into()],
            id_token_attrs: vec![],
            access_token_attrs: vec![],
            scope_claims: HashMap::new(),
        }
    }

    #[test]
    fn missing_client_id_is_a_direct_error() {
        let request = RawAuthorizeRequest::default();
        let outcome = AuthorizationValidator::validate(&request, None);
        assert!(!outcome.send_error_to_client());
    }

    #[test]
    fn unknown_client_is_a_direct_error() {
        let request = RawAuthorizeRequest {
            client_id: "c1".into(),
            ..Default::default()
        };
        let outcome = AuthorizationValidator::validate(&request, None);
        assert!(!outcome.send_error_to_client());
    }

    #[test]
    fn missing_redirect_uri_defaults_to_the_first_registered_one() {
        let request = RawAuthorizeRequest {
            client_id: "c1".into(),
            response_type: "code".into(),
            ..Default::default()
        };
        let outcome = AuthorizationValidator::validate(&request, Some(&app()));
        assert!(matches!(outcome, ValidationOutcome::Valid { redirect_uri } if redirect_uri == "https://app/cb"));
    }

    #[test]
    fn mismatched_redirect_uri_is_a_direct_error() {
        let request = RawAuthorizeRequest {
            client_id: "c1".into(),
            redirect_uri: Some("https://evil/cb".into()),
            response_type: "code".into(),
            ..Default::default()
        };
        let outcome = AuthorizationValidator::validate(&request, Some(&app()));
        assert!(!outcome.send_error_to_client());
    }

    #[test]
    fn unsupported_response_type_redirects_with_error() {
        let request = RawAuthorizeRequest {
            client_id: "c1".into(),
            response_type: "token".into(),
            ..Default::default()
        };
        let outcome = AuthorizationValidator::validate(&request, Some(&app()));
        assert!(outcome.send_error_to_client());
    }

    #[test]
    fn bad_code_challenge_method_redirects_with_error() {
        let request = RawAuthorizeRequest {
            client_id: "c1".into(),
            redirect_uri: None,
            response_type: "code".into(),
            code_challenge: Some("abc".into()),
            code_challenge_method: Some("md5".into()),
        };
        let outcome = AuthorizationValidator::validate(&request, Some(&app()));
        assert!(outcome.send_error_to_client());
    }

    #[test]
    fn plain_code_challenge_method_is_accepted() {
        let request = RawAuthorizeRequest {
            client_id: "c1".into(),
            redirect_uri: None,
            response_type: "code".into(),
            code_challenge: Some("abc".into()),
            code_challenge_method: Some("plain".into()),
        };
        let outcome = AuthorizationValidator::validate(&request, Some(&app()));
        assert!(matches!(outcome, ValidationOutcome::Valid { .. }));
    }
}
