//! The authorize service: the two-leg `INIT -> AWAITING_CALLBACK ->
//! COMPLETE | ERROR` state machine coordinating the validator, the flow
//! executor, and the request and code stores.
//!
//! There is no persisted "current state" field: leg 1 existing or not
//! existing as a stored `AuthRequestContext` *is* the INIT/AWAITING_CALLBACK
//! distinction, and leg 2's load-and-delete makes the AWAITING_CALLBACK ->
//! terminal transition atomic per `auth_id` by construction. A separate
//! state enum could not make that any safer than the store's own atomicity.

use std::sync::Arc;

use aegis_core::{
    AuthRequestContext, AuthorizationCode, ClaimsRequest, CodeState, CoreError, CoreResult,
    OAuthParameters,
};
use chrono::Duration as ChronoDuration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assertion::{decode_assertion, AssertionVerifier};
use crate::claims::{compute_required_attributes, enforce_sub_constraint, parse_claims_request};
use crate::flow::{FlowExecutor, FlowInitRequest, FlowType};
use crate::registry::AppRegistry;
use crate::store::{AuthorizationCodeStore, AuthorizationRequestStore};
use crate::validator::{AuthorizationValidator, RawAuthorizeRequest, ValidationOutcome};

pub const OIDC_STANDARD_SCOPES: &[&str] = &["openid", "profile", "email", "address", "phone"];

fn split_scopes(raw: &str) -> (Vec<String>, Vec<String>) {
    let mut standard = Vec::new();
    let mut permission = Vec::new();
    for scope in raw.split(' ').filter(|s| !s.is_empty()) {
        if OIDC_STANDARD_SCOPES.contains(&scope) {
            standard.push(scope.to_string());
        } else {
            permission.push(scope.to_string());
        }
    }
    (standard, permission)
}

/// Leg 1 input, straight off the `/authorize` query string.
#[derive(Debug, Clone, Default)]
pub struct InitialAuthorizationRequest {
    pub client_id: String,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub response_type: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub resource: Option<String>,
    pub claims: Option<String>,
    pub claims_locales: Option<String>,
    pub nonce: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginRedirect {
    pub auth_id: String,
    pub app_id: String,
    pub flow_id: String,
    pub show_insecure_warning: bool,
}

pub enum Leg1Outcome {
    Redirect(LoginRedirect),
    ClientRedirectError {
        redirect_uri: String,
        error: CoreError,
        state: Option<String>,
    },
    DirectError(CoreError),
}

pub enum Leg2Outcome {
    Success {
        redirect_uri: String,
        code: String,
        state: Option<String>,
    },
    ErrorRedirect {
        redirect_uri: String,
        error: CoreError,
        state: Option<String>,
    },
    DirectError(CoreError),
}

pub struct AuthorizeService {
    app_registry: Arc<dyn AppRegistry>,
    request_store: Arc<dyn AuthorizationRequestStore>,
    code_store: Arc<dyn AuthorizationCodeStore>,
    flow_executor: Arc<dyn FlowExecutor>,
    assertion_verifier: Arc<dyn AssertionVerifier>,
    code_validity: ChronoDuration,
}

impl AuthorizeService {
    pub fn new(
        app_registry: Arc<dyn AppRegistry>,
        request_store: Arc<dyn AuthorizationRequestStore>,
        code_store: Arc<dyn AuthorizationCodeStore>,
        flow_executor: Arc<dyn FlowExecutor>,
        assertion_verifier: Arc<dyn AssertionVerifier>,
        code_validity: ChronoDuration,
    ) -> Self {
        Self {
            app_registry,
            request_store,
            code_store,
            flow_executor,
            assertion_verifier,
            code_validity,
        }
    }

    /// Leg 1: validate the request, initiate a flow, park the context, and
    /// hand the browser off to the login page.
    pub async fn handle_initial_authorization_request(&self, request: InitialAuthorizationRequest) -> Leg1Outcome {
        let claims_request: Option<ClaimsRequest> = match &request.claims {
            Some(raw) if !raw.is_empty() => match parse_claims_request(raw) {
                Ok(parsed) => Some(parsed),
                Err(e) => return Leg1Outcome::DirectError(e),
            },
            _ => None,
        };

        let app = match self.app_registry.get(&request.client_id) {
            Ok(app) => app,
            Err(e) => return Leg1Outcome::DirectError(e),
        };

        let validation = AuthorizationValidator::validate(
            &RawAuthorizeRequest {
                client_id: request.client_id.clone(),
                redirect_uri: request.redirect_uri.clone(),
                response_type: request.response_type.clone(),
                code_challenge: request.code_challenge.clone(),
                code_challenge_method: request.code_challenge_method.clone(),
            },
            app.as_ref(),
        );

        let redirect_uri = match validation {
            ValidationOutcome::Valid { redirect_uri } => redirect_uri,
            ValidationOutcome::Invalid { redirect_uri: Some(redirect_uri), error } => {
                return Leg1Outcome::ClientRedirectError {
                    redirect_uri,
                    error,
                    state: request.state,
                }
            }
            ValidationOutcome::Invalid { redirect_uri: None, error } => return Leg1Outcome::DirectError(error),
        };

        let (standard_scopes, permission_scopes) = split_scopes(request.scope.as_deref().unwrap_or(""));

        // The validator has already rejected unknown clients.
        let Some(app) = app else {
            return Leg1Outcome::DirectError(CoreError::invalid_client("unknown client_id"));
        };

        let params = OAuthParameters {
            client_id: request.client_id.clone(),
            redirect_uri: Some(redirect_uri.clone()),
            response_type: request.response_type,
            state: request.state,
            nonce: request.nonce,
            standard_scopes,
            permission_scopes,
            code_challenge: request.code_challenge,
            code_challenge_method: request.code_challenge_method,
            resource: request.resource,
            claims_request,
            claims_locales: request.claims_locales,
        };

        let required_attributes = compute_required_attributes(&params, &app);

        let flow_id = match self.flow_executor.initiate(&FlowInitRequest {
            application_id: params.client_id.clone(),
            flow_type: FlowType::Authentication,
            requested_permissions: params.permission_scopes.clone(),
            required_attributes,
            required_locales: params.claims_locales.clone(),
        }) {
            Ok(flow_id) => flow_id,
            Err(e) => return Leg1Outcome::DirectError(e),
        };

        let auth_id = match self.request_store.add_request(AuthRequestContext { params }).await {
            Ok(id) => id,
            Err(e) => return Leg1Outcome::DirectError(e),
        };

        let show_insecure_warning = redirect_uri.starts_with("http://");
        info!(client_id = %request.client_id, %auth_id, "authorization request stored, flow initiated");

        Leg1Outcome::Redirect(LoginRedirect {
            auth_id,
            app_id: request.client_id,
            flow_id,
            show_insecure_warning,
        })
    }

    /// Leg 2: take the parked context, verify and decode the assertion,
    /// mint a code, and send the client back to its redirect URI.
    pub async fn handle_authorization_callback(&self, auth_id: &str, assertion: Option<&str>) -> Leg2Outcome {
        let context = match self.request_store.take_request(auth_id).await {
            Ok(Some(context)) => context,
            Ok(None) => return Leg2Outcome::DirectError(CoreError::invalid_request("unknown or expired auth_id")),
            Err(e) => return Leg2Outcome::DirectError(e),
        };
        let params = context.params;
        let state = params.state.clone();
        // Leg 1 always stores a resolved-and-validated redirect_uri.
        let Some(redirect_uri) = params.redirect_uri.clone() else {
            return Leg2Outcome::DirectError(CoreError::system_error("stored request is missing its redirect_uri"));
        };

        macro_rules! fail {
            ($err:expr) => {
                return Leg2Outcome::ErrorRedirect {
                    redirect_uri,
                    error: $err,
                    state,
                }
            };
        }

        let Some(assertion) = assertion.filter(|a| !a.is_empty()) else {
            fail!(CoreError::invalid_request("missing assertion"));
        };

        let raw_claims = match self.assertion_verifier.verify(assertion) {
            Ok(claims) => claims,
            Err(_) => fail!(CoreError::invalid_request("invalid assertion signature")),
        };

        let decoded = match decode_assertion(&raw_claims) {
            Ok(decoded) => decoded,
            Err(e) => fail!(e),
        };

        if params.wants_openid() {
            if let Err(e) = enforce_sub_constraint(params.claims_request.as_ref(), &decoded.user_id) {
                fail!(e);
            }
        }

        let authorized_permissions = decoded.authorized_permissions;

        let time_created = decoded.auth_time;
        let expiry_time = time_created + self.code_validity;
        let code = AuthorizationCode {
            code_id: Uuid::now_v7(),
            code: Uuid::now_v7(),
            client_id: params.client_id.clone(),
            redirect_uri: redirect_uri.clone(),
            authorized_user_id: decoded.user_id,
            user_attributes: decoded.user_attributes,
            time_created,
            expiry_time,
            scopes: params
                .standard_scopes
                .iter()
                .chain(authorized_permissions.iter())
                .cloned()
                .collect(),
            state: CodeState::Active,
            code_challenge: params.code_challenge,
            code_challenge_method: params.code_challenge_method,
            resource: params.resource,
            claims_request: params.claims_request,
            claims_locales: params.claims_locales,
            nonce: params.nonce,
        };

        let code_value = code.code.to_string();
        if let Err(e) = self.code_store.insert(code).await {
            warn!(error = %e, "failed to persist authorization code");
            fail!(CoreError::system_error("failed to persist authorization code"));
        }

        Leg2Outcome::Success {
            redirect_uri,
            code: code_value,
            state,
        }
    }

    /// Leg 3: one-shot redemption of an issued code by the token endpoint.
    pub async fn get_authorization_code_details(&self, client_id: &str, code: &str) -> CoreResult<AuthorizationCode> {
        self.code_store.redeem(client_id, code).await
    }
}

/// Builds the client success or error redirect URI.
pub fn build_redirect_url(base: &str, params: &[(&str, &str)]) -> String {
    let mut url = base.to_string();
    let separator = if base.contains('?') { '&' } else { '?' };
    url.push(separator);
    let encoded: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect();
    url.push_str(&encoded.join("&"));
    url
}
