//! Route handlers for the `/authorize`, `/callback`, and
//! `/internal/...` endpoints.

use std::sync::Arc;

use aegis_core::{AccessibleResources, CoreError, ResourceType, SecurityContext};
use aegis_oauth::{build_redirect_url, InitialAuthorizationRequest, Leg1Outcome, Leg2Outcome};
use axum::extract::{Extension, Path, Query};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;

fn error_body(error: &CoreError) -> serde_json::Value {
    json!({ "error": error.error_code(), "error_description": error.client_description() })
}

fn direct_error_response(error: &CoreError) -> Response {
    let status = if error.is_client() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(error_body(error))).into_response()
}

fn redirect_to(url: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response()
}

/// `error=<code>&error_description=<msg>&state=<echoed>`.
fn error_redirect(redirect_uri: &str, error: &CoreError, state: Option<&str>) -> Response {
    let mut params = vec![
        ("error", error.error_code()),
        ("error_description", error.client_description()),
    ];
    if let Some(state) = state {
        params.push(("state", state));
    }
    redirect_to(&build_redirect_url(redirect_uri, &params))
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    #[serde(default)]
    pub client_id: String,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub response_type: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub resource: Option<String>,
    pub claims: Option<String>,
    pub claims_locales: Option<String>,
    pub nonce: Option<String>,
}

/// GET /authorize (leg 1).
pub async fn authorize(Extension(state): Extension<Arc<AppState>>, Query(query): Query<AuthorizeQuery>) -> Response {
    let outcome = state
        .authorize_service
        .handle_initial_authorization_request(InitialAuthorizationRequest {
            client_id: query.client_id,
            redirect_uri: query.redirect_uri,
            scope: query.scope,
            state: query.state,
            response_type: query.response_type.unwrap_or_default(),
            code_challenge: query.code_challenge,
            code_challenge_method: query.code_challenge_method,
            resource: query.resource,
            claims: query.claims,
            claims_locales: query.claims_locales,
            nonce: query.nonce,
        })
        .await;

    match outcome {
        Leg1Outcome::Redirect(redirect) => {
            let mut params = vec![
                ("auth_id", redirect.auth_id.as_str()),
                ("app_id", redirect.app_id.as_str()),
                ("flow_id", redirect.flow_id.as_str()),
            ];
            if redirect.show_insecure_warning {
                params.push(("show_insecure_warning", "true"));
            }
            redirect_to(&build_redirect_url(&state.cfg.server.login_page, &params))
        }
        Leg1Outcome::ClientRedirectError { redirect_uri, error, state } => {
            error_redirect(&redirect_uri, &error, state.as_deref())
        }
        Leg1Outcome::DirectError(error) => direct_error_response(&error),
    }
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub auth_id: String,
    pub assertion: Option<String>,
}

/// GET /callback (leg 2).
pub async fn callback(Extension(state): Extension<Arc<AppState>>, Query(query): Query<CallbackQuery>) -> Response {
    let outcome = state
        .authorize_service
        .handle_authorization_callback(&query.auth_id, query.assertion.as_deref())
        .await;

    match outcome {
        Leg2Outcome::Success { redirect_uri, code, state } => {
            let mut params = vec![("code", code.as_str())];
            if let Some(state) = state.as_deref() {
                params.push(("state", state));
            }
            redirect_to(&build_redirect_url(&redirect_uri, &params))
        }
        Leg2Outcome::ErrorRedirect { redirect_uri, error, state } => {
            error_redirect(&redirect_uri, &error, state.as_deref())
        }
        Leg2Outcome::DirectError(error) => direct_error_response(&error),
    }
}

/// GET /internal/authorization-codes/{client_id}/{code} (leg 3). Consumed
/// by the token endpoint; gated by
/// [`crate::middleware::auth::enforce_system_authorization`].
pub async fn get_authorization_code_details(
    Extension(state): Extension<Arc<AppState>>,
    Path((client_id, code)): Path<(String, String)>,
) -> Response {
    match state.authorize_service.get_authorization_code_details(&client_id, &code).await {
        Ok(details) => Json(details).into_response(),
        Err(error) => direct_error_response(&error),
    }
}

#[derive(Debug, Deserialize)]
pub struct AccessibleResourcesQuery {
    pub action: String,
    pub resource_type: String,
}

fn parse_resource_type(raw: &str) -> ResourceType {
    match raw {
        "user" => ResourceType::User,
        "ou" => ResourceType::Ou,
        "user_schema" => ResourceType::UserSchema,
        other => ResourceType::Other(other.to_string()),
    }
}

/// GET /internal/accessible-resources, the list-query pre-filter, exposed
/// so sibling services can scope their own queries. The authz service
/// screens permissions itself, so denied callers get an empty filter
/// rather than a 403.
pub async fn get_accessible_resources(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ctx): Extension<SecurityContext>,
    Query(query): Query<AccessibleResourcesQuery>,
) -> Response {
    let resource_type = parse_resource_type(&query.resource_type);
    match state.authz_service.get_accessible_resources(&ctx, &query.action, &resource_type) {
        Ok(AccessibleResources { all_allowed, ids }) => {
            let mut ids: Vec<String> = ids.into_iter().collect();
            ids.sort();
            Json(json!({ "all_allowed": all_allowed, "ids": ids })).into_response()
        }
        Err(error) => direct_error_response(&error),
    }
}
