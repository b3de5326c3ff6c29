//! End-to-end tests for the HTTP surface: the full authorization-code
//! sequence over the router, plus the gated internal endpoints.
//!
//! The stores are in-memory and the flow engine is a fake, but the
//! assertion really is a signed HS256 JWT verified by the same
//! `JwtAssertionVerifier` the binary wires in.

use std::collections::HashMap;
use std::sync::Arc;

use aegis_oauth::{AuthorizeService, InMemoryCodeStore, InMemoryRequestStore, JwtAssertionVerifier, RegisteredApp};
use aegis_server::config::AppConfig;
use aegis_server::state::{AppState, ConfiguredOuHierarchy};
use aegis_server::build_router;
use aegis_testkit::{InMemoryAppRegistry, RecordingFlowExecutor};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration as ChronoDuration, Utc};
use http_body_util::BodyExt;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header};
use serde_json::json;
use tower::ServiceExt;

const SIGNING_SECRET: &[u8] = b"integration-test-secret";

fn registered_app() -> RegisteredApp {
    RegisteredApp {
        client_id: "C".into(),
        redirect_uris: vec!["https://app/cb".into()],
        id_token_attrs: vec!["email".into()],
        access_token_attrs: vec![],
        scope_claims: HashMap::new(),
    }
}

fn test_router() -> Router {
    let mut cfg = AppConfig::default();
    cfg.ous.insert("ou-C".into(), "ou-P".into());

    let authorize_service = AuthorizeService::new(
        Arc::new(InMemoryAppRegistry::with_apps([registered_app()])),
        Arc::new(InMemoryRequestStore::default()),
        Arc::new(InMemoryCodeStore::default()),
        Arc::new(RecordingFlowExecutor::default()),
        Arc::new(JwtAssertionVerifier::new(
            DecodingKey::from_secret(SIGNING_SECRET),
            Algorithm::HS256,
        )),
        ChronoDuration::minutes(5),
    );

    let authz_service = Arc::new(aegis_authz_service_with_hierarchy(&cfg));
    let state = Arc::new(AppState {
        cfg,
        authorize_service,
        authz_service,
    });
    build_router(state)
}

fn aegis_authz_service_with_hierarchy(cfg: &AppConfig) -> aegis_authz::SystemAuthorizationService {
    let service = aegis_authz::SystemAuthorizationService::new();
    service.set_ou_hierarchy_resolver(Some(Arc::new(ConfiguredOuHierarchy::from_config(cfg))));
    service
}

fn signed_assertion(sub: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = json!({
        "sub": sub,
        "iat": now,
        "exp": now + 600,
        "email": "alice@example.com",
        "authorized_permissions": "billing:invoices",
    });
    jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(SIGNING_SECRET))
        .expect("signing a test assertion cannot fail")
}

async fn get(router: &Router, uri: &str, headers: &[(&str, &str)]) -> (StatusCode, axum::http::HeaderMap, String) {
    let mut builder = Request::builder().uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let response = router
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let header_map = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, header_map, String::from_utf8_lossy(&body).into_owned())
}

fn location(headers: &axum::http::HeaderMap) -> String {
    headers
        .get(header::LOCATION)
        .expect("expected a Location header")
        .to_str()
        .unwrap()
        .to_string()
}

fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

// Happy path: authorize, callback, redeem once, then never again.
#[tokio::test]
async fn full_code_flow_issues_and_redeems_once() {
    let router = test_router();

    let (status, headers, _) = get(
        &router,
        "/authorize?client_id=C&redirect_uri=https%3A%2F%2Fapp%2Fcb&response_type=code&scope=openid%20profile&state=xyz&code_challenge=abc&code_challenge_method=S256",
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::FOUND);
    let login_url = location(&headers);
    assert!(login_url.starts_with("/login?"));
    let auth_id = query_param(&login_url, "auth_id").expect("login redirect carries auth_id");
    assert!(query_param(&login_url, "flow_id").is_some());
    assert!(query_param(&login_url, "show_insecure_warning").is_none());

    let assertion = signed_assertion("u-1");
    let (status, headers, _) = get(&router, &format!("/callback?auth_id={auth_id}&assertion={assertion}"), &[]).await;
    assert_eq!(status, StatusCode::FOUND);
    let client_url = location(&headers);
    assert!(client_url.starts_with("https://app/cb?"));
    assert_eq!(query_param(&client_url, "state").as_deref(), Some("xyz"));
    let code = query_param(&client_url, "code").expect("success redirect carries a code");

    let admin_headers = [("x-subject", "admin"), ("x-permissions", "system")];
    let (status, _, body) = get(&router, &format!("/internal/authorization-codes/C/{code}"), &admin_headers).await;
    assert_eq!(status, StatusCode::OK);
    let details: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(details["authorized_user_id"], "u-1");
    assert_eq!(details["code_challenge"], "abc");
    assert_eq!(details["code_challenge_method"], "S256");
    assert_eq!(details["scopes"], json!(["openid", "profile", "billing:invoices"]));

    let (status, _, body) = get(&router, &format!("/internal/authorization-codes/C/{code}"), &admin_headers).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("invalid code"));
}

#[tokio::test]
async fn plain_pkce_challenge_is_stored_verbatim() {
    let router = test_router();
    let (_, headers, _) = get(
        &router,
        "/authorize?client_id=C&response_type=code&scope=openid&code_challenge=abc&code_challenge_method=plain",
        &[],
    )
    .await;
    let auth_id = query_param(&location(&headers), "auth_id").unwrap();

    let assertion = signed_assertion("u-1");
    let (_, headers, _) = get(&router, &format!("/callback?auth_id={auth_id}&assertion={assertion}"), &[]).await;
    let code = query_param(&location(&headers), "code").unwrap();

    let (status, _, body) = get(
        &router,
        &format!("/internal/authorization-codes/C/{code}"),
        &[("x-subject", "admin"), ("x-permissions", "system")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let details: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(details["code_challenge"], "abc");
    assert_eq!(details["code_challenge_method"], "plain");
}

#[tokio::test]
async fn sub_constraint_mismatch_redirects_with_access_denied() {
    let router = test_router();
    let claims = "%7B%22id_token%22%3A%7B%22sub%22%3A%7B%22value%22%3A%22u-2%22%7D%7D%7D";
    let (_, headers, _) = get(
        &router,
        &format!("/authorize?client_id=C&response_type=code&scope=openid&state=xyz&claims={claims}"),
        &[],
    )
    .await;
    let auth_id = query_param(&location(&headers), "auth_id").unwrap();

    let assertion = signed_assertion("u-1");
    let (status, headers, _) = get(&router, &format!("/callback?auth_id={auth_id}&assertion={assertion}"), &[]).await;
    assert_eq!(status, StatusCode::FOUND);
    let url = location(&headers);
    assert!(url.starts_with("https://app/cb?"));
    assert_eq!(query_param(&url, "error").as_deref(), Some("access_denied"));
    assert_eq!(query_param(&url, "state").as_deref(), Some("xyz"));
}

#[tokio::test]
async fn tampered_assertion_is_rejected() {
    let router = test_router();
    let (_, headers, _) = get(&router, "/authorize?client_id=C&response_type=code&scope=openid&state=s1", &[]).await;
    let auth_id = query_param(&location(&headers), "auth_id").unwrap();

    let mut assertion = signed_assertion("u-1");
    assertion.push('x');
    let (status, headers, _) = get(&router, &format!("/callback?auth_id={auth_id}&assertion={assertion}"), &[]).await;
    assert_eq!(status, StatusCode::FOUND);
    let url = location(&headers);
    assert_eq!(query_param(&url, "error").as_deref(), Some("invalid_request"));
    assert_eq!(query_param(&url, "state").as_deref(), Some("s1"));
}

#[tokio::test]
async fn replayed_auth_id_is_rejected() {
    let router = test_router();
    let (_, headers, _) = get(&router, "/authorize?client_id=C&response_type=code&scope=openid", &[]).await;
    let auth_id = query_param(&location(&headers), "auth_id").unwrap();

    let assertion = signed_assertion("u-1");
    let first = get(&router, &format!("/callback?auth_id={auth_id}&assertion={assertion}"), &[]).await;
    assert_eq!(first.0, StatusCode::FOUND);

    let second = get(&router, &format!("/callback?auth_id={auth_id}&assertion={assertion}"), &[]).await;
    assert_eq!(second.0, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unsupported_response_type_redirects_with_error_description() {
    let router = test_router();
    let (status, headers, _) = get(
        &router,
        "/authorize?client_id=C&redirect_uri=https%3A%2F%2Fapp%2Fcb&response_type=token&state=xyz",
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::FOUND);
    let url = location(&headers);
    assert!(url.starts_with("https://app/cb?"));
    assert_eq!(query_param(&url, "error").as_deref(), Some("unsupported_response_type"));
    assert!(query_param(&url, "error_description").is_some());
    assert_eq!(query_param(&url, "state").as_deref(), Some("xyz"));
}

#[tokio::test]
async fn unknown_client_gets_a_direct_error_not_a_redirect() {
    let router = test_router();
    let (status, headers, body) = get(&router, "/authorize?client_id=nobody&response_type=code", &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(headers.get(header::LOCATION).is_none());
    assert!(body.contains("invalid_client"));
}

#[tokio::test]
async fn internal_code_endpoint_requires_a_permitted_subject() {
    let router = test_router();
    let (status, _, _) = get(&router, "/internal/authorization-codes/C/some-code", &[]).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = get(
        &router,
        "/internal/authorization-codes/C/some-code",
        &[("x-subject", "u-1"), ("x-permissions", "billing:invoices")],
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn accessible_resources_prefilter_reflects_membership_and_inheritance() {
    let router = test_router();

    // Membership: ListOUs restricted to the caller's own OU.
    let (status, _, body) = get(
        &router,
        "/internal/accessible-resources?action=ListOUs&resource_type=ou",
        &[("x-subject", "u-1"), ("x-ou", "ou-C"), ("x-permissions", "system:ou")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed, json!({ "all_allowed": false, "ids": ["ou-C"] }));

    // Inheritance: ListUserSchemas sees the whole ancestor chain.
    let (status, _, body) = get(
        &router,
        "/internal/accessible-resources?action=ListUserSchemas&resource_type=user_schema",
        &[("x-subject", "u-1"), ("x-ou", "ou-C"), ("x-permissions", "system:userschema:view")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["all_allowed"], json!(false));
    let ids: Vec<String> = parsed["ids"].as_array().unwrap().iter().map(|v| v.as_str().unwrap().to_string()).collect();
    assert_eq!(ids, vec!["ou-C", "ou-P"]);

    // No permission at all: an empty filter, not a 403.
    let (status, _, body) = get(
        &router,
        "/internal/accessible-resources?action=ListOUs&resource_type=ou",
        &[("x-subject", "u-1"), ("x-ou", "ou-C")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed, json!({ "all_allowed": false, "ids": [] }));
}
