//! System-Authz gate in front of the internal routes: pull the verified
//! identity out of the request headers, build a `SecurityContext`, derive
//! the action from the route, and ask `SystemAuthorizationService` before
//! letting the handler run.
//!
//! Verification of the bearer identity itself (who issued it, how it is
//! checked) happens upstream; this middleware trusts whatever component
//! populated these headers.

use std::collections::HashSet;
use std::sync::Arc;

use aegis_core::{ActionContext, SecurityContext};
use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::state::AppState;

/// Maps an `/internal/...` path onto the named action the authz core
/// expects. Unmapped paths fall back to the catch-all `system` permission
/// via `resolve_action_permission`'s unknown-action default.
fn action_for_path(path: &str) -> &'static str {
    if path.starts_with("/internal/authorization-codes/") {
        "ReadAuthorizationCode"
    } else {
        "Unknown"
    }
}

pub async fn enforce_system_authorization(req: Request, next: Next) -> Result<Response, StatusCode> {
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .cloned()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    let action = action_for_path(req.uri().path());
    let ctx = build_security_context(req.headers());
    let allowed = state
        .authz_service
        .is_action_allowed(&ctx, action, None::<&ActionContext>)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    if !allowed {
        return Err(StatusCode::FORBIDDEN);
    }

    let mut req = req;
    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

/// Attaches the caller's `SecurityContext` without a gate, for routes whose
/// handler runs its own authorization step (the accessible-resources
/// pre-filter screens permissions internally and answers `none` rather than
/// 403, so denied callers still get a well-formed empty filter).
pub async fn attach_security_context(mut req: Request, next: Next) -> Response {
    let ctx = build_security_context(req.headers());
    req.extensions_mut().insert(ctx);
    next.run(req).await
}

fn build_security_context(headers: &HeaderMap) -> SecurityContext {
    let subject = header_str(headers, "x-subject").unwrap_or_default();
    let permissions: HashSet<String> = header_str(headers, "x-permissions")
        .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    let mut ctx = SecurityContext::new(subject, permissions);
    ctx.ou_id = header_str(headers, "x-ou").filter(|s| !s.is_empty());
    ctx
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|h| h.to_str().ok()).map(str::to_string)
}
