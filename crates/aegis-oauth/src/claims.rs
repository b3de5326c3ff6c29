//! Parsing of the OIDC `claims` request parameter, the `sub` value
//! constraint check, and the computation of which user attributes the flow
//! must collect.

use std::collections::HashSet;

use aegis_core::{ClaimsRequest, CoreError, CoreResult, OAuthParameters};
use serde_json::Value;

use crate::registry::{standard_scope_claims, RegisteredApp};

/// Parses the URL-decoded `claims` query parameter. Unknown top-level keys
/// are ignored (only `id_token` and `userinfo` are understood); a malformed
/// object is `invalid_request`.
pub fn parse_claims_request(raw: &str) -> CoreResult<ClaimsRequest> {
    serde_json::from_str(raw).map_err(|e| CoreError::invalid_request(format!("malformed claims parameter: {e}")))
}

/// Enforces the `sub` value constraint (OIDC Core §5.5.1): when the request's
/// `id_token.sub` carries a constraint, the assertion's `user_id` must
/// satisfy it. A mismatch is `access_denied`, never `invalid_request`.
pub fn enforce_sub_constraint(claims_request: Option<&ClaimsRequest>, user_id: &str) -> CoreResult<()> {
    let Some(sub_spec) = claims_request.and_then(|c| c.id_token.get("sub")) else {
        return Ok(());
    };
    let candidate = Value::String(user_id.to_string());
    if sub_spec.matches_value(&candidate) {
        Ok(())
    } else {
        Err(CoreError::access_denied("assertion subject does not satisfy the requested sub constraint"))
    }
}

/// Derives the set of user attributes the flow must collect for a request.
///
/// Starts empty. If `openid` was requested: unions the claims named under
/// `claims.id_token` with the scope-to-claims mapping for the requested
/// standard scopes (app-specific overrides take precedence over the
/// standard OIDC mapping), then intersects that union with the app's
/// ID-token allow-list. Finally unions the app's access-token attribute
/// list unconditionally, regardless of `openid`. The result is therefore
/// always a subset of the app's combined attribute allow-lists.
pub fn compute_required_attributes(params: &OAuthParameters, app: &RegisteredApp) -> Vec<String> {
    let mut required: HashSet<String> = HashSet::new();

    if params.wants_openid() {
        let mut candidates: HashSet<String> = HashSet::new();
        if let Some(claims_request) = &params.claims_request {
            candidates.extend(claims_request.id_token.keys().cloned());
        }
        for scope in &params.standard_scopes {
            if scope == "openid" {
                continue;
            }
            if let Some(overridden) = app.scope_claims.get(scope) {
                candidates.extend(overridden.iter().cloned());
            } else {
                candidates.extend(standard_scope_claims(scope).iter().map(|s| s.to_string()));
            }
        }
        let allow_list: HashSet<String> = app.id_token_attrs.iter().cloned().collect();
        required.extend(candidates.intersection(&allow_list).cloned());
    }

    required.extend(app.access_token_attrs.iter().cloned());

    let mut result: Vec<String> = required.into_iter().collect();
    result.sort();
    result
}
