use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// OAuth2/OIDC authorization parameters as they stand once scopes have been
/// split into the OIDC-standard and permission buckets (leg 1 step 4). This
/// is the value an `AuthRequestContext` carries; it is immutable once
/// stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthParameters {
    pub client_id: String,
    pub redirect_uri: Option<String>,
    pub response_type: String,
    pub state: Option<String>,
    pub nonce: Option<String>,
    /// OIDC scope names (`openid`, `profile`, `email`, `address`, `phone`),
    /// in the order the client sent them.
    pub standard_scopes: Vec<String>,
    /// Everything else from `scope`, in arrival order.
    pub permission_scopes: Vec<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    /// RFC 8707 resource indicator.
    pub resource: Option<String>,
    pub claims_request: Option<ClaimsRequest>,
    /// Space-separated BCP-47 tags, kept verbatim.
    pub claims_locales: Option<String>,
}

impl OAuthParameters {
    pub fn wants_openid(&self) -> bool {
        self.standard_scopes.iter().any(|s| s == "openid")
    }

    /// Scopes in their original relative order: standard scopes first, then
    /// permission scopes, matching how `AuthorizationCode::scopes` is built.
    pub fn all_scopes(&self) -> Vec<String> {
        self.standard_scopes
            .iter()
            .chain(self.permission_scopes.iter())
            .cloned()
            .collect()
    }
}

/// One constraint on a single requested claim inside an OIDC `claims` object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimSpec {
    #[serde(default)]
    pub essential: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
}

impl ClaimSpec {
    /// True when no constraint is set, or `value` equals `subject`, or
    /// `values` contains `subject`.
    pub fn matches_value(&self, subject: &Value) -> bool {
        if let Some(expected) = &self.value {
            return expected == subject;
        }
        if let Some(allowed) = &self.values {
            return allowed.contains(subject);
        }
        true
    }
}

/// Parsed OIDC `claims` request parameter, keyed by target channel. Unknown
/// top-level keys are dropped on parse; a JSON `null` ClaimSpec means
/// "request the claim, no value constraint" and deserializes to the default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimsRequest {
    #[serde(
        default,
        deserialize_with = "nullable_claim_specs",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub id_token: HashMap<String, ClaimSpec>,
    #[serde(
        default,
        deserialize_with = "nullable_claim_specs",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub userinfo: HashMap<String, ClaimSpec>,
}

fn nullable_claim_specs<'de, D>(deserializer: D) -> Result<HashMap<String, ClaimSpec>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: HashMap<String, Option<ClaimSpec>> = HashMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, spec)| (name, spec.unwrap_or_default()))
        .collect())
}

/// Server-side state for an in-flight `/authorize` request, held by the
/// request store between leg 1 and leg 2. Consumed exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthRequestContext {
    pub params: OAuthParameters,
}

/// Claim names that never surface as `user_attributes`.
pub const RESERVED_ASSERTION_CLAIMS: &[&str] =
    &["iss", "sub", "aud", "exp", "nbf", "iat", "jti", "assurance", "authorized_permissions"];

/// Decoded, already-signature-verified assertion from the flow engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub user_id: String,
    pub user_attributes: HashMap<String, Value>,
    pub authorized_permissions: Vec<String>,
    pub auth_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CodeState {
    Active,
    Inactive,
}

/// A single-use authorization code. Unique by `code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code_id: Uuid,
    pub code: Uuid,
    pub client_id: String,
    pub redirect_uri: String,
    pub authorized_user_id: String,
    pub user_attributes: HashMap<String, Value>,
    pub time_created: DateTime<Utc>,
    pub expiry_time: DateTime<Utc>,
    /// Standard scopes then permission scopes, in caller order.
    pub scopes: Vec<String>,
    pub state: CodeState,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub resource: Option<String>,
    pub claims_request: Option<ClaimsRequest>,
    pub claims_locales: Option<String>,
    pub nonce: Option<String>,
}

impl AuthorizationCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry_time
    }
}

/// The closed set of resource types the System Authorization Core's
/// built-in policies know how to reason about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    User,
    Ou,
    UserSchema,
    Other(String),
}

/// What an action is aimed at. Any field may be absent when not applicable
/// to the action being checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionContext {
    pub ou_id: Option<String>,
    pub resource_type: ResourceType,
    pub resource_id: Option<String>,
}

/// Result of a list-query pre-filter. When `all_allowed` is true, `ids` is
/// meaningless and must not be applied as a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessibleResources {
    pub all_allowed: bool,
    pub ids: HashSet<String>,
}

impl AccessibleResources {
    pub fn all() -> Self {
        Self {
            all_allowed: true,
            ids: HashSet::new(),
        }
    }

    pub fn none() -> Self {
        Self {
            all_allowed: false,
            ids: HashSet::new(),
        }
    }

    pub fn ids(ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            all_allowed: false,
            ids: ids.into_iter().collect(),
        }
    }
}

/// Request-scoped identity and grant. `skip_security` and `runtime` are
/// propagated by the request dispatcher, not set by callers of the
/// authorization core itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityContext {
    pub subject: String,
    pub ou_id: Option<String>,
    pub permissions: HashSet<String>,
    pub token: String,
    pub skip_security: bool,
    pub runtime: bool,
}

impl SecurityContext {
    pub fn new(subject: impl Into<String>, permissions: HashSet<String>) -> Self {
        Self {
            subject: subject.into(),
            ou_id: None,
            permissions,
            token: String::new(),
            skip_security: false,
            runtime: false,
        }
    }
}
