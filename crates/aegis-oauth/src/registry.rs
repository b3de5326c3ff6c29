//! The app registry: an external collaborator consulted by both the
//! authorization validator and the required-attributes computation. Only
//! its shape is defined here; a concrete store lives outside this core.

use std::collections::HashMap;

use aegis_core::CoreResult;

#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredApp {
    pub client_id: String,
    pub redirect_uris: Vec<String>,
    /// Claim names the flow may place in an ID token for this app.
    pub id_token_attrs: Vec<String>,
    /// Claim names the flow always collects for this app's access token,
    /// unconditionally of the requested scopes or `claims` parameter.
    pub access_token_attrs: Vec<String>,
    /// App-specific overrides of the standard OIDC scope-to-claims mapping.
    pub scope_claims: HashMap<String, Vec<String>>,
}

pub trait AppRegistry: Send + Sync {
    fn get(&self, client_id: &str) -> CoreResult<Option<RegisteredApp>>;
}

/// Standard OIDC scope-to-claims mapping (OIDC Core §5.4), used when an app
/// has no override for a given scope.
pub fn standard_scope_claims(scope: &str) -> &'static [&'static str] {
    match scope {
        "profile" => &[
            "name",
            "family_name",
            "given_name",
            "middle_name",
            "nickname",
            "preferred_username",
            "profile",
            "picture",
            "website",
            "gender",
            "birthdate",
            "zoneinfo",
            "locale",
            "updated_at",
        ],
        "email" => &["email", "email_verified"],
        "address" => &["address"],
        "phone" => &["phone_number", "phone_number_verified"],
        _ => &[],
    }
}
