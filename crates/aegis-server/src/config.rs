//! Configuration loading: a TOML file, an env-var override for its path,
//! and `#[serde(default)]` on every field so a missing file or section
//! degrades to sane defaults rather than a startup failure.

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, env, fs, path::PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub apps: Vec<RegisteredAppConfig>,
    /// OU tree as a `child = "parent"` map; roots are simply absent. Feeds
    /// the hierarchy resolver handed to the authz service at startup.
    #[serde(default)]
    pub ous: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. "0.0.0.0:8080"
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Path to the local SQLite file backing the authorization-code store.
    #[serde(default = "default_code_db_path")]
    pub code_sqlite_path: String,

    /// Where leg 1 sends the browser to run the interactive flow.
    #[serde(default = "default_login_page")]
    pub login_page: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_code_db_path() -> String {
    "data/aegis-codes.sqlite".to_string()
}

fn default_login_page() -> String {
    "/login".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            code_sqlite_path: default_code_db_path(),
            login_page: default_login_page(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// How long an issued authorization code stays redeemable.
    #[serde(default = "default_code_validity_seconds")]
    pub code_validity_seconds: i64,

    /// How long a pending authorization request may wait for its callback.
    #[serde(default = "default_request_ttl_seconds")]
    pub request_ttl_seconds: u64,

    /// Shared secret the flow engine signs assertions with (HS256). A
    /// production deployment wires in an asymmetric key provider instead.
    #[serde(default = "default_assertion_secret")]
    pub assertion_signing_secret: String,
}

fn default_code_validity_seconds() -> i64 {
    300
}

fn default_request_ttl_seconds() -> u64 {
    600
}

fn default_assertion_secret() -> String {
    "change-me-in-production".to_string()
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            code_validity_seconds: default_code_validity_seconds(),
            request_ttl_seconds: default_request_ttl_seconds(),
            assertion_signing_secret: default_assertion_secret(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredAppConfig {
    pub client_id: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub id_token_attrs: Vec<String>,
    #[serde(default)]
    pub access_token_attrs: Vec<String>,
    #[serde(default)]
    pub scope_claims: HashMap<String, Vec<String>>,
}

pub fn load_config() -> anyhow::Result<AppConfig> {
    let path = config_path();
    let raw = fs::read_to_string(&path)?;
    let cfg: AppConfig = toml::from_str(&raw)?;
    Ok(cfg)
}

fn config_path() -> PathBuf {
    if let Ok(p) = env::var("AEGIS_SERVER_CONFIG") {
        return PathBuf::from(p);
    }
    PathBuf::from("config.toml")
}
