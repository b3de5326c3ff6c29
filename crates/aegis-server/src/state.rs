//! Shared application state: one SQLite-backed store, one long-lived
//! service object per core, all wrapped in an `Arc` and injected into the
//! router as an `Extension`.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use aegis_authz::{OuHierarchyResolver, SystemAuthorizationService};
use aegis_core::{CoreError, CoreResult};
use aegis_oauth::{AuthorizeService, InMemoryRequestStore, JwtAssertionVerifier, RegisteredApp, SqliteCodeStore};
use chrono::Duration as ChronoDuration;
use jsonwebtoken::{Algorithm, DecodingKey};
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::flow::UuidFlowExecutor;

/// The server's own app registry: a static, config-loaded list. A real
/// deployment backs this with the same durable store as everything else.
pub struct ConfiguredAppRegistry {
    apps: HashMap<String, RegisteredApp>,
}

impl ConfiguredAppRegistry {
    pub fn from_config(cfg: &AppConfig) -> Self {
        let apps = cfg
            .apps
            .iter()
            .map(|app| {
                (
                    app.client_id.clone(),
                    RegisteredApp {
                        client_id: app.client_id.clone(),
                        redirect_uris: app.redirect_uris.clone(),
                        id_token_attrs: app.id_token_attrs.clone(),
                        access_token_attrs: app.access_token_attrs.clone(),
                        scope_claims: app.scope_claims.clone(),
                    },
                )
            })
            .collect();
        Self { apps }
    }
}

impl aegis_oauth::AppRegistry for ConfiguredAppRegistry {
    fn get(&self, client_id: &str) -> CoreResult<Option<RegisteredApp>> {
        Ok(self.apps.get(client_id).cloned())
    }
}

/// OU hierarchy backed by the config file's `child = "parent"` map. A cycle
/// in the map is a config defect; traversal surfaces it as a typed error so
/// the policy layer fails deny-safe instead of spinning.
pub struct ConfiguredOuHierarchy {
    parent_of: HashMap<String, String>,
}

impl ConfiguredOuHierarchy {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            parent_of: cfg.ous.clone(),
        }
    }
}

impl OuHierarchyResolver for ConfiguredOuHierarchy {
    fn is_ancestor_or_self(&self, candidate: &str, of: &str) -> CoreResult<bool> {
        Ok(self.get_ancestor_ou_ids(of)?.iter().any(|id| id == candidate))
    }

    fn get_ancestor_ou_ids(&self, of: &str) -> CoreResult<Vec<String>> {
        let mut chain = vec![of.to_string()];
        let mut seen: HashSet<&str> = HashSet::from([of]);
        let mut current = of;
        while let Some(parent) = self.parent_of.get(current) {
            if !seen.insert(parent.as_str()) {
                return Err(CoreError::system_error(format!("ou hierarchy contains a cycle through '{parent}'")));
            }
            chain.push(parent.clone());
            current = parent.as_str();
        }
        Ok(chain)
    }
}

pub struct AppState {
    pub cfg: AppConfig,
    pub authorize_service: AuthorizeService,
    pub authz_service: Arc<SystemAuthorizationService>,
}

impl AppState {
    pub async fn init(cfg: &AppConfig) -> anyhow::Result<Self> {
        ensure_parent_dir(&cfg.server.code_sqlite_path)?;
        let db_url = sqlite_url(&cfg.server.code_sqlite_path);
        let pool = SqlitePool::connect(&db_url).await?;

        let code_store = SqliteCodeStore::new(pool);
        code_store.run_migrations().await.map_err(|e| anyhow::anyhow!(e))?;

        let request_store = InMemoryRequestStore::new(std::time::Duration::from_secs(cfg.oauth.request_ttl_seconds));
        let app_registry = ConfiguredAppRegistry::from_config(cfg);
        let assertion_verifier = JwtAssertionVerifier::new(
            DecodingKey::from_secret(cfg.oauth.assertion_signing_secret.as_bytes()),
            Algorithm::HS256,
        );

        let authorize_service = AuthorizeService::new(
            Arc::new(app_registry),
            Arc::new(request_store),
            Arc::new(code_store),
            Arc::new(UuidFlowExecutor),
            Arc::new(assertion_verifier),
            ChronoDuration::seconds(cfg.oauth.code_validity_seconds),
        );

        // The authz service is constructed membership-only, then promoted
        // once the OU hierarchy is known.
        let authz_service = Arc::new(SystemAuthorizationService::new());
        if !cfg.ous.is_empty() {
            authz_service.set_ou_hierarchy_resolver(Some(Arc::new(ConfiguredOuHierarchy::from_config(cfg))));
        }

        Ok(Self {
            cfg: cfg.clone(),
            authorize_service,
            authz_service,
        })
    }
}

fn sqlite_url(path: &str) -> String {
    if Path::new(path).is_absolute() {
        format!("sqlite:{path}?mode=rwc")
    } else {
        format!("sqlite://{path}?mode=rwc")
    }
}

fn ensure_parent_dir(file_path: &str) -> anyhow::Result<()> {
    let p = Path::new(file_path);
    if let Some(parent) = p.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
