//! The pending-request store and the authorization-code store interfaces,
//! plus their in-memory reference implementations. A SQL-backed code store
//! lives in `sqlite_store`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use aegis_core::{AuthRequestContext, AuthorizationCode, ClientErrorKind, CodeState, CoreError, CoreResult};
use async_trait::async_trait;
use rand::RngCore;
use tokio::sync::{Mutex, RwLock};

pub const DEFAULT_REQUEST_TTL: Duration = Duration::from_secs(600);

/// Short-lived map of pending authorization requests. `add_request`
/// allocates a fresh opaque identifier with at least 128 bits of entropy;
/// `take_request` is the callback's load-and-delete, exposed as a single
/// atomic operation so no caller can observe a separate get/clear race.
#[async_trait]
pub trait AuthorizationRequestStore: Send + Sync {
    async fn add_request(&self, ctx: AuthRequestContext) -> CoreResult<String>;
    async fn take_request(&self, auth_id: &str) -> CoreResult<Option<AuthRequestContext>>;
}

fn generate_opaque_id() -> String {
    let mut bytes = [0u8; 16]; // 128 bits
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub struct InMemoryRequestStore {
    ttl: Duration,
    entries: RwLock<HashMap<String, (Instant, AuthRequestContext)>>,
}

impl InMemoryRequestStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryRequestStore {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TTL)
    }
}

#[async_trait]
impl AuthorizationRequestStore for InMemoryRequestStore {
    async fn add_request(&self, ctx: AuthRequestContext) -> CoreResult<String> {
        let id = generate_opaque_id();
        let mut guard = self.entries.write().await;
        // Abandoned logins would otherwise accumulate forever.
        guard.retain(|_, (inserted_at, _)| inserted_at.elapsed() <= self.ttl);
        guard.insert(id.clone(), (Instant::now(), ctx));
        Ok(id)
    }

    async fn take_request(&self, auth_id: &str) -> CoreResult<Option<AuthRequestContext>> {
        let mut guard = self.entries.write().await;
        match guard.remove(auth_id) {
            Some((inserted_at, ctx)) if inserted_at.elapsed() <= self.ttl => Ok(Some(ctx)),
            _ => Ok(None),
        }
    }
}

/// Persistent one-shot code records keyed by `code` globally, looked up by
/// `(client_id, code)`. `redeem` performs the get-then-CAS atomically: a
/// missing record, a client_id mismatch, an empty code, or an already
/// `Inactive` record are all indistinguishable "invalid code" errors to the
/// caller, which keeps redemption from leaking whether a code ever existed.
#[async_trait]
pub trait AuthorizationCodeStore: Send + Sync {
    async fn insert(&self, code: AuthorizationCode) -> CoreResult<()>;
    async fn redeem(&self, client_id: &str, code: &str) -> CoreResult<AuthorizationCode>;
}

fn invalid_code_error() -> CoreError {
    CoreError::client(ClientErrorKind::InvalidToken, "invalid code")
}

pub struct InMemoryCodeStore {
    records: Mutex<HashMap<String, AuthorizationCode>>,
}

impl Default for InMemoryCodeStore {
    fn default() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl AuthorizationCodeStore for InMemoryCodeStore {
    async fn insert(&self, code: AuthorizationCode) -> CoreResult<()> {
        let mut guard = self.records.lock().await;
        let key = code.code.to_string();
        if guard.contains_key(&key) {
            return Err(CoreError::store_failure("duplicate authorization code"));
        }
        guard.insert(key, code);
        Ok(())
    }

    async fn redeem(&self, client_id: &str, code: &str) -> CoreResult<AuthorizationCode> {
        if code.is_empty() {
            return Err(invalid_code_error());
        }
        let mut guard = self.records.lock().await;
        let record = guard.get_mut(code).ok_or_else(invalid_code_error)?;
        if record.client_id != client_id
            || record.state != CodeState::Active
            || record.is_expired(chrono::Utc::now())
        {
            return Err(invalid_code_error());
        }
        record.state = CodeState::Inactive;
        Ok(record.clone())
    }
}
