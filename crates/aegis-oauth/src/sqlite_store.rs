//! SQL-backed authorization-code store. The compare-and-set in `redeem` is
//! pushed into the `UPDATE ... WHERE state = 'Active' RETURNING ...`
//! statement itself so the database, not application-level locking,
//! serializes concurrent redemptions.

use std::collections::HashMap;

use aegis_core::{AuthorizationCode, ClientErrorKind, CodeState, CoreError, CoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::store::AuthorizationCodeStore;

pub struct SqliteCodeStore {
    pool: SqlitePool,
}

impl SqliteCodeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> CoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS authorization_codes (
                code_id TEXT PRIMARY KEY,
                code TEXT UNIQUE NOT NULL,
                client_id TEXT NOT NULL,
                redirect_uri TEXT NOT NULL,
                authorized_user_id TEXT NOT NULL,
                user_attributes TEXT NOT NULL,
                time_created TEXT NOT NULL,
                expiry_time TEXT NOT NULL,
                scopes TEXT NOT NULL,
                state TEXT NOT NULL CHECK (state IN ('Active', 'Inactive')),
                code_challenge TEXT,
                code_challenge_method TEXT,
                resource TEXT,
                claims_request TEXT,
                claims_locales TEXT,
                nonce TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::store_failure(format!("migration failed: {e}")))?;
        Ok(())
    }
}

fn invalid_code_error() -> CoreError {
    CoreError::client(ClientErrorKind::InvalidToken, "invalid code")
}

fn row_to_code(row: &sqlx::sqlite::SqliteRow) -> CoreResult<AuthorizationCode> {
    let user_attributes: HashMap<String, Value> = serde_json::from_str(row.try_get::<String, _>("user_attributes").map_err(store_err)?.as_str())
        .map_err(|e| CoreError::store_failure(format!("corrupt user_attributes json: {e}")))?;
    let claims_request = match row.try_get::<Option<String>, _>("claims_request").map_err(store_err)? {
        Some(raw) => Some(
            serde_json::from_str(&raw).map_err(|e| CoreError::store_failure(format!("corrupt claims_request json: {e}")))?,
        ),
        None => None,
    };
    let scopes = row
        .try_get::<String, _>("scopes")
        .map_err(store_err)?
        .split(' ')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let state = match row.try_get::<String, _>("state").map_err(store_err)?.as_str() {
        "Active" => CodeState::Active,
        _ => CodeState::Inactive,
    };

    Ok(AuthorizationCode {
        code_id: Uuid::parse_str(&row.try_get::<String, _>("code_id").map_err(store_err)?)
            .map_err(|e| CoreError::store_failure(format!("corrupt code_id: {e}")))?,
        code: Uuid::parse_str(&row.try_get::<String, _>("code").map_err(store_err)?)
            .map_err(|e| CoreError::store_failure(format!("corrupt code: {e}")))?,
        client_id: row.try_get("client_id").map_err(store_err)?,
        redirect_uri: row.try_get("redirect_uri").map_err(store_err)?,
        authorized_user_id: row.try_get("authorized_user_id").map_err(store_err)?,
        user_attributes,
        time_created: row.try_get::<DateTime<Utc>, _>("time_created").map_err(store_err)?,
        expiry_time: row.try_get::<DateTime<Utc>, _>("expiry_time").map_err(store_err)?,
        scopes,
        state,
        code_challenge: row.try_get("code_challenge").map_err(store_err)?,
        code_challenge_method: row.try_get("code_challenge_method").map_err(store_err)?,
        resource: row.try_get("resource").map_err(store_err)?,
        claims_request,
        claims_locales: row.try_get("claims_locales").map_err(store_err)?,
        nonce: row.try_get("nonce").map_err(store_err)?,
    })
}

fn store_err(e: sqlx::Error) -> CoreError {
    CoreError::store_failure(e.to_string())
}

#[async_trait]
impl AuthorizationCodeStore for SqliteCodeStore {
    async fn insert(&self, code: AuthorizationCode) -> CoreResult<()> {
        let user_attributes = serde_json::to_string(&code.user_attributes)
            .map_err(|e| CoreError::store_failure(format!("serializing user_attributes: {e}")))?;
        let claims_request = code
            .claims_request
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| CoreError::store_failure(format!("serializing claims_request: {e}")))?;
        let scopes = code.scopes.join(" ");
        let state = match code.state {
            CodeState::Active => "Active",
            CodeState::Inactive => "Inactive",
        };

        let result = sqlx::query(
            r#"
            INSERT INTO authorization_codes (
                code_id, code, client_id, redirect_uri, authorized_user_id, user_attributes,
                time_created, expiry_time, scopes, state, code_challenge, code_challenge_method,
                resource, claims_request, claims_locales, nonce
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(code.code_id.to_string())
        .bind(code.code.to_string())
        .bind(&code.client_id)
        .bind(&code.redirect_uri)
        .bind(&code.authorized_user_id)
        .bind(user_attributes)
        .bind(code.time_created)
        .bind(code.expiry_time)
        .bind(scopes)
        .bind(state)
        .bind(&code.code_challenge)
        .bind(&code.code_challenge_method)
        .bind(&code.resource)
        .bind(claims_request)
        .bind(&code.claims_locales)
        .bind(&code.nonce)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(CoreError::store_failure("duplicate authorization code"))
            }
            Err(e) => Err(store_err(e)),
        }
    }

    async fn redeem(&self, client_id: &str, code: &str) -> CoreResult<AuthorizationCode> {
        if code.is_empty() {
            return Err(invalid_code_error());
        }
        let row = sqlx::query(
            r#"
            UPDATE authorization_codes
            SET state = 'Inactive'
            WHERE code = ? AND client_id = ? AND state = 'Active'
            RETURNING *
            "#,
        )
        .bind(code)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        match row {
            Some(row) => {
                let record = row_to_code(&row)?;
                // The flip to Inactive already happened, which is fine: an
                // expired code is dead either way.
                if record.is_expired(Utc::now()) {
                    return Err(invalid_code_error());
                }
                Ok(record)
            }
            None => Err(invalid_code_error()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::HashMap as Map;

    async fn store() -> SqliteCodeStore {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let store = SqliteCodeStore::new(pool);
        store.run_migrations().await.unwrap();
        store
    }

    fn a_code() -> AuthorizationCode {
        let now = Utc::now();
        AuthorizationCode {
            code_id: Uuid::now_v7(),
            code: Uuid::now_v7(),
            client_id: "c1".into(),
            redirect_uri: "https://app/cb".into(),
            authorized_user_id: "u-1".into(),
            user_attributes: Map::new(),
            time_created: now,
            expiry_time: now + chrono::Duration::minutes(10),
            scopes: vec!["openid".into()],
            state: CodeState::Active,
            code_challenge: Some("abc".into()),
            code_challenge_method: Some("S256".into()),
            resource: None,
            claims_request: None,
            claims_locales: None,
            nonce: None,
        }
    }

    #[tokio::test]
    async fn insert_then_redeem_round_trips_and_is_one_shot() {
        let store = store().await;
        let code = a_code();
        let code_str = code.code.to_string();
        store.insert(code).await.unwrap();

        let redeemed = store.redeem("c1", &code_str).await.unwrap();
        assert_eq!(redeemed.code_challenge.as_deref(), Some("abc"));
        assert!(store.redeem("c1", &code_str).await.is_err());
    }

    #[tokio::test]
    async fn duplicate_code_is_rejected() {
        let store = store().await;
        let code = a_code();
        let dup = AuthorizationCode { code_id: Uuid::now_v7(), ..code.clone() };
        store.insert(code).await.unwrap();
        assert!(store.insert(dup).await.is_err());
    }
}
