//! Opaque-token session store.
//!
//! Tokens are 32 random bytes hex-encoded, never derived from user data, and
//! only meaningful as lookup keys. `get` is the sole liveness authority:
//! absent and expired are indistinguishable to callers.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rand::RngCore;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

const SESSION_KEY_PREFIX: &str = "auth_session:";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }

    /// Fresh unguessable token: 256 bits from the OS CSPRNG.
    fn generate() -> Self {
        let mut bytes = [0_u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedSession {
    pub token: SessionToken,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn issue(&self, user_id: &str) -> Result<AuthenticatedSession>;
    async fn get(&self, token: &SessionToken) -> Result<Option<AuthenticatedSession>>;
    async fn revoke(&self, token: &SessionToken) -> Result<()>;
}

#[derive(Serialize, Deserialize)]
struct SessionDocument {
    user_id: String,
    expires_at: DateTime<Utc>,
}

/// Redis-backed store; the TTL on the key does the eviction.
pub struct RedisSessionStore {
    conn: ConnectionManager,
    ttl: Duration,
}

impl RedisSessionStore {
    pub fn new(conn: ConnectionManager, ttl: Duration) -> Self {
        Self { conn, ttl }
    }

    fn key(token: &SessionToken) -> String {
        format!("{SESSION_KEY_PREFIX}{}", token.value())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn issue(&self, user_id: &str) -> Result<AuthenticatedSession> {
        let token = SessionToken::generate();
        let expires_at = Utc::now() + self.ttl;
        let document = SessionDocument {
            user_id: user_id.to_string(),
            expires_at,
        };
        let payload = serde_json::to_string(&document)?;

        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(
                Self::key(&token),
                payload,
                self.ttl.num_seconds().max(1) as u64,
            )
            .await
            .context("storing session")?;

        Ok(AuthenticatedSession {
            token,
            user_id: user_id.to_string(),
            expires_at,
        })
    }

    async fn get(&self, token: &SessionToken) -> Result<Option<AuthenticatedSession>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(Self::key(token))
            .await
            .context("loading session")?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let document: SessionDocument = serde_json::from_str(&raw)?;
        Ok(Some(AuthenticatedSession {
            token: token.clone(),
            user_id: document.user_id,
            expires_at: document.expires_at,
        }))
    }

    async fn revoke(&self, token: &SessionToken) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(Self::key(token))
            .await
            .context("revoking session")?;
        Ok(())
    }
}

/// In-memory TTL store used by tests and single-process local runs. Expired
/// entries are evicted lazily on `get`.
pub struct InMemorySessionStore {
    ttl: Duration,
    sessions: Arc<RwLock<HashMap<String, SessionDocument>>>,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn issue(&self, user_id: &str) -> Result<AuthenticatedSession> {
        let token = SessionToken::generate();
        let expires_at = Utc::now() + self.ttl;
        self.sessions.write().insert(
            token.value().to_string(),
            SessionDocument {
                user_id: user_id.to_string(),
                expires_at,
            },
        );
        Ok(AuthenticatedSession {
            token,
            user_id: user_id.to_string(),
            expires_at,
        })
    }

    async fn get(&self, token: &SessionToken) -> Result<Option<AuthenticatedSession>> {
        let mut sessions = self.sessions.write();
        let Some(document) = sessions.get(token.value()) else {
            return Ok(None);
        };
        if document.expires_at <= Utc::now() {
            sessions.remove(token.value());
            return Ok(None);
        }
        Ok(Some(AuthenticatedSession {
            token: token.clone(),
            user_id: document.user_id.clone(),
            expires_at: document.expires_at,
        }))
    }

    async fn revoke(&self, token: &SessionToken) -> Result<()> {
        self.sessions.write().remove(token.value());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_long_and_unique() {
        let a = SessionToken::generate();
        let b = SessionToken::generate();
        assert_eq!(a.value().len(), 64);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn issue_then_get_returns_the_session() {
        let store = InMemorySessionStore::new(Duration::minutes(30));
        let issued = store.issue("user-1").await.unwrap();

        let loaded = store.get(&issued.token).await.unwrap().unwrap();
        assert_eq!(loaded.user_id, "user-1");
        assert_eq!(loaded.expires_at, issued.expires_at);
    }

    #[tokio::test]
    async fn revoke_is_idempotent_and_kills_the_session() {
        let store = InMemorySessionStore::new(Duration::minutes(30));
        let issued = store.issue("user-1").await.unwrap();

        store.revoke(&issued.token).await.unwrap();
        assert!(store.get(&issued.token).await.unwrap().is_none());
        store.revoke(&issued.token).await.unwrap();
    }

    #[tokio::test]
    async fn expired_sessions_read_as_absent() {
        let store = InMemorySessionStore::new(Duration::zero());
        let issued = store.issue("user-1").await.unwrap();
        assert!(store.get(&issued.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_token_reads_as_absent() {
        let store = InMemorySessionStore::new(Duration::minutes(30));
        let token = SessionToken::new("deadbeef");
        assert!(store.get(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn each_login_rotates_the_token() {
        let store = InMemorySessionStore::new(Duration::minutes(30));
        let first = store.issue("user-1").await.unwrap();
        let second = store.issue("user-1").await.unwrap();
        assert_ne!(first.token, second.token);
        // Both stay valid until revoked or expired.
        assert!(store.get(&first.token).await.unwrap().is_some());
        assert!(store.get(&second.token).await.unwrap().is_some());
    }
}
