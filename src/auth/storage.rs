//! User and account persistence over SQLite.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::models::User;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn create(&self, email: &str, password_hash: &str) -> Result<User>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn create_account(
        &self,
        user_id: &str,
        starting_balance: f64,
        currency: &str,
    ) -> Result<()>;
}

/// SQLite store implementing both repositories. A connection is opened per
/// operation so the store is freely shareable.
pub struct SqliteAuthStore {
    db_path: String,
}

impl SqliteAuthStore {
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .with_context(|| format!("failed to open sqlite database at {}", self.db_path))
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("invalid stored timestamp {raw}"))?
        .with_timezone(&Utc))
}

#[async_trait]
impl UserRepository for SqliteAuthStore {
    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.open()?;
        let row = conn
            .query_row(
                "SELECT id, email, password_hash, created_at FROM users WHERE email = ?1",
                params![email],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .context("querying user by email")?;

        match row {
            Some((id, email, password_hash, created_at)) => Ok(Some(User {
                id,
                email,
                password_hash,
                created_at: parse_timestamp(&created_at)?,
            })),
            None => Ok(None),
        }
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<User> {
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };

        let conn = self.open()?;
        conn.execute(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                user.id,
                user.email,
                user.password_hash,
                user.created_at.to_rfc3339(),
            ],
        )
        .context("inserting user")?;

        Ok(user)
    }
}

#[async_trait]
impl AccountRepository for SqliteAuthStore {
    async fn create_account(
        &self,
        user_id: &str,
        starting_balance: f64,
        currency: &str,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO accounts (user_id, cash_balance, base_currency, margin_allowed, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?4)
             ON CONFLICT (user_id) DO UPDATE SET
                cash_balance = excluded.cash_balance,
                margin_allowed = excluded.margin_allowed,
                updated_at = excluded.updated_at",
            params![user_id, starting_balance, currency, now],
        )
        .context("inserting account")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::init_schema;
    use tempfile::NamedTempFile;

    fn store() -> (SqliteAuthStore, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        init_schema(&path).unwrap();
        (SqliteAuthStore::new(path), file)
    }

    #[tokio::test]
    async fn create_and_fetch_user_by_email() {
        let (store, _file) = store();
        let created = store.create("alice@ex.com", "hash").await.unwrap();

        let fetched = store.get_by_email("alice@ex.com").await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.email, "alice@ex.com");
        assert_eq!(fetched.password_hash, "hash");
    }

    #[tokio::test]
    async fn missing_user_reads_as_none() {
        let (store, _file) = store();
        assert!(store.get_by_email("ghost@ex.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_violates_unique_constraint() {
        let (store, _file) = store();
        store.create("alice@ex.com", "hash").await.unwrap();
        assert!(store.create("alice@ex.com", "hash2").await.is_err());
    }

    #[tokio::test]
    async fn account_is_seeded_with_starting_balance() {
        let (store, file) = store();
        let user = store.create("alice@ex.com", "hash").await.unwrap();
        store
            .create_account(&user.id, 1_000_000.0, "USD")
            .await
            .unwrap();

        let conn = Connection::open(file.path()).unwrap();
        let (balance, currency, margin): (f64, String, bool) = conn
            .query_row(
                "SELECT cash_balance, base_currency, margin_allowed FROM accounts WHERE user_id = ?1",
                params![user.id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(balance, 1_000_000.0);
        assert_eq!(currency, "USD");
        assert!(!margin);
    }
}
