//! Transactional unit of work over accounts, positions, and orders.
//!
//! The SQLite implementation holds one connection with an open
//! `BEGIN IMMEDIATE` transaction: the write lock serializes concurrent
//! submissions touching the same rows. Order inserts are idempotent on
//! `order_id`, updating only fill state on conflict.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::errors::TradingError;
use super::models::{
    AccountSnapshot, OrderRecord, OrderSide, OrderStatus, OrderType, PositionRecord,
};

#[async_trait]
pub trait TradingUnitOfWork: Send {
    async fn get_account(&mut self, user_id: &str) -> Result<Option<AccountSnapshot>, TradingError>;
    async fn upsert_account(&mut self, account: &AccountSnapshot) -> Result<(), TradingError>;
    async fn get_position(
        &mut self,
        user_id: &str,
        instrument_id: &str,
    ) -> Result<Option<PositionRecord>, TradingError>;
    async fn upsert_position(&mut self, position: &PositionRecord) -> Result<(), TradingError>;
    async fn upsert_order(&mut self, order: &OrderRecord) -> Result<(), TradingError>;
    async fn commit(&mut self) -> Result<(), TradingError>;
    async fn rollback(&mut self) -> Result<(), TradingError>;
}

pub trait UnitOfWorkFactory: Send + Sync {
    fn begin(&self) -> Result<Box<dyn TradingUnitOfWork>, TradingError>;
}

pub struct SqliteUowFactory {
    db_path: String,
}

impl SqliteUowFactory {
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }
}

impl UnitOfWorkFactory for SqliteUowFactory {
    fn begin(&self) -> Result<Box<dyn TradingUnitOfWork>, TradingError> {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("failed to open sqlite database at {}", self.db_path))?;
        // Wait out writers holding the file lock instead of surfacing
        // SQLITE_BUSY to every concurrent submission.
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .context("setting busy timeout")?;
        conn.execute_batch("BEGIN IMMEDIATE")
            .context("starting transaction")?;
        Ok(Box::new(SqliteUnitOfWork {
            conn,
            in_transaction: true,
        }))
    }
}

pub struct SqliteUnitOfWork {
    conn: Connection,
    in_transaction: bool,
}

impl SqliteUnitOfWork {
    fn require_transaction(&self) -> Result<(), TradingError> {
        if self.in_transaction {
            Ok(())
        } else {
            Err(TradingError::Infra(anyhow!("transaction already closed")))
        }
    }
}

impl Drop for SqliteUnitOfWork {
    fn drop(&mut self) {
        if self.in_transaction {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, TradingError> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(|error| anyhow!("invalid stored timestamp {raw}: {error}"))?
        .with_timezone(&Utc))
}

#[async_trait]
impl TradingUnitOfWork for SqliteUnitOfWork {
    async fn get_account(
        &mut self,
        user_id: &str,
    ) -> Result<Option<AccountSnapshot>, TradingError> {
        self.require_transaction()?;
        let row = self
            .conn
            .query_row(
                "SELECT user_id, cash_balance, base_currency, margin_allowed, updated_at
                 FROM accounts WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, bool>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()
            .context("querying account")?;

        match row {
            Some((user_id, cash_balance, base_currency, margin_allowed, updated_at)) => {
                Ok(Some(AccountSnapshot {
                    user_id,
                    cash_balance,
                    base_currency,
                    margin_allowed,
                    updated_at: parse_timestamp(&updated_at)?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn upsert_account(&mut self, account: &AccountSnapshot) -> Result<(), TradingError> {
        self.require_transaction()?;
        self.conn
            .execute(
                "INSERT INTO accounts (user_id, cash_balance, base_currency, margin_allowed, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT (user_id) DO UPDATE SET
                    cash_balance = excluded.cash_balance,
                    margin_allowed = excluded.margin_allowed,
                    updated_at = excluded.updated_at",
                params![
                    account.user_id,
                    account.cash_balance,
                    account.base_currency,
                    account.margin_allowed,
                    account.updated_at.to_rfc3339(),
                ],
            )
            .context("upserting account")?;
        Ok(())
    }

    async fn get_position(
        &mut self,
        user_id: &str,
        instrument_id: &str,
    ) -> Result<Option<PositionRecord>, TradingError> {
        self.require_transaction()?;
        let row = self
            .conn
            .query_row(
                "SELECT user_id, instrument_id, quantity, average_price, updated_at
                 FROM positions WHERE user_id = ?1 AND instrument_id = ?2",
                params![user_id, instrument_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()
            .context("querying position")?;

        match row {
            Some((user_id, instrument_id, quantity, average_price, updated_at)) => {
                Ok(Some(PositionRecord {
                    user_id,
                    instrument_id,
                    quantity,
                    average_price,
                    updated_at: parse_timestamp(&updated_at)?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn upsert_position(&mut self, position: &PositionRecord) -> Result<(), TradingError> {
        self.require_transaction()?;
        self.conn
            .execute(
                "INSERT INTO positions (user_id, instrument_id, quantity, average_price, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (user_id, instrument_id) DO UPDATE SET
                    quantity = excluded.quantity,
                    average_price = excluded.average_price,
                    updated_at = excluded.updated_at",
                params![
                    position.user_id,
                    position.instrument_id,
                    position.quantity,
                    position.average_price,
                    position.updated_at.to_rfc3339(),
                ],
            )
            .context("upserting position")?;
        Ok(())
    }

    async fn upsert_order(&mut self, order: &OrderRecord) -> Result<(), TradingError> {
        self.require_transaction()?;
        self.conn
            .execute(
                "INSERT INTO orders (
                    order_id, user_id, instrument_id, side, order_type, quantity,
                    filled_quantity, limit_price, average_price, status, time_in_force,
                    created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT (order_id) DO UPDATE SET
                    filled_quantity = excluded.filled_quantity,
                    average_price = excluded.average_price,
                    status = excluded.status,
                    updated_at = excluded.updated_at",
                params![
                    order.order_id,
                    order.user_id,
                    order.instrument_id,
                    order.side.as_str(),
                    order.order_type.as_str(),
                    order.quantity,
                    order.filled_quantity,
                    order.limit_price,
                    order.average_price,
                    order.status.as_str(),
                    order.time_in_force,
                    order.created_at.to_rfc3339(),
                    order.updated_at.to_rfc3339(),
                ],
            )
            .context("upserting order")?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), TradingError> {
        self.require_transaction()?;
        self.conn
            .execute_batch("COMMIT")
            .context("committing transaction")?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), TradingError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.conn
            .execute_batch("ROLLBACK")
            .context("rolling back transaction")?;
        self.in_transaction = false;
        Ok(())
    }
}

/// Read helpers outside any transaction, for tests and diagnostics.
pub fn load_order(db_path: &str, order_id: &str) -> Result<Option<OrderRecord>, TradingError> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("failed to open sqlite database at {db_path}"))?;
    let row = conn
        .query_row(
            "SELECT order_id, user_id, instrument_id, side, order_type, quantity,
                    filled_quantity, limit_price, average_price, status, time_in_force,
                    created_at, updated_at
             FROM orders WHERE order_id = ?1",
            params![order_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, Option<f64>>(7)?,
                    row.get::<_, Option<f64>>(8)?,
                    row.get::<_, String>(9)?,
                    row.get::<_, String>(10)?,
                    row.get::<_, String>(11)?,
                    row.get::<_, String>(12)?,
                ))
            },
        )
        .optional()
        .context("querying order")?;

    let Some((
        order_id,
        user_id,
        instrument_id,
        side,
        order_type,
        quantity,
        filled_quantity,
        limit_price,
        average_price,
        status,
        time_in_force,
        created_at,
        updated_at,
    )) = row
    else {
        return Ok(None);
    };

    Ok(Some(OrderRecord {
        order_id,
        user_id,
        instrument_id,
        side: OrderSide::from_str(&side)
            .ok_or_else(|| anyhow!("unknown order side {side}"))?,
        order_type: OrderType::from_str(&order_type)
            .ok_or_else(|| anyhow!("unknown order type {order_type}"))?,
        quantity,
        filled_quantity,
        limit_price,
        average_price,
        status: OrderStatus::from_str(&status)
            .ok_or_else(|| anyhow!("unknown order status {status}"))?,
        time_in_force,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::init_schema;
    use chrono::TimeZone;
    use tempfile::NamedTempFile;

    fn factory() -> (SqliteUowFactory, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        init_schema(&path).unwrap();

        // Seed the user row that accounts/positions reference.
        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES ('u-1', 'u-1@example.com', 'hash', ?1)",
            params![ts().to_rfc3339()],
        )
        .unwrap();

        (SqliteUowFactory::new(path), file)
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn account(user_id: &str, cash: f64) -> AccountSnapshot {
        AccountSnapshot {
            user_id: user_id.to_string(),
            cash_balance: cash,
            base_currency: "USD".to_string(),
            margin_allowed: false,
            updated_at: ts(),
        }
    }

    fn order(order_id: &str, filled: i64, status: OrderStatus) -> OrderRecord {
        OrderRecord {
            order_id: order_id.to_string(),
            user_id: "u-1".to_string(),
            instrument_id: "EQ-1".to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            quantity: 100,
            filled_quantity: filled,
            limit_price: Some(100.0),
            average_price: (filled > 0).then_some(99.9),
            status,
            time_in_force: "GTC".to_string(),
            created_at: ts(),
            updated_at: ts(),
        }
    }

    #[tokio::test]
    async fn committed_writes_are_visible_to_later_units() {
        let (factory, _file) = factory();

        let mut uow = factory.begin().unwrap();
        uow.upsert_account(&account("u-1", 1_000.0)).await.unwrap();
        uow.commit().await.unwrap();

        let mut next = factory.begin().unwrap();
        let loaded = next.get_account("u-1").await.unwrap().unwrap();
        assert_eq!(loaded.cash_balance, 1_000.0);
        next.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn rollback_discards_every_write() {
        let (factory, _file) = factory();

        let mut uow = factory.begin().unwrap();
        uow.upsert_account(&account("u-1", 1_000.0)).await.unwrap();
        uow.upsert_order(&order("o-1", 10, OrderStatus::PartiallyFilled))
            .await
            .unwrap();
        uow.rollback().await.unwrap();

        let mut next = factory.begin().unwrap();
        assert!(next.get_account("u-1").await.unwrap().is_none());
        next.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn dropping_an_uncommitted_unit_rolls_back() {
        let (factory, file) = factory();

        {
            let mut uow = factory.begin().unwrap();
            uow.upsert_account(&account("u-1", 1_000.0)).await.unwrap();
            // dropped without commit
        }

        let path = file.path().to_str().unwrap();
        let conn = Connection::open(path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn duplicate_order_id_updates_fill_state_only() {
        let (factory, file) = factory();

        let mut uow = factory.begin().unwrap();
        uow.upsert_order(&order("o-1", 0, OrderStatus::New))
            .await
            .unwrap();
        uow.upsert_order(&order("o-1", 100, OrderStatus::Filled))
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let path = file.path().to_str().unwrap();
        let loaded = load_order(path, "o-1").unwrap().unwrap();
        assert_eq!(loaded.filled_quantity, 100);
        assert_eq!(loaded.status, OrderStatus::Filled);
        assert_eq!(loaded.quantity, 100);

        let conn = Connection::open(path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn positions_round_trip_through_the_unit() {
        let (factory, _file) = factory();

        let position = PositionRecord {
            user_id: "u-1".to_string(),
            instrument_id: "EQ-1".to_string(),
            quantity: 25,
            average_price: 101.25,
            updated_at: ts(),
        };

        let mut uow = factory.begin().unwrap();
        uow.upsert_position(&position).await.unwrap();
        uow.commit().await.unwrap();

        let mut next = factory.begin().unwrap();
        let loaded = next.get_position("u-1", "EQ-1").await.unwrap().unwrap();
        assert_eq!(loaded, position);
        assert!(next.get_position("u-1", "EQ-2").await.unwrap().is_none());
        next.rollback().await.unwrap();
    }
}
