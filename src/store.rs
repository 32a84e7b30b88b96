//! SQLite schema bootstrap shared by the three services.
//!
//! Every table is created idempotently at startup so each binary can point at
//! a fresh database file. Timestamps are stored as RFC 3339 text and JSON
//! blobs as text columns.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create every table the platform needs if it does not exist yet.
pub fn init_schema(db_path: &str) -> Result<()> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("failed to open sqlite database at {db_path}"))?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS accounts (
            user_id TEXT PRIMARY KEY REFERENCES users (id) ON DELETE CASCADE,
            cash_balance REAL NOT NULL,
            base_currency TEXT NOT NULL,
            margin_allowed INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS positions (
            user_id TEXT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
            instrument_id TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            average_price REAL NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (user_id, instrument_id)
        );

        CREATE TABLE IF NOT EXISTS orders (
            order_id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            instrument_id TEXT NOT NULL,
            side TEXT NOT NULL,
            order_type TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            filled_quantity INTEGER NOT NULL,
            limit_price REAL,
            average_price REAL,
            status TEXT NOT NULL,
            time_in_force TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS market_ticks (
            instrument_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            bid REAL NOT NULL,
            ask REAL NOT NULL,
            mid REAL NOT NULL,
            dealer_id TEXT,
            metadata TEXT
        );

        CREATE TABLE IF NOT EXISTS order_books (
            instrument_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            levels TEXT NOT NULL
        );",
    )
    .context("failed to initialise sqlite schema")?;

    Ok(())
}
