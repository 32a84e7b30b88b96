//! Execution event stream.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::models::ExecutionEvent;

#[async_trait]
pub trait ExecutionPublisher: Send + Sync {
    async fn publish(&self, event: &ExecutionEvent) -> Result<()>;
}

/// Appends fills to the execution stream as a single JSON `payload` field.
pub struct RedisExecutionPublisher {
    conn: ConnectionManager,
    stream: String,
}

impl RedisExecutionPublisher {
    pub fn new(conn: ConnectionManager, stream: impl Into<String>) -> Self {
        Self {
            conn,
            stream: stream.into(),
        }
    }
}

#[async_trait]
impl ExecutionPublisher for RedisExecutionPublisher {
    async fn publish(&self, event: &ExecutionEvent) -> Result<()> {
        let payload = serde_json::to_string(event).context("serializing execution event")?;
        let mut conn = self.conn.clone();
        let _: String = conn
            .xadd(&self.stream, "*", &[("payload", payload.as_str())])
            .await
            .context("appending execution event to stream")?;
        Ok(())
    }
}
