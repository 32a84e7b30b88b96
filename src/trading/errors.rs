//! Trading error taxonomy. Each variant maps to exactly one HTTP status at
//! the API layer and one recovery policy internally.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TradingError {
    #[error("{0}")]
    Validation(String),
    #[error("insufficient cash to execute order")]
    InsufficientBalance,
    #[error("order quantity exceeds available position")]
    InsufficientPosition,
    #[error("instrument {0} not found")]
    InstrumentNotFound(String),
    #[error(transparent)]
    Infra(#[from] anyhow::Error),
}
