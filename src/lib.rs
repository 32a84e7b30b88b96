//! Tradeboard backend library.
//!
//! Three cooperating services share this crate:
//! - `marketdata-service`: seeded price simulation, ladder books, dealer
//!   quotes, and the persist-then-publish emission pipeline.
//! - `auth-service`: registration, login, and cookie-bound opaque sessions.
//! - `trading-service`: session-authenticated order submission matched
//!   against the latest published book snapshot.

pub mod auth;
pub mod clock;
pub mod config;
pub mod logging;
pub mod marketdata;
pub mod store;
pub mod trading;
