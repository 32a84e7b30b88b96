//! Registration, login, and session lifecycle orchestration.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::models::{LoginRequest, RegistrationRequest};
use super::password::PasswordHasher;
use super::session::{AuthenticatedSession, SessionStore, SessionToken};
use super::storage::{AccountRepository, UserRepository};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user already exists for email={0}")]
    UserAlreadyExists(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Infra(#[from] anyhow::Error),
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    accounts: Arc<dyn AccountRepository>,
    sessions: Arc<dyn SessionStore>,
    hasher: PasswordHasher,
    starting_balance: f64,
    base_currency: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        accounts: Arc<dyn AccountRepository>,
        sessions: Arc<dyn SessionStore>,
        starting_balance: f64,
        base_currency: impl Into<String>,
    ) -> Self {
        Self {
            users,
            accounts,
            sessions,
            hasher: PasswordHasher,
            starting_balance,
            base_currency: base_currency.into(),
        }
    }

    /// Create the user, open their margin-disabled cash account, and issue
    /// the first session.
    pub async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<AuthenticatedSession, AuthError> {
        if self.users.get_by_email(&request.email).await?.is_some() {
            return Err(AuthError::UserAlreadyExists(request.email));
        }

        let password_hash = self.hasher.hash(&request.password)?;
        let user = self.users.create(&request.email, &password_hash).await?;
        self.accounts
            .create_account(&user.id, self.starting_balance, &self.base_currency)
            .await?;

        info!(user_id = %user.id, "user registered");
        Ok(self.sessions.issue(&user.id).await?)
    }

    /// Unknown user and wrong password collapse into one error so callers
    /// cannot probe for registered emails.
    pub async fn login(&self, request: LoginRequest) -> Result<AuthenticatedSession, AuthError> {
        let user = self.users.get_by_email(&request.email).await?;
        let Some(user) = user else {
            warn!("login attempt for unknown email");
            return Err(AuthError::InvalidCredentials);
        };
        if !self.hasher.verify(&user.password_hash, &request.password) {
            warn!(user_id = %user.id, "login attempt with wrong password");
            return Err(AuthError::InvalidCredentials);
        }
        Ok(self.sessions.issue(&user.id).await?)
    }

    pub async fn logout(&self, token: SessionToken) -> Result<(), AuthError> {
        self.sessions.revoke(&token).await?;
        Ok(())
    }

    /// Seed the demo login used by local stacks; no-op when it exists.
    pub async fn ensure_seed_user(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let request = RegistrationRequest::new(email, password)
            .map_err(|error| AuthError::Infra(anyhow::anyhow!(error)))?;
        if self.users.get_by_email(&request.email).await?.is_some() {
            return Ok(());
        }
        let password_hash = self.hasher.hash(&request.password)?;
        let user = self.users.create(&request.email, &password_hash).await?;
        self.accounts
            .create_account(&user.id, self.starting_balance, &self.base_currency)
            .await?;
        info!(email = %request.email, "seeded demo user");
        Ok(())
    }
}
