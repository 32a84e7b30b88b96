//! Authentication data structures and request validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("invalid email format")]
    InvalidEmail,
    #[error("password must be between 8 and 128 characters")]
    InvalidPasswordLength,
}

/// User account row. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Accepts the regex shape `^[^@\s]+@[^@\s]+\.[^@\s]+$`: a non-empty local
/// part, one `@`, and a domain containing an interior dot, with no
/// whitespace anywhere.
fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() || domain.len() < 3 {
        return false;
    }
    domain[1..domain.len() - 1].contains('.')
}

/// Trim, lowercase, and validate an email address. Uniqueness is always
/// decided on this normalized form.
pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let normalized = raw.trim().to_lowercase();
    if is_valid_email(&normalized) {
        Ok(normalized)
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub email: String,
    pub password: String,
}

impl RegistrationRequest {
    pub fn new(email: &str, password: &str) -> Result<Self, ValidationError> {
        let email = normalize_email(email)?;
        if password.len() < 8 || password.len() > 128 {
            return Err(ValidationError::InvalidPasswordLength);
        }
        Ok(Self {
            email,
            password: password.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: &str, password: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            email: normalize_email(email)?,
            password: password.to_string(),
        })
    }
}

/// Body returned by register/login; the token itself travels in the cookie.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}
