//! Auth HTTP endpoints: register, login, logout.
//!
//! The session token travels only in an HTTP-only cookie; response bodies
//! carry the user id and expiry.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::error;

use super::models::{LoginRequest, RegistrationRequest, SessionResponse};
use super::service::{AuthError, AuthService};
use super::session::{AuthenticatedSession, SessionToken};

#[derive(Debug, Clone)]
pub struct SessionCookieSettings {
    pub name: String,
    pub secure: bool,
    pub domain: Option<String>,
    pub ttl_minutes: i64,
}

#[derive(Clone)]
pub struct AuthApiState {
    pub service: Arc<AuthService>,
    pub cookies: SessionCookieSettings,
}

pub fn auth_router(state: AuthApiState, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CredentialsPayload {
    email: String,
    password: String,
}

fn session_cookie(
    settings: &SessionCookieSettings,
    session: &AuthenticatedSession,
) -> Cookie<'static> {
    let mut cookie = Cookie::new(settings.name.clone(), session.token.value().to_string());
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(settings.secure);
    cookie.set_path("/");
    cookie.set_max_age(time::Duration::minutes(settings.ttl_minutes));
    if let Some(domain) = &settings.domain {
        cookie.set_domain(domain.clone());
    }
    cookie
}

fn removal_cookie(settings: &SessionCookieSettings) -> Cookie<'static> {
    let mut cookie = Cookie::new(settings.name.clone(), "");
    cookie.set_path("/");
    if let Some(domain) = &settings.domain {
        cookie.set_domain(domain.clone());
    }
    cookie
}

async fn register(
    State(state): State<AuthApiState>,
    jar: CookieJar,
    Json(payload): Json<CredentialsPayload>,
) -> Result<(StatusCode, CookieJar, Json<SessionResponse>), AuthApiError> {
    let request = RegistrationRequest::new(&payload.email, &payload.password)
        .map_err(|error| AuthApiError::Validation(error.to_string()))?;
    let session = state.service.register(request).await?;

    let jar = jar.add(session_cookie(&state.cookies, &session));
    Ok((
        StatusCode::CREATED,
        jar,
        Json(SessionResponse {
            user_id: session.user_id,
            expires_at: session.expires_at,
        }),
    ))
}

async fn login(
    State(state): State<AuthApiState>,
    jar: CookieJar,
    Json(payload): Json<CredentialsPayload>,
) -> Result<(StatusCode, CookieJar, Json<SessionResponse>), AuthApiError> {
    let request = LoginRequest::new(&payload.email, &payload.password)
        .map_err(|error| AuthApiError::Validation(error.to_string()))?;
    let session = state.service.login(request).await?;

    let jar = jar.add(session_cookie(&state.cookies, &session));
    Ok((
        StatusCode::OK,
        jar,
        Json(SessionResponse {
            user_id: session.user_id,
            expires_at: session.expires_at,
        }),
    ))
}

/// Always succeeds: revoking an unknown or absent token is a no-op.
async fn logout(
    State(state): State<AuthApiState>,
    jar: CookieJar,
) -> Result<(StatusCode, CookieJar), AuthApiError> {
    if let Some(cookie) = jar.get(&state.cookies.name) {
        let token = SessionToken::new(cookie.value().to_string());
        state.service.logout(token).await?;
    }
    let jar = jar.remove(removal_cookie(&state.cookies));
    Ok((StatusCode::NO_CONTENT, jar))
}

#[derive(Debug)]
pub enum AuthApiError {
    Validation(String),
    InvalidCredentials,
    DuplicateEmail,
    Internal,
}

impl From<AuthError> for AuthApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::UserAlreadyExists(_) => AuthApiError::DuplicateEmail,
            AuthError::InvalidCredentials => AuthApiError::InvalidCredentials,
            AuthError::Infra(cause) => {
                error!(error = %cause, "auth infrastructure failure");
                AuthApiError::Internal
            }
        }
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::Validation(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            AuthApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
            }
            AuthApiError::DuplicateEmail => {
                (StatusCode::CONFLICT, "Email already registered".to_string())
            }
            AuthApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };
        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::InMemorySessionStore;
    use crate::auth::storage::SqliteAuthStore;
    use crate::store::init_schema;
    use chrono::Duration;
    use tempfile::NamedTempFile;

    fn state() -> (AuthApiState, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        init_schema(&path).unwrap();

        let store = Arc::new(SqliteAuthStore::new(path));
        let sessions = Arc::new(InMemorySessionStore::new(Duration::minutes(30)));
        let service = Arc::new(AuthService::new(
            store.clone(),
            store,
            sessions,
            1_000_000.0,
            "USD",
        ));
        (
            AuthApiState {
                service,
                cookies: SessionCookieSettings {
                    name: "tradeboard_session".to_string(),
                    secure: false,
                    domain: None,
                    ttl_minutes: 30,
                },
            },
            file,
        )
    }

    fn credentials(email: &str, password: &str) -> Json<CredentialsPayload> {
        Json(CredentialsPayload {
            email: email.to_string(),
            password: password.to_string(),
        })
    }

    #[tokio::test]
    async fn register_sets_a_hardened_session_cookie() {
        let (state, _file) = state();
        let (status, jar, Json(body)) = register(
            State(state.clone()),
            CookieJar::new(),
            credentials("alice@ex.com", "P4ssw0rd!"),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert!(!body.user_id.is_empty());

        let cookie = jar.get("tradeboard_session").unwrap();
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.value().len(), 64);
    }

    #[tokio::test]
    async fn register_rejects_malformed_email_with_validation_error() {
        let (state, _file) = state();
        let error = register(
            State(state),
            CookieJar::new(),
            credentials("not-an-email", "P4ssw0rd!"),
        )
        .await
        .unwrap_err();

        assert!(matches!(error, AuthApiError::Validation(_)));
    }

    #[tokio::test]
    async fn duplicate_registration_maps_to_conflict() {
        let (state, _file) = state();
        register(
            State(state.clone()),
            CookieJar::new(),
            credentials("alice@ex.com", "P4ssw0rd!"),
        )
        .await
        .unwrap();

        let error = register(
            State(state),
            CookieJar::new(),
            credentials("alice@ex.com", "P4ssw0rd!"),
        )
        .await
        .unwrap_err();
        assert!(matches!(error, AuthApiError::DuplicateEmail));
    }

    #[tokio::test]
    async fn login_issues_a_fresh_session_for_the_same_user() {
        let (state, _file) = state();
        let (_, register_jar, Json(registered)) = register(
            State(state.clone()),
            CookieJar::new(),
            credentials("alice@ex.com", "P4ssw0rd!"),
        )
        .await
        .unwrap();

        let (status, login_jar, Json(logged_in)) = login(
            State(state),
            CookieJar::new(),
            credentials("alice@ex.com", "P4ssw0rd!"),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(logged_in.user_id, registered.user_id);
        assert_ne!(
            register_jar.get("tradeboard_session").unwrap().value(),
            login_jar.get("tradeboard_session").unwrap().value(),
        );
    }

    #[tokio::test]
    async fn wrong_password_maps_to_unauthorized() {
        let (state, _file) = state();
        register(
            State(state.clone()),
            CookieJar::new(),
            credentials("alice@ex.com", "P4ssw0rd!"),
        )
        .await
        .unwrap();

        let error = login(
            State(state),
            CookieJar::new(),
            credentials("alice@ex.com", "wrong-password"),
        )
        .await
        .unwrap_err();
        assert!(matches!(error, AuthApiError::InvalidCredentials));
    }

    #[tokio::test]
    async fn logout_without_a_cookie_still_succeeds() {
        let (state, _file) = state();
        let (status, _jar) = logout(State(state), CookieJar::new()).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[test]
    fn api_errors_map_onto_the_contract_statuses() {
        assert_eq!(
            AuthApiError::Validation("bad".into())
                .into_response()
                .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AuthApiError::InvalidCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthApiError::DuplicateEmail.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AuthApiError::Internal.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
