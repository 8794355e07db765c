//! HTTP Handlers

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::WithRejection;
use chrono::Utc;

use crate::application::config::AuthConfig;
use crate::application::stack::CredentialStack;
use crate::application::token_service::TokenService;
use crate::application::user_directory::UserDirectory;
use crate::domain::entity::token::{Token, TokenPair};
use crate::domain::entity::user::UserProfile;
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{
    LoginRequest, RefreshTokenRequest, RegisterRequest, RegisterResponse, TokenResponse,
};
use crate::presentation::middleware::AuthenticatedUser;

/// Shared state for credential handlers
pub struct AuthAppState<K: CredentialStack> {
    pub users: Arc<UserDirectory<K>>,
    pub tokens: Arc<TokenService<K>>,
    pub config: Arc<AuthConfig>,
}

impl<K: CredentialStack> Clone for AuthAppState<K> {
    fn clone(&self) -> Self {
        Self {
            users: Arc::clone(&self.users),
            tokens: Arc::clone(&self.tokens),
            config: Arc::clone(&self.config),
        }
    }
}

impl<K: CredentialStack> AuthAppState<K> {
    pub fn new(users: Arc<UserDirectory<K>>, tokens: Arc<TokenService<K>>) -> Self {
        let config = Arc::clone(tokens.config());
        Self {
            users,
            tokens,
            config,
        }
    }
}

// ============================================================================
// Register
// ============================================================================

/// POST /auth/register
pub async fn register<K: CredentialStack>(
    State(state): State<AuthAppState<K>>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, AuthError>,
) -> AuthResult<impl IntoResponse> {
    req.validate()?;

    let (user, pair) = state
        .users
        .register(&req.username, &req.email, &req.password)
        .await?;

    let cookie = build_access_cookie(&state.config, &pair.access_token);

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(RegisterResponse {
            user_id: user.id,
            tokens: TokenResponse::from(&pair),
        }),
    ))
}

// ============================================================================
// Login
// ============================================================================

/// POST /auth/login
pub async fn login<K: CredentialStack>(
    State(state): State<AuthAppState<K>>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, AuthError>,
) -> AuthResult<impl IntoResponse> {
    req.validate()?;

    let (_, pair) = state.users.login(&req.login, &req.password).await?;

    Ok(token_response(&state.config, &pair))
}

// ============================================================================
// Refresh
// ============================================================================

/// POST /auth/refresh
pub async fn refresh<K: CredentialStack>(
    State(state): State<AuthAppState<K>>,
    WithRejection(Json(req), _): WithRejection<Json<RefreshTokenRequest>, AuthError>,
) -> AuthResult<impl IntoResponse> {
    req.validate()?;

    let pair = state.tokens.refresh_jwt(&req.refresh_token).await?;

    Ok(token_response(&state.config, &pair))
}

// ============================================================================
// Logout
// ============================================================================

/// POST /auth/logout
pub async fn logout<K: CredentialStack>(
    State(state): State<AuthAppState<K>>,
    WithRejection(Json(req), _): WithRejection<Json<RefreshTokenRequest>, AuthError>,
) -> AuthResult<impl IntoResponse> {
    req.validate()?;

    state.tokens.logout_jwt(&req.refresh_token).await?;

    let cookie = build_clear_cookie(&state.config);

    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]))
}

// ============================================================================
// Current User (requires access token)
// ============================================================================

/// GET /users/me
pub async fn me<K: CredentialStack>(
    State(state): State<AuthAppState<K>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
) -> AuthResult<Json<UserProfile>> {
    let profile = state.users.get(user_id).await?;
    Ok(Json(profile))
}

// ============================================================================
// Helpers
// ============================================================================

fn token_response(config: &AuthConfig, pair: &TokenPair) -> Response {
    let cookie = build_access_cookie(config, &pair.access_token);

    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(TokenResponse::from(pair)),
    )
        .into_response()
}

fn build_access_cookie(config: &AuthConfig, token: &Token) -> String {
    let max_age = (token.expires_at - Utc::now()).num_seconds().max(0);

    let mut parts = vec![
        format!("{}={}", config.cookie_name, token.token),
        "HttpOnly".to_string(),
        "Path=/".to_string(),
        format!("Max-Age={max_age}"),
    ];

    if config.cookie_secure {
        parts.push("Secure".to_string());
    }

    parts.push(format!("SameSite={}", config.cookie_same_site.as_str()));

    parts.join("; ")
}

fn build_clear_cookie(config: &AuthConfig) -> String {
    let mut parts = vec![
        format!("{}=", config.cookie_name),
        "HttpOnly".to_string(),
        "Path=/".to_string(),
        "Max-Age=0".to_string(),
        "Expires=Thu, 01 Jan 1970 00:00:00 GMT".to_string(),
    ];

    if config.cookie_secure {
        parts.push("Secure".to_string());
    }

    parts.push(format!("SameSite={}", config.cookie_same_site.as_str()));

    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_access_cookie_attributes() {
        let config = AuthConfig::with_random_secret();
        let token = Token {
            token: "abc".into(),
            expires_at: Utc::now() + Duration::minutes(15),
        };

        let cookie = build_access_cookie(&config, &token);
        assert!(cookie.starts_with("Authorization=abc; HttpOnly; Path=/; Max-Age="));
        assert!(cookie.contains("Secure"));
        assert!(cookie.ends_with("SameSite=Lax"));
    }

    #[test]
    fn test_expired_token_cookie_has_zero_max_age() {
        let config = AuthConfig::development();
        let token = Token {
            token: "abc".into(),
            expires_at: Utc::now() - Duration::minutes(1),
        };

        let cookie = build_access_cookie(&config, &token);
        assert!(cookie.contains("Max-Age=0"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn test_clear_cookie() {
        let cookie = build_clear_cookie(&AuthConfig::development());
        assert!(cookie.starts_with("Authorization=; "));
        assert!(cookie.contains("Max-Age=0"));
    }
}
