//! Credential Middleware
//!
//! Middleware for requiring a valid access token on protected routes.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use kernel::id::UserId;

use crate::application::stack::CredentialStack;
use crate::error::{AuthError, AuthResult};
use crate::presentation::handlers::AuthAppState;

/// Subject of a verified access token, inserted as a request extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

/// Reject the request unless it carries a valid access token
///
/// The token is read from `Authorization: Bearer` first, then from the
/// access-token cookie.
pub async fn require_access_token<K: CredentialStack>(
    State(state): State<AuthAppState<K>>,
    mut req: Request,
    next: Next,
) -> AuthResult<Response> {
    let token = bearer_token(req.headers())
        .or_else(|| cookie_token(req.headers(), &state.config.cookie_name))
        .ok_or(AuthError::InvalidToken)?;

    let user_id = state.tokens.authenticate_jwt(&token)?;
    req.extensions_mut().insert(AuthenticatedUser(user_id));

    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn cookie_token(headers: &HeaderMap, name: &str) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}
