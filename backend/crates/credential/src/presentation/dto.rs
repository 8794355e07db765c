//! API DTOs (Data Transfer Objects)
//!
//! Request bodies validate themselves before reaching the services.

use kernel::id::UserId;
use platform::password::check_policy;
use serde::{Deserialize, Serialize};

use crate::domain::entity::token::TokenPair;
use crate::error::{AuthError, AuthResult};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 20;

// ============================================================================
// Register
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> AuthResult<()> {
        validate_username(&self.username)?;
        validate_email(&self.email)?;
        check_policy(&self.password)
            .map_err(|e| AuthError::Validation(format!("password: {e}")))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterResponse {
    pub user_id: UserId,
    #[serde(flatten)]
    pub tokens: TokenResponse,
}

// ============================================================================
// Login
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Username or email
    pub login: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> AuthResult<()> {
        require("login", &self.login)?;
        require("password", &self.password)
    }
}

// ============================================================================
// Refresh / Logout
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

impl RefreshTokenRequest {
    pub fn validate(&self) -> AuthResult<()> {
        require("refresh_token", &self.refresh_token)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<&TokenPair> for TokenResponse {
    fn from(pair: &TokenPair) -> Self {
        Self {
            access_token: pair.access_token.token.clone(),
            refresh_token: pair.refresh_token.token.clone(),
        }
    }
}

// ============================================================================
// Field rules
// ============================================================================

fn require(field: &str, value: &str) -> AuthResult<()> {
    if value.is_empty() {
        return Err(AuthError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn validate_username(username: &str) -> AuthResult<()> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(AuthError::Validation(format!(
            "username must be {USERNAME_MIN_LEN}-{USERNAME_MAX_LEN} characters"
        )));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AuthError::Validation(
            "username must be alphanumeric".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> AuthResult<()> {
    let invalid = || AuthError::Validation("email is not a valid address".to_string());

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn test_register_accepts_valid_input() {
        assert!(register("alice", "alice@x.com", "password1").validate().is_ok());
        assert!(register("abc", "a@b.co", "12345678").validate().is_ok());
    }

    #[test]
    fn test_register_username_rules() {
        let long = "a".repeat(21);
        for bad in ["ab", "a_b_c", "alice smith", "ålice", long.as_str()] {
            assert!(
                matches!(register(bad, "a@x.com", "password1").validate(), Err(AuthError::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(register(&"a".repeat(20), "a@x.com", "password1").validate().is_ok());
    }

    #[test]
    fn test_register_email_rules() {
        for bad in ["", "alice", "@x.com", "alice@", "alice@x", "a@b@c.com", "a b@x.com", "a@x..com"] {
            assert!(
                register("alice", bad, "password1").validate().is_err(),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_register_password_policy() {
        assert!(register("alice", "a@x.com", "short").validate().is_err());
        assert!(register("alice", "a@x.com", &"p".repeat(129)).validate().is_err());
    }

    #[test]
    fn test_required_fields() {
        let login = LoginRequest {
            login: String::new(),
            password: "x".into(),
        };
        assert!(login.validate().is_err());

        let refresh = RefreshTokenRequest {
            refresh_token: String::new(),
        };
        assert!(refresh.validate().is_err());
    }

    #[test]
    fn test_register_response_is_flat() {
        let response = RegisterResponse {
            user_id: UserId::from_i64(1),
            tokens: TokenResponse {
                access_token: "a".into(),
                refresh_token: "r".into(),
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"user_id": 1, "access_token": "a", "refresh_token": "r"})
        );
    }
}
