//! Credential Router

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::application::stack::CredentialStack;
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::require_access_token;

/// Create the credential router for any store wiring
///
/// Routes are relative; the caller nests them under its API prefix.
pub fn credential_router<K: CredentialStack>(state: AuthAppState<K>) -> Router {
    let auth = Router::new()
        .route("/register", post(handlers::register::<K>))
        .route("/login", post(handlers::login::<K>))
        .route("/refresh", post(handlers::refresh::<K>))
        .route("/logout", post(handlers::logout::<K>));

    let users = Router::new()
        .route("/me", get(handlers::me::<K>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_access_token::<K>,
        ));

    Router::new()
        .nest("/auth", auth)
        .nest("/users", users)
        .with_state(state)
}
