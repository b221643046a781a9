use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a bearer token: the health probe and the
/// credential exchange routes that hand tokens out.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/register
        // Creates an account; answers 409 when the email is taken.
        .route("/auth/register", post(handlers::register_user))
        // POST /auth/login
        // Exchanges credentials for a token; wrong email and wrong password look identical.
        .route("/auth/login", post(handlers::login_user))
}
