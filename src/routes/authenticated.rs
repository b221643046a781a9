use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, patch, post},
};

/// Authenticated Router Module
///
/// Every route here sits behind the `auth_middleware` route layer, and each
/// handler also takes `AuthUser` to scope its work to the caller. City routes
/// never reveal whether another user's city exists: foreign ids answer 404.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        .route("/me", get(handlers::get_me))
        // GET/POST /cities
        // List saved cities (favorites first) or save a geocode-validated one.
        .route(
            "/cities",
            get(handlers::list_cities).post(handlers::create_city),
        )
        // GET /cities/suggest?q=...
        // Type-ahead suggestions straight from the geocoder.
        .route("/cities/suggest", get(handlers::suggest_cities))
        // DELETE /cities/{id}
        .route("/cities/{id}", delete(handlers::delete_city))
        // PATCH /cities/{id}/favorite
        // Sets (not flips) the flag, so retries are harmless.
        .route("/cities/{id}/favorite", patch(handlers::set_favorite))
        // GET /cities/{id}/weather
        .route("/cities/{id}/weather", get(handlers::get_city_weather))
        // POST /ai/ask
        .route("/ai/ask", post(handlers::ask_assistant))
}
