//! Service Layer
//!
//! Business rules between the HTTP handlers and the repository / outbound
//! clients. Services take trait objects, never the whole `AppState`, so each
//! one can be exercised with the in-memory store and the mock clients.

/// Registration and credential checks.
pub mod accounts;

/// Saved cities, suggestions and per-city weather.
pub mod cities;

/// Assistant answers over the user's saved cities.
pub mod insights;
