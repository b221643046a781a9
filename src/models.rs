use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Persisted Records ---

/// User
///
/// Account record from the `users` table. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    // Stored lowercased; unique.
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// City
///
/// A city saved by a user, from the `cities` table.
/// `(user_id, normalized_name, country)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct City {
    pub id: Uuid,
    // Owner.
    pub user_id: Uuid,
    // Display name as resolved by the geocoder (e.g. "São Paulo").
    pub name: String,
    // Trimmed, lowercased name typed by the user; part of the uniqueness key.
    pub normalized_name: String,
    // ISO 3166-1 alpha-2, uppercase.
    pub country: Option<String>,
    pub is_favorite: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// NewCity
///
/// Insert payload assembled by the city service after geocode validation.
#[derive(Debug, Clone)]
pub struct NewCity {
    pub user_id: Uuid,
    pub name: String,
    pub normalized_name: String,
    pub country: Option<String>,
}

// --- Request Payloads ---

/// RegisterRequest
///
/// Input payload for `POST /auth/register`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    pub password: String,
}

/// LoginRequest
///
/// Input payload for `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// CreateCityRequest
///
/// Input payload for `POST /cities`. The country code is optional but required
/// to disambiguate names that exist in several countries.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCityRequest {
    #[schema(example = "Paris")]
    pub name: String,
    #[schema(example = "FR")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// FavoriteRequest
///
/// Input payload for `PATCH /cities/{id}/favorite`. Sets the flag to the given
/// value rather than flipping it, so repeated calls converge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct FavoriteRequest {
    pub favorite: bool,
}

/// AskRequest
///
/// Input payload for `POST /ai/ask`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AskRequest {
    #[schema(example = "Where is it warmest right now?")]
    pub question: String,
}

// --- Response Schemas ---

/// UserProfile
///
/// Public view of a user account (`GET /me`, auth responses).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

/// AuthResponse
///
/// Returned by registration and login: a bearer token plus the account profile.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

/// CitySuggestion
///
/// One geocoder candidate offered while the user types a city name.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct CitySuggestion {
    pub name: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

/// WeatherReport
///
/// Current conditions for a saved city in metric units, remapped from the
/// provider's payload into a flat shape.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct WeatherReport {
    pub city: String,
    pub country: Option<String>,
    // °C
    pub temperature: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    // %
    pub humidity: u8,
    // hPa
    pub pressure: u32,
    // m/s
    pub wind_speed: f64,
    pub description: String,
    pub icon: String,
    #[ts(type = "string")]
    pub observed_at: DateTime<Utc>,
}

/// AnswerSource
///
/// Where an assistant answer came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum AnswerSource {
    Ai,
    Heuristic,
}

/// AskResponse
///
/// Assistant answer plus the cities whose weather fed the prompt.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AskResponse {
    pub answer: String,
    pub source: AnswerSource,
    pub cities: Vec<String>,
}
