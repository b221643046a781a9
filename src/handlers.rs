use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiJson, AppError, ErrorBody},
    models::{
        AskRequest, AskResponse, AuthResponse, City, CitySuggestion, CreateCityRequest,
        FavoriteRequest, LoginRequest, RegisterRequest, UserProfile, WeatherReport,
    },
    services::{accounts, cities, insights},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

// --- Query Structs ---

/// SuggestQuery
///
/// Query parameters for `GET /cities/suggest`.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct SuggestQuery {
    /// Partial city name; fewer than two characters yields an empty list.
    #[serde(default)]
    pub q: String,
}

// --- Public Handlers ---

/// register_user
///
/// [Public Route] Creates an account and returns a bearer token for it.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let response = accounts::register(state.repo.as_ref(), &state.config, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// login_user
///
/// [Public Route] Exchanges email and password for a bearer token.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid email or password", body = ErrorBody)
    )
)]
pub async fn login_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let response = accounts::login(state.repo.as_ref(), &state.config, payload).await?;
    Ok(Json(response))
}

// --- Authenticated Handlers ---

/// get_me
///
/// [Authenticated Route] Profile of the token's owner.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(AuthUser { id, name, email }: AuthUser) -> Json<UserProfile> {
    Json(UserProfile { id, name, email })
}

/// list_cities
///
/// [Authenticated Route] The caller's saved cities, favorites first.
#[utoipa::path(
    get,
    path = "/cities",
    responses((status = 200, description = "Saved cities", body = [City]))
)]
pub async fn list_cities(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<City>>, AppError> {
    Ok(Json(cities::list_cities(state.repo.as_ref(), id).await?))
}

/// create_city
///
/// [Authenticated Route] Saves a city after resolving the typed name against
/// the geocoder. Ambiguous names need a country code.
#[utoipa::path(
    post,
    path = "/cities",
    request_body = CreateCityRequest,
    responses(
        (status = 201, description = "Saved", body = City),
        (status = 400, description = "Invalid or ambiguous input", body = ErrorBody),
        (status = 404, description = "City not found", body = ErrorBody),
        (status = 409, description = "City already saved", body = ErrorBody)
    )
)]
pub async fn create_city(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateCityRequest>,
) -> Result<(StatusCode, Json<City>), AppError> {
    let city = cities::create_city(state.repo.as_ref(), state.weather.as_ref(), id, payload).await?;
    Ok((StatusCode::CREATED, Json(city)))
}

/// suggest_cities
///
/// [Authenticated Route] Geocoder candidates for a partial name.
#[utoipa::path(
    get,
    path = "/cities/suggest",
    params(SuggestQuery),
    responses((status = 200, description = "Suggestions", body = [CitySuggestion]))
)]
pub async fn suggest_cities(
    _user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SuggestQuery>,
) -> Result<Json<Vec<CitySuggestion>>, AppError> {
    Ok(Json(cities::suggest(state.weather.as_ref(), &query.q).await?))
}

/// delete_city
///
/// [Authenticated Route] Removes one of the caller's cities. Cities owned by
/// someone else answer 404 and are left untouched.
#[utoipa::path(
    delete,
    path = "/cities/{id}",
    params(("id" = Uuid, Path, description = "City ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_city(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    cities::delete_city(state.repo.as_ref(), user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// set_favorite
///
/// [Authenticated Route] Sets the favorite flag to the requested value.
#[utoipa::path(
    patch,
    path = "/cities/{id}/favorite",
    params(("id" = Uuid, Path, description = "City ID")),
    request_body = FavoriteRequest,
    responses(
        (status = 200, description = "Updated", body = City),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn set_favorite(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<FavoriteRequest>,
) -> Result<Json<City>, AppError> {
    let city = cities::set_favorite(state.repo.as_ref(), user_id, id, payload.favorite).await?;
    Ok(Json(city))
}

/// get_city_weather
///
/// [Authenticated Route] Current conditions for one saved city.
#[utoipa::path(
    get,
    path = "/cities/{id}/weather",
    params(("id" = Uuid, Path, description = "City ID")),
    responses(
        (status = 200, description = "Current weather", body = WeatherReport),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 502, description = "Weather service unavailable", body = ErrorBody)
    )
)]
pub async fn get_city_weather(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WeatherReport>, AppError> {
    let report =
        cities::city_weather(state.repo.as_ref(), state.weather.as_ref(), user_id, id).await?;
    Ok(Json(report))
}

/// ask_assistant
///
/// [Authenticated Route] Answers a question about the caller's saved cities.
/// Falls back to a local summary when the generative API is unavailable.
#[utoipa::path(
    post,
    path = "/ai/ask",
    request_body = AskRequest,
    responses(
        (status = 200, description = "Answer", body = AskResponse),
        (status = 400, description = "Invalid question", body = ErrorBody)
    )
)]
pub async fn ask_assistant(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let response = insights::ask(
        state.repo.as_ref(),
        state.weather.as_ref(),
        state.insight.as_ref(),
        id,
        &payload.question,
    )
    .await?;
    Ok(Json(response))
}
