//! Saved-city management: geocode-validated inserts, favorites, deletion,
//! name suggestions and per-city weather.

use std::collections::HashSet;

use uuid::Uuid;

use crate::{
    error::AppError,
    models::{City, CitySuggestion, CreateCityRequest, NewCity, WeatherReport},
    repository::{Repository, RepositoryError},
    weather::{GeoCandidate, WeatherService},
};

/// Candidates requested from the geocoder per lookup.
const GEOCODE_LIMIT: u8 = 5;
/// Shorter suggestion queries return nothing without calling out.
const MIN_SUGGEST_LEN: usize = 2;
const CITY_NOT_FOUND: &str = "City not found";

/// Trims and lowercases a city name. Empty names are rejected.
pub fn normalize_name(name: &str) -> Result<String, AppError> {
    let normalized = name.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(AppError::bad_request("City name is required"));
    }
    Ok(normalized)
}

/// Validates an optional ISO 3166-1 alpha-2 code and uppercases it.
/// Blank input counts as absent.
pub fn validate_country(country: Option<&str>) -> Result<Option<String>, AppError> {
    let Some(code) = country.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(None);
    };
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::bad_request(
            "Country must be a two-letter ISO code",
        ));
    }
    Ok(Some(code.to_ascii_uppercase()))
}

fn matches_typed_name(candidate: &GeoCandidate, normalized: &str) -> bool {
    candidate.name.to_lowercase() == normalized
        || candidate
            .english_name()
            .is_some_and(|en| en.to_lowercase() == normalized)
}

/// Picks the geocoder candidate for a typed name.
///
/// Only exact (case-insensitive) name matches count. With a country, only
/// candidates from that country count. Without one, matches spanning more than
/// one country are ambiguous.
pub fn pick_candidate(
    candidates: Vec<GeoCandidate>,
    normalized: &str,
    country: Option<&str>,
) -> Result<GeoCandidate, AppError> {
    let matches: Vec<GeoCandidate> = candidates
        .into_iter()
        .filter(|c| matches_typed_name(c, normalized))
        .filter(|c| country.is_none_or(|code| c.country.eq_ignore_ascii_case(code)))
        .collect();

    let countries: HashSet<String> = matches.iter().map(|c| c.country.to_uppercase()).collect();
    if countries.len() > 1 {
        return Err(AppError::bad_request(
            "Ambiguous city name; please specify a country code",
        ));
    }

    matches
        .into_iter()
        .next()
        .ok_or(AppError::NotFound(CITY_NOT_FOUND))
}

/// Looks the typed name up with the geocoder and picks the matching place.
pub async fn resolve_city(
    weather: &dyn WeatherService,
    name: &str,
    normalized: &str,
    country: Option<&str>,
) -> Result<GeoCandidate, AppError> {
    let query = match country {
        Some(code) => format!("{},{}", name.trim(), code),
        None => name.trim().to_string(),
    };
    let candidates = weather.geocode(&query, GEOCODE_LIMIT).await?;
    pick_candidate(candidates, normalized, country)
}

/// create_city
///
/// Country validation happens before any external call.
pub async fn create_city(
    repo: &dyn Repository,
    weather: &dyn WeatherService,
    owner: Uuid,
    req: CreateCityRequest,
) -> Result<City, AppError> {
    let normalized = normalize_name(&req.name)?;
    let country = validate_country(req.country.as_deref())?;

    let resolved = resolve_city(weather, &req.name, &normalized, country.as_deref()).await?;
    let country = country.or_else(|| Some(resolved.country.to_uppercase()));
    // Key on the resolved place so native names and exonyms collide.
    let normalized = normalize_name(&resolved.name)?;

    if repo
        .find_city(owner, &normalized, country.as_deref())
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("City already saved"));
    }

    let new_city = NewCity {
        user_id: owner,
        name: resolved.name,
        normalized_name: normalized,
        country,
    };
    match repo.create_city(new_city).await {
        Ok(city) => {
            tracing::info!(city_id = %city.id, user_id = %owner, name = %city.name, "city saved");
            Ok(city)
        }
        Err(RepositoryError::Duplicate) => Err(AppError::Conflict("City already saved")),
        Err(e) => Err(e.into()),
    }
}

pub async fn list_cities(repo: &dyn Repository, owner: Uuid) -> Result<Vec<City>, AppError> {
    Ok(repo.list_cities(owner).await?)
}

/// Sets the favorite flag to `favorite`; repeating the call is a no-op.
pub async fn set_favorite(
    repo: &dyn Repository,
    owner: Uuid,
    id: Uuid,
    favorite: bool,
) -> Result<City, AppError> {
    repo.set_favorite(id, owner, favorite)
        .await?
        .ok_or(AppError::NotFound(CITY_NOT_FOUND))
}

pub async fn delete_city(repo: &dyn Repository, owner: Uuid, id: Uuid) -> Result<(), AppError> {
    if repo.delete_city(id, owner).await? {
        tracing::info!(city_id = %id, user_id = %owner, "city deleted");
        Ok(())
    } else {
        Err(AppError::NotFound(CITY_NOT_FOUND))
    }
}

/// suggest
///
/// Geocoder candidates for a partial name, deduplicated by (name, state, country).
pub async fn suggest(
    weather: &dyn WeatherService,
    query: &str,
) -> Result<Vec<CitySuggestion>, AppError> {
    let query = query.trim();
    if query.chars().count() < MIN_SUGGEST_LEN {
        return Ok(Vec::new());
    }

    let candidates = weather.geocode(query, GEOCODE_LIMIT).await?;
    let mut seen = HashSet::new();
    Ok(candidates
        .into_iter()
        .filter(|c| seen.insert((c.name.clone(), c.state.clone(), c.country.clone())))
        .map(|c| CitySuggestion {
            name: c.name,
            country: c.country,
            state: c.state,
            lat: c.lat,
            lon: c.lon,
        })
        .collect())
}

/// Current weather for one of the owner's saved cities.
pub async fn city_weather(
    repo: &dyn Repository,
    weather: &dyn WeatherService,
    owner: Uuid,
    id: Uuid,
) -> Result<WeatherReport, AppError> {
    let city = repo
        .get_city(id, owner)
        .await?
        .ok_or(AppError::NotFound(CITY_NOT_FOUND))?;
    Ok(weather
        .current_weather(&city.name, city.country.as_deref())
        .await?)
}
