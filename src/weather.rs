use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

use crate::{error::AppError, models::WeatherReport};

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// WeatherError
///
/// Failures from the weather provider.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("weather API key is not configured")]
    MissingApiKey,
    #[error("provider has no data for the requested location")]
    NotFound,
    #[error("provider returned status {0}")]
    Status(StatusCode),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("simulated failure")]
    Simulated,
}

impl From<WeatherError> for AppError {
    fn from(err: WeatherError) -> Self {
        match err {
            WeatherError::NotFound => AppError::NotFound("Weather data not found"),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

/// GeoCandidate
///
/// One match from the provider's direct-geocoding endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct GeoCandidate {
    pub name: String,
    #[serde(default)]
    pub local_names: HashMap<String, String>,
    pub lat: f64,
    pub lon: f64,
    pub country: String,
    #[serde(default)]
    pub state: Option<String>,
}

impl GeoCandidate {
    /// English exonym if the provider knows one ("Munich" for "München").
    pub fn english_name(&self) -> Option<&str> {
        self.local_names.get("en").map(String::as_str)
    }
}

/// WeatherService Contract
///
/// Outbound weather calls. The real implementation talks to OpenWeather; the
/// mock serves canned data for handler and service tests.
#[async_trait]
pub trait WeatherService: Send + Sync {
    /// Resolves a free-text query (`"Paris"` or `"Paris,FR"`) to at most `limit` candidates.
    async fn geocode(&self, query: &str, limit: u8) -> Result<Vec<GeoCandidate>, WeatherError>;

    /// Current conditions for a named city, metric units.
    async fn current_weather(
        &self,
        city: &str,
        country: Option<&str>,
    ) -> Result<WeatherReport, WeatherError>;
}

/// WeatherState
///
/// Shared handle to the weather provider.
pub type WeatherState = Arc<dyn WeatherService>;

// --- OpenWeather payloads (only the fields we read) ---

#[derive(Debug, Deserialize)]
struct OwCurrent {
    name: String,
    #[serde(default)]
    sys: Option<OwSys>,
    main: OwMain,
    #[serde(default)]
    wind: Option<OwWind>,
    #[serde(default)]
    weather: Vec<OwCondition>,
    dt: i64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    pressure: u32,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCondition {
    description: String,
    icon: String,
}

impl From<OwCurrent> for WeatherReport {
    fn from(raw: OwCurrent) -> Self {
        let condition = raw.weather.into_iter().next();
        Self {
            city: raw.name,
            country: raw.sys.and_then(|s| s.country),
            temperature: raw.main.temp,
            feels_like: raw.main.feels_like,
            temp_min: raw.main.temp_min,
            temp_max: raw.main.temp_max,
            humidity: raw.main.humidity,
            pressure: raw.main.pressure,
            wind_speed: raw.wind.map(|w| w.speed).unwrap_or_default(),
            description: condition
                .as_ref()
                .map(|c| c.description.clone())
                .unwrap_or_default(),
            icon: condition.map(|c| c.icon).unwrap_or_default(),
            observed_at: DateTime::<Utc>::from_timestamp(raw.dt, 0).unwrap_or_else(Utc::now),
        }
    }
}

/// OpenWeatherClient
///
/// `WeatherService` over the OpenWeather HTTP API. The base URL is
/// configurable so tests can point it at a local mock server.
#[derive(Clone)]
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenWeatherClient {
    /// Builds the client with a fixed request timeout.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn key(&self) -> Result<&str, WeatherError> {
        self.api_key.as_deref().ok_or(WeatherError::MissingApiKey)
    }
}

#[async_trait]
impl WeatherService for OpenWeatherClient {
    async fn geocode(&self, query: &str, limit: u8) -> Result<Vec<GeoCandidate>, WeatherError> {
        let key = self.key()?;
        let limit = limit.to_string();
        let response = self
            .client
            .get(format!("{}/geo/1.0/direct", self.base_url))
            .query(&[("q", query), ("limit", limit.as_str()), ("appid", key)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status(status));
        }
        Ok(response.json::<Vec<GeoCandidate>>().await?)
    }

    async fn current_weather(
        &self,
        city: &str,
        country: Option<&str>,
    ) -> Result<WeatherReport, WeatherError> {
        let key = self.key()?;
        let query = match country {
            Some(code) => format!("{city},{code}"),
            None => city.to_string(),
        };
        let response = self
            .client
            .get(format!("{}/data/2.5/weather", self.base_url))
            .query(&[("q", query.as_str()), ("units", "metric"), ("appid", key)])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(WeatherError::NotFound),
            status if !status.is_success() => Err(WeatherError::Status(status)),
            _ => Ok(response.json::<OwCurrent>().await?.into()),
        }
    }
}

/// MockWeatherService
///
/// Canned provider for tests. Reports are keyed by lowercased city name.
/// `calls` counts every request so tests can assert that validation failed
/// before anything went out.
#[derive(Default)]
pub struct MockWeatherService {
    pub candidates: Vec<GeoCandidate>,
    pub reports: HashMap<String, WeatherReport>,
    pub should_fail: bool,
    calls: AtomicUsize,
}

impl MockWeatherService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn with_candidate(mut self, name: &str, country: &str, state: Option<&str>) -> Self {
        self.candidates.push(GeoCandidate {
            name: name.to_string(),
            local_names: HashMap::new(),
            lat: 0.0,
            lon: 0.0,
            country: country.to_string(),
            state: state.map(str::to_string),
        });
        self
    }

    /// Adds a fully specified candidate (local names included).
    pub fn with_geo_candidate(mut self, candidate: GeoCandidate) -> Self {
        self.candidates.push(candidate);
        self
    }

    pub fn with_report(mut self, city: &str, country: &str, temperature: f64, description: &str) -> Self {
        self.reports.insert(
            city.to_lowercase(),
            WeatherReport {
                city: city.to_string(),
                country: Some(country.to_string()),
                temperature,
                feels_like: temperature,
                temp_min: temperature - 1.0,
                temp_max: temperature + 1.0,
                humidity: 50,
                pressure: 1013,
                wind_speed: 3.0,
                description: description.to_string(),
                icon: "01d".to_string(),
                observed_at: Utc::now(),
            },
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherService for MockWeatherService {
    async fn geocode(&self, query: &str, limit: u8) -> Result<Vec<GeoCandidate>, WeatherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(WeatherError::Simulated);
        }
        let wanted = query.split(',').next().unwrap_or_default().trim().to_lowercase();
        Ok(self
            .candidates
            .iter()
            .filter(|c| {
                c.name.to_lowercase().starts_with(&wanted)
                    || c.english_name()
                        .is_some_and(|en| en.to_lowercase().starts_with(&wanted))
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn current_weather(
        &self,
        city: &str,
        _country: Option<&str>,
    ) -> Result<WeatherReport, WeatherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(WeatherError::Simulated);
        }
        self.reports
            .get(&city.to_lowercase())
            .cloned()
            .ok_or(WeatherError::NotFound)
    }
}
