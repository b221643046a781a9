use std::env;

/// Local fallback for the token signing secret. Never used in production.
const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

/// Default token lifetime (24 hours).
const DEFAULT_JWT_TTL_SECS: u64 = 60 * 60 * 24;

/// Longest accepted token lifetime (one year).
pub const MAX_JWT_TTL_SECS: u64 = 60 * 60 * 24 * 365;

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and
/// pulled into handlers and extractors through `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Postgres connection string. `None` selects the in-memory store (local only).
    pub db_url: Option<String>,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Runtime environment marker.
    pub env: Env,
    // Secret used to sign and validate bearer tokens (HS256).
    pub jwt_secret: String,
    // Fixed token lifetime in seconds.
    pub jwt_ttl_secs: u64,
    // OpenWeather credentials and endpoint (geocoding + current weather).
    pub openweather_api_key: Option<String>,
    pub openweather_base_url: String,
    // Generative-language API used by the assistant. No key means heuristic answers only.
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
}

/// Env
///
/// Defines the runtime context: local development (pretty logs, in-memory store
/// allowed, secret fallbacks) or production (JSON logs, every secret mandatory).
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Safe, non-panicking values for test state setup.
    fn default() -> Self {
        Self {
            db_url: None,
            bind_addr: "127.0.0.1:3000".to_string(),
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            jwt_ttl_secs: DEFAULT_JWT_TTL_SECS,
            openweather_api_key: None,
            openweather_base_url: "https://api.openweathermap.org".to_string(),
            gemini_api_key: None,
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            gemini_model: "gemini-1.5-flash".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from environment variables and fails fast.
    ///
    /// # Panics
    /// Panics in production when `DATABASE_URL`, `JWT_SECRET` or
    /// `OPENWEATHER_API_KEY` is missing or blank, and anywhere when
    /// `JWT_TTL_SECS` is not an integer between 1 and `MAX_JWT_TTL_SECS`.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };
        let defaults = Self::default();

        let jwt_secret = match env {
            Env::Production => non_empty_var("JWT_SECRET")
                .expect("FATAL: JWT_SECRET must be set in production."),
            Env::Local => {
                non_empty_var("JWT_SECRET").unwrap_or_else(|| LOCAL_JWT_SECRET.to_string())
            }
        };

        let jwt_ttl_secs = match env::var("JWT_TTL_SECS") {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if (1..=MAX_JWT_TTL_SECS).contains(&secs) => secs,
                _ => panic!(
                    "FATAL: JWT_TTL_SECS must be between 1 and {MAX_JWT_TTL_SECS}, got {raw:?}"
                ),
            },
            Err(_) => DEFAULT_JWT_TTL_SECS,
        };

        let db_url = non_empty_var("DATABASE_URL");
        let openweather_api_key = non_empty_var("OPENWEATHER_API_KEY");

        if env == Env::Production {
            assert!(db_url.is_some(), "FATAL: DATABASE_URL required in prod");
            assert!(
                openweather_api_key.is_some(),
                "FATAL: OPENWEATHER_API_KEY required in prod"
            );
        }

        Self {
            db_url,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| match env {
                Env::Production => "0.0.0.0:3000".to_string(),
                Env::Local => defaults.bind_addr.clone(),
            }),
            env,
            jwt_secret,
            jwt_ttl_secs,
            openweather_api_key,
            openweather_base_url: env::var("OPENWEATHER_BASE_URL")
                .unwrap_or(defaults.openweather_base_url),
            gemini_api_key: non_empty_var("GEMINI_API_KEY"),
            gemini_base_url: env::var("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            gemini_model: env::var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
