use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use weather_dashboard::{
    AppState, GeminiClient, InMemoryRepository, OpenWeatherClient, PostgresRepository,
    RepositoryState,
    assistant::InsightState,
    config::{AppConfig, Env},
    create_router,
    weather::WeatherState,
};

/// main
///
/// Loads configuration, sets up logging, connects the store and the outbound
/// clients, then serves HTTP until the process is stopped.
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    // Fails fast on missing production secrets.
    let config = AppConfig::load();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "weather_dashboard=debug,tower_http=info".into());

    // Pretty logs for local debugging, JSON for log aggregation in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    let repo: RepositoryState = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("FATAL: Failed to run database migrations.");
            Arc::new(PostgresRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store (data is lost on exit)");
            Arc::new(InMemoryRepository::new())
        }
    };

    if config.openweather_api_key.is_none() {
        tracing::warn!("OPENWEATHER_API_KEY not set; city and weather lookups will fail");
    }
    let weather: WeatherState = Arc::new(
        OpenWeatherClient::new(
            &config.openweather_base_url,
            config.openweather_api_key.clone(),
        )
        .expect("FATAL: Failed to build the weather HTTP client."),
    );

    if config.gemini_api_key.is_none() {
        tracing::info!("GEMINI_API_KEY not set; assistant answers use the local heuristic");
    }
    let insight: InsightState = Arc::new(
        GeminiClient::new(
            &config.gemini_base_url,
            &config.gemini_model,
            config.gemini_api_key.clone(),
        )
        .expect("FATAL: Failed to build the assistant HTTP client."),
    );

    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState {
        repo,
        weather,
        insight,
        config,
    });

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
