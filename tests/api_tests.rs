use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::util::ServiceExt;
use weather_dashboard::{
    AppConfig, AppState, InMemoryRepository, MockInsightService, MockWeatherService,
    create_router,
};

// --- Test Harness ---

struct TestApp {
    router: Router,
    weather: Arc<MockWeatherService>,
}

fn weather_fixture() -> MockWeatherService {
    MockWeatherService::new()
        .with_candidate("Paris", "FR", Some("Ile-de-France"))
        .with_candidate("Paris", "US", Some("Texas"))
        .with_candidate("Lisbon", "PT", None)
        .with_candidate("Oslo", "NO", None)
        .with_report("Lisbon", "PT", 21.0, "clear sky")
        .with_report("Oslo", "NO", -3.0, "snow")
}

fn spawn_app(insight: MockInsightService) -> TestApp {
    let weather = Arc::new(weather_fixture());
    let state = AppState {
        repo: Arc::new(InMemoryRepository::new()),
        weather: weather.clone(),
        insight: Arc::new(insight),
        config: AppConfig::default(),
    };
    TestApp {
        router: create_router(state),
        weather,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Registers a fresh account and returns its token.
    async fn token_for(&self, email: &str) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/auth/register",
                None,
                Some(json!({ "name": "Tester", "email": email, "password": "secret123" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn save_city(&self, token: &str, name: &str, country: Option<&str>) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/cities",
            Some(token),
            Some(json!({ "name": name, "country": country })),
        )
        .await
    }
}

// --- Public Routes ---

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app(MockInsightService::failing());
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = spawn_app(MockInsightService::failing());
    app.token_for("ada@example.com").await;

    let (status, body) = app
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap();

    let (status, me) = app.send("GET", "/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ada@example.com");
    assert!(me.get("password_hash").is_none());
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = spawn_app(MockInsightService::failing());
    app.token_for("ada@example.com").await;

    let (status, body) = app
        .send(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "name": "Other", "email": "ADA@example.com", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Email already registered");
}

#[tokio::test]
async fn test_wrong_password_always_fails() {
    let app = spawn_app(MockInsightService::failing());
    app.token_for("ada@example.com").await;

    for _ in 0..3 {
        let (status, body) = app
            .send(
                "POST",
                "/auth/login",
                None,
                Some(json!({ "email": "ada@example.com", "password": "nope-nope" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid email or password");
    }
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = spawn_app(MockInsightService::failing());
    let (status, body) = app
        .send("POST", "/auth/register", None, Some(json!({ "email": 12 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

// --- Auth Guard ---

#[tokio::test]
async fn test_protected_routes_need_token() {
    let app = spawn_app(MockInsightService::failing());
    for (method, uri) in [
        ("GET", "/me"),
        ("GET", "/cities"),
        ("GET", "/cities/suggest?q=par"),
        ("POST", "/ai/ask"),
    ] {
        let (status, _) = app.send(method, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
    }

    let (status, body) = app.send("GET", "/cities", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Missing or invalid token");
}

// --- Cities ---

#[tokio::test]
async fn test_city_lifecycle() {
    let app = spawn_app(MockInsightService::failing());
    let token = app.token_for("ada@example.com").await;

    let (status, city) = app.save_city(&token, "lisbon", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(city["name"], "Lisbon");
    assert_eq!(city["country"], "PT");
    assert_eq!(city["is_favorite"], false);
    let id = city["id"].as_str().unwrap().to_string();

    let (status, list) = app.send("GET", "/cities", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, report) = app
        .send("GET", &format!("/cities/{id}/weather"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["temperature"], 21.0);

    let (status, _) = app
        .send("DELETE", &format!("/cities/{id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, list) = app.send("GET", "/cities", Some(&token), None).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_city_is_rejected() {
    let app = spawn_app(MockInsightService::failing());
    let token = app.token_for("ada@example.com").await;

    let (status, _) = app.save_city(&token, "Oslo", Some("NO")).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.save_city(&token, "  OSLO ", Some("no")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "City already saved");

    // A different user may save the same city.
    let other = app.token_for("bob@example.com").await;
    let (status, _) = app.save_city(&other, "Oslo", Some("NO")).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_ambiguous_and_unknown_cities() {
    let app = spawn_app(MockInsightService::failing());
    let token = app.token_for("ada@example.com").await;

    let (status, body) = app.save_city(&token, "Paris", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("Ambiguous"));

    let (status, city) = app.save_city(&token, "Paris", Some("us")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(city["country"], "US");

    let (status, body) = app.save_city(&token, "Atlantis", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "City not found");
}

#[tokio::test]
async fn test_malformed_country_rejected_before_geocoding() {
    let app = spawn_app(MockInsightService::failing());
    let token = app.token_for("ada@example.com").await;
    let before = app.weather.calls();

    for bad in ["FRA", "F", "1A"] {
        let (status, _) = app.save_city(&token, "Paris", Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{bad}");
    }
    assert_eq!(app.weather.calls(), before);
}

#[tokio::test]
async fn test_favorite_is_idempotent() {
    let app = spawn_app(MockInsightService::failing());
    let token = app.token_for("ada@example.com").await;
    let (_, first) = app.save_city(&token, "Lisbon", None).await;
    let (_, second) = app.save_city(&token, "Oslo", None).await;
    let id = second["id"].as_str().unwrap();

    let uri = format!("/cities/{id}/favorite");
    let (status, once) = app
        .send("PATCH", &uri, Some(&token), Some(json!({ "favorite": true })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, twice) = app
        .send("PATCH", &uri, Some(&token), Some(json!({ "favorite": true })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(once, twice);
    assert_eq!(twice["is_favorite"], true);

    // Favorites are listed first.
    let (_, list) = app.send("GET", "/cities", Some(&token), None).await;
    assert_eq!(list[0]["id"], second["id"]);
    assert_eq!(list[1]["id"], first["id"]);
}

#[tokio::test]
async fn test_foreign_city_is_not_found_and_untouched() {
    let app = spawn_app(MockInsightService::failing());
    let owner = app.token_for("ada@example.com").await;
    let intruder = app.token_for("eve@example.com").await;
    let (_, city) = app.save_city(&owner, "Lisbon", None).await;
    let id = city["id"].as_str().unwrap();

    let (status, _) = app
        .send("DELETE", &format!("/cities/{id}"), Some(&intruder), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            "PATCH",
            &format!("/cities/{id}/favorite"),
            Some(&intruder),
            Some(json!({ "favorite": true })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send("GET", &format!("/cities/{id}/weather"), Some(&intruder), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = app.send("GET", "/cities", Some(&owner), None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["is_favorite"], false);
}

#[tokio::test]
async fn test_suggestions() {
    let app = spawn_app(MockInsightService::failing());
    let token = app.token_for("ada@example.com").await;

    let (status, found) = app
        .send("GET", "/cities/suggest?q=par", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found.as_array().unwrap().len(), 2);

    let (status, found) = app.send("GET", "/cities/suggest?q=p", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(found.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_weather_provider_gap_is_not_found() {
    let app = spawn_app(MockInsightService::failing());
    let token = app.token_for("ada@example.com").await;
    // Paris resolves in the geocoder but has no canned report.
    let (_, city) = app.save_city(&token, "Paris", Some("FR")).await;
    let id = city["id"].as_str().unwrap();

    let (status, body) = app
        .send("GET", &format!("/cities/{id}/weather"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Weather data not found");
}

// --- Assistant ---

#[tokio::test]
async fn test_ask_falls_back_to_heuristic() {
    let app = spawn_app(MockInsightService::failing());
    let token = app.token_for("ada@example.com").await;
    app.save_city(&token, "Lisbon", None).await;
    app.save_city(&token, "Oslo", None).await;

    let (status, body) = app
        .send(
            "POST",
            "/ai/ask",
            Some(&token),
            Some(json!({ "question": "Where is it warmest?" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "heuristic");
    let answer = body["answer"].as_str().unwrap();
    assert!(answer.contains("21.0°C in Lisbon, PT"));
    assert!(answer.contains("-3.0°C in Oslo, NO"));
}

#[tokio::test]
async fn test_ask_uses_ai_answer() {
    let app = spawn_app(MockInsightService::answering("Pack a coat for Oslo."));
    let token = app.token_for("ada@example.com").await;
    app.save_city(&token, "Oslo", None).await;

    let (status, body) = app
        .send(
            "POST",
            "/ai/ask",
            Some(&token),
            Some(json!({ "question": "What should I wear?" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "ai");
    assert_eq!(body["answer"], "Pack a coat for Oslo.");
    assert_eq!(body["cities"], json!(["Oslo"]));
}
