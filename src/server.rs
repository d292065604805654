use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{rejection::StringRejection, DefaultBodyLimit, Request, State},
    http::{
        header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap, HeaderValue, Method, StatusCode,
    },
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::error::ApiError;
use crate::handlers::{calorie, chat, CalorieHandler, ChatHandler};
use crate::models::{AnalysisResult, ChatReply, Credentials, Session};
use crate::services::IdentityProvider;

/// Upper bound for request bodies. Gemini accepts about 20 MB of inline
/// image data, so base64 photos up to that size must get through.
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub calorie: Arc<CalorieHandler>,
    pub chat: Arc<ChatHandler>,
    pub identity: Arc<dyn IdentityProvider>,
    pub require_auth: bool,
}

/// API routes without CORS, request logging or static hosting.
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/calorie/analyze", post(analyze_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/auth/signup", post(signup_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/logout", post(logout_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

pub fn create_router(state: AppState, config: &Config) -> Router {
    let mut router = create_api_router(state);

    if let Some(dir) = &config.static_dir {
        log::info!("📁 Serving static files from {}", dir.display());
        router = router.fallback_service(ServeDir::new(dir));
    }

    router.layer(
        ServiceBuilder::new()
            .layer(middleware::from_fn(log_requests))
            .layer(cors_layer(&config.allowed_origins)),
    )
}

pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("⚠️ Ignoring invalid origin in ALLOWED_ORIGINS: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .expose_headers([CONTENT_LENGTH])
        .max_age(Duration::from_secs(600))
        .allow_credentials(true)
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    log::info!(
        "{} {} -> {} ({} ms)",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Enforces a valid session when the server runs with `REQUIRE_AUTH`.
async fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if !state.require_auth {
        return Ok(());
    }

    let token = bearer_token(headers)
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;
    let email = state.identity.verify(token).await?;
    log::debug!("Authorized request for {}", email);
    Ok(())
}

async fn analyze_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<String, StringRejection>,
) -> Result<Json<AnalysisResult>, ApiError> {
    authorize(&state, &headers).await?;

    let request = calorie::parse_analysis_request(&body?);
    let result = state.calorie.analyze(request).await?;
    Ok(Json(result))
}

async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<String, StringRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    authorize(&state, &headers).await?;

    let request = chat::parse_chat_request(&body?)?;
    let reply = state.chat.reply(request).await?;
    Ok(Json(reply))
}

fn parse_credentials(body: &str) -> Result<Credentials, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Validation(e.to_string()))
}

async fn signup_handler(
    State(state): State<AppState>,
    body: Result<String, StringRejection>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let credentials = parse_credentials(&body?)?;
    let session = state.identity.signup(&credentials).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn login_handler(
    State(state): State<AppState>,
    body: Result<String, StringRejection>,
) -> Result<Json<Session>, ApiError> {
    let credentials = parse_credentials(&body?)?;
    let session = state.identity.login(&credentials).await?;
    Ok(Json(session))
}

async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;
    state.identity.logout(token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn root_handler() -> &'static str {
    "API Server is running"
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::calorie::DEFAULT_ANALYSIS_MODEL;
    use crate::handlers::chat::{DEFAULT_CHAT_MODEL, FALLBACK_REPLY};
    use crate::services::testing::{RecordingProvider, Reply};
    use crate::services::{AccountStore, GenerativeProvider, TokenSigner};
    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use tower::ServiceExt;

    fn state_with(provider: Option<Arc<RecordingProvider>>, require_auth: bool) -> AppState {
        let provider = provider.map(|p| p as Arc<dyn GenerativeProvider>);
        AppState {
            calorie: Arc::new(CalorieHandler::new(
                provider.clone(),
                DEFAULT_ANALYSIS_MODEL.to_string(),
            )),
            chat: Arc::new(ChatHandler::new(provider, DEFAULT_CHAT_MODEL.to_string())),
            identity: Arc::new(AccountStore::new(TokenSigner::new("test-secret"))),
            require_auth,
        }
    }

    fn post_json(uri: &str, body: &str) -> Request {
        HttpRequest::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(router: Router, request: Request) -> (StatusCode, serde_json::Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    const IMAGE_BODY: &str = r#"{"base64Image": "aGVsbG8=", "mimeType": "image/jpeg"}"#;

    #[tokio::test]
    async fn test_analyze_success() {
        let provider = Arc::new(RecordingProvider::with_text(
            r#"{"foodName": "Menemen", "calories": 320, "nutrients": {"protein": 14, "carbs": 12, "fat": 24}, "portionSize": "1 plate"}"#,
        ));
        let router = create_api_router(state_with(Some(provider), false));

        let (status, body) = send(router, post_json("/api/calorie/analyze", IMAGE_BODY)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["foodName"], "Menemen");
        assert_eq!(body["calories"], 320.0);
        assert_eq!(body["nutrients"]["fat"], 24.0);
        assert_eq!(body["portionSize"], "1 plate");
    }

    #[tokio::test]
    async fn test_analyze_accepts_photo_larger_than_default_limit() {
        let provider = Arc::new(RecordingProvider::with_text(
            r#"{"foodName": "Pilav", "calories": 410}"#,
        ));
        let router = create_api_router(state_with(Some(provider.clone()), false));
        let body = format!(
            r#"{{"base64Image": "{}", "mimeType": "image/jpeg"}}"#,
            "A".repeat(4 * 1024 * 1024)
        );

        let (status, body) = send(router, post_json("/api/calorie/analyze", &body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["foodName"], "Pilav");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_oversized_body_gets_json_413() {
        let provider = Arc::new(RecordingProvider::with_text("{}"));
        let router = create_api_router(state_with(Some(provider.clone()), false));
        let body = format!(
            r#"{{"base64Image": "{}", "mimeType": "image/jpeg"}}"#,
            "A".repeat(MAX_BODY_BYTES + 1)
        );

        let (status, body) = send(router, post_json("/api/calorie/analyze", &body)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"], "Request body too large");
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_non_utf8_body_gets_json_400() {
        let router = create_api_router(state_with(None, false));
        let request = HttpRequest::builder()
            .method(Method::POST)
            .uri("/api/chat")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(vec![0xff, 0xfe, 0xfd]))
            .unwrap();

        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request"));
    }

    #[tokio::test]
    async fn test_analyze_missing_field_is_400_without_provider_call() {
        let provider = Arc::new(RecordingProvider::with_text("{}"));
        let router = create_api_router(state_with(Some(provider.clone()), false));

        let (status, body) = send(
            router,
            post_json("/api/calorie/analyze", r#"{"mimeType": "image/jpeg"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("base64Image"));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_key_is_500_on_both_endpoints() {
        let router = create_api_router(state_with(None, false));

        let (status, body) = send(router.clone(), post_json("/api/calorie/analyze", IMAGE_BODY)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Gemini API key not configured");

        let (status, body) = send(
            router,
            post_json("/api/chat", r#"{"history": [], "message": "hi"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Server configuration error");
    }

    #[tokio::test]
    async fn test_analyze_parse_error_includes_raw_text() {
        let provider = Arc::new(RecordingProvider::with_text("It looks like a salad!"));
        let router = create_api_router(state_with(Some(provider), false));

        let (status, body) = send(router, post_json("/api/calorie/analyze", IMAGE_BODY)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to parse Gemini response");
        assert_eq!(body["details"], "It looks like a salad!");
    }

    #[tokio::test]
    async fn test_analyze_provider_error_body() {
        let provider = Arc::new(RecordingProvider::replying(Reply::Status(
            400,
            "Bad Request",
            "image too large",
        )));
        let router = create_api_router(state_with(Some(provider), false));

        let (status, body) = send(router, post_json("/api/calorie/analyze", IMAGE_BODY)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Error from Gemini API");
        assert_eq!(body["status"], 400);
        assert_eq!(body["details"], "image too large");
    }

    #[tokio::test]
    async fn test_chat_roundtrip_and_fallback() {
        let provider = Arc::new(RecordingProvider::with_text("Eat **vegetables**."));
        let router = create_api_router(state_with(Some(provider.clone()), false));

        let (status, body) = send(
            router,
            post_json(
                "/api/chat",
                r#"{"history": [{"role": "user", "parts": [{"text": "Hi"}]}], "message": "What should I eat?"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"response": "Eat **vegetables**."}));
        assert_eq!(provider.last_request()["contents"].as_array().unwrap().len(), 2);

        let empty = Arc::new(RecordingProvider::replying(Reply::Envelope(
            serde_json::json!({}),
        )));
        let router = create_api_router(state_with(Some(empty), false));
        let (status, body) = send(
            router,
            post_json("/api/chat", r#"{"history": [], "message": "hello"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_chat_validation_error_is_400() {
        let provider = Arc::new(RecordingProvider::with_text("unused"));
        let router = create_api_router(state_with(Some(provider.clone()), false));

        let (status, _) = send(
            router,
            post_json(
                "/api/chat",
                r#"{"history": [{"role": "system", "parts": [{"text": "x"}]}], "message": "hi"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_auth_flow_guards_endpoints() {
        let provider = Arc::new(RecordingProvider::with_text("Drink water."));
        let router = create_api_router(state_with(Some(provider), true));
        let chat_body = r#"{"history": [], "message": "hi"}"#;

        let (status, _) = send(router.clone(), post_json("/api/chat", chat_body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, session) = send(
            router.clone(),
            post_json(
                "/api/auth/signup",
                r#"{"email": "demo@nutrisnack.com", "password": "password123"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let token = session["token"].as_str().unwrap().to_string();

        let authorized = |uri: &str, body: &str| {
            HttpRequest::builder()
                .method(Method::POST)
                .uri(uri)
                .header(CONTENT_TYPE, "application/json")
                .header(AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::from(body.to_string()))
                .unwrap()
        };

        let (status, body) = send(router.clone(), authorized("/api/chat", chat_body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "Drink water.");

        let response = router
            .clone()
            .oneshot(authorized("/api/auth/logout", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let (status, _) = send(router, authorized("/api/chat", chat_body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_with_bad_credentials() {
        let router = create_api_router(state_with(None, false));
        let (status, body) = send(
            router,
            post_json(
                "/api/auth/login",
                r#"{"email": "nobody@nutrisnack.com", "password": "password123"}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid email or password");
    }

    #[tokio::test]
    async fn test_cors_preflight_for_allowed_origin() {
        let config = Config::from_lookup(|key| match key {
            "ALLOWED_ORIGINS" => Some("http://localhost:5173".to_string()),
            _ => None,
        })
        .unwrap();
        let router = create_router(state_with(None, false), &config);

        let request = HttpRequest::builder()
            .method(Method::OPTIONS)
            .uri("/api/chat")
            .header("origin", "http://localhost:5173")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:5173"
        );
        assert_eq!(
            response.headers().get("access-control-allow-credentials").unwrap(),
            "true"
        );
    }

    #[tokio::test]
    async fn test_root_handler() {
        let router = create_api_router(state_with(None, false));
        let response = router
            .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"API Server is running");
    }
}
