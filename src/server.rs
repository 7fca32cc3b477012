//! HTTP surface for the routing layer.
//!
//! Authentication happens upstream; the caller's user id arrives in the
//! `X-User-Id` header. Only the stats endpoint is guarded here, by the admin
//! key.

use crate::cache::CacheStats;
use crate::error::{ProviderFailure, TranslateError};
use crate::languages::{Language, LanguageRegistry};
use crate::metrics::MetricsReport;
use crate::orchestrator::{Orchestrator, TranslationRequest, TranslationResponse};
use crate::providers::ProviderId;
use crate::security;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub const USER_ID_HEADER: &str = "x-user-id";

/// nginx's "client closed request"; no standard code exists.
const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub admin_api_key: Option<Arc<str>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/languages", get(languages))
        .route("/api/v1/translate", post(translate))
        .route("/api/v1/keys/verify", post(verify_key))
        .route("/api/v1/stats/cache", get(cache_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("HTTP server failed")
}

/// Structured error body.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ProviderFailure>,
}

impl ApiError {
    fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error,
            message: message.into(),
            failures: Vec::new(),
        }
    }
}

impl From<TranslateError> for ApiError {
    fn from(err: TranslateError) -> Self {
        let status = match &err {
            TranslateError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            TranslateError::Credential(crate::credentials::CredentialError::Store(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            TranslateError::Credential(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TranslateError::ProviderUnavailable { .. } => StatusCode::BAD_GATEWAY,
            TranslateError::Cancelled => {
                StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST)
            }
        };
        Self {
            status,
            error: err.kind(),
            message: err.to_string(),
            failures: err.failures().to_vec(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "providers": state.orchestrator.registry().ids(),
    }))
}

#[derive(Debug, Serialize)]
struct LanguageInfo {
    code: &'static str,
    name: &'static str,
    providers: Vec<ProviderId>,
}

/// Accepted languages and which providers can translate from English into each.
async fn languages(State(state): State<AppState>) -> Json<Vec<LanguageInfo>> {
    let registry = state.orchestrator.registry();
    let languages = LanguageRegistry::get()
        .list_all()
        .into_iter()
        .filter_map(|config| Language::from_code(config.code))
        .map(|lang| LanguageInfo {
            code: lang.code(),
            name: lang.name(),
            providers: registry
                .ids()
                .into_iter()
                .filter(|&id| {
                    registry
                        .get(id)
                        .is_some_and(|p| p.supports_pair(Language::ENGLISH, lang))
                })
                .collect(),
        })
        .collect();
    Json(languages)
}

/// The translation runs on its own task. If the client disconnects, axum
/// drops this handler, the drop guard fires the token and the task gives up
/// without writing to the cache.
async fn translate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut request): Json<TranslationRequest>,
) -> Result<Json<TranslationResponse>, ApiError> {
    request.user_id = user_id(&headers)?;

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let orchestrator = Arc::clone(&state.orchestrator);
    let task = tokio::spawn(async move {
        orchestrator.translate_with_cancel(request, &cancel).await
    });

    match task.await {
        Ok(result) => Ok(Json(result?)),
        Err(e) => {
            error!("Translation task failed: {}", e);
            Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "translation task failed",
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
struct VerifyKeyRequest {
    provider: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct VerifyKeyResponse {
    provider: ProviderId,
    valid: bool,
}

async fn verify_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<VerifyKeyRequest>,
) -> Result<Json<VerifyKeyResponse>, ApiError> {
    user_id(&headers)?;
    let provider: ProviderId = request
        .provider
        .parse()
        .map_err(|e: String| ApiError::new(StatusCode::BAD_REQUEST, "invalid_input", e))?;
    if request.api_key.trim().is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "invalid_input",
            "api_key is empty",
        ));
    }

    let valid = state
        .orchestrator
        .verify_key(provider, request.api_key.trim())
        .await?;
    Ok(Json(VerifyKeyResponse { provider, valid }))
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    cache: CacheStats,
    metrics: MetricsReport,
}

async fn cache_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatsResponse>, ApiError> {
    if !security::is_admin(&headers, state.admin_api_key.as_deref()) {
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "admin key required",
        ));
    }
    Ok(Json(StatsResponse {
        cache: state.orchestrator.cache_stats().await,
        metrics: state.orchestrator.metrics(),
    }))
}

fn user_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "missing X-User-Id header",
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{AdaptiveCache, MemoryStore, TtlPolicy};
    use crate::credentials::{CredentialResolver, MemoryCredentialStore, SecretCipher};
    use crate::metrics::TranslationMetrics;
    use crate::providers::{MyMemory, Provider};
    use crate::registry::ProviderRegistry;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn spawn_app(mymemory_url: &str) -> String {
        let mut registry = ProviderRegistry::new(vec![ProviderId::MyMemory]);
        registry.register(Provider::MyMemory(MyMemory::new(
            reqwest::Client::new(),
            mymemory_url,
        )));
        let cipher = Arc::new(SecretCipher::new(&SecretCipher::generate_key()).unwrap());
        let metrics = Arc::new(TranslationMetrics::new());
        let orchestrator = Orchestrator::new(
            registry,
            CredentialResolver::new(Arc::new(MemoryCredentialStore::new()), cipher),
            AdaptiveCache::new(
                Arc::new(MemoryStore::new()),
                TtlPolicy::default(),
                Arc::clone(&metrics),
            ),
            metrics,
        );
        let state = AppState {
            orchestrator: Arc::new(orchestrator),
            admin_api_key: Some(Arc::from("admin-secret")),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn mock_mymemory() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get"))
            .and(query_param("langpair", "en|fr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "responseData": {"translatedText": "Bonjour"},
                "responseStatus": 200
            })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_health() {
        let base = spawn_app("http://127.0.0.1:1").await;
        let body: serde_json::Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["providers"], json!(["mymemory"]));
    }

    #[tokio::test]
    async fn test_languages_lists_registry() {
        let base = spawn_app("http://127.0.0.1:1").await;
        let body: serde_json::Value = reqwest::get(format!("{}/api/v1/languages", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let languages = body.as_array().unwrap();
        assert_eq!(languages.len(), LanguageRegistry::get().list_all().len());

        let french = languages.iter().find(|l| l["code"] == "fr").unwrap();
        assert_eq!(french["name"], "French");
        assert_eq!(french["providers"], json!(["mymemory"]));
        // No provider translates English into English
        let english = languages.iter().find(|l| l["code"] == "en").unwrap();
        assert_eq!(english["providers"], json!([]));
    }

    #[tokio::test]
    async fn test_translate_then_cached() {
        let provider = mock_mymemory().await;
        let base = spawn_app(&provider.uri()).await;
        let client = reqwest::Client::new();

        let send = || {
            client
                .post(format!("{}/api/v1/translate", base))
                .header(USER_ID_HEADER, "17")
                .json(&json!({"text": "Hello", "source_lang": "en", "target_lang": "fr"}))
                .send()
        };

        let first: serde_json::Value = send().await.unwrap().json().await.unwrap();
        assert_eq!(first["translated_text"], "Bonjour");
        assert_eq!(first["provider_used"], "mymemory");
        assert_eq!(first["cached"], false);

        let second: serde_json::Value = send().await.unwrap().json().await.unwrap();
        assert_eq!(second["translated_text"], "Bonjour");
        assert_eq!(second["cached"], true);
        assert_eq!(second["hit_count"], 2);
    }

    #[tokio::test]
    async fn test_missing_user_header_rejected() {
        let base = spawn_app("http://127.0.0.1:1").await;
        let response = reqwest::Client::new()
            .post(format!("{}/api/v1/translate", base))
            .json(&json!({"text": "Hello", "source_lang": "en", "target_lang": "fr"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 401);
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let base = spawn_app("http://127.0.0.1:1").await;
        let client = reqwest::Client::new();

        let invalid = client
            .post(format!("{}/api/v1/translate", base))
            .header(USER_ID_HEADER, "17")
            .json(&json!({"text": "", "source_lang": "en", "target_lang": "fr"}))
            .send()
            .await
            .unwrap();
        assert_eq!(invalid.status(), 400);
        let body: serde_json::Value = invalid.json().await.unwrap();
        assert_eq!(body["error"], "invalid_input");

        let unavailable = client
            .post(format!("{}/api/v1/translate", base))
            .header(USER_ID_HEADER, "17")
            .json(&json!({"text": "Hello", "source_lang": "en", "target_lang": "fr"}))
            .send()
            .await
            .unwrap();
        assert_eq!(unavailable.status(), 502);
        let body: serde_json::Value = unavailable.json().await.unwrap();
        assert_eq!(body["error"], "provider_unavailable");
        assert_eq!(body["failures"][0]["provider"], "mymemory");
        assert_eq!(body["failures"][0]["kind"], "unavailable");
    }

    #[tokio::test]
    async fn test_stats_requires_admin_key() {
        let base = spawn_app("http://127.0.0.1:1").await;
        let client = reqwest::Client::new();
        let url = format!("{}/api/v1/stats/cache", base);

        let denied = client.get(&url).send().await.unwrap();
        assert_eq!(denied.status(), 401);

        let wrong = client.get(&url).bearer_auth("nope").send().await.unwrap();
        assert_eq!(wrong.status(), 401);

        let allowed = client.get(&url).bearer_auth("admin-secret").send().await.unwrap();
        assert_eq!(allowed.status(), 200);
        let body: serde_json::Value = allowed.json().await.unwrap();
        assert_eq!(body["cache"]["total_keys"], 0);
        assert_eq!(body["metrics"]["provider_calls"], 0);
    }

    #[tokio::test]
    async fn test_verify_key_rejects_unknown_provider() {
        let base = spawn_app("http://127.0.0.1:1").await;
        let response = reqwest::Client::new()
            .post(format!("{}/api/v1/keys/verify", base))
            .header(USER_ID_HEADER, "17")
            .json(&json!({"provider": "google", "api_key": "k"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }
}
