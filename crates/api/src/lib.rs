use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Json, State};
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use rentscope_agents::{Config, RentAgent};
use rentscope_core::{PropertyType, QueryInput};
use rentscope_dataset::DatasetProvider;
use rentscope_llm::{GeneratorKind, HttpGenerator, StaticGenerator};
use rentscope_observability::AppMetrics;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<RentAgent>,
    pub metrics: Arc<AppMetrics>,
}

#[derive(Debug, Clone, Deserialize)]
struct QueryRequest {
    query: Option<String>,
    session_id: Option<String>,
}

pub async fn build_app() -> Result<Router> {
    let config = Config::from_env();
    build_app_with_config(config).await
}

pub async fn build_app_with_config(config: Config) -> Result<Router> {
    let metrics = AppMetrics::shared();

    let provider = match (&config.data_url, config.live_mode) {
        (Some(url), true) => DatasetProvider::from_remote_or_local(url, &config.data_path).await?,
        _ => DatasetProvider::from_local(&config.data_path)?,
    };

    let generator = match &config.model_url {
        Some(url) => GeneratorKind::Http(HttpGenerator::new(url.clone(), config.model_id.clone())),
        None => GeneratorKind::Static(StaticGenerator::offline()),
    };

    let agent = Arc::new(RentAgent::new(&config, provider, generator, metrics.clone()));

    Ok(build_router(ApiState { agent, metrics }))
}

pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/v1/query", post(query))
        .route("/v1/selftest", get(selftest))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let provider = state.agent.provider();
    let cities = provider.city_names();
    let supported = PropertyType::supported_codes();

    let checks = json!([
        { "name": "load_json", "ok": true },
        { "name": "city_exists", "ok": !cities.is_empty(), "example_city": cities.first() },
        { "name": "prop_supported", "ok": !supported.is_empty(), "example_property_type": supported.first() },
    ]);
    let ok = checks
        .as_array()
        .map(|entries| entries.iter().all(|c| c["ok"].as_bool().unwrap_or(false)))
        .unwrap_or(false);

    (
        StatusCode::OK,
        Json(json!({
            "ok": ok,
            "status": "ok",
            "timestamp_utc": chrono::Utc::now().to_rfc3339(),
            "live_mode": provider.live_mode(),
            "dataset": {
                "snapshot_month": provider.meta().snapshot_month,
                "version": provider.meta().version,
            },
            "checks": checks,
            "metrics": state.metrics.snapshot(),
        })),
    )
}

async fn query(State(state): State<ApiState>, Json(request): Json<QueryRequest>) -> impl IntoResponse {
    let text = request.query.unwrap_or_default();
    if text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing_query" })),
        );
    }

    match state
        .agent
        .handle_query(QueryInput {
            text,
            session_id: request.session_id,
        })
        .await
    {
        Ok(envelope) => match serde_json::to_value(&envelope) {
            Ok(body) => (StatusCode::OK, Json(body)),
            Err(err) => internal_error(err.into()),
        },
        Err(err) => internal_error(err),
    }
}

async fn selftest(State(state): State<ApiState>) -> impl IntoResponse {
    let report = state.agent.selftest();
    let status = if report["ok"].as_bool().unwrap_or(false) {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(report))
}

// Message only; stack traces stay in the logs.
fn internal_error(err: anyhow::Error) -> (StatusCode, Json<Value>) {
    error!(%err, "query handling failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": err.to_string() })),
    )
}
