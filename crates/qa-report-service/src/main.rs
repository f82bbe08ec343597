use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use clap::Parser;
use qa_report_api::{
    Dashboard, DashboardError, DashboardScreen, DataStatus, InsightPrompt, TransitionRequest,
    TransitionResult, ViewRequest, API_CONTRACT_VERSION,
};
use qa_report_insights::{GeminiClient, DEFAULT_GEMINI_ENDPOINT};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const SERVICE_CONTRACT_VERSION: &str = "service.v1";
const OPENAPI_YAML: &str = include_str!("../../../openapi/openapi.yaml");

const METHOD_NOT_ALLOWED_MESSAGE: &str = "Method not allowed";
const MISSING_KEY_MESSAGE: &str = "Server misconfiguration: API key not set.";
const MISSING_PROMPT_MESSAGE: &str = "Missing prompt in request body.";

#[derive(Debug, Clone)]
struct ServiceState {
    dashboard: Arc<Dashboard>,
    gemini: Option<GeminiClient>,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceEnvelope<T>
where
    T: Serialize,
{
    service_contract_version: &'static str,
    api_contract_version: &'static str,
    data: T,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceError {
    service_contract_version: &'static str,
    error: String,
    #[serde(skip)]
    status: StatusCode,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    insights_configured: bool,
    data: DataStatus,
}

/// Bodies of `/api/insights` are bare objects, not envelopes.
#[derive(Debug, Clone, Serialize)]
struct ProxyText {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
struct ProxyError {
    error: String,
}

#[derive(Debug, Parser)]
#[command(name = "qa-report-service")]
#[command(about = "Local HTTP service for the QA report dashboard")]
struct Args {
    #[arg(long, env = "QA_REPORT_BIND", default_value = "127.0.0.1:4020")]
    bind: SocketAddr,
    /// Observation data: data.json, data.js, or a spreadsheet export.
    #[arg(long, env = "QA_REPORT_DATA")]
    data: Option<PathBuf>,
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,
    #[arg(long, env = "GEMINI_ENDPOINT", default_value = DEFAULT_GEMINI_ENDPOINT)]
    gemini_endpoint: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

impl From<DashboardError> for ServiceError {
    fn from(err: DashboardError) -> Self {
        let status = match &err {
            DashboardError::DataNotLoaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            DashboardError::Selection(_) => StatusCode::BAD_REQUEST,
        };
        ServiceState::error(status, err.to_string())
    }
}

impl ServiceState {
    fn new(dashboard: Dashboard, api_key: Option<String>, endpoint: &str) -> Self {
        let gemini = api_key
            .filter(|key| !key.trim().is_empty())
            .map(|key| GeminiClient::with_endpoint(key, endpoint));
        Self { dashboard: Arc::new(dashboard), gemini }
    }

    fn error(status: StatusCode, message: impl Into<String>) -> ServiceError {
        ServiceError {
            service_contract_version: SERVICE_CONTRACT_VERSION,
            error: message.into(),
            status,
        }
    }
}

fn envelope<T>(data: T) -> ServiceEnvelope<T>
where
    T: Serialize,
{
    ServiceEnvelope {
        service_contract_version: SERVICE_CONTRACT_VERSION,
        api_contract_version: API_CONTRACT_VERSION,
        data,
    }
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/openapi", get(openapi))
        .route("/v1/dashboard/view", post(dashboard_view))
        .route("/v1/dashboard/transition", post(dashboard_transition))
        .route("/v1/dashboard/insight-prompt", post(dashboard_insight_prompt))
        .route("/api/insights", any(insights_proxy))
        .with_state(state)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let dashboard = Dashboard::open(args.data.as_deref());
    let state = ServiceState::new(dashboard, args.gemini_api_key, &args.gemini_endpoint);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    tracing::info!(
        bind = %args.bind,
        data_loaded = state.dashboard.data_status().loaded,
        insights_configured = state.gemini.is_some(),
        "qa report service listening"
    );
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health(State(state): State<ServiceState>) -> Json<ServiceEnvelope<HealthResponse>> {
    Json(envelope(HealthResponse {
        status: "ok",
        insights_configured: state.gemini.is_some(),
        data: state.dashboard.data_status(),
    }))
}

async fn openapi() -> impl IntoResponse {
    (StatusCode::OK, [("content-type", "application/yaml; charset=utf-8")], OPENAPI_YAML)
}

async fn dashboard_view(
    State(state): State<ServiceState>,
    Json(request): Json<ViewRequest>,
) -> Result<Json<ServiceEnvelope<DashboardScreen>>, ServiceError> {
    let screen = state.dashboard.view(&request)?;
    Ok(Json(envelope(screen)))
}

async fn dashboard_transition(
    State(state): State<ServiceState>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<ServiceEnvelope<TransitionResult>>, ServiceError> {
    let result = state.dashboard.transition(&request)?;
    Ok(Json(envelope(result)))
}

async fn dashboard_insight_prompt(
    State(state): State<ServiceState>,
    Json(request): Json<ViewRequest>,
) -> Result<Json<ServiceEnvelope<InsightPrompt>>, ServiceError> {
    let prompt = state.dashboard.insight_prompt(&request.selection)?;
    Ok(Json(envelope(prompt)))
}

fn proxy_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ProxyError { error: message.into() })).into_response()
}

/// Non-empty string `prompt` from a JSON body, if there is one.
fn prompt_from_body(body: &[u8]) -> Option<String> {
    let value = serde_json::from_slice::<Value>(body).ok()?;
    let prompt = value.get("prompt")?.as_str()?;
    (!prompt.is_empty()).then(|| prompt.to_string())
}

/// Checks run in order: method, credential, prompt.
async fn insights_proxy(
    State(state): State<ServiceState>,
    method: Method,
    body: Bytes,
) -> Response {
    if method != Method::POST {
        return proxy_error(StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED_MESSAGE);
    }
    let Some(gemini) = state.gemini.as_ref() else {
        tracing::error!("insight request rejected: GEMINI_API_KEY is not configured");
        return proxy_error(StatusCode::INTERNAL_SERVER_ERROR, MISSING_KEY_MESSAGE);
    };
    let Some(prompt) = prompt_from_body(&body) else {
        return proxy_error(StatusCode::BAD_REQUEST, MISSING_PROMPT_MESSAGE);
    };

    match gemini.generate(&prompt).await {
        Ok(text) => {
            tracing::info!(status = 200, chars = text.len(), "insight generated");
            (StatusCode::OK, Json(ProxyText { text })).into_response()
        }
        Err(err) => {
            let status = StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            tracing::warn!(status = status.as_u16(), error = %err, "insight request failed");
            proxy_error(status, err.to_string())
        }
    }
}
