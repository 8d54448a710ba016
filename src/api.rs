//! HTTP API server: the Command Gateway surface.
//!
//! Exposes manual send, status, webhook config and logout, plus a
//! server-sent event stream for dashboard observers. Spawned as a
//! background task by the gateway.

use crate::gateway::{commands::CommandGateway, observers::Observers};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{error, info, warn};
use wabridge_core::{config::ApiConfig, error::CommandError, message::ObserverEvent};

type ApiError = (StatusCode, Json<Value>);

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    commands: CommandGateway,
    observers: Observers,
    api_key: Option<String>,
}

impl ApiState {
    pub fn new(commands: CommandGateway, observers: Observers, config: &ApiConfig) -> Self {
        let api_key = if config.api_key.is_empty() {
            None
        } else {
            Some(config.api_key.clone())
        };
        Self {
            commands,
            observers,
            api_key,
        }
    }
}

/// `POST /api/send` request body.
#[derive(Debug, Deserialize)]
struct SendRequest {
    #[serde(default)]
    number: String,
    #[serde(default)]
    message: String,
}

/// `POST /api/config` request body.
#[derive(Debug, Deserialize)]
struct ConfigRequest {
    #[serde(default)]
    webhook_url: String,
    #[serde(default)]
    webhook_token: String,
}

/// Constant-time string comparison to prevent timing attacks on API token validation.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Check bearer token auth. Returns `None` if authorized, `Some(response)` if rejected.
fn check_auth(headers: &HeaderMap, api_key: &Option<String>) -> Option<ApiError> {
    let key = api_key.as_ref()?;

    let Some(header) = headers.get("authorization") else {
        return Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "UNAUTHORIZED", "message": "missing Authorization header"})),
        ));
    };

    match header.to_str().ok().and_then(|v| v.strip_prefix("Bearer ")) {
        Some(token) if constant_time_eq(token, key) => None,
        _ => Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "UNAUTHORIZED", "message": "invalid token"})),
        )),
    }
}

/// Map a command failure to its HTTP status and `{error, message}` body.
fn error_response(err: CommandError) -> ApiError {
    let status = match err {
        CommandError::InvalidNumber(_) | CommandError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CommandError::NotRegistered(_) | CommandError::NotConfigured => StatusCode::NOT_FOUND,
        CommandError::SendFailed(_) => StatusCode::BAD_GATEWAY,
        CommandError::PersistFailed(_) | CommandError::LogoutFailed(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(json!({"error": err.code(), "message": err.to_string()})),
    )
}

fn invalid_body(e: JsonRejection) -> ApiError {
    error_response(CommandError::InvalidInput(format!("invalid request: {e}")))
}

/// `GET /api/health`: Liveness with uptime and session state.
async fn health(headers: HeaderMap, State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let report = state.commands.status();
    Ok(Json(json!({
        "status": "ok",
        "uptime_secs": report.uptime_seconds,
        "whatsapp": report.state,
    })))
}

/// `GET /api/status`: Connection flag, uptime and lifecycle state.
async fn status(headers: HeaderMap, State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }
    Ok(Json(json!(state.commands.status())))
}

/// `POST /api/send`: Send a manual message to a phone number.
async fn send(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }
    let Json(request) = body.map_err(invalid_body)?;

    match state.commands.send(&request.number, &request.message).await {
        Ok(to) => Ok(Json(json!({"status": "sent", "to": to}))),
        Err(e) => {
            warn!(code = e.code(), "manual send failed: {e}");
            Err(error_response(e))
        }
    }
}

/// `GET /api/config`: Current webhook record.
async fn get_config(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }
    let config = state.commands.get_config().map_err(error_response)?;
    Ok(Json(json!(config)))
}

/// `POST /api/config`: Replace the webhook record.
async fn set_config(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<ConfigRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }
    let Json(request) = body.map_err(invalid_body)?;

    let config = state
        .commands
        .set_config(&request.webhook_url, &request.webhook_token)
        .map_err(|e| {
            if matches!(e, CommandError::PersistFailed(_)) {
                error!("webhook config not saved: {e}");
            }
            error_response(e)
        })?;
    Ok(Json(json!({"status": "saved", "config": config})))
}

/// `POST /api/logout`: Unlink the device and start a fresh session.
async fn logout(headers: HeaderMap, State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }
    state.commands.logout().await.map_err(|e| {
        warn!("logout failed: {e}");
        error_response(e)
    })?;
    Ok(Json(json!({"status": "logged_out"})))
}

/// Encode an observer event as one SSE frame.
fn to_sse(event: &ObserverEvent) -> Event {
    let data = serde_json::to_value(event)
        .ok()
        .and_then(|mut v| v.get_mut("data").map(Value::take))
        .unwrap_or(Value::Null);
    Event::default().event(event.name()).data(data.to_string())
}

/// `GET /api/events`: Observer push stream. Starts with the current
/// connection flag; events a slow client falls behind on are skipped.
async fn events(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let initial = ObserverEvent::ConnectionChanged(state.commands.status().connected);
    let updates = BroadcastStream::new(state.observers.subscribe()).filter_map(|r| r.ok());
    let stream = tokio_stream::once(initial)
        .chain(updates)
        .map(|ev| Ok(to_sse(&ev)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Build the axum router with shared state.
fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/send", post(send))
        .route("/api/config", get(get_config).post(set_config))
        .route("/api/logout", post(logout))
        .route("/api/events", get(events))
        .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024)) // 1 MB max request body
        .with_state(state)
}

/// Start the API server. Called from `Gateway::run()`.
pub async fn serve(config: ApiConfig, state: ApiState) {
    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("API server failed to bind to {addr}: {e}");
            return;
        }
    };

    info!("API server listening on {addr}");

    if let Err(e) = axum::serve(listener, app).await {
        error!("API server error: {e}");
    }
}
