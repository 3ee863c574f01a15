//! Webhook and operations HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/callback` | LINE webhook; answers every text message |
//! | `GET`  | `/health` | Status, loaded documents, prompt length |
//! | `GET`  | `/` | HTML status page |
//! | `POST` | `/reload` | Rescan the document directory |
//!
//! # Error Contract
//!
//! Error responses carry a JSON body:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid signature" } }
//! ```
//!
//! A rejected signature is always `400`. Completion and reply failures never
//! change the webhook response; LINE gets `OK` once the events are handled.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::line::{verify_signature, WebhookPayload, SIGNATURE_HEADER};
use crate::state::AppState;

/// Builds the router with all routes and request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/callback", post(handle_callback))
        .route("/health", get(handle_health))
        .route("/", get(handle_home))
        .route("/reload", post(handle_reload))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `bind_addr` and serves until the process is terminated.
pub async fn run_server(state: AppState, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ POST /callback ============

/// Handler for `POST /callback`.
///
/// Verifies the signature over the raw body before parsing anything, then
/// answers each text message in order: one completion, one reply.
async fn handle_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::error!("webhook without signature header");
            bad_request("missing signature")
        })?;

    let secret = state.channel_secret().unwrap_or_default();
    if secret.is_empty() || !verify_signature(secret, &body, signature) {
        tracing::error!("invalid webhook signature; check the channel secret");
        return Err(bad_request("invalid signature"));
    }

    tracing::debug!(body = %String::from_utf8_lossy(&body), "webhook body");

    let payload: WebhookPayload = serde_json::from_slice(&body).map_err(|e| {
        tracing::error!(error = %e, "malformed webhook body");
        bad_request(format!("malformed webhook body: {}", e))
    })?;

    for message in payload.text_messages() {
        tracing::info!(text = %message.text, "received message");
        let knowledge = state.knowledge.snapshot();
        let reply = state
            .relay
            .respond(&knowledge.system_context, &message.text)
            .await;
        if let Err(e) = state.transport.reply(&message.reply_token, &reply).await {
            tracing::error!(error = %e, "failed to send reply");
        }
    }

    Ok("OK")
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    docs_loaded: usize,
    documents: Vec<String>,
    system_prompt_length: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let knowledge = state.knowledge.snapshot();
    Json(HealthResponse {
        status: "healthy",
        docs_loaded: knowledge.documents.len(),
        documents: knowledge.documents.names(),
        system_prompt_length: knowledge.system_prompt_length(),
    })
}

// ============ GET / ============

async fn handle_home(State(state): State<AppState>) -> Html<String> {
    let knowledge = state.knowledge.snapshot();
    let items: String = knowledge
        .documents
        .iter()
        .map(|d| format!("<li>{}</li>", escape_html(&d.name)))
        .collect();

    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>LINE document bot</title></head>\n<body>\n\
         <h1>LINE document bot</h1>\n\
         <p>Status: running</p>\n\
         <p>Documents loaded: {}</p>\n\
         <ul>{}</ul>\n\
         <p>System prompt length: {} characters</p>\n\
         <p>Last loaded: {}</p>\n\
         </body>\n</html>\n",
        knowledge.documents.len(),
        items,
        knowledge.system_prompt_length(),
        knowledge.loaded_at.to_rfc3339(),
    ))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ============ POST /reload ============

#[derive(Serialize)]
struct ReloadResponse {
    status: &'static str,
    docs_count: usize,
    documents: Vec<String>,
}

/// Handler for `POST /reload`. The scan runs on the blocking pool.
async fn handle_reload(State(state): State<AppState>) -> Result<Json<ReloadResponse>, AppError> {
    let knowledge_base = state.knowledge.clone();
    let knowledge = tokio::task::spawn_blocking(move || knowledge_base.reload())
        .await
        .map_err(|e| internal(format!("reload task failed: {}", e)))?;

    tracing::info!(docs = knowledge.documents.len(), "documents reloaded");
    Ok(Json(ReloadResponse {
        status: "reloaded",
        docs_count: knowledge.documents.len(),
        documents: knowledge.documents.names(),
    }))
}
