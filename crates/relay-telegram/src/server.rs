//! HTTP surface: the webhook endpoint plus root and health pages.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use teloxide::types::Update;
use tracing::{debug, warn};

use relay_core::webhook::RegistrationStatus;

pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

const INDEX_HTML: &str = "<!doctype html>\n<html><head><title>Relay bot</title></head>\
<body><h1>Telegram relay bot is running</h1>\
<p>Updates are received on the webhook endpoint.</p></body></html>";

/// Receives each decoded update; must not block.
pub type UpdateSink = Arc<dyn Fn(Update) + Send + Sync>;

#[derive(Clone)]
pub struct ServerState {
    pub webhook_secret: Option<String>,
    pub status: RegistrationStatus,
    pub sink: UpdateSink,
}

pub fn app(webhook_path: &str, state: ServerState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route(webhook_path, post(receive))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    webhook: &'static str,
}

async fn health(State(state): State<ServerState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        webhook: state.status.get().label(),
    })
}

/// Acknowledges every authenticated delivery with `200 ok`, even when the body
/// cannot be decoded, so Telegram never redelivers it.
async fn receive(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Some(expected) = state.webhook_secret.as_deref() {
        let got = headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok());
        if got != Some(expected) {
            warn!("webhook request with missing or wrong secret token");
            return (StatusCode::UNAUTHORIZED, "unauthorized");
        }
    }

    match serde_json::from_slice::<Update>(&body) {
        Ok(update) => {
            debug!(update_id = update.id, "update received");
            (state.sink)(update);
        }
        Err(e) => warn!(error = %e, len = body.len(), "dropping malformed update"),
    }
    (StatusCode::OK, "ok")
}
