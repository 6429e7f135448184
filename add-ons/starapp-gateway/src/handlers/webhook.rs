//! `POST /` chat webhook and the health check.

use super::{bad_request, reply_response, run_blocking, ApiResponse};
use crate::AppState;
use axum::{body::Bytes, extract::State, Json};
use serde_json::{json, Value};
use starapp_core::{ChatEvent, Reply};

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": format!("{} is running!", state.config.app_name),
    }))
}

pub async fn chat_event(State(state): State<AppState>, body: Bytes) -> ApiResponse {
    let event: ChatEvent = match serde_json::from_slice(&body) {
        Ok(ev) => ev,
        Err(e) => {
            tracing::warn!(error = %e, "undecodable webhook payload");
            return reply_response(bad_request("Invalid event payload."));
        }
    };
    tracing::debug!(payload = %String::from_utf8_lossy(&body), "webhook event");

    let dispatcher = state.dispatcher.clone();
    run_blocking(move || match dispatcher.handle(&event) {
        reply @ Reply::Chat(_) => Ok(reply.body()),
        other => Err(other),
    })
    .await
}
