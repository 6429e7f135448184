//! HTTP handlers. Store access is blocking (rusqlite / file I/O), so every handler runs
//! its work on the blocking pool.

pub mod rest;
pub mod webhook;

use axum::{http::StatusCode, Json};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use starapp_core::Reply;

pub(crate) type ApiResponse = (StatusCode, Json<Value>);

pub(crate) fn reply_response(reply: Reply) -> ApiResponse {
    let status = StatusCode::from_u16(reply.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(reply.body()))
}

pub(crate) fn bad_request(message: &str) -> Reply {
    Reply::BadRequest(message.to_string())
}

/// Decode a JSON request body; malformed input gets the usual `{ "message" }` 400.
pub(crate) fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, Reply> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(error = %e, "undecodable request body");
        bad_request("Invalid JSON body.")
    })
}

/// Run `f` on the blocking pool; `Ok` bodies are sent with 200.
pub(crate) async fn run_blocking<F>(f: F) -> ApiResponse
where
    F: FnOnce() -> Result<Value, Reply> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(body)) => (StatusCode::OK, Json(body)),
        Ok(Err(reply)) => reply_response(reply),
        Err(e) => {
            tracing::error!(error = %e, "handler task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "text": starapp_core::dispatch::SERVER_ERROR_TEXT })),
            )
        }
    }
}
