//! Auxiliary REST endpoints used by the web front end.

use super::{bad_request, decode_body, run_blocking, ApiResponse};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use starapp_core::{OutcomeSelection, OutcomeType, Reply, TrackerError};
use std::collections::HashSet;

fn required(value: Option<String>, message: &str) -> Result<String, Reply> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| bad_request(message))
}

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    #[serde(default)]
    email: Option<String>,
}

/// `GET /progress?email=`
pub async fn progress(State(state): State<AppState>, Query(q): Query<ProgressQuery>) -> ApiResponse {
    let dispatcher = state.dispatcher.clone();
    run_blocking(move || {
        let email = required(q.email, "Email is required.")?;
        let user = dispatcher.resolve_user(&email)?;
        let today = Utc::now().date_naive();
        let tally = dispatcher.tracker().daily_tally(user.id, today);
        let coins = dispatcher.tracker().coin_summary(user.id, today);
        Ok(json!({
            "email": user.email,
            "checked": tally.checked,
            "completed": tally.completed,
            "completion_ratio": tally.completion_ratio(),
            "tier": tally.mood_tier(),
            "coins": coins,
        }))
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct AddOutcomeBody {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "type")]
    outcome_type: Option<String>,
}

/// `POST /add-outcome`: create a custom outcome and check it for today.
pub async fn add_outcome(State(state): State<AppState>, body: Bytes) -> ApiResponse {
    let dispatcher = state.dispatcher.clone();
    run_blocking(move || {
        let body: AddOutcomeBody = decode_body(&body)?;
        let email = required(body.email, "Email is required.")?;
        let text = required(body.text, "Outcome text is required.")?;
        let outcome_type = match body.outcome_type.as_deref() {
            None => OutcomeType::Earning,
            Some(label) => OutcomeType::parse(label)
                .ok_or_else(|| bad_request("Type must be Learning, Earning or Contribution."))?,
        };
        let user = dispatcher.resolve_user(&email)?;
        let selection = OutcomeSelection::Custom { text, outcome_type };
        match dispatcher.tracker().record_checked(user.id, &selection) {
            Ok(outcome) => Ok(json!({ "message": "Outcome added.", "outcome": outcome })),
            Err(TrackerError::InvalidCustomText { reason }) => Err(Reply::BadRequest(format!(
                "Invalid outcome: {reason}."
            ))),
            Err(TrackerError::Store(e)) => {
                tracing::error!(user_id = user.id, error = %e, "adding outcome failed");
                Err(Reply::failed())
            }
        }
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct RemoveOutcomeBody {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    outcome_id: Option<i64>,
}

/// `POST /remove-outcome`: drop a not-yet-completed goal from today's selection.
pub async fn remove_outcome(State(state): State<AppState>, body: Bytes) -> ApiResponse {
    let dispatcher = state.dispatcher.clone();
    run_blocking(move || {
        let body: RemoveOutcomeBody = decode_body(&body)?;
        let email = required(body.email, "Email is required.")?;
        let outcome_id = body.outcome_id.ok_or_else(|| bad_request("outcome_id is required."))?;
        let user = dispatcher.resolve_user(&email)?;
        let removed = dispatcher
            .tracker()
            .remove_checked_at(user.id, outcome_id, Utc::now());
        Ok(json!({ "removed": removed, "outcome_id": outcome_id }))
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct SubmitOutcomesBody {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    outcome_ids: Vec<i64>,
}

/// `POST /submitOutcomes`: the listed outcomes become today's selection. Listed ids are
/// checked; checked entries not listed are dropped.
pub async fn submit_outcomes(State(state): State<AppState>, body: Bytes) -> ApiResponse {
    let dispatcher = state.dispatcher.clone();
    run_blocking(move || {
        let body: SubmitOutcomesBody = decode_body(&body)?;
        let email = required(body.email, "Email is required.")?;
        let user = dispatcher.resolve_user(&email)?;
        let now = Utc::now();
        let mut checked = Vec::new();
        let mut failed = false;
        for id in body.outcome_ids {
            match dispatcher
                .tracker()
                .record_checked_at(user.id, &OutcomeSelection::Existing(id), now)
            {
                Ok(Some(_)) => checked.push(id),
                Ok(None) => {}
                Err(e) => {
                    failed = true;
                    tracing::warn!(user_id = user.id, outcome_id = id, error = %e, "check failed");
                }
            }
        }
        let removed = if failed {
            0
        } else {
            let keep: HashSet<i64> = checked.iter().copied().collect();
            dispatcher.tracker().retain_selected_at(user.id, &keep, now)
        };
        Ok(json!({ "checked": checked, "removed": removed }))
    })
    .await
}
