use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::ingest::event::EventPayload;
use crate::ingest::pipeline::IngestOutcome;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub outcomes: Vec<IngestOutcome>,
}

fn authorized(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token.trim() == expected)
}

/// POST /api/v1/events/object-finalized
///
/// Every record in the delivery is attempted; if any fails, the first failure is
/// returned so the platform redelivers. Reprocessing the ones that succeeded is safe.
pub async fn handle_object_finalized(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<EventPayload>,
) -> Result<Json<WebhookResponse>, AppError> {
    if let Some(expected) = &state.webhook_token {
        if !authorized(&headers, expected) {
            return Err(AppError::Unauthorized);
        }
    }

    let events = payload
        .into_events()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    info!("Received {} storage event(s)", events.len());

    let mut outcomes = Vec::with_capacity(events.len());
    let mut first_error = None;
    for event in &events {
        match state.pipeline.process(event).await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                warn!(path = e.path(), stage = e.stage(), "Storage event failed");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(AppError::Pipeline(e)),
        None => Ok(Json(WebhookResponse { outcomes })),
    }
}
