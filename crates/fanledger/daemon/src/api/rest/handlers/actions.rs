//! Point-spending action handlers
//!
//! The body is always an `ActionOutcome`; the HTTP status mirrors its code.

use crate::api::rest::state::AppState;
use crate::error::status_for_code;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use fanledger_service::ActionOutcome;
use fanledger_types::{AccountId, ObjectiveId, ParticipantId};
use serde::Deserialize;

/// Vote or alliance request
#[derive(Debug, Deserialize)]
pub struct ParticipantActionRequest {
    pub participant_id: ParticipantId,
}

/// Donation request
#[derive(Debug, Deserialize)]
pub struct DonationRequest {
    pub objective_id: ObjectiveId,
    pub amount: i64,
}

/// Cast today's vote
pub async fn submit_vote(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    Json(request): Json<ParticipantActionRequest>,
) -> (StatusCode, Json<ActionOutcome>) {
    let outcome = state
        .ledger
        .submit_vote(AccountId(account_id), request.participant_id)
        .await;
    respond(outcome)
}

/// Form or switch an alliance
pub async fn submit_alliance(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    Json(request): Json<ParticipantActionRequest>,
) -> (StatusCode, Json<ActionOutcome>) {
    let outcome = state
        .ledger
        .submit_alliance(AccountId(account_id), request.participant_id)
        .await;
    respond(outcome)
}

/// Donate points to an objective
pub async fn submit_donation(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    Json(request): Json<DonationRequest>,
) -> (StatusCode, Json<ActionOutcome>) {
    let outcome = state
        .ledger
        .submit_donation(AccountId(account_id), request.objective_id, request.amount)
        .await;
    respond(outcome)
}

fn respond(outcome: ActionOutcome) -> (StatusCode, Json<ActionOutcome>) {
    (outcome_status(&outcome), Json(outcome))
}

fn outcome_status(outcome: &ActionOutcome) -> StatusCode {
    match outcome.code.as_deref() {
        None => StatusCode::OK,
        Some(code) => status_for_code(code),
    }
}
