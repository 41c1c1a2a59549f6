//! Administrative seeding and consistency handlers

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use fanledger_service::ReconciliationReport;
use fanledger_types::{
    Account, AccountId, Challenge, DonationObjective, NewChallenge, NewObjective, NewParticipant,
    NewVideo, Participant, ParticipantId, TopVideo,
};
use serde::Deserialize;

/// Open account request
#[derive(Debug, Deserialize)]
pub struct OpenAccountRequest {
    pub nickname: String,
}

/// Credit request
#[derive(Debug, Deserialize)]
pub struct CreditRequest {
    pub amount: i64,
}

/// Removal flag request
#[derive(Debug, Deserialize)]
pub struct RemovalRequest {
    pub removed: bool,
}

/// Open a zero-balance account
pub async fn open_account(
    State(state): State<AppState>,
    Json(request): Json<OpenAccountRequest>,
) -> ApiResult<(StatusCode, Json<Account>)> {
    let account = state.ledger.open_account(&request.nickname).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// Credit earned points
pub async fn credit_points(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<CreditRequest>,
) -> ApiResult<Json<Account>> {
    let account = state
        .ledger
        .credit_points(AccountId(id), request.amount)
        .await?;
    Ok(Json(account))
}

/// Register a participant
pub async fn add_participant(
    State(state): State<AppState>,
    Json(request): Json<NewParticipant>,
) -> ApiResult<(StatusCode, Json<Participant>)> {
    let participant = state.ledger.add_participant(request).await?;
    Ok((StatusCode::CREATED, Json(participant)))
}

/// Set or clear a participant's removed flag
pub async fn set_participant_removed(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<RemovalRequest>,
) -> ApiResult<Json<Participant>> {
    let participant = state
        .ledger
        .set_participant_removed(ParticipantId(id), request.removed)
        .await?;
    Ok(Json(participant))
}

/// Open a donation objective
pub async fn add_objective(
    State(state): State<AppState>,
    Json(request): Json<NewObjective>,
) -> ApiResult<(StatusCode, Json<DonationObjective>)> {
    let objective = state.ledger.add_objective(request).await?;
    Ok((StatusCode::CREATED, Json(objective)))
}

/// Attach a top video to a participant
pub async fn add_video(
    State(state): State<AppState>,
    Json(request): Json<NewVideo>,
) -> ApiResult<(StatusCode, Json<TopVideo>)> {
    let video = state.ledger.add_video(request).await?;
    Ok((StatusCode::CREATED, Json(video)))
}

/// Post a challenge for a participant
pub async fn add_challenge(
    State(state): State<AppState>,
    Json(request): Json<NewChallenge>,
) -> ApiResult<(StatusCode, Json<Challenge>)> {
    let challenge = state.ledger.add_challenge(request).await?;
    Ok((StatusCode::CREATED, Json(challenge)))
}

/// Recompute counters from the action log and report drift
pub async fn reconcile(State(state): State<AppState>) -> ApiResult<Json<ReconciliationReport>> {
    let report = state.ledger.reconcile().await?;
    Ok(Json(report))
}
