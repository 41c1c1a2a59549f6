//! Read-model handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use fanledger_service::{HomeView, ParticipantDetail, PlaygroundView};
use fanledger_types::{AccountId, ParticipantId};
use serde::Deserialize;

/// Optional viewing account. Absent for anonymous visitors.
#[derive(Debug, Default, Deserialize)]
pub struct ViewerQuery {
    pub account_id: Option<i64>,
}

impl ViewerQuery {
    fn viewer(&self) -> ApiResult<Option<AccountId>> {
        match self.account_id {
            Some(id) if id <= 0 => Err(ApiError::BadRequest(format!(
                "account_id must be positive, got {id}"
            ))),
            other => Ok(other.map(AccountId)),
        }
    }
}

/// Leaderboard with the viewer's alliance and votes
pub async fn home(
    State(state): State<AppState>,
    Query(query): Query<ViewerQuery>,
) -> ApiResult<Json<HomeView>> {
    let view = state.ledger.home_view(query.viewer()?).await?;
    Ok(Json(view))
}

/// Removed participants, challenges and active objectives
pub async fn playground(
    State(state): State<AppState>,
    Query(query): Query<ViewerQuery>,
) -> ApiResult<Json<PlaygroundView>> {
    let view = state.ledger.playground_view(query.viewer()?).await?;
    Ok(Json(view))
}

/// One participant's page
pub async fn participant_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ViewerQuery>,
) -> ApiResult<Json<ParticipantDetail>> {
    let detail = state
        .ledger
        .participant_detail(ParticipantId(id), query.viewer()?)
        .await?;
    Ok(Json(detail))
}
