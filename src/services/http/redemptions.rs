use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use super::{dispatch, ApiError, AppState, CurrentUser};
use crate::{
    models::{
        pagination::PageQuery,
        redemptions::{NewRedemption, RedemptionStatus, StatusUpdate},
    },
    services::redemptions::RedemptionRequest,
};

pub async fn get_balance(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let balance = dispatch(&state.redemption_channel, |response| {
        RedemptionRequest::GetBalance { user_id, response }
    })
    .await?;

    Ok(Json(balance))
}

pub async fn create_redemption(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(redemption): Json<NewRedemption>,
) -> Result<impl IntoResponse, ApiError> {
    let redemption = dispatch(&state.redemption_channel, |response| RedemptionRequest::Create {
        user_id,
        redemption,
        response,
    })
    .await?;

    Ok((StatusCode::CREATED, Json(redemption)))
}

pub async fn list_my_redemptions(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let redemptions = dispatch(&state.redemption_channel, |response| {
        RedemptionRequest::ListForUser { user_id, response }
    })
    .await?;

    Ok(Json(redemptions))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    status: Option<RedemptionStatus>,
}

pub async fn list_redemptions(
    State(state): State<AppState>,
    Query(filter): Query<StatusQuery>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let redemptions = dispatch(&state.redemption_channel, |response| RedemptionRequest::List {
        status: filter.status,
        page: page.into(),
        response,
    })
    .await?;

    Ok(Json(redemptions))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let redemption = dispatch(&state.redemption_channel, |response| {
        RedemptionRequest::UpdateStatus {
            id,
            update,
            response,
        }
    })
    .await?;

    Ok(Json(redemption))
}
