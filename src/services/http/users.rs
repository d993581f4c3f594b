use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use super::{dispatch, ApiError, AppState, CurrentUser};
use crate::{
    models::{
        pagination::PageQuery,
        profiles::{NewProfile, ProfileFilter, RoleUpdate},
    },
    services::profiles::ProfileRequest,
};

pub async fn create_profile(
    State(state): State<AppState>,
    Json(profile): Json<NewProfile>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = dispatch(&state.profile_channel, |response| ProfileRequest::Create {
        profile,
        response,
    })
    .await?;

    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn get_me(
    State(state): State<AppState>,
    CurrentUser(id): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let profile = dispatch(&state.profile_channel, |response| ProfileRequest::Get {
        id,
        response,
    })
    .await?;

    Ok(Json(profile))
}

pub async fn list_profiles(
    State(state): State<AppState>,
    Query(filter): Query<ProfileFilter>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let profiles = dispatch(&state.profile_channel, |response| ProfileRequest::List {
        filter,
        page: page.into(),
        response,
    })
    .await?;

    Ok(Json(profiles))
}

pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<RoleUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = dispatch(&state.profile_channel, |response| ProfileRequest::UpdateRole {
        id,
        update,
        response,
    })
    .await?;

    Ok(Json(profile))
}

pub async fn get_balance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let balance = dispatch(&state.profile_channel, |response| ProfileRequest::GetBalance {
        id,
        response,
    })
    .await?;

    Ok(Json(balance))
}
