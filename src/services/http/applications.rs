use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use super::{dispatch, ApiError, AppState, MaybeUser};
use crate::{
    models::{
        applications::{ApplicationStatus, Approval, NewApplication, Rejection},
        pagination::PageQuery,
    },
    services::applications::ApplicationRequest,
};

pub async fn submit_application(
    State(state): State<AppState>,
    MaybeUser(profile_id): MaybeUser,
    Json(application): Json<NewApplication>,
) -> Result<impl IntoResponse, ApiError> {
    let application = dispatch(&state.application_channel, |response| {
        ApplicationRequest::Submit {
            profile_id,
            application,
            response,
        }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(application)))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    status: Option<ApplicationStatus>,
}

pub async fn list_applications(
    State(state): State<AppState>,
    Query(filter): Query<StatusQuery>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let applications = dispatch(&state.application_channel, |response| {
        ApplicationRequest::List {
            status: filter.status,
            page: page.into(),
            response,
        }
    })
    .await?;

    Ok(Json(applications))
}

pub async fn approve_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(approval): Json<Approval>,
) -> Result<impl IntoResponse, ApiError> {
    let application = dispatch(&state.application_channel, |response| {
        ApplicationRequest::Approve {
            id,
            approval,
            response,
        }
    })
    .await?;

    Ok(Json(application))
}

/// The body is optional; an empty one rejects without a reason.
pub async fn reject_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
    rejection: Option<Json<Rejection>>,
) -> Result<impl IntoResponse, ApiError> {
    let rejection = rejection.map(|Json(r)| r).unwrap_or_default();
    let application = dispatch(&state.application_channel, |response| {
        ApplicationRequest::Reject {
            id,
            rejection,
            response,
        }
    })
    .await?;

    Ok(Json(application))
}
