use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::{dispatch, ApiError, AppState};
use crate::{
    models::{leads::LeadOutcome, pagination::PageQuery},
    services::leads::LeadRequest,
};

pub async fn partner_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let outcome = dispatch(&state.lead_channel, |response| LeadRequest::Webhook {
        authorization,
        body: body.to_vec(),
        response,
    })
    .await?;

    let response = match outcome {
        LeadOutcome::Created(lead) => (
            StatusCode::CREATED,
            Json(json!({"status": "created", "lead_id": lead.id})),
        ),
        LeadOutcome::Duplicate { lead_id } => (
            StatusCode::OK,
            Json(json!({"status": "duplicate", "lead_id": lead_id})),
        ),
    };

    Ok(response)
}

pub async fn approve_lead(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let lead = dispatch(&state.lead_channel, |response| LeadRequest::Approve {
        id,
        response,
    })
    .await?;

    Ok(Json(lead))
}

#[derive(Debug, Deserialize)]
pub struct EventQuery {
    click_id: Option<String>,
}

pub async fn list_events(
    State(state): State<AppState>,
    Query(filter): Query<EventQuery>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let events = dispatch(&state.lead_channel, |response| LeadRequest::ListEvents {
        click_id: filter.click_id,
        page: page.into(),
        response,
    })
    .await?;

    Ok(Json(events))
}
