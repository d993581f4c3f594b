use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use super::{dispatch, ApiError, AppState};
use crate::{
    models::{
        pagination::PageQuery,
        partners::{NewOffer, NewPartner, PartnerUpdate},
    },
    services::partners::PartnerRequest,
};

pub async fn list_offers(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let offers = dispatch(&state.partner_channel, |response| PartnerRequest::ListOffers {
        response,
    })
    .await?;

    Ok(Json(offers))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    search: Option<String>,
}

pub async fn list_partners(
    State(state): State<AppState>,
    Query(filter): Query<SearchQuery>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let partners = dispatch(&state.partner_channel, |response| PartnerRequest::List {
        search: filter.search,
        page: page.into(),
        response,
    })
    .await?;

    Ok(Json(partners))
}

pub async fn get_partner(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let partner = dispatch(&state.partner_channel, |response| PartnerRequest::Get {
        id,
        response,
    })
    .await?;

    Ok(Json(partner))
}

pub async fn create_partner(
    State(state): State<AppState>,
    Json(partner): Json<NewPartner>,
) -> Result<impl IntoResponse, ApiError> {
    let partner = dispatch(&state.partner_channel, |response| PartnerRequest::Create {
        partner,
        response,
    })
    .await?;

    Ok((StatusCode::CREATED, Json(partner)))
}

pub async fn update_partner(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<PartnerUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let partner = dispatch(&state.partner_channel, |response| PartnerRequest::Update {
        id,
        update,
        response,
    })
    .await?;

    Ok(Json(partner))
}

pub async fn delete_partner(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    dispatch(&state.partner_channel, |response| PartnerRequest::Delete { id, response }).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn partner_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = dispatch(&state.partner_channel, |response| PartnerRequest::Stats {
        id,
        response,
    })
    .await?;

    Ok(Json(stats))
}

/// Takes the raw `text/csv` upload.
pub async fn import_partners(
    State(state): State<AppState>,
    csv: String,
) -> Result<impl IntoResponse, ApiError> {
    let report = dispatch(&state.partner_channel, |response| PartnerRequest::Import {
        csv,
        response,
    })
    .await?;

    Ok(Json(report))
}

pub async fn create_offer(
    State(state): State<AppState>,
    Json(offer): Json<NewOffer>,
) -> Result<impl IntoResponse, ApiError> {
    let offer = dispatch(&state.partner_channel, |response| PartnerRequest::CreateOffer {
        offer,
        response,
    })
    .await?;

    Ok((StatusCode::CREATED, Json(offer)))
}

#[derive(Debug, Deserialize)]
pub struct ActiveToggle {
    active: bool,
}

pub async fn set_offer_active(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(toggle): Json<ActiveToggle>,
) -> Result<impl IntoResponse, ApiError> {
    let offer = dispatch(&state.partner_channel, |response| PartnerRequest::SetOfferActive {
        id,
        active: toggle.active,
        response,
    })
    .await?;

    Ok(Json(offer))
}
