use axum::{
    extract::{Path, Query, State},
    response::Redirect,
};
use serde::Deserialize;

use super::{dispatch, ApiError, AppState, ClientVisitor, MaybeUser};
use crate::{models::clicks::Attribution, services::tracking::TrackingRequest};

#[derive(Debug, Deserialize)]
pub struct ReferralQuery {
    #[serde(rename = "ref")]
    referral: Option<String>,
}

async fn redirect(
    state: &AppState,
    offer_id: String,
    attribution: Attribution,
    visitor: ClientVisitor,
) -> Result<Redirect, ApiError> {
    let ClientVisitor(visitor) = visitor;
    let url = dispatch(&state.tracking_channel, |response| TrackingRequest::Click {
        offer_id,
        attribution,
        visitor,
        response,
    })
    .await?;

    Ok(Redirect::temporary(&url))
}

pub async fn referral_redirect(
    State(state): State<AppState>,
    Path(offer_id): Path<String>,
    Query(query): Query<ReferralQuery>,
    visitor: ClientVisitor,
) -> Result<Redirect, ApiError> {
    let sub_id = query.referral.filter(|r| !r.trim().is_empty());
    redirect(&state, offer_id, Attribution::Referral { sub_id }, visitor).await
}

pub async fn user_redirect(
    State(state): State<AppState>,
    Path(offer_id): Path<String>,
    MaybeUser(user_id): MaybeUser,
    visitor: ClientVisitor,
) -> Result<Redirect, ApiError> {
    redirect(&state, offer_id, Attribution::User { user_id }, visitor).await
}
