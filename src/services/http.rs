use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{header, request::Parts, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::{
    applications::ApplicationRequest, leads::LeadRequest, partners::PartnerRequest,
    profiles::ProfileRequest, redemptions::RedemptionRequest, tracking::TrackingRequest,
    ServiceError,
};
use crate::{models::clicks::Visitor, utils};

mod applications;
mod partners;
mod redemptions;
mod tracking;
mod users;
mod webhooks;

const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub tracking_channel: mpsc::Sender<TrackingRequest>,
    pub lead_channel: mpsc::Sender<LeadRequest>,
    pub redemption_channel: mpsc::Sender<RedemptionRequest>,
    pub profile_channel: mpsc::Sender<ProfileRequest>,
    pub partner_channel: mpsc::Sender<PartnerRequest>,
    pub application_channel: mpsc::Sender<ApplicationRequest>,
    pub admin_token: Arc<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("Failed to reach service: {0}")]
    Channel(String),
    #[error("Missing or invalid credentials")]
    Unauthorized,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Service(e) => match e {
                ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ServiceError::Malformed(_) => StatusCode::BAD_REQUEST,
                ServiceError::Conflict(_) | ServiceError::InsufficientBalance { .. } => {
                    StatusCode::CONFLICT
                }
                ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
                ServiceError::ExternalService(..) => StatusCode::BAD_GATEWAY,
                ServiceError::Internal(_) | ServiceError::Repository(..) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Channel(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ApiError::Service(ServiceError::NotFound(_)) => "Not found",
            ApiError::Service(ServiceError::Invalid(_)) => "Validation failed",
            ApiError::Service(ServiceError::Malformed(_)) => "Bad request",
            ApiError::Service(ServiceError::Conflict(_)) => "Conflict",
            ApiError::Service(ServiceError::InsufficientBalance { .. }) => "Insufficient balance",
            ApiError::Service(ServiceError::Unauthorized) | ApiError::Unauthorized => {
                "Unauthorized"
            }
            ApiError::Service(ServiceError::ExternalService(..)) => "Upstream provider error",
            _ => "Internal server error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }

        let mut body = json!({
            "error": self.title(),
            "details": self.to_string(),
        });
        if let ApiError::Service(ServiceError::InsufficientBalance { available_cents }) = self {
            body["available_cents"] = json!(available_cents);
        }

        (status, Json(body)).into_response()
    }
}

/// Sends a request to a service actor and waits for its answer.
pub(crate) async fn dispatch<R, T>(
    channel: &mpsc::Sender<R>,
    request: impl FnOnce(oneshot::Sender<Result<T, ServiceError>>) -> R,
) -> Result<T, ApiError> {
    let (response_tx, response_rx) = oneshot::channel();

    channel
        .send(request(response_tx))
        .await
        .map_err(|e| ApiError::Channel(e.to_string()))?;

    let result = response_rx
        .await
        .map_err(|e| ApiError::Channel(e.to_string()))?;

    Ok(result?)
}

/// Guard for admin routes: `Authorization: Bearer <admin token>`.
pub struct AdminAuth;

impl<S> FromRequestParts<S> for AdminAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let authorized = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(utils::bearer_token)
            .is_some_and(|token| utils::secret_matches(token, &state.admin_token));

        if authorized {
            Ok(AdminAuth)
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

fn user_id(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// The caller's profile id, as set by the auth gateway.
pub struct CurrentUser(pub String);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_id(parts).map(CurrentUser).ok_or(ApiError::Unauthorized)
    }
}

pub struct MaybeUser(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(user_id(parts)))
    }
}

/// Visitor details for click logging. The address is the first
/// `x-forwarded-for` hop, falling back to the peer address.
pub struct ClientVisitor(pub Visitor);

impl<S: Send + Sync> FromRequestParts<S> for ClientVisitor {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_value = |name: header::HeaderName| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        let forwarded = header_value(header::HeaderName::from_static("x-forwarded-for"))
            .and_then(|value| {
                value
                    .split(',')
                    .next()
                    .map(str::trim)
                    .filter(|ip| !ip.is_empty())
                    .map(str::to_string)
            });
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(ClientVisitor(Visitor {
            ip: forwarded.or(peer),
            user_agent: header_value(header::USER_AGENT),
        }))
    }
}

pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/leads/{id}/approve", post(webhooks::approve_lead))
        .route("/events", get(webhooks::list_events))
        .route("/redemptions", get(redemptions::list_redemptions))
        .route("/redemptions/{id}/status", put(redemptions::update_status))
        .route("/users", get(users::list_profiles))
        .route("/users/{id}/role", put(users::update_role))
        .route("/users/{id}/balance", get(users::get_balance))
        .route(
            "/partners",
            get(partners::list_partners).post(partners::create_partner),
        )
        .route("/partners/import", post(partners::import_partners))
        .route(
            "/partners/{id}",
            get(partners::get_partner)
                .put(partners::update_partner)
                .delete(partners::delete_partner),
        )
        .route("/partners/{id}/stats", get(partners::partner_stats))
        .route("/offers", post(partners::create_offer))
        .route("/offers/{id}/active", put(partners::set_offer_active))
        .route("/applications", get(applications::list_applications))
        .route(
            "/applications/{id}/approve",
            post(applications::approve_application),
        )
        .route(
            "/applications/{id}/reject",
            post(applications::reject_application),
        )
        .route_layer(middleware::from_extractor_with_state::<AdminAuth, _>(
            state.clone(),
        ));

    Router::new()
        .route("/r/{offer_id}", get(tracking::referral_redirect))
        .route("/go/{offer_id}", get(tracking::user_redirect))
        .route("/api/webhooks/partner", post(webhooks::partner_webhook))
        .route("/api/offers", get(partners::list_offers))
        .route("/api/profiles", post(users::create_profile))
        .route("/api/me", get(users::get_me))
        .route("/api/me/balance", get(redemptions::get_balance))
        .route(
            "/api/me/redemptions",
            get(redemptions::list_my_redemptions).post(redemptions::create_redemption),
        )
        .route("/api/applications", post(applications::submit_application))
        .nest("/api/admin", admin)
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(listen: &str, state: AppState) -> Result<(), anyhow::Error> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
