use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::{
    repositories::{
        applications::ApplicationRepository, clicks::ClickRepository, events::EventRepository,
        giftcards::GiftCardApi, leads::LeadRepository, partners::PartnerRepository,
        profiles::ProfileRepository, redemptions::RedemptionRepository,
    },
    settings::Settings,
};

pub mod applications;
pub mod http;
pub mod leads;
pub mod partners;
pub mod profiles;
pub mod redemptions;
pub mod tracking;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Repository error: {0} - {1}")]
    Repository(String, String),
    #[error("External service error: {0} -> {1} => {2}")]
    ExternalService(String, String, String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    Invalid(String),
    #[error("Malformed payload: {0}")]
    Malformed(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Insufficient balance: {available_cents} cents available")]
    InsufficientBalance { available_cents: i64 },
    #[error("Unauthorized")]
    Unauthorized,
}

impl ServiceError {
    pub fn repository(service: &str) -> impl Fn(anyhow::Error) -> ServiceError + '_ {
        move |e| ServiceError::Repository(service.to_string(), e.to_string())
    }
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

pub async fn start_services(pool: PgPool, settings: Settings) -> Result<(), anyhow::Error> {
    let (tracking_tx, mut tracking_rx) = mpsc::channel(512);
    let (lead_tx, mut lead_rx) = mpsc::channel(512);
    let (redemption_tx, mut redemption_rx) = mpsc::channel(512);
    let (profile_tx, mut profile_rx) = mpsc::channel(512);
    let (partner_tx, mut partner_rx) = mpsc::channel(512);
    let (application_tx, mut application_rx) = mpsc::channel(512);

    let profiles = Arc::new(ProfileRepository::new(pool.clone()));
    let partners = Arc::new(PartnerRepository::new(pool.clone()));
    let clicks = Arc::new(ClickRepository::new(pool.clone()));
    let leads = Arc::new(LeadRepository::new(pool.clone()));
    let redemptions = Arc::new(RedemptionRepository::new(pool.clone()));
    let applications = Arc::new(ApplicationRepository::new(pool.clone()));
    let events = Arc::new(EventRepository::new(pool.clone()));

    log::info!("Starting tracking service.");
    let tracking_handler =
        tracking::TrackingRequestHandler::new(partners.clone(), clicks.clone(), profiles.clone());
    tokio::spawn(async move {
        tracking::TrackingService::new()
            .run(tracking_handler, &mut tracking_rx)
            .await;
    });

    log::info!("Starting lead service.");
    let lead_handler = leads::LeadRequestHandler::new(
        leads::LeadPolicy {
            webhook_secret: settings.webhook.secret,
            auto_approve: settings.leads.auto_approve,
            influencer_share_bps: settings.leads.influencer_share_bps,
        },
        leads,
        clicks,
        partners.clone(),
        events,
    );
    tokio::spawn(async move {
        leads::LeadService::new()
            .run(lead_handler, &mut lead_rx)
            .await;
    });

    log::info!("Starting redemption service.");
    let gift_cards = Arc::new(GiftCardApi::new(
        settings.gift_cards.api_key,
        settings.gift_cards.url,
        settings.redemptions.currency,
    ));
    let redemption_handler = redemptions::RedemptionRequestHandler::new(
        redemptions.clone(),
        gift_cards,
        settings.redemptions.min_amount_cents,
    );
    tokio::spawn(async move {
        redemptions::RedemptionService::new()
            .run(redemption_handler, &mut redemption_rx)
            .await;
    });

    log::info!("Starting profile service.");
    let profile_handler =
        profiles::ProfileRequestHandler::new(profiles, partners.clone(), redemptions);
    tokio::spawn(async move {
        profiles::ProfileService::new()
            .run(profile_handler, &mut profile_rx)
            .await;
    });

    log::info!("Starting partner service.");
    let partner_handler = partners::PartnerRequestHandler::new(partners, tracking_tx.clone());
    tokio::spawn(async move {
        partners::PartnerService::new()
            .run(partner_handler, &mut partner_rx)
            .await;
    });

    log::info!("Starting application service.");
    let application_handler = applications::ApplicationRequestHandler::new(applications);
    tokio::spawn(async move {
        applications::ApplicationService::new()
            .run(application_handler, &mut application_rx)
            .await;
    });

    log::info!("Starting HTTP server.");
    let state = http::AppState {
        tracking_channel: tracking_tx,
        lead_channel: lead_tx,
        redemption_channel: redemption_tx,
        profile_channel: profile_tx,
        partner_channel: partner_tx,
        application_channel: application_tx,
        admin_token: Arc::new(settings.admin.api_token),
    };

    http::start_http_server(&settings.http.listen, state).await
}
