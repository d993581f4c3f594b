use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::{
    models::{
        leads::Balance,
        pagination::{Page, Paginated},
        redemptions::{
            NewRedemption, PayoutKind, Redemption, RedemptionInsert, RedemptionStatus,
            StatusUpdate,
        },
    },
    repositories::{giftcards::GiftCardProvider, redemptions::RedemptionStore},
    utils,
};

pub enum RedemptionRequest {
    GetBalance {
        user_id: String,
        response: oneshot::Sender<Result<Balance, ServiceError>>,
    },
    Create {
        user_id: String,
        redemption: NewRedemption,
        response: oneshot::Sender<Result<Redemption, ServiceError>>,
    },
    ListForUser {
        user_id: String,
        response: oneshot::Sender<Result<Vec<Redemption>, ServiceError>>,
    },
    List {
        status: Option<RedemptionStatus>,
        page: Page,
        response: oneshot::Sender<Result<Paginated<Redemption>, ServiceError>>,
    },
    UpdateStatus {
        id: String,
        update: StatusUpdate,
        response: oneshot::Sender<Result<Redemption, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct RedemptionRequestHandler {
    repository: Arc<dyn RedemptionStore>,
    gift_cards: Arc<dyn GiftCardProvider>,
    min_amount_cents: i64,
}

impl RedemptionRequestHandler {
    pub fn new(
        repository: Arc<dyn RedemptionStore>,
        gift_cards: Arc<dyn GiftCardProvider>,
        min_amount_cents: i64,
    ) -> Self {
        Self {
            repository,
            gift_cards,
            min_amount_cents,
        }
    }

    async fn get_balance(&self, user_id: &str) -> Result<Balance, ServiceError> {
        self.repository
            .get_balance(user_id)
            .await
            .map_err(ServiceError::repository("Redemptions"))
    }

    async fn create_redemption(
        &self,
        user_id: &str,
        redemption: NewRedemption,
    ) -> Result<Redemption, ServiceError> {
        if redemption.amount_cents < self.min_amount_cents.max(1) {
            return Err(ServiceError::Invalid(format!(
                "amount_cents must be at least {}",
                self.min_amount_cents.max(1)
            )));
        }
        redemption.method.validate().map_err(ServiceError::Invalid)?;

        let inserted = self
            .repository
            .insert_redemption(&utils::new_id(), user_id, &redemption)
            .await
            .map_err(ServiceError::repository("Redemptions"))?;

        match inserted {
            RedemptionInsert::Created(redemption) => {
                log::info!(
                    "User {} requested redemption {} of {} cents via {}.",
                    user_id,
                    redemption.id,
                    redemption.amount_cents,
                    redemption.method.as_str()
                );
                Ok(redemption)
            }
            RedemptionInsert::InsufficientBalance { available_cents } => {
                Err(ServiceError::InsufficientBalance { available_cents })
            }
            RedemptionInsert::UnknownUser => {
                Err(ServiceError::NotFound(format!("profile {user_id}")))
            }
        }
    }

    async fn list_user_redemptions(
        &self,
        user_id: &str,
    ) -> Result<Vec<Redemption>, ServiceError> {
        self.repository
            .list_user_redemptions(user_id)
            .await
            .map_err(ServiceError::repository("Redemptions"))
    }

    async fn list_redemptions(
        &self,
        status: Option<RedemptionStatus>,
        page: Page,
    ) -> Result<Paginated<Redemption>, ServiceError> {
        let (redemptions, total) = self
            .repository
            .list_redemptions(status, page)
            .await
            .map_err(ServiceError::repository("Redemptions"))?;

        Ok(Paginated::new(redemptions, total, page))
    }

    async fn update_status(
        &self,
        id: &str,
        update: StatusUpdate,
    ) -> Result<Redemption, ServiceError> {
        let current = self
            .repository
            .get_redemption(id)
            .await
            .map_err(ServiceError::repository("Redemptions"))?
            .ok_or_else(|| ServiceError::NotFound(format!("redemption {id}")))?;

        if current.status.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "redemption {} is already {}",
                id, current.status
            )));
        }

        // A gift card stuck in processing only settles through the provider.
        if current.awaits_voucher() {
            match update.status {
                RedemptionStatus::Processing => {
                    log::info!("Retrying voucher issue for redemption {}.", id);
                    return self.issue_voucher(current).await;
                }
                RedemptionStatus::Paid => {
                    return Err(ServiceError::Conflict(format!(
                        "gift card redemption {id} has no voucher; request processing to reissue"
                    )));
                }
                _ => {}
            }
        }

        if !current.status.can_transition_to(update.status) {
            return Err(ServiceError::Conflict(format!(
                "redemption {} cannot go from {} to {}",
                id, current.status, update.status
            )));
        }

        let updated = self
            .repository
            .update_status(id, current.status, update.status, update.note.as_deref())
            .await
            .map_err(ServiceError::repository("Redemptions"))?
            .ok_or_else(|| {
                ServiceError::Conflict(format!("redemption {id} was modified concurrently"))
            })?;

        log::info!(
            "Redemption {} moved from {} to {}.",
            id,
            current.status,
            updated.status
        );

        if updated.status == RedemptionStatus::Processing && updated.method == PayoutKind::GiftCard
        {
            return self.issue_voucher(updated).await;
        }

        Ok(updated)
    }

    /// Buys the voucher for a processing gift card redemption and settles it.
    /// A provider failure leaves the redemption in processing.
    async fn issue_voucher(&self, redemption: Redemption) -> Result<Redemption, ServiceError> {
        let brand = redemption.gift_card_brand.as_deref().unwrap_or_default();

        let voucher = self
            .gift_cards
            .issue_voucher(&redemption.id, brand, redemption.amount_cents)
            .await
            .map_err(|e| {
                log::error!(
                    "Gift card provider failed for redemption {}: {}",
                    redemption.id,
                    e
                );
                ServiceError::ExternalService(
                    "RedemptionService".to_string(),
                    "GiftCardProvider".to_string(),
                    e.to_string(),
                )
            })?;

        self.repository
            .record_voucher(&redemption.id, &voucher)
            .await
            .map_err(ServiceError::repository("Redemptions"))?
            .ok_or_else(|| {
                ServiceError::Conflict(format!(
                    "redemption {} left processing before the voucher was stored",
                    redemption.id
                ))
            })
    }
}

#[async_trait]
impl RequestHandler<RedemptionRequest> for RedemptionRequestHandler {
    async fn handle_request(&self, request: RedemptionRequest) {
        match request {
            RedemptionRequest::GetBalance { user_id, response } => {
                let balance = self.get_balance(&user_id).await;
                let _ = response.send(balance);
            }
            RedemptionRequest::Create {
                user_id,
                redemption,
                response,
            } => {
                let redemption = self.create_redemption(&user_id, redemption).await;
                let _ = response.send(redemption);
            }
            RedemptionRequest::ListForUser { user_id, response } => {
                let redemptions = self.list_user_redemptions(&user_id).await;
                let _ = response.send(redemptions);
            }
            RedemptionRequest::List {
                status,
                page,
                response,
            } => {
                let redemptions = self.list_redemptions(status, page).await;
                let _ = response.send(redemptions);
            }
            RedemptionRequest::UpdateStatus {
                id,
                update,
                response,
            } => {
                let redemption = self.update_status(&id, update).await;
                let _ = response.send(redemption);
            }
        }
    }
}

pub struct RedemptionService;

impl RedemptionService {
    pub fn new() -> Self {
        RedemptionService {}
    }
}

#[async_trait]
impl Service<RedemptionRequest, RedemptionRequestHandler> for RedemptionService {}
