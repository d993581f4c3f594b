use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};

use super::{tracking::TrackingRequest, RequestHandler, Service, ServiceError};
use crate::{
    models::{
        pagination::{Page, Paginated},
        partners::{
            NewOffer, NewPartner, Offer, Partner, PartnerDeletion, PartnerStats, PartnerUpdate,
            PublicOffer,
        },
    },
    repositories::partners::PartnerStore,
    utils,
};

pub mod import;

use import::ImportReport;

pub enum PartnerRequest {
    List {
        search: Option<String>,
        page: Page,
        response: oneshot::Sender<Result<Paginated<Partner>, ServiceError>>,
    },
    Get {
        id: String,
        response: oneshot::Sender<Result<Partner, ServiceError>>,
    },
    Create {
        partner: NewPartner,
        response: oneshot::Sender<Result<Partner, ServiceError>>,
    },
    Update {
        id: String,
        update: PartnerUpdate,
        response: oneshot::Sender<Result<Partner, ServiceError>>,
    },
    Delete {
        id: String,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
    Stats {
        id: String,
        response: oneshot::Sender<Result<PartnerStats, ServiceError>>,
    },
    Import {
        csv: String,
        response: oneshot::Sender<Result<ImportReport, ServiceError>>,
    },
    ListOffers {
        response: oneshot::Sender<Result<Vec<PublicOffer>, ServiceError>>,
    },
    CreateOffer {
        offer: NewOffer,
        response: oneshot::Sender<Result<Offer, ServiceError>>,
    },
    SetOfferActive {
        id: String,
        active: bool,
        response: oneshot::Sender<Result<Offer, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct PartnerRequestHandler {
    repository: Arc<dyn PartnerStore>,
    tracking_channel: mpsc::Sender<TrackingRequest>,
}

impl PartnerRequestHandler {
    pub fn new(
        repository: Arc<dyn PartnerStore>,
        tracking_channel: mpsc::Sender<TrackingRequest>,
    ) -> Self {
        Self {
            repository,
            tracking_channel,
        }
    }

    /// Tells the tracking service to drop cached offers, all of them when
    /// `offer_id` is `None`.
    async fn invalidate_offers(&self, offer_id: Option<String>) {
        if let Err(e) = self
            .tracking_channel
            .send(TrackingRequest::InvalidateOffers { offer_id })
            .await
        {
            log::error!("Could not invalidate offer cache: {}", e);
        }
    }

    async fn list_partners(
        &self,
        search: Option<String>,
        page: Page,
    ) -> Result<Paginated<Partner>, ServiceError> {
        let (partners, total) = self
            .repository
            .list_partners(search.as_deref(), page)
            .await
            .map_err(ServiceError::repository("Partners"))?;

        Ok(Paginated::new(partners, total, page))
    }

    async fn get_partner(&self, id: &str) -> Result<Partner, ServiceError> {
        self.repository
            .get_partner(id)
            .await
            .map_err(ServiceError::repository("Partners"))?
            .ok_or_else(|| ServiceError::NotFound(format!("partner {id}")))
    }

    async fn create_partner(&self, partner: NewPartner) -> Result<Partner, ServiceError> {
        partner.validate().map_err(ServiceError::Invalid)?;

        let created = self
            .repository
            .insert_partner(&utils::new_id(), &partner)
            .await
            .map_err(ServiceError::repository("Partners"))?
            .ok_or_else(|| {
                ServiceError::Conflict(format!("partner {} already exists", partner.name.trim()))
            })?;

        log::info!("Created partner {} ({}).", created.name, created.id);
        Ok(created)
    }

    async fn update_partner(
        &self,
        id: &str,
        update: PartnerUpdate,
    ) -> Result<Partner, ServiceError> {
        let current = self.get_partner(id).await?;
        let updated = update.apply(&current).map_err(ServiceError::Invalid)?;

        let saved = self
            .repository
            .save_partner(&updated)
            .await
            .map_err(ServiceError::repository("Partners"))?
            .ok_or_else(|| ServiceError::NotFound(format!("partner {id}")))?;

        self.invalidate_offers(None).await;
        log::info!(
            "Updated partner {}, effective rate now {} bps.",
            saved.id,
            saved.effective_rate_bps(Utc::now())
        );
        Ok(saved)
    }

    async fn delete_partner(&self, id: &str) -> Result<(), ServiceError> {
        let deletion = self
            .repository
            .delete_partner(id)
            .await
            .map_err(ServiceError::repository("Partners"))?;

        match deletion {
            PartnerDeletion::Deleted => {}
            PartnerDeletion::NotFound => {
                return Err(ServiceError::NotFound(format!("partner {id}")));
            }
            PartnerDeletion::HasLeads => {
                let leads = self
                    .repository
                    .count_partner_leads(id)
                    .await
                    .map_err(ServiceError::repository("Partners"))?;
                return Err(ServiceError::Conflict(format!(
                    "partner {id} still has {leads} leads"
                )));
            }
        }

        self.invalidate_offers(None).await;
        log::info!("Deleted partner {}.", id);
        Ok(())
    }

    async fn partner_stats(&self, id: &str) -> Result<PartnerStats, ServiceError> {
        self.get_partner(id).await?;

        self.repository
            .partner_stats(id)
            .await
            .map_err(ServiceError::repository("Partners"))
    }

    async fn import_partners(&self, csv: &str) -> Result<ImportReport, ServiceError> {
        let parsed = import::parse_partners(csv).map_err(ServiceError::Malformed)?;

        let mut report = ImportReport {
            imported: 0,
            skipped: parsed.skipped,
        };
        for (line, partner) in parsed.partners {
            self.repository
                .upsert_partner(&utils::new_id(), &partner)
                .await
                .map_err(|e| {
                    ServiceError::Repository(
                        "Partners".to_string(),
                        format!("import stopped at line {line}: {e}"),
                    )
                })?;
            report.imported += 1;
        }

        if report.imported > 0 {
            self.invalidate_offers(None).await;
        }
        log::info!(
            "Imported {} partners, skipped {} rows.",
            report.imported,
            report.skipped.len()
        );
        Ok(report)
    }

    async fn list_offers(&self) -> Result<Vec<PublicOffer>, ServiceError> {
        let now = Utc::now();
        let offers = self
            .repository
            .list_active_offers()
            .await
            .map_err(ServiceError::repository("Partners"))?;

        Ok(offers
            .iter()
            .map(|offer| PublicOffer::from_listing(offer, now))
            .collect())
    }

    async fn create_offer(&self, offer: NewOffer) -> Result<Offer, ServiceError> {
        offer.validate().map_err(ServiceError::Invalid)?;
        self.get_partner(&offer.partner_id).await?;

        let created = self
            .repository
            .insert_offer(&utils::new_id(), &offer)
            .await
            .map_err(ServiceError::repository("Partners"))?;

        log::info!("Created offer {} for partner {}.", created.id, created.partner_id);
        Ok(created)
    }

    async fn set_offer_active(&self, id: &str, active: bool) -> Result<Offer, ServiceError> {
        let offer = self
            .repository
            .set_offer_active(id, active)
            .await
            .map_err(ServiceError::repository("Partners"))?
            .ok_or_else(|| ServiceError::NotFound(format!("offer {id}")))?;

        self.invalidate_offers(Some(offer.id.clone())).await;
        Ok(offer)
    }
}

#[async_trait]
impl RequestHandler<PartnerRequest> for PartnerRequestHandler {
    async fn handle_request(&self, request: PartnerRequest) {
        match request {
            PartnerRequest::List {
                search,
                page,
                response,
            } => {
                let partners = self.list_partners(search, page).await;
                let _ = response.send(partners);
            }
            PartnerRequest::Get { id, response } => {
                let partner = self.get_partner(&id).await;
                let _ = response.send(partner);
            }
            PartnerRequest::Create { partner, response } => {
                let partner = self.create_partner(partner).await;
                let _ = response.send(partner);
            }
            PartnerRequest::Update {
                id,
                update,
                response,
            } => {
                let partner = self.update_partner(&id, update).await;
                let _ = response.send(partner);
            }
            PartnerRequest::Delete { id, response } => {
                let deleted = self.delete_partner(&id).await;
                let _ = response.send(deleted);
            }
            PartnerRequest::Stats { id, response } => {
                let stats = self.partner_stats(&id).await;
                let _ = response.send(stats);
            }
            PartnerRequest::Import { csv, response } => {
                let report = self.import_partners(&csv).await;
                let _ = response.send(report);
            }
            PartnerRequest::ListOffers { response } => {
                let offers = self.list_offers().await;
                let _ = response.send(offers);
            }
            PartnerRequest::CreateOffer { offer, response } => {
                let offer = self.create_offer(offer).await;
                let _ = response.send(offer);
            }
            PartnerRequest::SetOfferActive {
                id,
                active,
                response,
            } => {
                let offer = self.set_offer_active(&id, active).await;
                let _ = response.send(offer);
            }
        }
    }
}

pub struct PartnerService;

impl PartnerService {
    pub fn new() -> Self {
        PartnerService {}
    }
}

#[async_trait]
impl Service<PartnerRequest, PartnerRequestHandler> for PartnerService {}
