use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::{
    models::{
        clicks::{Attribution, NewClick, Visitor},
        partners::OfferListing,
        profiles::Profile,
    },
    repositories::{clicks::ClickStore, partners::PartnerStore, profiles::ProfileStore},
    utils,
};

pub enum TrackingRequest {
    /// Records a click-through and answers with the outbound URL.
    Click {
        offer_id: String,
        attribution: Attribution,
        visitor: Visitor,
        response: oneshot::Sender<Result<String, ServiceError>>,
    },
    /// Drops one cached offer, or all of them when `offer_id` is `None`.
    InvalidateOffers { offer_id: Option<String> },
}

#[derive(Clone)]
pub struct TrackingRequestHandler {
    partners: Arc<dyn PartnerStore>,
    clicks: Arc<dyn ClickStore>,
    profiles: Arc<dyn ProfileStore>,
    offer_cache: Arc<DashMap<String, OfferListing>>,
}

impl TrackingRequestHandler {
    pub fn new(
        partners: Arc<dyn PartnerStore>,
        clicks: Arc<dyn ClickStore>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Self {
        Self {
            partners,
            clicks,
            profiles,
            offer_cache: Arc::new(DashMap::new()),
        }
    }

    async fn lookup_offer(&self, offer_id: &str) -> Result<OfferListing, ServiceError> {
        if let Some(offer) = self.offer_cache.get(offer_id) {
            return Ok(offer.clone());
        }

        let offer = self
            .partners
            .get_offer(offer_id)
            .await
            .map_err(ServiceError::repository("Tracking"))?
            .ok_or_else(|| ServiceError::NotFound(format!("offer {offer_id}")))?;
        self.offer_cache.insert(offer.id.clone(), offer.clone());

        Ok(offer)
    }

    async fn find_profile(&self, attribution: &Attribution) -> Option<Profile> {
        let result = match attribution {
            Attribution::Referral {
                sub_id: Some(sub_id),
            } => self.profiles.get_profile_by_sub_id(sub_id).await,
            Attribution::User {
                user_id: Some(user_id),
            } => self.profiles.get_profile(user_id).await,
            _ => return None,
        };

        match result {
            Ok(profile) => {
                if profile.is_none() {
                    log::debug!("Unknown attribution {:?}, tracking anonymously.", attribution);
                }
                profile
            }
            Err(e) => {
                log::warn!("Could not resolve attribution {:?}: {}", attribution, e);
                None
            }
        }
    }

    /// Resolves the offer, records the click on a best-effort basis and
    /// builds the partner URL carrying the sub-ID.
    async fn track_click(
        &self,
        offer_id: &str,
        attribution: Attribution,
        visitor: Visitor,
    ) -> Result<String, ServiceError> {
        let offer = self.lookup_offer(offer_id).await?;
        if !offer.active {
            return Err(ServiceError::NotFound(format!("offer {offer_id}")));
        }

        let profile = self.find_profile(&attribution).await;
        let (user_id, influencer_id, fallback_sub_id) = match (&attribution, &profile) {
            (Attribution::Referral { .. }, Some(referrer)) => {
                (None, Some(referrer.id.clone()), Some(referrer.sub_id.clone()))
            }
            (Attribution::User { .. }, Some(user)) => {
                (Some(user.id.clone()), user.referred_by.clone(), None)
            }
            _ => (None, None, None),
        };

        let click = NewClick {
            id: utils::new_id(),
            offer_id: offer.id.clone(),
            user_id,
            influencer_id,
            ip_hash: visitor.ip.as_deref().map(|ip| utils::sha256_hex(ip.as_bytes())),
            user_agent: visitor.user_agent,
        };

        let sub_id = match self.clicks.insert_click(&click).await {
            Ok(click) => {
                log::info!("Recorded click {} on offer {}.", click.id, offer.id);
                Some(click.id)
            }
            Err(e) => {
                log::warn!("Could not record click on offer {}: {}", offer.id, e);
                fallback_sub_id
            }
        };

        let url = match sub_id {
            Some(sub_id) => {
                utils::build_outbound_url(&offer.target_url, &offer.subid_param, &sub_id)
            }
            None => offer.target_url.clone(),
        };

        Ok(url)
    }

    fn invalidate(&self, offer_id: Option<&str>) {
        match offer_id {
            Some(id) => {
                self.offer_cache.remove(id);
            }
            None => self.offer_cache.clear(),
        }
    }
}

#[async_trait]
impl RequestHandler<TrackingRequest> for TrackingRequestHandler {
    async fn handle_request(&self, request: TrackingRequest) {
        match request {
            TrackingRequest::Click {
                offer_id,
                attribution,
                visitor,
                response,
            } => {
                let url = self.track_click(&offer_id, attribution, visitor).await;
                let _ = response.send(url);
            }
            TrackingRequest::InvalidateOffers { offer_id } => {
                self.invalidate(offer_id.as_deref());
            }
        }
    }
}

pub struct TrackingService;

impl TrackingService {
    pub fn new() -> Self {
        TrackingService {}
    }
}

#[async_trait]
impl Service<TrackingRequest, TrackingRequestHandler> for TrackingService {}
