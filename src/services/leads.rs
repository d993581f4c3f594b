use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::{
    models::{
        events::{EventOutcome, NewWebhookEvent, WebhookEvent},
        leads::{Lead, LeadOutcome, LeadWebhook, NewLead},
        pagination::{Page, Paginated},
        partners,
    },
    repositories::{
        clicks::ClickStore, events::EventStore, leads::LeadStore, partners::PartnerStore,
    },
    utils,
};

const WEBHOOK_SOURCE: &str = "partner_webhook";

pub enum LeadRequest {
    /// A partner conversion callback, as received.
    Webhook {
        authorization: Option<String>,
        body: Vec<u8>,
        response: oneshot::Sender<Result<LeadOutcome, ServiceError>>,
    },
    Approve {
        id: String,
        response: oneshot::Sender<Result<Lead, ServiceError>>,
    },
    ListEvents {
        click_id: Option<String>,
        page: Page,
        response: oneshot::Sender<Result<Paginated<WebhookEvent>, ServiceError>>,
    },
}

#[derive(Clone, Debug)]
pub struct LeadPolicy {
    pub webhook_secret: String,
    pub auto_approve: bool,
    pub influencer_share_bps: i32,
}

impl LeadPolicy {
    /// The user's reward and the influencer's share of it, or `None` when the
    /// amount overflows.
    fn rewards(
        &self,
        amount_cents: Option<i64>,
        rate_bps: i32,
        has_influencer: bool,
    ) -> Option<(i64, i64)> {
        let reward = partners::reward_cents(amount_cents, rate_bps)?;
        let influencer_reward = if has_influencer {
            partners::share_of(reward, self.influencer_share_bps)?
        } else {
            0
        };

        Some((reward, influencer_reward))
    }
}

#[derive(Clone)]
pub struct LeadRequestHandler {
    policy: Arc<LeadPolicy>,
    leads: Arc<dyn LeadStore>,
    clicks: Arc<dyn ClickStore>,
    partners: Arc<dyn PartnerStore>,
    events: Arc<dyn EventStore>,
}

impl LeadRequestHandler {
    pub fn new(
        policy: LeadPolicy,
        leads: Arc<dyn LeadStore>,
        clicks: Arc<dyn ClickStore>,
        partners: Arc<dyn PartnerStore>,
        events: Arc<dyn EventStore>,
    ) -> Self {
        Self {
            policy: Arc::new(policy),
            leads,
            clicks,
            partners,
            events,
        }
    }

    async fn log_event(
        &self,
        outcome: EventOutcome,
        click_id: Option<&str>,
        detail: Option<String>,
        payload: Option<serde_json::Value>,
    ) {
        let event = NewWebhookEvent {
            source: WEBHOOK_SOURCE.to_string(),
            click_id: click_id.map(str::to_string),
            outcome,
            detail,
            payload,
        };

        if let Err(e) = self.events.log_event(&event).await {
            log::warn!("Could not log webhook event {}: {}", outcome.as_str(), e);
        }
    }

    async fn receive_webhook(
        &self,
        authorization: Option<&str>,
        body: &[u8],
    ) -> Result<LeadOutcome, ServiceError> {
        let payload: Option<serde_json::Value> = serde_json::from_slice(body).ok();

        let authorized = authorization
            .and_then(utils::bearer_token)
            .is_some_and(|token| utils::secret_matches(token, &self.policy.webhook_secret));
        if !authorized {
            log::warn!("Rejected partner webhook with missing or invalid secret.");
            self.log_event(EventOutcome::Unauthorized, None, None, payload)
                .await;
            return Err(ServiceError::Unauthorized);
        }

        let webhook: LeadWebhook = match serde_json::from_slice(body) {
            Ok(webhook) => webhook,
            Err(e) => {
                let detail = e.to_string();
                self.log_event(EventOutcome::Malformed, None, Some(detail.clone()), payload)
                    .await;
                return Err(ServiceError::Malformed(detail));
            }
        };
        if webhook.amount_cents.is_some_and(|amount| amount < 0) {
            let detail = "amount_cents must not be negative".to_string();
            self.log_event(
                EventOutcome::Malformed,
                Some(&webhook.click_id),
                Some(detail.clone()),
                payload,
            )
            .await;
            return Err(ServiceError::Malformed(detail));
        }

        self.confirm_lead(webhook, payload).await
    }

    async fn confirm_lead(
        &self,
        webhook: LeadWebhook,
        payload: Option<serde_json::Value>,
    ) -> Result<LeadOutcome, ServiceError> {
        let click_id = webhook.click_id.as_str();

        let click = self
            .clicks
            .get_click(click_id)
            .await
            .map_err(ServiceError::repository("Leads"))?;
        let click = match click {
            Some(click) => click,
            None => {
                log::warn!("Webhook for unknown click {}.", click_id);
                self.log_event(EventOutcome::UnknownClick, Some(click_id), None, payload)
                    .await;
                return Err(ServiceError::NotFound(format!("click {click_id}")));
            }
        };

        let existing = self
            .leads
            .get_lead_by_click(click_id)
            .await
            .map_err(ServiceError::repository("Leads"))?;
        if let Some(lead) = existing {
            log::info!("Duplicate webhook for click {}, lead {}.", click_id, lead.id);
            self.log_event(EventOutcome::Duplicate, Some(click_id), None, payload)
                .await;
            return Ok(LeadOutcome::Duplicate { lead_id: lead.id });
        }

        let offer = self
            .partners
            .get_offer(&click.offer_id)
            .await
            .map_err(ServiceError::repository("Leads"))?
            .ok_or_else(|| {
                let detail = format!("offer {} of click {} is gone", click.offer_id, click_id);
                ServiceError::Internal(detail)
            })?;

        let rate_bps = offer.effective_rate_bps(Utc::now());
        let has_influencer = click.influencer_id.is_some();
        let rewards = self
            .policy
            .rewards(webhook.amount_cents, rate_bps, has_influencer);
        let Some((reward_cents, influencer_reward_cents)) = rewards else {
            let detail = format!("amount_cents too large: {:?}", webhook.amount_cents);
            log::warn!("Rejected webhook for click {}: {}", click_id, detail);
            self.log_event(
                EventOutcome::Malformed,
                Some(click_id),
                Some(detail.clone()),
                payload,
            )
            .await;
            return Err(ServiceError::Malformed(detail));
        };

        let new_lead = NewLead {
            id: utils::new_id(),
            click_id: click.id.clone(),
            partner_id: offer.partner_id.clone(),
            user_id: click.user_id.clone(),
            influencer_id: click.influencer_id.clone(),
            amount_cents: webhook.amount_cents,
            reward_cents,
            influencer_reward_cents,
            external_ref: webhook.external_ref.clone(),
            payout_ready: self.policy.auto_approve,
        };

        let inserted = self
            .leads
            .insert_lead(&new_lead)
            .await
            .map_err(ServiceError::repository("Leads"))?;

        match inserted {
            Some(lead) => {
                log::info!(
                    "Created lead {} for click {}: reward={} influencer_reward={}",
                    lead.id,
                    click_id,
                    lead.reward_cents,
                    lead.influencer_reward_cents
                );
                self.log_event(EventOutcome::Created, Some(click_id), None, payload)
                    .await;
                Ok(LeadOutcome::Created(lead))
            }
            None => {
                // Lost the race against a concurrent delivery.
                let lead = self
                    .leads
                    .get_lead_by_click(click_id)
                    .await
                    .map_err(ServiceError::repository("Leads"))?
                    .ok_or_else(|| {
                        ServiceError::Internal(format!("lead for click {click_id} vanished"))
                    })?;
                self.log_event(EventOutcome::Duplicate, Some(click_id), None, payload)
                    .await;
                Ok(LeadOutcome::Duplicate { lead_id: lead.id })
            }
        }
    }

    async fn approve_lead(&self, id: &str) -> Result<Lead, ServiceError> {
        self.leads
            .approve_lead(id)
            .await
            .map_err(ServiceError::repository("Leads"))?
            .ok_or_else(|| ServiceError::NotFound(format!("lead {id}")))
    }

    async fn list_events(
        &self,
        click_id: Option<&str>,
        page: Page,
    ) -> Result<Paginated<WebhookEvent>, ServiceError> {
        let (events, total) = self
            .events
            .list_events(click_id, page)
            .await
            .map_err(ServiceError::repository("Leads"))?;

        Ok(Paginated::new(events, total, page))
    }
}

#[async_trait]
impl RequestHandler<LeadRequest> for LeadRequestHandler {
    async fn handle_request(&self, request: LeadRequest) {
        match request {
            LeadRequest::Webhook {
                authorization,
                body,
                response,
            } => {
                let outcome = self.receive_webhook(authorization.as_deref(), &body).await;
                let _ = response.send(outcome);
            }
            LeadRequest::Approve { id, response } => {
                let lead = self.approve_lead(&id).await;
                let _ = response.send(lead);
            }
            LeadRequest::ListEvents {
                click_id,
                page,
                response,
            } => {
                let events = self.list_events(click_id.as_deref(), page).await;
                let _ = response.send(events);
            }
        }
    }
}

pub struct LeadService;

impl LeadService {
    pub fn new() -> Self {
        LeadService {}
    }
}

#[async_trait]
impl Service<LeadRequest, LeadRequestHandler> for LeadService {}
