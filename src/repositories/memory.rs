//! In-process store backing service tests.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex,
};

use anyhow::bail;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use super::{
    applications::ApplicationStore, clicks::ClickStore, events::EventStore,
    giftcards::GiftCardProvider, leads::LeadStore, partners::PartnerStore,
    profiles::ProfileStore, redemptions::RedemptionStore,
};
use crate::{
    models::{
        applications::{ApplicationStatus, NewApplication, PartnerApplication, ReviewOutcome},
        clicks::{Click, NewClick},
        events::{NewWebhookEvent, WebhookEvent},
        leads::{Balance, Lead, NewLead},
        pagination::Page,
        partners::{
            NewOffer, NewPartner, Offer, OfferListing, Partner, PartnerDeletion, PartnerStats,
            DEFAULT_SUBID_PARAM,
        },
        profiles::{Profile, ProfileFilter, ProfileInsert, ProfileInsertOutcome, Role},
        redemptions::{
            NewRedemption, PayoutMethod, Redemption, RedemptionInsert, RedemptionStatus, Voucher,
        },
    },
    utils,
};

fn paginate<T>(mut items: Vec<T>, page: Page) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let start = (page.offset() as usize).min(items.len());
    let end = (start + page.limit() as usize).min(items.len());
    (items.drain(start..end).collect(), total)
}

#[derive(Default)]
pub struct MemoryStore {
    pub profiles: DashMap<String, Profile>,
    pub partners: DashMap<String, Partner>,
    pub offers: DashMap<String, Offer>,
    pub clicks: DashMap<String, Click>,
    pub leads: DashMap<String, Lead>,
    pub redemptions: DashMap<String, Redemption>,
    pub applications: DashMap<String, PartnerApplication>,
    pub events: Mutex<Vec<WebhookEvent>>,
    pub fail_click_inserts: AtomicBool,
    pub offer_lookups: AtomicUsize,
    lock: Mutex<()>,
}

impl MemoryStore {
    pub fn seed_profile(&self, email: &str) -> Profile {
        let now = Utc::now();
        let profile = Profile {
            id: utils::new_id(),
            email: email.to_string(),
            display_name: email.split('@').next().unwrap_or(email).to_string(),
            role: Role::User,
            partner_id: None,
            sub_id: utils::generate_sub_id(),
            referred_by: None,
            created_at: now,
            updated_at: now,
        };
        self.profiles.insert(profile.id.clone(), profile.clone());
        profile
    }

    pub fn seed_partner(&self, name: &str, base_rate_bps: i32) -> Partner {
        let now = Utc::now();
        let partner = Partner {
            id: utils::new_id(),
            name: name.to_string(),
            website: None,
            base_rate_bps,
            promo_rate_bps: None,
            promo_expires_at: None,
            followers: 0,
            subid_param: DEFAULT_SUBID_PARAM.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.partners.insert(partner.id.clone(), partner.clone());
        partner
    }

    pub fn seed_offer(&self, partner_id: &str, target_url: &str) -> Offer {
        let offer = Offer {
            id: utils::new_id(),
            partner_id: partner_id.to_string(),
            title: "Offer".to_string(),
            description: None,
            target_url: target_url.to_string(),
            active: true,
            created_at: Utc::now(),
        };
        self.offers.insert(offer.id.clone(), offer.clone());
        offer
    }

    /// Credits `reward_cents` to `user_id` through a confirmed lead.
    pub fn seed_lead(&self, user_id: &str, reward_cents: i64, payout_ready: bool) -> Lead {
        let lead = Lead {
            id: utils::new_id(),
            click_id: utils::new_id(),
            partner_id: utils::new_id(),
            user_id: Some(user_id.to_string()),
            influencer_id: None,
            amount_cents: None,
            reward_cents,
            influencer_reward_cents: 0,
            external_ref: None,
            payout_ready,
            confirmed_at: Utc::now(),
        };
        self.leads.insert(lead.id.clone(), lead.clone());
        lead
    }

    pub fn logged_outcomes(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|events| events.iter().map(|e| e.outcome.clone()).collect())
            .unwrap_or_default()
    }

    fn listing(&self, offer: &Offer) -> Option<OfferListing> {
        let partner = self.partners.get(&offer.partner_id)?;
        Some(OfferListing {
            id: offer.id.clone(),
            partner_id: partner.id.clone(),
            partner_name: partner.name.clone(),
            title: offer.title.clone(),
            description: offer.description.clone(),
            target_url: offer.target_url.clone(),
            active: offer.active,
            subid_param: partner.subid_param.clone(),
            base_rate_bps: partner.base_rate_bps,
            promo_rate_bps: partner.promo_rate_bps,
            promo_expires_at: partner.promo_expires_at,
        })
    }

    fn balance_of(&self, user_id: &str) -> Balance {
        let mut balance = Balance::default();
        for lead in self.leads.iter() {
            let mut credit = 0;
            if lead.user_id.as_deref() == Some(user_id) {
                credit += lead.reward_cents;
            }
            if lead.influencer_id.as_deref() == Some(user_id) {
                credit += lead.influencer_reward_cents;
            }
            if lead.payout_ready {
                balance.available_cents += credit;
            } else {
                balance.pending_cents += credit;
            }
        }
        for redemption in self.redemptions.iter() {
            if redemption.user_id == user_id && redemption.status != RedemptionStatus::Rejected {
                balance.available_cents -= redemption.amount_cents;
            }
        }
        balance
    }

    fn partner_from(id: &str, new: &NewPartner) -> Partner {
        let now = Utc::now();
        Partner {
            id: id.to_string(),
            name: new.name.trim().to_string(),
            website: new.website.clone(),
            base_rate_bps: new.base_rate_bps,
            promo_rate_bps: new.promo_rate_bps,
            promo_expires_at: new.promo_expires_at,
            followers: new.followers,
            subid_param: new.subid_param().to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn partner_id_by_name(&self, name: &str) -> Option<String> {
        self.partners
            .iter()
            .find(|p| p.name == name.trim())
            .map(|p| p.id.clone())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn insert_profile(
        &self,
        profile: &ProfileInsert,
    ) -> Result<ProfileInsertOutcome, anyhow::Error> {
        let _guard = self.lock.lock().map_err(|e| anyhow::anyhow!("{e}"))?;
        if self.profiles.iter().any(|p| p.email == profile.email) {
            return Ok(ProfileInsertOutcome::EmailTaken);
        }
        if self.profiles.iter().any(|p| p.sub_id == profile.sub_id) {
            return Ok(ProfileInsertOutcome::SubIdTaken);
        }
        let now = Utc::now();
        let created = Profile {
            id: profile.id.clone(),
            email: profile.email.clone(),
            display_name: profile.display_name.clone(),
            role: Role::User,
            partner_id: None,
            sub_id: profile.sub_id.clone(),
            referred_by: profile.referred_by.clone(),
            created_at: now,
            updated_at: now,
        };
        self.profiles.insert(created.id.clone(), created.clone());
        Ok(ProfileInsertOutcome::Created(created))
    }

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, anyhow::Error> {
        Ok(self.profiles.get(id).map(|p| p.clone()))
    }

    async fn get_profile_by_sub_id(&self, sub_id: &str) -> Result<Option<Profile>, anyhow::Error> {
        Ok(self
            .profiles
            .iter()
            .find(|p| p.sub_id == sub_id)
            .map(|p| p.clone()))
    }

    async fn list_profiles(
        &self,
        filter: &ProfileFilter,
        page: Page,
    ) -> Result<(Vec<Profile>, i64), anyhow::Error> {
        let mut profiles: Vec<Profile> = self
            .profiles
            .iter()
            .filter(|p| filter.role.map_or(true, |role| p.role == role))
            .filter(|p| {
                filter
                    .search
                    .as_deref()
                    .map_or(true, |s| p.email.contains(s) || p.display_name.contains(s))
            })
            .map(|p| p.clone())
            .collect();
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(profiles, page))
    }

    async fn update_role(
        &self,
        id: &str,
        role: Role,
        partner_id: Option<&str>,
    ) -> Result<Option<Profile>, anyhow::Error> {
        Ok(self.profiles.get_mut(id).map(|mut p| {
            p.role = role;
            p.partner_id = partner_id.map(str::to_string);
            p.updated_at = Utc::now();
            p.clone()
        }))
    }
}

#[async_trait]
impl PartnerStore for MemoryStore {
    async fn list_partners(
        &self,
        search: Option<&str>,
        page: Page,
    ) -> Result<(Vec<Partner>, i64), anyhow::Error> {
        let mut partners: Vec<Partner> = self
            .partners
            .iter()
            .filter(|p| search.map_or(true, |s| p.name.contains(s)))
            .map(|p| p.clone())
            .collect();
        partners.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paginate(partners, page))
    }

    async fn get_partner(&self, id: &str) -> Result<Option<Partner>, anyhow::Error> {
        Ok(self.partners.get(id).map(|p| p.clone()))
    }

    async fn insert_partner(
        &self,
        id: &str,
        partner: &NewPartner,
    ) -> Result<Option<Partner>, anyhow::Error> {
        let _guard = self.lock.lock().map_err(|e| anyhow::anyhow!("{e}"))?;
        if self.partner_id_by_name(&partner.name).is_some() {
            return Ok(None);
        }
        let created = Self::partner_from(id, partner);
        self.partners.insert(created.id.clone(), created.clone());
        Ok(Some(created))
    }

    async fn upsert_partner(
        &self,
        id: &str,
        partner: &NewPartner,
    ) -> Result<Partner, anyhow::Error> {
        let _guard = self.lock.lock().map_err(|e| anyhow::anyhow!("{e}"))?;
        let id = self
            .partner_id_by_name(&partner.name)
            .unwrap_or_else(|| id.to_string());
        let upserted = Self::partner_from(&id, partner);
        self.partners.insert(id, upserted.clone());
        Ok(upserted)
    }

    async fn save_partner(&self, partner: &Partner) -> Result<Option<Partner>, anyhow::Error> {
        Ok(self.partners.get_mut(&partner.id).map(|mut stored| {
            *stored = Partner {
                updated_at: Utc::now(),
                ..partner.clone()
            };
            stored.clone()
        }))
    }

    async fn delete_partner(&self, id: &str) -> Result<PartnerDeletion, anyhow::Error> {
        let _guard = self.lock.lock().map_err(|e| anyhow::anyhow!("{e}"))?;
        if self.leads.iter().any(|l| l.partner_id == id) {
            return Ok(PartnerDeletion::HasLeads);
        }
        if self.partners.remove(id).is_none() {
            return Ok(PartnerDeletion::NotFound);
        }
        self.offers.retain(|_, offer| offer.partner_id != id);
        Ok(PartnerDeletion::Deleted)
    }

    async fn count_partner_leads(&self, id: &str) -> Result<i64, anyhow::Error> {
        Ok(self.leads.iter().filter(|l| l.partner_id == id).count() as i64)
    }

    async fn partner_stats(&self, id: &str) -> Result<PartnerStats, anyhow::Error> {
        let offer_ids: Vec<String> = self
            .offers
            .iter()
            .filter(|o| o.partner_id == id)
            .map(|o| o.id.clone())
            .collect();
        let mut stats = PartnerStats {
            clicks: self
                .clicks
                .iter()
                .filter(|c| offer_ids.contains(&c.offer_id))
                .count() as i64,
            ..Default::default()
        };
        for lead in self.leads.iter().filter(|l| l.partner_id == id) {
            stats.leads += 1;
            stats.converted_cents += lead.amount_cents.unwrap_or(0);
            stats.rewards_cents += lead.reward_cents + lead.influencer_reward_cents;
        }
        Ok(stats)
    }

    async fn list_active_offers(&self) -> Result<Vec<OfferListing>, anyhow::Error> {
        let offers: Vec<Offer> = self
            .offers
            .iter()
            .filter(|o| o.active)
            .map(|o| o.clone())
            .collect();
        Ok(offers.iter().filter_map(|o| self.listing(o)).collect())
    }

    async fn get_offer(&self, id: &str) -> Result<Option<OfferListing>, anyhow::Error> {
        self.offer_lookups.fetch_add(1, Ordering::SeqCst);
        let offer = self.offers.get(id).map(|o| o.clone());
        Ok(offer.and_then(|o| self.listing(&o)))
    }

    async fn insert_offer(&self, id: &str, offer: &NewOffer) -> Result<Offer, anyhow::Error> {
        if !self.partners.contains_key(&offer.partner_id) {
            bail!("foreign key violation: partner {}", offer.partner_id);
        }
        let created = Offer {
            id: id.to_string(),
            partner_id: offer.partner_id.clone(),
            title: offer.title.clone(),
            description: offer.description.clone(),
            target_url: offer.target_url.clone(),
            active: true,
            created_at: Utc::now(),
        };
        self.offers.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn set_offer_active(
        &self,
        id: &str,
        active: bool,
    ) -> Result<Option<Offer>, anyhow::Error> {
        Ok(self.offers.get_mut(id).map(|mut o| {
            o.active = active;
            o.clone()
        }))
    }
}

#[async_trait]
impl ClickStore for MemoryStore {
    async fn insert_click(&self, click: &NewClick) -> Result<Click, anyhow::Error> {
        if self.fail_click_inserts.load(Ordering::SeqCst) {
            bail!("connection reset");
        }
        let created = Click {
            id: click.id.clone(),
            offer_id: click.offer_id.clone(),
            user_id: click.user_id.clone(),
            influencer_id: click.influencer_id.clone(),
            ip_hash: click.ip_hash.clone(),
            user_agent: click.user_agent.clone(),
            redeemed: false,
            created_at: Utc::now(),
        };
        self.clicks.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn get_click(&self, id: &str) -> Result<Option<Click>, anyhow::Error> {
        Ok(self.clicks.get(id).map(|c| c.clone()))
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn insert_lead(&self, lead: &NewLead) -> Result<Option<Lead>, anyhow::Error> {
        let _guard = self.lock.lock().map_err(|e| anyhow::anyhow!("{e}"))?;
        if self.leads.iter().any(|l| l.click_id == lead.click_id) {
            return Ok(None);
        }
        let created = Lead {
            id: lead.id.clone(),
            click_id: lead.click_id.clone(),
            partner_id: lead.partner_id.clone(),
            user_id: lead.user_id.clone(),
            influencer_id: lead.influencer_id.clone(),
            amount_cents: lead.amount_cents,
            reward_cents: lead.reward_cents,
            influencer_reward_cents: lead.influencer_reward_cents,
            external_ref: lead.external_ref.clone(),
            payout_ready: lead.payout_ready,
            confirmed_at: Utc::now(),
        };
        self.leads.insert(created.id.clone(), created.clone());
        if let Some(mut click) = self.clicks.get_mut(&lead.click_id) {
            click.redeemed = true;
        }
        Ok(Some(created))
    }

    async fn get_lead_by_click(&self, click_id: &str) -> Result<Option<Lead>, anyhow::Error> {
        Ok(self
            .leads
            .iter()
            .find(|l| l.click_id == click_id)
            .map(|l| l.clone()))
    }

    async fn approve_lead(&self, id: &str) -> Result<Option<Lead>, anyhow::Error> {
        Ok(self.leads.get_mut(id).map(|mut l| {
            l.payout_ready = true;
            l.clone()
        }))
    }
}

#[async_trait]
impl RedemptionStore for MemoryStore {
    async fn get_balance(&self, user_id: &str) -> Result<Balance, anyhow::Error> {
        Ok(self.balance_of(user_id))
    }

    async fn insert_redemption(
        &self,
        id: &str,
        user_id: &str,
        redemption: &NewRedemption,
    ) -> Result<RedemptionInsert, anyhow::Error> {
        let _guard = self.lock.lock().map_err(|e| anyhow::anyhow!("{e}"))?;
        if !self.profiles.contains_key(user_id) {
            return Ok(RedemptionInsert::UnknownUser);
        }
        let balance = self.balance_of(user_id);
        if balance.available_cents < redemption.amount_cents {
            return Ok(RedemptionInsert::InsufficientBalance {
                available_cents: balance.available_cents,
            });
        }

        let (gift_card_brand, iban, account_holder) = match &redemption.method {
            PayoutMethod::GiftCard { brand } => (Some(brand.clone()), None, None),
            PayoutMethod::Bank {
                iban,
                account_holder,
            } => (None, Some(iban.clone()), Some(account_holder.clone())),
        };
        let now = Utc::now();
        let created = Redemption {
            id: id.to_string(),
            user_id: user_id.to_string(),
            amount_cents: redemption.amount_cents,
            status: RedemptionStatus::Pending,
            method: redemption.method.kind(),
            gift_card_brand,
            iban,
            account_holder,
            voucher_code: None,
            voucher_url: None,
            admin_note: None,
            created_at: now,
            updated_at: now,
        };
        self.redemptions.insert(created.id.clone(), created.clone());
        Ok(RedemptionInsert::Created(created))
    }

    async fn get_redemption(&self, id: &str) -> Result<Option<Redemption>, anyhow::Error> {
        Ok(self.redemptions.get(id).map(|r| r.clone()))
    }

    async fn list_user_redemptions(&self, user_id: &str) -> Result<Vec<Redemption>, anyhow::Error> {
        let mut redemptions: Vec<Redemption> = self
            .redemptions
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.clone())
            .collect();
        redemptions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(redemptions)
    }

    async fn list_redemptions(
        &self,
        status: Option<RedemptionStatus>,
        page: Page,
    ) -> Result<(Vec<Redemption>, i64), anyhow::Error> {
        let mut redemptions: Vec<Redemption> = self
            .redemptions
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .map(|r| r.clone())
            .collect();
        redemptions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(redemptions, page))
    }

    async fn update_status(
        &self,
        id: &str,
        from: RedemptionStatus,
        to: RedemptionStatus,
        note: Option<&str>,
    ) -> Result<Option<Redemption>, anyhow::Error> {
        let mut redemption = match self.redemptions.get_mut(id) {
            Some(r) if r.status == from => r,
            _ => return Ok(None),
        };
        redemption.status = to;
        if let Some(note) = note {
            redemption.admin_note = Some(note.to_string());
        }
        redemption.updated_at = Utc::now();
        Ok(Some(redemption.clone()))
    }

    async fn record_voucher(
        &self,
        id: &str,
        voucher: &Voucher,
    ) -> Result<Option<Redemption>, anyhow::Error> {
        let mut redemption = match self.redemptions.get_mut(id) {
            Some(r) if r.status == RedemptionStatus::Processing => r,
            _ => return Ok(None),
        };
        redemption.status = RedemptionStatus::Paid;
        redemption.voucher_code = Some(voucher.code.clone());
        redemption.voucher_url = voucher.url.clone();
        redemption.updated_at = Utc::now();
        Ok(Some(redemption.clone()))
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn insert_application(
        &self,
        id: &str,
        profile_id: Option<&str>,
        application: &NewApplication,
    ) -> Result<PartnerApplication, anyhow::Error> {
        let created = PartnerApplication {
            id: id.to_string(),
            profile_id: profile_id
                .filter(|id| self.profiles.contains_key(*id))
                .map(str::to_string),
            company_name: application.company_name.trim().to_string(),
            contact_email: application.contact_email.trim().to_string(),
            website: application.website.clone(),
            message: application.message.clone(),
            status: ApplicationStatus::Pending,
            partner_id: None,
            review_note: None,
            created_at: Utc::now(),
            reviewed_at: None,
        };
        self.applications.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn get_application(&self, id: &str) -> Result<Option<PartnerApplication>, anyhow::Error> {
        Ok(self.applications.get(id).map(|a| a.clone()))
    }

    async fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
        page: Page,
    ) -> Result<(Vec<PartnerApplication>, i64), anyhow::Error> {
        let mut applications: Vec<PartnerApplication> = self
            .applications
            .iter()
            .filter(|a| status.map_or(true, |s| a.status == s))
            .map(|a| a.clone())
            .collect();
        applications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(applications, page))
    }

    async fn approve_application(
        &self,
        id: &str,
        partner_id: &str,
        base_rate_bps: i32,
    ) -> Result<ReviewOutcome, anyhow::Error> {
        let _guard = self.lock.lock().map_err(|e| anyhow::anyhow!("{e}"))?;
        let application = match self.applications.get(id).map(|a| a.clone()) {
            Some(a) if a.status == ApplicationStatus::Pending => a,
            Some(a) => return Ok(ReviewOutcome::NotPending(a.status)),
            None => return Ok(ReviewOutcome::NotFound),
        };
        if self.partner_id_by_name(&application.company_name).is_some() {
            return Ok(ReviewOutcome::NameTaken);
        }

        let partner = Self::partner_from(
            partner_id,
            &NewPartner {
                name: application.company_name.clone(),
                website: application.website.clone(),
                base_rate_bps,
                promo_rate_bps: None,
                promo_expires_at: None,
                followers: 0,
                subid_param: None,
            },
        );
        self.partners.insert(partner.id.clone(), partner.clone());

        if let Some(profile_id) = &application.profile_id {
            if let Some(mut profile) = self.profiles.get_mut(profile_id) {
                profile.role = Role::Partner;
                profile.partner_id = Some(partner.id.clone());
            }
        }

        let application = PartnerApplication {
            status: ApplicationStatus::Approved,
            partner_id: Some(partner.id.clone()),
            reviewed_at: Some(Utc::now()),
            ..application
        };
        self.applications
            .insert(application.id.clone(), application.clone());

        Ok(ReviewOutcome::Approved {
            application,
            partner,
        })
    }

    async fn reject_application(
        &self,
        id: &str,
        reason: Option<&str>,
    ) -> Result<ReviewOutcome, anyhow::Error> {
        let mut application = match self.applications.get_mut(id) {
            Some(a) => a,
            None => return Ok(ReviewOutcome::NotFound),
        };
        if application.status != ApplicationStatus::Pending {
            return Ok(ReviewOutcome::NotPending(application.status));
        }
        application.status = ApplicationStatus::Rejected;
        application.review_note = reason.map(str::to_string);
        application.reviewed_at = Some(Utc::now());
        Ok(ReviewOutcome::Rejected(application.clone()))
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn log_event(&self, event: &NewWebhookEvent) -> Result<(), anyhow::Error> {
        let mut events = self.events.lock().map_err(|e| anyhow::anyhow!("{e}"))?;
        events.push(WebhookEvent {
            id: utils::new_id(),
            source: event.source.clone(),
            click_id: event.click_id.clone(),
            outcome: event.outcome.as_str().to_string(),
            detail: event.detail.clone(),
            payload: event.payload.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_events(
        &self,
        click_id: Option<&str>,
        page: Page,
    ) -> Result<(Vec<WebhookEvent>, i64), anyhow::Error> {
        let events = self.events.lock().map_err(|e| anyhow::anyhow!("{e}"))?;
        let mut matching: Vec<WebhookEvent> = events
            .iter()
            .filter(|e| click_id.map_or(true, |id| e.click_id.as_deref() == Some(id)))
            .cloned()
            .collect();
        matching.reverse();
        Ok(paginate(matching, page))
    }
}

/// Gift card provider that hands out sequential codes or fails on demand.
#[derive(Default)]
pub struct FakeGiftCards {
    pub fail: AtomicBool,
    pub issued: AtomicUsize,
}

#[async_trait]
impl GiftCardProvider for FakeGiftCards {
    async fn issue_voucher(
        &self,
        reference: &str,
        brand: &str,
        _amount_cents: i64,
    ) -> Result<Voucher, anyhow::Error> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("provider unavailable");
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Voucher {
            code: format!("{brand}-{n:04}"),
            url: Some(format!("https://vouchers.example.com/{reference}")),
        })
    }
}
