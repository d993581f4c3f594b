use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_RATE_BPS: i32 = 10_000;
pub const DEFAULT_SUBID_PARAM: &str = "subid";

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Partner {
    pub id: String,
    pub name: String,
    pub website: Option<String>,
    pub base_rate_bps: i32,
    pub promo_rate_bps: Option<i32>,
    pub promo_expires_at: Option<DateTime<Utc>>,
    pub followers: i64,
    pub subid_param: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The commission rate that applies at `now`: the promo rate while the promo
/// has not expired, the base rate otherwise.
pub fn effective_rate_bps(
    base_rate_bps: i32,
    promo_rate_bps: Option<i32>,
    promo_expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> i32 {
    match (promo_rate_bps, promo_expires_at) {
        (Some(promo), Some(expires_at)) if expires_at > now => promo,
        _ => base_rate_bps,
    }
}

/// Reward in cents for a conversion. Without a reported amount the lead is
/// flat and the rate is paid out as cents. `None` when the amount is too
/// large to scale.
pub fn reward_cents(amount_cents: Option<i64>, rate_bps: i32) -> Option<i64> {
    match amount_cents {
        Some(amount) => share_of(amount, rate_bps),
        None => Some(i64::from(rate_bps)),
    }
}

/// `cents * bps / 10000`, or `None` on overflow.
pub fn share_of(cents: i64, bps: i32) -> Option<i64> {
    cents
        .checked_mul(i64::from(bps))
        .map(|scaled| scaled / i64::from(MAX_RATE_BPS))
}

impl Partner {
    pub fn effective_rate_bps(&self, now: DateTime<Utc>) -> i32 {
        effective_rate_bps(
            self.base_rate_bps,
            self.promo_rate_bps,
            self.promo_expires_at,
            now,
        )
    }
}

fn validate_rates(
    base_rate_bps: i32,
    promo_rate_bps: Option<i32>,
    promo_expires_at: Option<DateTime<Utc>>,
) -> Result<(), String> {
    if !(0..=MAX_RATE_BPS).contains(&base_rate_bps) {
        return Err(format!("base_rate_bps out of range: {base_rate_bps}"));
    }
    if let Some(promo) = promo_rate_bps {
        if !(0..=MAX_RATE_BPS).contains(&promo) {
            return Err(format!("promo_rate_bps out of range: {promo}"));
        }
        if promo_expires_at.is_none() {
            return Err("promo_rate_bps requires promo_expires_at".to_string());
        }
    }

    Ok(())
}

fn validate_subid_param(param: &str) -> Result<(), String> {
    if param.is_empty()
        || !param
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(format!("invalid subid_param: {param:?}"));
    }

    Ok(())
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewPartner {
    pub name: String,
    pub website: Option<String>,
    pub base_rate_bps: i32,
    pub promo_rate_bps: Option<i32>,
    pub promo_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub followers: i64,
    pub subid_param: Option<String>,
}

impl NewPartner {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("partner name must not be empty".to_string());
        }
        if self.followers < 0 {
            return Err("followers must not be negative".to_string());
        }
        if let Some(param) = &self.subid_param {
            validate_subid_param(param)?;
        }

        validate_rates(
            self.base_rate_bps,
            self.promo_rate_bps,
            self.promo_expires_at,
        )
    }

    pub fn subid_param(&self) -> &str {
        self.subid_param.as_deref().unwrap_or(DEFAULT_SUBID_PARAM)
    }
}

/// Partial update; absent fields keep their stored value. `clear_promo`
/// drops both promo fields.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PartnerUpdate {
    pub website: Option<String>,
    pub base_rate_bps: Option<i32>,
    pub promo_rate_bps: Option<i32>,
    pub promo_expires_at: Option<DateTime<Utc>>,
    pub followers: Option<i64>,
    pub subid_param: Option<String>,
    #[serde(default)]
    pub clear_promo: bool,
}

impl PartnerUpdate {
    /// Applies the update onto `partner` and validates the result.
    pub fn apply(&self, partner: &Partner) -> Result<Partner, String> {
        let mut updated = partner.clone();
        if let Some(website) = &self.website {
            updated.website = Some(website.clone());
        }
        if let Some(base) = self.base_rate_bps {
            updated.base_rate_bps = base;
        }
        if self.clear_promo {
            updated.promo_rate_bps = None;
            updated.promo_expires_at = None;
        }
        if let Some(promo) = self.promo_rate_bps {
            updated.promo_rate_bps = Some(promo);
        }
        if let Some(expires_at) = self.promo_expires_at {
            updated.promo_expires_at = Some(expires_at);
        }
        if let Some(followers) = self.followers {
            if followers < 0 {
                return Err("followers must not be negative".to_string());
            }
            updated.followers = followers;
        }
        if let Some(param) = &self.subid_param {
            validate_subid_param(param)?;
            updated.subid_param = param.clone();
        }

        validate_rates(
            updated.base_rate_bps,
            updated.promo_rate_bps,
            updated.promo_expires_at,
        )?;

        Ok(updated)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartnerDeletion {
    Deleted,
    NotFound,
    /// Leads still reference the partner.
    HasLeads,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, sqlx::FromRow)]
pub struct PartnerStats {
    pub clicks: i64,
    pub leads: i64,
    pub converted_cents: i64,
    pub rewards_cents: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Offer {
    pub id: String,
    pub partner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub target_url: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewOffer {
    pub partner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub target_url: String,
}

impl NewOffer {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("offer title must not be empty".to_string());
        }
        if !(self.target_url.starts_with("https://") || self.target_url.starts_with("http://")) {
            return Err(format!("target_url must be http(s): {}", self.target_url));
        }

        Ok(())
    }
}

/// An offer joined with the partner fields needed to attribute and reward
/// clicks on it.
#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct OfferListing {
    pub id: String,
    pub partner_id: String,
    pub partner_name: String,
    pub title: String,
    pub description: Option<String>,
    pub target_url: String,
    pub active: bool,
    pub subid_param: String,
    pub base_rate_bps: i32,
    pub promo_rate_bps: Option<i32>,
    pub promo_expires_at: Option<DateTime<Utc>>,
}

impl OfferListing {
    pub fn effective_rate_bps(&self, now: DateTime<Utc>) -> i32 {
        effective_rate_bps(
            self.base_rate_bps,
            self.promo_rate_bps,
            self.promo_expires_at,
            now,
        )
    }
}

/// Public view of an offer with the rate a click-through currently earns.
#[derive(Clone, Debug, Serialize)]
pub struct PublicOffer {
    pub id: String,
    pub partner_name: String,
    pub title: String,
    pub description: Option<String>,
    pub rate_bps: i32,
    pub promo: bool,
}

impl PublicOffer {
    pub fn from_listing(listing: &OfferListing, now: DateTime<Utc>) -> Self {
        let rate_bps = listing.effective_rate_bps(now);
        Self {
            id: listing.id.clone(),
            partner_name: listing.partner_name.clone(),
            title: listing.title.clone(),
            description: listing.description.clone(),
            rate_bps,
            promo: rate_bps != listing.base_rate_bps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn partner() -> Partner {
        let now = Utc::now();
        Partner {
            id: "p-1".to_string(),
            name: "Acme".to_string(),
            website: None,
            base_rate_bps: 500,
            promo_rate_bps: Some(1200),
            promo_expires_at: Some(now + Duration::days(3)),
            followers: 10,
            subid_param: DEFAULT_SUBID_PARAM.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn promo_rate_applies_until_expiry() {
        let p = partner();
        let now = Utc::now();
        assert_eq!(p.effective_rate_bps(now), 1200);
        assert_eq!(p.effective_rate_bps(now + Duration::days(4)), 500);
    }

    #[test]
    fn promo_without_expiry_is_ignored() {
        let now = Utc::now();
        assert_eq!(effective_rate_bps(500, Some(900), None, now), 500);
    }

    #[test]
    fn reward_scales_amount_by_rate() {
        assert_eq!(reward_cents(Some(10_000), 500), Some(500));
        assert_eq!(reward_cents(Some(1_999), 1000), Some(199));
        assert_eq!(reward_cents(None, 350), Some(350));
    }

    #[test]
    fn reward_overflow_is_reported() {
        assert_eq!(reward_cents(Some(4_000_000_000_000_000_000), 500), None);
        assert_eq!(reward_cents(Some(i64::MAX), 0), Some(0));
        assert_eq!(share_of(i64::MAX / 2, 2000), None);
        assert_eq!(share_of(1_000, 2000), Some(200));
    }

    #[test]
    fn new_partner_rejects_out_of_range_rates() {
        let mut new = NewPartner {
            name: "Acme".to_string(),
            website: None,
            base_rate_bps: 10_001,
            promo_rate_bps: None,
            promo_expires_at: None,
            followers: 0,
            subid_param: None,
        };
        assert!(new.validate().is_err());

        new.base_rate_bps = 400;
        new.promo_rate_bps = Some(800);
        assert!(new.validate().is_err(), "promo without expiry");

        new.promo_expires_at = Some(Utc::now());
        assert!(new.validate().is_ok());
        assert_eq!(new.subid_param(), "subid");
    }

    #[test]
    fn update_keeps_unset_fields_and_can_clear_promo() {
        let p = partner();
        let update = PartnerUpdate {
            base_rate_bps: Some(700),
            clear_promo: true,
            ..Default::default()
        };
        let updated = update.apply(&p).unwrap();
        assert_eq!(updated.base_rate_bps, 700);
        assert_eq!(updated.promo_rate_bps, None);
        assert_eq!(updated.followers, 10);
    }

    #[test]
    fn update_rejects_bad_subid_param() {
        let update = PartnerUpdate {
            subid_param: Some("sub id".to_string()),
            ..Default::default()
        };
        assert!(update.apply(&partner()).is_err());
    }
}
