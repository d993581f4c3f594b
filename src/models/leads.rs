use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Lead {
    pub id: String,
    pub click_id: String,
    pub partner_id: String,
    pub user_id: Option<String>,
    pub influencer_id: Option<String>,
    pub amount_cents: Option<i64>,
    pub reward_cents: i64,
    pub influencer_reward_cents: i64,
    pub external_ref: Option<String>,
    pub payout_ready: bool,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewLead {
    pub id: String,
    pub click_id: String,
    pub partner_id: String,
    pub user_id: Option<String>,
    pub influencer_id: Option<String>,
    pub amount_cents: Option<i64>,
    pub reward_cents: i64,
    pub influencer_reward_cents: i64,
    pub external_ref: Option<String>,
    pub payout_ready: bool,
}

/// Body of a partner conversion callback.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LeadWebhook {
    pub click_id: String,
    pub amount_cents: Option<i64>,
    pub external_ref: Option<String>,
}

#[derive(Clone, Debug)]
pub enum LeadOutcome {
    Created(Lead),
    Duplicate { lead_id: String },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, sqlx::FromRow)]
pub struct Balance {
    pub available_cents: i64,
    pub pending_cents: i64,
}
