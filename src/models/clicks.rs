use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Click {
    pub id: String,
    pub offer_id: String,
    pub user_id: Option<String>,
    pub influencer_id: Option<String>,
    pub ip_hash: Option<String>,
    pub user_agent: Option<String>,
    pub redeemed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewClick {
    pub id: String,
    pub offer_id: String,
    pub user_id: Option<String>,
    pub influencer_id: Option<String>,
    pub ip_hash: Option<String>,
    pub user_agent: Option<String>,
}

/// Who a click-through is attributed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attribution {
    /// `/r/{offer}?ref=<sub_id>`: a referral link shared by an influencer.
    Referral { sub_id: Option<String> },
    /// `/go/{offer}`: a signed-in user leaving for the partner site.
    User { user_id: Option<String> },
}

#[derive(Clone, Debug, Default)]
pub struct Visitor {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}
