use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::models::partners::MAX_RATE_BPS;

#[derive(Debug, Deserialize)]
pub struct Postgres {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub listen: String,
}

#[derive(Debug, Deserialize)]
pub struct Admin {
    pub api_token: String,
}

#[derive(Debug, Deserialize)]
pub struct Webhook {
    pub secret: String,
}

#[derive(Debug, Deserialize)]
pub struct Leads {
    pub auto_approve: bool,
    pub influencer_share_bps: i32,
}

#[derive(Debug, Deserialize)]
pub struct Redemptions {
    pub min_amount_cents: i64,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct GiftCards {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub postgres: Postgres,
    pub http: Http,
    pub admin: Admin,
    pub webhook: Webhook,
    pub leads: Leads,
    pub redemptions: Redemptions,
    pub gift_cards: GiftCards,
}

impl Settings {
    /// Loads `path`, then applies `BONUS_NEST__SECTION__KEY` overrides from
    /// the environment.
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("http.listen", "0.0.0.0:8080")?
            .set_default("leads.auto_approve", false)?
            .set_default("leads.influencer_share_bps", 2000)?
            .set_default("redemptions.min_amount_cents", 1000)?
            .set_default("redemptions.currency", "EUR")?
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("BONUS_NEST").separator("__"))
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let share = self.leads.influencer_share_bps;
        if !(0..=MAX_RATE_BPS).contains(&share) {
            return Err(ConfigError::Message(format!(
                "leads.influencer_share_bps must be within 0..={MAX_RATE_BPS}, got {share}"
            )));
        }

        Ok(())
    }
}
