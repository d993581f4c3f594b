use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    Created,
    Duplicate,
    UnknownClick,
    Unauthorized,
    Malformed,
}

impl EventOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOutcome::Created => "created",
            EventOutcome::Duplicate => "duplicate",
            EventOutcome::UnknownClick => "unknown_click",
            EventOutcome::Unauthorized => "unauthorized",
            EventOutcome::Malformed => "malformed",
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct WebhookEvent {
    pub id: String,
    pub source: String,
    pub click_id: Option<String>,
    pub outcome: String,
    pub detail: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewWebhookEvent {
    pub source: String,
    pub click_id: Option<String>,
    pub outcome: EventOutcome,
    pub detail: Option<String>,
    pub payload: Option<serde_json::Value>,
}
