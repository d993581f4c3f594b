use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{partners::Partner, ParseEnumError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApplicationStatus::Pending),
            "approved" => Ok(ApplicationStatus::Approved),
            "rejected" => Ok(ApplicationStatus::Rejected),
            other => Err(ParseEnumError::new("application status", other)),
        }
    }
}

impl TryFrom<String> for ApplicationStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct PartnerApplication {
    pub id: String,
    pub profile_id: Option<String>,
    pub company_name: String,
    pub contact_email: String,
    pub website: Option<String>,
    pub message: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ApplicationStatus,
    pub partner_id: Option<String>,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewApplication {
    pub company_name: String,
    pub contact_email: String,
    pub website: Option<String>,
    pub message: Option<String>,
}

impl NewApplication {
    pub fn validate(&self) -> Result<(), String> {
        if self.company_name.trim().is_empty() {
            return Err("company_name must not be empty".to_string());
        }
        if !self.contact_email.contains('@') {
            return Err(format!("invalid contact_email: {}", self.contact_email));
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Approval {
    pub base_rate_bps: i32,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Rejection {
    pub reason: Option<String>,
}

#[derive(Clone, Debug)]
pub enum ReviewOutcome {
    Approved {
        application: PartnerApplication,
        partner: Partner,
    },
    Rejected(PartnerApplication),
    NotFound,
    NotPending(ApplicationStatus),
    NameTaken,
}
