use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::ParseEnumError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RedemptionStatus {
    Pending,
    Approved,
    Processing,
    Paid,
    Rejected,
}

impl RedemptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedemptionStatus::Pending => "pending",
            RedemptionStatus::Approved => "approved",
            RedemptionStatus::Processing => "processing",
            RedemptionStatus::Paid => "paid",
            RedemptionStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RedemptionStatus::Paid | RedemptionStatus::Rejected)
    }

    /// pending -> approved -> processing -> paid, with rejection possible from
    /// any non-terminal state.
    pub fn can_transition_to(&self, next: RedemptionStatus) -> bool {
        use RedemptionStatus::*;

        matches!(
            (self, next),
            (Pending, Approved)
                | (Approved, Processing)
                | (Processing, Paid)
                | (Pending | Approved | Processing, Rejected)
        )
    }
}

impl fmt::Display for RedemptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RedemptionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RedemptionStatus::Pending),
            "approved" => Ok(RedemptionStatus::Approved),
            "processing" => Ok(RedemptionStatus::Processing),
            "paid" => Ok(RedemptionStatus::Paid),
            "rejected" => Ok(RedemptionStatus::Rejected),
            other => Err(ParseEnumError::new("redemption status", other)),
        }
    }
}

impl TryFrom<String> for RedemptionStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutKind {
    GiftCard,
    Bank,
}

impl PayoutKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutKind::GiftCard => "gift_card",
            PayoutKind::Bank => "bank",
        }
    }
}

impl TryFrom<String> for PayoutKind {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "gift_card" => Ok(PayoutKind::GiftCard),
            "bank" => Ok(PayoutKind::Bank),
            _ => Err(ParseEnumError::new("payout method", value)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PayoutMethod {
    GiftCard { brand: String },
    Bank { iban: String, account_holder: String },
}

impl PayoutMethod {
    pub fn kind(&self) -> PayoutKind {
        match self {
            PayoutMethod::GiftCard { .. } => PayoutKind::GiftCard,
            PayoutMethod::Bank { .. } => PayoutKind::Bank,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            PayoutMethod::GiftCard { brand } => {
                if brand.trim().is_empty() {
                    return Err("gift card brand must not be empty".to_string());
                }
            }
            PayoutMethod::Bank {
                iban,
                account_holder,
            } => {
                if account_holder.trim().is_empty() {
                    return Err("account_holder must not be empty".to_string());
                }
                if !iban_is_valid(iban) {
                    return Err(format!("invalid IBAN: {iban}"));
                }
            }
        }

        Ok(())
    }
}

/// Structural IBAN check: 15..=34 alphanumerics, a two-letter country code,
/// two check digits, and the ISO 13616 mod-97 remainder of 1.
pub fn iban_is_valid(iban: &str) -> bool {
    let compact: String = iban
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if !(15..=34).contains(&compact.len()) || !compact.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return false;
    }

    let bytes = compact.as_bytes();
    if !bytes[0].is_ascii_alphabetic()
        || !bytes[1].is_ascii_alphabetic()
        || !bytes[2].is_ascii_digit()
        || !bytes[3].is_ascii_digit()
    {
        return false;
    }

    let rearranged = compact[4..].chars().chain(compact[..4].chars());
    let mut remainder: u32 = 0;
    for c in rearranged {
        let value = match c.to_digit(36) {
            Some(v) => v,
            None => return false,
        };
        remainder = if value >= 10 {
            (remainder * 100 + value) % 97
        } else {
            (remainder * 10 + value) % 97
        };
    }

    remainder == 1
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Redemption {
    pub id: String,
    pub user_id: String,
    pub amount_cents: i64,
    #[sqlx(try_from = "String")]
    pub status: RedemptionStatus,
    #[sqlx(try_from = "String")]
    pub method: PayoutKind,
    pub gift_card_brand: Option<String>,
    pub iban: Option<String>,
    pub account_holder: Option<String>,
    pub voucher_code: Option<String>,
    pub voucher_url: Option<String>,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Redemption {
    /// A gift card redemption in processing whose voucher was never stored.
    pub fn awaits_voucher(&self) -> bool {
        self.method == PayoutKind::GiftCard
            && self.status == RedemptionStatus::Processing
            && self.voucher_code.is_none()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewRedemption {
    pub amount_cents: i64,
    pub method: PayoutMethod,
}

#[derive(Clone, Debug)]
pub enum RedemptionInsert {
    Created(Redemption),
    InsufficientBalance { available_cents: i64 },
    UnknownUser,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: RedemptionStatus,
    pub note: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Voucher {
    pub code: String,
    pub url: Option<String>,
}
