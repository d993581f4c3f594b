use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::ParseEnumError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Influencer,
    Partner,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Influencer => "influencer",
            Role::Partner => "partner",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "influencer" => Ok(Role::Influencer),
            "partner" => Ok(Role::Partner),
            "admin" => Ok(Role::Admin),
            other => Err(ParseEnumError::new("role", other)),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub display_name: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub partner_id: Option<String>,
    pub sub_id: String,
    pub referred_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewProfile {
    pub email: String,
    pub display_name: String,
    pub referral_code: Option<String>,
}

impl NewProfile {
    pub fn validate(&self) -> Result<(), String> {
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(format!("invalid email address: {}", self.email)),
        }
        if self.display_name.trim().is_empty() {
            return Err("display_name must not be empty".to_string());
        }

        Ok(())
    }
}

/// Row-ready values for a new profile, after referral resolution.
#[derive(Clone, Debug)]
pub struct ProfileInsert {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub sub_id: String,
    pub referred_by: Option<String>,
}

#[derive(Clone, Debug)]
pub enum ProfileInsertOutcome {
    Created(Profile),
    EmailTaken,
    SubIdTaken,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProfileFilter {
    pub role: Option<Role>,
    pub search: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RoleUpdate {
    pub role: Role,
    pub partner_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_profile(email: &str, name: &str) -> NewProfile {
        NewProfile {
            email: email.to_string(),
            display_name: name.to_string(),
            referral_code: None,
        }
    }

    #[test]
    fn role_parses_its_own_text_form() {
        for role in [Role::User, Role::Influencer, Role::Partner, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn email_needs_local_part_and_dotted_domain() {
        assert!(new_profile("ana@example.com", "Ana").validate().is_ok());
        assert!(new_profile("@example.com", "Ana").validate().is_err());
        assert!(new_profile("ana@localhost", "Ana").validate().is_err());
        assert!(new_profile("ana.example.com", "Ana").validate().is_err());
    }

    #[test]
    fn blank_display_name_is_rejected() {
        assert!(new_profile("ana@example.com", "   ").validate().is_err());
    }
}
