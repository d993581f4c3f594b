use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::{
    models::{
        leads::Balance,
        pagination::{Page, Paginated},
        profiles::{
            NewProfile, Profile, ProfileFilter, ProfileInsert, ProfileInsertOutcome, Role,
            RoleUpdate,
        },
    },
    repositories::{
        partners::PartnerStore, profiles::ProfileStore, redemptions::RedemptionStore,
    },
    utils,
};

pub enum ProfileRequest {
    Create {
        profile: NewProfile,
        response: oneshot::Sender<Result<Profile, ServiceError>>,
    },
    Get {
        id: String,
        response: oneshot::Sender<Result<Profile, ServiceError>>,
    },
    List {
        filter: ProfileFilter,
        page: Page,
        response: oneshot::Sender<Result<Paginated<Profile>, ServiceError>>,
    },
    UpdateRole {
        id: String,
        update: RoleUpdate,
        response: oneshot::Sender<Result<Profile, ServiceError>>,
    },
    GetBalance {
        id: String,
        response: oneshot::Sender<Result<Balance, ServiceError>>,
    },
}

const SUB_ID_ATTEMPTS: usize = 5;

type SubIdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Clone)]
pub struct ProfileRequestHandler {
    profiles: Arc<dyn ProfileStore>,
    partners: Arc<dyn PartnerStore>,
    redemptions: Arc<dyn RedemptionStore>,
    sub_ids: SubIdGenerator,
}

impl ProfileRequestHandler {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        partners: Arc<dyn PartnerStore>,
        redemptions: Arc<dyn RedemptionStore>,
    ) -> Self {
        Self {
            profiles,
            partners,
            redemptions,
            sub_ids: Arc::new(utils::generate_sub_id),
        }
    }

    async fn create_profile(&self, profile: NewProfile) -> Result<Profile, ServiceError> {
        profile.validate().map_err(ServiceError::Invalid)?;

        let referred_by = match profile.referral_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => {
                let referrer = self
                    .profiles
                    .get_profile_by_sub_id(code)
                    .await
                    .map_err(ServiceError::repository("Profiles"))?
                    .ok_or_else(|| {
                        ServiceError::Invalid(format!("unknown referral code {code}"))
                    })?;
                Some(referrer.id)
            }
            _ => None,
        };

        let mut insert = ProfileInsert {
            id: utils::new_id(),
            email: profile.email.trim().to_lowercase(),
            display_name: profile.display_name.trim().to_string(),
            sub_id: (self.sub_ids)(),
            referred_by,
        };

        for _ in 0..SUB_ID_ATTEMPTS {
            let outcome = self
                .profiles
                .insert_profile(&insert)
                .await
                .map_err(ServiceError::repository("Profiles"))?;

            match outcome {
                ProfileInsertOutcome::Created(created) => {
                    log::info!(
                        "Created profile {} with sub-ID {}.",
                        created.id,
                        created.sub_id
                    );
                    return Ok(created);
                }
                ProfileInsertOutcome::EmailTaken => {
                    return Err(ServiceError::Conflict(format!(
                        "email {} is already registered",
                        insert.email
                    )));
                }
                ProfileInsertOutcome::SubIdTaken => {
                    log::warn!("Sub-ID {} already taken, generating another.", insert.sub_id);
                    insert.sub_id = (self.sub_ids)();
                }
            }
        }

        Err(ServiceError::Internal(format!(
            "no free sub-ID after {SUB_ID_ATTEMPTS} attempts"
        )))
    }

    async fn get_profile(&self, id: &str) -> Result<Profile, ServiceError> {
        self.profiles
            .get_profile(id)
            .await
            .map_err(ServiceError::repository("Profiles"))?
            .ok_or_else(|| ServiceError::NotFound(format!("profile {id}")))
    }

    async fn list_profiles(
        &self,
        filter: ProfileFilter,
        page: Page,
    ) -> Result<Paginated<Profile>, ServiceError> {
        let (profiles, total) = self
            .profiles
            .list_profiles(&filter, page)
            .await
            .map_err(ServiceError::repository("Profiles"))?;

        Ok(Paginated::new(profiles, total, page))
    }

    /// Only the partner role carries a partner link. It is cleared for every
    /// other role.
    async fn update_role(&self, id: &str, update: RoleUpdate) -> Result<Profile, ServiceError> {
        let partner_id = match (update.role, update.partner_id) {
            (Role::Partner, Some(partner_id)) => {
                self.partners
                    .get_partner(&partner_id)
                    .await
                    .map_err(ServiceError::repository("Profiles"))?
                    .ok_or_else(|| {
                        ServiceError::Invalid(format!("partner {partner_id} does not exist"))
                    })?;
                Some(partner_id)
            }
            (Role::Partner, None) => {
                return Err(ServiceError::Invalid(
                    "partner role requires a partner_id".to_string(),
                ))
            }
            _ => None,
        };

        let profile = self
            .profiles
            .update_role(id, update.role, partner_id.as_deref())
            .await
            .map_err(ServiceError::repository("Profiles"))?
            .ok_or_else(|| ServiceError::NotFound(format!("profile {id}")))?;

        log::info!("Profile {} is now {}.", profile.id, profile.role);
        Ok(profile)
    }

    async fn get_balance(&self, id: &str) -> Result<Balance, ServiceError> {
        self.get_profile(id).await?;

        self.redemptions
            .get_balance(id)
            .await
            .map_err(ServiceError::repository("Profiles"))
    }
}

#[async_trait]
impl RequestHandler<ProfileRequest> for ProfileRequestHandler {
    async fn handle_request(&self, request: ProfileRequest) {
        match request {
            ProfileRequest::Create { profile, response } => {
                let profile = self.create_profile(profile).await;
                let _ = response.send(profile);
            }
            ProfileRequest::Get { id, response } => {
                let profile = self.get_profile(&id).await;
                let _ = response.send(profile);
            }
            ProfileRequest::List {
                filter,
                page,
                response,
            } => {
                let profiles = self.list_profiles(filter, page).await;
                let _ = response.send(profiles);
            }
            ProfileRequest::UpdateRole {
                id,
                update,
                response,
            } => {
                let profile = self.update_role(&id, update).await;
                let _ = response.send(profile);
            }
            ProfileRequest::GetBalance { id, response } => {
                let balance = self.get_balance(&id).await;
                let _ = response.send(balance);
            }
        }
    }
}

pub struct ProfileService;

impl ProfileService {
    pub fn new() -> Self {
        ProfileService {}
    }
}

#[async_trait]
impl Service<ProfileRequest, ProfileRequestHandler> for ProfileService {}
