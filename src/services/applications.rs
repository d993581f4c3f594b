use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::{
    models::{
        applications::{
            ApplicationStatus, Approval, NewApplication, PartnerApplication, Rejection,
            ReviewOutcome,
        },
        pagination::{Page, Paginated},
        partners::MAX_RATE_BPS,
    },
    repositories::applications::ApplicationStore,
    utils,
};

pub enum ApplicationRequest {
    Submit {
        profile_id: Option<String>,
        application: NewApplication,
        response: oneshot::Sender<Result<PartnerApplication, ServiceError>>,
    },
    List {
        status: Option<ApplicationStatus>,
        page: Page,
        response: oneshot::Sender<Result<Paginated<PartnerApplication>, ServiceError>>,
    },
    Approve {
        id: String,
        approval: Approval,
        response: oneshot::Sender<Result<PartnerApplication, ServiceError>>,
    },
    Reject {
        id: String,
        rejection: Rejection,
        response: oneshot::Sender<Result<PartnerApplication, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct ApplicationRequestHandler {
    repository: Arc<dyn ApplicationStore>,
}

impl ApplicationRequestHandler {
    pub fn new(repository: Arc<dyn ApplicationStore>) -> Self {
        Self { repository }
    }

    async fn submit(
        &self,
        profile_id: Option<String>,
        application: NewApplication,
    ) -> Result<PartnerApplication, ServiceError> {
        application.validate().map_err(ServiceError::Invalid)?;

        let submitted = self
            .repository
            .insert_application(&utils::new_id(), profile_id.as_deref(), &application)
            .await
            .map_err(ServiceError::repository("Applications"))?;

        if let (Some(requested), None) = (&profile_id, &submitted.profile_id) {
            log::warn!(
                "Application {} submitted unlinked: unknown profile {}.",
                submitted.id,
                requested
            );
        }
        log::info!(
            "Received partner application {} from {}.",
            submitted.id,
            submitted.company_name
        );
        Ok(submitted)
    }

    async fn list(
        &self,
        status: Option<ApplicationStatus>,
        page: Page,
    ) -> Result<Paginated<PartnerApplication>, ServiceError> {
        let (applications, total) = self
            .repository
            .list_applications(status, page)
            .await
            .map_err(ServiceError::repository("Applications"))?;

        Ok(Paginated::new(applications, total, page))
    }

    fn review_result(
        id: &str,
        outcome: ReviewOutcome,
    ) -> Result<PartnerApplication, ServiceError> {
        match outcome {
            ReviewOutcome::Approved {
                application,
                partner,
            } => {
                log::info!(
                    "Approved application {} as partner {} ({}).",
                    application.id,
                    partner.name,
                    partner.id
                );
                Ok(application)
            }
            ReviewOutcome::Rejected(application) => {
                log::info!("Rejected application {}.", application.id);
                Ok(application)
            }
            ReviewOutcome::NotFound => Err(ServiceError::NotFound(format!("application {id}"))),
            ReviewOutcome::NotPending(status) => Err(ServiceError::Conflict(format!(
                "application {} is already {}",
                id,
                status.as_str()
            ))),
            ReviewOutcome::NameTaken => Err(ServiceError::Conflict(format!(
                "a partner with the name of application {id} already exists"
            ))),
        }
    }

    async fn approve(
        &self,
        id: &str,
        approval: Approval,
    ) -> Result<PartnerApplication, ServiceError> {
        if !(0..=MAX_RATE_BPS).contains(&approval.base_rate_bps) {
            return Err(ServiceError::Invalid(format!(
                "base_rate_bps out of range: {}",
                approval.base_rate_bps
            )));
        }

        let outcome = self
            .repository
            .approve_application(id, &utils::new_id(), approval.base_rate_bps)
            .await
            .map_err(ServiceError::repository("Applications"))?;

        Self::review_result(id, outcome)
    }

    async fn reject(
        &self,
        id: &str,
        rejection: Rejection,
    ) -> Result<PartnerApplication, ServiceError> {
        let outcome = self
            .repository
            .reject_application(id, rejection.reason.as_deref())
            .await
            .map_err(ServiceError::repository("Applications"))?;

        Self::review_result(id, outcome)
    }
}

#[async_trait]
impl RequestHandler<ApplicationRequest> for ApplicationRequestHandler {
    async fn handle_request(&self, request: ApplicationRequest) {
        match request {
            ApplicationRequest::Submit {
                profile_id,
                application,
                response,
            } => {
                let application = self.submit(profile_id, application).await;
                let _ = response.send(application);
            }
            ApplicationRequest::List {
                status,
                page,
                response,
            } => {
                let applications = self.list(status, page).await;
                let _ = response.send(applications);
            }
            ApplicationRequest::Approve {
                id,
                approval,
                response,
            } => {
                let application = self.approve(&id, approval).await;
                let _ = response.send(application);
            }
            ApplicationRequest::Reject {
                id,
                rejection,
                response,
            } => {
                let application = self.reject(&id, rejection).await;
                let _ = response.send(application);
            }
        }
    }
}

pub struct ApplicationService;

impl ApplicationService {
    pub fn new() -> Self {
        ApplicationService {}
    }
}

#[async_trait]
impl Service<ApplicationRequest, ApplicationRequestHandler> for ApplicationService {}
