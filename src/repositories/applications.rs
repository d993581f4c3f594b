use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::{
    applications::{ApplicationStatus, NewApplication, PartnerApplication, ReviewOutcome},
    pagination::Page,
    partners::{Partner, DEFAULT_SUBID_PARAM},
};

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Inserts a pending application. `profile_id` is only linked when it
    /// names an existing profile.
    async fn insert_application(
        &self,
        id: &str,
        profile_id: Option<&str>,
        application: &NewApplication,
    ) -> Result<PartnerApplication, anyhow::Error>;

    async fn get_application(&self, id: &str) -> Result<Option<PartnerApplication>, anyhow::Error>;

    async fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
        page: Page,
    ) -> Result<(Vec<PartnerApplication>, i64), anyhow::Error>;

    /// Creates the partner, promotes the applicant and closes the
    /// application in one transaction.
    async fn approve_application(
        &self,
        id: &str,
        partner_id: &str,
        base_rate_bps: i32,
    ) -> Result<ReviewOutcome, anyhow::Error>;

    async fn reject_application(
        &self,
        id: &str,
        reason: Option<&str>,
    ) -> Result<ReviewOutcome, anyhow::Error>;
}

#[derive(Clone)]
pub struct ApplicationRepository {
    conn: PgPool,
}

impl ApplicationRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ApplicationStore for ApplicationRepository {
    async fn insert_application(
        &self,
        id: &str,
        profile_id: Option<&str>,
        application: &NewApplication,
    ) -> Result<PartnerApplication, anyhow::Error> {
        let application = sqlx::query_as::<_, PartnerApplication>(
            r#"
                INSERT INTO partner_applications
                (id, profile_id, company_name, contact_email, website, message)
                VALUES ($1, (SELECT id FROM profiles WHERE id = $2), $3, $4, $5, $6)
                RETURNING *
            "#,
        )
        .bind(id)
        .bind(profile_id)
        .bind(application.company_name.trim())
        .bind(application.contact_email.trim())
        .bind(&application.website)
        .bind(&application.message)
        .fetch_one(&self.conn)
        .await?;

        Ok(application)
    }

    async fn get_application(&self, id: &str) -> Result<Option<PartnerApplication>, anyhow::Error> {
        let application = sqlx::query_as::<_, PartnerApplication>(
            "SELECT * FROM partner_applications WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(application)
    }

    async fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
        page: Page,
    ) -> Result<(Vec<PartnerApplication>, i64), anyhow::Error> {
        let status = status.map(|s| s.as_str());

        let applications = sqlx::query_as::<_, PartnerApplication>(
            r#"
                SELECT * FROM partner_applications
                WHERE ($1::TEXT IS NULL OR status = $1)
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.conn)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM partner_applications WHERE ($1::TEXT IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.conn)
        .await?;

        Ok((applications, total))
    }

    async fn approve_application(
        &self,
        id: &str,
        partner_id: &str,
        base_rate_bps: i32,
    ) -> Result<ReviewOutcome, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let application = sqlx::query_as::<_, PartnerApplication>(
            "SELECT * FROM partner_applications WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let application = match application {
            Some(a) if a.status == ApplicationStatus::Pending => a,
            Some(a) => return Ok(ReviewOutcome::NotPending(a.status)),
            None => return Ok(ReviewOutcome::NotFound),
        };

        let partner = sqlx::query_as::<_, Partner>(
            r#"
                INSERT INTO partners (id, name, website, base_rate_bps, subid_param)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (name) DO NOTHING
                RETURNING *
            "#,
        )
        .bind(partner_id)
        .bind(&application.company_name)
        .bind(&application.website)
        .bind(base_rate_bps)
        .bind(DEFAULT_SUBID_PARAM)
        .fetch_optional(&mut *tx)
        .await?;

        let partner = match partner {
            Some(p) => p,
            None => return Ok(ReviewOutcome::NameTaken),
        };

        if let Some(profile_id) = &application.profile_id {
            sqlx::query(
                r#"
                    UPDATE profiles
                    SET role = 'partner', partner_id = $1, updated_at = CURRENT_TIMESTAMP
                    WHERE id = $2
                "#,
            )
            .bind(&partner.id)
            .bind(profile_id)
            .execute(&mut *tx)
            .await?;
        }

        let application = sqlx::query_as::<_, PartnerApplication>(
            r#"
                UPDATE partner_applications
                SET status = 'approved', partner_id = $1, reviewed_at = CURRENT_TIMESTAMP
                WHERE id = $2
                RETURNING *
            "#,
        )
        .bind(&partner.id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ReviewOutcome::Approved {
            application,
            partner,
        })
    }

    async fn reject_application(
        &self,
        id: &str,
        reason: Option<&str>,
    ) -> Result<ReviewOutcome, anyhow::Error> {
        let rejected = sqlx::query_as::<_, PartnerApplication>(
            r#"
                UPDATE partner_applications
                SET status = 'rejected', review_note = $1, reviewed_at = CURRENT_TIMESTAMP
                WHERE id = $2 AND status = 'pending'
                RETURNING *
            "#,
        )
        .bind(reason)
        .bind(id)
        .fetch_optional(&self.conn)
        .await?;

        if let Some(application) = rejected {
            return Ok(ReviewOutcome::Rejected(application));
        }

        match self.get_application(id).await? {
            Some(application) => Ok(ReviewOutcome::NotPending(application.status)),
            None => Ok(ReviewOutcome::NotFound),
        }
    }
}
