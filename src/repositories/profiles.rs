use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::{
    pagination::Page,
    profiles::{Profile, ProfileFilter, ProfileInsert, ProfileInsertOutcome, Role},
};

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Reports which unique column blocked the insert, if any.
    async fn insert_profile(
        &self,
        profile: &ProfileInsert,
    ) -> Result<ProfileInsertOutcome, anyhow::Error>;

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, anyhow::Error>;

    async fn get_profile_by_sub_id(&self, sub_id: &str) -> Result<Option<Profile>, anyhow::Error>;

    async fn list_profiles(
        &self,
        filter: &ProfileFilter,
        page: Page,
    ) -> Result<(Vec<Profile>, i64), anyhow::Error>;

    async fn update_role(
        &self,
        id: &str,
        role: Role,
        partner_id: Option<&str>,
    ) -> Result<Option<Profile>, anyhow::Error>;
}

#[derive(Clone)]
pub struct ProfileRepository {
    conn: PgPool,
}

impl ProfileRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ProfileStore for ProfileRepository {
    async fn insert_profile(
        &self,
        profile: &ProfileInsert,
    ) -> Result<ProfileInsertOutcome, anyhow::Error> {
        let created = sqlx::query_as::<_, Profile>(
            r#"
                INSERT INTO profiles (id, email, display_name, sub_id, referred_by)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT DO NOTHING
                RETURNING *
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.email)
        .bind(&profile.display_name)
        .bind(&profile.sub_id)
        .bind(&profile.referred_by)
        .fetch_optional(&self.conn)
        .await?;

        if let Some(created) = created {
            return Ok(ProfileInsertOutcome::Created(created));
        }

        let email_taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM profiles WHERE email = $1)")
                .bind(&profile.email)
                .fetch_one(&self.conn)
                .await?;

        Ok(if email_taken {
            ProfileInsertOutcome::EmailTaken
        } else {
            ProfileInsertOutcome::SubIdTaken
        })
    }

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, anyhow::Error> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(profile)
    }

    async fn get_profile_by_sub_id(&self, sub_id: &str) -> Result<Option<Profile>, anyhow::Error> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE sub_id = $1")
            .bind(sub_id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(profile)
    }

    async fn list_profiles(
        &self,
        filter: &ProfileFilter,
        page: Page,
    ) -> Result<(Vec<Profile>, i64), anyhow::Error> {
        let role = filter.role.map(|r| r.as_str());
        let search = filter.search.as_deref().filter(|s| !s.is_empty());

        let profiles = sqlx::query_as::<_, Profile>(
            r#"
                SELECT * FROM profiles
                WHERE ($1::TEXT IS NULL OR role = $1)
                AND ($2::TEXT IS NULL OR email ILIKE '%' || $2 || '%' OR display_name ILIKE '%' || $2 || '%')
                ORDER BY created_at DESC
                LIMIT $3 OFFSET $4
            "#,
        )
        .bind(role)
        .bind(search)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.conn)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
                SELECT COUNT(1) FROM profiles
                WHERE ($1::TEXT IS NULL OR role = $1)
                AND ($2::TEXT IS NULL OR email ILIKE '%' || $2 || '%' OR display_name ILIKE '%' || $2 || '%')
            "#,
        )
        .bind(role)
        .bind(search)
        .fetch_one(&self.conn)
        .await?;

        Ok((profiles, total))
    }

    async fn update_role(
        &self,
        id: &str,
        role: Role,
        partner_id: Option<&str>,
    ) -> Result<Option<Profile>, anyhow::Error> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
                UPDATE profiles
                SET role = $1, partner_id = $2, updated_at = CURRENT_TIMESTAMP
                WHERE id = $3
                RETURNING *
            "#,
        )
        .bind(role.as_str())
        .bind(partner_id)
        .bind(id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(profile)
    }
}
