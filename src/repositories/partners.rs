use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::{
    pagination::Page,
    partners::{
        NewOffer, NewPartner, Offer, OfferListing, Partner, PartnerDeletion, PartnerStats,
    },
};

#[async_trait]
pub trait PartnerStore: Send + Sync {
    async fn list_partners(
        &self,
        search: Option<&str>,
        page: Page,
    ) -> Result<(Vec<Partner>, i64), anyhow::Error>;

    async fn get_partner(&self, id: &str) -> Result<Option<Partner>, anyhow::Error>;

    /// Returns `None` when a partner with the same name exists.
    async fn insert_partner(
        &self,
        id: &str,
        partner: &NewPartner,
    ) -> Result<Option<Partner>, anyhow::Error>;

    /// Inserts or overwrites the partner with the same name.
    async fn upsert_partner(
        &self,
        id: &str,
        partner: &NewPartner,
    ) -> Result<Partner, anyhow::Error>;

    /// Persists every mutable column of `partner`.
    async fn save_partner(&self, partner: &Partner) -> Result<Option<Partner>, anyhow::Error>;

    /// Deletes the partner and its offers unless leads reference it.
    async fn delete_partner(&self, id: &str) -> Result<PartnerDeletion, anyhow::Error>;

    async fn count_partner_leads(&self, id: &str) -> Result<i64, anyhow::Error>;

    async fn partner_stats(&self, id: &str) -> Result<PartnerStats, anyhow::Error>;

    async fn list_active_offers(&self) -> Result<Vec<OfferListing>, anyhow::Error>;

    async fn get_offer(&self, id: &str) -> Result<Option<OfferListing>, anyhow::Error>;

    async fn insert_offer(&self, id: &str, offer: &NewOffer) -> Result<Offer, anyhow::Error>;

    async fn set_offer_active(
        &self,
        id: &str,
        active: bool,
    ) -> Result<Option<Offer>, anyhow::Error>;
}

const OFFER_LISTING: &str = r#"
    SELECT o.id, o.partner_id, p.name AS partner_name, o.title, o.description,
           o.target_url, o.active, p.subid_param, p.base_rate_bps,
           p.promo_rate_bps, p.promo_expires_at
    FROM offers o
    JOIN partners p ON p.id = o.partner_id
"#;

#[derive(Clone)]
pub struct PartnerRepository {
    conn: PgPool,
}

impl PartnerRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl PartnerStore for PartnerRepository {
    async fn list_partners(
        &self,
        search: Option<&str>,
        page: Page,
    ) -> Result<(Vec<Partner>, i64), anyhow::Error> {
        let partners = sqlx::query_as::<_, Partner>(
            r#"
                SELECT * FROM partners
                WHERE ($1::TEXT IS NULL OR name ILIKE '%' || $1 || '%')
                ORDER BY name
                LIMIT $2 OFFSET $3
            "#,
        )
        .bind(search)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.conn)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM partners WHERE ($1::TEXT IS NULL OR name ILIKE '%' || $1 || '%')",
        )
        .bind(search)
        .fetch_one(&self.conn)
        .await?;

        Ok((partners, total))
    }

    async fn get_partner(&self, id: &str) -> Result<Option<Partner>, anyhow::Error> {
        let partner = sqlx::query_as::<_, Partner>("SELECT * FROM partners WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(partner)
    }

    async fn insert_partner(
        &self,
        id: &str,
        partner: &NewPartner,
    ) -> Result<Option<Partner>, anyhow::Error> {
        let partner = sqlx::query_as::<_, Partner>(
            r#"
                INSERT INTO partners
                (id, name, website, base_rate_bps, promo_rate_bps, promo_expires_at, followers, subid_param)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (name) DO NOTHING
                RETURNING *
            "#,
        )
        .bind(id)
        .bind(partner.name.trim())
        .bind(&partner.website)
        .bind(partner.base_rate_bps)
        .bind(partner.promo_rate_bps)
        .bind(partner.promo_expires_at)
        .bind(partner.followers)
        .bind(partner.subid_param())
        .fetch_optional(&self.conn)
        .await?;

        Ok(partner)
    }

    async fn upsert_partner(
        &self,
        id: &str,
        partner: &NewPartner,
    ) -> Result<Partner, anyhow::Error> {
        let partner = sqlx::query_as::<_, Partner>(
            r#"
                INSERT INTO partners
                (id, name, website, base_rate_bps, promo_rate_bps, promo_expires_at, followers, subid_param)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (name) DO UPDATE SET
                    website = EXCLUDED.website,
                    base_rate_bps = EXCLUDED.base_rate_bps,
                    promo_rate_bps = EXCLUDED.promo_rate_bps,
                    promo_expires_at = EXCLUDED.promo_expires_at,
                    followers = EXCLUDED.followers,
                    updated_at = CURRENT_TIMESTAMP
                RETURNING *
            "#,
        )
        .bind(id)
        .bind(partner.name.trim())
        .bind(&partner.website)
        .bind(partner.base_rate_bps)
        .bind(partner.promo_rate_bps)
        .bind(partner.promo_expires_at)
        .bind(partner.followers)
        .bind(partner.subid_param())
        .fetch_one(&self.conn)
        .await?;

        Ok(partner)
    }

    async fn save_partner(&self, partner: &Partner) -> Result<Option<Partner>, anyhow::Error> {
        let partner = sqlx::query_as::<_, Partner>(
            r#"
                UPDATE partners SET
                    website = $1, base_rate_bps = $2, promo_rate_bps = $3,
                    promo_expires_at = $4, followers = $5, subid_param = $6,
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = $7
                RETURNING *
            "#,
        )
        .bind(&partner.website)
        .bind(partner.base_rate_bps)
        .bind(partner.promo_rate_bps)
        .bind(partner.promo_expires_at)
        .bind(partner.followers)
        .bind(&partner.subid_param)
        .bind(&partner.id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(partner)
    }

    async fn delete_partner(&self, id: &str) -> Result<PartnerDeletion, anyhow::Error> {
        let result = sqlx::query("DELETE FROM partners WHERE id = $1")
            .bind(id)
            .execute(&self.conn)
            .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => Ok(PartnerDeletion::Deleted),
            Ok(_) => Ok(PartnerDeletion::NotFound),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Ok(PartnerDeletion::HasLeads)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn count_partner_leads(&self, id: &str) -> Result<i64, anyhow::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM leads WHERE partner_id = $1")
            .bind(id)
            .fetch_one(&self.conn)
            .await?;

        Ok(count)
    }

    async fn partner_stats(&self, id: &str) -> Result<PartnerStats, anyhow::Error> {
        let stats = sqlx::query_as::<_, PartnerStats>(
            r#"
                SELECT
                    (SELECT COUNT(1) FROM clicks c JOIN offers o ON o.id = c.offer_id
                        WHERE o.partner_id = $1) AS clicks,
                    (SELECT COUNT(1) FROM leads WHERE partner_id = $1) AS leads,
                    (SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM leads
                        WHERE partner_id = $1) AS converted_cents,
                    (SELECT COALESCE(SUM(reward_cents + influencer_reward_cents), 0)::BIGINT FROM leads
                        WHERE partner_id = $1) AS rewards_cents
            "#,
        )
        .bind(id)
        .fetch_one(&self.conn)
        .await?;

        Ok(stats)
    }

    async fn list_active_offers(&self) -> Result<Vec<OfferListing>, anyhow::Error> {
        let offers = sqlx::query_as::<_, OfferListing>(&format!(
            "{OFFER_LISTING} WHERE o.active ORDER BY o.created_at DESC"
        ))
        .fetch_all(&self.conn)
        .await?;

        Ok(offers)
    }

    async fn get_offer(&self, id: &str) -> Result<Option<OfferListing>, anyhow::Error> {
        let offer = sqlx::query_as::<_, OfferListing>(&format!("{OFFER_LISTING} WHERE o.id = $1"))
            .bind(id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(offer)
    }

    async fn insert_offer(&self, id: &str, offer: &NewOffer) -> Result<Offer, anyhow::Error> {
        let offer = sqlx::query_as::<_, Offer>(
            r#"
                INSERT INTO offers (id, partner_id, title, description, target_url)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            "#,
        )
        .bind(id)
        .bind(&offer.partner_id)
        .bind(&offer.title)
        .bind(&offer.description)
        .bind(&offer.target_url)
        .fetch_one(&self.conn)
        .await?;

        Ok(offer)
    }

    async fn set_offer_active(
        &self,
        id: &str,
        active: bool,
    ) -> Result<Option<Offer>, anyhow::Error> {
        let offer = sqlx::query_as::<_, Offer>(
            "UPDATE offers SET active = $1 WHERE id = $2 RETURNING *",
        )
        .bind(active)
        .bind(id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(offer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::fixtures;

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires Postgres at DATABASE_URL"]
    async fn partner_with_leads_is_kept(pool: PgPool) {
        let user_id = fixtures::seed_profile(&pool, "ana@example.com").await;
        let partner_id = fixtures::seed_partner(&pool, "Acme").await;
        let click_id = fixtures::seed_click(&pool, &partner_id, Some(&user_id)).await;
        sqlx::query(
            "INSERT INTO leads (id, click_id, partner_id, reward_cents) VALUES ($1, $2, $3, 100)",
        )
        .bind(crate::utils::new_id())
        .bind(&click_id)
        .bind(&partner_id)
        .execute(&pool)
        .await
        .unwrap();
        let repository = PartnerRepository::new(pool);

        let deletion = repository.delete_partner(&partner_id).await.unwrap();

        assert_eq!(deletion, PartnerDeletion::HasLeads);
        assert!(repository.get_partner(&partner_id).await.unwrap().is_some());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires Postgres at DATABASE_URL"]
    async fn delete_cascades_to_offers(pool: PgPool) {
        let partner_id = fixtures::seed_partner(&pool, "Acme").await;
        fixtures::seed_click(&pool, &partner_id, None).await;
        let repository = PartnerRepository::new(pool);

        assert_eq!(
            repository.delete_partner(&partner_id).await.unwrap(),
            PartnerDeletion::Deleted
        );
        assert!(repository.list_active_offers().await.unwrap().is_empty());
        assert_eq!(
            repository.delete_partner(&partner_id).await.unwrap(),
            PartnerDeletion::NotFound
        );
    }
}
