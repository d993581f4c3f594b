use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::leads::{Lead, NewLead};

#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Inserts the lead and marks its click redeemed. Returns `None` when the
    /// click already has a lead.
    async fn insert_lead(&self, lead: &NewLead) -> Result<Option<Lead>, anyhow::Error>;

    async fn get_lead_by_click(&self, click_id: &str) -> Result<Option<Lead>, anyhow::Error>;

    async fn approve_lead(&self, id: &str) -> Result<Option<Lead>, anyhow::Error>;
}

#[derive(Clone)]
pub struct LeadRepository {
    conn: PgPool,
}

impl LeadRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl LeadStore for LeadRepository {
    async fn insert_lead(&self, lead: &NewLead) -> Result<Option<Lead>, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let inserted = sqlx::query_as::<_, Lead>(
            r#"
                INSERT INTO leads
                (id, click_id, partner_id, user_id, influencer_id, amount_cents,
                 reward_cents, influencer_reward_cents, external_ref, payout_ready)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (click_id) DO NOTHING
                RETURNING *
            "#,
        )
        .bind(&lead.id)
        .bind(&lead.click_id)
        .bind(&lead.partner_id)
        .bind(&lead.user_id)
        .bind(&lead.influencer_id)
        .bind(lead.amount_cents)
        .bind(lead.reward_cents)
        .bind(lead.influencer_reward_cents)
        .bind(&lead.external_ref)
        .bind(lead.payout_ready)
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_some() {
            sqlx::query("UPDATE clicks SET redeemed = TRUE WHERE id = $1")
                .bind(&lead.click_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(inserted)
    }

    async fn get_lead_by_click(&self, click_id: &str) -> Result<Option<Lead>, anyhow::Error> {
        let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE click_id = $1")
            .bind(click_id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(lead)
    }

    async fn approve_lead(&self, id: &str) -> Result<Option<Lead>, anyhow::Error> {
        let lead = sqlx::query_as::<_, Lead>(
            "UPDATE leads SET payout_ready = TRUE WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(lead)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{repositories::fixtures, utils};

    fn new_lead(click_id: &str, partner_id: &str) -> NewLead {
        NewLead {
            id: utils::new_id(),
            click_id: click_id.to_string(),
            partner_id: partner_id.to_string(),
            user_id: None,
            influencer_id: None,
            amount_cents: Some(10_000),
            reward_cents: 500,
            influencer_reward_cents: 0,
            external_ref: None,
            payout_ready: false,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires Postgres at DATABASE_URL"]
    async fn one_lead_per_click(pool: PgPool) {
        let partner_id = fixtures::seed_partner(&pool, "Acme").await;
        let click_id = fixtures::seed_click(&pool, &partner_id, None).await;
        let repository = LeadRepository::new(pool.clone());

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let repository = repository.clone();
            let lead = new_lead(&click_id, &partner_id);
            tasks.push(tokio::spawn(async move {
                repository.insert_lead(&lead).await
            }));
        }
        let mut created = 0;
        for task in tasks {
            if task.await.unwrap().unwrap().is_some() {
                created += 1;
            }
        }
        assert_eq!(created, 1);

        let again = repository
            .insert_lead(&new_lead(&click_id, &partner_id))
            .await
            .unwrap();
        assert!(again.is_none());

        let redeemed: bool = sqlx::query_scalar("SELECT redeemed FROM clicks WHERE id = $1")
            .bind(&click_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(redeemed);
        assert!(repository.get_lead_by_click(&click_id).await.unwrap().is_some());
    }
}
