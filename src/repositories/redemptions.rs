use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::{
    leads::Balance,
    pagination::Page,
    redemptions::{
        NewRedemption, PayoutMethod, Redemption, RedemptionInsert, RedemptionStatus, Voucher,
    },
};

#[async_trait]
pub trait RedemptionStore: Send + Sync {
    async fn get_balance(&self, user_id: &str) -> Result<Balance, anyhow::Error>;

    /// Checks the available balance and inserts a pending redemption in one
    /// transaction, serialised per user.
    async fn insert_redemption(
        &self,
        id: &str,
        user_id: &str,
        redemption: &NewRedemption,
    ) -> Result<RedemptionInsert, anyhow::Error>;

    async fn get_redemption(&self, id: &str) -> Result<Option<Redemption>, anyhow::Error>;

    async fn list_user_redemptions(&self, user_id: &str) -> Result<Vec<Redemption>, anyhow::Error>;

    async fn list_redemptions(
        &self,
        status: Option<RedemptionStatus>,
        page: Page,
    ) -> Result<(Vec<Redemption>, i64), anyhow::Error>;

    /// Moves `id` from `from` to `to`. Returns `None` when the stored status
    /// is no longer `from`.
    async fn update_status(
        &self,
        id: &str,
        from: RedemptionStatus,
        to: RedemptionStatus,
        note: Option<&str>,
    ) -> Result<Option<Redemption>, anyhow::Error>;

    /// Stores the issued voucher and marks a processing redemption paid.
    async fn record_voucher(
        &self,
        id: &str,
        voucher: &Voucher,
    ) -> Result<Option<Redemption>, anyhow::Error>;
}

const BALANCE_QUERY: &str = r#"
    SELECT
        (COALESCE((SELECT SUM(reward_cents) FROM leads WHERE user_id = $1 AND payout_ready), 0)
         + COALESCE((SELECT SUM(influencer_reward_cents) FROM leads WHERE influencer_id = $1 AND payout_ready), 0)
         - COALESCE((SELECT SUM(amount_cents) FROM redemptions WHERE user_id = $1 AND status <> 'rejected'), 0)
        )::BIGINT AS available_cents,
        (COALESCE((SELECT SUM(reward_cents) FROM leads WHERE user_id = $1 AND NOT payout_ready), 0)
         + COALESCE((SELECT SUM(influencer_reward_cents) FROM leads WHERE influencer_id = $1 AND NOT payout_ready), 0)
        )::BIGINT AS pending_cents
"#;

#[derive(Clone)]
pub struct RedemptionRepository {
    conn: PgPool,
}

impl RedemptionRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RedemptionStore for RedemptionRepository {
    async fn get_balance(&self, user_id: &str) -> Result<Balance, anyhow::Error> {
        let balance = sqlx::query_as::<_, Balance>(BALANCE_QUERY)
            .bind(user_id)
            .fetch_one(&self.conn)
            .await?;

        Ok(balance)
    }

    async fn insert_redemption(
        &self,
        id: &str,
        user_id: &str,
        redemption: &NewRedemption,
    ) -> Result<RedemptionInsert, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let locked: Option<String> =
            sqlx::query_scalar("SELECT id FROM profiles WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Ok(RedemptionInsert::UnknownUser);
        }

        let balance = sqlx::query_as::<_, Balance>(BALANCE_QUERY)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        if balance.available_cents < redemption.amount_cents {
            return Ok(RedemptionInsert::InsufficientBalance {
                available_cents: balance.available_cents,
            });
        }

        let (brand, iban, account_holder) = match &redemption.method {
            PayoutMethod::GiftCard { brand } => (Some(brand.as_str()), None, None),
            PayoutMethod::Bank {
                iban,
                account_holder,
            } => (None, Some(iban.as_str()), Some(account_holder.as_str())),
        };

        let created = sqlx::query_as::<_, Redemption>(
            r#"
                INSERT INTO redemptions
                (id, user_id, amount_cents, status, method, gift_card_brand, iban, account_holder)
                VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7)
                RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(redemption.amount_cents)
        .bind(redemption.method.kind().as_str())
        .bind(brand)
        .bind(iban)
        .bind(account_holder)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(RedemptionInsert::Created(created))
    }

    async fn get_redemption(&self, id: &str) -> Result<Option<Redemption>, anyhow::Error> {
        let redemption = sqlx::query_as::<_, Redemption>("SELECT * FROM redemptions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(redemption)
    }

    async fn list_user_redemptions(&self, user_id: &str) -> Result<Vec<Redemption>, anyhow::Error> {
        let redemptions = sqlx::query_as::<_, Redemption>(
            "SELECT * FROM redemptions WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(redemptions)
    }

    async fn list_redemptions(
        &self,
        status: Option<RedemptionStatus>,
        page: Page,
    ) -> Result<(Vec<Redemption>, i64), anyhow::Error> {
        let status = status.map(|s| s.as_str());

        let redemptions = sqlx::query_as::<_, Redemption>(
            r#"
                SELECT * FROM redemptions
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
            "SELECT COUNT(1) FROM redemptions WHERE ($1::TEXT IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.conn)
        .await?;

        Ok((redemptions, total))
    }

    async fn update_status(
        &self,
        id: &str,
        from: RedemptionStatus,
        to: RedemptionStatus,
        note: Option<&str>,
    ) -> Result<Option<Redemption>, anyhow::Error> {
        let redemption = sqlx::query_as::<_, Redemption>(
            r#"
                UPDATE redemptions
                SET status = $1, admin_note = COALESCE($2, admin_note), updated_at = CURRENT_TIMESTAMP
                WHERE id = $3 AND status = $4
                RETURNING *
            "#,
        )
        .bind(to.as_str())
        .bind(note)
        .bind(id)
        .bind(from.as_str())
        .fetch_optional(&self.conn)
        .await?;

        Ok(redemption)
    }

    async fn record_voucher(
        &self,
        id: &str,
        voucher: &Voucher,
    ) -> Result<Option<Redemption>, anyhow::Error> {
        let redemption = sqlx::query_as::<_, Redemption>(
            r#"
                UPDATE redemptions
                SET status = 'paid', voucher_code = $1, voucher_url = $2, updated_at = CURRENT_TIMESTAMP
                WHERE id = $3 AND status = 'processing'
                RETURNING *
            "#,
        )
        .bind(&voucher.code)
        .bind(&voucher.url)
        .bind(id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(redemption)
    }
}
