use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::clicks::{Click, NewClick};

#[async_trait]
pub trait ClickStore: Send + Sync {
    async fn insert_click(&self, click: &NewClick) -> Result<Click, anyhow::Error>;

    async fn get_click(&self, id: &str) -> Result<Option<Click>, anyhow::Error>;
}

#[derive(Clone)]
pub struct ClickRepository {
    conn: PgPool,
}

impl ClickRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ClickStore for ClickRepository {
    async fn insert_click(&self, click: &NewClick) -> Result<Click, anyhow::Error> {
        let click = sqlx::query_as::<_, Click>(
            r#"
                INSERT INTO clicks (id, offer_id, user_id, influencer_id, ip_hash, user_agent)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            "#,
        )
        .bind(&click.id)
        .bind(&click.offer_id)
        .bind(&click.user_id)
        .bind(&click.influencer_id)
        .bind(&click.ip_hash)
        .bind(&click.user_agent)
        .fetch_one(&self.conn)
        .await?;

        Ok(click)
    }

    async fn get_click(&self, id: &str) -> Result<Option<Click>, anyhow::Error> {
        let click = sqlx::query_as::<_, Click>("SELECT * FROM clicks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(click)
    }
}
