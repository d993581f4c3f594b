use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    models::{
        events::{NewWebhookEvent, WebhookEvent},
        pagination::Page,
    },
    utils,
};

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn log_event(&self, event: &NewWebhookEvent) -> Result<(), anyhow::Error>;

    async fn list_events(
        &self,
        click_id: Option<&str>,
        page: Page,
    ) -> Result<(Vec<WebhookEvent>, i64), anyhow::Error>;
}

#[derive(Clone)]
pub struct EventRepository {
    conn: PgPool,
}

impl EventRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl EventStore for EventRepository {
    async fn log_event(&self, event: &NewWebhookEvent) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"
                INSERT INTO webhook_events (id, source, click_id, outcome, detail, payload)
                VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(utils::new_id())
        .bind(&event.source)
        .bind(&event.click_id)
        .bind(event.outcome.as_str())
        .bind(&event.detail)
        .bind(&event.payload)
        .execute(&self.conn)
        .await?;

        Ok(())
    }

    async fn list_events(
        &self,
        click_id: Option<&str>,
        page: Page,
    ) -> Result<(Vec<WebhookEvent>, i64), anyhow::Error> {
        let events = sqlx::query_as::<_, WebhookEvent>(
            r#"
                SELECT * FROM webhook_events
                WHERE ($1::TEXT IS NULL OR click_id = $1)
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
            "#,
        )
        .bind(click_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.conn)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM webhook_events WHERE ($1::TEXT IS NULL OR click_id = $1)",
        )
        .bind(click_id)
        .fetch_one(&self.conn)
        .await?;

        Ok((events, total))
    }
}
