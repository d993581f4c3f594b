//! Row seeding for the Postgres-backed repository tests.

use sqlx::PgPool;

use crate::utils;

pub async fn seed_profile(pool: &PgPool, email: &str) -> String {
    let id = utils::new_id();
    sqlx::query("INSERT INTO profiles (id, email, display_name, sub_id) VALUES ($1, $2, $3, $4)")
        .bind(&id)
        .bind(email)
        .bind(email)
        .bind(utils::generate_sub_id())
        .execute(pool)
        .await
        .unwrap();
    id
}

pub async fn seed_partner(pool: &PgPool, name: &str) -> String {
    let id = utils::new_id();
    sqlx::query("INSERT INTO partners (id, name, base_rate_bps) VALUES ($1, $2, 500)")
        .bind(&id)
        .bind(name)
        .execute(pool)
        .await
        .unwrap();
    id
}

pub async fn seed_click(pool: &PgPool, partner_id: &str, user_id: Option<&str>) -> String {
    let offer_id = utils::new_id();
    sqlx::query("INSERT INTO offers (id, partner_id, title, target_url) VALUES ($1, $2, $3, $4)")
        .bind(&offer_id)
        .bind(partner_id)
        .bind("Offer")
        .bind("https://shop.example.com/")
        .execute(pool)
        .await
        .unwrap();

    let click_id = utils::new_id();
    sqlx::query("INSERT INTO clicks (id, offer_id, user_id) VALUES ($1, $2, $3)")
        .bind(&click_id)
        .bind(&offer_id)
        .bind(user_id)
        .execute(pool)
        .await
        .unwrap();
    click_id
}

/// Credits `reward_cents` to `user_id` through a payout-ready lead.
pub async fn seed_credit(pool: &PgPool, user_id: &str, reward_cents: i64) {
    let partner_id = seed_partner(pool, &format!("Partner {}", utils::new_id())).await;
    let click_id = seed_click(pool, &partner_id, Some(user_id)).await;
    sqlx::query(
        r#"
            INSERT INTO leads (id, click_id, partner_id, user_id, reward_cents, payout_ready)
            VALUES ($1, $2, $3, $4, $5, TRUE)
        "#,
    )
    .bind(utils::new_id())
    .bind(&click_id)
    .bind(&partner_id)
    .bind(user_id)
    .bind(reward_cents)
    .execute(pool)
    .await
    .unwrap();
}
