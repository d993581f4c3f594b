use anyhow::bail;
use async_trait::async_trait;
use serde_json::json;

use crate::models::redemptions::Voucher;

#[async_trait]
pub trait GiftCardProvider: Send + Sync {
    async fn issue_voucher(
        &self,
        reference: &str,
        brand: &str,
        amount_cents: i64,
    ) -> Result<Voucher, anyhow::Error>;
}

pub struct GiftCardApi {
    api_key: String,
    url: String,
    currency: String,
    client: reqwest::Client,
}

impl GiftCardApi {
    pub fn new(api_key: String, url: String, currency: String) -> Self {
        Self {
            api_key,
            url,
            currency,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl GiftCardProvider for GiftCardApi {
    async fn issue_voucher(
        &self,
        reference: &str,
        brand: &str,
        amount_cents: i64,
    ) -> Result<Voucher, anyhow::Error> {
        let payload = json!({
            "reference": reference,
            "brand": brand,
            "amount_cents": amount_cents,
            "currency": self.currency,
        });

        // One voucher per redemption id.
        let response = self
            .client
            .post(format!("{}/v1/vouchers", self.url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .header("Idempotency-Key", reference)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            bail!("Gift card provider: HTTP {} - {}", status, body);
        }

        let response_json: serde_json::Value = serde_json::from_str(&body)?;
        match response_json.get("voucher") {
            Some(v) => {
                let voucher: Voucher = serde_json::from_value(v.clone())?;
                Ok(voucher)
            }
            None => bail!("Gift card provider: Bad response format."),
        }
    }
}
