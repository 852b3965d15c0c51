use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use interface::{AssetBalance, ExchangeError, ExchangeId};

use super::{classify_api_error, generate_signature, get_timestamp, GateClient, BASE_URL};
use crate::AssetExchange;

#[derive(Debug, Deserialize)]
struct GateAccount {
    currency: String,
    available: String,
    locked: String,
}

impl GateClient {
    /// GET /api/v4/spot/accounts (서명 필요)
    async fn fetch_accounts(&self, currency: Option<&str>) -> Result<Vec<GateAccount>, ExchangeError> {
        let (api_key, api_secret) = self.credentials()?;

        let path = "/api/v4/spot/accounts";
        let query = match currency {
            Some(c) => format!("currency={}", c),
            None => String::new(),
        };

        let timestamp = get_timestamp();
        let signature = generate_signature("GET", path, &query, "", &timestamp, api_secret);

        let url = if query.is_empty() {
            format!("{}{}", BASE_URL, path)
        } else {
            format!("{}{}?{}", BASE_URL, path, query)
        };

        let response = self
            .http
            .get(&url)
            .header("KEY", api_key)
            .header("Timestamp", &timestamp)
            .header("SIGN", &signature)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(classify_api_error(status, &response_text));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            ExchangeError::Other(format!(
                "Failed to parse accounts response: {}, response: {}",
                e,
                response_text.chars().take(200).collect::<String>()
            ))
        })
    }

    /// 특정 통화의 사용 가능 잔고
    pub(crate) async fn get_free_balance(&self, currency: &str) -> Result<f64, ExchangeError> {
        let accounts = self.fetch_accounts(Some(currency)).await?;

        let free = accounts
            .iter()
            .find(|a| a.currency == currency)
            .map(|a| a.available.parse::<f64>().unwrap_or(0.0))
            .unwrap_or(0.0);

        Ok(free)
    }
}

#[async_trait]
impl AssetExchange for GateClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Gate
    }

    async fn fetch_assets(&self) -> Result<Vec<AssetBalance>, ExchangeError> {
        let accounts = self.fetch_accounts(None).await?;
        let now = Utc::now();
        let mut assets = Vec::new();

        for account in accounts {
            let available: f64 = account.available.parse().unwrap_or(0.0);
            let locked: f64 = account.locked.parse().unwrap_or(0.0);
            let total = available + locked;

            if total > 0.0 {
                assets.push(AssetBalance {
                    currency: account.currency,
                    total,
                    available,
                    in_use: locked,
                    updated_at: now,
                });
            }
        }

        Ok(assets)
    }
}
