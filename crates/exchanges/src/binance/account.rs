use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use interface::{AssetBalance, ExchangeError, ExchangeId};

use super::{classify_api_error, generate_signature, get_timestamp, BinanceClient, BASE_URL};
use crate::AssetExchange;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceAccountResponse {
    balances: Vec<BinanceBalance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceBalance {
    asset: String,
    free: String,   // 사용 가능한 잔액
    locked: String, // 주문에 사용 중인 잔액
}

impl BinanceClient {
    /// GET /api/v3/account (서명 필요)
    async fn fetch_account(&self) -> Result<BinanceAccountResponse, ExchangeError> {
        let (api_key, api_secret) = self.credentials()?;

        let timestamp = get_timestamp();
        let query_string = format!("timestamp={}&recvWindow=50000", timestamp);
        let signature = generate_signature(&query_string, api_secret);
        let url = format!(
            "{}/api/v3/account?{}&signature={}",
            BASE_URL, query_string, signature
        );

        let response = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", api_key)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(classify_api_error(status, &response_text));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            ExchangeError::Other(format!(
                "Failed to parse account response: {}, response: {}",
                e,
                response_text.chars().take(200).collect::<String>()
            ))
        })
    }

    /// 특정 통화의 사용 가능 잔고
    pub(crate) async fn get_free_balance(&self, currency: &str) -> Result<f64, ExchangeError> {
        let account = self.fetch_account().await?;

        let free = account
            .balances
            .iter()
            .find(|b| b.asset == currency)
            .map(|b| b.free.parse::<f64>().unwrap_or(0.0))
            .unwrap_or(0.0);

        Ok(free)
    }
}

#[async_trait]
impl AssetExchange for BinanceClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    async fn fetch_assets(&self) -> Result<Vec<AssetBalance>, ExchangeError> {
        let account = self.fetch_account().await?;
        let now = Utc::now();
        let mut assets = Vec::new();

        for balance in account.balances {
            let free: f64 = balance.free.parse().unwrap_or(0.0);
            let locked: f64 = balance.locked.parse().unwrap_or(0.0);
            let total = free + locked;

            // 잔액이 0인 경우 스킵
            if total > 0.0 {
                assets.push(AssetBalance {
                    currency: balance.asset,
                    total,
                    available: free,
                    in_use: locked,
                    updated_at: now,
                });
            }
        }

        Ok(assets)
    }
}
