use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use interface::{
    Candle, ExchangeError, ExchangeId, OrderAck, OrderBook, OrderSide, OrderStatus, Ticker,
    TradeTick,
};

use super::{
    classify_api_error, generate_signature, get_timestamp, parse_order_status, GateClient,
    BASE_URL,
};
use crate::SpotExchange;

#[derive(Debug, Deserialize)]
struct GateOrderResponse {
    id: Option<String>,
    status: Option<String>,
}

impl GateClient {
    /// 서명된 주문 생성 요청.
    /// limit 주문은 price 필수. market 주문은 gtc 대신 ioc로 제출한다.
    /// 주의: Gate의 market BUY는 amount를 quote 통화 기준으로 해석한다.
    async fn send_order(
        &self,
        symbol: &str,
        side: OrderSide,
        amount: f64,
        price: Option<f64>,
    ) -> Result<OrderAck, ExchangeError> {
        let (api_key, api_secret) = self.credentials()?;
        let pair = Self::normalize_symbol(symbol);

        let body = match price {
            Some(price) => json!({
                "currency_pair": pair,
                "side": side.as_str(),
                "type": "limit",
                "time_in_force": "gtc",
                "amount": format!("{:.8}", amount),
                "price": format!("{:.8}", price),
            }),
            None => json!({
                "currency_pair": pair,
                "side": side.as_str(),
                "type": "market",
                "time_in_force": "ioc",
                "amount": format!("{:.8}", amount),
            }),
        };
        let body_str = body.to_string();

        let path = "/api/v4/spot/orders";
        let timestamp = get_timestamp();
        let signature = generate_signature("POST", path, "", &body_str, &timestamp, api_secret);

        info!("place_order body: {}", body_str);

        let response = self
            .http
            .post(format!("{}{}", BASE_URL, path))
            .header("Content-Type", "application/json")
            .header("KEY", api_key)
            .header("Timestamp", &timestamp)
            .header("SIGN", &signature)
            .body(body_str)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        info!("place_order response: {}", response_text);

        if !status.is_success() {
            return Err(classify_api_error(status, &response_text));
        }

        let order: GateOrderResponse = serde_json::from_str(&response_text)
            .map_err(|e| ExchangeError::Other(format!("Failed to parse order response: {}", e)))?;

        Ok(OrderAck {
            id: order.id,
            symbol: pair,
            side,
            amount,
            price,
            status: order.status.as_deref().map(parse_order_status),
        })
    }
}

#[async_trait]
impl SpotExchange for GateClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Gate
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        self.get_ticker(symbol).await
    }

    async fn fetch_orderbook(&self, symbol: &str, depth: u32) -> Result<OrderBook, ExchangeError> {
        self.get_orderbook(symbol, depth).await
    }

    async fn fetch_trades(
        &self,
        symbol: &str,
        limit: u32,
    ) -> Result<Vec<TradeTick>, ExchangeError> {
        self.get_trades(symbol, limit).await
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        self.get_candles(symbol, interval, limit).await
    }

    async fn fetch_balance(&self, currency: &str) -> Result<f64, ExchangeError> {
        self.get_free_balance(currency).await
    }

    async fn create_limit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        amount: f64,
        price: f64,
    ) -> Result<OrderAck, ExchangeError> {
        self.send_order(symbol, side, amount, Some(price)).await
    }

    async fn create_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        amount: f64,
    ) -> Result<OrderAck, ExchangeError> {
        self.send_order(symbol, side, amount, None).await
    }

    async fn cancel_order(&self, order_id: &str, symbol: &str) -> Result<(), ExchangeError> {
        let (api_key, api_secret) = self.credentials()?;
        let pair = Self::normalize_symbol(symbol);

        let path = format!("/api/v4/spot/orders/{}", order_id);
        let query = format!("currency_pair={}", pair);
        let timestamp = get_timestamp();
        let signature = generate_signature("DELETE", &path, &query, "", &timestamp, api_secret);

        let response = self
            .http
            .delete(format!("{}{}?{}", BASE_URL, path, query))
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

        Ok(())
    }

    async fn fetch_order_status(
        &self,
        order_id: &str,
        symbol: &str,
    ) -> Result<OrderStatus, ExchangeError> {
        let (api_key, api_secret) = self.credentials()?;
        let pair = Self::normalize_symbol(symbol);

        let path = format!("/api/v4/spot/orders/{}", order_id);
        let query = format!("currency_pair={}", pair);
        let timestamp = get_timestamp();
        let signature = generate_signature("GET", &path, &query, "", &timestamp, api_secret);

        let response = self
            .http
            .get(format!("{}{}?{}", BASE_URL, path, query))
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

        let order: GateOrderResponse = serde_json::from_str(&response_text)
            .map_err(|e| ExchangeError::Other(format!("Failed to parse order status: {}", e)))?;

        Ok(order
            .status
            .as_deref()
            .map(parse_order_status)
            .unwrap_or(OrderStatus::Open))
    }
}
