use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use interface::{
    Candle, ExchangeError, ExchangeId, OrderAck, OrderBook, OrderSide, OrderStatus, Ticker,
    TradeTick,
};

use super::{
    classify_api_error, generate_signature, get_timestamp, parse_order_status, BinanceClient,
    BASE_URL,
};
use crate::SpotExchange;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceOrderResponse {
    order_id: Option<u64>,
    status: Option<String>,
}

fn side_param(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "BUY",
        OrderSide::Sell => "SELL",
    }
}

impl BinanceClient {
    /// 서명된 주문 요청 전송. 성공 시 주문 응답을 파싱해서 돌려준다.
    async fn send_order(
        &self,
        symbol: &str,
        side: OrderSide,
        amount: f64,
        price: Option<f64>,
    ) -> Result<OrderAck, ExchangeError> {
        let (api_key, api_secret) = self.credentials()?;
        let normalized = Self::normalize_symbol(symbol);

        let timestamp = get_timestamp();
        let qty_str = format!("{:.8}", amount);

        let query_string = match price {
            Some(price) => format!(
                "symbol={}&side={}&type=LIMIT&timeInForce=GTC&quantity={}&price={:.8}&timestamp={}&recvWindow=50000",
                normalized,
                side_param(side),
                qty_str,
                price,
                timestamp
            ),
            None => format!(
                "symbol={}&side={}&type=MARKET&quantity={}&timestamp={}&recvWindow=50000",
                normalized,
                side_param(side),
                qty_str,
                timestamp
            ),
        };

        info!("place_order query_string: {}", query_string);
        let signature = generate_signature(&query_string, api_secret);

        let url = format!(
            "{}/api/v3/order?{}&signature={}",
            BASE_URL, query_string, signature
        );

        let response = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", api_key)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        info!("place_order response: {}", response_text);

        if !status.is_success() {
            return Err(classify_api_error(status, &response_text));
        }

        let order: BinanceOrderResponse = serde_json::from_str(&response_text)
            .map_err(|e| ExchangeError::Other(format!("Failed to parse order response: {}", e)))?;

        Ok(OrderAck {
            id: order.order_id.map(|id| id.to_string()),
            symbol: normalized,
            side,
            amount,
            price,
            status: order.status.as_deref().map(parse_order_status),
        })
    }
}

#[async_trait]
impl SpotExchange for BinanceClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Binance
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
        let normalized = Self::normalize_symbol(symbol);

        let timestamp = get_timestamp();
        let query_string = format!(
            "symbol={}&orderId={}&timestamp={}&recvWindow=50000",
            normalized, order_id, timestamp
        );
        let signature = generate_signature(&query_string, api_secret);

        let url = format!(
            "{}/api/v3/order?{}&signature={}",
            BASE_URL, query_string, signature
        );

        let response = self
            .http
            .delete(&url)
            .header("X-MBX-APIKEY", api_key)
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
        let normalized = Self::normalize_symbol(symbol);

        let timestamp = get_timestamp();
        let query_string = format!(
            "symbol={}&orderId={}&timestamp={}&recvWindow=50000",
            normalized, order_id, timestamp
        );
        let signature = generate_signature(&query_string, api_secret);

        let url = format!(
            "{}/api/v3/order?{}&signature={}",
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

        let order: BinanceOrderResponse = serde_json::from_str(&response_text)
            .map_err(|e| ExchangeError::Other(format!("Failed to parse order status: {}", e)))?;

        Ok(order
            .status
            .as_deref()
            .map(parse_order_status)
            .unwrap_or(OrderStatus::Open))
    }
}
