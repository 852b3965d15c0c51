use chrono::{DateTime, Utc};
use serde::Deserialize;

use interface::{
    Candle, ExchangeError, ExchangeId, OrderBook, OrderBookEntry, OrderSide, Ticker, TradeTick,
};

use super::{classify_api_error, GateClient, BASE_URL};

#[derive(Debug, Deserialize)]
struct GateTicker {
    currency_pair: String,
    last: String,
}

#[derive(Debug, Deserialize)]
struct GateOrderBookResponse {
    bids: Vec<[String; 2]>, // [price, amount]
    asks: Vec<[String; 2]>, // [price, amount]
}

#[derive(Debug, Deserialize)]
struct GateTrade {
    price: String,
    amount: String,
    side: String,
    create_time_ms: String,
}

impl GateClient {
    pub(crate) async fn get_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        let pair = Self::normalize_symbol(symbol);
        let url = format!("{}/api/v4/spot/tickers?currency_pair={}", BASE_URL, pair);

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(classify_api_error(status, &response_text));
        }

        let tickers: Vec<GateTicker> = serde_json::from_str(&response_text)
            .map_err(|e| ExchangeError::Other(format!("Failed to parse ticker: {}", e)))?;

        let ticker = tickers
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::Other(format!("No ticker returned for {}", pair)))?;

        let last_price: f64 = ticker
            .last
            .parse()
            .map_err(|e| ExchangeError::Other(format!("Failed to parse ticker price: {}", e)))?;

        Ok(Ticker {
            symbol: ticker.currency_pair,
            last_price,
            updated_at: Utc::now(),
        })
    }

    pub(crate) async fn get_orderbook(
        &self,
        symbol: &str,
        depth: u32,
    ) -> Result<OrderBook, ExchangeError> {
        let pair = Self::normalize_symbol(symbol);
        let url = format!(
            "{}/api/v4/spot/order_book?currency_pair={}&limit={}",
            BASE_URL, pair, depth
        );

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(classify_api_error(status, &response_text));
        }

        let book: GateOrderBookResponse = serde_json::from_str(&response_text)
            .map_err(|e| ExchangeError::Other(format!("Failed to parse orderbook: {}", e)))?;

        let mut bids = Vec::with_capacity(book.bids.len());
        for bid in book.bids {
            let price: f64 = bid[0]
                .parse()
                .map_err(|e| ExchangeError::Other(format!("Failed to parse bid price: {}", e)))?;
            let quantity: f64 = bid[1].parse().map_err(|e| {
                ExchangeError::Other(format!("Failed to parse bid quantity: {}", e))
            })?;
            bids.push(OrderBookEntry { price, quantity });
        }

        let mut asks = Vec::with_capacity(book.asks.len());
        for ask in book.asks {
            let price: f64 = ask[0]
                .parse()
                .map_err(|e| ExchangeError::Other(format!("Failed to parse ask price: {}", e)))?;
            let quantity: f64 = ask[1].parse().map_err(|e| {
                ExchangeError::Other(format!("Failed to parse ask quantity: {}", e))
            })?;
            asks.push(OrderBookEntry { price, quantity });
        }

        bids.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap()); // 높은 가격 순
        asks.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap()); // 낮은 가격 순

        Ok(OrderBook {
            exchange: ExchangeId::Gate,
            symbol: pair,
            bids,
            asks,
            updated_at: Utc::now(),
        })
    }

    pub(crate) async fn get_trades(
        &self,
        symbol: &str,
        limit: u32,
    ) -> Result<Vec<TradeTick>, ExchangeError> {
        let pair = Self::normalize_symbol(symbol);
        let url = format!(
            "{}/api/v4/spot/trades?currency_pair={}&limit={}",
            BASE_URL, pair, limit
        );

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(classify_api_error(status, &response_text));
        }

        let trades: Vec<GateTrade> = serde_json::from_str(&response_text)
            .map_err(|e| ExchangeError::Other(format!("Failed to parse trades: {}", e)))?;

        let mut out = Vec::with_capacity(trades.len());
        for trade in trades {
            let price: f64 = match trade.price.parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            let quantity: f64 = trade.amount.parse().unwrap_or(0.0);

            let side = match trade.side.as_str() {
                "buy" => Some(OrderSide::Buy),
                "sell" => Some(OrderSide::Sell),
                _ => None,
            };

            let millis: i64 = trade
                .create_time_ms
                .parse::<f64>()
                .map(|ms| ms as i64)
                .unwrap_or(0);

            out.push(TradeTick {
                price,
                quantity,
                side,
                timestamp: DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_else(Utc::now),
            });
        }

        Ok(out)
    }

    pub(crate) async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let pair = Self::normalize_symbol(symbol);
        let url = format!(
            "{}/api/v4/spot/candlesticks?currency_pair={}&interval={}&limit={}",
            BASE_URL, pair, interval, limit
        );

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(classify_api_error(status, &response_text));
        }

        // candlestick 행: [timestamp, quote_volume, close, high, low, open, base_volume, ...]
        let rows: Vec<Vec<String>> = serde_json::from_str(&response_text)
            .map_err(|e| ExchangeError::Other(format!("Failed to parse candlesticks: {}", e)))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() < 7 {
                continue;
            }

            let secs: i64 = row[0].parse().unwrap_or(0);
            let (close, high, low, open, volume) = match (
                row[2].parse::<f64>(),
                row[3].parse::<f64>(),
                row[4].parse::<f64>(),
                row[5].parse::<f64>(),
                row[6].parse::<f64>(),
            ) {
                (Ok(c), Ok(h), Ok(l), Ok(o), Ok(v)) => (c, h, l, o, v),
                _ => continue,
            };

            out.push(Candle {
                open_time: DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_else(Utc::now),
                open,
                high,
                low,
                close,
                volume,
            });
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SpotExchange;

    #[tokio::test]
    async fn test_fetch_ticker_gate() {
        let client = GateClient::new();

        match client.fetch_ticker("ETH_USDT").await {
            Ok(ticker) => {
                assert_eq!(ticker.symbol, "ETH_USDT");
                assert!(ticker.last_price > 0.0);
            }
            Err(e) => {
                // 네트워크 오류일 수 있으므로 테스트 실패로 처리하지 않음
                println!("Warning: fetch_ticker failed: {}", e);
            }
        }
    }

    #[tokio::test]
    async fn test_fetch_orderbook_gate() {
        let client = GateClient::new();

        match client.fetch_orderbook("ETH_USDT", 50).await {
            Ok(orderbook) => {
                assert_eq!(orderbook.exchange, ExchangeId::Gate);
                assert!(!orderbook.bids.is_empty());
                assert!(!orderbook.asks.is_empty());
                assert!(orderbook.asks[0].price > orderbook.bids[0].price);
            }
            Err(e) => {
                println!("Warning: fetch_orderbook failed: {}", e);
            }
        }
    }
}
