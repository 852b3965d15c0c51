use chrono::{DateTime, Utc};
use serde::Deserialize;

use interface::{
    Candle, ExchangeError, ExchangeId, OrderBook, OrderBookEntry, OrderSide, Ticker, TradeTick,
};

use super::{classify_api_error, BinanceClient, BASE_URL};

#[derive(Debug, Deserialize)]
struct BinancePriceTicker {
    symbol: String,
    price: String,
}

#[derive(Debug, Deserialize)]
struct BinanceOrderBookResponse {
    bids: Vec<[String; 2]>, // [price, quantity]
    asks: Vec<[String; 2]>, // [price, quantity]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTrade {
    price: String,
    qty: String,
    time: i64,
    is_buyer_maker: bool,
}

impl BinanceClient {
    pub(crate) async fn get_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        let normalized = Self::normalize_symbol(symbol);
        let url = format!("{}/api/v3/ticker/price?symbol={}", BASE_URL, normalized);

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(classify_api_error(status, &response_text));
        }

        let ticker: BinancePriceTicker = serde_json::from_str(&response_text)
            .map_err(|e| ExchangeError::Other(format!("Failed to parse ticker: {}", e)))?;

        let last_price: f64 = ticker
            .price
            .parse()
            .map_err(|e| ExchangeError::Other(format!("Failed to parse ticker price: {}", e)))?;

        Ok(Ticker {
            symbol: ticker.symbol,
            last_price,
            updated_at: Utc::now(),
        })
    }

    pub(crate) async fn get_orderbook(
        &self,
        symbol: &str,
        depth: u32,
    ) -> Result<OrderBook, ExchangeError> {
        let normalized = Self::normalize_symbol(symbol);
        let url = format!(
            "{}/api/v3/depth?symbol={}&limit={}",
            BASE_URL, normalized, depth
        );

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(classify_api_error(status, &response_text));
        }

        let book: BinanceOrderBookResponse = serde_json::from_str(&response_text)
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

        // Binance는 이미 정렬된 상태로 주지만 확실하게 정렬
        bids.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap()); // 높은 가격 순
        asks.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap()); // 낮은 가격 순

        Ok(OrderBook {
            exchange: ExchangeId::Binance,
            symbol: normalized,
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
        let normalized = Self::normalize_symbol(symbol);
        let url = format!(
            "{}/api/v3/trades?symbol={}&limit={}",
            BASE_URL, normalized, limit
        );

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(classify_api_error(status, &response_text));
        }

        let trades: Vec<BinanceTrade> = serde_json::from_str(&response_text)
            .map_err(|e| ExchangeError::Other(format!("Failed to parse trades: {}", e)))?;

        let mut out = Vec::with_capacity(trades.len());
        for trade in trades {
            let price: f64 = match trade.price.parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            let quantity: f64 = trade.qty.parse().unwrap_or(0.0);

            // isBuyerMaker=true면 매도 주문이 테이커
            let side = if trade.is_buyer_maker {
                Some(OrderSide::Sell)
            } else {
                Some(OrderSide::Buy)
            };

            out.push(TradeTick {
                price,
                quantity,
                side,
                timestamp: DateTime::<Utc>::from_timestamp_millis(trade.time)
                    .unwrap_or_else(Utc::now),
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
        let normalized = Self::normalize_symbol(symbol);
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            BASE_URL, normalized, interval, limit
        );

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(classify_api_error(status, &response_text));
        }

        // kline 응답: [openTime, open, high, low, close, volume, closeTime, ...]
        let rows: Vec<Vec<serde_json::Value>> = serde_json::from_str(&response_text)
            .map_err(|e| ExchangeError::Other(format!("Failed to parse klines: {}", e)))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() < 6 {
                continue;
            }

            let open_time = row[0].as_i64().unwrap_or(0);
            let parse_field = |v: &serde_json::Value| -> Option<f64> {
                v.as_str().and_then(|s| s.parse::<f64>().ok())
            };

            let (open, high, low, close, volume) = match (
                parse_field(&row[1]),
                parse_field(&row[2]),
                parse_field(&row[3]),
                parse_field(&row[4]),
                parse_field(&row[5]),
            ) {
                (Some(o), Some(h), Some(l), Some(c), Some(v)) => (o, h, l, c, v),
                _ => continue,
            };

            out.push(Candle {
                open_time: DateTime::<Utc>::from_timestamp_millis(open_time)
                    .unwrap_or_else(Utc::now),
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
