use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use exchanges::SpotExchange;
use interface::{Candle, OrderBook, Ticker, TradeTick};

const ORDERBOOK_DEPTH: u32 = 50;
const TRADES_LIMIT: u32 = 100;
const CANDLE_INTERVAL: &str = "5m";
const CANDLE_LIMIT: u32 = 20;

/// 한 사이클의 의사결정에 필요한 시장 데이터 묶음
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub ticker: Ticker,
    pub orderbook: OrderBook,
    pub trades: Vec<TradeTick>,
    pub candles: Vec<Candle>,
    pub fetched_at: DateTime<Utc>,
}

impl MarketSnapshot {
    pub fn last_price(&self) -> f64 {
        self.ticker.last_price
    }
}

/// 거래소에서 시장 데이터를 모아오는 제공자.
/// 네 종류 데이터 중 하나라도 실패하면 스냅샷 전체를 포기하고 None을 돌려준다.
pub struct MarketDataProvider {
    client: Arc<dyn SpotExchange>,
    symbol: String,
}

impl MarketDataProvider {
    pub fn new(client: Arc<dyn SpotExchange>, symbol: String) -> Self {
        Self { client, symbol }
    }

    pub async fn snapshot(&self) -> Option<MarketSnapshot> {
        let ticker = match self.client.fetch_ticker(&self.symbol).await {
            Ok(t) => t,
            Err(e) => {
                warn!("Error fetching ticker: {}", e);
                return None;
            }
        };

        let orderbook = match self.client.fetch_orderbook(&self.symbol, ORDERBOOK_DEPTH).await {
            Ok(book) => book,
            Err(e) => {
                warn!("Error fetching orderbook: {}", e);
                return None;
            }
        };

        let trades = match self.client.fetch_trades(&self.symbol, TRADES_LIMIT).await {
            Ok(trades) => trades,
            Err(e) => {
                warn!("Error fetching trades: {}", e);
                return None;
            }
        };

        let candles = match self
            .client
            .fetch_candles(&self.symbol, CANDLE_INTERVAL, CANDLE_LIMIT)
            .await
        {
            Ok(candles) => candles,
            Err(e) => {
                warn!("Error fetching candles: {}", e);
                return None;
            }
        };

        Some(MarketSnapshot {
            ticker,
            orderbook,
            trades,
            candles,
            fetched_at: Utc::now(),
        })
    }
}

/// 호가 스프레드 비율. 양쪽 호가가 모두 있고 bid > 0일 때만 의미가 있고,
/// 아니면 0으로 퇴화한다.
pub fn spread(orderbook: &OrderBook) -> f64 {
    match (orderbook.best_bid(), orderbook.best_ask()) {
        (Some(bid), Some(ask)) if bid.price > 0.0 => (ask.price - bid.price) / bid.price,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Liquidity {
    pub bid_volume: f64,
    pub ask_volume: f64,
}

/// 최우선 호가의 잔량. 비어 있는 쪽은 0.
pub fn top_liquidity(orderbook: &OrderBook) -> Liquidity {
    Liquidity {
        bid_volume: orderbook.best_bid().map(|e| e.quantity).unwrap_or(0.0),
        ask_volume: orderbook.best_ask().map(|e| e.quantity).unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interface::{ExchangeId, OrderBookEntry};

    fn book(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> OrderBook {
        OrderBook {
            exchange: ExchangeId::Gate,
            symbol: "ETH_USDT".to_string(),
            bids: bids
                .iter()
                .map(|&(price, quantity)| OrderBookEntry { price, quantity })
                .collect(),
            asks: asks
                .iter()
                .map(|&(price, quantity)| OrderBookEntry { price, quantity })
                .collect(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_spread_basic() {
        let book = book(&[(100.0, 1.0)], &[(101.0, 2.0)]);
        assert!((spread(&book) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_spread_empty_side_is_zero() {
        assert_eq!(spread(&book(&[], &[(101.0, 2.0)])), 0.0);
        assert_eq!(spread(&book(&[(100.0, 1.0)], &[])), 0.0);
        assert_eq!(spread(&book(&[], &[])), 0.0);
    }

    #[test]
    fn test_spread_zero_bid_is_zero() {
        assert_eq!(spread(&book(&[(0.0, 1.0)], &[(101.0, 2.0)])), 0.0);
    }

    #[test]
    fn test_top_liquidity() {
        let book = book(&[(100.0, 3.0), (99.0, 10.0)], &[(101.0, 2.0)]);
        let liquidity = top_liquidity(&book);
        assert_eq!(liquidity.bid_volume, 3.0);
        assert_eq!(liquidity.ask_volume, 2.0);
    }

    #[test]
    fn test_top_liquidity_empty_side() {
        let liquidity = top_liquidity(&book(&[], &[(101.0, 2.0)]));
        assert_eq!(liquidity.bid_volume, 0.0);
        assert_eq!(liquidity.ask_volume, 2.0);
    }
}
