use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 거래소 공통 에러 타입.
///
/// `OrderNotFound`는 "주문이 이미 체결/취소되어 거래소에 없음"을 뜻하는
/// 별도 분류다. 취소나 상태 조회에서 이 에러가 나오면 호출자는 주문이
/// 이미 끝난 것으로 처리한다 (재시도 대상이 아님).
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

impl ExchangeError {
    /// 주문이 거래소에 존재하지 않는다는 의미의 에러인지 판별.
    /// 타입이 분류되지 않은 경우 메시지 내용으로 폴백한다.
    pub fn is_order_gone(&self) -> bool {
        match self {
            ExchangeError::OrderNotFound(_) => true,
            ExchangeError::Other(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("not found") || msg.contains("already")
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeId {
    Binance,
    Gate,
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExchangeId::Binance => "binance",
            ExchangeId::Gate => "gate",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 주문 상태. 거래소별 상태 문자열은 각 클라이언트에서 이 enum으로 정규화한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    Filled,
    Canceled,
    NotFound,
}

impl OrderStatus {
    /// 더 이상 추적할 필요가 없는 상태인지
    pub fn is_terminal(self) -> bool {
        !matches!(self, OrderStatus::Open)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub last_price: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderBookEntry {
    pub price: f64,
    pub quantity: f64,
}

/// 오더북 스냅샷. bids는 높은 가격 순, asks는 낮은 가격 순으로 정렬되어 있다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    pub exchange: ExchangeId,
    pub symbol: String,
    pub bids: Vec<OrderBookEntry>,
    pub asks: Vec<OrderBookEntry>,
    pub updated_at: DateTime<Utc>,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<&OrderBookEntry> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&OrderBookEntry> {
        self.asks.first()
    }
}

/// 개별 체결 내역
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeTick {
    pub price: f64,
    pub quantity: f64,
    pub side: Option<OrderSide>,
    pub timestamp: DateTime<Utc>,
}

/// OHLCV 캔들
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetBalance {
    pub currency: String,
    pub total: f64,
    pub available: f64,
    pub in_use: f64,
    pub updated_at: DateTime<Utc>,
}

/// 주문 접수 응답. id는 거래소가 부여하며, 없을 수도 있다 (일부 테스트 엔드포인트).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    pub id: Option<String>,
    pub symbol: String,
    pub side: OrderSide,
    pub amount: f64,
    pub price: Option<f64>,
    pub status: Option<OrderStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_side_opposite() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
    }

    #[test]
    fn test_order_status_terminal() {
        assert!(!OrderStatus::Open.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(OrderStatus::NotFound.is_terminal());
    }

    #[test]
    fn test_is_order_gone_classification() {
        assert!(ExchangeError::OrderNotFound("42".to_string()).is_order_gone());
        assert!(ExchangeError::Other("Order not found".to_string()).is_order_gone());
        assert!(ExchangeError::Other("order already completed".to_string()).is_order_gone());
        assert!(!ExchangeError::Other("rate limit exceeded".to_string()).is_order_gone());
        assert!(!ExchangeError::Auth("bad key".to_string()).is_order_gone());
    }
}
