use async_trait::async_trait;

use interface::{
    AssetBalance, Candle, ExchangeError, ExchangeId, OrderAck, OrderBook, OrderSide, OrderStatus,
    Ticker, TradeTick,
};

pub mod binance;
pub mod gate;

/// 단일 스팟 거래소에 대한 공통 인터페이스.
/// 시세 조회부터 주문 제출/취소/상태 조회까지 볼륨 봇이 필요로 하는
/// 전체 기능을 하나의 capability로 묶는다.
#[async_trait]
pub trait SpotExchange: Send + Sync {
    fn id(&self) -> ExchangeId;

    /// 특정 심볼의 현재가 조회
    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError>;

    /// 특정 심볼의 오더북 조회 (depth: 양쪽 호가 개수)
    async fn fetch_orderbook(&self, symbol: &str, depth: u32) -> Result<OrderBook, ExchangeError>;

    /// 최근 체결 내역 조회
    async fn fetch_trades(&self, symbol: &str, limit: u32)
        -> Result<Vec<TradeTick>, ExchangeError>;

    /// 캔들 조회. interval은 거래소 공통 표기 (예: "5m", "1h")
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError>;

    /// 특정 통화의 사용 가능 잔고 조회
    async fn fetch_balance(&self, currency: &str) -> Result<f64, ExchangeError>;

    async fn create_limit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        amount: f64,
        price: f64,
    ) -> Result<OrderAck, ExchangeError>;

    async fn create_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        amount: f64,
    ) -> Result<OrderAck, ExchangeError>;

    /// 주문 취소. 주문이 이미 체결/취소되어 없으면 `ExchangeError::OrderNotFound`.
    async fn cancel_order(&self, order_id: &str, symbol: &str) -> Result<(), ExchangeError>;

    /// 주문 상태 조회. 주문이 없으면 `ExchangeError::OrderNotFound`.
    async fn fetch_order_status(
        &self,
        order_id: &str,
        symbol: &str,
    ) -> Result<OrderStatus, ExchangeError>;
}

/// 잔고 전체 조회가 필요한 경우를 위한 보조 인터페이스
#[async_trait]
pub trait AssetExchange: Send + Sync {
    fn id(&self) -> ExchangeId;

    async fn fetch_assets(&self) -> Result<Vec<AssetBalance>, ExchangeError>;
}

// Convenience re-exports
pub use binance::BinanceClient;
pub use gate::GateClient;
