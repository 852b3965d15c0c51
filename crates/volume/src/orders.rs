use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use exchanges::SpotExchange;
use interface::{ExchangeError, OrderSide, OrderStatus};

/// 추적 중인 주문 한 건의 기록
#[derive(Debug, Clone, Serialize)]
pub struct OrderRecord {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub amount: f64,
    pub price: Option<f64>,
    pub value_usdt: f64,
    pub status: OrderStatus,
    pub dry_run: bool,
}

/// 오픈 주문 라이프사이클 트래커.
///
/// 원칙: 실제로 살아 있을 수 있는 주문은 절대 잊지 않는다 (노출 누수 방지).
/// 반대로 거래소가 "없다"고 확인해준 주문은 적극적으로 잊는다
/// (추적 집합의 무한 성장과 반복 실패 조회 방지).
pub struct OrderTracker {
    client: Arc<dyn SpotExchange>,
    symbol: String,
    pub(crate) open_ids: Vec<String>,
}

impl OrderTracker {
    pub fn new(client: Arc<dyn SpotExchange>, symbol: String) -> Self {
        Self {
            client,
            symbol,
            open_ids: Vec::new(),
        }
    }

    /// 주문 제출.
    ///
    /// dry_run 모드에서는 네트워크 호출 없이 로컬 id로 체결된 것처럼
    /// 기록만 만들어 돌려준다. 라이브 모드에서는 price 유무에 따라
    /// 지정가/시장가로 제출하고, id가 돌아오면 추적을 시작한다.
    /// 실패는 Err로 돌려주고 호출자가 로그 후 다음 사이클로 넘어간다.
    pub async fn place(
        &mut self,
        side: OrderSide,
        amount: f64,
        price: Option<f64>,
        dry_run: bool,
    ) -> Result<OrderRecord, ExchangeError> {
        let value_usdt = price.map(|p| amount * p).unwrap_or(0.0);

        if dry_run {
            let record = OrderRecord {
                id: format!("dry-run-{}", Uuid::new_v4()),
                symbol: self.symbol.clone(),
                side,
                amount,
                price,
                value_usdt,
                status: OrderStatus::Filled,
                dry_run: true,
            };
            info!(
                "[DRY RUN] {} {:.4} at {:?} (${:.2} USDT)",
                side, amount, price, value_usdt
            );
            return Ok(record);
        }

        let ack = match price {
            Some(price) => {
                self.client
                    .create_limit_order(&self.symbol, side, amount, price)
                    .await?
            }
            None => {
                self.client
                    .create_market_order(&self.symbol, side, amount)
                    .await?
            }
        };

        let status = ack.status.unwrap_or(OrderStatus::Open);

        let id = match ack.id {
            Some(id) => {
                // 체결 완료로 접수된 주문은 추적할 필요가 없다
                if !status.is_terminal() {
                    self.open_ids.push(id.clone());
                    info!("Tracking order {}", id);
                }
                id
            }
            None => String::new(),
        };

        info!(
            "Order executed: {} {:.4} at {:?} (${:.2} USDT)",
            side, amount, price, value_usdt
        );

        Ok(OrderRecord {
            id,
            symbol: self.symbol.clone(),
            side,
            amount,
            price,
            value_usdt,
            status,
            dry_run: false,
        })
    }

    /// 추적 중인 모든 주문 취소.
    ///
    /// "not found" / "already completed" 류의 실패는 주문이 이미 사라진
    /// 것이므로 추적에서 제거하되 취소 성공으로 세지는 않는다.
    /// 그 외의 실패는 추적을 유지하고 다음 사이클에 재시도한다.
    /// 반환값은 실제로 취소된 주문 수.
    pub async fn cancel_all(&mut self) -> usize {
        if self.open_ids.is_empty() {
            return 0;
        }

        info!("Cancelling {} open orders...", self.open_ids.len());

        let mut cancelled_count = 0;
        let mut remaining = Vec::new();

        for order_id in std::mem::take(&mut self.open_ids) {
            match self.client.cancel_order(&order_id, &self.symbol).await {
                Ok(()) => {
                    info!("Cancelled order {}", order_id);
                    cancelled_count += 1;
                }
                Err(e) if e.is_order_gone() => {
                    info!("Order {} already completed", order_id);
                }
                Err(e) => {
                    warn!("Failed to cancel order {}: {}", order_id, e);
                    remaining.push(order_id);
                }
            }
        }

        self.open_ids = remaining;

        if cancelled_count > 0 {
            info!(
                "Cancelled {} orders, {} remaining",
                cancelled_count,
                self.open_ids.len()
            );
        }

        cancelled_count
    }

    /// 완료된 주문 정리.
    ///
    /// 추적 중인 주문의 상태를 조회해서 종결 상태(체결/취소)거나
    /// "not found"면 추적에서 제거한다. 일시적 조회 실패는 유지하고
    /// 다음 정리 패스에 재시도한다. 반환값은 제거한 주문 수.
    pub async fn reconcile(&mut self) -> usize {
        if self.open_ids.is_empty() {
            return 0;
        }

        let mut completed_count = 0;
        let mut remaining = Vec::new();

        for order_id in std::mem::take(&mut self.open_ids) {
            match self.client.fetch_order_status(&order_id, &self.symbol).await {
                Ok(status) if status.is_terminal() => {
                    info!("Order {} completed with status {:?}", order_id, status);
                    completed_count += 1;
                }
                Ok(_) => {
                    remaining.push(order_id);
                }
                Err(e) if e.is_order_gone() => {
                    info!("Order {} not found (likely completed)", order_id);
                    completed_count += 1;
                }
                Err(e) => {
                    warn!("Failed to query order {}: {}", order_id, e);
                    remaining.push(order_id);
                }
            }
        }

        self.open_ids = remaining;

        if completed_count > 0 {
            info!("Cleaned up {} completed orders", completed_count);
        }

        completed_count
    }

    pub fn open_count(&self) -> usize {
        self.open_ids.len()
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use exchanges::SpotExchange;
    use interface::{
        Candle, ExchangeError, ExchangeId, OrderAck, OrderBook, OrderSide, OrderStatus, Ticker,
        TradeTick,
    };

    /// 주문별로 스크립트된 취소/조회 결과
    #[derive(Debug, Clone, Copy)]
    pub enum MockOutcome {
        Ok,
        Status(OrderStatus),
        NotFound,
        Transient,
    }

    /// 테스트용 거래소 목. 호출 횟수를 세고, 주문 id별로 미리 정한
    /// 결과를 돌려준다.
    pub struct MockExchange {
        pub network_calls: AtomicUsize,
        pub next_order_id: Mutex<Option<String>>,
        pub place_fails: bool,
        pub cancel_outcomes: Mutex<HashMap<String, MockOutcome>>,
        pub status_outcomes: Mutex<HashMap<String, MockOutcome>>,
    }

    impl MockExchange {
        pub fn new() -> Self {
            Self {
                network_calls: AtomicUsize::new(0),
                next_order_id: Mutex::new(Some("order-1".to_string())),
                place_fails: false,
                cancel_outcomes: Mutex::new(HashMap::new()),
                status_outcomes: Mutex::new(HashMap::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.network_calls.load(Ordering::SeqCst)
        }

        fn bump(&self) {
            self.network_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl SpotExchange for MockExchange {
        fn id(&self) -> ExchangeId {
            ExchangeId::Gate
        }

        async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
            self.bump();
            Ok(Ticker {
                symbol: symbol.to_string(),
                last_price: 100.0,
                updated_at: Utc::now(),
            })
        }

        async fn fetch_orderbook(
            &self,
            symbol: &str,
            _depth: u32,
        ) -> Result<OrderBook, ExchangeError> {
            self.bump();
            Ok(OrderBook {
                exchange: ExchangeId::Gate,
                symbol: symbol.to_string(),
                bids: vec![interface::OrderBookEntry {
                    price: 100.0,
                    quantity: 5.0,
                }],
                asks: vec![interface::OrderBookEntry {
                    price: 101.0,
                    quantity: 5.0,
                }],
                updated_at: Utc::now(),
            })
        }

        async fn fetch_trades(
            &self,
            _symbol: &str,
            _limit: u32,
        ) -> Result<Vec<TradeTick>, ExchangeError> {
            self.bump();
            Ok(Vec::new())
        }

        async fn fetch_candles(
            &self,
            _symbol: &str,
            _interval: &str,
            _limit: u32,
        ) -> Result<Vec<Candle>, ExchangeError> {
            self.bump();
            Ok(Vec::new())
        }

        async fn fetch_balance(&self, _currency: &str) -> Result<f64, ExchangeError> {
            self.bump();
            Ok(1000.0)
        }

        async fn create_limit_order(
            &self,
            symbol: &str,
            side: OrderSide,
            amount: f64,
            price: f64,
        ) -> Result<OrderAck, ExchangeError> {
            self.bump();
            if self.place_fails {
                return Err(ExchangeError::Other("insufficient balance".to_string()));
            }
            Ok(OrderAck {
                id: self.next_order_id.lock().unwrap().clone(),
                symbol: symbol.to_string(),
                side,
                amount,
                price: Some(price),
                status: Some(OrderStatus::Open),
            })
        }

        async fn create_market_order(
            &self,
            symbol: &str,
            side: OrderSide,
            amount: f64,
        ) -> Result<OrderAck, ExchangeError> {
            self.bump();
            if self.place_fails {
                return Err(ExchangeError::Other("insufficient balance".to_string()));
            }
            Ok(OrderAck {
                id: self.next_order_id.lock().unwrap().clone(),
                symbol: symbol.to_string(),
                side,
                amount,
                price: None,
                status: Some(OrderStatus::Filled),
            })
        }

        async fn cancel_order(&self, order_id: &str, _symbol: &str) -> Result<(), ExchangeError> {
            self.bump();
            let outcomes = self.cancel_outcomes.lock().unwrap();
            match outcomes.get(order_id).copied().unwrap_or(MockOutcome::Ok) {
                MockOutcome::Ok | MockOutcome::Status(_) => Ok(()),
                MockOutcome::NotFound => {
                    Err(ExchangeError::OrderNotFound(order_id.to_string()))
                }
                MockOutcome::Transient => {
                    Err(ExchangeError::Other("rate limit exceeded".to_string()))
                }
            }
        }

        async fn fetch_order_status(
            &self,
            order_id: &str,
            _symbol: &str,
        ) -> Result<OrderStatus, ExchangeError> {
            self.bump();
            let outcomes = self.status_outcomes.lock().unwrap();
            match outcomes
                .get(order_id)
                .copied()
                .unwrap_or(MockOutcome::Status(OrderStatus::Open))
            {
                MockOutcome::Status(status) => Ok(status),
                MockOutcome::Ok => Ok(OrderStatus::Open),
                MockOutcome::NotFound => {
                    Err(ExchangeError::OrderNotFound(order_id.to_string()))
                }
                MockOutcome::Transient => {
                    Err(ExchangeError::Other("rate limit exceeded".to_string()))
                }
            }
        }
    }
}
