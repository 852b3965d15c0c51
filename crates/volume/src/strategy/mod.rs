pub mod price_walk;
pub mod timing;

pub use price_walk::PriceWalk;
pub use timing::OrderTiming;

use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use tracing::info;

use exchanges::SpotExchange;
use interface::{ExchangeError, OrderSide};

use crate::config::{LIQUIDITY_USAGE_RATIO, VolumeSettings};
use crate::market::{self, MarketSnapshot};
use crate::orders::{OrderRecord, OrderTracker};
use crate::rng::{Sampler, ThreadSampler};

/// 한 사이클의 거래 판단 결과
#[derive(Debug, Clone, Serialize)]
pub struct TradeDecision {
    pub should_place: bool,
    pub confidence: f64,
    pub side: Option<OrderSide>,
    pub size: f64,
    pub current_price: f64,
    pub target_price: f64,
    pub spread: f64,
    pub order_value_usdt: f64,
    pub spread_ok: bool,
    pub behind_target: bool,
    pub waiting_for_timing: bool,
    pub error: Option<String>,
}

impl TradeDecision {
    fn skipped() -> Self {
        Self {
            should_place: false,
            confidence: 0.0,
            side: None,
            size: 0.0,
            current_price: 0.0,
            target_price: 0.0,
            spread: 0.0,
            order_value_usdt: 0.0,
            spread_ok: false,
            behind_target: false,
            waiting_for_timing: false,
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::skipped()
        }
    }

    fn waiting() -> Self {
        Self {
            waiting_for_timing: true,
            ..Self::skipped()
        }
    }
}

/// 볼륨 생성 전략 (의사결정 엔진).
///
/// 타이밍 스케줄러 → 기존 주문 취소(옵션) → 가격 워크/사이징/스프레드
/// 순으로 판단을 조립하고, 주문을 내기로 한 경우에만 내부 상태
/// (마지막 주문 시각, 누적 볼륨, 주문 수)를 갱신한다.
pub struct VolumeStrategy {
    settings: VolumeSettings,
    price_walk: PriceWalk,
    timing: OrderTiming,
    tracker: OrderTracker,
    sampler: Box<dyn Sampler>,

    last_order_time: Option<DateTime<Utc>>,
    volume_generated_usdt: f64,
    order_count: u64,
}

impl VolumeStrategy {
    pub fn new(client: Arc<dyn SpotExchange>, settings: VolumeSettings) -> Self {
        Self::with_sampler(client, settings, Box::new(ThreadSampler))
    }

    pub fn with_sampler(
        client: Arc<dyn SpotExchange>,
        settings: VolumeSettings,
        sampler: Box<dyn Sampler>,
    ) -> Self {
        let price_walk = PriceWalk::new(settings.walk_direction, settings.max_price_deviation);
        let timing = OrderTiming::from_settings(&settings);
        let tracker = OrderTracker::new(client, settings.trading_pair.clone());

        info!(
            "Volume strategy initialized: ${:.2} USDT/hour, direction={}",
            settings.target_volume_usdt_per_hour, settings.walk_direction
        );
        info!(
            "Order cancellation: {}",
            if settings.cancel_previous_orders {
                "enabled"
            } else {
                "disabled"
            }
        );

        Self {
            settings,
            price_walk,
            timing,
            tracker,
            sampler,
            last_order_time: None,
            volume_generated_usdt: 0.0,
            order_count: 0,
        }
    }

    pub fn settings(&self) -> &VolumeSettings {
        &self.settings
    }

    pub fn volume_generated_usdt(&self) -> f64 {
        self.volume_generated_usdt
    }

    pub fn order_count(&self) -> u64 {
        self.order_count
    }

    pub fn last_order_time(&self) -> Option<DateTime<Utc>> {
        self.last_order_time
    }

    #[cfg(test)]
    pub(crate) fn set_last_order_time(&mut self, t: Option<DateTime<Utc>>) {
        self.last_order_time = t;
    }

    /// 주문 크기 계산.
    /// 잔고 비율 → 크기 랜덤화 → 유동성 상한 → 최소 명목가 하한 순서.
    /// 하한이 마지막이므로 유동성이 얕아도 최소 명목가는 보장된다.
    fn order_size(
        &mut self,
        available_balance: f64,
        snapshot: &MarketSnapshot,
        current_price: f64,
    ) -> f64 {
        let ratio = self
            .sampler
            .uniform(self.settings.min_order_ratio, self.settings.max_order_ratio);
        let base_size = available_balance * ratio;

        let factor = 1.0
            + self.sampler.uniform(
                -self.settings.size_randomization,
                self.settings.size_randomization,
            );
        let mut size = base_size * factor;

        let liquidity = market::top_liquidity(&snapshot.orderbook);
        let max_liquidity_size =
            liquidity.bid_volume.min(liquidity.ask_volume) * LIQUIDITY_USAGE_RATIO;
        if max_liquidity_size > 0.0 {
            size = size.min(max_liquidity_size);
        }

        if current_price > 0.0 {
            size = size.max(self.settings.min_order_value_usdt / current_price);
        } else {
            size = size.max(1.0);
        }

        size
    }

    /// 거래 판단.
    /// 어떤 실패도 이 경계를 넘어 전파되지 않는다. 사용할 수 없는 입력이나
    /// 비정상 계산 결과는 error 필드가 채워진 스킵 판단으로 끝난다.
    pub async fn decide(
        &mut self,
        snapshot: Option<&MarketSnapshot>,
        available_balance: f64,
    ) -> TradeDecision {
        let snapshot = match snapshot {
            Some(snapshot) => snapshot,
            None => return TradeDecision::error("No market data"),
        };

        let elapsed_secs = self
            .last_order_time
            .map(|t| (Utc::now() - t).num_milliseconds() as f64 / 1000.0);

        if !self.timing.is_due(self.sampler.as_mut(), elapsed_secs) {
            return TradeDecision::waiting();
        }

        // 새 주문 전에 기존 오픈 주문 정리 (best effort)
        if self.settings.cancel_previous_orders {
            self.tracker.cancel_all().await;
        }

        let current_price = snapshot.last_price();
        if !current_price.is_finite() || current_price <= 0.0 {
            return TradeDecision::error("Invalid current price");
        }

        let target_price = self
            .price_walk
            .next_target(self.sampler.as_mut(), current_price);
        let side = self
            .price_walk
            .next_side(self.sampler.as_mut(), current_price, target_price);
        let size = self.order_size(available_balance, snapshot, current_price);

        if !size.is_finite() || size <= 0.0 {
            return TradeDecision::error(format!("Invalid order size: {}", size));
        }

        let spread = market::spread(&snapshot.orderbook);
        let spread_ok = spread <= self.settings.max_spread_threshold;
        let mut confidence = if spread_ok { 0.7 } else { 0.3 };

        // 당일 시간당 볼륨이 목표의 80% 미만이면 따라잡기 편향
        let hours_elapsed = (Utc::now().hour() + 1) as f64;
        let volume_rate_usdt = self.volume_generated_usdt / hours_elapsed.max(1.0);
        let behind_target =
            volume_rate_usdt < self.settings.target_volume_usdt_per_hour * 0.8;
        if behind_target {
            confidence += 0.2;
        }

        let should_place = spread_ok && confidence > 0.5;

        if should_place {
            self.last_order_time = Some(Utc::now());
            self.order_count += 1;
            self.volume_generated_usdt += size * current_price;
        }

        TradeDecision {
            should_place,
            confidence,
            side: Some(side),
            size,
            current_price,
            target_price,
            spread,
            order_value_usdt: size * current_price,
            spread_ok,
            behind_target,
            waiting_for_timing: false,
            error: None,
        }
    }

    /// 주문 제출. dry-run 여부는 설정을 따른다.
    pub async fn place_order(
        &mut self,
        side: OrderSide,
        amount: f64,
        price: Option<f64>,
    ) -> Result<OrderRecord, ExchangeError> {
        self.tracker
            .place(side, amount, price, self.settings.dry_run)
            .await
    }

    pub async fn cancel_all_open(&mut self) -> usize {
        self.tracker.cancel_all().await
    }

    pub async fn reconcile_open(&mut self) -> usize {
        self.tracker.reconcile().await
    }

    pub fn open_order_count(&self) -> usize {
        self.tracker.open_count()
    }
}
