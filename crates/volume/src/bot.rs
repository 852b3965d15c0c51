use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::sleep;
use tracing::{error, info, warn};

use exchanges::{BinanceClient, GateClient, SpotExchange};
use interface::{ExchangeError, ExchangeId};

use crate::config::{
    BALANCE_WARNING_WAIT, ERROR_RETRY_WAIT, MARKET_DATA_RETRY_WAIT, MAX_BALANCE_USAGE_RATIO,
    NO_BALANCE_WAIT, ORDER_CLEANUP_INTERVAL, ORDER_PLACEMENT_CHECK_INTERVAL, VolumeSettings,
};
use crate::market::MarketDataProvider;
use crate::strategy::VolumeStrategy;

/// 실행 통계
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub total_orders: u64,
    pub total_volume_usdt: f64,
    pub start_time: Option<DateTime<Utc>>,
    pub last_order: Option<DateTime<Utc>>,
}

impl RunStats {
    pub fn log_summary(&self, dry_run: bool) {
        let start = match self.start_time {
            Some(start) => start,
            None => return,
        };

        let runtime = Utc::now() - start;
        let runtime_hours = runtime.num_seconds() as f64 / 3600.0;

        info!("===== VOLUME GENERATION STATISTICS =====");
        info!("Runtime: {}s", runtime.num_seconds());
        info!("Total Orders: {}", self.total_orders);
        info!("Total Volume: ${:.2} USDT", self.total_volume_usdt);
        if runtime_hours > 0.0 {
            info!(
                "Volume/Hour: ${:.2} USDT/h",
                self.total_volume_usdt / runtime_hours
            );
        }
        info!("Last Order: {:?}", self.last_order);
        info!("Dry Run Mode: {}", dry_run);
    }
}

/// 설정된 거래소에 맞는 클라이언트 생성.
/// 라이브 모드에서는 인증 정보가 필수. dry-run에서는 인증 정보가 없으면
/// 공개 엔드포인트 전용 클라이언트로 폴백한다.
pub fn build_client(settings: &VolumeSettings) -> Result<Arc<dyn SpotExchange>, ExchangeError> {
    match settings.exchange {
        ExchangeId::Binance => match BinanceClient::with_credentials() {
            Ok(client) => Ok(Arc::new(client)),
            Err(e) if settings.dry_run => {
                warn!("{}. Using public client (dry run)", e);
                Ok(Arc::new(BinanceClient::new()))
            }
            Err(e) => Err(e),
        },
        ExchangeId::Gate => match GateClient::with_credentials() {
            Ok(client) => Ok(Arc::new(client)),
            Err(e) if settings.dry_run => {
                warn!("{}. Using public client (dry run)", e);
                Ok(Arc::new(GateClient::new()))
            }
            Err(e) => Err(e),
        },
    }
}

/// 볼륨 생성 봇 실행 루프.
///
/// 거래쌍 하나당 논리적 실행 흐름은 하나다. 한 사이클 안에서는
/// 취소 → 판단 → 제출 순서가 보장되고, 정리 패스는 사이클 사이에만
/// 끼어든다. 종료 경로에서는 추적 중인 주문의 최종 취소가 보장된다.
pub struct VolumeBot {
    settings: VolumeSettings,
    client: Arc<dyn SpotExchange>,
    provider: MarketDataProvider,
    strategy: VolumeStrategy,
    stats: RunStats,
    last_cleanup: DateTime<Utc>,
}

impl VolumeBot {
    pub fn new(settings: VolumeSettings) -> Result<Self, ExchangeError> {
        let client = build_client(&settings)?;
        Ok(Self::from_client(client, settings))
    }

    pub fn from_client(client: Arc<dyn SpotExchange>, settings: VolumeSettings) -> Self {
        let provider = MarketDataProvider::new(client.clone(), settings.trading_pair.clone());
        let strategy = VolumeStrategy::new(client.clone(), settings.clone());

        Self {
            settings,
            client,
            provider,
            strategy,
            stats: RunStats::default(),
            last_cleanup: Utc::now(),
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn strategy(&self) -> &VolumeStrategy {
        &self.strategy
    }

    async fn fetch_balance(&self) -> f64 {
        match self.client.fetch_balance(&self.settings.base_asset).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!("Error fetching balance: {}", e);
                0.0
            }
        }
    }

    /// 루프 한 사이클. 모든 실패는 여기서 삼켜지고 대기 후 다음 사이클로
    /// 넘어간다 — 루프를 죽일 수 있는 에러는 없다.
    async fn cycle(&mut self) {
        let snapshot = match self.provider.snapshot().await {
            Some(snapshot) => snapshot,
            None => {
                sleep(MARKET_DATA_RETRY_WAIT).await;
                return;
            }
        };

        let balance = self.fetch_balance().await;
        if balance <= 0.0 {
            warn!("No balance available");
            sleep(NO_BALANCE_WAIT).await;
            return;
        }

        let decision = self.strategy.decide(Some(&snapshot), balance).await;

        if let Some(error) = &decision.error {
            warn!("Trade decision error: {}", error);
        }

        if decision.should_place {
            if let Some(side) = decision.side {
                let price = decision.current_price;

                // 잔고 한도를 먼저 적용하고, 그 안에서 최소 명목가를 보장
                let max_balance_size = balance * MAX_BALANCE_USAGE_RATIO;
                let min_viable_size = self.settings.min_order_value_usdt / price;

                if max_balance_size < min_viable_size {
                    warn!(
                        "Balance too low: max {:.4} < min required {:.4} for ${} USDT",
                        max_balance_size, min_viable_size, self.settings.min_order_value_usdt
                    );
                    sleep(BALANCE_WARNING_WAIT).await;
                    return;
                }

                let size = decision.size.max(min_viable_size).min(max_balance_size);
                let order_value_usdt = size * price;

                if order_value_usdt < self.settings.min_order_value_usdt {
                    error!(
                        "Order value {:.2} USDT still below minimum {} USDT",
                        order_value_usdt, self.settings.min_order_value_usdt
                    );
                    sleep(ERROR_RETRY_WAIT).await;
                    return;
                }

                info!(
                    "Preparing order: {} {:.4} {} at {:.8} (${:.2} USDT)",
                    side, size, self.settings.base_asset, price, order_value_usdt
                );
                info!(
                    "Current volume: ${:.2} USDT | Target rate: ${:.2} USDT/h",
                    self.stats.total_volume_usdt, self.settings.target_volume_usdt_per_hour
                );

                match self.strategy.place_order(side, size, Some(price)).await {
                    Ok(_record) => {
                        self.stats.total_orders += 1;
                        self.stats.total_volume_usdt += order_value_usdt;
                        self.stats.last_order = Some(Utc::now());
                        info!("Volume generated: ${:.2} USDT", self.stats.total_volume_usdt);
                    }
                    Err(e) => {
                        warn!("Error executing order: {}", e);
                    }
                }
            }
        }

        // 주기적으로 완료된 주문을 추적에서 정리
        let since_cleanup = Utc::now() - self.last_cleanup;
        if since_cleanup.num_seconds() as u64 >= ORDER_CLEANUP_INTERVAL.as_secs() {
            self.strategy.reconcile_open().await;
            self.last_cleanup = Utc::now();
        }

        sleep(ORDER_PLACEMENT_CHECK_INTERVAL).await;
    }

    /// 볼륨 생성 실행. duration_hours가 None이면 중단 시그널까지 무한 실행.
    /// 종료 시에는 추적 중인 주문을 모두 취소한 뒤에 반환한다.
    pub async fn run(&mut self, duration_hours: Option<f64>) -> eyre::Result<()> {
        match duration_hours {
            Some(hours) => info!("Starting volume generation for {} hours", hours),
            None => info!("Starting infinite volume generation (Ctrl+C to stop)"),
        }

        self.stats.start_time = Some(Utc::now());
        self.last_cleanup = Utc::now();

        let end_time = duration_hours
            .map(|hours| Utc::now() + chrono::Duration::seconds((hours * 3600.0) as i64));

        loop {
            if let Some(end) = end_time {
                if Utc::now() >= end {
                    info!("Configured duration reached");
                    break;
                }
            }

            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    match result {
                        Ok(()) => info!("Interrupt received, stopping bot..."),
                        Err(e) => warn!("Failed to listen for interrupt: {}", e),
                    }
                    break;
                }
                _ = self.cycle() => {}
            }
        }

        // 종료 경로의 최종 정리: 아직 추적 중인 주문은 반드시 취소 시도
        if self.strategy.open_order_count() > 0 {
            info!("Final cleanup: cancelling remaining orders...");
            let cancelled = self.strategy.cancel_all_open().await;
            if cancelled > 0 {
                info!("Cancelled {} remaining orders", cancelled);
            }
        }

        info!("Volume generation completed");
        self.stats.log_summary(self.settings.dry_run);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::mock::MockExchange;

    fn dry_run_settings() -> VolumeSettings {
        VolumeSettings {
            dry_run: true,
            cancel_previous_orders: false,
            ..VolumeSettings::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_places_dry_run_order_and_updates_stats() {
        let mock = Arc::new(MockExchange::new());
        let mut bot = VolumeBot::from_client(mock.clone(), dry_run_settings());

        bot.cycle().await;

        // 목 스냅샷: 가격 100, 스프레드 1% → 판단은 주문으로 이어진다
        assert_eq!(bot.stats().total_orders, 1);
        assert!(bot.stats().total_volume_usdt > 0.0);
        assert!(bot.stats().last_order.is_some());
        // dry-run이므로 추적 중인 주문은 없다
        assert_eq!(bot.strategy().open_order_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_respects_balance_cap() {
        let mock = Arc::new(MockExchange::new());
        let mut bot = VolumeBot::from_client(mock.clone(), dry_run_settings());

        bot.cycle().await;

        // 잔고 1000, 가격 100 → 주문 한 건의 명목가는
        // 잔고의 10%인 100 단위 * 100 USDT를 넘을 수 없다
        assert!(bot.stats().total_volume_usdt <= 1000.0 * MAX_BALANCE_USAGE_RATIO * 100.0);
        // 최소 명목가도 보장된다
        assert!(bot.stats().total_volume_usdt >= 5.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_accumulate_over_cycles() {
        let mock = Arc::new(MockExchange::new());
        let mut settings = dry_run_settings();
        // 매 사이클 due가 되도록 간격을 최소로
        settings.order_frequency_secs = 1;
        settings.timing_randomization = 0.0;
        settings.burst_probability = 0.0;
        settings.quiet_probability = 0.0;
        let mut bot = VolumeBot::from_client(mock.clone(), settings);

        bot.cycle().await;
        // 타이머는 실제 시계를 쓰므로, 직전 주문이 충분히 오래된 것처럼 되돌린다
        bot.strategy
            .set_last_order_time(Some(Utc::now() - chrono::Duration::seconds(120)));
        bot.cycle().await;

        assert_eq!(bot.stats().total_orders, 2);
    }
}
