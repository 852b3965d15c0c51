use structopt::StructOpt;
use tracing::{info, warn};

use exchanges::{AssetExchange, BinanceClient, GateClient};
use interface::{AssetBalance, ExchangeId};
use volume::bot::{build_client, VolumeBot};
use volume::config::VolumeSettings;
use volume::market::{self, MarketDataProvider};
use volume::strategy::VolumeStrategy;

// lib.rs에서 자동으로 dotenv가 로드됨

#[derive(Debug, StructOpt)]
#[structopt(name = "volume", about = "스팟 거래소 볼륨 생성 봇")]
enum Command {
    /// 볼륨 생성 루프 실행
    Run {
        /// 실행 시간 (시간 단위, 생략하면 무한 실행)
        #[structopt(long)]
        duration_hours: Option<f64>,
    },
    /// 시장 데이터 조회 테스트
    Probe,
    /// 거래소 잔고 조회
    Balances,
    /// 거래 판단 파이프라인 테스트 (dry-run 모드)
    DecideTest {
        /// 판단을 반복할 횟수
        #[structopt(long, default_value = "5")]
        iterations: u32,
        /// 가정할 기준 자산 잔고
        #[structopt(long, default_value = "1000.0")]
        balance: f64,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // init error reporting
    color_eyre::install()?;

    // init logging (파일 + stdout)
    let _guards = volume::logger::init_tracing();

    let cmd = Command::from_args();

    let settings = VolumeSettings::from_env().map_err(|e| eyre::eyre!("설정 오류: {}", e))?;

    for warning in settings.environment_warnings() {
        warn!("Configuration warning: {}", warning);
    }

    info!("Exchange: {}", settings.exchange);
    info!("Trading Pair: {}", settings.trading_pair);
    info!(
        "Target Volume: ${:.2} USDT/hour",
        settings.target_volume_usdt_per_hour
    );
    info!("Price Direction: {}", settings.walk_direction);
    info!("Order Frequency: {}s", settings.order_frequency_secs);
    info!("Dry Run: {}", settings.dry_run);

    match cmd {
        Command::Run { duration_hours } => run_bot(settings, duration_hours).await,
        Command::Probe => run_probe(settings).await,
        Command::Balances => run_balances(settings).await,
        Command::DecideTest {
            iterations,
            balance,
        } => run_decide_test(settings, iterations, balance).await,
    }
}

async fn run_bot(settings: VolumeSettings, duration_hours: Option<f64>) -> eyre::Result<()> {
    let mut bot =
        VolumeBot::new(settings).map_err(|e| eyre::eyre!("거래소 초기화 실패: {}", e))?;

    info!("Exchange initialized successfully");

    bot.run(duration_hours).await
}

/// 시장 데이터 한 번 조회해서 요약 출력
async fn run_probe(settings: VolumeSettings) -> eyre::Result<()> {
    let client = build_client(&settings).map_err(|e| eyre::eyre!("거래소 초기화 실패: {}", e))?;
    let provider = MarketDataProvider::new(client, settings.trading_pair.clone());

    let snapshot = provider
        .snapshot()
        .await
        .ok_or_else(|| eyre::eyre!("시장 데이터 조회 실패"))?;

    let spread = market::spread(&snapshot.orderbook);
    let liquidity = market::top_liquidity(&snapshot.orderbook);

    info!("Last price: {}", snapshot.last_price());
    info!("Spread: {:.6} ({:.4}%)", spread, spread * 100.0);
    info!(
        "Top liquidity: bid {:.4}, ask {:.4}",
        liquidity.bid_volume, liquidity.ask_volume
    );
    info!("Trades fetched: {}", snapshot.trades.len());
    info!("Candles fetched: {}", snapshot.candles.len());

    Ok(())
}

/// 설정된 거래소의 보유 자산 조회
async fn run_balances(settings: VolumeSettings) -> eyre::Result<()> {
    let assets = match settings.exchange {
        ExchangeId::Binance => {
            let client = BinanceClient::with_credentials()
                .map_err(|e| eyre::eyre!("거래소 초기화 실패: {}", e))?;
            client
                .fetch_assets()
                .await
                .map_err(|e| eyre::eyre!("잔고 조회 실패: {}", e))?
        }
        ExchangeId::Gate => {
            let client = GateClient::with_credentials()
                .map_err(|e| eyre::eyre!("거래소 초기화 실패: {}", e))?;
            client
                .fetch_assets()
                .await
                .map_err(|e| eyre::eyre!("잔고 조회 실패: {}", e))?
        }
    };

    print_assets(&assets);
    Ok(())
}

fn print_assets(assets: &[AssetBalance]) {
    info!("{} assets with non-zero balance", assets.len());
    for asset in assets {
        info!(
            "  {}: total {:.8}, available {:.8}, in use {:.8}",
            asset.currency, asset.total, asset.available, asset.in_use
        );
    }
}

/// 실제 주문 없이 판단 파이프라인만 반복 실행
async fn run_decide_test(
    mut settings: VolumeSettings,
    iterations: u32,
    balance: f64,
) -> eyre::Result<()> {
    // 테스트 커맨드는 항상 dry-run으로 강제
    settings.dry_run = true;

    let client = build_client(&settings).map_err(|e| eyre::eyre!("거래소 초기화 실패: {}", e))?;
    let provider = MarketDataProvider::new(client.clone(), settings.trading_pair.clone());
    let mut strategy = VolumeStrategy::new(client, settings);

    for i in 0..iterations {
        let snapshot = provider.snapshot().await;
        let decision = strategy.decide(snapshot.as_ref(), balance).await;

        match serde_json::to_string(&decision) {
            Ok(json) => info!("[{}] decision: {}", i + 1, json),
            Err(e) => warn!("[{}] failed to serialize decision: {}", i + 1, e),
        }

        if let Some(error) = &decision.error {
            warn!("[{}] decision error: {}", i + 1, error);
        }

        if decision.should_place {
            if let Some(side) = decision.side {
                let record = strategy
                    .place_order(side, decision.size, Some(decision.current_price))
                    .await
                    .map_err(|e| eyre::eyre!("dry-run 주문 실패: {}", e))?;
                info!("[{}] dry-run order {} recorded", i + 1, record.id);
            }
        }

        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    }

    info!(
        "Decide test finished: {} orders, ${:.2} USDT simulated",
        strategy.order_count(),
        strategy.volume_generated_usdt()
    );

    Ok(())
}
