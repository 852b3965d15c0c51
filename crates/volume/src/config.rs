use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use interface::ExchangeId;
use thiserror::Error;

// 기본 설정값
pub const DEFAULT_TARGET_VOLUME_USDT_PER_HOUR: f64 = 100.0;
pub const DEFAULT_MAX_PRICE_DEVIATION: f64 = 0.01;
pub const DEFAULT_ORDER_FREQUENCY_SECONDS: u64 = 60;
pub const DEFAULT_MIN_ORDER_RATIO: f64 = 0.001;
pub const DEFAULT_MAX_ORDER_RATIO: f64 = 0.005;
pub const DEFAULT_SIZE_RANDOMIZATION: f64 = 0.3;
pub const DEFAULT_TIMING_RANDOMIZATION: f64 = 0.5;
pub const DEFAULT_BURST_PROBABILITY: f64 = 0.05;
pub const DEFAULT_QUIET_PROBABILITY: f64 = 0.15;
pub const DEFAULT_MIN_ORDER_VALUE_USDT: f64 = 5.0;
pub const DEFAULT_MAX_SPREAD_THRESHOLD: f64 = 0.05;

// 주문/잔고 한도
pub const MAX_BALANCE_USAGE_RATIO: f64 = 0.1; // 주문 한 건당 잔고의 최대 10%
pub const ORDER_SIDE_ALTERNATE_PROBABILITY: f64 = 0.8;

// 가격 계산 계수
pub const BASE_PRICE_STEP_RATIO: f64 = 0.001; // 현재가의 0.1%를 기본 스텝으로
pub const PRICE_RANDOMIZATION_FACTOR: f64 = 0.5;
pub const PRICE_ADJUSTMENT_PROBABILITY: f64 = 0.7;

// 유동성 사용 한도
pub const LIQUIDITY_USAGE_RATIO: f64 = 0.5;

// 타이밍/정리 주기
pub const ORDER_PLACEMENT_CHECK_INTERVAL: Duration = Duration::from_secs(5);
pub const ORDER_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);
pub const BALANCE_WARNING_WAIT: Duration = Duration::from_secs(30);
pub const ERROR_RETRY_WAIT: Duration = Duration::from_secs(30);
pub const MARKET_DATA_RETRY_WAIT: Duration = Duration::from_secs(10);
pub const NO_BALANCE_WAIT: Duration = Duration::from_secs(60);

// 레짐 배수
pub const BURST_MODE_INTERVAL_MULTIPLIER: f64 = 0.3;
pub const QUIET_MODE_INTERVAL_MULTIPLIER: f64 = 3.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse {var}: {value}")]
    Parse { var: String, value: String },

    #[error("{0}")]
    Invalid(String),
}

/// 가격 워크 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkDirection {
    Up,
    Down,
    Sideways,
    Random,
}

impl FromStr for WalkDirection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(WalkDirection::Up),
            "down" => Ok(WalkDirection::Down),
            "sideways" => Ok(WalkDirection::Sideways),
            "random" => Ok(WalkDirection::Random),
            other => Err(ConfigError::Invalid(format!(
                "Invalid price walk direction: {}. Must be one of up, down, sideways, random",
                other
            ))),
        }
    }
}

impl fmt::Display for WalkDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WalkDirection::Up => "up",
            WalkDirection::Down => "down",
            WalkDirection::Sideways => "sideways",
            WalkDirection::Random => "random",
        };
        f.write_str(s)
    }
}

/// 볼륨 봇 전체 설정. 구성 시점에 한 번 검증되고 이후에는 불변.
#[derive(Debug, Clone)]
pub struct VolumeSettings {
    pub exchange: ExchangeId,
    pub base_asset: String,
    pub quote_asset: String,
    pub trading_pair: String,
    pub dry_run: bool,

    /// 시간당 목표 볼륨 (USDT)
    pub target_volume_usdt_per_hour: f64,
    pub walk_direction: WalkDirection,
    /// 현재가 대비 목표가의 최대 편차 비율 (0 < x <= 0.1)
    pub max_price_deviation: f64,
    /// 주문 간 기본 대기 시간 (초)
    pub order_frequency_secs: u64,

    /// 잔고 대비 주문 크기 비율 범위
    pub min_order_ratio: f64,
    pub max_order_ratio: f64,
    pub size_randomization: f64,

    pub timing_randomization: f64,
    pub burst_probability: f64,
    pub quiet_probability: f64,

    /// 주문 한 건의 최소 명목가 (USDT)
    pub min_order_value_usdt: f64,
    pub max_spread_threshold: f64,
    /// 새 주문 전에 기존 오픈 주문을 취소할지 여부
    pub cancel_previous_orders: bool,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            exchange: ExchangeId::Gate,
            base_asset: "ETH".to_string(),
            quote_asset: "USDT".to_string(),
            trading_pair: "ETH/USDT".to_string(),
            dry_run: true,
            target_volume_usdt_per_hour: DEFAULT_TARGET_VOLUME_USDT_PER_HOUR,
            walk_direction: WalkDirection::Sideways,
            max_price_deviation: DEFAULT_MAX_PRICE_DEVIATION,
            order_frequency_secs: DEFAULT_ORDER_FREQUENCY_SECONDS,
            min_order_ratio: DEFAULT_MIN_ORDER_RATIO,
            max_order_ratio: DEFAULT_MAX_ORDER_RATIO,
            size_randomization: DEFAULT_SIZE_RANDOMIZATION,
            timing_randomization: DEFAULT_TIMING_RANDOMIZATION,
            burst_probability: DEFAULT_BURST_PROBABILITY,
            quiet_probability: DEFAULT_QUIET_PROBABILITY,
            min_order_value_usdt: DEFAULT_MIN_ORDER_VALUE_USDT,
            max_spread_threshold: DEFAULT_MAX_SPREAD_THRESHOLD,
            cancel_previous_orders: true,
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value.parse::<T>().map_err(|_| ConfigError::Parse {
            var: key.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(default)
}

impl VolumeSettings {
    /// 환경변수에서 설정을 읽고 검증까지 마친 설정을 돌려준다.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let exchange = match env_string("EXCHANGE", "gate").to_lowercase().as_str() {
            "binance" => ExchangeId::Binance,
            "gate" => ExchangeId::Gate,
            other => {
                return Err(ConfigError::Invalid(format!(
                    "Unsupported exchange: {}. Supported: binance, gate",
                    other
                )))
            }
        };

        let base_asset = env_string("BASE_ASSET", &defaults.base_asset).to_uppercase();
        let quote_asset = env_string("QUOTE_ASSET", &defaults.quote_asset).to_uppercase();
        let default_pair = format!("{}/{}", base_asset, quote_asset);
        let trading_pair = env_string("TRADING_PAIR", &default_pair);

        let walk_direction: WalkDirection =
            env_string("PRICE_WALK_DIRECTION", "sideways").parse()?;

        let settings = Self {
            exchange,
            base_asset,
            quote_asset,
            trading_pair,
            dry_run: env_bool("DRY_RUN", true),
            target_volume_usdt_per_hour: env_parse(
                "TARGET_VOLUME_USDT_PER_HOUR",
                defaults.target_volume_usdt_per_hour,
            )?,
            walk_direction,
            max_price_deviation: env_parse("MAX_PRICE_DEVIATION", defaults.max_price_deviation)?,
            order_frequency_secs: env_parse("ORDER_FREQUENCY", defaults.order_frequency_secs)?,
            min_order_ratio: env_parse("MIN_ORDER_RATIO", defaults.min_order_ratio)?,
            max_order_ratio: env_parse("MAX_ORDER_RATIO", defaults.max_order_ratio)?,
            size_randomization: env_parse("SIZE_RANDOMIZATION", defaults.size_randomization)?,
            timing_randomization: env_parse("TIMING_RANDOMIZATION", defaults.timing_randomization)?,
            burst_probability: env_parse("BURST_PROBABILITY", defaults.burst_probability)?,
            quiet_probability: env_parse("QUIET_PROBABILITY", defaults.quiet_probability)?,
            min_order_value_usdt: env_parse("MIN_ORDER_VALUE_USDT", defaults.min_order_value_usdt)?,
            max_spread_threshold: env_parse("MAX_SPREAD_THRESHOLD", defaults.max_spread_threshold)?,
            cancel_previous_orders: env_bool("CANCEL_PREVIOUS_ORDERS", true),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// 설정 검증. 구성 시점에 한 번만 호출하며, 전략 코드는 호출 시점 검증을 하지 않는다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trading_pair.is_empty() {
            return Err(ConfigError::Invalid("Trading pair is required".to_string()));
        }

        if self.target_volume_usdt_per_hour <= 0.0 {
            return Err(ConfigError::Invalid(
                "Target volume must be positive".to_string(),
            ));
        }

        if !(self.max_price_deviation > 0.0 && self.max_price_deviation <= 0.1) {
            return Err(ConfigError::Invalid(
                "Max price deviation must be between 0 and 0.1 (10%)".to_string(),
            ));
        }

        if self.order_frequency_secs < 1 {
            return Err(ConfigError::Invalid(
                "Order frequency must be at least 1 second".to_string(),
            ));
        }

        if !(self.min_order_ratio > 0.0 && self.min_order_ratio <= 1.0) {
            return Err(ConfigError::Invalid(
                "Min order ratio must be between 0 and 1".to_string(),
            ));
        }
        if !(self.max_order_ratio > 0.0 && self.max_order_ratio <= 1.0) {
            return Err(ConfigError::Invalid(
                "Max order ratio must be between 0 and 1".to_string(),
            ));
        }
        if self.min_order_ratio >= self.max_order_ratio {
            return Err(ConfigError::Invalid(
                "Min order ratio must be less than max order ratio".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.size_randomization) {
            return Err(ConfigError::Invalid(
                "Size randomization must be between 0 and 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.timing_randomization) {
            return Err(ConfigError::Invalid(
                "Timing randomization must be between 0 and 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.burst_probability) {
            return Err(ConfigError::Invalid(
                "Burst probability must be between 0 and 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.quiet_probability) {
            return Err(ConfigError::Invalid(
                "Quiet probability must be between 0 and 1".to_string(),
            ));
        }

        if self.min_order_value_usdt <= 0.0 {
            return Err(ConfigError::Invalid(
                "Minimum order value must be positive".to_string(),
            ));
        }

        if !(self.max_spread_threshold > 0.0 && self.max_spread_threshold <= 1.0) {
            return Err(ConfigError::Invalid(
                "Max spread threshold must be between 0 and 1".to_string(),
            ));
        }

        Ok(())
    }

    /// 필수 환경변수 점검. 실패가 아니라 경고 목록을 돌려준다.
    pub fn environment_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let (key_var, secret_var) = match self.exchange {
            ExchangeId::Binance => ("BINANCE_API_KEY", "BINANCE_API_SECRET"),
            ExchangeId::Gate => ("GATE_API_KEY", "GATE_API_SECRET"),
        };

        for var in [key_var, secret_var] {
            match std::env::var(var) {
                Ok(value) if value.contains("your_api") => {
                    warnings.push(format!("{} appears to be a placeholder value", var));
                }
                Ok(_) => {}
                Err(_) => {
                    if !self.dry_run {
                        warnings.push(format!("Environment variable {} is not set", var));
                    }
                }
            }
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = VolumeSettings::default();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_deviation() {
        let mut settings = VolumeSettings::default();
        settings.max_price_deviation = 0.0;
        assert!(settings.validate().is_err());

        settings.max_price_deviation = 0.2;
        assert!(settings.validate().is_err());

        settings.max_price_deviation = 0.1;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_ratios() {
        let mut settings = VolumeSettings::default();
        settings.min_order_ratio = 0.01;
        settings.max_order_ratio = 0.005;
        assert!(settings.validate().is_err());

        // 같은 값도 거부 (min < max 필수)
        settings.min_order_ratio = 0.005;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_probabilities() {
        let mut settings = VolumeSettings::default();
        settings.burst_probability = 1.5;
        assert!(settings.validate().is_err());

        settings.burst_probability = 0.05;
        settings.quiet_probability = -0.1;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_target_volume() {
        let mut settings = VolumeSettings::default();
        settings.target_volume_usdt_per_hour = 0.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_walk_direction_parsing() {
        assert_eq!(
            "sideways".parse::<WalkDirection>().unwrap(),
            WalkDirection::Sideways
        );
        assert_eq!("UP".parse::<WalkDirection>().unwrap(), WalkDirection::Up);
        assert!("diagonal".parse::<WalkDirection>().is_err());
    }
}
