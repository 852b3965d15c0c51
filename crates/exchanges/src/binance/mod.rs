mod account;
mod market;
mod order;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use interface::{ExchangeError, OrderStatus};

pub(crate) const BASE_URL: &str = "https://api.binance.com";

/// Binance REST 클라이언트.
/// 공개 엔드포인트는 `new()`로 충분하고, 잔고/주문 엔드포인트는
/// `with_credentials()`로 생성해야 한다.
#[derive(Clone)]
pub struct BinanceClient {
    pub http: reqwest::Client,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

impl BinanceClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: None,
            api_secret: None,
        }
    }

    /// BINANCE_API_KEY / BINANCE_API_SECRET 환경변수에서 인증 정보를 읽는다.
    pub fn with_credentials() -> Result<Self, ExchangeError> {
        let api_key = std::env::var("BINANCE_API_KEY")
            .map_err(|_| ExchangeError::Auth("BINANCE_API_KEY not set".to_string()))?;
        let api_secret = std::env::var("BINANCE_API_SECRET")
            .map_err(|_| ExchangeError::Auth("BINANCE_API_SECRET not set".to_string()))?;

        Ok(Self {
            http: reqwest::Client::new(),
            api_key: Some(api_key),
            api_secret: Some(api_secret),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() && self.api_secret.is_some()
    }

    /// 심볼을 Binance 형식으로 변환
    /// 예: "ETH-USDT" -> "ETHUSDT", "eth/usdt" -> "ETHUSDT"
    pub(crate) fn normalize_symbol(symbol: &str) -> String {
        symbol.replace(['-', '/', '_'], "").to_uppercase()
    }

    pub(crate) fn credentials(&self) -> Result<(&str, &str), ExchangeError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ExchangeError::Auth("API key not set. Use BinanceClient::with_credentials()".to_string())
        })?;
        let api_secret = self.api_secret.as_deref().ok_or_else(|| {
            ExchangeError::Auth(
                "API secret not set. Use BinanceClient::with_credentials()".to_string(),
            )
        })?;
        Ok((api_key, api_secret))
    }
}

impl Default for BinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

/// HMAC-SHA256 서명 생성 (hex 인코딩)
pub(crate) fn generate_signature(query_string: &str, api_secret: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(api_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(query_string.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// 현재 시각 (밀리초 타임스탬프)
pub(crate) fn get_timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Deserialize)]
struct BinanceApiError {
    code: i64,
    msg: String,
}

/// 실패 응답을 ExchangeError로 분류.
/// -2011 (Unknown order sent) / -2013 (Order does not exist)는
/// 주문이 이미 사라진 경우이므로 OrderNotFound로 매핑한다.
pub(crate) fn classify_api_error(status: reqwest::StatusCode, body: &str) -> ExchangeError {
    if let Ok(err) = serde_json::from_str::<BinanceApiError>(body) {
        if err.code == -2011 || err.code == -2013 {
            return ExchangeError::OrderNotFound(err.msg);
        }
        if err.code == -2014 || err.code == -2015 {
            return ExchangeError::Auth(err.msg);
        }
        return ExchangeError::Other(format!("Binance API error {}: {}", err.code, err.msg));
    }

    ExchangeError::Other(format!(
        "Binance API HTTP error: status {}, response: {}",
        status,
        body.chars().take(200).collect::<String>()
    ))
}

/// Binance 주문 상태 문자열을 공통 상태로 정규화
pub(crate) fn parse_order_status(status: &str) -> OrderStatus {
    match status {
        "NEW" | "PARTIALLY_FILLED" => OrderStatus::Open,
        "FILLED" => OrderStatus::Filled,
        "CANCELED" | "EXPIRED" | "REJECTED" | "EXPIRED_IN_MATCH" => OrderStatus::Canceled,
        _ => OrderStatus::Open,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(BinanceClient::normalize_symbol("ETH-USDT"), "ETHUSDT");
        assert_eq!(BinanceClient::normalize_symbol("eth/usdt"), "ETHUSDT");
        assert_eq!(BinanceClient::normalize_symbol("ETHUSDT"), "ETHUSDT");
    }

    #[test]
    fn test_generate_signature_deterministic() {
        let sig1 = generate_signature("symbol=ETHUSDT&timestamp=1", "secret");
        let sig2 = generate_signature("symbol=ETHUSDT&timestamp=1", "secret");
        assert_eq!(sig1, sig2);
        assert_eq!(sig1.len(), 64); // SHA256 hex
    }

    #[test]
    fn test_classify_api_error_order_not_found() {
        let err = classify_api_error(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"code":-2013,"msg":"Order does not exist."}"#,
        );
        assert!(matches!(err, ExchangeError::OrderNotFound(_)));

        let err = classify_api_error(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"code":-2011,"msg":"Unknown order sent."}"#,
        );
        assert!(matches!(err, ExchangeError::OrderNotFound(_)));
    }

    #[test]
    fn test_classify_api_error_other() {
        let err = classify_api_error(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"code":-1013,"msg":"Filter failure: LOT_SIZE"}"#,
        );
        assert!(matches!(err, ExchangeError::Other(_)));

        // JSON이 아닌 응답은 본문을 잘라서 보존
        let err = classify_api_error(reqwest::StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert!(matches!(err, ExchangeError::Other(_)));
    }

    #[test]
    fn test_parse_order_status() {
        assert_eq!(parse_order_status("NEW"), OrderStatus::Open);
        assert_eq!(parse_order_status("PARTIALLY_FILLED"), OrderStatus::Open);
        assert_eq!(parse_order_status("FILLED"), OrderStatus::Filled);
        assert_eq!(parse_order_status("CANCELED"), OrderStatus::Canceled);
        assert_eq!(parse_order_status("EXPIRED"), OrderStatus::Canceled);
    }
}
