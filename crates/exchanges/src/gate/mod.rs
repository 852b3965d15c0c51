mod account;
mod market;
mod order;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha512};

use interface::{ExchangeError, OrderStatus};

pub(crate) const BASE_URL: &str = "https://api.gateio.ws";

/// Gate.io v4 REST 클라이언트
#[derive(Clone)]
pub struct GateClient {
    pub http: reqwest::Client,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

impl GateClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: None,
            api_secret: None,
        }
    }

    /// GATE_API_KEY / GATE_API_SECRET 환경변수에서 인증 정보를 읽는다.
    pub fn with_credentials() -> Result<Self, ExchangeError> {
        let api_key = std::env::var("GATE_API_KEY")
            .map_err(|_| ExchangeError::Auth("GATE_API_KEY not set".to_string()))?;
        let api_secret = std::env::var("GATE_API_SECRET")
            .map_err(|_| ExchangeError::Auth("GATE_API_SECRET not set".to_string()))?;

        Ok(Self {
            http: reqwest::Client::new(),
            api_key: Some(api_key),
            api_secret: Some(api_secret),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() && self.api_secret.is_some()
    }

    /// 심볼을 Gate 형식(언더스코어 구분)으로 변환
    /// 예: "ETH-USDT" -> "ETH_USDT", "ETH/USDT" -> "ETH_USDT", "ETHUSDT" -> "ETH_USDT"
    pub(crate) fn normalize_symbol(symbol: &str) -> String {
        let upper = symbol.to_uppercase();
        if upper.contains('_') {
            return upper;
        }
        if upper.contains('-') || upper.contains('/') {
            return upper.replace(['-', '/'], "_");
        }

        // 구분자가 없는 경우 잘 알려진 quote 통화 접미사로 분리
        for quote in ["USDT", "USDC", "BTC", "ETH"] {
            if let Some(base) = upper.strip_suffix(quote) {
                if !base.is_empty() {
                    return format!("{}_{}", base, quote);
                }
            }
        }

        upper
    }

    pub(crate) fn credentials(&self) -> Result<(&str, &str), ExchangeError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ExchangeError::Auth("API key not set. Use GateClient::with_credentials()".to_string())
        })?;
        let api_secret = self.api_secret.as_deref().ok_or_else(|| {
            ExchangeError::Auth(
                "API secret not set. Use GateClient::with_credentials()".to_string(),
            )
        })?;
        Ok((api_key, api_secret))
    }
}

impl Default for GateClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Gate v4 서명 생성.
/// 서명 문자열: METHOD\nPATH\nQUERY\nSHA512(body)\nTIMESTAMP (HMAC-SHA512, hex)
pub(crate) fn generate_signature(
    method: &str,
    path: &str,
    query: &str,
    body: &str,
    timestamp: &str,
    api_secret: &str,
) -> String {
    let body_hash = hex::encode(Sha512::digest(body.as_bytes()));
    let payload = format!(
        "{}\n{}\n{}\n{}\n{}",
        method, path, query, body_hash, timestamp
    );

    let mut mac = Hmac::<Sha512>::new_from_slice(api_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// 현재 시각 (초 단위 타임스탬프 문자열)
pub(crate) fn get_timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

#[derive(Debug, Deserialize)]
struct GateApiError {
    label: String,
    message: String,
}

/// 실패 응답을 ExchangeError로 분류.
/// ORDER_NOT_FOUND 계열 라벨은 주문이 이미 사라진 경우이므로 OrderNotFound.
pub(crate) fn classify_api_error(status: reqwest::StatusCode, body: &str) -> ExchangeError {
    if let Ok(err) = serde_json::from_str::<GateApiError>(body) {
        return match err.label.as_str() {
            "ORDER_NOT_FOUND" | "ORDER_FINISHED" | "ORDER_CLOSED" => {
                ExchangeError::OrderNotFound(err.message)
            }
            "INVALID_KEY" | "INVALID_SIGNATURE" | "MISSING_REQUIRED_HEADER" => {
                ExchangeError::Auth(err.message)
            }
            _ => ExchangeError::Other(format!("Gate API error {}: {}", err.label, err.message)),
        };
    }

    ExchangeError::Other(format!(
        "Gate API HTTP error: status {}, response: {}",
        status,
        body.chars().take(200).collect::<String>()
    ))
}

/// Gate 주문 상태 문자열을 공통 상태로 정규화
pub(crate) fn parse_order_status(status: &str) -> OrderStatus {
    match status {
        "open" => OrderStatus::Open,
        "closed" => OrderStatus::Filled,
        "cancelled" => OrderStatus::Canceled,
        _ => OrderStatus::Open,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(GateClient::normalize_symbol("ETH-USDT"), "ETH_USDT");
        assert_eq!(GateClient::normalize_symbol("ETH/USDT"), "ETH_USDT");
        assert_eq!(GateClient::normalize_symbol("eth_usdt"), "ETH_USDT");
        assert_eq!(GateClient::normalize_symbol("ETHUSDT"), "ETH_USDT");
        assert_eq!(GateClient::normalize_symbol("BTCUSDC"), "BTC_USDC");
    }

    #[test]
    fn test_generate_signature_deterministic() {
        let sig1 = generate_signature("GET", "/api/v4/spot/accounts", "", "", "1700000000", "s");
        let sig2 = generate_signature("GET", "/api/v4/spot/accounts", "", "", "1700000000", "s");
        assert_eq!(sig1, sig2);
        assert_eq!(sig1.len(), 128); // SHA512 hex
    }

    #[test]
    fn test_classify_api_error_labels() {
        let err = classify_api_error(
            reqwest::StatusCode::NOT_FOUND,
            r#"{"label":"ORDER_NOT_FOUND","message":"Order not found"}"#,
        );
        assert!(matches!(err, ExchangeError::OrderNotFound(_)));

        let err = classify_api_error(
            reqwest::StatusCode::UNAUTHORIZED,
            r#"{"label":"INVALID_SIGNATURE","message":"Signature mismatch"}"#,
        );
        assert!(matches!(err, ExchangeError::Auth(_)));

        let err = classify_api_error(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"label":"BALANCE_NOT_ENOUGH","message":"Not enough balance"}"#,
        );
        assert!(matches!(err, ExchangeError::Other(_)));
    }

    #[test]
    fn test_parse_order_status() {
        assert_eq!(parse_order_status("open"), OrderStatus::Open);
        assert_eq!(parse_order_status("closed"), OrderStatus::Filled);
        assert_eq!(parse_order_status("cancelled"), OrderStatus::Canceled);
    }
}
