use thiserror::Error;
use axum::{http::StatusCode, Json};
use rust_decimal::Decimal;
use serde_json::json;

use crate::shared::database::StoreError;

/// 마켓 도메인 에러
/// Energy market errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    /// 잘못된 입력 (수량/가격이 0 이하 등)
    /// Invalid input (non-positive amount or price, nothing to amend)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// 돈 부족
    /// Insufficient money
    #[error("Insufficient funds: user {user_id} needs {required} EUR but has {available} EUR")]
    InsufficientFunds {
        user_id: u64,
        required: Decimal,
        available: Decimal,
    },

    /// 에너지 부족
    /// Insufficient energy
    #[error("Insufficient energy: user {user_id} needs {required} MWh but has {available} MWh")]
    InsufficientEnergy {
        user_id: u64,
        required: Decimal,
        available: Decimal,
    },

    /// 주문을 찾을 수 없음
    /// Unknown order
    #[error("Order not found: id={id}")]
    NotFound { id: u64 },

    /// 주문 소유자가 아님
    /// Caller is not the order's owner
    #[error("Unauthorized: order {order_id} does not belong to user {user_id}")]
    Unauthorized { order_id: u64, user_id: u64 },

    /// open 이 아닌 주문에 대한 변경 시도 등
    /// Mutation attempted on a non-open order
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// 엔진 대기열 포화 또는 사전 검사 이후 잔고 변경 (재시도 가능)
    /// Lost the race for the matching worker; retryable
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// 저장소 오류
    /// Store failure, fatal for the current call
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl MarketError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, MarketError::ConcurrencyConflict(_))
    }
}

impl From<StoreError> for MarketError {
    fn from(err: StoreError) -> Self {
        MarketError::Persistence(err.to_string())
    }
}

/// MarketError를 HTTP 응답으로 변환
impl From<MarketError> for (StatusCode, Json<serde_json::Value>) {
    fn from(err: MarketError) -> Self {
        let status = match &err {
            MarketError::Validation(_)
            | MarketError::InsufficientFunds { .. }
            | MarketError::InsufficientEnergy { .. }
            | MarketError::InvalidState(_) => StatusCode::BAD_REQUEST,
            MarketError::NotFound { .. } => StatusCode::NOT_FOUND,
            MarketError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            MarketError::ConcurrencyConflict(_) => StatusCode::CONFLICT,
            MarketError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": err.to_string() })))
    }
}
