use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domains::market::models::{Order, OrderSide, TradeLeg};
use crate::shared::database::StoreError;
use crate::shared::errors::MarketError;

// =====================================================
// 엔진 내부 타입 정의
// Engine Internal Types
// =====================================================

/// 호가창에 올라간 매도 주문
/// Resting sell order as held by the in-memory book
///
/// DB 모델(Order)과 별도로, 매칭에 필요한 필드만 가집니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEntry {
    pub id: u64,
    pub user_id: u64,
    pub price: Decimal,
    pub remaining_amount: Decimal,
    /// Time Priority 에 사용
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderEntry {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            price: order.limit_price,
            remaining_amount: order.remaining_amount,
            created_at: order.created_at,
        }
    }
}

/// 신규 주문 요청 (엔진 입력)
/// Order placement request handed to the engine
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub user_id: u64,
    pub side: OrderSide,
    pub amount: Decimal,
    pub price: Decimal,
}

/// 주문 변경 내용
/// Amendment of an open order's remainder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Amendment {
    /// 새 남은 수량
    pub amount: Option<Decimal>,
    /// 새 지정가
    pub price: Option<Decimal>,
}

impl Amendment {
    pub fn validate(&self) -> Result<(), MarketError> {
        if self.amount.is_none() && self.price.is_none() {
            return Err(MarketError::Validation("nothing to amend".to_string()));
        }
        if self.amount.is_some_and(|a| a <= Decimal::ZERO) {
            return Err(MarketError::Validation("amount must be positive".to_string()));
        }
        if self.price.is_some_and(|p| p <= Decimal::ZERO) {
            return Err(MarketError::Validation("price must be positive".to_string()));
        }
        Ok(())
    }
}

/// 매칭 결과 중 한 건 (아직 정산 전)
/// One planned fill against a resting sell
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub sell_order_id: u64,
    pub seller_id: u64,
    pub amount: Decimal,
    /// 항상 매도 주문(maker) 가격
    pub price: Decimal,
}

/// 매칭 계획
/// Fills chosen for one incoming buy, in execution order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchPlan {
    pub fills: Vec<Fill>,
    /// 계획대로 체결된 후 남는 수량
    pub remaining: Decimal,
}

impl MatchPlan {
    pub fn filled_amount(&self) -> Decimal {
        self.fills.iter().map(|f| f.amount).sum()
    }
}

/// 정산 단위 (체결 1건)
/// One settlement, carrying every identity it writes so a retry re-applies nothing new
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub settlement_id: Uuid,
    pub buyer_id: u64,
    pub seller_id: u64,
    pub amount: Decimal,
    pub price: Decimal,
    pub buy_order_id: u64,
    pub sell_order_id: u64,
    pub buyer_leg_id: u64,
    pub seller_leg_id: u64,
    pub created_at: DateTime<Utc>,
}

impl Settlement {
    pub fn total(&self) -> Decimal {
        self.amount * self.price
    }
}

/// 정산 결과 (양쪽 leg)
/// Both legs of one settled trade
#[derive(Debug, Clone, PartialEq)]
pub struct SettledTrade {
    pub buyer_leg: TradeLeg,
    pub seller_leg: TradeLeg,
}

/// 미체결 매수 잔량 처리 방식
/// What happens to a buy's unfilled remainder after its matching run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnfilledBuyPolicy {
    /// open 상태로 남김 (호가창에는 올리지 않음, 다시 매칭되지 않음)
    #[default]
    KeepOpen,
    /// canceled 로 종료
    Cancel,
}

impl fmt::Display for UnfilledBuyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnfilledBuyPolicy::KeepOpen => f.write_str("keep_open"),
            UnfilledBuyPolicy::Cancel => f.write_str("cancel"),
        }
    }
}

impl FromStr for UnfilledBuyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep_open" => Ok(UnfilledBuyPolicy::KeepOpen),
            "cancel" => Ok(UnfilledBuyPolicy::Cancel),
            other => Err(format!("unknown unfilled buy policy '{}'", other)),
        }
    }
}

/// 트랜잭션 시도 중 발생한 에러
/// Failure of one transaction attempt: either the store (maybe retryable) or a business rule
#[derive(Debug, Clone, PartialEq)]
pub enum TxError {
    Store(StoreError),
    Market(MarketError),
}

impl TxError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TxError::Store(e) if e.is_transient())
    }

    pub fn into_market(self) -> MarketError {
        match self {
            TxError::Store(e) => e.into(),
            TxError::Market(e) => e,
        }
    }
}

impl From<StoreError> for TxError {
    fn from(err: StoreError) -> Self {
        TxError::Store(err)
    }
}

impl From<MarketError> for TxError {
    fn from(err: MarketError) -> Self {
        TxError::Market(err)
    }
}
