use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Deserializer, Serializer};
use utoipa::{ToSchema, IntoParams};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domains::market::models::trade::TradeLeg;
use crate::shared::errors::MarketError;

// =====================================================
// ID 직렬화 헬퍼 함수 (JavaScript 정밀도 손실 방지)
// =====================================================
/// u64를 문자열로 직렬화
/// Serialize u64 as string to avoid precision loss in JavaScript
pub(crate) fn serialize_u64_as_string<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

/// 문자열을 u64로 역직렬화
/// Deserialize string to u64
pub(crate) fn deserialize_string_to_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse::<u64>().map_err(serde::de::Error::custom)
}

// =====================================================
// Order 모델
// =====================================================
// 역할: 에너지 마켓의 매수/매도 지정가 주문
//
// 주문 상태:
// - open: 체결 대기 (remaining_amount > 0)
// - completed: 전량 체결 (remaining_amount == 0)
// - canceled: 사용자가 취소
//
// 부분 체결(partially filled)은 별도 상태가 아니라
// open 이면서 remaining_amount < original_amount 인 경우입니다.
// =====================================================

/// 주문 방향
/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            other => Err(MarketError::Validation(format!("unknown order type '{}'", other))),
        }
    }
}

/// 주문 상태
/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Completed,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "open",
            OrderStatus::Completed => "completed",
            OrderStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(OrderStatus::Open),
            "completed" => Ok(OrderStatus::Completed),
            "canceled" => Ok(OrderStatus::Canceled),
            other => Err(MarketError::Validation(format!("unknown order status '{}'", other))),
        }
    }
}

/// 주문 정보
/// Order information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(as = Order)]
pub struct Order {
    /// 주문 ID
    /// Serialized as string to avoid precision loss in JavaScript
    #[serde(serialize_with = "serialize_u64_as_string", deserialize_with = "deserialize_string_to_u64")]
    #[schema(value_type = String, example = "42")]
    pub id: u64,

    /// 주문 소유자
    /// Owner of the order
    pub user_id: u64,

    /// 주문 유형: 'buy' 또는 'sell'
    /// Order type: 'buy' or 'sell'
    #[serde(rename = "order_type")]
    pub side: OrderSide,

    /// 최초 주문 수량 (MWh)
    /// Original amount in MWh (grows or shrinks only through amend)
    #[serde(rename = "original_amount_mwh")]
    #[schema(value_type = String, example = "5")]
    pub original_amount: Decimal,

    /// 남은 수량 (MWh)
    /// Remaining amount in MWh
    #[serde(rename = "remaining_amount_mwh")]
    #[schema(value_type = String, example = "2")]
    pub remaining_amount: Decimal,

    /// 지정가 (EUR/MWh)
    /// Limit price in EUR per MWh
    #[serde(rename = "price_eur_per_mwh")]
    #[schema(value_type = String, example = "50")]
    pub limit_price: Decimal,

    /// 주문 상태
    /// Order status
    pub status: OrderStatus,

    /// 생성 시간 (가격-시간 우선순위에 사용)
    /// Created timestamp (used for price-time priority)
    pub created_at: DateTime<Utc>,

    /// 마지막 변경 시간
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// 체결된 수량
    /// Amount already filled
    pub fn filled_amount(&self) -> Decimal {
        self.original_amount - self.remaining_amount
    }

    /// open 이면서 일부 체결된 상태
    /// Informational substate: open with at least one fill
    pub fn is_partially_filled(&self) -> bool {
        self.status == OrderStatus::Open && self.remaining_amount < self.original_amount
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    /// 데이터 모델 불변식 검사
    /// Check the order invariants
    pub fn check_invariants(&self) -> Result<(), MarketError> {
        if self.remaining_amount < Decimal::ZERO {
            return Err(MarketError::InvalidState(format!(
                "order {} remaining amount is negative", self.id
            )));
        }
        if self.remaining_amount > self.original_amount {
            return Err(MarketError::InvalidState(format!(
                "order {} remaining amount exceeds original amount", self.id
            )));
        }
        if self.limit_price <= Decimal::ZERO {
            return Err(MarketError::InvalidState(format!(
                "order {} price must be positive", self.id
            )));
        }
        match self.status {
            OrderStatus::Completed if !self.remaining_amount.is_zero() => Err(MarketError::InvalidState(
                format!("order {} completed with remaining amount", self.id),
            )),
            OrderStatus::Open if self.remaining_amount.is_zero() => Err(MarketError::InvalidState(
                format!("order {} open with nothing remaining", self.id),
            )),
            _ => Ok(()),
        }
    }
}

// =====================================================
// OrderPatch - 주문 변경 (타입 지정 패치)
// =====================================================
// 주문에 대한 유일한 변경 수단입니다.
// 정해진 필드만 담고, 적용 결과가 불변식을 만족할 때만 쓰기가 허용됩니다.
// =====================================================

/// 주문 변경 패치
/// Typed order patch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderPatch {
    pub remaining_amount: Option<Decimal>,
    pub original_amount: Option<Decimal>,
    pub limit_price: Option<Decimal>,
    pub status: Option<OrderStatus>,
    /// 시간 우선순위 재설정 (수량 증가 시)
    pub created_at: Option<DateTime<Utc>>,
}

impl OrderPatch {
    /// 체결로 인한 수량 차감
    /// Consume `amount` from the order's remainder, completing it at zero
    pub fn fill(order: &Order, amount: Decimal) -> Result<Self, MarketError> {
        if amount <= Decimal::ZERO || amount > order.remaining_amount {
            return Err(MarketError::InvalidState(format!(
                "cannot fill {} from order {} with {} remaining",
                amount, order.id, order.remaining_amount
            )));
        }
        let remaining = order.remaining_amount - amount;
        Ok(Self {
            remaining_amount: Some(remaining),
            status: remaining.is_zero().then_some(OrderStatus::Completed),
            ..Self::default()
        })
    }

    /// 주문 취소
    /// Cancel the order
    pub fn cancel() -> Self {
        Self {
            status: Some(OrderStatus::Canceled),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.remaining_amount.is_none()
            && self.original_amount.is_none()
            && self.limit_price.is_none()
            && self.status.is_none()
            && self.created_at.is_none()
    }

    /// 패치 적용 (검증 포함)
    /// Apply the patch to `order`, rejecting any result that breaks the invariants
    pub fn apply_to(&self, order: &Order, updated_at: DateTime<Utc>) -> Result<Order, MarketError> {
        if !order.is_open() {
            return Err(MarketError::InvalidState(format!(
                "order {} is {}", order.id, order.status
            )));
        }
        let mut next = order.clone();
        if let Some(remaining) = self.remaining_amount {
            next.remaining_amount = remaining;
        }
        if let Some(original) = self.original_amount {
            next.original_amount = original;
        }
        if let Some(price) = self.limit_price {
            next.limit_price = price;
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        if let Some(created_at) = self.created_at {
            next.created_at = created_at;
        }
        next.updated_at = updated_at;
        next.check_invariants()?;
        Ok(next)
    }
}

// =====================================================
// 요청/응답 모델
// =====================================================

/// 주문 생성 요청
/// Request model for placing an order
#[derive(Debug, Deserialize, ToSchema)]
#[schema(as = PlaceOrderRequest)]
pub struct PlaceOrderRequest {
    /// 'buy' 또는 'sell'
    #[schema(example = "buy")]
    pub order_type: OrderSide,

    /// 수량 (MWh, > 0)
    #[schema(value_type = String, example = "3")]
    pub amount_mwh: Decimal,

    /// 지정가 (EUR/MWh, > 0)
    #[schema(value_type = String, example = "60")]
    pub price_eur_per_mwh: Decimal,
}

/// 주문 변경 요청 (open 상태의 남은 수량/가격만 변경)
/// Request model for amending an open order
#[derive(Debug, Deserialize, ToSchema)]
#[schema(as = AmendOrderRequest)]
pub struct AmendOrderRequest {
    /// 새 남은 수량 (MWh)
    /// New remaining amount in MWh
    #[schema(value_type = Option<String>, example = "4")]
    pub amount_mwh: Option<Decimal>,

    /// 새 지정가 (EUR/MWh)
    #[schema(value_type = Option<String>, example = "55")]
    pub price_eur_per_mwh: Option<Decimal>,
}

/// 주문 목록 필터
/// Order list filter
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderFilter {
    /// 'buy' 또는 'sell'
    #[serde(rename = "type", default)]
    #[param(value_type = Option<String>)]
    pub side: Option<OrderSide>,

    /// created_at 하한 (포함, RFC 3339)
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,

    /// created_at 상한 (포함, RFC 3339)
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

impl OrderFilter {
    pub fn sells() -> Self {
        Self {
            side: Some(OrderSide::Sell),
            ..Self::default()
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.side.map_or(true, |side| order.side == side)
            && self.from.map_or(true, |from| order.created_at >= from)
            && self.to.map_or(true, |to| order.created_at <= to)
    }
}

/// 매칭 결과
/// Result of one matching run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    /// 매도 주문이 호가창에 등록됨
    Resting,
    /// 전량 체결
    Filled,
    /// 일부 체결
    PartiallyFilled,
    /// 체결 없음
    Rejected,
}

/// 주문 생성 응답
/// Response for a placed order
#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(as = PlacedOrder)]
pub struct PlacedOrder {
    pub order: Order,
    pub outcome: MatchOutcome,
    /// 이번 주문으로 발생한 체결 (매수자 기준 leg)
    /// Buyer-side legs created by this placement
    pub trades: Vec<TradeLeg>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_order(original: i64, remaining: i64) -> Order {
        let now = Utc::now();
        Order {
            id: 7,
            user_id: 1,
            side: OrderSide::Sell,
            original_amount: Decimal::new(original, 0),
            remaining_amount: Decimal::new(remaining, 0),
            limit_price: Decimal::new(50, 0),
            status: OrderStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_fill_partial_keeps_open() {
        let order = open_order(5, 5);
        let patch = OrderPatch::fill(&order, Decimal::new(3, 0)).unwrap();
        let next = patch.apply_to(&order, Utc::now()).unwrap();

        assert_eq!(next.remaining_amount, Decimal::new(2, 0));
        assert_eq!(next.status, OrderStatus::Open);
        assert!(next.is_partially_filled());
        assert_eq!(next.filled_amount(), Decimal::new(3, 0));
    }

    #[test]
    fn test_fill_to_zero_completes() {
        let order = open_order(5, 2);
        let next = OrderPatch::fill(&order, Decimal::new(2, 0))
            .unwrap()
            .apply_to(&order, Utc::now())
            .unwrap();

        assert_eq!(next.status, OrderStatus::Completed);
        assert!(next.remaining_amount.is_zero());
    }

    #[test]
    fn test_overfill_is_rejected() {
        let order = open_order(5, 2);
        let err = OrderPatch::fill(&order, Decimal::new(3, 0)).unwrap_err();
        assert!(matches!(err, MarketError::InvalidState(_)));
    }

    #[test]
    fn test_patch_on_closed_order_is_rejected() {
        let mut order = open_order(5, 5);
        order.status = OrderStatus::Canceled;

        let err = OrderPatch::cancel().apply_to(&order, Utc::now()).unwrap_err();
        assert!(matches!(err, MarketError::InvalidState(_)));
    }

    #[test]
    fn test_patch_breaking_invariants_is_rejected() {
        let order = open_order(5, 5);

        // remaining > original
        let patch = OrderPatch {
            remaining_amount: Some(Decimal::new(6, 0)),
            ..OrderPatch::default()
        };
        assert!(patch.apply_to(&order, Utc::now()).is_err());

        // open with zero remaining
        let patch = OrderPatch {
            remaining_amount: Some(Decimal::ZERO),
            ..OrderPatch::default()
        };
        assert!(patch.apply_to(&order, Utc::now()).is_err());

        // non-positive price
        let patch = OrderPatch {
            limit_price: Some(Decimal::ZERO),
            ..OrderPatch::default()
        };
        assert!(patch.apply_to(&order, Utc::now()).is_err());
    }

    #[test]
    fn test_filter_bounds_are_inclusive() {
        let order = open_order(5, 5);
        let filter = OrderFilter {
            side: Some(OrderSide::Sell),
            from: Some(order.created_at),
            to: Some(order.created_at),
        };
        assert!(filter.matches(&order));

        let buys = OrderFilter {
            side: Some(OrderSide::Buy),
            ..OrderFilter::default()
        };
        assert!(!buys.matches(&order));
    }

    #[test]
    fn test_side_json_uses_order_type_field() {
        let order = open_order(5, 5);
        let json = serde_json::to_value(&order).unwrap();

        assert_eq!(json["order_type"], "sell");
        assert_eq!(json["status"], "open");
        assert_eq!(json["id"], "7");
        assert_eq!(json["price_eur_per_mwh"], "50");
    }
}
