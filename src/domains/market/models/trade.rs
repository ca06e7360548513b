use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domains::market::models::order::{OrderSide, serialize_u64_as_string, deserialize_string_to_u64};

// =====================================================
// TradeLeg 모델
// =====================================================
// 역할: 체결 1건에서 한쪽 당사자(매수자 또는 매도자)의 기록
// 설명: 한 번의 체결은 같은 amount/price/total, 같은 settlement_id를 가진
//       두 개의 leg를 만듭니다 (buy leg, sell leg). 생성 후 변경되지 않습니다.
// =====================================================

/// 체결 leg (거래 내역)
/// Trade leg (one party's half of a settled match)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(as = TradeLeg)]
pub struct TradeLeg {
    /// 체결 leg ID
    #[serde(serialize_with = "serialize_u64_as_string", deserialize_with = "deserialize_string_to_u64")]
    #[schema(value_type = String, example = "1001")]
    pub id: u64,

    /// leg 소유자
    /// Owner of this leg
    pub user_id: u64,

    /// 이 leg가 생성된 주문 (주문 없이 기록된 leg는 None)
    /// Order this leg was generated against
    pub order_id: Option<u64>,

    /// 'buy' (매수자 leg) 또는 'sell' (매도자 leg)
    #[serde(rename = "transaction_type")]
    pub side: OrderSide,

    /// 체결 수량 (MWh)
    #[serde(rename = "amount_mwh")]
    #[schema(value_type = String, example = "3")]
    pub amount: Decimal,

    /// 체결 가격 (EUR/MWh, 항상 매도 주문 가격)
    /// Execution price (always the resting sell order's price)
    #[serde(rename = "price_eur_per_mwh")]
    #[schema(value_type = String, example = "50")]
    pub price: Decimal,

    /// amount × price
    #[serde(rename = "total_eur")]
    #[schema(value_type = String, example = "150")]
    pub total: Decimal,

    /// 두 leg가 공유하는 체결 식별자 (재시도 시 중복 적용 방지)
    /// Settlement identity shared by both legs of one match
    pub settlement_id: Uuid,

    pub created_at: DateTime<Utc>,
}
