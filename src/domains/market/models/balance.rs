use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use rust_decimal::Decimal;

// =====================================================
// Balance 모델
// =====================================================
// 역할: 사용자별 돈(EUR)과 에너지(MWh) 잔고
// 설명: 처음 참조될 때 기본값으로 생성됩니다.
//       Ledger의 settle_trade 외에는 변경되지 않습니다.
// =====================================================

/// 사용자 잔고
/// User balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(as = Balance)]
pub struct Balance {
    pub user_id: u64,

    /// 보유 금액 (EUR)
    #[serde(rename = "money_eur")]
    #[schema(value_type = String, example = "10000")]
    pub money: Decimal,

    /// 보유 에너지 (MWh)
    #[serde(rename = "energy_mwh")]
    #[schema(value_type = String, example = "1000")]
    pub energy: Decimal,
}

impl Balance {
    /// 기본값으로 잔고 생성
    /// Create a balance holding the configured defaults
    pub fn with_defaults(user_id: u64, defaults: &BalanceDefaults) -> Self {
        Self {
            user_id,
            money: defaults.money,
            energy: defaults.energy,
        }
    }

    pub fn is_non_negative(&self) -> bool {
        self.money >= Decimal::ZERO && self.energy >= Decimal::ZERO
    }
}

/// 신규 사용자 기본 잔고
/// Defaults applied when a balance is first referenced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceDefaults {
    pub money: Decimal,
    pub energy: Decimal,
}

impl Default for BalanceDefaults {
    fn default() -> Self {
        Self {
            money: Decimal::new(10_000, 0),
            energy: Decimal::new(1_000, 0),
        }
    }
}
