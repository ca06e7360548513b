// =====================================================
// EngineConfig - 매칭 엔진 설정
// =====================================================
// 환경 변수:
// - ENGINE_QUEUE_CAPACITY       명령 대기열 크기 (기본값: 10000)
// - ENGINE_MAX_COMMIT_ATTEMPTS  트랜잭션 재시도 횟수 (기본값: 3)
// - UNFILLED_BUY_POLICY         keep_open | cancel (기본값: keep_open)
// - DEFAULT_MONEY_EUR           신규 사용자 기본 금액 (기본값: 10000)
// - DEFAULT_ENERGY_MWH          신규 사용자 기본 에너지 (기본값: 1000)
// =====================================================

use rust_decimal::Decimal;

use crate::domains::market::engine::types::UnfilledBuyPolicy;
use crate::domains::market::models::BalanceDefaults;
use crate::shared::config::{parse_or, ConfigSource, EnvSource};

/// 엔진 설정
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// 명령 대기열 크기 (가득 차면 ConcurrencyConflict)
    pub queue_capacity: usize,
    /// Transient 저장소 오류 시 최대 시도 횟수 (최소 1)
    pub max_commit_attempts: u32,
    pub unfilled_buy_policy: UnfilledBuyPolicy,
    pub balance_defaults: BalanceDefaults,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            max_commit_attempts: 3,
            unfilled_buy_policy: UnfilledBuyPolicy::default(),
            balance_defaults: BalanceDefaults::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_source(&EnvSource)
    }

    pub fn from_source(source: &dyn ConfigSource) -> Self {
        let defaults = Self::default();
        Self {
            queue_capacity: parse_or(source, "ENGINE_QUEUE_CAPACITY", defaults.queue_capacity).max(1),
            max_commit_attempts: parse_or(source, "ENGINE_MAX_COMMIT_ATTEMPTS", defaults.max_commit_attempts).max(1),
            unfilled_buy_policy: parse_or(source, "UNFILLED_BUY_POLICY", defaults.unfilled_buy_policy),
            balance_defaults: BalanceDefaults {
                money: parse_or(source, "DEFAULT_MONEY_EUR", defaults.balance_defaults.money),
                energy: parse_or(source, "DEFAULT_ENERGY_MWH", defaults.balance_defaults.energy),
            },
        }
    }

    pub fn with_policy(mut self, policy: UnfilledBuyPolicy) -> Self {
        self.unfilled_buy_policy = policy;
        self
    }

    pub fn with_balance_defaults(mut self, money: Decimal, energy: Decimal) -> Self {
        self.balance_defaults = BalanceDefaults { money, energy };
        self
    }
}
