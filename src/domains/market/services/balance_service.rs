use std::sync::Arc;

use crate::domains::market::models::{Balance, BalanceDefaults};
use crate::shared::database::Store;
use crate::shared::errors::MarketError;

/// 잔고 서비스
/// Balance Service
///
/// 조회 전용입니다. 잔고는 체결 정산(Ledger)으로만 변경됩니다.
#[derive(Clone)]
pub struct BalanceService {
    store: Arc<dyn Store>,
    defaults: BalanceDefaults,
}

impl BalanceService {
    pub fn new(store: Arc<dyn Store>, defaults: BalanceDefaults) -> Self {
        Self { store, defaults }
    }

    /// 잔고 조회
    /// Get balance, reporting the defaults for a user never referenced before
    ///
    /// 기본값 잔고는 조회만으로 저장되지 않습니다.
    pub async fn get_balance(&self, user_id: u64) -> Result<Balance, MarketError> {
        let balance = self
            .store
            .get_balance(user_id)
            .await?
            .unwrap_or_else(|| Balance::with_defaults(user_id, &self.defaults));
        Ok(balance)
    }
}
