use std::sync::Arc;

use crate::domains::market::models::TradeLeg;
use crate::shared::database::Store;
use crate::shared::errors::MarketError;

/// 체결 내역 서비스
/// Trade history service
#[derive(Clone)]
pub struct TradeService {
    store: Arc<dyn Store>,
}

impl TradeService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// 사용자 체결 leg 목록 (최신순)
    /// Trade legs of the user, newest first
    pub async fn list_trades(&self, user_id: u64) -> Result<Vec<TradeLeg>, MarketError> {
        Ok(self.store.list_trades_by_user(user_id).await?)
    }
}
