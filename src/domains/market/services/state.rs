// Market domain state
// 마켓 도메인 상태
use std::sync::Arc;

use crate::domains::market::engine::Engine;
use crate::domains::market::models::BalanceDefaults;
use crate::domains::market::services::{BalanceService, OrderService, TradeService};
use crate::shared::database::Store;

/// Market domain state
/// 마켓 도메인에서 필요한 서비스들을 포함하는 상태
#[derive(Clone)]
pub struct MarketState {
    pub order_service: OrderService,
    pub trade_service: TradeService,
    pub balance_service: BalanceService,
    pub engine: Arc<dyn Engine>,
}

impl MarketState {
    /// Create MarketState with a store and a started (or to-be-started) engine
    pub fn new(store: Arc<dyn Store>, engine: Arc<dyn Engine>, defaults: BalanceDefaults) -> Self {
        Self {
            order_service: OrderService::new(Arc::clone(&store), Arc::clone(&engine), defaults),
            trade_service: TradeService::new(Arc::clone(&store)),
            balance_service: BalanceService::new(store, defaults),
            engine,
        }
    }
}
