use std::sync::Arc;

use crate::domains::market::engine::{Engine, EngineConfig, MatchingEngine};
use crate::domains::market::models::BalanceDefaults;
use crate::domains::market::services::MarketState;
use crate::shared::database::Store;

/// Application state
/// 애플리케이션 상태
///
/// 저장소와 엔진은 하나씩만 생성하고 모든 곳에서 공유합니다.
#[derive(Clone)]
pub struct AppState {
    /// 저장소 (공유)
    pub store: Arc<dyn Store>,
    pub market_state: MarketState,
    /// 엔진 인스턴스 (시작/정지용)
    /// Engine instance (for start/stop)
    pub engine: Arc<dyn Engine>,
}

impl AppState {
    /// 저장소와 엔진 설정으로 상태 생성 (엔진은 아직 시작 전)
    pub fn new(store: Arc<dyn Store>, engine_config: EngineConfig) -> Self {
        let defaults = engine_config.balance_defaults;
        let engine: Arc<dyn Engine> = Arc::new(MatchingEngine::new(Arc::clone(&store), engine_config));
        Self::with_engine(store, engine, defaults)
    }

    /// 이미 만들어진 엔진으로 상태 생성
    pub fn with_engine(store: Arc<dyn Store>, engine: Arc<dyn Engine>, defaults: BalanceDefaults) -> Self {
        let market_state = MarketState::new(Arc::clone(&store), Arc::clone(&engine), defaults);
        Self {
            store,
            market_state,
            engine,
        }
    }
}
