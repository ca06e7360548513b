// =====================================================
// 통합 테스트 공통 헬퍼
// =====================================================
// 목적: 모든 통합 테스트에서 공통으로 사용하는 셋업/티어다운 함수 제공
//
// 구성:
// - MemoryStore (장애 주입 가능)
// - ManualClock (호출마다 1초씩 전진 → created_at 순서 보장)
// - MatchingEngine (시작된 상태) + 서비스들
// =====================================================
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use energy_market::domains::market::engine::{Engine, EngineConfig, MatchingEngine, OrderEntry};
use energy_market::domains::market::models::{
    Balance, Order, OrderSide, PlaceOrderRequest, PlacedOrder,
};
use energy_market::domains::market::services::{BalanceService, OrderService, TradeService};
use energy_market::shared::database::{MemoryStore, Store};
use energy_market::shared::errors::MarketError;
use energy_market::shared::services::AppState;
use energy_market::shared::utils::clock::ManualClock;

// 테스트용 사용자
pub const USER_A: u64 = 1;
pub const USER_B: u64 = 2;
pub const USER_C: u64 = 3;

/// 테스트 컨텍스트
pub struct TestContext {
    pub store: MemoryStore,
    pub clock: Arc<ManualClock>,
    pub engine: Arc<MatchingEngine>,
    pub config: EngineConfig,
    pub orders: OrderService,
    pub trades: TradeService,
    pub balances: BalanceService,
}

impl TestContext {
    /// HTTP 테스트용 AppState (같은 저장소/엔진 공유)
    pub fn app_state(&self) -> AppState {
        AppState::with_engine(
            Arc::new(self.store.clone()),
            self.engine.clone(),
            self.config.balance_defaults,
        )
    }
}

pub fn d(value: i64) -> Decimal {
    Decimal::new(value, 0)
}

/// 테스트 전 초기화 (기본 설정)
pub async fn setup_test() -> TestContext {
    setup_test_with(EngineConfig::default()).await
}

/// 테스트 전 초기화
///
/// 저장소 생성 → 엔진 생성 및 시작 → 서비스 구성
pub async fn setup_test_with(config: EngineConfig) -> TestContext {
    setup_test_on(MemoryStore::new(), config).await
}

/// 기존 저장소 위에서 초기화 (재시작 시나리오)
pub async fn setup_test_on(store: MemoryStore, config: EngineConfig) -> TestContext {
    let clock = Arc::new(ManualClock::with_step(
        Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        Duration::seconds(1),
    ));
    let shared_store: Arc<dyn Store> = Arc::new(store.clone());
    let engine = Arc::new(MatchingEngine::with_clock(
        Arc::clone(&shared_store),
        clock.clone(),
        config.clone(),
    ));
    engine.start().await.expect("Failed to start engine");

    let defaults = config.balance_defaults;
    TestContext {
        orders: OrderService::new(Arc::clone(&shared_store), engine.clone(), defaults),
        trades: TradeService::new(Arc::clone(&shared_store)),
        balances: BalanceService::new(shared_store, defaults),
        store,
        clock,
        engine,
        config,
    }
}

/// 테스트 후 정리 (엔진 중지)
pub async fn teardown_test(ctx: &TestContext) {
    ctx.engine.stop().await.expect("Failed to stop engine");
}

pub fn order_request(side: OrderSide, amount: Decimal, price: Decimal) -> PlaceOrderRequest {
    PlaceOrderRequest {
        order_type: side,
        amount_mwh: amount,
        price_eur_per_mwh: price,
    }
}

pub async fn place(
    ctx: &TestContext,
    user_id: u64,
    side: OrderSide,
    amount: i64,
    price: i64,
) -> Result<PlacedOrder, MarketError> {
    ctx.orders
        .place_order(user_id, order_request(side, d(amount), d(price)))
        .await
}

pub async fn sell(ctx: &TestContext, user_id: u64, amount: i64, price: i64) -> PlacedOrder {
    place(ctx, user_id, OrderSide::Sell, amount, price)
        .await
        .expect("Failed to place sell order")
}

pub async fn buy(ctx: &TestContext, user_id: u64, amount: i64, price: i64) -> PlacedOrder {
    place(ctx, user_id, OrderSide::Buy, amount, price)
        .await
        .expect("Failed to place buy order")
}

pub async fn balance(ctx: &TestContext, user_id: u64) -> Balance {
    ctx.balances.get_balance(user_id).await.expect("Failed to read balance")
}

pub async fn order(ctx: &TestContext, order_id: u64) -> Order {
    ctx.store
        .get_order(order_id)
        .await
        .expect("Failed to read order")
        .expect("Order not found")
}

/// 엔진 호가창 ID 목록 (우선순위 순)
pub async fn book_ids(ctx: &TestContext) -> Vec<u64> {
    ctx.engine
        .resting_sells()
        .await
        .expect("Failed to read order book")
        .into_iter()
        .map(|o| o.id)
        .collect()
}

/// 엔진 호가창 전체 (우선순위 순)
pub async fn resting(ctx: &TestContext) -> Vec<OrderEntry> {
    ctx.engine
        .resting_sells()
        .await
        .expect("Failed to read order book")
}
