// =====================================================
// Store - 트랜잭션 저장소 추상화
// =====================================================
// 역할: 엔진이 사용하는 영속 계층 인터페이스
//
// 구조:
// - Store: 커밋된 스냅샷 조회 + 트랜잭션 시작
// - StoreTransaction: 한 번의 원자적 작업 단위
//
// 규칙:
// - commit() 하지 않고 drop 된 트랜잭션은 모두 롤백됩니다.
// - 조회(Store의 get/list)는 커밋된 데이터만 봅니다.
//   진행 중인 매칭의 중간 상태는 보이지 않습니다.
// =====================================================

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::domains::market::models::{Balance, BalanceDefaults, Order, OrderFilter, OrderPatch, TradeLeg};

/// 저장소 에러
/// Store errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// 재시도하면 성공할 수 있는 오류 (직렬화 실패, 연결 끊김, 커밋 응답 유실)
    /// Transient failure; the same operation may be retried
    #[error("transient store failure: {0}")]
    Transient(String),

    /// 재시도해도 소용없는 오류
    /// Fatal failure
    #[error("store failure: {0}")]
    Fatal(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// 저장소
/// Transactional store
#[async_trait]
pub trait Store: Send + Sync {
    /// 트랜잭션 시작
    /// Begin a transaction. Writers are serialized by the store.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 커밋된 스냅샷 조회
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn get_order(&self, order_id: u64) -> Result<Option<Order>, StoreError>;

    /// 사용자 주문 목록 (created_at 내림차순)
    /// Orders of one user, newest first
    async fn list_orders_by_user(&self, user_id: u64, filter: &OrderFilter) -> Result<Vec<Order>, StoreError>;

    /// open 매도 주문 목록 (가격 오름차순, created_at 오름차순)
    /// Open sell orders in price-time priority
    async fn list_open_sells(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError>;

    /// 사용자 체결 leg 목록 (created_at 내림차순)
    /// Trade legs of one user, newest first
    async fn list_trades_by_user(&self, user_id: u64) -> Result<Vec<TradeLeg>, StoreError>;

    async fn get_balance(&self, user_id: u64) -> Result<Option<Balance>, StoreError>;

    async fn max_order_id(&self) -> Result<u64, StoreError>;

    async fn max_trade_id(&self) -> Result<u64, StoreError>;
}

/// 저장소 트랜잭션
/// One atomic unit of work. Dropping it without `commit` rolls everything back.
#[async_trait]
pub trait StoreTransaction: Send {
    /// 잔고 잠금 조회 (없으면 기본값으로 생성)
    /// Lock the user's balance row, creating it with defaults if absent
    async fn balance_for_update(&mut self, user_id: u64, defaults: &BalanceDefaults) -> Result<Balance, StoreError>;

    async fn save_balance(&mut self, balance: &Balance) -> Result<(), StoreError>;

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError>;

    /// 주문 잠금 조회
    /// Lock and read an order
    async fn order_for_update(&mut self, order_id: u64) -> Result<Option<Order>, StoreError>;

    /// 검증된 패치 적용
    /// Write a patch already validated with `OrderPatch::apply_to`
    async fn update_order(&mut self, order_id: u64, patch: &OrderPatch, updated_at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn insert_trade_leg(&mut self, leg: &TradeLeg) -> Result<(), StoreError>;

    /// 체결 식별자로 기록된 leg 조회 (중복 적용 방지)
    /// Legs already recorded under a settlement id
    async fn settlement_legs(&mut self, settlement_id: Uuid) -> Result<Vec<TradeLeg>, StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;
}
