// =====================================================
// MemoryStore - 인메모리 트랜잭션 저장소
// =====================================================
// 역할: DATABASE_URL 없이 실행할 때, 그리고 테스트에서 사용하는 저장소
//
// 핵심 설계:
// 1. 커밋된 상태는 RwLock 안의 스냅샷 하나 (조회는 항상 여기서)
// 2. 트랜잭션은 변경분만 따로 모아두었다가 commit 시 한 번에 반영
// 3. 쓰기 트랜잭션은 한 번에 하나 (writer gate)
// 4. 장애 주입: 테스트에서 롤백/재시도 경로를 검증하기 위함
// =====================================================

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domains::market::models::{
    Balance, BalanceDefaults, Order, OrderFilter, OrderPatch, OrderSide, OrderStatus, TradeLeg,
};
use super::store::{Store, StoreError, StoreTransaction};

#[derive(Debug, Default)]
struct MemoryState {
    orders: BTreeMap<u64, Order>,
    trades: BTreeMap<u64, TradeLeg>,
    balances: HashMap<u64, Balance>,
}

/// 주입할 장애 목록
/// Pending injected faults
#[derive(Debug, Default)]
struct FaultPlan {
    /// 남은 정상 leg 삽입 횟수. 0이 되면 다음 삽입이 실패
    trade_inserts_before_failure: Option<usize>,
    /// 반영 없이 Transient 로 실패할 commit 횟수
    transient_commit_failures: u32,
    /// 반영은 되지만 Transient 를 돌려줄 commit 횟수 (응답 유실)
    lost_commit_acks: u32,
    /// 반영 없이 Fatal 로 실패할 commit 횟수
    fatal_commit_failures: u32,
}

struct MemoryInner {
    state: RwLock<MemoryState>,
    writer: Arc<AsyncMutex<()>>,
    faults: Mutex<FaultPlan>,
}

/// 인메모리 저장소
/// In-memory transactional store
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                state: RwLock::new(MemoryState::default()),
                writer: Arc::new(AsyncMutex::new(())),
                faults: Mutex::new(FaultPlan::default()),
            }),
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 장애 주입 (테스트용)
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// `successful` 번의 leg 삽입 후 다음 삽입을 Fatal 로 실패시킴
    /// Let `successful` trade-leg inserts through, then fail the next one
    pub fn fail_trade_insert_after(&self, successful: usize) {
        self.inner.faults.lock().trade_inserts_before_failure = Some(successful);
    }

    /// 다음 `count` 번의 commit 을 Transient 로 실패시킴 (반영 안 됨)
    pub fn fail_next_commits(&self, count: u32) {
        self.inner.faults.lock().transient_commit_failures = count;
    }

    /// 다음 `count` 번의 commit 을 반영한 뒤 Transient 를 돌려줌
    /// Apply the next `count` commits but report them as failed
    pub fn lose_next_commit_acks(&self, count: u32) {
        self.inner.faults.lock().lost_commit_acks = count;
    }

    /// 다음 `count` 번의 commit 을 Fatal 로 실패시킴
    pub fn fail_next_commits_fatally(&self, count: u32) {
        self.inner.faults.lock().fatal_commit_failures = count;
    }

    pub fn clear_faults(&self) {
        *self.inner.faults.lock() = FaultPlan::default();
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 테스트/벤치 보조
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 잔고 직접 설정 (엔진을 거치지 않음)
    /// Seed a balance directly, bypassing the ledger
    pub fn seed_balance(&self, balance: Balance) {
        self.inner.state.write().balances.insert(balance.user_id, balance);
    }

    /// 커밋된 모든 잔고
    pub fn all_balances(&self) -> Vec<Balance> {
        let state = self.inner.state.read();
        let mut balances: Vec<Balance> = state.balances.values().cloned().collect();
        balances.sort_by_key(|b| b.user_id);
        balances
    }

    /// 커밋된 모든 leg
    pub fn all_trades(&self) -> Vec<TradeLeg> {
        self.inner.state.read().trades.values().cloned().collect()
    }

    /// 커밋된 모든 주문
    pub fn all_orders(&self) -> Vec<Order> {
        self.inner.state.read().orders.values().cloned().collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let gate = Arc::clone(&self.inner.writer).lock_owned().await;
        Ok(Box::new(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            _gate: gate,
            orders: HashMap::new(),
            balances: HashMap::new(),
            trades: Vec::new(),
            committed: false,
        }))
    }

    async fn get_order(&self, order_id: u64) -> Result<Option<Order>, StoreError> {
        Ok(self.inner.state.read().orders.get(&order_id).cloned())
    }

    async fn list_orders_by_user(&self, user_id: u64, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let state = self.inner.state.read();
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id && filter.matches(o))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn list_open_sells(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let state = self.inner.state.read();
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.side == OrderSide::Sell && o.status == OrderStatus::Open)
            .filter(|o| filter.from.map_or(true, |from| o.created_at >= from))
            .filter(|o| filter.to.map_or(true, |to| o.created_at <= to))
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            a.limit_price
                .cmp(&b.limit_price)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(orders)
    }

    async fn list_trades_by_user(&self, user_id: u64) -> Result<Vec<TradeLeg>, StoreError> {
        let state = self.inner.state.read();
        let mut legs: Vec<TradeLeg> = state
            .trades
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        legs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(legs)
    }

    async fn get_balance(&self, user_id: u64) -> Result<Option<Balance>, StoreError> {
        Ok(self.inner.state.read().balances.get(&user_id).cloned())
    }

    async fn max_order_id(&self) -> Result<u64, StoreError> {
        Ok(self.inner.state.read().orders.keys().next_back().copied().unwrap_or(0))
    }

    async fn max_trade_id(&self) -> Result<u64, StoreError> {
        Ok(self.inner.state.read().trades.keys().next_back().copied().unwrap_or(0))
    }
}

/// 인메모리 트랜잭션
/// Staged writes over the committed snapshot
struct MemoryTransaction {
    inner: Arc<MemoryInner>,
    _gate: OwnedMutexGuard<()>,
    orders: HashMap<u64, Order>,
    balances: HashMap<u64, Balance>,
    trades: Vec<TradeLeg>,
    committed: bool,
}

impl MemoryTransaction {
    fn current_order(&self, order_id: u64) -> Option<Order> {
        self.orders
            .get(&order_id)
            .cloned()
            .or_else(|| self.inner.state.read().orders.get(&order_id).cloned())
    }

    fn ensure_active(&self) -> Result<(), StoreError> {
        if self.committed {
            return Err(StoreError::Fatal("transaction already committed".to_string()));
        }
        Ok(())
    }

    fn apply(&mut self) {
        let mut state = self.inner.state.write();
        for (id, order) in self.orders.drain() {
            state.orders.insert(id, order);
        }
        for (user_id, balance) in self.balances.drain() {
            state.balances.insert(user_id, balance);
        }
        for leg in self.trades.drain(..) {
            state.trades.insert(leg.id, leg);
        }
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn balance_for_update(&mut self, user_id: u64, defaults: &BalanceDefaults) -> Result<Balance, StoreError> {
        self.ensure_active()?;
        if let Some(balance) = self.balances.get(&user_id) {
            return Ok(balance.clone());
        }
        let balance = self
            .inner
            .state
            .read()
            .balances
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| Balance::with_defaults(user_id, defaults));
        self.balances.insert(user_id, balance.clone());
        Ok(balance)
    }

    async fn save_balance(&mut self, balance: &Balance) -> Result<(), StoreError> {
        self.ensure_active()?;
        self.balances.insert(balance.user_id, balance.clone());
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        self.ensure_active()?;
        if self.current_order(order.id).is_some() {
            return Err(StoreError::Fatal(format!("order {} already exists", order.id)));
        }
        self.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn order_for_update(&mut self, order_id: u64) -> Result<Option<Order>, StoreError> {
        self.ensure_active()?;
        Ok(self.current_order(order_id))
    }

    async fn update_order(&mut self, order_id: u64, patch: &OrderPatch, updated_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.ensure_active()?;
        let current = self
            .current_order(order_id)
            .ok_or_else(|| StoreError::Fatal(format!("order {} does not exist", order_id)))?;
        let next = patch
            .apply_to(&current, updated_at)
            .map_err(|e| StoreError::Fatal(e.to_string()))?;
        self.orders.insert(order_id, next);
        Ok(())
    }

    async fn insert_trade_leg(&mut self, leg: &TradeLeg) -> Result<(), StoreError> {
        self.ensure_active()?;
        {
            let mut faults = self.inner.faults.lock();
            match faults.trade_inserts_before_failure {
                Some(0) => {
                    faults.trade_inserts_before_failure = None;
                    return Err(StoreError::Fatal(format!("injected failure inserting trade leg {}", leg.id)));
                }
                Some(n) => faults.trade_inserts_before_failure = Some(n - 1),
                None => {}
            }
        }
        let exists = self.trades.iter().any(|t| t.id == leg.id)
            || self.inner.state.read().trades.contains_key(&leg.id);
        if exists {
            return Err(StoreError::Fatal(format!("trade leg {} already exists", leg.id)));
        }
        self.trades.push(leg.clone());
        Ok(())
    }

    async fn settlement_legs(&mut self, settlement_id: Uuid) -> Result<Vec<TradeLeg>, StoreError> {
        self.ensure_active()?;
        let mut legs: Vec<TradeLeg> = self
            .inner
            .state
            .read()
            .trades
            .values()
            .filter(|t| t.settlement_id == settlement_id)
            .cloned()
            .collect();
        legs.extend(self.trades.iter().filter(|t| t.settlement_id == settlement_id).cloned());
        legs.sort_by_key(|t| t.id);
        Ok(legs)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_active()?;
        let inner = Arc::clone(&self.inner);
        let fault = {
            let mut faults = inner.faults.lock();
            if faults.fatal_commit_failures > 0 {
                faults.fatal_commit_failures -= 1;
                Some(StoreError::Fatal("injected fatal commit failure".to_string()))
            } else if faults.transient_commit_failures > 0 {
                faults.transient_commit_failures -= 1;
                Some(StoreError::Transient("injected commit failure".to_string()))
            } else if faults.lost_commit_acks > 0 {
                faults.lost_commit_acks -= 1;
                self.apply();
                Some(StoreError::Transient("commit acknowledgement lost".to_string()))
            } else {
                None
            }
        };
        if let Some(err) = fault {
            // 실패한 트랜잭션은 더 이상 사용할 수 없음
            self.committed = true;
            return Err(err);
        }
        self.apply();
        self.committed = true;
        Ok(())
    }
}
