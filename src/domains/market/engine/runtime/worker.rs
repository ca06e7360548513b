// =====================================================
// EngineWorker - 매칭 워커
// =====================================================
// 역할: 호가창을 단독으로 소유하고 명령을 하나씩 순서대로 처리
//
// 처리 원칙:
// 1. 주문 1건 = 트랜잭션 1개 (주문 저장, 체결별 정산, 최종 상태)
// 2. 호가창은 커밋 성공 후에만 변경
// 3. Transient 오류는 같은 ID/같은 계획으로 재시도
//    - 이전 시도가 실제로 커밋되었는지 먼저 확인 (응답 유실)
//    - 정산은 settlement_id 로 중복 적용되지 않음
// 4. 그 외 오류는 롤백 후 그대로 반환
// =====================================================

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domains::market::engine::ledger::Ledger;
use crate::domains::market::engine::matcher::Matcher;
use crate::domains::market::engine::orderbook::OrderBook;
use crate::domains::market::engine::types::{
    Amendment, NewOrder, OrderEntry, Settlement, TxError, UnfilledBuyPolicy,
};
use crate::domains::market::models::{
    MatchOutcome, Order, OrderPatch, OrderSide, OrderStatus, PlacedOrder, TradeLeg,
};
use crate::shared::database::{Store, StoreTransaction};
use crate::shared::errors::MarketError;
use crate::shared::utils::clock::Clock;
use crate::shared::utils::id_generator::IdGenerator;

use super::commands::EngineCommand;
use super::config::EngineConfig;

/// 매칭 워커
pub struct EngineWorker {
    store: Arc<dyn Store>,
    book: OrderBook,
    matcher: Matcher,
    ledger: Ledger,
    clock: Arc<dyn Clock>,
    order_ids: IdGenerator,
    trade_ids: IdGenerator,
    config: EngineConfig,
}

impl EngineWorker {
    pub fn new(
        store: Arc<dyn Store>,
        book: OrderBook,
        clock: Arc<dyn Clock>,
        order_ids: IdGenerator,
        trade_ids: IdGenerator,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            book,
            matcher: Matcher::new(),
            ledger: Ledger::new(config.balance_defaults),
            clock,
            order_ids,
            trade_ids,
            config,
        }
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// 워커 루프 (송신측이 모두 닫히면 종료)
    pub async fn run(mut self, mut commands: mpsc::Receiver<EngineCommand>) {
        info!(resting = self.book.len(), "matching worker started");
        while let Some(command) = commands.recv().await {
            self.handle(command).await;
        }
        info!(resting = self.book.len(), "matching worker stopped");
    }

    pub async fn handle(&mut self, command: EngineCommand) {
        if command.is_abandoned() {
            debug!("skipping command whose caller went away");
            return;
        }
        match command {
            EngineCommand::PlaceOrder { request, response } => {
                let result = self.place_order(request).await;
                let _ = response.send(result);
            }
            EngineCommand::CancelOrder { order_id, user_id, response } => {
                let result = self.cancel_order(order_id, user_id).await;
                let _ = response.send(result);
            }
            EngineCommand::AmendOrder { order_id, user_id, amendment, response } => {
                let result = self.amend_order(order_id, user_id, amendment).await;
                let _ = response.send(result);
            }
            EngineCommand::RestingSells { response } => {
                let _ = response.send(Ok(self.book.iter().cloned().collect()));
            }
        }
    }

    // =====================================================
    // 주문 생성
    // =====================================================

    pub async fn place_order(&mut self, request: NewOrder) -> Result<PlacedOrder, MarketError> {
        validate_new_order(&request)?;

        let now = self.clock.now();
        let order = Order {
            id: self.order_ids.next(),
            user_id: request.user_id,
            side: request.side,
            original_amount: request.amount,
            remaining_amount: request.amount,
            limit_price: request.price,
            status: OrderStatus::Open,
            created_at: now,
            updated_at: now,
        };

        // 계획과 ID는 한 번만 정함 (재시도 시 그대로 사용)
        let plan = self.matcher.plan(&order, &self.book);
        let settlements: Vec<Settlement> = plan
            .fills
            .iter()
            .map(|fill| Settlement {
                settlement_id: Uuid::new_v4(),
                buyer_id: order.user_id,
                seller_id: fill.seller_id,
                amount: fill.amount,
                price: fill.price,
                buy_order_id: order.id,
                sell_order_id: fill.sell_order_id,
                buyer_leg_id: self.trade_ids.next(),
                seller_leg_id: self.trade_ids.next(),
                created_at: now,
            })
            .collect();

        let mut attempt = 1;
        let placed = loop {
            match self.try_place(&order, &settlements, attempt > 1).await {
                Ok(placed) => break placed,
                Err(err) if self.should_retry(&err, attempt, order.id) => attempt += 1,
                Err(err) => {
                    warn!(order_id = order.id, user_id = order.user_id, error = ?err, "order placement rolled back");
                    return Err(err.into_market());
                }
            }
        };

        self.apply_placement(&placed, &settlements);
        // 벤치마크에서는 주문별 로그 생략
        #[cfg(not(feature = "bench_mode"))]
        info!(
            order_id = placed.order.id,
            user_id = placed.order.user_id,
            side = %placed.order.side,
            outcome = ?placed.outcome,
            trades = placed.trades.len(),
            "order placed"
        );
        Ok(placed)
    }

    async fn try_place(
        &self,
        order: &Order,
        settlements: &[Settlement],
        retrying: bool,
    ) -> Result<PlacedOrder, TxError> {
        let mut tx = self.store.begin().await?;

        if retrying {
            if let Some(existing) = tx.order_for_update(order.id).await? {
                debug!(order_id = order.id, "previous placement attempt was committed");
                return Self::recover_placement(tx.as_mut(), existing, settlements).await;
            }
        }

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // 1. 잔고 재확인 (잠금 상태)
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

        let balance = tx.balance_for_update(order.user_id, self.ledger.defaults()).await?;
        let sufficient = match order.side {
            OrderSide::Buy => balance.money >= order.remaining_amount * order.limit_price,
            OrderSide::Sell => balance.energy >= order.remaining_amount,
        };
        if !sufficient {
            return Err(MarketError::ConcurrencyConflict(format!(
                "balance of user {} changed before order placement", order.user_id
            ))
            .into());
        }

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // 2. 주문 저장 + 체결별 정산
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

        tx.insert_order(order).await?;

        let mut trades = Vec::with_capacity(settlements.len());
        for settlement in settlements {
            let settled = self
                .ledger
                .settle_trade(tx.as_mut(), settlement)
                .await
                .map_err(|err| stale_sell_conflict(settlement, err))?;
            trades.push(settled.buyer_leg);
        }

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // 3. 매수 주문 최종 상태
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

        let (final_order, outcome) = match order.side {
            OrderSide::Sell => (order.clone(), MatchOutcome::Resting),
            OrderSide::Buy => {
                let filled: Decimal = settlements.iter().map(|s| s.amount).sum();
                let patch = final_buy_patch(order, filled, self.config.unfilled_buy_policy);
                let final_order = if patch.is_empty() {
                    order.clone()
                } else {
                    let next = patch.apply_to(order, order.updated_at)?;
                    tx.update_order(order.id, &patch, order.updated_at).await?;
                    next
                };
                let outcome = buy_outcome(filled, &final_order);
                (final_order, outcome)
            }
        };

        tx.commit().await?;
        Ok(PlacedOrder { order: final_order, outcome, trades })
    }

    /// 이미 커밋된 주문 생성 결과 복원
    async fn recover_placement(
        tx: &mut dyn StoreTransaction,
        existing: Order,
        settlements: &[Settlement],
    ) -> Result<PlacedOrder, TxError> {
        let mut trades: Vec<TradeLeg> = Vec::with_capacity(settlements.len());
        for settlement in settlements {
            let legs = tx.settlement_legs(settlement.settlement_id).await?;
            trades.extend(legs.into_iter().filter(|leg| leg.side == OrderSide::Buy));
        }
        let outcome = match existing.side {
            OrderSide::Sell => MatchOutcome::Resting,
            OrderSide::Buy => {
                let filled: Decimal = trades.iter().map(|t| t.amount).sum();
                buy_outcome(filled, &existing)
            }
        };
        Ok(PlacedOrder { order: existing, outcome, trades })
    }

    /// 커밋된 결과를 호가창에 반영
    fn apply_placement(&mut self, placed: &PlacedOrder, settlements: &[Settlement]) {
        match placed.order.side {
            OrderSide::Sell => {
                if placed.order.is_open() {
                    if let Err(e) = self.book.insert(OrderEntry::from(&placed.order)) {
                        error!(order_id = placed.order.id, error = %e, "failed to rest committed sell order");
                    }
                }
            }
            OrderSide::Buy => {
                for settlement in settlements {
                    if let Err(e) = self.book.consume(settlement.sell_order_id, settlement.amount) {
                        error!(order_id = settlement.sell_order_id, error = %e, "order book out of sync with store");
                    }
                }
            }
        }
    }

    // =====================================================
    // 주문 취소
    // =====================================================

    pub async fn cancel_order(&mut self, order_id: u64, user_id: u64) -> Result<Order, MarketError> {
        let mut attempt = 1;
        let canceled = loop {
            match self.try_cancel(order_id, user_id, attempt > 1).await {
                Ok(order) => break order,
                Err(err) if self.should_retry(&err, attempt, order_id) => attempt += 1,
                Err(err) => return Err(err.into_market()),
            }
        };

        if canceled.side == OrderSide::Sell {
            self.book.remove(order_id);
        }
        info!(order_id, user_id, "order canceled");
        Ok(canceled)
    }

    async fn try_cancel(&self, order_id: u64, user_id: u64, retrying: bool) -> Result<Order, TxError> {
        let mut tx = self.store.begin().await?;
        let order = Self::owned_order(tx.as_mut(), order_id, user_id).await?;

        // 이전 시도가 커밋됨 (워커는 순차 처리이므로 다른 요청일 수 없음)
        if retrying && order.status == OrderStatus::Canceled {
            return Ok(order);
        }

        let now = self.clock.now();
        let patch = OrderPatch::cancel();
        let next = patch.apply_to(&order, now)?;
        tx.update_order(order_id, &patch, now).await?;
        tx.commit().await?;
        Ok(next)
    }

    // =====================================================
    // 주문 변경
    // =====================================================

    /// 남은 수량/가격 변경. 매칭은 다시 일어나지 않습니다.
    ///
    /// 가격 변경이나 수량 감소는 시간 우선순위를 유지하고,
    /// 수량을 늘리면 created_at 이 변경 시각으로 바뀌어 같은 가격의 기존 주문 뒤로 갑니다.
    pub async fn amend_order(
        &mut self,
        order_id: u64,
        user_id: u64,
        amendment: Amendment,
    ) -> Result<Order, MarketError> {
        amendment.validate()?;

        let mut attempt = 1;
        let amended = loop {
            match self.try_amend(order_id, user_id, &amendment).await {
                Ok(order) => break order,
                Err(err) if self.should_retry(&err, attempt, order_id) => attempt += 1,
                Err(err) => return Err(err.into_market()),
            }
        };

        if amended.side == OrderSide::Sell {
            if let Err(e) = self.book.amend(OrderEntry::from(&amended)) {
                error!(order_id, error = %e, "order book out of sync with store");
            }
        }
        info!(
            order_id,
            user_id,
            remaining = %amended.remaining_amount,
            price = %amended.limit_price,
            "order amended"
        );
        Ok(amended)
    }

    async fn try_amend(&self, order_id: u64, user_id: u64, amendment: &Amendment) -> Result<Order, TxError> {
        let mut tx = self.store.begin().await?;
        let order = Self::owned_order(tx.as_mut(), order_id, user_id).await?;
        if !order.is_open() {
            return Err(MarketError::InvalidState(format!("order {} is {}", order_id, order.status)).into());
        }

        let remaining = amendment.amount.unwrap_or(order.remaining_amount);
        let price = amendment.price.unwrap_or(order.limit_price);

        let balance = tx.balance_for_update(user_id, self.ledger.defaults()).await?;
        match order.side {
            OrderSide::Buy => {
                let required = remaining * price;
                if balance.money < required {
                    return Err(MarketError::InsufficientFunds {
                        user_id,
                        required,
                        available: balance.money,
                    }
                    .into());
                }
            }
            OrderSide::Sell => {
                if balance.energy < remaining {
                    return Err(MarketError::InsufficientEnergy {
                        user_id,
                        required: remaining,
                        available: balance.energy,
                    }
                    .into());
                }
            }
        }

        let now = self.clock.now();
        let patch = OrderPatch {
            remaining_amount: Some(remaining),
            original_amount: Some(order.filled_amount() + remaining),
            limit_price: Some(price),
            status: None,
            // 수량 증가는 새로 들어온 주문으로 취급
            created_at: (remaining > order.remaining_amount).then_some(now),
        };
        let next = patch.apply_to(&order, now)?;
        tx.update_order(order_id, &patch, now).await?;
        tx.commit().await?;
        Ok(next)
    }

    // =====================================================
    // 공통
    // =====================================================

    /// 주문 잠금 조회 + 소유자 확인
    async fn owned_order(tx: &mut dyn StoreTransaction, order_id: u64, user_id: u64) -> Result<Order, TxError> {
        let order = tx
            .order_for_update(order_id)
            .await?
            .ok_or(MarketError::NotFound { id: order_id })?;
        if order.user_id != user_id {
            return Err(MarketError::Unauthorized { order_id, user_id }.into());
        }
        Ok(order)
    }

    fn should_retry(&self, err: &TxError, attempt: u32, order_id: u64) -> bool {
        if err.is_transient() && attempt < self.config.max_commit_attempts {
            warn!(order_id, attempt, error = ?err, "transient store failure, retrying");
            return true;
        }
        false
    }
}

fn validate_new_order(request: &NewOrder) -> Result<(), MarketError> {
    if request.amount <= Decimal::ZERO {
        return Err(MarketError::Validation("amount must be positive".to_string()));
    }
    if request.price <= Decimal::ZERO {
        return Err(MarketError::Validation("price must be positive".to_string()));
    }
    Ok(())
}

/// 매도자 에너지 부족은 매수자에게 매도 주문 ID만 알림 (매도자 잔고는 로그에만)
fn stale_sell_conflict(settlement: &Settlement, err: TxError) -> TxError {
    match err {
        TxError::Market(MarketError::InsufficientEnergy { user_id, required, available })
            if user_id == settlement.seller_id =>
        {
            warn!(
                sell_order_id = settlement.sell_order_id,
                seller_id = user_id,
                required = %required,
                available = %available,
                "resting sell order is no longer covered by seller energy"
            );
            MarketError::ConcurrencyConflict(format!(
                "resting sell order {} can no longer be filled",
                settlement.sell_order_id
            ))
            .into()
        }
        other => other,
    }
}

/// 매칭 후 매수 주문에 기록할 패치
fn final_buy_patch(order: &Order, filled: Decimal, policy: UnfilledBuyPolicy) -> OrderPatch {
    let remaining = order.remaining_amount - filled;
    let status = if remaining.is_zero() {
        Some(OrderStatus::Completed)
    } else if policy == UnfilledBuyPolicy::Cancel {
        Some(OrderStatus::Canceled)
    } else {
        None
    };
    OrderPatch {
        remaining_amount: (filled > Decimal::ZERO).then_some(remaining),
        status,
        ..OrderPatch::default()
    }
}

fn buy_outcome(filled: Decimal, order: &Order) -> MatchOutcome {
    if filled.is_zero() {
        MatchOutcome::Rejected
    } else if order.remaining_amount.is_zero() {
        MatchOutcome::Filled
    } else {
        MatchOutcome::PartiallyFilled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    use tokio::sync::oneshot;

    use crate::domains::market::models::Balance;
    use crate::shared::database::MemoryStore;
    use crate::shared::utils::clock::ManualClock;

    fn worker(store: &MemoryStore, config: EngineConfig) -> EngineWorker {
        let clock = ManualClock::with_step(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            Duration::seconds(1),
        );
        EngineWorker::new(
            Arc::new(store.clone()),
            OrderBook::new(),
            Arc::new(clock),
            IdGenerator::default(),
            IdGenerator::default(),
            config,
        )
    }

    fn new_order(user_id: u64, side: OrderSide, amount: i64, price: i64) -> NewOrder {
        NewOrder {
            user_id,
            side,
            amount: Decimal::new(amount, 0),
            price: Decimal::new(price, 0),
        }
    }

    #[tokio::test]
    async fn test_sell_rests_in_book() {
        let store = MemoryStore::new();
        let mut worker = worker(&store, EngineConfig::default());

        let placed = worker.place_order(new_order(1, OrderSide::Sell, 5, 50)).await.unwrap();

        assert_eq!(placed.outcome, MatchOutcome::Resting);
        assert_eq!(worker.book().len(), 1);
        assert_eq!(store.get_order(placed.order.id).await.unwrap(), Some(placed.order));
    }

    #[tokio::test]
    async fn test_buy_partially_fills_and_updates_book() {
        let store = MemoryStore::new();
        let mut worker = worker(&store, EngineConfig::default());
        let sell = worker.place_order(new_order(1, OrderSide::Sell, 5, 50)).await.unwrap();

        let placed = worker.place_order(new_order(2, OrderSide::Buy, 3, 60)).await.unwrap();

        assert_eq!(placed.outcome, MatchOutcome::Filled);
        assert_eq!(placed.trades.len(), 1);
        assert_eq!(placed.trades[0].price, Decimal::new(50, 0));
        assert_eq!(worker.book().get(sell.order.id).unwrap().remaining_amount, Decimal::new(2, 0));
    }

    #[tokio::test]
    async fn test_cancel_policy_closes_unfilled_buy() {
        let store = MemoryStore::new();
        let config = EngineConfig::default().with_policy(UnfilledBuyPolicy::Cancel);
        let mut worker = worker(&store, config);

        let placed = worker.place_order(new_order(2, OrderSide::Buy, 3, 60)).await.unwrap();

        assert_eq!(placed.outcome, MatchOutcome::Rejected);
        assert_eq!(placed.order.status, OrderStatus::Canceled);
    }

    #[tokio::test]
    async fn test_abandoned_command_is_skipped() {
        let store = MemoryStore::new();
        let mut worker = worker(&store, EngineConfig::default());
        let (response, response_rx) = oneshot::channel();
        drop(response_rx);

        worker
            .handle(EngineCommand::PlaceOrder {
                request: new_order(1, OrderSide::Sell, 5, 50),
                response,
            })
            .await;

        assert!(worker.book().is_empty());
        assert!(store.all_orders().is_empty());
    }

    #[tokio::test]
    async fn test_authoritative_balance_check_reports_conflict() {
        let store = MemoryStore::new();
        store.seed_balance(Balance {
            user_id: 2,
            money: Decimal::new(10, 0),
            energy: Decimal::ZERO,
        });
        let mut worker = worker(&store, EngineConfig::default());

        let err = worker.place_order(new_order(2, OrderSide::Buy, 1, 60)).await.unwrap_err();

        assert!(matches!(err, MarketError::ConcurrencyConflict(_)));
        assert!(store.all_orders().is_empty());
    }

    #[tokio::test]
    async fn test_transient_commit_is_retried_with_same_ids() {
        let store = MemoryStore::new();
        let mut worker = worker(&store, EngineConfig::default());
        worker.place_order(new_order(1, OrderSide::Sell, 5, 50)).await.unwrap();

        store.fail_next_commits(1);
        let placed = worker.place_order(new_order(2, OrderSide::Buy, 2, 50)).await.unwrap();

        assert_eq!(placed.outcome, MatchOutcome::Filled);
        assert_eq!(store.all_trades().len(), 2);
        assert_eq!(placed.trades[0].id, 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_persistence_error() {
        let store = MemoryStore::new();
        let mut worker = worker(&store, EngineConfig::default());

        store.fail_next_commits(3);
        let err = worker.place_order(new_order(1, OrderSide::Sell, 5, 50)).await.unwrap_err();

        assert!(matches!(err, MarketError::Persistence(_)));
        assert!(worker.book().is_empty());
        assert!(store.all_orders().is_empty());
    }

    #[tokio::test]
    async fn test_amend_rejected_for_closed_order() {
        let store = MemoryStore::new();
        let mut worker = worker(&store, EngineConfig::default());
        let sell = worker.place_order(new_order(1, OrderSide::Sell, 5, 50)).await.unwrap();
        worker.cancel_order(sell.order.id, 1).await.unwrap();

        let err = worker
            .amend_order(
                sell.order.id,
                1,
                Amendment { amount: Some(Decimal::new(2, 0)), price: None },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, MarketError::InvalidState(_)));
    }
}
