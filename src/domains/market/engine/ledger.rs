// =====================================================
// Ledger - 체결 정산
// =====================================================
// 역할: 체결 1건을 호출자의 트랜잭션 안에서 정산
//
// 처리 흐름 (settle_trade):
// 1. settlement_id 로 이미 기록된 leg 확인 → 있으면 그대로 반환 (재적용 없음)
// 2. 매수자/매도자 잔고 잠금 (user_id 낮은 쪽 먼저)
// 3. 매수자 돈, 매도자 에너지 재확인 (실패 시 InsufficientFunds / InsufficientEnergy)
// 4. 잔고 이동: 매수자 돈 → 매도자, 매도자 에너지 → 매수자
// 5. buy leg, sell leg 기록 (같은 settlement_id)
// 6. 매도 주문 수량 차감 (0이면 completed)
//
// 매수 주문의 최종 상태는 매칭 실행이 끝난 뒤 워커가 한 번에 기록합니다.
// 커밋은 호출자가 합니다. 어느 단계든 실패하면 트랜잭션 전체가 롤백됩니다.
// =====================================================

use rust_decimal::Decimal;
use tracing::debug;

use crate::domains::market::engine::types::{Settlement, SettledTrade, TxError};
use crate::domains::market::models::{BalanceDefaults, OrderPatch, OrderSide, TradeLeg};
use crate::shared::database::{StoreError, StoreTransaction};
use crate::shared::errors::MarketError;

/// 잔고 원장
#[derive(Debug, Clone, Copy, Default)]
pub struct Ledger {
    defaults: BalanceDefaults,
}

impl Ledger {
    pub fn new(defaults: BalanceDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &BalanceDefaults {
        &self.defaults
    }

    /// 체결 정산
    /// Settle one match inside `tx`. Idempotent per `settlement_id`.
    pub async fn settle_trade(
        &self,
        tx: &mut dyn StoreTransaction,
        settlement: &Settlement,
    ) -> Result<SettledTrade, TxError> {
        if settlement.amount <= Decimal::ZERO || settlement.price <= Decimal::ZERO {
            return Err(MarketError::InvalidState(format!(
                "settlement {} has non-positive amount or price", settlement.settlement_id
            ))
            .into());
        }
        if settlement.buyer_id == settlement.seller_id {
            return Err(MarketError::InvalidState(format!(
                "settlement {} trades user {} with itself",
                settlement.settlement_id, settlement.buyer_id
            ))
            .into());
        }

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // 1. 중복 정산 확인
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

        let existing = tx.settlement_legs(settlement.settlement_id).await?;
        if !existing.is_empty() {
            debug!("settlement {} already recorded", settlement.settlement_id);
            return Self::recorded_trade(settlement, existing);
        }

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // 2. 잔고 잠금 (항상 같은 순서)
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

        let (mut buyer, mut seller) = if settlement.buyer_id < settlement.seller_id {
            let buyer = tx.balance_for_update(settlement.buyer_id, &self.defaults).await?;
            let seller = tx.balance_for_update(settlement.seller_id, &self.defaults).await?;
            (buyer, seller)
        } else {
            let seller = tx.balance_for_update(settlement.seller_id, &self.defaults).await?;
            let buyer = tx.balance_for_update(settlement.buyer_id, &self.defaults).await?;
            (buyer, seller)
        };

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // 3. 잔고 재확인
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

        let total = settlement.total();
        if buyer.money < total {
            return Err(MarketError::InsufficientFunds {
                user_id: buyer.user_id,
                required: total,
                available: buyer.money,
            }
            .into());
        }
        if seller.energy < settlement.amount {
            return Err(MarketError::InsufficientEnergy {
                user_id: seller.user_id,
                required: settlement.amount,
                available: seller.energy,
            }
            .into());
        }

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // 4. 잔고 이동
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

        buyer.money -= total;
        buyer.energy += settlement.amount;
        seller.money += total;
        seller.energy -= settlement.amount;
        tx.save_balance(&buyer).await?;
        tx.save_balance(&seller).await?;

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // 5. leg 기록
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

        let buyer_leg = Self::leg(settlement, OrderSide::Buy);
        let seller_leg = Self::leg(settlement, OrderSide::Sell);
        tx.insert_trade_leg(&buyer_leg).await?;
        tx.insert_trade_leg(&seller_leg).await?;

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // 6. 매도 주문 수량 차감
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

        let sell_order = tx
            .order_for_update(settlement.sell_order_id)
            .await?
            .ok_or_else(|| {
                MarketError::InvalidState(format!("sell order {} not found", settlement.sell_order_id))
            })?;
        if sell_order.user_id != settlement.seller_id || sell_order.side != OrderSide::Sell {
            return Err(MarketError::InvalidState(format!(
                "order {} is not a sell of user {}",
                sell_order.id, settlement.seller_id
            ))
            .into());
        }
        let patch = OrderPatch::fill(&sell_order, settlement.amount)?;
        // 쓰기 전에 결과 검증
        patch.apply_to(&sell_order, settlement.created_at)?;
        tx.update_order(sell_order.id, &patch, settlement.created_at).await?;

        Ok(SettledTrade { buyer_leg, seller_leg })
    }

    fn leg(settlement: &Settlement, side: OrderSide) -> TradeLeg {
        let (id, user_id, order_id) = match side {
            OrderSide::Buy => (settlement.buyer_leg_id, settlement.buyer_id, settlement.buy_order_id),
            OrderSide::Sell => (settlement.seller_leg_id, settlement.seller_id, settlement.sell_order_id),
        };
        TradeLeg {
            id,
            user_id,
            order_id: Some(order_id),
            side,
            amount: settlement.amount,
            price: settlement.price,
            total: settlement.total(),
            settlement_id: settlement.settlement_id,
            created_at: settlement.created_at,
        }
    }

    /// 이미 기록된 정산 결과 복원
    fn recorded_trade(settlement: &Settlement, legs: Vec<TradeLeg>) -> Result<SettledTrade, TxError> {
        let mut buyer_leg = None;
        let mut seller_leg = None;
        for leg in legs {
            match leg.side {
                OrderSide::Buy => buyer_leg = Some(leg),
                OrderSide::Sell => seller_leg = Some(leg),
            }
        }
        match (buyer_leg, seller_leg) {
            (Some(buyer_leg), Some(seller_leg)) => Ok(SettledTrade { buyer_leg, seller_leg }),
            _ => Err(StoreError::Fatal(format!(
                "settlement {} is recorded with a single leg", settlement.settlement_id
            ))
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    use crate::domains::market::models::{Balance, Order, OrderStatus};
    use crate::shared::database::{MemoryStore, Store};

    fn sell_order(id: u64, user_id: u64, amount: i64, price: i64) -> Order {
        let now = Utc::now();
        Order {
            id,
            user_id,
            side: OrderSide::Sell,
            original_amount: Decimal::new(amount, 0),
            remaining_amount: Decimal::new(amount, 0),
            limit_price: Decimal::new(price, 0),
            status: OrderStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }

    fn settlement(amount: i64, price: i64) -> Settlement {
        Settlement {
            settlement_id: Uuid::new_v4(),
            buyer_id: 1,
            seller_id: 2,
            amount: Decimal::new(amount, 0),
            price: Decimal::new(price, 0),
            buy_order_id: 20,
            sell_order_id: 10,
            buyer_leg_id: 1,
            seller_leg_id: 2,
            created_at: Utc::now(),
        }
    }

    async fn store_with_sell(amount: i64) -> MemoryStore {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&sell_order(10, 2, amount, 50)).await.unwrap();
        tx.commit().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_settle_moves_balances_and_fills_sell() {
        let store = store_with_sell(5).await;
        let ledger = Ledger::default();
        let s = settlement(3, 50);

        let mut tx = store.begin().await.unwrap();
        let trade = ledger.settle_trade(tx.as_mut(), &s).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(trade.buyer_leg.total, Decimal::new(150, 0));
        assert_eq!(trade.buyer_leg.settlement_id, trade.seller_leg.settlement_id);

        let buyer = store.get_balance(1).await.unwrap().unwrap();
        let seller = store.get_balance(2).await.unwrap().unwrap();
        assert_eq!(buyer.money, Decimal::new(9_850, 0));
        assert_eq!(buyer.energy, Decimal::new(1_003, 0));
        assert_eq!(seller.money, Decimal::new(10_150, 0));
        assert_eq!(seller.energy, Decimal::new(997, 0));

        let sell = store.get_order(10).await.unwrap().unwrap();
        assert_eq!(sell.remaining_amount, Decimal::new(2, 0));
        assert_eq!(sell.status, OrderStatus::Open);
    }

    #[tokio::test]
    async fn test_settle_same_id_twice_applies_once() {
        let store = store_with_sell(5).await;
        let ledger = Ledger::default();
        let s = settlement(2, 50);

        for _ in 0..2 {
            let mut tx = store.begin().await.unwrap();
            ledger.settle_trade(tx.as_mut(), &s).await.unwrap();
            tx.commit().await.unwrap();
        }

        assert_eq!(store.all_trades().len(), 2);
        let buyer = store.get_balance(1).await.unwrap().unwrap();
        assert_eq!(buyer.money, Decimal::new(9_900, 0));
        assert_eq!(store.get_order(10).await.unwrap().unwrap().remaining_amount, Decimal::new(3, 0));
    }

    #[tokio::test]
    async fn test_insufficient_seller_energy_writes_nothing() {
        let store = store_with_sell(5).await;
        store.seed_balance(Balance {
            user_id: 2,
            money: Decimal::ZERO,
            energy: Decimal::new(1, 0),
        });
        let ledger = Ledger::default();

        let mut tx = store.begin().await.unwrap();
        let err = ledger.settle_trade(tx.as_mut(), &settlement(3, 50)).await.unwrap_err();
        drop(tx);

        assert!(matches!(
            err,
            TxError::Market(MarketError::InsufficientEnergy { user_id: 2, .. })
        ));
        assert!(store.all_trades().is_empty());
        assert_eq!(store.get_balance(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_insufficient_buyer_money() {
        let store = store_with_sell(5).await;
        store.seed_balance(Balance {
            user_id: 1,
            money: Decimal::new(100, 0),
            energy: Decimal::ZERO,
        });

        let mut tx = store.begin().await.unwrap();
        let err = Ledger::default()
            .settle_trade(tx.as_mut(), &settlement(3, 50))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TxError::Market(MarketError::InsufficientFunds { user_id: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_full_fill_completes_sell() {
        let store = store_with_sell(3).await;

        let mut tx = store.begin().await.unwrap();
        Ledger::default().settle_trade(tx.as_mut(), &settlement(3, 50)).await.unwrap();
        tx.commit().await.unwrap();

        let sell = store.get_order(10).await.unwrap().unwrap();
        assert_eq!(sell.status, OrderStatus::Completed);
        assert!(sell.remaining_amount.is_zero());
    }
}
