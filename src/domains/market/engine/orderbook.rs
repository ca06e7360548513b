// =====================================================
// OrderBook - 인메모리 매도 호가창
// =====================================================
// 역할: open 상태의 매도 주문을 가격-시간 우선순위로 관리
//
// 핵심 설계:
// 1. BTreeMap으로 가격별 정렬 (낮은 가격 우선)
// 2. VecDeque로 같은 가격 내 Time Priority (created_at, id 순)
// 3. id → 가격 인덱스로 취소/부분 체결 시 레벨을 바로 찾음
//
// 매수 주문은 호가창에 올라가지 않습니다 (매칭 후 남은 수량은 호가창에 쌓이지 않음).
// 호가창은 매칭 워커만 소유하고 변경합니다.
// =====================================================

use std::collections::{BTreeMap, HashMap, VecDeque};

use rust_decimal::Decimal;

use crate::domains::market::engine::types::OrderEntry;
use crate::shared::errors::MarketError;

/// 매도 호가창
/// BTreeMap { 49.5 -> [주문1, 주문2], 50.0 -> [주문3] }
#[derive(Debug, Default, Clone)]
pub struct OrderBook {
    /// 가격별 주문 큐 (Key: 가격, Value: 해당 가격의 주문들)
    levels: BTreeMap<Decimal, VecDeque<OrderEntry>>,
    /// 주문 ID → 가격
    index: HashMap<u64, Decimal>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// 주문 추가 - 같은 가격 안에서는 (created_at, id) 순서 유지
    /// Insert a resting sell at its price-time position
    pub fn insert(&mut self, order: OrderEntry) -> Result<(), MarketError> {
        if self.index.contains_key(&order.id) {
            return Err(MarketError::InvalidState(format!(
                "order {} is already resting", order.id
            )));
        }
        if order.remaining_amount <= Decimal::ZERO {
            return Err(MarketError::InvalidState(format!(
                "order {} has nothing to rest", order.id
            )));
        }
        self.index.insert(order.id, order.price);
        let queue = self.levels.entry(order.price).or_default();
        // 대부분 맨 뒤에 붙음 (새 주문이 가장 늦음)
        let key = (order.created_at, order.id);
        let pos = queue
            .iter()
            .rposition(|o| (o.created_at, o.id) < key)
            .map_or(0, |p| p + 1);
        queue.insert(pos, order);
        Ok(())
    }

    /// 주문 제거
    /// Remove a resting sell (cancel)
    pub fn remove(&mut self, order_id: u64) -> Option<OrderEntry> {
        let price = self.index.remove(&order_id)?;
        let queue = self.levels.get_mut(&price)?;
        let pos = queue.iter().position(|o| o.id == order_id)?;
        let order = queue.remove(pos);
        if queue.is_empty() {
            self.levels.remove(&price);
        }
        order
    }

    /// 최우선 매도 주문 (최저가, 가장 오래된 주문)
    /// Highest-priority resting sell
    pub fn best_ask(&self) -> Option<&OrderEntry> {
        self.levels.values().next().and_then(|queue| queue.front())
    }

    /// 부분/전량 체결 반영
    /// Reduce a resting order by `amount`; removes it at zero. Returns what remains.
    pub fn consume(&mut self, order_id: u64, amount: Decimal) -> Result<Decimal, MarketError> {
        let price = *self.index.get(&order_id).ok_or_else(|| {
            MarketError::InvalidState(format!("order {} is not resting", order_id))
        })?;
        let queue = self.levels.get_mut(&price).ok_or_else(|| {
            MarketError::InvalidState(format!("price level {} missing for order {}", price, order_id))
        })?;
        let pos = queue.iter().position(|o| o.id == order_id).ok_or_else(|| {
            MarketError::InvalidState(format!("order {} missing from level {}", order_id, price))
        })?;

        let entry = &mut queue[pos];
        if amount <= Decimal::ZERO || amount > entry.remaining_amount {
            return Err(MarketError::InvalidState(format!(
                "cannot consume {} from order {} with {} remaining",
                amount, order_id, entry.remaining_amount
            )));
        }
        entry.remaining_amount -= amount;
        let remaining = entry.remaining_amount;

        if remaining.is_zero() {
            queue.remove(pos);
            if queue.is_empty() {
                self.levels.remove(&price);
            }
            self.index.remove(&order_id);
        }
        Ok(remaining)
    }

    /// 가격/수량 변경 (변경된 주문의 created_at 기준으로 다시 배치)
    /// Replace a resting order with its amended entry; queue position follows `created_at`
    pub fn amend(&mut self, entry: OrderEntry) -> Result<(), MarketError> {
        self.remove(entry.id).ok_or_else(|| {
            MarketError::InvalidState(format!("order {} is not resting", entry.id))
        })?;
        self.insert(entry)
    }

    pub fn get(&self, order_id: u64) -> Option<&OrderEntry> {
        let price = self.index.get(&order_id)?;
        self.levels.get(price)?.iter().find(|o| o.id == order_id)
    }

    /// 가격-시간 우선순위 순회
    /// Iterate resting sells in priority order
    pub fn iter(&self) -> impl Iterator<Item = &OrderEntry> {
        self.levels.values().flat_map(|queue| queue.iter())
    }

    /// 가격별 잔량 합계 (상위 depth 개)
    pub fn depth(&self, depth: usize) -> Vec<(Decimal, Decimal)> {
        self.levels
            .iter()
            .take(depth)
            .map(|(price, queue)| (*price, queue.iter().map(|o| o.remaining_amount).sum()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn price_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
