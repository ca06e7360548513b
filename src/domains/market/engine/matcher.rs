// =====================================================
// Matcher - 매수 주문 매칭 계획
// =====================================================
// 역할: 새 매수 주문에 대해 호가창에서 체결할 매도 주문들을 고름
//
// 핵심 알고리즘:
// 1. 가격 우선: 낮은 매도가부터
// 2. 시간 우선: 같은 가격이면 먼저 온 주문
// 3. 자기 주문 건너뜀 (self-trade 방지, 건너뛴 주문은 그대로 남음)
// 4. 매도가 > 매수 지정가 이면 중단
// 5. 체결 가격은 항상 매도 주문(maker) 가격
//
// 호가창은 변경하지 않습니다. 계획이 커밋된 후에만
// 워커가 OrderBook::consume 으로 반영합니다.
// =====================================================

use rust_decimal::Decimal;

use crate::domains::market::engine::orderbook::OrderBook;
use crate::domains::market::engine::types::{Fill, MatchPlan};
use crate::domains::market::models::{Order, OrderSide};

/// 매칭 엔진 (상태 없음)
#[derive(Debug, Default, Clone, Copy)]
pub struct Matcher;

impl Matcher {
    pub fn new() -> Self {
        Self
    }

    /// 매칭 계획 생성
    ///
    /// # Arguments
    /// * `buy_order` - 새로 들어온 매수 주문
    /// * `orderbook` - 매도 호가창 (읽기 전용)
    ///
    /// # Returns
    /// 체결 순서대로의 Fill 목록과 남는 수량.
    /// 매도 주문이 들어오면 빈 계획을 반환합니다 (매도는 매칭을 일으키지 않음).
    pub fn plan(&self, buy_order: &Order, orderbook: &OrderBook) -> MatchPlan {
        let mut remaining = buy_order.remaining_amount;
        if buy_order.side != OrderSide::Buy {
            return MatchPlan { fills: Vec::new(), remaining };
        }

        let mut fills = Vec::new();
        for ask in orderbook.iter() {
            if remaining <= Decimal::ZERO {
                break;
            }
            // 이후 매도 주문은 모두 더 비쌈
            if ask.price > buy_order.limit_price {
                break;
            }
            if ask.user_id == buy_order.user_id {
                continue;
            }

            let amount = remaining.min(ask.remaining_amount);
            fills.push(Fill {
                sell_order_id: ask.id,
                seller_id: ask.user_id,
                amount,
                price: ask.price,
            });
            remaining -= amount;
        }

        MatchPlan { fills, remaining }
    }
}
