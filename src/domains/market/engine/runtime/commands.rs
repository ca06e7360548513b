// =====================================================
// EngineCommand - 매칭 워커로 전달할 명령
// =====================================================
// 역할: API 요청(tokio task)에서 매칭 워커로 명령을 전달하는 메시지 타입
// 결과는 oneshot 채널로 돌려받습니다.
// =====================================================

use tokio::sync::oneshot;

use crate::domains::market::engine::types::{Amendment, NewOrder, OrderEntry};
use crate::domains::market::models::{Order, PlacedOrder};
use crate::shared::errors::MarketError;

pub type Responder<T> = oneshot::Sender<Result<T, MarketError>>;

/// 매칭 워커 명령
///
/// 워커는 명령을 하나씩 순서대로 처리합니다.
#[derive(Debug)]
pub enum EngineCommand {
    /// 주문 생성
    ///
    /// # 처리 과정
    /// 1. 잔고 재확인 (잠금 상태에서)
    /// 2. 매수면 매칭 계획 → 체결별 정산
    /// 3. 주문 최종 상태 기록 후 커밋
    /// 4. 커밋 성공 후 호가창 반영
    PlaceOrder {
        request: NewOrder,
        response: Responder<PlacedOrder>,
    },

    /// 주문 취소 (소유자만)
    CancelOrder {
        order_id: u64,
        user_id: u64,
        response: Responder<Order>,
    },

    /// 주문 변경 (open 상태의 남은 수량/가격, 소유자만)
    AmendOrder {
        order_id: u64,
        user_id: u64,
        amendment: Amendment,
        response: Responder<Order>,
    },

    /// 호가창 조회 (가격-시간 우선순위 순)
    RestingSells {
        response: Responder<Vec<OrderEntry>>,
    },
}

impl EngineCommand {
    /// 요청한 쪽이 응답을 더 이상 기다리지 않음 (처리 전에 건너뜀)
    pub fn is_abandoned(&self) -> bool {
        match self {
            EngineCommand::PlaceOrder { response, .. } => response.is_closed(),
            EngineCommand::CancelOrder { response, .. } => response.is_closed(),
            EngineCommand::AmendOrder { response, .. } => response.is_closed(),
            EngineCommand::RestingSells { response } => response.is_closed(),
        }
    }
}
