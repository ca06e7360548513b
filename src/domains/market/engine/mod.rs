// =====================================================
// 매칭 엔진 모듈
// Matching Engine Module
// =====================================================
// 구조:
// - types: 엔진 내부 타입 정의
// - orderbook: 인메모리 매도 호가창
// - matcher: 매수 주문 매칭 계획
// - ledger: 체결 정산 (잔고 이동 + leg 기록)
// - runtime: 매칭 워커와 명령 채널
//
// Service 계층은 Engine trait만 참조합니다.
// =====================================================

pub mod ledger;
pub mod matcher;
pub mod orderbook;
pub mod runtime;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;

use crate::domains::market::models::{Order, PlacedOrder};
use crate::shared::errors::MarketError;

pub use ledger::Ledger;
pub use matcher::Matcher;
pub use orderbook::OrderBook;
pub use runtime::{EngineConfig, MatchingEngine};
pub use types::{Amendment, NewOrder, OrderEntry, UnfilledBuyPolicy};

// =====================================================
// Engine Trait (엔진 인터페이스)
// =====================================================

/// 매칭 엔진 인터페이스
/// Matching Engine Interface
///
/// 주문 생성/취소/변경은 모두 하나의 워커에서 순서대로 처리됩니다.
/// 조회는 엔진을 거치지 않고 저장소의 커밋된 데이터를 읽습니다.
#[async_trait]
pub trait Engine: Send + Sync {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 주문 관리
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 주문 생성
    ///
    /// 매도는 호가창에 등록되고, 매수는 즉시 매칭을 시도합니다.
    /// 저장, 체결 정산, 최종 상태 기록이 하나의 트랜잭션으로 커밋됩니다.
    ///
    /// # Errors
    /// * `Validation` - 수량/가격이 0 이하
    /// * `ConcurrencyConflict` - 대기열 포화, 또는 잠금 상태 잔고 재확인 실패
    /// * `InsufficientEnergy` - 체결 도중 매도자 에너지 부족 (전체 롤백)
    /// * `Persistence` - 저장소 오류 (재시도 소진 포함)
    async fn place_order(&self, request: NewOrder) -> Result<PlacedOrder, MarketError>;

    /// 주문 취소 (소유자만, open 상태만)
    async fn cancel_order(&self, order_id: u64, user_id: u64) -> Result<Order, MarketError>;

    /// 주문 변경 (소유자만, open 상태만, 매칭 재시도 없음)
    async fn amend_order(
        &self,
        order_id: u64,
        user_id: u64,
        amendment: Amendment,
    ) -> Result<Order, MarketError>;

    /// 현재 호가창 (가격-시간 우선순위 순)
    async fn resting_sells(&self) -> Result<Vec<OrderEntry>, MarketError>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 엔진 생명주기
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 엔진 시작 (저장소에서 호가창 복구)
    async fn start(&self) -> Result<()>;

    /// 엔진 정지
    async fn stop(&self) -> Result<()>;
}
