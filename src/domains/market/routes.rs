use axum::{
    routing::get,
    Router,
};
use crate::shared::services::AppState;

use super::handlers;

/// 마켓 라우터 생성
/// Create market router
///
/// # Routes
///
/// ## Orders (주문)
/// - `POST   /api/market/orders` - 주문 생성 (매수는 즉시 매칭)
/// - `GET    /api/market/orders` - 내 주문 목록
/// - `GET    /api/market/orders/sell` - 매도 호가 목록 (공개)
/// - `GET    /api/market/orders/:id` - 주문 조회
/// - `PUT    /api/market/orders/:id` - 주문 변경
/// - `DELETE /api/market/orders/:id` - 주문 취소
///
/// ## Transactions (체결)
/// - `GET    /api/market/transactions` - 내 체결 내역
///
/// ## Balance (잔고)
/// - `GET    /api/market/balance` - 내 잔고
pub fn create_market_router() -> Router<AppState> {
    Router::new()
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // Orders (주문)
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        .route("/orders",
            get(handlers::list_orders)
                .post(handlers::place_order)
        )
        // 정적 경로가 :order_id 보다 우선
        .route("/orders/sell", get(handlers::list_resting_sells))
        .route("/orders/:order_id",
            get(handlers::get_order)
                .put(handlers::amend_order)
                .delete(handlers::cancel_order)
        )
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // Transactions / Balance
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        .route("/transactions", get(handlers::list_transactions))
        .route("/balance", get(handlers::get_balance))
}
