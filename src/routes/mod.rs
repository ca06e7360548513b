// Routes module: 라우팅 설정
// 역할: 도메인 라우터를 조합
// Routes module: combines domain routers

use axum::Router;
use crate::shared::services::AppState;

use crate::domains::market::routes::create_market_router;

/// Create main router
/// 메인 라우터 생성
pub fn create_router() -> Router<AppState> {
    Router::new()
        .nest("/api/market", create_market_router())
}
