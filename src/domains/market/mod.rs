// =====================================================
// Market 도메인
// =====================================================
// 에너지(MWh) 지정가 거래: 매도 호가창, 매칭, 잔고 정산, 주문 생명주기
// =====================================================

pub mod engine;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
