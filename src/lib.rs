// =====================================================
// energy_market
// =====================================================
// 에너지 지정가 거래 서버 (라이브러리)
// 바이너리(main.rs), 통합 테스트, 벤치마크가 공유합니다.
// =====================================================

pub mod domains;
pub mod routes;
pub mod shared;
