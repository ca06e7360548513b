// Market services module
// 마켓 서비스 모듈

pub mod balance_service;
pub mod order_service;
pub mod state;
pub mod trade_service;

pub use balance_service::*;
pub use order_service::*;
pub use state::*;
pub use trade_service::*;
