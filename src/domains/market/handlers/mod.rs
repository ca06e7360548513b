// Market handlers module
pub mod balance_handler;
pub mod order_handler;
pub mod trade_handler;

pub use balance_handler::*;
pub use order_handler::*;
pub use trade_handler::*;
