// Market domain models
pub mod balance;
pub mod order;
pub mod trade;

pub use balance::*;
pub use order::*;
pub use trade::*;
