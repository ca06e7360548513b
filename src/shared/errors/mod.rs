// Shared errors
pub mod market_error;

pub use market_error::*;
