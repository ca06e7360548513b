// Shared database module
pub mod connection;
pub mod memory;
pub mod postgres;
pub mod store;

pub use connection::*;
pub use memory::*;
pub use postgres::*;
pub use store::*;
