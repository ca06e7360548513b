// Shared utilities
pub mod clock;
pub mod id_generator;

pub use clock::*;
pub use id_generator::*;
