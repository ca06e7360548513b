// Domain modules
pub mod market;
