// Utility functions
pub mod envelope;
pub mod error;
pub mod http;
pub mod polling;
pub mod query;

pub use error::*;
