// nutwatch-api: Async Rust client for the Network UPS Tools (upsd) protocol

pub mod client;
pub mod error;
pub mod protocol;

pub use client::{DEFAULT_PORT, NutClient};
pub use error::Error;
