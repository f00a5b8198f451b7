// Core modules
pub mod clock;
pub mod config;
pub mod execution;
pub mod gateway;
pub mod indicators;
pub mod models;
pub mod retry;
pub mod risk;
pub mod strategy;

// Re-export commonly used types
pub use gateway::{Gateway, GatewayError};
pub use models::*;
pub use strategy::Strategy;
