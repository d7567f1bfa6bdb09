// src/config/mod.rs
pub mod sentinel;

pub use sentinel::{HistoryConfig, OracleConfig, PacingConfig, SearchConfig, SentinelConfig};
