// src/ingest/providers/mod.rs
pub mod fixture;
pub mod google_cse;

pub use fixture::StaticSource;
pub use google_cse::GoogleCseSource;
