// src/analyze/mod.rs
//! Scoring stage: remote oracle, call pacing, and the fallback policy that composes
//! the oracle with the local lexicon scorer.

pub mod oracle;
pub mod pacing;
pub mod policy;

// Re-export convenient types.
pub use crate::analyze::oracle::{
    build_oracle_from_config, DisabledOracle, DynOracle, MockProvider, OracleAdapter, OracleError,
    SentimentOracle,
};
pub use crate::analyze::pacing::{pacer_from_config, DynPacer, JitterPacer, NoPacing, Pacer};
pub use crate::analyze::policy::{ScoreOutcome, ScoringPolicy};

/// Short anonymized id for a headline. Logs carry this instead of the raw text.
pub fn headline_id(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
