//! Scoring policy: oracle first, lexicon on any oracle failure.
//!
//! `score_headline` is total. A failed oracle call never escapes; it is logged, counted
//! and reported on the returned [`ScoreOutcome`] as a degraded-mode marker.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use super::headline_id;
use super::oracle::{DisabledOracle, DynOracle, OracleError};
use super::pacing::{DynPacer, NoPacing};
use crate::headline::{clamp_score, Scorer};
use crate::sentiment::LexiconScorer;

/// Result of scoring one headline.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    /// Always within `[-1, 1]`.
    pub score: f64,
    pub scorer: Scorer,
    /// The oracle failure that forced the fallback, if any.
    pub degraded: Option<OracleError>,
}

impl ScoreOutcome {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

pub struct ScoringPolicy {
    oracle: DynOracle,
    lexicon: LexiconScorer,
    pacer: DynPacer,
}

impl ScoringPolicy {
    pub fn new(oracle: DynOracle, pacer: DynPacer) -> Self {
        Self {
            oracle,
            lexicon: LexiconScorer::new(),
            pacer,
        }
    }

    /// Policy with the oracle switched off; every score comes from the lexicon.
    pub fn lexicon_only() -> Self {
        Self::new(Arc::new(DisabledOracle), Arc::new(NoPacing))
    }

    pub fn oracle_provider(&self) -> &'static str {
        self.oracle.provider_name()
    }

    pub fn oracle_configured(&self) -> bool {
        self.oracle.is_configured()
    }

    pub fn score_via_lexicon(&self, text: &str) -> f64 {
        self.lexicon.score(text)
    }

    /// Wait for the next oracle slot. No-op when the oracle cannot make remote calls.
    pub async fn pace(&self) {
        if self.oracle.is_configured() {
            self.pacer.pause().await;
        }
    }

    /// Score one title. Never fails.
    pub async fn score_headline(&self, title: &str) -> ScoreOutcome {
        self.pace().await;
        self.score_unpaced(title).await
    }

    /// Like [`score_headline`](Self::score_headline) for callers that already waited on
    /// [`pace`](Self::pace).
    pub async fn score_unpaced(&self, title: &str) -> ScoreOutcome {
        match self.oracle.score(title).await {
            Ok(score) => ScoreOutcome {
                score: clamp_score(score),
                scorer: Scorer::Oracle,
                degraded: None,
            },
            Err(e) => {
                let score = self.lexicon.score(title);
                counter!("sentiment_fallback_total", "kind" => e.kind()).increment(1);
                if matches!(e, OracleError::Unconfigured) {
                    debug!(target: "policy", id = %headline_id(title), "oracle unconfigured; lexicon score");
                } else {
                    warn!(
                        target: "policy",
                        id = %headline_id(title),
                        provider = self.oracle.provider_name(),
                        kind = e.kind(),
                        error = %e,
                        "oracle failed; degraded to lexicon score"
                    );
                }
                ScoreOutcome {
                    score,
                    scorer: Scorer::Lexicon,
                    degraded: Some(e),
                }
            }
        }
    }
}
