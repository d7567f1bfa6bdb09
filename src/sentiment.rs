//! Local lexicon scorer: deterministic, offline fallback for the oracle.
//!
//! Text is cleaned (lowercase, URLs and @mentions removed, whitespace collapsed) and then
//! scored with VADER, whose compound polarity is already bounded to `[-1, 1]`.

use once_cell::sync::Lazy;
use regex::Regex;
use vader_sentiment::SentimentIntensityAnalyzer;

use crate::headline::clamp_score;

static RE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+|www\.\S+").expect("url regex"));
static RE_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\w+").expect("mention regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

pub struct LexiconScorer {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl LexiconScorer {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }

    /// Compound polarity of the cleaned text. Never fails; empty input yields `0.0`.
    pub fn score(&self, text: &str) -> f64 {
        let cleaned = clean_text(text);
        if cleaned.is_empty() {
            return 0.0;
        }
        let scores = self.analyzer.polarity_scores(&cleaned);
        let compound = scores.get("compound").copied().unwrap_or(0.0);
        clamp_score(compound)
    }
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LexiconScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexiconScorer").finish_non_exhaustive()
    }
}

/// Lowercase, drop URLs and @mentions, collapse whitespace.
pub fn clean_text(text: &str) -> String {
    let lower = text.to_lowercase();
    let out = RE_URL.replace_all(&lower, "");
    let out = RE_MENTION.replace_all(&out, "");
    let out = RE_WS.replace_all(&out, " ");
    out.trim().to_string()
}
