//! headline.rs: records flowing through the pipeline.
//!
//! `HeadlineRecord` comes from a retrieval source and is never mutated by the core.
//! `ScoredHeadline` pairs it with a bounded score that is fixed at construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::category::{categorize, SentimentCategory};

/// One headline as delivered by a retrieval source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadlineRecord {
    /// The query this headline was retrieved for.
    #[serde(default)]
    pub query: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub link: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub snippet: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub source: String,
    /// Publication time if the source exposed a parseable one.
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl HeadlineRecord {
    pub fn new(query: impl Into<String>, title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            title: title.into(),
            link: String::new(),
            snippet: String::new(),
            source: source.into(),
            date: None,
        }
    }

    /// Records without a usable title cannot be scored.
    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

/// Sources and clients send `null` for absent text fields; treat it like a missing field.
fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

/// Which scoring path produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scorer {
    Oracle,
    Lexicon,
}

/// A headline with its sentiment score in `[-1.0, 1.0]`.
///
/// The score and its category are private: they are derived once in [`ScoredHeadline::new`]
/// and cannot drift apart afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredHeadline {
    #[serde(flatten)]
    pub record: HeadlineRecord,
    sentiment_score: f64,
    sentiment_category: SentimentCategory,
    scorer: Scorer,
}

impl ScoredHeadline {
    /// Out-of-range scores are clamped; NaN collapses to neutral `0.0`.
    pub fn new(record: HeadlineRecord, score: f64, scorer: Scorer) -> Self {
        let score = clamp_score(score);
        Self {
            record,
            sentiment_score: score,
            sentiment_category: categorize(score),
            scorer,
        }
    }

    pub fn sentiment_score(&self) -> f64 {
        self.sentiment_score
    }

    pub fn sentiment_category(&self) -> SentimentCategory {
        self.sentiment_category
    }

    pub fn scorer(&self) -> Scorer {
        self.scorer
    }

    /// Absolute magnitude of the score, used for impact ranking.
    pub fn impact(&self) -> f64 {
        self.sentiment_score.abs()
    }
}

/// Clamp into the canonical `[-1.0, 1.0]` range.
pub fn clamp_score(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(-1.0, 1.0)
    }
}
