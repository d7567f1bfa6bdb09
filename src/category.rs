//! # Categorizer
//! Maps a normalized score to a display label. Pure and total; boundaries are inclusive
//! to their named side.

use serde::{Deserialize, Serialize};

/// Scores at or above this are positive.
pub const POSITIVE_THRESHOLD: f64 = 0.05;
/// Scores at or below this are negative.
pub const NEGATIVE_THRESHOLD: f64 = -0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentCategory {
    Positive,
    Neutral,
    Negative,
}

impl SentimentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentCategory::Positive => "positive",
            SentimentCategory::Neutral => "neutral",
            SentimentCategory::Negative => "negative",
        }
    }
}

impl std::fmt::Display for SentimentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// NaN falls through both comparisons and lands on `Neutral`.
pub fn categorize(score: f64) -> SentimentCategory {
    if score >= POSITIVE_THRESHOLD {
        SentimentCategory::Positive
    } else if score <= NEGATIVE_THRESHOLD {
        SentimentCategory::Negative
    } else {
        SentimentCategory::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_inclusive() {
        assert_eq!(categorize(0.05), SentimentCategory::Positive);
        assert_eq!(categorize(-0.05), SentimentCategory::Negative);
        assert_eq!(categorize(0.0), SentimentCategory::Neutral);
        assert_eq!(categorize(0.049), SentimentCategory::Neutral);
        assert_eq!(categorize(-0.049), SentimentCategory::Neutral);
    }

    #[test]
    fn extremes_and_nan() {
        assert_eq!(categorize(1.0), SentimentCategory::Positive);
        assert_eq!(categorize(-1.0), SentimentCategory::Negative);
        assert_eq!(categorize(f64::NAN), SentimentCategory::Neutral);
    }

    #[test]
    fn same_input_same_label() {
        // No hysteresis: calling in any order yields the same answer.
        let xs = [0.3, 0.049, -0.2, 0.049, 0.3];
        let first: Vec<_> = xs.iter().map(|x| categorize(*x)).collect();
        let second: Vec<_> = xs.iter().rev().map(|x| categorize(*x)).rev().collect();
        assert_eq!(first, second);
    }
}
