//! history.rs: in-memory record of past analyses for the presentation layer.
//!
//! Owned by the HTTP state and handed the finished `Analysis`; the scoring core never
//! reads or writes it.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::pipeline::Analysis;

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    pub queries: Vec<String>,
    pub article_count: usize,
    pub positive_count: usize,
    pub neutral_count: usize,
    pub negative_count: usize,
    pub mean_sentiment: Option<f64>,
    pub degraded: usize,
    // short fingerprint of the strongest headlines
    pub top_titles: Vec<String>,
    pub top_scores: Vec<f64>,
}

#[derive(Debug)]
pub struct AnalysisHistory {
    inner: Mutex<Vec<HistoryEntry>>,
    cap: usize,
}

impl AnalysisHistory {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 10_000);
        Self {
            inner: Mutex::new(Vec::with_capacity(cap)),
            cap,
        }
    }

    pub fn push(&self, a: &Analysis) {
        let (titles, scores) = a
            .summary
            .top_impact(3)
            .iter()
            .map(|r| (r.record.title.clone(), r.sentiment_score()))
            .unzip();

        let entry = HistoryEntry {
            at: Utc::now(),
            queries: a.queries.clone(),
            article_count: a.summary.article_count,
            positive_count: a.summary.positive_count,
            neutral_count: a.summary.neutral_count,
            negative_count: a.summary.negative_count,
            mean_sentiment: a.summary.mean_sentiment,
            degraded: a.degraded,
            top_titles: titles,
            top_scores: scores,
        };

        let mut v = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        v.push(entry);
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
    }

    /// Oldest first.
    pub fn snapshot_last_n(&self, n: usize) -> Vec<HistoryEntry> {
        let v = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let start = v.len().saturating_sub(n);
        v[start..].to_vec()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::headline::{HeadlineRecord, ScoredHeadline, Scorer};
    use chrono::NaiveDate;

    fn analysis(query: &str, scores: &[f64]) -> Analysis {
        let records: Vec<_> = scores
            .iter()
            .enumerate()
            .map(|(i, s)| {
                ScoredHeadline::new(
                    HeadlineRecord::new(query, format!("h{i}"), "src"),
                    *s,
                    Scorer::Oracle,
                )
            })
            .collect();
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        Analysis {
            queries: vec![query.to_string()],
            window_start: day,
            window_end: day,
            summary: aggregate(&records),
            records,
            by_query: Vec::new(),
            degraded: 0,
            skipped: 0,
            failed_queries: Vec::new(),
        }
    }

    #[test]
    fn keeps_fingerprint_of_top_headlines() {
        let h = AnalysisHistory::with_capacity(10);
        h.push(&analysis("tesla", &[0.1, -0.9, 0.3, 0.05]));
        let last = h.snapshot_last_n(1);
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].queries, vec!["tesla".to_string()]);
        assert_eq!(last[0].top_titles, vec!["h1", "h2", "h0"]);
        assert_eq!(last[0].top_scores, vec![-0.9, 0.3, 0.1]);
        assert_eq!(last[0].article_count, 4);
    }

    #[test]
    fn capacity_drops_oldest() {
        let h = AnalysisHistory::with_capacity(2);
        for q in ["a", "b", "c"] {
            h.push(&analysis(q, &[0.2]));
        }
        let all = h.snapshot_last_n(10);
        let qs: Vec<_> = all.iter().map(|e| e.queries[0].as_str()).collect();
        assert_eq!(qs, vec!["b", "c"]);
        h.clear();
        assert!(h.snapshot_last_n(10).is_empty());
    }
}
