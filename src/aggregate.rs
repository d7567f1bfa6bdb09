//! # Aggregator
//! Pure reduction of a scored batch into summary statistics.
//!
//! Always recomputed from the full batch. `article_count` equals the sum of the three
//! category counts, and `mean_sentiment` is `None` for an empty batch.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::category::SentimentCategory;
use crate::headline::ScoredHeadline;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSummary {
    pub article_count: usize,
    pub positive_count: usize,
    pub neutral_count: usize,
    pub negative_count: usize,
    /// Absent for an empty batch; callers must check before rendering.
    pub mean_sentiment: Option<f64>,
    /// Stable sort by `|score|` descending.
    pub ranked_by_impact: Vec<ScoredHeadline>,
    pub mean_by_source: BTreeMap<String, f64>,
}

impl AggregateSummary {
    pub fn count_for(&self, category: SentimentCategory) -> usize {
        match category {
            SentimentCategory::Positive => self.positive_count,
            SentimentCategory::Neutral => self.neutral_count,
            SentimentCategory::Negative => self.negative_count,
        }
    }

    /// Top `n` entries of the impact ranking.
    pub fn top_impact(&self, n: usize) -> &[ScoredHeadline] {
        &self.ranked_by_impact[..n.min(self.ranked_by_impact.len())]
    }
}

pub fn aggregate(records: &[ScoredHeadline]) -> AggregateSummary {
    let mut positive_count = 0usize;
    let mut neutral_count = 0usize;
    let mut negative_count = 0usize;
    let mut sum = 0.0f64;

    for r in records {
        match r.sentiment_category() {
            SentimentCategory::Positive => positive_count += 1,
            SentimentCategory::Neutral => neutral_count += 1,
            SentimentCategory::Negative => negative_count += 1,
        }
        sum += r.sentiment_score();
    }

    let mean_sentiment = if records.is_empty() {
        None
    } else {
        Some(sum / records.len() as f64)
    };

    // `sort_by` is stable: equal magnitudes keep their input order.
    let mut ranked_by_impact = records.to_vec();
    ranked_by_impact.sort_by(|a, b| b.impact().total_cmp(&a.impact()));

    AggregateSummary {
        article_count: records.len(),
        positive_count,
        neutral_count,
        negative_count,
        mean_sentiment,
        ranked_by_impact,
        mean_by_source: mean_by_key(records, |r| r.record.source.as_str()),
    }
}

/// One aggregate per originating query, in query order of first appearance.
pub fn aggregate_by_query(records: &[ScoredHeadline]) -> Vec<(String, AggregateSummary)> {
    let mut order: Vec<&str> = Vec::new();
    for r in records {
        if !order.contains(&r.record.query.as_str()) {
            order.push(r.record.query.as_str());
        }
    }
    order
        .into_iter()
        .map(|q| {
            let group: Vec<ScoredHeadline> = records
                .iter()
                .filter(|r| r.record.query == q)
                .cloned()
                .collect();
            (q.to_string(), aggregate(&group))
        })
        .collect()
}

fn mean_by_key<'a, F>(records: &'a [ScoredHeadline], key: F) -> BTreeMap<String, f64>
where
    F: Fn(&'a ScoredHeadline) -> &'a str,
{
    let mut acc: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for r in records {
        let e = acc.entry(key(r)).or_insert((0.0, 0));
        e.0 += r.sentiment_score();
        e.1 += 1;
    }
    acc.into_iter()
        .map(|(k, (sum, n))| (k.to_string(), sum / n as f64))
        .collect()
}
