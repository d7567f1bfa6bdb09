//! # Pipeline
//! Retrieval → per-headline scoring → aggregation.
//!
//! Headlines are scored one at a time in a sequential loop. A [`CancelFlag`] is checked
//! before every scoring call; once set, everything scored so far is discarded and the
//! caller gets [`PipelineError::Cancelled`]. Dropping the returned future has the same
//! effect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregate::{aggregate, aggregate_by_query, AggregateSummary};
use crate::analyze::{build_oracle_from_config, pacer_from_config, ScoringPolicy};
use crate::config::{SearchConfig, SentinelConfig};
use crate::error::{ConfigurationError, PipelineError};
use crate::headline::{HeadlineRecord, ScoredHeadline};
use crate::ingest::providers::GoogleCseSource;
use crate::ingest::types::{HeadlineSource, SearchQuery};

/// Shared cancellation switch for a running batch.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Scored batch plus its summary.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub records: Vec<ScoredHeadline>,
    pub summary: AggregateSummary,
    /// Headlines scored by the lexicon because the oracle failed.
    pub degraded: usize,
    /// Records dropped for a missing title.
    pub skipped: usize,
}

/// Score every record in order, then aggregate once.
pub async fn score_batch(
    policy: &ScoringPolicy,
    batch: Vec<HeadlineRecord>,
    cancel: &CancelFlag,
) -> Result<BatchReport, PipelineError> {
    crate::ingest::ensure_metrics_described();

    let total = batch.len();
    let mut records = Vec::with_capacity(total);
    let mut degraded = 0usize;
    let mut skipped = 0usize;

    let cancelled = |scored: usize| {
        counter!("pipeline_cancelled_total").increment(1);
        warn!(target: "pipeline", scored, total, "batch cancelled; discarding partial results");
        PipelineError::Cancelled { scored, total }
    };

    for rec in batch {
        if cancel.is_cancelled() {
            return Err(cancelled(records.len()));
        }
        if !rec.has_title() {
            skipped += 1;
            counter!("headlines_skipped_total").increment(1);
            warn!(target: "pipeline", link = %rec.link, source = %rec.source, "record without title skipped");
            continue;
        }

        // A cancel that lands while waiting for the slot must not cost another call.
        policy.pace().await;
        if cancel.is_cancelled() {
            return Err(cancelled(records.len()));
        }
        let outcome = policy.score_unpaced(&rec.title).await;
        if outcome.is_degraded() {
            degraded += 1;
        }
        counter!("headlines_scored_total").increment(1);
        records.push(ScoredHeadline::new(rec, outcome.score, outcome.scorer));
    }

    if degraded > 0 {
        warn!(
            target: "pipeline",
            degraded,
            scored = records.len(),
            provider = policy.oracle_provider(),
            "degraded mode: lexicon fallback used"
        );
    }

    let summary = aggregate(&records);
    info!(
        target: "pipeline",
        scored = summary.article_count,
        skipped,
        degraded,
        mean = ?summary.mean_sentiment,
        "batch scored"
    );

    Ok(BatchReport {
        records,
        summary,
        degraded,
        skipped,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisRequest {
    pub queries: Vec<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuerySummary {
    pub query: String,
    pub summary: AggregateSummary,
}

/// Result of a search-and-score run over one or more queries.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub queries: Vec<String>,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub records: Vec<ScoredHeadline>,
    pub summary: AggregateSummary,
    pub by_query: Vec<QuerySummary>,
    pub degraded: usize,
    pub skipped: usize,
    /// Queries whose retrieval failed; they contribute no records.
    pub failed_queries: Vec<String>,
}

pub struct Pipeline {
    source: Result<Arc<dyn HeadlineSource>, ConfigurationError>,
    policy: Arc<ScoringPolicy>,
    search: SearchConfig,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn HeadlineSource>,
        policy: Arc<ScoringPolicy>,
        search: SearchConfig,
    ) -> Self {
        Self {
            source: Ok(source),
            policy,
            search,
        }
    }

    /// Builds the oracle, pacer and Google search source from config. Missing search
    /// credentials do not fail here; they surface as a `ConfigurationError` on `analyze`.
    pub fn from_config(cfg: &SentinelConfig) -> Self {
        let oracle = build_oracle_from_config(&cfg.oracle);
        let policy = Arc::new(ScoringPolicy::new(oracle, pacer_from_config(&cfg.pacing)));
        let source = GoogleCseSource::from_config(&cfg.search)
            .map(|s| Arc::new(s) as Arc<dyn HeadlineSource>);
        if let Err(e) = &source {
            warn!(target: "pipeline", error = %e, "headline search unavailable");
        }
        Self {
            source,
            policy,
            search: cfg.search.clone(),
        }
    }

    pub fn policy(&self) -> &Arc<ScoringPolicy> {
        &self.policy
    }

    /// Retrieve every query, then score the combined batch.
    pub async fn analyze(
        &self,
        req: &AnalysisRequest,
        cancel: &CancelFlag,
    ) -> Result<Analysis, PipelineError> {
        let source = self.source.as_ref().map_err(|e| e.clone())?;

        let queries: Vec<String> = req
            .queries
            .iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        if queries.is_empty() {
            return Err(PipelineError::NoQuery);
        }

        let max_results = req
            .max_results
            .filter(|n| *n > 0)
            .unwrap_or(self.search.max_results);
        let window_end = Utc::now().date_naive();
        let window_start = window_end - ChronoDuration::days(i64::from(self.search.window_days));

        let mut batch = Vec::new();
        let mut failed_queries = Vec::new();
        for q in &queries {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled {
                    scored: 0,
                    total: batch.len(),
                });
            }
            let sq = SearchQuery::new(q, max_results).within(window_start, window_end);
            match crate::ingest::fetch_headlines(
                &**source,
                &sq,
                self.search.near_duplicate_ratio,
            )
            .await
            {
                Ok(mut v) => batch.append(&mut v),
                Err(e) => {
                    warn!(target: "pipeline", error = ?e, query = %q, source = source.name(), "retrieval failed");
                    failed_queries.push(q.clone());
                }
            }
        }

        let report = score_batch(&self.policy, batch, cancel).await?;
        let by_query = aggregate_by_query(&report.records)
            .into_iter()
            .map(|(query, summary)| QuerySummary { query, summary })
            .collect();

        Ok(Analysis {
            queries,
            window_start,
            window_end,
            records: report.records,
            summary: report.summary,
            by_query,
            degraded: report.degraded,
            skipped: report.skipped,
            failed_queries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{MockProvider, NoPacing, OracleAdapter, OracleError};
    use crate::category::SentimentCategory;
    use crate::headline::Scorer;
    use std::time::Duration;

    fn policy(provider: MockProvider) -> ScoringPolicy {
        ScoringPolicy::new(
            Arc::new(OracleAdapter::new(provider, Duration::from_secs(1))),
            Arc::new(NoPacing),
        )
    }

    fn batch(titles: &[&str]) -> Vec<HeadlineRecord> {
        titles
            .iter()
            .map(|t| HeadlineRecord::new("acme", *t, "news.example"))
            .collect()
    }

    #[tokio::test]
    async fn raw_oracle_scores_flow_to_summary() {
        let p = policy(MockProvider::sequence(vec![
            Ok("6".into()),
            Ok("-8".into()),
            Ok("0".into()),
        ]));
        let report = score_batch(&p, batch(&["a", "b", "c"]), &CancelFlag::new())
            .await
            .unwrap();

        let scores: Vec<f64> = report.records.iter().map(|r| r.sentiment_score()).collect();
        assert_eq!(scores, vec![0.6, -0.8, 0.0]);
        let cats: Vec<_> = report
            .records
            .iter()
            .map(|r| r.sentiment_category())
            .collect();
        assert_eq!(
            cats,
            vec![
                SentimentCategory::Positive,
                SentimentCategory::Negative,
                SentimentCategory::Neutral
            ]
        );
        let mean = report.summary.mean_sentiment.unwrap();
        assert!((mean - (-0.0667)).abs() < 0.001);
        assert_eq!(report.degraded, 0);
    }

    #[tokio::test]
    async fn blank_titles_are_skipped() {
        let p = policy(MockProvider::fixed("1"));
        let report = score_batch(&p, batch(&["ok", "  ", "fine"]), &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.summary.article_count, 2);
    }

    #[tokio::test]
    async fn degraded_headlines_are_counted() {
        let p = policy(MockProvider::sequence(vec![
            Ok("5".into()),
            Err(OracleError::TransportFailure("down".into())),
        ]));
        let report = score_batch(&p, batch(&["a", "b", "c", "d"]), &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(report.degraded, 2);
        assert_eq!(report.records[1].scorer(), Scorer::Lexicon);
        assert_eq!(report.records[2].scorer(), Scorer::Oracle);
    }

    #[tokio::test]
    async fn cancelled_batch_reports_nothing() {
        let p = policy(MockProvider::fixed("1"));
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = score_batch(&p, batch(&["a", "b"]), &cancel).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { scored: 0, total: 2 }));
    }

    #[tokio::test]
    async fn empty_batch_is_fine() {
        let p = policy(MockProvider::fixed("1"));
        let report = score_batch(&p, Vec::new(), &CancelFlag::new()).await.unwrap();
        assert_eq!(report.summary.article_count, 0);
        assert_eq!(report.summary.mean_sentiment, None);
    }
}
