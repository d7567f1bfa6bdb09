// src/ingest/types.rs
use anyhow::Result;
use chrono::NaiveDate;

use crate::headline::HeadlineRecord;

/// What to ask a headline source for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Raw query as typed, comma-separated keywords.
    pub text: String,
    pub keywords: Vec<String>,
    pub max_results: usize,
    /// Inclusive publication window, if any.
    pub window: Option<(NaiveDate, NaiveDate)>,
}

impl SearchQuery {
    pub fn new(text: &str, max_results: usize) -> Self {
        Self {
            text: text.trim().to_string(),
            keywords: crate::ingest::split_keywords(text),
            max_results,
            window: None,
        }
    }

    pub fn within(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.window = Some((start, end));
        self
    }
}

#[async_trait::async_trait]
pub trait HeadlineSource: Send + Sync {
    /// Ordered raw results; post-processing happens in `ingest::fetch_headlines`.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<HeadlineRecord>>;
    fn name(&self) -> &'static str;
}
