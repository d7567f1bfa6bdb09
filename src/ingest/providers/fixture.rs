// src/ingest/providers/fixture.rs
use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::headline::HeadlineRecord;
use crate::ingest::types::{HeadlineSource, SearchQuery};

/// Serves a fixed list of records for every query. Offline runs and tests.
pub struct StaticSource {
    records: Vec<HeadlineRecord>,
}

impl StaticSource {
    pub fn new(records: Vec<HeadlineRecord>) -> Self {
        Self { records }
    }

    /// JSON array of `HeadlineRecord`s.
    pub fn from_fixture(content: &str) -> Result<Self> {
        let records: Vec<HeadlineRecord> =
            serde_json::from_str(content).context("parsing headline fixture json")?;
        Ok(Self::new(records))
    }
}

#[async_trait]
impl HeadlineSource for StaticSource {
    async fn search(&self, _query: &SearchQuery) -> Result<Vec<HeadlineRecord>> {
        Ok(self.records.clone())
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixture_round_trips_records() {
        let src = StaticSource::from_fixture(
            r#"[{"title":"Tesla cuts prices","link":"https://a/1","source":"a.example",
                "date":"2024-03-04T10:00:00Z"},
               {"title":"Tesla opens plant"}]"#,
        )
        .unwrap();
        let out = src.search(&SearchQuery::new("tesla", 10)).await.unwrap();
        assert_eq!(out.len(), 2);
        assert!(out[0].date.is_some());
        assert_eq!(out[1].source, "");
    }

    #[test]
    fn bad_fixture_is_an_error() {
        assert!(StaticSource::from_fixture("{not json").is_err());
    }
}
