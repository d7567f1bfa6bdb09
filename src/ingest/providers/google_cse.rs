// src/ingest/providers/google_cse.rs
use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use metrics::histogram;
use serde::Deserialize;

use crate::config::SearchConfig;
use crate::error::ConfigurationError;
use crate::headline::HeadlineRecord;
use crate::ingest::types::{HeadlineSource, SearchQuery};

/// The API never serves results past index 100.
const MAX_START_INDEX: usize = 91;
const PAGE_SIZE: usize = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
    #[serde(rename = "displayLink")]
    display_link: Option<String>,
    #[serde(rename = "publishedTime")]
    published_time: Option<String>,
    pagemap: Option<PageMap>,
}

#[derive(Debug, Deserialize)]
struct PageMap {
    #[serde(default)]
    metatags: Vec<HashMap<String, serde_json::Value>>,
}

impl Item {
    fn published_at(&self) -> Option<DateTime<Utc>> {
        let from_field = self
            .published_time
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc2822(s.trim()).ok());
        let from_meta = || {
            self.pagemap
                .as_ref()?
                .metatags
                .iter()
                .find_map(|m| m.get("article:published_time")?.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        };
        from_field.or_else(from_meta).map(|d| d.with_timezone(&Utc))
    }

    fn into_record(self) -> HeadlineRecord {
        let date = self.published_at();
        HeadlineRecord {
            query: String::new(),
            title: self.title.unwrap_or_default(),
            link: self.link.unwrap_or_default(),
            snippet: self
                .snippet
                .unwrap_or_else(|| "No snippet available".to_string()),
            source: self
                .display_link
                .unwrap_or_else(|| "Unknown source".to_string()),
            date,
        }
    }
}

/// `"k1 AND k2" site:news after:YYYY-MM-DD before:YYYY-MM-DD`
pub fn refined_query(keywords: &[String], window: Option<(NaiveDate, NaiveDate)>) -> String {
    let mut q = format!("\"{}\" site:news", keywords.join(" AND "));
    if let Some((start, end)) = window {
        q.push_str(&format!(
            " after:{} before:{}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        ));
    }
    q
}

/// Google Programmable Search (Custom Search JSON API).
pub struct GoogleCseSource {
    http: reqwest::Client,
    api_key: String,
    cse_id: String,
    base_url: String,
}

impl GoogleCseSource {
    pub fn new(api_key: String, cse_id: String) -> Self {
        Self {
            http: reqwest::Client::builder()
                .user_agent("sentiment-sentinel/0.1")
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            api_key,
            cse_id,
            base_url: "https://www.googleapis.com/customsearch/v1".to_string(),
        }
    }

    /// Both the API key and the engine id are required.
    pub fn from_config(cfg: &SearchConfig) -> Result<Self, ConfigurationError> {
        let key = cfg
            .api_key()
            .ok_or(ConfigurationError::MissingCredential("GOOGLE_API_KEY"))?;
        let cse = cfg
            .cse_id()
            .ok_or(ConfigurationError::MissingCredential("GOOGLE_CSE_ID"))?;
        Ok(Self::new(key, cse))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_page(&self, q: &str, start: usize) -> Result<Vec<Item>> {
        let start_s = start.to_string();
        let num_s = PAGE_SIZE.to_string();
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cse_id.as_str()),
                ("q", q),
                ("num", num_s.as_str()),
                ("start", start_s.as_str()),
            ])
            .send()
            .await
            .context("custom search request")?;

        if !resp.status().is_success() {
            anyhow::bail!("custom search returned status {}", resp.status());
        }
        let body: SearchResponse = resp.json().await.context("parsing custom search json")?;
        Ok(body.items)
    }
}

#[async_trait]
impl HeadlineSource for GoogleCseSource {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<HeadlineRecord>> {
        let t0 = std::time::Instant::now();
        let q = refined_query(&query.keywords, query.window);

        let mut items = Vec::new();
        let mut start = 1usize;
        while items.len() < query.max_results && start <= MAX_START_INDEX {
            let page = self.fetch_page(&q, start).await?;
            let n = page.len();
            items.extend(page);
            if n < PAGE_SIZE {
                break;
            }
            start += PAGE_SIZE;
        }
        items.truncate(query.max_results);

        histogram!("retrieval_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(items.into_iter().map(Item::into_record).collect())
    }

    fn name(&self) -> &'static str {
        "google_cse"
    }
}
