// src/ingest/mod.rs
pub mod providers;
pub mod types;

use crate::headline::HeadlineRecord;
use crate::ingest::types::{HeadlineSource, SearchQuery};
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "retrieval_kept_total",
            "Headlines kept after normalization + filtering."
        );
        describe_counter!(
            "retrieval_filtered_total",
            "Headlines dropped because no keyword matched the title."
        );
        describe_counter!(
            "retrieval_dedup_total",
            "Headlines dropped as exact or near duplicates."
        );
        describe_counter!("retrieval_errors_total", "Headline source errors.");
        describe_counter!("oracle_requests_total", "Remote oracle calls attempted.");
        describe_counter!("oracle_failures_total", "Remote oracle failures by kind.");
        describe_counter!(
            "sentiment_fallback_total",
            "Headlines scored by the lexicon after an oracle failure."
        );
        describe_counter!("headlines_scored_total", "Headlines scored.");
        describe_counter!("headlines_skipped_total", "Records skipped for a missing title.");
        describe_counter!("pipeline_cancelled_total", "Batches cancelled mid-way.");
        describe_histogram!("oracle_latency_ms", "Oracle round trip in milliseconds.");
    });
}

/// Normalize a title: decode entities, strip tags, collapse whitespace, trim.
pub fn normalize_title(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Collapse whitespace (incl. NBSP)
    out = out.split_whitespace().collect::<Vec<_>>().join(" ");

    // 4) Length cap: 500 chars
    if out.chars().count() > 500 {
        out = out.chars().take(500).collect();
    }

    out
}

/// Comma-separated query → trimmed, non-empty keywords.
pub fn split_keywords(query: &str) -> Vec<String> {
    query
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Case-insensitive: does any keyword occur in the title? No keywords → always true.
pub fn title_matches<S: AsRef<str>>(title: &str, keywords: &[S]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let t = title.to_lowercase();
    keywords
        .iter()
        .any(|k| t.contains(&k.as_ref().to_lowercase()))
}

fn is_duplicate(a: &HeadlineRecord, b: &HeadlineRecord, ratio: f64) -> bool {
    if !a.link.is_empty() && a.link == b.link {
        return true;
    }
    strsim::normalized_levenshtein(&a.title.to_lowercase(), &b.title.to_lowercase()) >= ratio
}

/// Keyword filter, de-duplication (same link or near-identical title), newest first
/// (unknown dates last), truncate. Returns `(kept, filtered_count, dedup_count)`.
pub fn filter_dedup_sort(
    raw: Vec<HeadlineRecord>,
    keywords: &[String],
    max_results: usize,
    near_duplicate_ratio: f64,
) -> (Vec<HeadlineRecord>, usize, usize) {
    let mut filtered_out = 0usize;
    let mut dedup_out = 0usize;
    let mut keep: Vec<HeadlineRecord> = Vec::with_capacity(raw.len());

    for mut rec in raw {
        rec.title = normalize_title(&rec.title);
        if rec.title.is_empty() || !title_matches(&rec.title, keywords) {
            filtered_out += 1;
            continue;
        }
        if keep
            .iter()
            .any(|k| is_duplicate(k, &rec, near_duplicate_ratio))
        {
            dedup_out += 1;
            continue;
        }
        keep.push(rec);
    }

    // Option orders None < Some, so descending puts unknown dates last. Stable.
    keep.sort_by(|a, b| b.date.cmp(&a.date));
    keep.truncate(max_results);

    (keep, filtered_out, dedup_out)
}

/// Query one source and post-process its results. Every record is tagged with the query.
pub async fn fetch_headlines(
    source: &dyn HeadlineSource,
    query: &SearchQuery,
    near_duplicate_ratio: f64,
) -> anyhow::Result<Vec<HeadlineRecord>> {
    ensure_metrics_described();

    let mut raw = source.search(query).await.map_err(|e| {
        counter!("retrieval_errors_total").increment(1);
        e
    })?;
    for r in raw.iter_mut() {
        r.query = query.text.clone();
    }

    let (kept, filtered, dedup) =
        filter_dedup_sort(raw, &query.keywords, query.max_results, near_duplicate_ratio);

    counter!("retrieval_kept_total").increment(kept.len() as u64);
    counter!("retrieval_filtered_total").increment(filtered as u64);
    counter!("retrieval_dedup_total").increment(dedup as u64);
    tracing::info!(
        target: "retrieval",
        source = source.name(),
        query = %query.text,
        kept = kept.len(),
        filtered,
        dedup,
        "headlines retrieved"
    );

    Ok(kept)
}
