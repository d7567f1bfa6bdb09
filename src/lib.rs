// src/lib.rs
// Public library surface for the binary and the integration tests.

pub mod aggregate;
pub mod analyze;
pub mod api;
pub mod category;
pub mod config;
pub mod error;
pub mod headline;
pub mod history;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod sentiment;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{aggregate, AggregateSummary};
pub use crate::api::{router, AppState};
pub use crate::category::{categorize, SentimentCategory};
pub use crate::error::{ConfigurationError, PipelineError};
pub use crate::headline::{HeadlineRecord, ScoredHeadline, Scorer};
pub use crate::pipeline::{score_batch, Analysis, AnalysisRequest, CancelFlag, Pipeline};

use axum::Router;
use tracing::info;

use crate::config::SentinelConfig;

/// Build the full HTTP app from `config/sentinel.toml` (or `SENTINEL_CONFIG_PATH`) plus
/// environment overrides. `/metrics` is mounted only when `METRICS_ENABLED=1`.
pub async fn app() -> anyhow::Result<Router> {
    let metrics_on = std::env::var("METRICS_ENABLED")
        .ok()
        .is_some_and(|v| v == "1");
    // Recorder goes in before anything registers metric descriptions.
    let metrics = if metrics_on {
        Some(crate::metrics::Metrics::init()?)
    } else {
        None
    };

    let cfg = SentinelConfig::load_default()?;
    info!(
        oracle_enabled = cfg.oracle.enabled,
        provider = %cfg.oracle.provider,
        pacing = cfg.pacing.enabled,
        "configuration loaded"
    );

    let mut app = router(AppState::from_config(&cfg));
    if let Some(m) = metrics {
        app = app.merge(m.router());
    }
    Ok(app)
}
