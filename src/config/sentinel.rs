// src/config/sentinel.rs
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_CONFIG_PATH: &str = "config/sentinel.toml";
pub const ENV_CONFIG_PATH: &str = "SENTINEL_CONFIG_PATH";

fn default_true() -> bool {
    true
}
fn default_provider() -> String {
    "gemini".to_string()
}
fn default_env_marker() -> String {
    "ENV".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_min_ms() -> u64 {
    500
}
fn default_max_ms() -> u64 {
    1500
}
fn default_max_results() -> usize {
    10
}
fn default_window_days() -> u32 {
    7
}
fn default_near_duplicate_ratio() -> f64 {
    0.92
}
fn default_history_capacity() -> usize {
    200
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SentinelConfig {
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// "gemini" or "openai". Compared through [`OracleConfig::provider_name`], which trims
    /// and lowercases, so `"OpenAI"` selects the OpenAI provider. Anything else disables
    /// the oracle.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Provider default when absent.
    #[serde(default)]
    pub model: Option<String>,
    /// "ENV" means: read from GEMINI_API_KEY / OPENAI_API_KEY (by provider)
    #[serde(default = "default_env_marker")]
    pub api_key: String,
    /// Ceiling for one oracle round trip.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: default_provider(),
            model: None,
            api_key: default_env_marker(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl OracleConfig {
    /// Resolved credential, `None` when nothing usable is configured.
    /// Provider as matched by the oracle factory: trimmed, lowercase.
    pub fn provider_name(&self) -> String {
        self.provider.trim().to_ascii_lowercase()
    }

    pub fn credential(&self) -> Option<String> {
        let var = match self.provider_name().as_str() {
            "openai" => "OPENAI_API_KEY",
            _ => "GEMINI_API_KEY",
        };
        resolve_secret(&self.api_key, var)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_min_ms")]
    pub min_ms: u64,
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_ms: default_min_ms(),
            max_ms: default_max_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// "ENV" means: read from GOOGLE_API_KEY
    #[serde(default = "default_env_marker")]
    pub api_key: String,
    /// "ENV" means: read from GOOGLE_CSE_ID
    #[serde(default = "default_env_marker")]
    pub cse_id: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    /// Titles at or above this normalized similarity count as duplicates.
    #[serde(default = "default_near_duplicate_ratio")]
    pub near_duplicate_ratio: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: default_env_marker(),
            cse_id: default_env_marker(),
            max_results: default_max_results(),
            window_days: default_window_days(),
            near_duplicate_ratio: default_near_duplicate_ratio(),
        }
    }
}

impl SearchConfig {
    pub fn api_key(&self) -> Option<String> {
        resolve_secret(&self.api_key, "GOOGLE_API_KEY")
    }

    pub fn cse_id(&self) -> Option<String> {
        resolve_secret(&self.cse_id, "GOOGLE_CSE_ID")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
        }
    }
}

impl SentinelConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.as_ref().display()))?;
        Self::parse(&data)
    }

    pub fn parse(data: &str) -> anyhow::Result<Self> {
        let mut cfg: SentinelConfig = toml::from_str(data)?;
        cfg.normalize();
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $SENTINEL_CONFIG_PATH (must exist)
    /// 2) config/sentinel.toml
    /// 3) built-in defaults
    ///
    /// Env overrides are applied last.
    pub fn load_default() -> anyhow::Result<Self> {
        let mut cfg = if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                anyhow::bail!("{ENV_CONFIG_PATH} points to non-existent path");
            }
            Self::load_from_file(&pb)?
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::load_from_file(DEFAULT_CONFIG_PATH)?
        } else {
            Self::default()
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// `SENTINEL_PACING=off` disables call spacing (tests, local runs).
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("SENTINEL_PACING") {
            if matches!(v.trim().to_ascii_lowercase().as_str(), "off" | "0" | "false") {
                self.pacing.enabled = false;
            }
        }
    }

    fn normalize(&mut self) {
        self.oracle.provider = self.oracle.provider_name();
        if self.pacing.min_ms > self.pacing.max_ms {
            // swap to keep a valid interval
            std::mem::swap(&mut self.pacing.min_ms, &mut self.pacing.max_ms);
        }
        if !(0.0..=1.0).contains(&self.search.near_duplicate_ratio) {
            self.search.near_duplicate_ratio = default_near_duplicate_ratio();
        }
        if self.search.max_results == 0 {
            self.search.max_results = default_max_results();
        }
    }
}

/// `"ENV"` (any case) reads `var`; anything else is taken literally. Blank means absent.
fn resolve_secret(raw: &str, var: &str) -> Option<String> {
    let raw = raw.trim();
    let value = if raw.eq_ignore_ascii_case("env") {
        env::var(var).ok()?
    } else {
        raw.to_string()
    };
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}
