//! Oracle adapter: provider abstraction + reply normalization + timeout ceiling.
//!
//! A provider only knows how to ship a prompt and hand back the raw reply text.
//! [`OracleAdapter`] turns that untrusted text into a score in `[-1, 1]`:
//! parse, reject NaN, clamp into `[-10, 10]`, divide by 10.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::OracleConfig;

/// Lower/upper bound of the scale the oracle is asked to answer on.
pub const ORACLE_SCALE: f64 = 10.0;

const USER_AGENT: &str = "sentiment-sentinel/0.1";

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// No credential available for the call.
    #[error("oracle unconfigured: no credential")]
    Unconfigured,
    /// Network or service level failure, including timeouts and non-2xx replies.
    #[error("oracle transport failure: {0}")]
    TransportFailure(String),
    /// The reply did not contain a usable number.
    #[error("oracle reply not a number: {0:?}")]
    UnparsableResponse(String),
}

impl OracleError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OracleError::Unconfigured => "unconfigured",
            OracleError::TransportFailure(_) => "transport_failure",
            OracleError::UnparsableResponse(_) => "unparsable_response",
        }
    }
}

/// Scores one headline remotely.
pub trait SentimentOracle: Send + Sync {
    /// Normalized score in `[-1, 1]` or a classified failure.
    fn score<'a>(
        &'a self,
        headline: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<f64, OracleError>> + Send + 'a>>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
    /// `false` when every call is known to fail with `Unconfigured`.
    fn is_configured(&self) -> bool {
        true
    }
}

pub type DynOracle = Arc<dyn SentimentOracle>;

/// Instruction sent with every headline.
pub fn build_prompt(headline: &str) -> String {
    format!(
        "Please analyze the sentiment of the following headline and return only the sentiment score \
         between -10 (negative) and 10 (positive), no explanations or reasons: {headline}."
    )
}

/// Parse the raw reply and normalize it into `[-1, 1]`.
///
/// Surrounding whitespace, quotes, backticks and markdown emphasis are tolerated;
/// anything else that is not a plain number is rejected. Infinite values are clamped.
pub fn parse_reply(raw: &str) -> Result<f64, OracleError> {
    let t = raw
        .trim()
        .trim_matches(|c: char| matches!(c, '`' | '"' | '\'' | '*'))
        .trim();
    let value: f64 = t
        .parse()
        .map_err(|_| OracleError::UnparsableResponse(sanitize_reply(raw)))?;
    if value.is_nan() {
        return Err(OracleError::UnparsableResponse(sanitize_reply(raw)));
    }
    Ok(value.clamp(-ORACLE_SCALE, ORACLE_SCALE) / ORACLE_SCALE)
}

/// Factory: build an oracle according to config and environment variables.
///
/// * If `ORACLE_TEST_MODE=mock`, returns a deterministic mock that always answers `0`.
/// * Else if `config.enabled == false`, returns a disabled oracle.
/// * Else builds the configured provider. A missing credential still yields an oracle;
///   its calls fail with `Unconfigured` so the policy falls back.
pub fn build_oracle_from_config(config: &OracleConfig) -> DynOracle {
    let timeout = config.timeout();

    if std::env::var("ORACLE_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(OracleAdapter::new(MockProvider::fixed("0"), timeout));
    }

    if !config.enabled {
        return Arc::new(DisabledOracle);
    }

    let key = config.credential();
    if key.is_none() {
        warn!(
            target: "oracle",
            provider = %config.provider,
            "no oracle credential configured; lexicon fallback will be used"
        );
    }

    match config.provider_name().as_str() {
        "gemini" => Arc::new(OracleAdapter::new(
            GeminiProvider::new(key, config.model.as_deref(), timeout),
            timeout,
        )),
        "openai" => Arc::new(OracleAdapter::new(
            OpenAiProvider::new(key, config.model.as_deref(), timeout),
            timeout,
        )),
        other => {
            warn!(target: "oracle", provider = other, "unsupported oracle provider; disabled");
            Arc::new(DisabledOracle)
        }
    }
}

// ------------------------------------------------------------
// Provider abstraction + concrete providers
// ------------------------------------------------------------

/// Low-level provider: does the *real* remote call and returns the reply verbatim.
pub trait Provider: Send + Sync + 'static {
    fn fetch<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, OracleError>> + Send + 'a>>;
    fn name(&self) -> &'static str;
    fn has_credential(&self) -> bool {
        true
    }
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(4).min(timeout))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Only a complete body that is not the expected JSON counts as unparsable.
fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, OracleError> {
    serde_json::from_slice(bytes).map_err(|e| OracleError::UnparsableResponse(e.to_string()))
}

fn transport(e: reqwest::Error) -> OracleError {
    if e.is_timeout() {
        OracleError::TransportFailure("request timed out".to_string())
    } else {
        OracleError::TransportFailure(e.to_string())
    }
}

/// Google Gemini `generateContent`. Default model `gemini-2.0-flash`.
pub struct GeminiProvider {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: Option<String>, model: Option<&str>, timeout: Duration) -> Self {
        Self {
            http: http_client(timeout),
            api_key,
            model: model.unwrap_or("gemini-2.0-flash").to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
        }
    }

    /// Point at a different host (proxies, local fakes).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Provider for GeminiProvider {
    fn fetch<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, OracleError>> + Send + 'a>> {
        Box::pin(async move {
            let key = self.api_key.as_deref().ok_or(OracleError::Unconfigured)?;

            #[derive(Serialize)]
            struct Part<'a> {
                text: &'a str,
            }
            #[derive(Serialize)]
            struct Content<'a> {
                parts: Vec<Part<'a>>,
            }
            #[derive(Serialize)]
            #[serde(rename_all = "camelCase")]
            struct GenerationConfig {
                temperature: f32,
                max_output_tokens: u32,
            }
            #[derive(Serialize)]
            #[serde(rename_all = "camelCase")]
            struct Req<'a> {
                contents: Vec<Content<'a>>,
                generation_config: GenerationConfig,
            }
            #[derive(Deserialize)]
            struct Resp {
                #[serde(default)]
                candidates: Vec<Candidate>,
            }
            #[derive(Deserialize)]
            struct Candidate {
                content: Option<RespContent>,
            }
            #[derive(Deserialize)]
            struct RespContent {
                #[serde(default)]
                parts: Vec<RespPart>,
            }
            #[derive(Deserialize)]
            struct RespPart {
                #[serde(default)]
                text: String,
            }

            let req = Req {
                contents: vec![Content {
                    parts: vec![Part { text: prompt }],
                }],
                generation_config: GenerationConfig {
                    temperature: 0.0,
                    max_output_tokens: 16,
                },
            };

            let url = format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            );
            let resp = self
                .http
                .post(url)
                .header("x-goog-api-key", key)
                .json(&req)
                .send()
                .await
                .map_err(transport)?;

            if !resp.status().is_success() {
                return Err(OracleError::TransportFailure(format!(
                    "gemini returned status {}",
                    resp.status()
                )));
            }
            let bytes = resp.bytes().await.map_err(transport)?;
            let body: Resp = decode(&bytes)?;
            let text = body
                .candidates
                .into_iter()
                .filter_map(|c| c.content)
                .flat_map(|c| c.parts)
                .map(|p| p.text)
                .next()
                .unwrap_or_default();
            Ok(text)
        })
    }
    fn name(&self) -> &'static str {
        "gemini"
    }
    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

/// OpenAI provider (Chat Completions API). Default model `gpt-4o-mini`.
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: Option<String>, model: Option<&str>, timeout: Duration) -> Self {
        Self {
            http: http_client(timeout),
            api_key,
            model: model.unwrap_or("gpt-4o-mini").to_string(),
        }
    }
}

impl Provider for OpenAiProvider {
    fn fetch<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, OracleError>> + Send + 'a>> {
        Box::pin(async move {
            let key = self.api_key.as_deref().ok_or(OracleError::Unconfigured)?;

            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                max_tokens: u32,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: Option<String>,
            }

            let req = Req {
                model: &self.model,
                messages: vec![Msg {
                    role: "user",
                    content: prompt,
                }],
                temperature: 0.0,
                max_tokens: 8,
            };

            let resp = self
                .http
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(key)
                .json(&req)
                .send()
                .await
                .map_err(transport)?;

            if !resp.status().is_success() {
                return Err(OracleError::TransportFailure(format!(
                    "openai returned status {}",
                    resp.status()
                )));
            }
            let bytes = resp.bytes().await.map_err(transport)?;
            let body: Resp = decode(&bytes)?;
            Ok(body
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_default())
        })
    }
    fn name(&self) -> &'static str {
        "openai"
    }
    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Canned replies, handed out in order and then repeated from the start.
pub struct MockProvider {
    replies: Vec<Result<String, OracleError>>,
    next: AtomicUsize,
}

impl MockProvider {
    pub fn fixed(reply: &str) -> Self {
        Self::sequence(vec![Ok(reply.to_string())])
    }

    pub fn failing(err: OracleError) -> Self {
        Self::sequence(vec![Err(err)])
    }

    pub fn sequence(replies: Vec<Result<String, OracleError>>) -> Self {
        Self {
            replies,
            next: AtomicUsize::new(0),
        }
    }

    /// Number of fetches served so far.
    pub fn calls(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }
}

impl Provider for MockProvider {
    fn fetch<'a>(
        &'a self,
        _prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, OracleError>> + Send + 'a>> {
        let i = self.next.fetch_add(1, Ordering::SeqCst);
        let out = if self.replies.is_empty() {
            Err(OracleError::TransportFailure("mock has no replies".to_string()))
        } else {
            self.replies[i % self.replies.len()].clone()
        };
        Box::pin(async move { out })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Fails every call with `Unconfigured`; used when the oracle is switched off.
pub struct DisabledOracle;

impl SentimentOracle for DisabledOracle {
    fn score<'a>(
        &'a self,
        _headline: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<f64, OracleError>> + Send + 'a>> {
        Box::pin(async { Err(OracleError::Unconfigured) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
    fn is_configured(&self) -> bool {
        false
    }
}

// ------------------------------------------------------------
// Adapter: timeout + parsing + telemetry
// ------------------------------------------------------------

pub struct OracleAdapter<P: Provider> {
    inner: P,
    timeout: Duration,
}

impl<P: Provider> OracleAdapter<P> {
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn provider(&self) -> &P {
        &self.inner
    }

    async fn score_impl(&self, headline: &str) -> Result<f64, OracleError> {
        if !self.inner.has_credential() {
            return Err(OracleError::Unconfigured);
        }
        counter!("oracle_requests_total").increment(1);

        let prompt = build_prompt(headline);
        let t0 = Instant::now();
        let reply = match tokio::time::timeout(self.timeout, self.inner.fetch(&prompt)).await {
            Ok(r) => r,
            Err(_) => Err(OracleError::TransportFailure(format!(
                "timed out after {}ms",
                self.timeout.as_millis()
            ))),
        };
        histogram!("oracle_latency_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let result = reply.and_then(|raw| parse_reply(&raw));
        match &result {
            Ok(score) => debug!(target: "oracle", provider = self.inner.name(), score, "oracle scored"),
            Err(e) => {
                counter!("oracle_failures_total", "kind" => e.kind()).increment(1);
            }
        }
        result
    }
}

impl<P: Provider> SentimentOracle for OracleAdapter<P> {
    fn score<'a>(
        &'a self,
        headline: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<f64, OracleError>> + Send + 'a>> {
        Box::pin(self.score_impl(headline))
    }
    fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
    fn is_configured(&self) -> bool {
        self.inner.has_credential()
    }
}

// ------------------------------------------------------------
// Sanitization
// ------------------------------------------------------------

/// ASCII-only, single line, <=80 chars. Keeps error details log-safe.
pub fn sanitize_reply(input: &str) -> String {
    let mut out = String::with_capacity(80);
    let mut prev_space = false;
    for ch in input.chars() {
        let c = match ch {
            '\r' | '\n' | '\t' => ' ',
            c if c.is_ascii() => c,
            _ => '?',
        };
        if c == ' ' {
            if !prev_space && !out.is_empty() {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
        if out.len() >= 80 {
            break;
        }
    }
    out.trim().to_string()
}
