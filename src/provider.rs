//! Provider client: prompt in, generated code out, deterministically.
//!
//! The network client forwards the deterministic parameters verbatim; the
//! cache layer sits above it and is keyed by prompt digest plus provider
//! identity, so a warm cache never touches the network.

use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderErrorKind};
use crate::util::{sha256_hex, write_atomic};
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

/// Deterministic request parameters forwarded verbatim to the provider.
#[derive(Debug, Clone)]
pub struct ProviderParams {
    pub seed: u64,
    pub temperature: f64,
    pub max_tokens: Option<u64>,
}

impl ProviderParams {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            seed: config.seed,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Port to the LLM endpoint: a prompt reduces to generated text.
pub trait Provider {
    fn complete(&self, prompt: &str, params: &ProviderParams) -> Result<String, ProviderError>;

    /// Identity string `<kind>:<model>` that scopes hashes and cache keys.
    fn identity(&self) -> String;
}

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 250;

/// OpenAI-compatible chat-completions client.
pub struct HttpProvider {
    config: ProviderConfig,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl HttpProvider {
    pub fn new(config: ProviderConfig, api_key: String) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|err| {
                ProviderError::new(ProviderErrorKind::Network, format!("build client: {err}"))
            })?;
        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    fn request_once(&self, prompt: &str, params: &ProviderParams) -> Result<String, ProviderError> {
        let mut body = json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "seed": params.seed,
            "temperature": params.temperature,
        });
        if let Some(max_tokens) = params.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .map_err(|err| {
                let detail = if err.is_timeout() {
                    format!("request timed out after {}s", self.config.timeout)
                } else {
                    format!("request failed: {err}")
                };
                ProviderError::new(ProviderErrorKind::Network, detail)
            })?;

        let status = response.status();
        if !status.is_success() {
            let kind = match status.as_u16() {
                401 | 403 => ProviderErrorKind::Auth,
                429 => ProviderErrorKind::Quota,
                500..=599 => ProviderErrorKind::Network,
                _ => ProviderErrorKind::Protocol,
            };
            let body = response.text().unwrap_or_default();
            return Err(ProviderError::new(
                kind,
                format!("HTTP {status}: {}", crate::util::truncate_string(&body, 500)),
            ));
        }

        let payload: Value = response.json().map_err(|err| {
            ProviderError::new(ProviderErrorKind::Protocol, format!("decode response: {err}"))
        })?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                ProviderError::new(
                    ProviderErrorKind::Malformed,
                    "response has no choices[0].message.content",
                )
            })?;
        Ok(content.to_string())
    }
}

impl Provider for HttpProvider {
    fn complete(&self, prompt: &str, params: &ProviderParams) -> Result<String, ProviderError> {
        let mut last_error: Option<ProviderError> = None;
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                thread::sleep(Duration::from_millis(BACKOFF_BASE_MS << (attempt - 1)));
            }
            match self.request_once(prompt, params) {
                Ok(content) => return Ok(content),
                Err(err) if err.kind.retryable() => last_error = Some(err),
                Err(err) => return Err(err),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            ProviderError::new(ProviderErrorKind::Network, "retries exhausted")
        }))
    }

    fn identity(&self) -> String {
        self.config.identity()
    }
}

/// Content-addressed completion cache wrapped around any provider.
///
/// Entries are append-only: a key is a pure function of the prompt digest and
/// the provider identity, so a changed prompt simply misses.
pub struct CachedProvider {
    inner: Box<dyn Provider>,
    cache_dir: PathBuf,
}

impl CachedProvider {
    pub fn new(inner: Box<dyn Provider>, cache_dir: PathBuf) -> Self {
        Self { inner, cache_dir }
    }

    fn cache_path(&self, prompt_hash: &str) -> PathBuf {
        let key = sha256_hex(format!("{prompt_hash}\n{}", self.inner.identity()).as_bytes());
        self.cache_dir.join(format!("{key}.bin"))
    }

    /// Complete with caching; `bypass_cache` skips the read path but still
    /// records the fresh completion.
    pub fn complete_cached(
        &self,
        prompt: &str,
        prompt_hash: &str,
        params: &ProviderParams,
        bypass_cache: bool,
    ) -> Result<String, ProviderError> {
        let path = self.cache_path(prompt_hash);
        if !bypass_cache {
            if let Ok(bytes) = fs::read(&path) {
                return String::from_utf8(bytes).map_err(|err| {
                    ProviderError::new(
                        ProviderErrorKind::Malformed,
                        format!("cache entry {} is not UTF-8: {err}", path.display()),
                    )
                });
            }
        }
        let completion = self.inner.complete(prompt, params)?;
        // A failed cache write must not lose the completion.
        if let Err(err) = write_atomic(&path, completion.as_bytes()) {
            eprintln!("warning: failed to cache completion at {}: {err}", path.display());
        }
        Ok(completion)
    }

    pub fn identity(&self) -> String {
        self.inner.identity()
    }
}

/// Strip markdown fences and per-line trailing whitespace from a completion,
/// ending with exactly one newline.
pub fn clean_generated_code(raw: &str) -> String {
    let trimmed = raw.trim();
    let body = if trimmed.starts_with("```") {
        let mut lines: Vec<&str> = trimmed.lines().collect();
        lines.remove(0);
        if let Some(last) = lines.iter().rposition(|line| line.trim() == "```") {
            lines.truncate(last);
        }
        lines.join("\n")
    } else {
        trimmed.to_string()
    };
    let mut cleaned = body
        .trim()
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    cleaned.push('\n');
    cleaned
}
