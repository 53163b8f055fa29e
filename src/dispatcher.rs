use serde_json::Value;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

use crate::cache::ResponseCache;
use crate::client::{Credentials, OpenAiClient, TextGenerationClient};
use crate::config::DispatchConfig;
use crate::error::{Error, Result};
use crate::metrics::{CACHE_HITS, CACHE_MISSES, REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::{CacheEntry, Mode, RequestParameters};
use crate::rate_limit::RateLimit;
use crate::retry::RetryPolicy;

pub const DEFAULT_CACHE_DIR: &str = "./openai_cache";

/// Cache lookup, vendor call with retries, cache write, rate-limit pause.
///
/// Calls are processed one at a time by whoever owns the dispatcher. Two
/// dispatchers pointed at the same cache directory do not coordinate; the
/// last write to a cache file wins.
pub struct Dispatcher<C> {
    client: C,
    cache: Option<ResponseCache>,
    overwrite_cache: bool,
    retry: RetryPolicy,
    rate_limit: RateLimit,
}

impl<C: TextGenerationClient> Dispatcher<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            cache: Some(ResponseCache::new(DEFAULT_CACHE_DIR)),
            overwrite_cache: false,
            retry: RetryPolicy::default(),
            rate_limit: RateLimit::default(),
        }
    }

    // None turns caching off entirely
    pub fn with_cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.cache = dir.map(ResponseCache::new);
        self
    }

    pub fn with_overwrite_cache(mut self, overwrite: bool) -> Self {
        self.overwrite_cache = overwrite;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    // latency covers cache hits and errors too
    pub async fn dispatch(&self, params: &RequestParameters) -> Result<CacheEntry> {
        REQUEST_TOTAL.inc();
        let start_time = Instant::now();
        let result = self.process(params).await;
        REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
        result
    }

    async fn process(&self, params: &RequestParameters) -> Result<CacheEntry> {
        if params.mode() == Mode::Edit {
            return Err(Error::UnsupportedMode("edit mode is not implemented".to_string()));
        }

        // check cache first
        if let Some(cache) = self.cache.as_ref().filter(|_| !self.overwrite_cache) {
            if let Some(entry) = cache.load(params).await? {
                CACHE_HITS.inc();
                debug!("cache HIT");
                return Ok(entry);
            }
        }
        CACHE_MISSES.inc();
        info!(mode = %params.mode(), model = params.model(), "calling API");

        let prompt = params.prompt();
        let outcome = self.retry.run(|| self.client.generate(params)).await?;
        let entry = CacheEntry {
            prompt,
            response: outcome.into_response(),
        };

        if let Some(cache) = &self.cache {
            cache.store(&entry, params).await?;
        }

        // avoid hammering the API
        self.rate_limit.wait().await;
        Ok(entry)
    }
}

/// One-shot call over loosely-typed parameters.
///
/// The credential file is read before the cache is looked at, so a missing
/// key fails fast even when the answer is cached.
pub async fn openai_text_api(mode: Mode, parameters: Value, config: &DispatchConfig) -> Result<CacheEntry> {
    let credentials = Credentials::from_key_file(&config.api_key_path, config.organization.clone()).await?;
    let params = RequestParameters::from_json(mode, parameters)?;

    let mut client = OpenAiClient::new(credentials);
    if let Some(base_url) = &config.base_url {
        client = client.with_base_url(base_url.clone());
    }

    Dispatcher::new(client)
        .with_cache_dir(config.cache_dir.clone())
        .with_overwrite_cache(config.overwrite_cache)
        .with_retry_policy(config.retry.clone())
        .with_rate_limit(config.rate_limit)
        .dispatch(&params)
        .await
}
