use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

use crate::dispatcher::DEFAULT_CACHE_DIR;
use crate::error::Result;
use crate::models::{ChatParams, CompletionParams, EditParams, Mode, RequestParameters};
use crate::rate_limit::RateLimit;
use crate::retry::RetryPolicy;

pub const DEFAULT_API_KEY_PATH: &str = "../openai_api_key.txt";

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "openai-text-api")]
#[command(about = "Cached, retrying wrapper around the OpenAI text APIs")]
pub struct Args {
    // Which endpoint to call
    #[arg(short, long, value_enum, default_value_t = Mode::Chat)]
    pub mode: Mode,

    // JSON file holding the request parameters
    #[arg(short, long, conflicts_with = "prompt")]
    pub params: Option<PathBuf>,

    // Single user prompt, used instead of --params
    #[arg(long, requires = "model")]
    pub prompt: Option<String>,

    // Model for --prompt requests
    #[arg(long)]
    pub model: Option<String>,

    // Temperature for --prompt requests
    #[arg(short, long, default_value_t = 0.0)]
    pub temperature: f64,

    // File whose contents is the API key
    #[arg(long, default_value = DEFAULT_API_KEY_PATH)]
    pub api_key_path: PathBuf,

    // Organization sent with every request
    #[arg(long)]
    pub organization: Option<String>,

    // API base url, e.g. a local proxy
    #[arg(long)]
    pub base_url: Option<String>,

    // Pause after every API call, in seconds
    #[arg(long, default_value_t = 1)]
    pub sleep_time: u64,

    // Where cache files live
    #[arg(long, default_value = DEFAULT_CACHE_DIR)]
    pub cache_dir: PathBuf,

    // Disable caching entirely
    #[arg(long)]
    pub no_cache: bool,

    // Skip cache reads but still write fresh results
    #[arg(long)]
    pub overwrite_cache: bool,

    // Attempts before giving up on transient errors
    #[arg(long, default_value_t = 10)]
    pub max_attempts: u32,

    // Delay between attempts, in seconds
    #[arg(long, default_value_t = 5)]
    pub retry_delay: u64,

    // Dump prometheus metrics to stderr when done
    #[arg(long)]
    pub metrics: bool,
}

impl Args {
    /// Payload for `--prompt`/`--model`, shaped for the selected mode.
    ///
    /// Edit payloads are still built so the dispatcher can reject the mode.
    pub fn prompt_parameters(&self) -> Result<Option<Value>> {
        let (Some(prompt), Some(model)) = (&self.prompt, &self.model) else {
            return Ok(None);
        };
        let params: RequestParameters = match self.mode {
            Mode::Chat => ChatParams::from_prompt(model.as_str(), prompt.as_str(), self.temperature)?.into(),
            Mode::Complete => CompletionParams::new(model.as_str(), prompt.as_str(), self.temperature)?.into(),
            Mode::Edit => EditParams::new(model.as_str(), None, prompt.as_str(), self.temperature)?.into(),
        };
        Ok(Some(params.to_payload()))
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            api_key_path: self.api_key_path.clone(),
            organization: self.organization.clone(),
            base_url: self.base_url.clone(),
            cache_dir: (!self.no_cache).then(|| self.cache_dir.clone()),
            overwrite_cache: self.overwrite_cache,
            retry: RetryPolicy::new(self.max_attempts, Duration::from_secs(self.retry_delay)),
            rate_limit: RateLimit::from_secs(self.sleep_time),
        }
    }
}

/// Everything a one-shot call needs besides the request itself.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub api_key_path: PathBuf,
    pub organization: Option<String>,
    pub base_url: Option<String>,
    // None disables caching
    pub cache_dir: Option<PathBuf>,
    pub overwrite_cache: bool,
    pub retry: RetryPolicy,
    pub rate_limit: RateLimit,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            api_key_path: PathBuf::from(DEFAULT_API_KEY_PATH),
            organization: None,
            base_url: None,
            cache_dir: Some(PathBuf::from(DEFAULT_CACHE_DIR)),
            overwrite_cache: false,
            retry: RetryPolicy::default(),
            rate_limit: RateLimit::default(),
        }
    }
}
