//! Cached, retrying wrapper around the OpenAI chat and completion APIs.
//!
//! Deterministic (zero temperature) requests are fingerprinted and answered
//! from a directory of JSON files when possible. Everything else goes to the
//! vendor through a fixed-delay retry loop followed by a rate-limit pause.

pub mod cache;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod retry;

pub use cache::{ResponseCache, TEMPERATURE_EPSILON, fingerprint};
pub use client::{Credentials, OpenAiClient, TextGenerationClient, VendorError};
pub use config::{Args, DispatchConfig};
pub use dispatcher::{Dispatcher, openai_text_api};
pub use error::{Error, Result};
pub use models::{CacheEntry, ChatMessage, ChatParams, CompletionParams, EditParams, Mode, RequestParameters};
pub use rate_limit::RateLimit;
pub use retry::{FailureKind, RetryOutcome, RetryPolicy, classify};
