use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, TextEncoder, register_counter, register_histogram};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("text_api_requests_total", "Total number of dispatched requests").unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("text_api_cache_hits_total", "Total cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("text_api_cache_misses_total", "Total cache misses").unwrap();
    pub static ref API_ATTEMPTS: Counter =
        register_counter!("text_api_vendor_attempts_total", "Total vendor API calls, retries included").unwrap();
    pub static ref API_FAILURES: Counter =
        register_counter!("text_api_vendor_failures_total", "Total failed vendor API calls").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "text_api_request_latency_seconds",
        "Dispatch latency in seconds, rate-limit pause included"
    )
    .unwrap();
}

// Text exposition of everything registered in the default registry
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
