use std::time::Duration;
use tracing::debug;

// Fixed pause after every call that reached the vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub pause: Duration,
}

impl RateLimit {
    pub fn new(pause: Duration) -> Self {
        Self { pause }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub async fn wait(&self) {
        if self.pause.is_zero() {
            return;
        }
        debug!("rate limit pause {:?}", self.pause);
        tokio::time::sleep(self.pause).await;
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::from_secs(1)
    }
}
