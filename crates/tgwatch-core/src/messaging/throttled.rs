use std::{sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    messaging::{port::NoticeSink, types::OutgoingMedia},
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between outbound calls. Everything goes to one chat, so
    /// this mirrors Telegram's ~1 msg/sec per-chat limit.
    pub min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(1050),
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve_at(&mut self, now: Instant) -> Duration {
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// NoticeSink decorator that spaces out outbound calls.
///
/// A burst of deletions (e.g. a cleared chat) otherwise turns into a burst of
/// uploads and a flood-control error.
pub struct ThrottledSink {
    inner: Arc<dyn NoticeSink>,
    limiter: Mutex<IntervalLimiter>,
}

impl ThrottledSink {
    pub fn new(inner: Arc<dyn NoticeSink>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            limiter: Mutex::new(IntervalLimiter::new(cfg.min_interval)),
        }
    }

    async fn throttle(&self) {
        let wait = { self.limiter.lock().await.reserve_at(Instant::now()) };
        if wait > Duration::ZERO {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl NoticeSink for ThrottledSink {
    async fn send_text(&self, text: &str) -> Result<()> {
        self.throttle().await;
        self.inner.send_text(text).await
    }

    async fn send_media(&self, media: OutgoingMedia) -> Result<()> {
        self.throttle().await;
        self.inner.send_media(media).await
    }
}
