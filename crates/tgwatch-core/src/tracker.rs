//! Tracker facade: wires capture, cache, read positions, classification and
//! forwarding together, and owns the eviction timer.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    cache::{CachedMessage, MessageCache},
    capture::SnapshotCapture,
    classifier::{ForwardJob, NotificationClassifier},
    domain::{CacheKey, UserId},
    forwarder::Forwarder,
    messaging::port::NoticeSink,
    peers::IgnoredPeers,
    ports::{DisplayNameResolver, MediaSource},
    protocol::{IncomingMessage, Notification},
    read_positions::ReadPositions,
};

pub const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const EVICT_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// Floor for `evict_interval`; a zero period would panic the timer.
pub const MIN_EVICT_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Clone, Debug)]
pub struct TrackerSettings {
    /// The watching account; its own messages are never cached.
    pub self_id: UserId,
    pub cache_ttl: Duration,
    pub evict_interval: Duration,
    pub min_edit_changed_chars: usize,
    pub forward_disappearing_media: bool,
    pub ignored_peers: Vec<i64>,
}

impl TrackerSettings {
    pub fn new(self_id: UserId) -> Self {
        Self {
            self_id,
            cache_ttl: CACHE_TTL,
            evict_interval: EVICT_INTERVAL,
            min_edit_changed_chars: 1,
            forward_disappearing_media: true,
            ignored_peers: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    settings: TrackerSettings,
    cache: MessageCache,
    reads: ReadPositions,
    ignored: IgnoredPeers,
    capture: SnapshotCapture,
    forwarder: Forwarder,
    evictor: Mutex<Option<Evictor>>,
}

struct Evictor {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Drop for TrackerInner {
    fn drop(&mut self) {
        if let Some(evictor) = self.evictor.get_mut().take() {
            evictor.cancel.cancel();
        }
    }
}

impl TrackerInner {
    fn evict_expired_at(&self, now: Instant) -> usize {
        let evicted = self.cache.evict_expired_at(self.settings.cache_ttl, now);
        if evicted > 0 {
            info!(
                evicted,
                remaining = self.cache.len(),
                "evicted expired cache entries"
            );
        }
        evicted
    }
}

impl Tracker {
    pub fn new(
        mut settings: TrackerSettings,
        media: Arc<dyn MediaSource>,
        names: Arc<dyn DisplayNameResolver>,
        sink: Arc<dyn NoticeSink>,
    ) -> Self {
        settings.evict_interval = settings.evict_interval.max(MIN_EVICT_INTERVAL);
        let capture = SnapshotCapture::new(settings.self_id, media, names);
        let ignored = IgnoredPeers::new(settings.ignored_peers.iter().copied());
        Self {
            inner: Arc::new(TrackerInner {
                settings,
                cache: MessageCache::new(),
                reads: ReadPositions::new(),
                ignored,
                capture,
                forwarder: Forwarder::new(sink),
                evictor: Mutex::new(None),
            }),
        }
    }

    /// Start the periodic eviction sweep. Returns false if already running.
    pub async fn start(&self) -> bool {
        let mut slot = self.inner.evictor.lock().await;
        if slot.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let every = self.inner.settings.evict_interval;
        // Weak so an abandoned tracker is not kept alive by its own timer.
        let inner = Arc::downgrade(&self.inner);
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            loop {
                tokio::select! {
                  _ = token.cancelled() => break,
                  _ = ticker.tick() => {
                    let Some(inner) = inner.upgrade() else { break; };
                    inner.evict_expired_at(Instant::now());
                  }
                }
            }
        });

        *slot = Some(Evictor { cancel, handle });
        info!(
            ttl_secs = self.inner.settings.cache_ttl.as_secs(),
            "deleted message tracker started"
        );
        true
    }

    pub async fn stop(&self) {
        let evictor = self.inner.evictor.lock().await.take();
        if let Some(evictor) = evictor {
            evictor.cancel.cancel();
            let _ = evictor.handle.await;
            info!("deleted message tracker stopped");
        }
    }

    /// Retain a snapshot of an incoming message.
    pub async fn observe(&self, message: IncomingMessage) {
        let inner = &self.inner;
        if inner.ignored.contains(&message.conversation) {
            debug!(
                conversation = %message.conversation.label(),
                "skipping message from ignored peer"
            );
            return;
        }

        let Some(snapshot) = inner.capture.capture(&message, Instant::now()).await else {
            return;
        };

        let disappearing = inner.settings.forward_disappearing_media
            && message
                .media
                .as_ref()
                .and_then(|m| m.ttl_seconds())
                .is_some();
        let pending = disappearing.then(|| snapshot.clone());

        if inner.cache.put(snapshot).is_some() {
            debug!(
                message_id = message.message_id.0,
                "replaced redelivered message"
            );
        }

        if let Some(snapshot) = pending {
            if let Some(media) = &snapshot.media {
                inner
                    .forwarder
                    .send_disappearing_notice(&snapshot, media)
                    .await;
            }
        }
    }

    /// Apply a notification to the cache/read positions. Performs no I/O.
    pub fn route(&self, notification: Notification) -> Vec<ForwardJob> {
        NotificationClassifier {
            cache: &self.inner.cache,
            reads: &self.inner.reads,
            ignored: &self.inner.ignored,
            min_edit_changed_chars: self.inner.settings.min_edit_changed_chars,
        }
        .classify(notification, Instant::now())
    }

    /// Deliver forwarding decisions. Failures are logged, never returned.
    pub async fn forward(&self, jobs: Vec<ForwardJob>) {
        for job in jobs {
            match job {
                ForwardJob::Deleted(cached) => {
                    self.inner.forwarder.send_deletion_notice(&cached).await
                }
                ForwardJob::Edited {
                    cached,
                    new_text,
                    media_changed,
                    new_media,
                } => {
                    if let Some(plan) = &new_media {
                        let retained = self.inner.capture.retain_media(plan).await;
                        if !self.inner.cache.replace_media(cached.key(), plan, retained) {
                            debug!(
                                message_id = cached.message_id.0,
                                "edited media superseded before download finished"
                            );
                        }
                    }
                    self.inner
                        .forwarder
                        .send_edit_notice(&cached, new_text.as_deref(), media_changed)
                        .await
                }
            }
        }
    }

    pub async fn handle(&self, notification: Notification) {
        let jobs = self.route(notification);
        self.forward(jobs).await;
    }

    /// Replace the runtime ignore set. Peers seeded from settings stay ignored.
    pub fn set_ignored_peers(&self, ids: Vec<i64>) {
        let seeded = self.inner.settings.ignored_peers.iter().copied();
        let count = self.inner.ignored.replace(ids.into_iter().chain(seeded));
        info!(count, "refreshed ignored peers");
    }

    pub fn evict_expired(&self) -> usize {
        self.inner.evict_expired_at(Instant::now())
    }

    pub fn evict_expired_at(&self, now: Instant) -> usize {
        self.inner.evict_expired_at(now)
    }

    pub fn peek(&self, key: CacheKey) -> Option<CachedMessage> {
        self.inner.cache.peek(key)
    }

    pub fn cached_len(&self) -> usize {
        self.inner.cache.len()
    }
}
