//! Time-bounded cache of recently seen messages.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};

use crate::{
    domain::{CacheKey, ConversationKey, MessageId, UserId},
    media::{MediaKind, RetentionPlan},
};

/// Media bytes captured at observation time.
///
/// The server discards the payload once a message is deleted, so this copy is
/// the only one left by the time a notice is sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetainedMedia {
    pub kind: MediaKind,
    pub mime_type: String,
    pub file_name: String,
    pub bytes: Arc<[u8]>,
}

/// Retained snapshot of a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedMessage {
    pub conversation: ConversationKey,
    pub message_id: MessageId,
    pub sender_id: Option<UserId>,
    /// Resolved once at observation time; never refreshed.
    pub sender_name: String,
    pub text: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub content_description: Option<String>,
    pub media: Option<RetainedMedia>,
    /// Source of `media`; an edit that changes it invalidates the bytes.
    pub media_plan: Option<RetentionPlan>,
    /// Local insertion (or last edit) time; only used for eviction.
    pub cached_at: Instant,
}

impl CachedMessage {
    pub fn key(&self) -> CacheKey {
        CacheKey::new(self.conversation.scope(), self.message_id)
    }
}

/// Shared handle to the cache map.
///
/// A single mutex guards the map; it is never held across an await, so media
/// downloads and notice dispatch happen outside of it.
#[derive(Clone, Default)]
pub struct MessageCache {
    entries: Arc<Mutex<HashMap<CacheKey, CachedMessage>>>,
}

impl MessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CachedMessage>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a snapshot, replacing any live entry with the same key.
    ///
    /// Returns the replaced entry (redelivered updates overwrite, never duplicate).
    pub fn put(&self, snapshot: CachedMessage) -> Option<CachedMessage> {
        self.lock().insert(snapshot.key(), snapshot)
    }

    /// Remove and return the entry. A second `take` of the same key yields `None`.
    pub fn take(&self, key: CacheKey) -> Option<CachedMessage> {
        self.lock().remove(&key)
    }

    /// Copy of the entry, left in place.
    pub fn peek(&self, key: CacheKey) -> Option<CachedMessage> {
        self.lock().get(&key).cloned()
    }

    /// Apply an edit in place and refresh `cached_at`. Returns false if absent.
    pub fn revise(&self, key: CacheKey, now: Instant, apply: impl FnOnce(&mut CachedMessage)) -> bool {
        let mut map = self.lock();
        let Some(entry) = map.get_mut(&key) else {
            return false;
        };
        apply(entry);
        entry.cached_at = now;
        true
    }

    /// Store freshly downloaded bytes, unless the entry is gone or a later
    /// edit already pointed it at other media.
    pub fn replace_media(
        &self,
        key: CacheKey,
        plan: &RetentionPlan,
        media: Option<RetainedMedia>,
    ) -> bool {
        let mut map = self.lock();
        match map.get_mut(&key) {
            Some(entry) if entry.media_plan.as_ref() == Some(plan) => {
                entry.media = media;
                true
            }
            _ => false,
        }
    }

    pub fn evict_expired(&self, ttl: Duration) -> usize {
        self.evict_expired_at(ttl, Instant::now())
    }

    /// Drop every entry older than `ttl` at `now`. Never triggers forwarding.
    pub fn evict_expired_at(&self, ttl: Duration, now: Instant) -> usize {
        let mut map = self.lock();
        let before = map.len();
        map.retain(|_, entry| now.saturating_duration_since(entry.cached_at) <= ttl);
        before - map.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
