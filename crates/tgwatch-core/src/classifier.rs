//! Routes notifications into cache mutations and forwarding decisions.
//!
//! Classification performs no I/O: it touches the cache and read positions
//! under their locks and returns the notices to send. Delivery is the
//! caller's job.

use std::time::Instant;

use crate::{
    cache::{CachedMessage, MessageCache},
    domain::CacheKey,
    media::{self, RetentionPlan},
    peers::IgnoredPeers,
    protocol::{IncomingMessage, Notification},
    read_positions::ReadPositions,
};

/// A forwarding decision produced by classification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForwardJob {
    Deleted(CachedMessage),
    Edited {
        /// Snapshot as it was before the edit.
        cached: CachedMessage,
        new_text: Option<String>,
        media_changed: bool,
        /// Replacement media to download into the cache.
        new_media: Option<RetentionPlan>,
    },
}

pub struct NotificationClassifier<'a> {
    pub cache: &'a MessageCache,
    pub reads: &'a ReadPositions,
    pub ignored: &'a IgnoredPeers,
    pub min_edit_changed_chars: usize,
}

impl NotificationClassifier<'_> {
    pub fn classify(&self, notification: Notification, now: Instant) -> Vec<ForwardJob> {
        match notification {
            Notification::ReadMarker {
                conversation,
                max_id,
            } => {
                self.reads.mark_read(conversation, max_id);
                Vec::new()
            }
            Notification::Deletion { scope, ids } => ids
                .into_iter()
                .filter_map(|id| self.on_deleted(CacheKey::new(scope, id)))
                .collect(),
            Notification::Edit { message } => {
                let key = CacheKey::new(message.conversation.scope(), message.message_id);
                self.on_edited(key, message, now).into_iter().collect()
            }
        }
    }

    fn on_deleted(&self, key: CacheKey) -> Option<ForwardJob> {
        let cached = self.cache.take(key)?;
        if self.ignored.contains(&cached.conversation) || !self.reads.is_unread(&cached) {
            return None;
        }
        Some(ForwardJob::Deleted(cached))
    }

    /// Stale bytes are dropped as soon as the media changes; the caller
    /// downloads the replacement outside the cache lock.
    fn on_edited(&self, key: CacheKey, message: IncomingMessage, now: Instant) -> Option<ForwardJob> {
        let cached = self.cache.peek(key)?;
        if self.ignored.contains(&cached.conversation) || !self.reads.is_unread(&cached) {
            return None;
        }

        let new_plan = message.media.as_ref().and_then(media::retention_plan);
        let new_description = media::describe(message.media.as_ref());
        let media_changed =
            cached.media_plan != new_plan || cached.content_description != new_description;

        let changed = count_changed_chars(cached.text.as_deref(), message.text.as_deref());
        let text_changed = changed > 0 && changed >= self.min_edit_changed_chars;

        let job = (text_changed || media_changed).then(|| ForwardJob::Edited {
            cached: cached.clone(),
            new_text: message.text.clone(),
            media_changed,
            new_media: new_plan.clone().filter(|_| media_changed),
        });

        self.cache.revise(key, now, |entry| {
            entry.text = message.text;
            if media_changed {
                entry.media = None;
                entry.media_plan = new_plan;
                entry.content_description = new_description;
            }
        });
        job
    }
}

/// Size of the differing middle once the common prefix and suffix are trimmed
/// (the larger of the two sides, in chars). Zero iff the texts are equal.
pub fn count_changed_chars(old: Option<&str>, new: Option<&str>) -> usize {
    let old: Vec<char> = old.unwrap_or_default().chars().collect();
    let new: Vec<char> = new.unwrap_or_default().chars().collect();

    let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    (old.len() - prefix - suffix).max(new.len() - prefix - suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::{tests::snapshot, RetainedMedia},
        domain::{ConversationKey, MessageId, MessageScope, UserId},
        media::MediaKind,
        protocol::{MediaHandle, MessageMedia},
    };

    struct Fixture {
        cache: MessageCache,
        reads: ReadPositions,
        ignored: IgnoredPeers,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                cache: MessageCache::new(),
                reads: ReadPositions::new(),
                ignored: IgnoredPeers::default(),
            }
        }

        fn classify(&self, n: Notification) -> Vec<ForwardJob> {
            self.classify_with_threshold(n, 1)
        }

        fn classify_with_threshold(&self, n: Notification, min: usize) -> Vec<ForwardJob> {
            NotificationClassifier {
                cache: &self.cache,
                reads: &self.reads,
                ignored: &self.ignored,
                min_edit_changed_chars: min,
            }
            .classify(n, Instant::now())
        }
    }

    fn edit(conv: ConversationKey, id: i32, text: Option<&str>) -> Notification {
        let cached = snapshot(conv, id, "");
        Notification::Edit {
            message: IncomingMessage {
                conversation: conv,
                message_id: MessageId(id),
                sender: Some(UserId(100)),
                text: text.map(|s| s.to_string()),
                timestamp: cached.timestamp,
                media: None,
            },
        }
    }

    fn delete(scope: MessageScope, ids: &[i32]) -> Notification {
        Notification::Deletion {
            scope,
            ids: ids.iter().copied().map(MessageId).collect(),
        }
    }

    #[test]
    fn read_markers_update_positions() {
        let fx = Fixture::new();
        let jobs = fx.classify(Notification::ReadMarker {
            conversation: ConversationKey::group(8),
            max_id: MessageId(20),
        });
        assert!(jobs.is_empty());
        assert_eq!(
            fx.reads.high_water(ConversationKey::group(8)),
            Some(MessageId(20))
        );

        fx.classify(Notification::ReadMarker {
            conversation: ConversationKey::channel(8),
            max_id: MessageId(3),
        });
        assert_eq!(
            fx.reads.high_water(ConversationKey::channel(8)),
            Some(MessageId(3))
        );
        assert_eq!(
            fx.reads.high_water(ConversationKey::group(8)),
            Some(MessageId(20))
        );
    }

    #[test]
    fn deleting_unread_message_forwards_once() {
        let fx = Fixture::new();
        fx.cache.put(snapshot(ConversationKey::direct(42), 7, "hello"));

        let jobs = fx.classify(delete(MessageScope::Account, &[7]));
        assert_eq!(jobs.len(), 1);
        assert!(matches!(&jobs[0], ForwardJob::Deleted(c) if c.text.as_deref() == Some("hello")));
        assert!(fx.cache.is_empty());

        // Redelivered deletion finds nothing.
        assert!(fx.classify(delete(MessageScope::Account, &[7])).is_empty());
    }

    #[test]
    fn deleting_read_message_purges_silently() {
        let fx = Fixture::new();
        let conv = ConversationKey::direct(42);
        fx.cache.put(snapshot(conv, 7, "hello"));
        fx.reads.mark_read(conv, MessageId(7));

        assert!(fx.classify(delete(MessageScope::Account, &[7])).is_empty());
        assert!(fx.cache.is_empty());
    }

    #[test]
    fn deleting_absent_ids_is_a_no_op() {
        let fx = Fixture::new();
        fx.cache.put(snapshot(ConversationKey::channel(9), 1, "keep"));

        assert!(fx.classify(delete(MessageScope::Account, &[1, 2])).is_empty());
        assert_eq!(fx.cache.len(), 1);
    }

    #[test]
    fn channel_deletion_only_touches_that_channel() {
        let fx = Fixture::new();
        fx.cache.put(snapshot(ConversationKey::channel(9), 1, "a"));
        fx.cache.put(snapshot(ConversationKey::channel(9), 2, "b"));
        fx.cache.put(snapshot(ConversationKey::channel(10), 1, "c"));
        fx.reads.mark_read(ConversationKey::channel(9), MessageId(1));

        let jobs = fx.classify(delete(MessageScope::Channel(9), &[1, 2]));
        assert_eq!(jobs.len(), 1);
        assert!(matches!(&jobs[0], ForwardJob::Deleted(c) if c.message_id == MessageId(2)));
        assert_eq!(fx.cache.len(), 1);
    }

    #[test]
    fn edit_forwards_only_real_changes() {
        let fx = Fixture::new();
        let conv = ConversationKey::direct(42);
        fx.cache.put(snapshot(conv, 7, "hello"));

        assert!(fx.classify(edit(conv, 7, Some("hello"))).is_empty());

        let jobs = fx.classify(edit(conv, 7, Some("hello there")));
        assert_eq!(jobs.len(), 1);
        let ForwardJob::Edited {
            cached,
            new_text,
            media_changed,
            new_media,
        } = &jobs[0]
        else {
            panic!("expected edit job, got {jobs:?}");
        };
        assert_eq!(cached.text.as_deref(), Some("hello"));
        assert_eq!(new_text.as_deref(), Some("hello there"));
        assert!(!media_changed);
        assert!(new_media.is_none());

        let key = CacheKey::new(MessageScope::Account, MessageId(7));
        assert_eq!(
            fx.cache.peek(key).unwrap().text.as_deref(),
            Some("hello there")
        );

        // The same edit redelivered is now a no-op.
        assert!(fx.classify(edit(conv, 7, Some("hello there"))).is_empty());
    }

    #[test]
    fn edit_of_read_or_absent_message_is_ignored() {
        let fx = Fixture::new();
        let conv = ConversationKey::channel(9);
        fx.cache.put(snapshot(conv, 4, "v1"));
        fx.reads.mark_read(conv, MessageId(4));

        assert!(fx.classify(edit(conv, 4, Some("v2"))).is_empty());
        assert!(fx.classify(edit(conv, 5, Some("v2"))).is_empty());

        let key = CacheKey::new(MessageScope::Channel(9), MessageId(4));
        assert_eq!(fx.cache.peek(key).unwrap().text.as_deref(), Some("v1"));
    }

    #[test]
    fn edit_threshold_suppresses_typo_fixes() {
        let fx = Fixture::new();
        let conv = ConversationKey::direct(42);
        fx.cache.put(snapshot(conv, 7, "helo world"));

        let jobs = fx.classify_with_threshold(edit(conv, 7, Some("hello world")), 3);
        assert!(jobs.is_empty());

        let key = CacheKey::new(MessageScope::Account, MessageId(7));
        assert_eq!(
            fx.cache.peek(key).unwrap().text.as_deref(),
            Some("hello world")
        );
    }

    #[test]
    fn ignored_conversations_never_forward() {
        let fx = Fixture::new();
        fx.ignored.replace([42]);
        fx.cache.put(snapshot(ConversationKey::direct(42), 7, "hello"));
        fx.cache.put(snapshot(ConversationKey::direct(42), 8, "again"));

        assert!(fx.classify(edit(ConversationKey::direct(42), 8, Some("x"))).is_empty());
        assert!(fx.classify(delete(MessageScope::Account, &[7])).is_empty());
        assert_eq!(fx.cache.len(), 1);
    }

    fn photo(handle: &str) -> MessageMedia {
        MessageMedia::Photo {
            handle: MediaHandle(handle.to_string()),
            ttl_seconds: None,
        }
    }

    fn cached_photo(fx: &Fixture, conv: ConversationKey, id: i32, handle: &str) -> CacheKey {
        let mut snap = snapshot(conv, id, "look");
        let old = photo(handle);
        snap.media_plan = media::retention_plan(&old);
        snap.content_description = media::describe(Some(&old));
        snap.media = Some(RetainedMedia {
            kind: MediaKind::Image,
            mime_type: "image/jpeg".to_string(),
            file_name: "photo.jpg".to_string(),
            bytes: b"old-bytes".as_slice().into(),
        });
        let key = snap.key();
        fx.cache.put(snap);
        key
    }

    fn edit_media(conv: ConversationKey, id: i32, media: Option<MessageMedia>) -> Notification {
        let Notification::Edit { mut message } = edit(conv, id, Some("look")) else {
            unreachable!()
        };
        message.media = media;
        Notification::Edit { message }
    }

    #[test]
    fn swapped_media_is_forwarded_even_without_text_change() {
        let fx = Fixture::new();
        let conv = ConversationKey::direct(42);
        let key = cached_photo(&fx, conv, 7, "old");

        // Same media redelivered is not a change.
        assert!(fx.classify(edit_media(conv, 7, Some(photo("old")))).is_empty());
        assert!(fx.cache.peek(key).unwrap().media.is_some());

        let jobs = fx.classify_with_threshold(edit_media(conv, 7, Some(photo("new"))), 5);
        assert_eq!(jobs.len(), 1);
        let ForwardJob::Edited {
            cached,
            media_changed,
            new_media,
            ..
        } = &jobs[0]
        else {
            panic!("expected edit job, got {jobs:?}");
        };
        assert!(media_changed);
        assert_eq!(&*cached.media.as_ref().unwrap().bytes, b"old-bytes");
        assert_eq!(
            new_media.as_ref().map(|p| p.handle.clone()),
            Some(MediaHandle("new".to_string()))
        );

        // Old bytes no longer describe the message.
        let entry = fx.cache.peek(key).unwrap();
        assert!(entry.media.is_none());
        assert_eq!(entry.media_plan, new_media.clone());
    }

    #[test]
    fn removed_media_updates_description() {
        let fx = Fixture::new();
        let conv = ConversationKey::group(3);
        let key = cached_photo(&fx, conv, 9, "old");

        let jobs = fx.classify(edit_media(conv, 9, None));
        assert_eq!(jobs.len(), 1);
        assert!(matches!(
            &jobs[0],
            ForwardJob::Edited { media_changed: true, new_media: None, .. }
        ));

        let entry = fx.cache.peek(key).unwrap();
        assert!(entry.media.is_none());
        assert!(entry.media_plan.is_none());
        assert!(entry.content_description.is_none());
    }

    #[test]
    fn changed_chars_counts_differing_middle() {
        assert_eq!(count_changed_chars(Some("abc"), Some("abc")), 0);
        assert_eq!(count_changed_chars(None, None), 0);
        assert_eq!(count_changed_chars(Some("helo"), Some("hello")), 1);
        assert_eq!(count_changed_chars(Some("cat"), Some("dog")), 3);
        assert_eq!(count_changed_chars(None, Some("new")), 3);
        assert_eq!(count_changed_chars(Some("aaa"), Some("aa")), 1);
        assert_eq!(count_changed_chars(Some("привет"), Some("привет!")), 1);
    }
}
