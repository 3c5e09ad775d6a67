//! Turns an incoming message into a retained snapshot.

use std::{sync::Arc, time::Instant};

use tracing::warn;

use crate::{
    cache::{CachedMessage, RetainedMedia},
    domain::{ConversationKind, UserId, UNKNOWN_SENDER},
    media::{self, RetentionPlan},
    ports::{DisplayNameResolver, MediaSource},
    protocol::IncomingMessage,
};

pub struct SnapshotCapture {
    self_id: UserId,
    media: Arc<dyn MediaSource>,
    names: Arc<dyn DisplayNameResolver>,
}

impl SnapshotCapture {
    pub fn new(
        self_id: UserId,
        media: Arc<dyn MediaSource>,
        names: Arc<dyn DisplayNameResolver>,
    ) -> Self {
        Self {
            self_id,
            media,
            names,
        }
    }

    pub fn is_self_authored(&self, message: &IncomingMessage) -> bool {
        message.sender == Some(self.self_id)
    }

    /// Build the snapshot, downloading media eagerly.
    ///
    /// Returns `None` for the watching account's own messages. Download and
    /// name-resolution failures degrade instead of failing the capture.
    pub async fn capture(&self, message: &IncomingMessage, now: Instant) -> Option<CachedMessage> {
        if self.is_self_authored(message) {
            return None;
        }

        let sender_name = self.sender_name(message).await;
        let content_description = media::describe(message.media.as_ref());
        let media_plan = message.media.as_ref().and_then(media::retention_plan);
        let retained = match &media_plan {
            Some(plan) => self.retain_media(plan).await,
            None => None,
        };

        Some(CachedMessage {
            conversation: message.conversation,
            message_id: message.message_id,
            sender_id: message.sender,
            sender_name,
            text: message.text.clone(),
            timestamp: message.timestamp,
            content_description,
            media: retained,
            media_plan,
            cached_at: now,
        })
    }

    /// In direct chats the sender is often absent; the peer itself is the author.
    pub async fn sender_name(&self, message: &IncomingMessage) -> String {
        let author = match (message.sender, message.conversation.kind) {
            (Some(user), _) => user,
            (None, ConversationKind::Direct) => UserId(message.conversation.id),
            (None, _) => return UNKNOWN_SENDER.to_string(),
        };

        match self.names.resolve(author).await {
            Ok(profile) => profile.display_name(),
            Err(e) => {
                warn!(user_id = author.0, "failed to resolve sender name: {e}");
                UNKNOWN_SENDER.to_string()
            }
        }
    }

    pub async fn retain_media(&self, plan: &RetentionPlan) -> Option<RetainedMedia> {
        match self.media.download(&plan.handle).await {
            Ok(Some(bytes)) => Some(RetainedMedia {
                kind: plan.kind,
                mime_type: plan.mime_type.clone(),
                file_name: plan.file_name.clone(),
                bytes: bytes.into(),
            }),
            Ok(None) => None,
            Err(e) => {
                warn!(handle = %plan.handle.0, "media download failed: {e}");
                None
            }
        }
    }
}
