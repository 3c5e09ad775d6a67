//! Decoded protocol objects consumed by the tracker.
//!
//! Adapters decode their wire format once at the boundary into these flat
//! types; nothing in the core depends on a protocol library's class hierarchy.

use chrono::{DateTime, Utc};

use crate::domain::{ConversationKey, MessageId, MessageScope, UserId};

/// Opaque locator handed back to [`crate::ports::MediaSource::download`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaHandle(pub String);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentAttribute {
    Sticker,
    Audio { voice: bool },
    Video { round: bool },
    Filename(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentMedia {
    pub handle: MediaHandle,
    pub mime_type: Option<String>,
    pub attributes: Vec<DocumentAttribute>,
    pub ttl_seconds: Option<u32>,
}

impl DocumentMedia {
    pub fn is_sticker(&self) -> bool {
        self.attributes
            .iter()
            .any(|a| matches!(a, DocumentAttribute::Sticker))
    }

    pub fn has_voice_attribute(&self) -> bool {
        self.attributes
            .iter()
            .any(|a| matches!(a, DocumentAttribute::Audio { voice: true }))
    }

    pub fn has_music_attribute(&self) -> bool {
        self.attributes
            .iter()
            .any(|a| matches!(a, DocumentAttribute::Audio { voice: false }))
    }

    pub fn is_video(&self) -> bool {
        self.attributes
            .iter()
            .any(|a| matches!(a, DocumentAttribute::Video { .. }))
    }

    pub fn is_round_video(&self) -> bool {
        self.attributes
            .iter()
            .any(|a| matches!(a, DocumentAttribute::Video { round: true }))
    }

    pub fn file_name(&self) -> Option<&str> {
        self.attributes.iter().find_map(|a| match a {
            DocumentAttribute::Filename(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageMedia {
    Photo {
        handle: MediaHandle,
        ttl_seconds: Option<u32>,
    },
    Document(DocumentMedia),
    Contact,
    Location,
    Poll,
    Unsupported,
}

impl MessageMedia {
    /// Self-destruct timer, if the media is disappearing.
    pub fn ttl_seconds(&self) -> Option<u32> {
        match self {
            MessageMedia::Photo { ttl_seconds, .. } => *ttl_seconds,
            MessageMedia::Document(doc) => doc.ttl_seconds,
            _ => None,
        }
        .filter(|ttl| *ttl > 0)
    }
}

/// A new (or edited) message as delivered by the chat protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingMessage {
    pub conversation: ConversationKey,
    pub message_id: MessageId,
    /// Absent when the peer itself is the implicit sender (direct chats).
    pub sender: Option<UserId>,
    pub text: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub media: Option<MessageMedia>,
}

/// The notification kinds the tracker acts on. Everything else is dropped at
/// the boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// "Read up to `max_id`" for a direct chat, group or channel.
    ReadMarker {
        conversation: ConversationKey,
        max_id: MessageId,
    },
    /// Messages removed on the server. `scope` is `Channel` only for channel
    /// deletions; account-wide deletions don't name a conversation.
    Deletion {
        scope: MessageScope,
        ids: Vec<MessageId>,
    },
    /// New content for a message; the conversation is carried by the message.
    Edit { message: IncomingMessage },
}

/// Everything the inbound boundary can hand to the run loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    Message(IncomingMessage),
    Notification(Notification),
    /// Replacement set of peers whose conversations are not watched.
    ArchivedPeers(Vec<i64>),
}
