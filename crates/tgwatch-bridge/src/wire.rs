//! NDJSON wire format emitted by the bridge process.
//!
//! Each stdout line is one JSON object tagged by `"type"`. Lines are decoded
//! once here into core protocol types; unknown tags decode to `None`.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use tgwatch_core::{
    domain::{ConversationKey, MessageId, MessageScope, UserId},
    errors::Error,
    protocol::{
        DocumentAttribute, DocumentMedia, InboundEvent, IncomingMessage, MediaHandle,
        MessageMedia, Notification,
    },
    Result,
};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    Message {
        message: WireMessage,
    },
    EditMessage {
        message: WireMessage,
    },
    EditChannelMessage {
        message: WireMessage,
    },
    ReadInbox {
        peer: WirePeer,
        max_id: i32,
    },
    ReadChannelInbox {
        channel_id: i64,
        max_id: i32,
    },
    DeleteMessages {
        messages: Vec<i32>,
    },
    DeleteChannelMessages {
        channel_id: i64,
        messages: Vec<i32>,
    },
    ArchivedPeers {
        peers: Vec<i64>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum WirePeerKind {
    User,
    Chat,
    Channel,
}

#[derive(Debug, Deserialize)]
struct WirePeer {
    kind: WirePeerKind,
    id: i64,
}

impl From<WirePeer> for ConversationKey {
    fn from(peer: WirePeer) -> Self {
        match peer.kind {
            WirePeerKind::User => ConversationKey::direct(peer.id),
            WirePeerKind::Chat => ConversationKey::group(peer.id),
            WirePeerKind::Channel => ConversationKey::channel(peer.id),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    peer: WirePeer,
    id: i32,
    #[serde(default)]
    from_id: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    /// Unix seconds.
    date: i64,
    #[serde(default)]
    media: Option<WireMedia>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum WireMedia {
    Photo {
        handle: String,
        #[serde(default)]
        ttl_seconds: Option<u32>,
    },
    Document {
        handle: String,
        #[serde(default)]
        mime_type: Option<String>,
        #[serde(default)]
        attributes: Vec<WireAttribute>,
        #[serde(default)]
        ttl_seconds: Option<u32>,
    },
    Contact,
    Location,
    Poll,
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum WireAttribute {
    Sticker,
    Audio {
        #[serde(default)]
        voice: bool,
    },
    Video {
        #[serde(default)]
        round_message: bool,
    },
    Filename {
        file_name: String,
    },
    #[serde(other)]
    Other,
}

impl WireAttribute {
    fn into_domain(self) -> Option<DocumentAttribute> {
        match self {
            WireAttribute::Sticker => Some(DocumentAttribute::Sticker),
            WireAttribute::Audio { voice } => Some(DocumentAttribute::Audio { voice }),
            WireAttribute::Video { round_message } => Some(DocumentAttribute::Video {
                round: round_message,
            }),
            WireAttribute::Filename { file_name } => Some(DocumentAttribute::Filename(file_name)),
            WireAttribute::Other => None,
        }
    }
}

impl From<WireMedia> for MessageMedia {
    fn from(media: WireMedia) -> Self {
        match media {
            WireMedia::Photo {
                handle,
                ttl_seconds,
            } => MessageMedia::Photo {
                handle: MediaHandle(handle),
                ttl_seconds,
            },
            WireMedia::Document {
                handle,
                mime_type,
                attributes,
                ttl_seconds,
            } => MessageMedia::Document(DocumentMedia {
                handle: MediaHandle(handle),
                mime_type,
                attributes: attributes
                    .into_iter()
                    .filter_map(WireAttribute::into_domain)
                    .collect(),
                ttl_seconds,
            }),
            WireMedia::Contact => MessageMedia::Contact,
            WireMedia::Location => MessageMedia::Location,
            WireMedia::Poll => MessageMedia::Poll,
            WireMedia::Unsupported => MessageMedia::Unsupported,
        }
    }
}

impl WireMessage {
    fn into_domain(self) -> Result<IncomingMessage> {
        let timestamp: DateTime<Utc> = DateTime::from_timestamp(self.date, 0)
            .ok_or_else(|| Error::Decode(format!("message date out of range: {}", self.date)))?;
        Ok(IncomingMessage {
            conversation: self.peer.into(),
            message_id: MessageId(self.id),
            sender: self.from_id.map(UserId),
            text: self.message,
            timestamp,
            media: self.media.map(MessageMedia::from),
        })
    }
}

fn message_ids(ids: Vec<i32>) -> Vec<MessageId> {
    ids.into_iter().map(MessageId).collect()
}

/// Decode one stdout line. Blank lines and unknown event types yield `None`.
pub fn decode_line(line: &str) -> Result<Option<InboundEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let event = match serde_json::from_str::<WireEvent>(line)? {
        WireEvent::Message { message } => InboundEvent::Message(message.into_domain()?),
        WireEvent::EditMessage { message } | WireEvent::EditChannelMessage { message } => {
            InboundEvent::Notification(Notification::Edit {
                message: message.into_domain()?,
            })
        }
        WireEvent::ReadInbox { peer, max_id } => {
            InboundEvent::Notification(Notification::ReadMarker {
                conversation: peer.into(),
                max_id: MessageId(max_id),
            })
        }
        WireEvent::ReadChannelInbox { channel_id, max_id } => {
            InboundEvent::Notification(Notification::ReadMarker {
                conversation: ConversationKey::channel(channel_id),
                max_id: MessageId(max_id),
            })
        }
        WireEvent::DeleteMessages { messages } => {
            InboundEvent::Notification(Notification::Deletion {
                scope: MessageScope::Account,
                ids: message_ids(messages),
            })
        }
        WireEvent::DeleteChannelMessages {
            channel_id,
            messages,
        } => InboundEvent::Notification(Notification::Deletion {
            scope: MessageScope::Channel(channel_id),
            ids: message_ids(messages),
        }),
        WireEvent::ArchivedPeers { peers } => InboundEvent::ArchivedPeers(peers),
        WireEvent::Unknown => return Ok(None),
    };

    Ok(Some(event))
}
