//! Builds notices from retained snapshots and delivers them (best effort).

use std::sync::Arc;

use tracing::{error, info};

use crate::{
    cache::{CachedMessage, RetainedMedia},
    domain::ConversationKind,
    messaging::{
        port::NoticeSink,
        types::{Notice, OutgoingMedia},
    },
    Result,
};

pub const DELETED_TITLE: &str = "\u{1F5D1} Deleted message";
pub const EDITED_TITLE: &str = "\u{270F}\u{FE0F} Edited message";
pub const EMPTY_MESSAGE: &str = "(empty message)";
pub const MEDIA_CHANGED: &str = "Media changed.";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Header shared by every notice about a retained message.
pub fn build_header(title: &str, tag: &str, cached: &CachedMessage) -> String {
    let mut lines = vec![
        format!("{title} #{tag}"),
        format!("From: {}", cached.sender_name),
        format!("Chat: {}", cached.conversation.label()),
        format!("Time: {}", cached.timestamp.format(TIMESTAMP_FORMAT)),
    ];
    if cached.conversation.kind == ConversationKind::Channel {
        lines.push(format!(
            "Link: https://t.me/c/{}/{}",
            cached.conversation.id, cached.message_id.0
        ));
    }
    lines.join("\n")
}

/// Re-attach retained media under `caption`.
///
/// Round videos can't carry a caption, so the caption goes out first as text.
pub fn media_notices(media: &RetainedMedia, caption: String) -> Vec<Notice> {
    let upload = |caption: Option<String>| OutgoingMedia {
        kind: media.kind,
        bytes: media.bytes.clone(),
        file_name: media.file_name.clone(),
        mime_type: media.mime_type.clone(),
        caption,
    };

    if media.kind.supports_caption() {
        vec![Notice::Media(upload(Some(caption)))]
    } else {
        vec![Notice::Text(caption), Notice::Media(upload(None))]
    }
}

pub fn deletion_notices(cached: &CachedMessage) -> Vec<Notice> {
    let header = build_header(DELETED_TITLE, "deleted", cached);

    if let Some(media) = &cached.media {
        let caption = match &cached.text {
            Some(text) if !text.is_empty() => format!("{header}\n\n{text}"),
            _ => header,
        };
        return media_notices(media, caption);
    }

    let text = cached.text.as_deref().filter(|t| !t.is_empty());
    let mut lines = vec![header];
    if let Some(text) = text {
        lines.push(String::new());
        lines.push(text.to_string());
    }
    if let Some(desc) = &cached.content_description {
        lines.push(desc.clone());
    }
    if text.is_none() && cached.content_description.is_none() {
        lines.push(EMPTY_MESSAGE.to_string());
    }
    vec![Notice::Text(lines.join("\n"))]
}

pub fn edit_notice(cached: &CachedMessage, new_text: Option<&str>, media_changed: bool) -> String {
    let header = build_header(EDITED_TITLE, "edited", cached);
    let mut lines = vec![header, String::new()];
    if media_changed {
        lines.push(MEDIA_CHANGED.to_string());
    }
    if let Some(old) = cached.text.as_deref().filter(|t| !t.is_empty()) {
        lines.push(format!("Was:\n{old}"));
    }
    if let Some(new) = new_text.filter(|t| !t.is_empty()) {
        lines.push(format!("\nNow:\n{new}"));
    }
    lines.join("\n")
}

pub fn disappearing_notices(cached: &CachedMessage, media: &RetainedMedia) -> Vec<Notice> {
    let caption = format!(
        "#disappearing\nFrom: {}\nChat: {}",
        cached.sender_name,
        cached.conversation.label()
    );
    media_notices(media, caption)
}

/// Best-effort delivery to the notes destination.
///
/// `dispatch` reports failures; the `send_*` entry points log and swallow them
/// so nothing ever propagates into notification processing.
#[derive(Clone)]
pub struct Forwarder {
    sink: Arc<dyn NoticeSink>,
}

impl Forwarder {
    pub fn new(sink: Arc<dyn NoticeSink>) -> Self {
        Self { sink }
    }

    pub async fn dispatch(&self, notices: Vec<Notice>) -> Result<()> {
        for notice in notices {
            match notice {
                Notice::Text(text) => self.sink.send_text(&text).await?,
                Notice::Media(media) => self.sink.send_media(media).await?,
            }
        }
        Ok(())
    }

    pub async fn send_deletion_notice(&self, cached: &CachedMessage) {
        match self.dispatch(deletion_notices(cached)).await {
            Ok(()) => info!(
                message_id = cached.message_id.0,
                conversation = %cached.conversation.label(),
                sender = %cached.sender_name,
                "forwarded deleted message"
            ),
            Err(e) => error!(
                message_id = cached.message_id.0,
                "failed to forward deleted message: {e}"
            ),
        }
    }

    pub async fn send_edit_notice(
        &self,
        cached: &CachedMessage,
        new_text: Option<&str>,
        media_changed: bool,
    ) {
        let notice = Notice::Text(edit_notice(cached, new_text, media_changed));
        match self.dispatch(vec![notice]).await {
            Ok(()) => info!(
                message_id = cached.message_id.0,
                conversation = %cached.conversation.label(),
                sender = %cached.sender_name,
                "forwarded edited message"
            ),
            Err(e) => error!(
                message_id = cached.message_id.0,
                "failed to forward edited message: {e}"
            ),
        }
    }

    pub async fn send_disappearing_notice(&self, cached: &CachedMessage, media: &RetainedMedia) {
        match self.dispatch(disappearing_notices(cached, media)).await {
            Ok(()) => info!(
                message_id = cached.message_id.0,
                sender = %cached.sender_name,
                "forwarded disappearing media"
            ),
            Err(e) => error!(
                message_id = cached.message_id.0,
                "failed to forward disappearing media: {e}"
            ),
        }
    }
}
