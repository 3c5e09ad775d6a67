//! Media classification: coarse retention category + one-line description.

use crate::protocol::{DocumentMedia, MediaHandle, MessageMedia};

/// Coarse category of retained media; decides how a notice re-attaches it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    VoiceNote,
    /// Round video ("video note"). The destination has no caption support for it.
    RoundVideo,
    File,
}

impl MediaKind {
    pub fn supports_caption(self) -> bool {
        !matches!(self, MediaKind::RoundVideo)
    }
}

/// What to download for a message and how to label the bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetentionPlan {
    pub handle: MediaHandle,
    pub kind: MediaKind,
    pub mime_type: String,
    pub file_name: String,
}

const DEFAULT_MIME: &str = "application/octet-stream";

/// Decide whether (and how) the media's bytes should be retained.
///
/// Only photos and documents carry downloadable payloads.
pub fn retention_plan(media: &MessageMedia) -> Option<RetentionPlan> {
    match media {
        MessageMedia::Photo { handle, .. } => Some(RetentionPlan {
            handle: handle.clone(),
            kind: MediaKind::Image,
            mime_type: "image/jpeg".to_string(),
            file_name: "photo.jpg".to_string(),
        }),
        MessageMedia::Document(doc) => Some(document_retention(doc)),
        _ => None,
    }
}

fn document_retention(doc: &DocumentMedia) -> RetentionPlan {
    let mime = doc
        .mime_type
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MIME.to_string());

    let (kind, file_name) = if doc.has_voice_attribute() {
        (MediaKind::VoiceNote, "voice.ogg".to_string())
    } else if doc.is_round_video() {
        (MediaKind::RoundVideo, "video_note.mp4".to_string())
    } else {
        let name = doc
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("file.{}", mime_to_ext(&mime)));
        (MediaKind::File, name)
    };

    RetentionPlan {
        handle: doc.handle.clone(),
        kind,
        mime_type: mime,
        file_name,
    }
}

pub fn mime_to_ext(mime: &str) -> String {
    let known = match mime {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "video/mp4" => Some("mp4"),
        "audio/ogg" => Some("ogg"),
        "audio/mpeg" => Some("mp3"),
        "application/pdf" => Some("pdf"),
        _ => None,
    };
    if let Some(ext) = known {
        return ext.to_string();
    }
    match mime.rsplit('/').next() {
        Some(sub) if !sub.is_empty() => sub.to_string(),
        _ => "bin".to_string(),
    }
}

/// One-line human summary of a message's media (e.g. `*photo*`).
pub fn describe(media: Option<&MessageMedia>) -> Option<String> {
    let media = media?;
    let text = match media {
        MessageMedia::Photo { .. } => "*photo*".to_string(),
        MessageMedia::Document(doc) => describe_document(doc),
        MessageMedia::Contact => "*contact*".to_string(),
        MessageMedia::Location => "*location*".to_string(),
        MessageMedia::Poll => "*poll*".to_string(),
        MessageMedia::Unsupported => "*media*".to_string(),
    };
    Some(text)
}

fn describe_document(doc: &DocumentMedia) -> String {
    if doc.is_sticker() {
        return "*sticker*".to_string();
    }
    if is_voice_message(doc) {
        return "*voice message*".to_string();
    }
    if doc.is_video() {
        return "*video message*".to_string();
    }
    if doc.has_music_attribute() {
        return "*audio file*".to_string();
    }

    let Some(mime) = doc.mime_type.as_deref().filter(|m| !m.is_empty()) else {
        return "*file*".to_string();
    };

    let file_type = match doc.file_name() {
        Some(name) => match name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => format!("{} file", ext.to_lowercase()),
            _ => "file".to_string(),
        },
        None => match mime.split_once('/') {
            Some((_, sub)) if !sub.contains('/') => format!("{sub} file"),
            _ => "file".to_string(),
        },
    };
    format!("*{file_type}*")
}

fn is_voice_message(doc: &DocumentMedia) -> bool {
    doc.has_voice_attribute()
        || doc
            .mime_type
            .as_deref()
            .map(|m| m.eq_ignore_ascii_case("audio/ogg"))
            .unwrap_or(false)
}
