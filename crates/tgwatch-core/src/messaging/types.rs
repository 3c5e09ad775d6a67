use std::sync::Arc;

use crate::media::MediaKind;

/// A media upload to the notes destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMedia {
    pub kind: MediaKind,
    pub bytes: Arc<[u8]>,
    pub file_name: String,
    pub mime_type: String,
    /// Ignored for kinds without caption support.
    pub caption: Option<String>,
}

impl OutgoingMedia {
    pub fn as_voice_note(&self) -> bool {
        self.kind == MediaKind::VoiceNote
    }

    pub fn as_round_video(&self) -> bool {
        self.kind == MediaKind::RoundVideo
    }
}

/// One outbound call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Text(String),
    Media(OutgoingMedia),
}
