use async_trait::async_trait;

use crate::{messaging::types::OutgoingMedia, Result};

/// Sink for notices. Implementations are bound to the watching account's
/// notes destination; callers never pick a chat.
#[async_trait]
pub trait NoticeSink: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<()>;
    async fn send_media(&self, media: OutgoingMedia) -> Result<()>;
}
