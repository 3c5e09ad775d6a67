//! Telegram adapter (teloxide).
//!
//! Implements the `tgwatch-core` NoticeSink and DisplayNameResolver ports over
//! the Telegram Bot API.

use async_trait::async_trait;

use teloxide::{prelude::*, types::InputFile};

use tokio::time::sleep;

pub mod router;

use tgwatch_core::{
    domain::{UserId, UserProfile},
    errors::Error,
    media::MediaKind,
    messaging::{port::NoticeSink, types::OutgoingMedia},
    ports::DisplayNameResolver,
    Result,
};

const MESSAGE_LIMIT: usize = 4096;
const CAPTION_LIMIT: usize = 1024;

fn map_err(e: teloxide::RequestError) -> Error {
    Error::External(format!("telegram error: {e}"))
}

async fn with_retry<T, Fut>(mut op: impl FnMut() -> Fut) -> Result<T>
where
    Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
    Fut::IntoFuture: Send,
{
    const MAX_RETRIES: usize = 1;
    let mut attempts = 0usize;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => match e {
                teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    sleep(d).await;
                    continue;
                }
                other => return Err(map_err(other)),
            },
        }
    }
}

/// Cut `s` to at most `max` chars, marking the cut.
fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = s.chars().take(max.saturating_sub(1)).collect::<String>();
    out.push('\u{2026}');
    out
}

/// Notice sink bound to the notes chat.
#[derive(Clone)]
pub struct TelegramNotes {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotes {
    pub fn new(bot: Bot, chat_id: i64) -> Self {
        Self {
            bot,
            chat_id: ChatId(chat_id),
        }
    }

    fn input_file(media: &OutgoingMedia) -> InputFile {
        InputFile::memory(media.bytes.to_vec()).file_name(media.file_name.clone())
    }
}

#[async_trait]
impl NoticeSink for TelegramNotes {
    async fn send_text(&self, text: &str) -> Result<()> {
        let text = clip(text, MESSAGE_LIMIT);
        with_retry(|| self.bot.send_message(self.chat_id, text.clone())).await?;
        Ok(())
    }

    async fn send_media(&self, media: OutgoingMedia) -> Result<()> {
        let caption = media.caption.as_deref().map(|c| clip(c, CAPTION_LIMIT));

        match media.kind {
            MediaKind::Image => {
                with_retry(|| {
                    let mut req = self.bot.send_photo(self.chat_id, Self::input_file(&media));
                    if let Some(c) = &caption {
                        req = req.caption(c.clone());
                    }
                    req
                })
                .await?;
            }
            MediaKind::VoiceNote => {
                with_retry(|| {
                    let mut req = self.bot.send_voice(self.chat_id, Self::input_file(&media));
                    if let Some(c) = &caption {
                        req = req.caption(c.clone());
                    }
                    req
                })
                .await?;
            }
            MediaKind::RoundVideo => {
                with_retry(|| {
                    self.bot
                        .send_video_note(self.chat_id, Self::input_file(&media))
                })
                .await?;
            }
            MediaKind::File => {
                with_retry(|| {
                    let mut req = self
                        .bot
                        .send_document(self.chat_id, Self::input_file(&media));
                    if let Some(c) = &caption {
                        req = req.caption(c.clone());
                    }
                    req
                })
                .await?;
            }
        }
        Ok(())
    }
}

/// Resolves user profiles through `getChat`.
///
/// The Bot API only knows users that share a chat with the bot; lookups for
/// anyone else fail and the tracker falls back to "Unknown".
#[derive(Clone)]
pub struct TelegramNames {
    bot: Bot,
}

impl TelegramNames {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl DisplayNameResolver for TelegramNames {
    async fn resolve(&self, user: UserId) -> Result<UserProfile> {
        let chat = with_retry(|| self.bot.get_chat(ChatId(user.0))).await?;
        Ok(UserProfile {
            id: user.0,
            username: chat.username().map(str::to_string),
            first_name: chat.first_name().map(str::to_string),
            last_name: chat.last_name().map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_keeps_short_text() {
        assert_eq!(clip("hello", 10), "hello");
        assert_eq!(clip("", 10), "");
    }

    #[test]
    fn clip_counts_chars_not_bytes() {
        let long = "\u{00E9}".repeat(20);
        let clipped = clip(&long, 10);
        assert_eq!(clipped.chars().count(), 10);
        assert!(clipped.ends_with('\u{2026}'));
    }
}
