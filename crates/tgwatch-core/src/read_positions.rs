//! Per-conversation read high-water marks.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use crate::{
    cache::CachedMessage,
    domain::{ConversationKey, MessageId},
};

#[derive(Debug, Default)]
pub struct ReadPositions {
    marks: Mutex<HashMap<ConversationKey, MessageId>>,
}

impl ReadPositions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the mark to `max(current, message_id)`. Never lowers it.
    pub fn mark_read(&self, conversation: ConversationKey, message_id: MessageId) {
        let mut marks = self.marks.lock().unwrap_or_else(PoisonError::into_inner);
        marks
            .entry(conversation)
            .and_modify(|current| *current = (*current).max(message_id))
            .or_insert(message_id);
    }

    pub fn high_water(&self, conversation: ConversationKey) -> Option<MessageId> {
        self.marks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&conversation)
            .copied()
    }

    /// True unless a recorded mark already covers the message.
    ///
    /// No mark means unread: an unseen conversation is never assumed read.
    pub fn is_unread(&self, cached: &CachedMessage) -> bool {
        match self.high_water(cached.conversation) {
            None => true,
            Some(mark) => mark < cached.message_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::snapshot;

    #[test]
    fn unread_until_mark_reaches_message() {
        let reads = ReadPositions::new();
        let conv = ConversationKey::direct(42);
        let msg = snapshot(conv, 7, "hello");

        assert!(reads.is_unread(&msg));

        reads.mark_read(conv, MessageId(5));
        assert!(reads.is_unread(&msg));

        reads.mark_read(conv, MessageId(7));
        assert!(!reads.is_unread(&msg));
    }

    #[test]
    fn marks_never_decrease() {
        let reads = ReadPositions::new();
        let conv = ConversationKey::channel(9);

        let mut expected = MessageId(0);
        for id in [3, 10, 4, 10, 1] {
            reads.mark_read(conv, MessageId(id));
            expected = expected.max(MessageId(id));
            assert_eq!(reads.high_water(conv), Some(expected));
        }
        assert_eq!(reads.high_water(conv), Some(MessageId(10)));
    }

    #[test]
    fn marks_are_per_conversation() {
        let reads = ReadPositions::new();
        reads.mark_read(ConversationKey::direct(1), MessageId(100));

        let other = snapshot(ConversationKey::direct(2), 50, "x");
        assert!(reads.is_unread(&other));
        // Same raw id, different kind.
        let group = snapshot(ConversationKey::group(1), 50, "x");
        assert!(reads.is_unread(&group));
    }
}
