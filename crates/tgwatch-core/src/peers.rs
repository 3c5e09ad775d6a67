use std::{
    collections::HashSet,
    sync::{PoisonError, RwLock},
};

use crate::domain::ConversationKey;

/// Raw peer ids whose conversations are not watched (archived chats).
#[derive(Debug, Default)]
pub struct IgnoredPeers {
    ids: RwLock<HashSet<i64>>,
}

impl IgnoredPeers {
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: RwLock::new(ids.into_iter().collect()),
        }
    }

    pub fn replace(&self, ids: impl IntoIterator<Item = i64>) -> usize {
        let mut guard = self.ids.write().unwrap_or_else(PoisonError::into_inner);
        *guard = ids.into_iter().collect();
        guard.len()
    }

    pub fn contains(&self, conversation: &ConversationKey) -> bool {
        self.ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&conversation.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_raw_id_across_kinds() {
        let peers = IgnoredPeers::new([7]);
        assert!(peers.contains(&ConversationKey::direct(7)));
        assert!(peers.contains(&ConversationKey::channel(7)));
        assert!(!peers.contains(&ConversationKey::group(8)));
    }

    #[test]
    fn replace_swaps_the_whole_set() {
        let peers = IgnoredPeers::new([7]);
        assert_eq!(peers.replace([8, 9, 9]), 2);
        assert!(!peers.contains(&ConversationKey::direct(7)));
        assert!(peers.contains(&ConversationKey::group(9)));
    }
}
