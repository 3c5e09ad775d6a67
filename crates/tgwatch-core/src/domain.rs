/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Server-issued message id, unique within its [`MessageScope`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub i32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConversationKind {
    Direct,
    Group,
    Channel,
}

/// Identity of a conversation: its kind plus the raw peer id.
///
/// Read positions are tracked per `ConversationKey`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub kind: ConversationKind,
    pub id: i64,
}

impl ConversationKey {
    pub fn direct(id: i64) -> Self {
        Self {
            kind: ConversationKind::Direct,
            id,
        }
    }

    pub fn group(id: i64) -> Self {
        Self {
            kind: ConversationKind::Group,
            id,
        }
    }

    pub fn channel(id: i64) -> Self {
        Self {
            kind: ConversationKind::Channel,
            id,
        }
    }

    pub fn scope(&self) -> MessageScope {
        match self.kind {
            ConversationKind::Channel => MessageScope::Channel(self.id),
            ConversationKind::Direct | ConversationKind::Group => MessageScope::Account,
        }
    }

    /// Short human label used in notice headers (`user-42`, `chat-7`, `channel-9`).
    pub fn label(&self) -> String {
        match self.kind {
            ConversationKind::Direct => format!("user-{}", self.id),
            ConversationKind::Group => format!("chat-{}", self.id),
            ConversationKind::Channel => format!("channel-{}", self.id),
        }
    }
}

/// The id sequence a message id belongs to.
///
/// Direct chats and basic groups share one account-wide sequence (and their
/// deletion updates carry no conversation), channels have their own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageScope {
    Account,
    Channel(i64),
}

/// Cache identity of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub scope: MessageScope,
    pub message_id: MessageId,
}

impl CacheKey {
    pub fn new(scope: MessageScope, message_id: MessageId) -> Self {
        Self { scope, message_id }
    }
}

/// Public profile fields used to render a sender's display name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserProfile {
    /// `@username`, else "first last", else `User <id>`.
    pub fn display_name(&self) -> String {
        if let Some(u) = self.username.as_deref().filter(|u| !u.is_empty()) {
            return format!("@{u}");
        }

        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let full = full.trim();
        if !full.is_empty() {
            return full.to_string();
        }

        format!("User {}", self.id)
    }
}

pub const UNKNOWN_SENDER: &str = "Unknown";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_keys_get_their_own_scope() {
        assert_eq!(ConversationKey::direct(1).scope(), MessageScope::Account);
        assert_eq!(ConversationKey::group(2).scope(), MessageScope::Account);
        assert_eq!(
            ConversationKey::channel(3).scope(),
            MessageScope::Channel(3)
        );
        assert_eq!(ConversationKey::channel(3).label(), "channel-3");
    }

    #[test]
    fn display_name_prefers_username_then_full_name() {
        let mut p = UserProfile {
            id: 5,
            username: Some("alice".to_string()),
            first_name: Some("Alice".to_string()),
            last_name: Some("Liddell".to_string()),
        };
        assert_eq!(p.display_name(), "@alice");

        p.username = None;
        assert_eq!(p.display_name(), "Alice Liddell");

        p.last_name = None;
        assert_eq!(p.display_name(), "Alice");

        p.first_name = None;
        assert_eq!(p.display_name(), "User 5");
    }
}
