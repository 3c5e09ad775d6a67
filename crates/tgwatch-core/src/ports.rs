use async_trait::async_trait;

use crate::{
    domain::{UserId, UserProfile},
    protocol::MediaHandle,
    Result,
};

/// Downloads media payloads referenced by incoming messages.
///
/// `Ok(None)` means the payload is gone (or was never downloadable); errors are
/// transient I/O failures. Implementations own their timeouts.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn download(&self, handle: &MediaHandle) -> Result<Option<Vec<u8>>>;
}

/// Looks up public profile fields for a user.
#[async_trait]
pub trait DisplayNameResolver: Send + Sync {
    async fn resolve(&self, user: UserId) -> Result<UserProfile>;
}
