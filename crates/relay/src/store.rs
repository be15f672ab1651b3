//! Durable storage contracts.

use async_trait::async_trait;

use crate::{
    Result,
    types::{ChannelId, IdentityBinding, Link, LinkId, Membership},
};

/// What the relay engine reads and writes at runtime.
#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn fetch_all_memberships(&self) -> Result<Vec<Membership>>;
    /// Counter bumped by every change to links or memberships, from any
    /// process sharing the store.
    async fn links_version(&self) -> Result<i64>;
    async fn fetch_relay_identity(&self, channel_id: ChannelId)
    -> Result<Option<IdentityBinding>>;
    async fn create_relay_identity(
        &self,
        channel_id: ChannelId,
        binding: &IdentityBinding,
    ) -> Result<()>;
    async fn update_relay_identity(
        &self,
        channel_id: ChannelId,
        binding: &IdentityBinding,
    ) -> Result<()>;
}

/// Structural mutations used by link administration.
///
/// Callers must reload the engine's link index after any mutation.
#[async_trait]
pub trait LinkAdminStore: LinkStore {
    async fn list_links(&self) -> Result<Vec<Link>>;
    /// Fails with `InvalidInput` when a link with the same name, ignoring
    /// case, already exists.
    async fn create_link(&self, name: &str) -> Result<Link>;
    /// Delete a link together with all of its memberships.
    async fn delete_link(&self, link_id: LinkId) -> Result<()>;
    async fn link_channels(&self, link_id: LinkId) -> Result<Vec<ChannelId>>;
    /// Insert a membership; inserting an existing one is a no-op.
    async fn add_membership(&self, membership: Membership) -> Result<()>;
    /// Returns whether a membership was removed.
    async fn remove_membership(&self, membership: Membership) -> Result<bool>;
}
