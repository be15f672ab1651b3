use async_trait::async_trait;

use crate::{
    Result,
    types::{
        Attachment, ChannelId, CopyRef, CopyUpdate, Emoji, IdentityBinding, MessageId,
        OutboundPost, Upload,
    },
};

/// Outbound side of the messaging platform, as far as the relay needs it.
///
/// Every call is a potentially slow network round-trip. Implementations map
/// "message is gone" to [`crate::Error::CopyNotFound`] and "channel is gone or
/// inaccessible" to [`crate::Error::ChannelUnavailable`].
#[async_trait]
pub trait RelayPlatform: Send + Sync + 'static {
    /// Usable handle to a channel's relay identity.
    type Identity: Clone + Send + Sync + 'static;

    /// Turn a stored binding into a usable identity.
    async fn resolve_identity(
        &self,
        channel_id: ChannelId,
        binding: &IdentityBinding,
    ) -> Result<Self::Identity>;

    /// Create a brand-new relay identity in `channel_id`.
    async fn create_identity(
        &self,
        channel_id: ChannelId,
    ) -> Result<(Self::Identity, IdentityBinding)>;

    async fn fetch_attachment(&self, attachment: &Attachment) -> Result<Upload>;

    /// Post through `identity` and return the id of the created message.
    async fn send_as(
        &self,
        identity: &Self::Identity,
        channel_id: ChannelId,
        post: &OutboundPost,
    ) -> Result<MessageId>;

    /// Replace a copy's content. `identity` is `None` for user-authored
    /// messages. Returns the id the copy carries after the edit.
    async fn edit_copy(
        &self,
        copy: &CopyRef,
        identity: Option<&Self::Identity>,
        update: &CopyUpdate,
    ) -> Result<MessageId>;

    async fn delete_copy(&self, copy: &CopyRef, identity: Option<&Self::Identity>) -> Result<()>;

    async fn add_reaction(&self, copy: &CopyRef, emoji: &Emoji) -> Result<()>;
}
