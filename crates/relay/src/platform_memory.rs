//! In-memory messaging platform without network access, for tests.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;

use crate::{
    Error, Result,
    platform::RelayPlatform,
    types::{
        Attachment, ChannelId, CopyRef, CopyUpdate, Embed, Emoji, IdentityBinding, MessageId,
        OutboundPost, Upload,
    },
};

/// Identity handle handed out by [`InMemoryPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryIdentity {
    pub channel_id: ChannelId,
    pub identity_id: u64,
}

/// A message as the in-memory platform holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub channel_id: ChannelId,
    pub content: String,
    pub embeds: Vec<Embed>,
    pub uploads: Vec<Upload>,
    /// Display override used when posted through an identity.
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    /// Identity that posted it; `None` for user-authored messages.
    pub identity_id: Option<u64>,
    pub suppress_mentions: bool,
    pub reactions: Vec<Emoji>,
    pub edits: u32,
}

#[derive(Default)]
struct State {
    next_id: u64,
    channels: HashSet<ChannelId>,
    messages: BTreeMap<MessageId, StoredMessage>,
    files: HashMap<String, Vec<u8>>,
    created_identities: Vec<(ChannelId, u64)>,
    refuse_identities: HashSet<ChannelId>,
    reject_posts: HashSet<ChannelId>,
    reject_edits: HashSet<ChannelId>,
    reject_deletes: HashSet<ChannelId>,
    reject_reactions: HashSet<ChannelId>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn require_channel(&self, channel_id: ChannelId) -> Result<()> {
        if self.channels.contains(&channel_id) {
            Ok(())
        } else {
            Err(Error::channel_unavailable(channel_id, "unknown channel"))
        }
    }

    /// Fails with `ChannelUnavailable` when `channel_id` is in `rejected`.
    fn check_rejected(
        rejected: &HashSet<ChannelId>,
        channel_id: ChannelId,
        what: &str,
    ) -> Result<()> {
        if rejected.contains(&channel_id) {
            return Err(Error::channel_unavailable(channel_id, format!("{what} rejected")));
        }
        Ok(())
    }

    fn message_mut(&mut self, copy: &CopyRef) -> Result<&mut StoredMessage> {
        self.messages
            .get_mut(&copy.message_id)
            .filter(|m| m.channel_id == copy.channel_id)
            .ok_or_else(|| Error::copy_not_found(copy.channel_id, copy.message_id))
    }
}

pub struct InMemoryPlatform {
    state: Mutex<State>,
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1000,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_channel(&self, channel_id: ChannelId) {
        self.lock().channels.insert(channel_id);
    }

    pub fn remove_channel(&self, channel_id: ChannelId) {
        self.lock().channels.remove(&channel_id);
    }

    /// Make `url` fetchable as an attachment.
    pub fn add_file(&self, url: impl Into<String>, data: Vec<u8>) {
        self.lock().files.insert(url.into(), data);
    }

    /// Identity creation in `channel_id` will be refused.
    pub fn refuse_identities_in(&self, channel_id: ChannelId) {
        self.lock().refuse_identities.insert(channel_id);
    }

    /// Posts into `channel_id` will be rejected.
    pub fn reject_posts_in(&self, channel_id: ChannelId) {
        self.lock().reject_posts.insert(channel_id);
    }

    /// Edits of copies in `channel_id` will fail (not as `CopyNotFound`).
    pub fn reject_edits_in(&self, channel_id: ChannelId) {
        self.lock().reject_edits.insert(channel_id);
    }

    /// Deletions of copies in `channel_id` will fail.
    pub fn reject_deletes_in(&self, channel_id: ChannelId) {
        self.lock().reject_deletes.insert(channel_id);
    }

    /// Reactions on copies in `channel_id` will fail.
    pub fn reject_reactions_in(&self, channel_id: ChannelId) {
        self.lock().reject_reactions.insert(channel_id);
    }

    /// Simulate a user posting `content` directly in `channel_id`.
    pub fn post_as_user(&self, channel_id: ChannelId, content: &str) -> MessageId {
        let mut state = self.lock();
        let id = MessageId(state.next_id());
        state.messages.insert(id, StoredMessage {
            channel_id,
            content: content.to_string(),
            embeds: Vec::new(),
            uploads: Vec::new(),
            username: None,
            avatar_url: None,
            identity_id: None,
            suppress_mentions: false,
            reactions: Vec::new(),
            edits: 0,
        });
        id
    }

    /// Simulate a deletion that happened outside the relay.
    pub fn delete_externally(&self, message_id: MessageId) -> bool {
        self.lock().messages.remove(&message_id).is_some()
    }

    pub fn message(&self, message_id: MessageId) -> Option<StoredMessage> {
        self.lock().messages.get(&message_id).cloned()
    }

    pub fn messages_in(&self, channel_id: ChannelId) -> Vec<(MessageId, StoredMessage)> {
        self.lock()
            .messages
            .iter()
            .filter(|(_, m)| m.channel_id == channel_id)
            .map(|(id, m)| (*id, m.clone()))
            .collect()
    }

    pub fn created_identities(&self) -> Vec<(ChannelId, u64)> {
        self.lock().created_identities.clone()
    }
}

#[async_trait]
impl RelayPlatform for InMemoryPlatform {
    type Identity = MemoryIdentity;

    async fn resolve_identity(
        &self,
        channel_id: ChannelId,
        binding: &IdentityBinding,
    ) -> Result<MemoryIdentity> {
        self.lock().require_channel(channel_id)?;
        Ok(MemoryIdentity {
            channel_id,
            identity_id: binding.identity_id,
        })
    }

    async fn create_identity(
        &self,
        channel_id: ChannelId,
    ) -> Result<(MemoryIdentity, IdentityBinding)> {
        let mut state = self.lock();
        state.require_channel(channel_id)?;
        if state.refuse_identities.contains(&channel_id) {
            return Err(Error::identity_provision_failed(
                channel_id,
                "identity limit reached",
            ));
        }
        let identity_id = state.next_id();
        state.created_identities.push((channel_id, identity_id));
        Ok((
            MemoryIdentity {
                channel_id,
                identity_id,
            },
            IdentityBinding::new(identity_id, format!("token-{identity_id}")),
        ))
    }

    async fn fetch_attachment(&self, attachment: &Attachment) -> Result<Upload> {
        let state = self.lock();
        let data = state.files.get(&attachment.url).cloned().ok_or_else(|| {
            Error::attachment_fetch_failed(attachment.filename.clone(), "not found")
        })?;
        Ok(Upload {
            filename: attachment.filename.clone(),
            data,
            spoiler: attachment.spoiler,
        })
    }

    async fn send_as(
        &self,
        identity: &MemoryIdentity,
        channel_id: ChannelId,
        post: &OutboundPost,
    ) -> Result<MessageId> {
        let mut state = self.lock();
        state.require_channel(channel_id)?;
        if identity.channel_id != channel_id {
            return Err(Error::invalid_input(format!(
                "identity {} does not belong to channel {channel_id}",
                identity.identity_id
            )));
        }
        if state.reject_posts.contains(&channel_id) {
            return Err(Error::channel_unavailable(channel_id, "post rejected"));
        }
        let id = MessageId(state.next_id());
        state.messages.insert(id, StoredMessage {
            channel_id,
            content: post.content.clone(),
            embeds: post.embeds.clone(),
            uploads: post.uploads.clone(),
            username: Some(post.username.clone()),
            avatar_url: post.avatar_url.clone(),
            identity_id: Some(identity.identity_id),
            suppress_mentions: post.suppress_mentions,
            reactions: Vec::new(),
            edits: 0,
        });
        Ok(id)
    }

    async fn edit_copy(
        &self,
        copy: &CopyRef,
        identity: Option<&MemoryIdentity>,
        update: &CopyUpdate,
    ) -> Result<MessageId> {
        let mut state = self.lock();
        State::check_rejected(&state.reject_edits, copy.channel_id, "edit")?;
        let message = state.message_mut(copy)?;
        if message.identity_id != identity.map(|i| i.identity_id) {
            return Err(Error::invalid_input("message was not authored by this identity"));
        }
        message.content = update.content.clone();
        message.embeds = update.embeds.clone();
        message.edits += 1;
        Ok(copy.message_id)
    }

    async fn delete_copy(&self, copy: &CopyRef, _identity: Option<&MemoryIdentity>) -> Result<()> {
        let mut state = self.lock();
        State::check_rejected(&state.reject_deletes, copy.channel_id, "delete")?;
        state.message_mut(copy)?;
        state.messages.remove(&copy.message_id);
        Ok(())
    }

    async fn add_reaction(&self, copy: &CopyRef, emoji: &Emoji) -> Result<()> {
        let mut state = self.lock();
        State::check_rejected(&state.reject_reactions, copy.channel_id, "reaction")?;
        let message = state.message_mut(copy)?;
        if !message.reactions.contains(emoji) {
            message.reactions.push(emoji.clone());
        }
        Ok(())
    }
}
