//! The relay engine: fan-out of new messages and propagation of edits,
//! deletions and first reactions across every copy.
//!
//! Every handler runs inside one engine-wide mutex. Outbound platform calls
//! are awaited sequentially while it is held, so a slow destination stalls
//! the whole engine; fan-outs are small (a handful of channels per link).

use std::sync::Arc;

use {
    tokio::sync::Mutex,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use chanlink_metrics::{counter, gauge, relay as relay_metrics};

use crate::{
    Result,
    content::{DEFAULT_REPLY_COLOUR, prepare_embeds, prepare_uploads},
    correlation::{CorrelationCache, DEFAULT_FORWARD_CAPACITY, DEFAULT_REVERSE_CAPACITY},
    identity::RelayIdentityCache,
    links::LinkIndex,
    platform::RelayPlatform,
    store::LinkStore,
    types::{
        ChannelId, CopyRef, CopyUpdate, IdentityBinding, InboundMessage, LinkId, MessageDelete,
        MessageEdit, MessageId, OutboundPost, ReactionAdd,
    },
};

/// Tunables fixed at engine construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub forward_capacity: usize,
    pub reverse_capacity: usize,
    pub reply_colour: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            forward_capacity: DEFAULT_FORWARD_CAPACITY,
            reverse_capacity: DEFAULT_REVERSE_CAPACITY,
            reply_colour: DEFAULT_REPLY_COLOUR,
        }
    }
}

/// Outcome of a single fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub posted: Vec<(ChannelId, MessageId)>,
    pub skipped: Vec<ChannelId>,
}

impl FanOutReport {
    pub fn is_empty(&self) -> bool {
        self.posted.is_empty() && self.skipped.is_empty()
    }
}

/// State owned exclusively by the engine and only touched under its lock.
struct EngineState<I> {
    index: LinkIndex,
    identities: RelayIdentityCache<I>,
    correlations: CorrelationCache,
    /// Store version the index was built from; `None` before the first load.
    links_version: Option<i64>,
}

pub struct RelayEngine<P: RelayPlatform> {
    platform: Arc<P>,
    store: Arc<dyn LinkStore>,
    config: EngineConfig,
    state: Mutex<EngineState<P::Identity>>,
}

impl<P: RelayPlatform> RelayEngine<P> {
    /// Create an engine with an empty link index. Call
    /// [`RelayEngine::reload_links`] before handling events.
    pub fn new(platform: Arc<P>, store: Arc<dyn LinkStore>, config: EngineConfig) -> Self {
        let correlations = CorrelationCache::new(config.forward_capacity, config.reverse_capacity);
        Self {
            platform,
            store,
            config,
            state: Mutex::new(EngineState {
                index: LinkIndex::default(),
                identities: RelayIdentityCache::default(),
                correlations,
                links_version: None,
            }),
        }
    }

    /// Rebuild the link index from storage and eagerly provision a relay
    /// identity for every linked channel.
    ///
    /// On storage failure the previous index is kept and the error returned.
    /// Provisioning failures are logged; those channels provision lazily.
    pub async fn reload_links(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.reload_locked(&mut state).await
    }

    /// Reload only when the stored links changed since the last load, e.g.
    /// through another process administering the same database. Returns
    /// whether a reload happened.
    pub async fn refresh_links(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        self.refresh_locked(&mut state).await
    }

    async fn refresh_locked(&self, state: &mut EngineState<P::Identity>) -> Result<bool> {
        let version = self.store.links_version().await?;
        if state.links_version == Some(version) {
            return Ok(false);
        }
        debug!(version, "stored links changed");
        self.reload_locked(state).await?;
        Ok(true)
    }

    async fn reload_locked(&self, state: &mut EngineState<P::Identity>) -> Result<()> {
        // Read the version first so a change racing this load triggers another.
        let loaded = match self.store.links_version().await {
            Ok(version) => self.store.fetch_all_memberships().await.map(|m| (version, m)),
            Err(e) => Err(e),
        };
        let (version, memberships) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, "failed to reload channel links, keeping previous index");
                #[cfg(feature = "metrics")]
                counter!(relay_metrics::RELOAD_FAILURES_TOTAL).increment(1);
                return Err(e);
            },
        };
        let index = LinkIndex::from_memberships(memberships);

        let mut channels: Vec<ChannelId> = index.channels().collect();
        channels.sort_unstable();
        for channel_id in channels {
            if let Err(e) = state
                .identities
                .get_or_provision(channel_id, self.store.as_ref(), self.platform.as_ref())
                .await
            {
                warn!(%channel_id, error = %e, "could not provision relay identity");
            }
        }

        info!(
            links = index.link_count(),
            channels = index.channel_count(),
            "loaded channel links"
        );
        #[cfg(feature = "metrics")]
        gauge!(relay_metrics::LINKED_CHANNELS).set(index.channel_count() as f64);

        state.index = index;
        state.links_version = Some(version);
        Ok(())
    }

    /// Relay identity for `channel_id`, provisioning and persisting one if
    /// the channel has none yet.
    pub async fn identity_for(&self, channel_id: ChannelId) -> Result<P::Identity> {
        let mut state = self.state.lock().await;
        state
            .identities
            .get_or_provision(channel_id, self.store.as_ref(), self.platform.as_ref())
            .await
    }

    /// Bind `channel_id` to an explicitly supplied identity, persisting the
    /// binding and overwriting any cached identity.
    pub async fn set_identity(&self, channel_id: ChannelId, binding: IdentityBinding) -> Result<()> {
        let mut state = self.state.lock().await;
        let identity = self.platform.resolve_identity(channel_id, &binding).await?;
        match self.store.fetch_relay_identity(channel_id).await? {
            Some(_) => {
                self.store
                    .update_relay_identity(channel_id, &binding)
                    .await?
            },
            None => {
                self.store
                    .create_relay_identity(channel_id, &binding)
                    .await?
            },
        }
        state.identities.insert(channel_id, identity);
        info!(%channel_id, identity_id = binding.identity_id, "relay identity updated");
        Ok(())
    }

    pub async fn links_for(&self, channel_id: ChannelId) -> Vec<LinkId> {
        self.state.lock().await.index.links_for(channel_id)
    }

    pub async fn channels_for(&self, link_id: LinkId) -> Vec<ChannelId> {
        self.state.lock().await.index.channels_for(link_id)
    }

    /// All copies correlated with `message_id`, looked up through any copy.
    pub async fn correlation_for(&self, message_id: MessageId) -> Option<Vec<CopyRef>> {
        let state = self.state.lock().await;
        let origin_id = state.correlations.lookup_reverse(message_id)?;
        state
            .correlations
            .lookup_forward(origin_id)
            .map(<[CopyRef]>::to_vec)
    }

    /// Whether `message_id` is an origin the relay has mirrored. Copies the
    /// relay posted are not origins.
    pub async fn is_origin(&self, message_id: MessageId) -> bool {
        self.state
            .lock()
            .await
            .correlations
            .lookup_forward(message_id)
            .is_some()
    }

    /// Mirror a new message into every other channel sharing a link with it.
    pub async fn on_message(&self, message: &InboundMessage) -> FanOutReport {
        let mut report = FanOutReport::default();
        if message.from_relay {
            return report;
        }

        let mut state = self.state.lock().await;
        if let Err(e) = self.refresh_locked(&mut state).await {
            debug!(error = %e, "link change check failed, using current index");
        }
        let destinations = state.index.destinations_for(message.channel_id);
        if destinations.is_empty() {
            return report;
        }

        let post = OutboundPost {
            content: message.content.clone(),
            username: message.author_name.clone(),
            avatar_url: message.author_avatar_url.clone(),
            embeds: prepare_embeds(
                &message.embeds,
                message.reply_url.as_deref(),
                self.config.reply_colour,
            ),
            uploads: prepare_uploads(self.platform.as_ref(), &message.attachments).await,
            suppress_mentions: true,
        };

        let mut copies = Vec::with_capacity(destinations.len() + 1);
        for channel_id in destinations {
            let identity = match state
                .identities
                .get_or_provision(channel_id, self.store.as_ref(), self.platform.as_ref())
                .await
            {
                Ok(identity) => identity,
                Err(e) => {
                    warn!(%channel_id, error = %e, "skipping destination without relay identity");
                    report.skipped.push(channel_id);
                    continue;
                },
            };

            match self.platform.send_as(&identity, channel_id, &post).await {
                Ok(copy_id) => {
                    copies.push(CopyRef::relayed(channel_id, copy_id));
                    report.posted.push((channel_id, copy_id));
                },
                Err(e) => {
                    warn!(%channel_id, error = %e, "failed to relay message");
                    report.skipped.push(channel_id);
                },
            }
        }

        #[cfg(feature = "metrics")]
        {
            counter!(relay_metrics::DESTINATIONS_POSTED_TOTAL).increment(report.posted.len() as u64);
            counter!(relay_metrics::DESTINATIONS_SKIPPED_TOTAL)
                .increment(report.skipped.len() as u64);
        }

        if copies.is_empty() {
            return report;
        }
        copies.push(CopyRef::origin(message.channel_id, message.id));
        state.correlations.record(message.id, copies);

        info!(
            message_id = %message.id,
            channel_id = %message.channel_id,
            copies = report.posted.len(),
            "forwarded message"
        );
        #[cfg(feature = "metrics")]
        counter!(relay_metrics::MESSAGES_FORWARDED_TOTAL).increment(1);

        report
    }

    /// Propagate an edit of an origin message to its copies. Returns how many
    /// copies were edited.
    pub async fn on_message_edit(&self, edit: &MessageEdit) -> usize {
        let mut state = self.state.lock().await;
        let Some(copies) = state.correlations.take_forward(edit.before_id) else {
            debug!(message_id = %edit.before_id, "edit of uncorrelated message");
            return 0;
        };

        let update = CopyUpdate {
            content: edit.content.clone(),
            embeds: prepare_embeds(
                &edit.embeds,
                edit.reply_url.as_deref(),
                self.config.reply_colour,
            ),
        };

        let mut edited = 0;
        let mut kept = Vec::with_capacity(copies.len());
        for copy in copies {
            if copy.message_id == edit.before_id {
                kept.push(CopyRef {
                    message_id: edit.after_id,
                    ..copy
                });
                continue;
            }

            let identity = if copy.relayed {
                match state
                    .identities
                    .get_or_provision(copy.channel_id, self.store.as_ref(), self.platform.as_ref())
                    .await
                {
                    Ok(identity) => Some(identity),
                    Err(e) => {
                        warn!(channel_id = %copy.channel_id, error = %e, "cannot edit copy without relay identity");
                        kept.push(copy);
                        continue;
                    },
                }
            } else {
                None
            };

            match self
                .platform
                .edit_copy(&copy, identity.as_ref(), &update)
                .await
            {
                Ok(message_id) => {
                    edited += 1;
                    kept.push(CopyRef { message_id, ..copy });
                },
                Err(e) if e.is_copy_not_found() => {
                    debug!(message_id = %copy.message_id, "copy already deleted, dropping");
                },
                Err(e) => {
                    warn!(message_id = %copy.message_id, error = %e, "failed to edit copy");
                    kept.push(copy);
                },
            }
        }

        state.correlations.record(edit.after_id, kept);
        #[cfg(feature = "metrics")]
        counter!(relay_metrics::COPIES_EDITED_TOTAL).increment(edited as u64);
        edited
    }

    /// Delete every sibling of a deleted copy (or origin). Returns how many
    /// siblings were deleted.
    pub async fn on_message_delete(&self, deletion: &MessageDelete) -> usize {
        let mut state = self.state.lock().await;
        let Some(origin_id) = state.correlations.lookup_reverse(deletion.message_id) else {
            return 0;
        };
        let Some(copies) = state.correlations.take_forward(origin_id) else {
            debug!(%origin_id, "correlation already gone");
            return 0;
        };

        let mut deleted = 0;
        for copy in copies {
            if copy.message_id == deletion.message_id {
                continue;
            }
            let identity = if copy.relayed {
                state.identities.get(copy.channel_id).cloned()
            } else {
                None
            };
            match self.platform.delete_copy(&copy, identity.as_ref()).await {
                Ok(()) => deleted += 1,
                Err(e) if e.is_copy_not_found() => {
                    debug!(message_id = %copy.message_id, "copy already deleted");
                },
                Err(e) => {
                    warn!(message_id = %copy.message_id, error = %e, "failed to delete copy");
                },
            }
        }

        #[cfg(feature = "metrics")]
        counter!(relay_metrics::COPIES_DELETED_TOTAL).increment(deleted as u64);
        deleted
    }

    /// Mirror the first reaction on a message to its siblings. Returns how
    /// many siblings received the reaction.
    pub async fn on_reaction_add(&self, reaction: &ReactionAdd) -> usize {
        if reaction.by_relay || reaction.reaction_total != 1 {
            return 0;
        }

        let state = self.state.lock().await;
        let Some(origin_id) = state.correlations.lookup_reverse(reaction.message_id) else {
            return 0;
        };
        let Some(copies) = state.correlations.lookup_forward(origin_id) else {
            return 0;
        };
        let siblings: Vec<CopyRef> = copies
            .iter()
            .filter(|c| c.message_id != reaction.message_id)
            .copied()
            .collect();

        let mut mirrored = 0;
        for copy in siblings {
            match self.platform.add_reaction(&copy, &reaction.emoji).await {
                Ok(()) => mirrored += 1,
                Err(e) => {
                    debug!(message_id = %copy.message_id, emoji = %reaction.emoji, error = %e, "failed to mirror reaction");
                },
            }
        }

        #[cfg(feature = "metrics")]
        counter!(relay_metrics::REACTIONS_MIRRORED_TOTAL).increment(mirrored as u64);
        mirrored
    }
}
