//! Discord event handler for serenity.
//!
//! Translates gateway events into relay engine calls.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use {
    serenity::{
        all::{
            ChannelId, Context, EventHandler, GatewayIntents, GuildId, Message, MessageId,
            MessageUpdateEvent, Reaction, Ready,
        },
        async_trait,
    },
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use chanlink_metrics::{counter, discord as discord_metrics, labels};

use chanlink_relay::{MessageDelete, ReactionAdd, RelayEngine};

use crate::{convert, platform::DiscordPlatform};

fn record_event(_event: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(discord_metrics::EVENTS_RECEIVED_TOTAL, labels::EVENT => _event).increment(1);
}

/// Handler for Discord gateway events.
pub struct RelayHandler {
    engine: Arc<RelayEngine<DiscordPlatform>>,
    /// Zero until the first `ready`.
    bot_user_id: AtomicU64,
}

impl RelayHandler {
    pub fn new(engine: Arc<RelayEngine<DiscordPlatform>>) -> Self {
        Self {
            engine,
            bot_user_id: AtomicU64::new(0),
        }
    }

    /// Required gateway intents for the relay.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::GUILD_MESSAGE_REACTIONS
            | GatewayIntents::MESSAGE_CONTENT
    }

    fn is_own_user(&self, user_id: Option<u64>) -> bool {
        let own = self.bot_user_id.load(Ordering::Relaxed);
        own != 0 && user_id == Some(own)
    }

    async fn is_correlated(&self, message_id: MessageId) -> bool {
        self.engine
            .correlation_for(convert::message_id(message_id))
            .await
            .is_some()
    }

    async fn relay_delete(&self, channel_id: ChannelId, message_id: MessageId) {
        let deleted = self
            .engine
            .on_message_delete(&MessageDelete {
                channel_id: convert::channel_id(channel_id),
                message_id: convert::message_id(message_id),
            })
            .await;
        if deleted > 0 {
            debug!(%channel_id, %message_id, deleted, "propagated deletion");
        }
    }
}

#[async_trait]
impl EventHandler for RelayHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.bot_user_id.store(ready.user.id.get(), Ordering::Relaxed);
        info!(
            bot_name = %ready.user.name,
            guilds = ready.guilds.len(),
            "discord bot ready"
        );
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        record_event("message");
        // Webhooks only exist in guild channels.
        if msg.guild_id.is_none() || !convert::is_relayable(&msg) {
            return;
        }

        let inbound = convert::inbound_message(&msg);
        let report = self.engine.on_message(&inbound).await;
        if !report.skipped.is_empty() {
            warn!(
                message_id = %msg.id,
                skipped = report.skipped.len(),
                "message not relayed into every linked channel"
            );
        }
    }

    async fn message_update(
        &self,
        ctx: Context,
        _old_if_available: Option<Message>,
        _new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        record_event("message_update");
        // Only edits to mirrored originals propagate; copies are edited by us.
        if !self.engine.is_origin(convert::message_id(event.id)).await {
            return;
        }

        let msg = match event.channel_id.message(&ctx, event.id).await {
            Ok(msg) => msg,
            Err(e) => {
                debug!(message_id = %event.id, error = %e, "could not fetch edited message");
                return;
            },
        };
        // Embed unfurls also arrive as updates, without an edit timestamp.
        if msg.edited_timestamp.is_none() {
            return;
        }

        let edited = self
            .engine
            .on_message_edit(&convert::message_edit(&msg))
            .await;
        debug!(message_id = %msg.id, edited, "propagated edit");
    }

    async fn message_delete(
        &self,
        _ctx: Context,
        channel_id: ChannelId,
        deleted_message_id: MessageId,
        _guild_id: Option<GuildId>,
    ) {
        record_event("message_delete");
        self.relay_delete(channel_id, deleted_message_id).await;
    }

    async fn message_delete_bulk(
        &self,
        _ctx: Context,
        channel_id: ChannelId,
        multiple_deleted_messages_ids: Vec<MessageId>,
        _guild_id: Option<GuildId>,
    ) {
        record_event("message_delete_bulk");
        for message_id in multiple_deleted_messages_ids {
            self.relay_delete(channel_id, message_id).await;
        }
    }

    async fn reaction_add(&self, ctx: Context, reaction: Reaction) {
        record_event("reaction_add");
        let by_relay = self.is_own_user(reaction.user_id.map(|u| u.get()));
        if by_relay || !self.is_correlated(reaction.message_id).await {
            return;
        }
        let Some(emoji) = convert::emoji(&reaction.emoji) else {
            return;
        };

        let msg = match reaction.channel_id.message(&ctx, reaction.message_id).await {
            Ok(msg) => msg,
            Err(e) => {
                debug!(message_id = %reaction.message_id, error = %e, "could not fetch reacted message");
                return;
            },
        };

        let mirrored = self
            .engine
            .on_reaction_add(&ReactionAdd {
                channel_id: convert::channel_id(reaction.channel_id),
                message_id: convert::message_id(reaction.message_id),
                emoji,
                reaction_total: convert::reaction_total(&msg),
                by_relay,
            })
            .await;
        if mirrored > 0 {
            debug!(message_id = %reaction.message_id, mirrored, "mirrored first reaction");
        }
    }
}
