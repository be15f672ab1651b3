//! Mapping between serenity models and the relay's platform-neutral types.

use serenity::all::{
    self as discord, CreateEmbed, GuildId, Message, MessageType, ReactionType,
};

use chanlink_relay::{Attachment, ChannelId, Embed, Emoji, InboundMessage, MessageEdit, MessageId};

/// Discord marks spoilered files by filename prefix.
pub const SPOILER_PREFIX: &str = "SPOILER_";
/// Webhook display names are capped at 80 characters.
pub const MAX_USERNAME_CHARS: usize = 80;

pub fn channel_id(id: discord::ChannelId) -> ChannelId {
    ChannelId(id.get())
}

pub fn message_id(id: discord::MessageId) -> MessageId {
    MessageId(id.get())
}

/// Link to a message as shown by the client's "Copy Message Link".
pub fn jump_url(
    guild_id: Option<GuildId>,
    channel_id: discord::ChannelId,
    message_id: discord::MessageId,
) -> String {
    let guild = guild_id.map_or_else(|| "@me".to_string(), |g| g.to_string());
    format!("https://discord.com/channels/{guild}/{channel_id}/{message_id}")
}

/// Whether the message is user content the relay should mirror. Joins, pins,
/// boosts and other system messages are not.
pub fn is_relayable(msg: &Message) -> bool {
    matches!(msg.kind, MessageType::Regular | MessageType::InlineReply)
}

/// Server nickname, else global display name, else username.
pub fn display_name(msg: &Message) -> String {
    msg.member
        .as_ref()
        .and_then(|m| m.nick.clone())
        .or_else(|| msg.author.global_name.clone())
        .unwrap_or_else(|| msg.author.name.clone())
}

/// Trim a display name to what the webhook API accepts.
pub fn webhook_username(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return "Unknown".to_string();
    }
    trimmed.chars().take(MAX_USERNAME_CHARS).collect()
}

pub fn reply_url(msg: &Message) -> Option<String> {
    if msg.kind != MessageType::InlineReply {
        return None;
    }
    let reference = msg.message_reference.as_ref()?;
    let target = reference.message_id?;
    Some(jump_url(
        reference.guild_id.or(msg.guild_id),
        reference.channel_id,
        target,
    ))
}

pub fn attachment(a: &discord::Attachment) -> Attachment {
    Attachment {
        filename: a.filename.clone(),
        url: a.url.clone(),
        spoiler: a.filename.starts_with(SPOILER_PREFIX),
    }
}

/// Filename to upload under, re-applying the spoiler prefix when needed.
pub fn upload_filename(filename: &str, spoiler: bool) -> String {
    if spoiler && !filename.starts_with(SPOILER_PREFIX) {
        format!("{SPOILER_PREFIX}{filename}")
    } else {
        filename.to_string()
    }
}

pub fn embed(e: &discord::Embed) -> Embed {
    Embed {
        kind: e.kind.clone(),
        description: e.description.clone(),
        colour: e.colour.map(|c| c.0),
        raw: serde_json::to_value(e).ok(),
    }
}

/// Rebuild an outbound embed, verbatim when the original payload is known.
pub fn create_embed(e: &Embed) -> CreateEmbed {
    if let Some(original) = e
        .raw
        .as_ref()
        .and_then(|raw| serde_json::from_value::<discord::Embed>(raw.clone()).ok())
    {
        return CreateEmbed::from(original);
    }
    let mut builder = CreateEmbed::new();
    if let Some(description) = &e.description {
        builder = builder.description(description);
    }
    if let Some(colour) = e.colour {
        builder = builder.colour(colour);
    }
    builder
}

pub fn emoji(reaction: &ReactionType) -> Option<Emoji> {
    match reaction {
        ReactionType::Unicode(s) => Some(Emoji::Unicode(s.clone())),
        ReactionType::Custom { animated, id, name } => Some(Emoji::Custom {
            id: id.get(),
            name: name.clone(),
            animated: *animated,
        }),
        _ => None,
    }
}

pub fn reaction_type(emoji: &Emoji) -> ReactionType {
    match emoji {
        Emoji::Unicode(s) => ReactionType::Unicode(s.clone()),
        Emoji::Custom { id, name, animated } => ReactionType::Custom {
            animated: *animated,
            id: discord::EmojiId::new(*id),
            name: name.clone(),
        },
    }
}

/// Reactions on the message across every emoji.
pub fn reaction_total(msg: &Message) -> u64 {
    msg.reactions.iter().map(|r| r.count).sum()
}

pub fn inbound_message(msg: &Message) -> InboundMessage {
    InboundMessage {
        id: message_id(msg.id),
        channel_id: channel_id(msg.channel_id),
        author_name: display_name(msg),
        author_avatar_url: Some(msg.author.face()),
        content: msg.content.clone(),
        attachments: msg.attachments.iter().map(attachment).collect(),
        embeds: msg.embeds.iter().map(embed).collect(),
        reply_url: reply_url(msg),
        from_relay: msg.webhook_id.is_some(),
    }
}

/// Discord keeps the message id across edits.
pub fn message_edit(msg: &Message) -> MessageEdit {
    MessageEdit {
        before_id: message_id(msg.id),
        after_id: message_id(msg.id),
        channel_id: channel_id(msg.channel_id),
        content: msg.content.clone(),
        embeds: msg.embeds.iter().map(embed).collect(),
        reply_url: reply_url(msg),
    }
}
