//! Identifiers, durable records, and the platform-neutral message shapes the
//! relay reads and writes.

use std::fmt;

use {
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            #[must_use]
            pub fn get(self) -> $inner {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Durable link identity.
    LinkId(i64)
);
id_type!(
    /// Platform channel identity.
    ChannelId(u64)
);
id_type!(
    /// Platform message identity.
    MessageId(u64)
);

/// A named set of channels whose messages mirror to one another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub name: String,
}

impl Link {
    /// Link names are unique ignoring case.
    #[must_use]
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

/// A single (link, channel) membership row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Membership {
    pub link_id: LinkId,
    pub channel_id: ChannelId,
}

/// Durable channel → relay identity binding (address + credential).
#[derive(Debug, Clone)]
pub struct IdentityBinding {
    pub identity_id: u64,
    pub credential: Secret<String>,
}

impl IdentityBinding {
    #[must_use]
    pub fn new(identity_id: u64, credential: impl Into<String>) -> Self {
        Self {
            identity_id,
            credential: Secret::new(credential.into()),
        }
    }
}

/// One member of a correlation: the origin message itself or a mirrored copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CopyRef {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    /// Posted by the relay through the channel's relay identity.
    pub relayed: bool,
}

impl CopyRef {
    #[must_use]
    pub fn origin(channel_id: ChannelId, message_id: MessageId) -> Self {
        Self {
            channel_id,
            message_id,
            relayed: false,
        }
    }

    #[must_use]
    pub fn relayed(channel_id: ChannelId, message_id: MessageId) -> Self {
        Self {
            channel_id,
            message_id,
            relayed: true,
        }
    }
}

/// Attachment on an inbound message, fetched by the platform on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
    pub spoiler: bool,
}

/// An attachment re-materialised as a new file payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub filename: String,
    pub data: Vec<u8>,
    pub spoiler: bool,
}

/// Embed kind the relay forwards verbatim.
pub const RICH_EMBED: &str = "rich";

/// Rich embed carried through the relay.
///
/// `raw` holds the platform's own representation when the embed came from an
/// inbound message; synthesized embeds only carry `description` and `colour`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Embed {
    pub kind: Option<String>,
    pub description: Option<String>,
    pub colour: Option<u32>,
    pub raw: Option<serde_json::Value>,
}

impl Embed {
    #[must_use]
    pub fn is_rich(&self) -> bool {
        self.kind.as_deref() == Some(RICH_EMBED)
    }

    /// The summary embed appended to copies of a reply.
    #[must_use]
    pub fn reply_summary(reply_url: &str, colour: u32) -> Self {
        Self {
            kind: Some(RICH_EMBED.into()),
            description: Some(format!("Reply to {reply_url}")),
            colour: Some(colour),
            raw: None,
        }
    }
}

/// Reaction emoji.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Emoji {
    Unicode(String),
    Custom {
        id: u64,
        name: Option<String>,
        animated: bool,
    },
}

impl fmt::Display for Emoji {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unicode(s) => f.write_str(s),
            Self::Custom { id, name, .. } => {
                write!(f, "{}:{id}", name.as_deref().unwrap_or("_"))
            },
        }
    }
}

/// A newly created message observed in some channel.
#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub embeds: Vec<Embed>,
    /// Jump url of the referenced message when this message is a reply.
    pub reply_url: Option<String>,
    /// Set by the platform when a relay identity produced this message.
    pub from_relay: bool,
}

/// An edit observed on some message.
#[derive(Debug, Clone, Default)]
pub struct MessageEdit {
    pub before_id: MessageId,
    pub after_id: MessageId,
    pub channel_id: ChannelId,
    pub content: String,
    pub embeds: Vec<Embed>,
    pub reply_url: Option<String>,
}

/// A deletion observed on some message.
#[derive(Debug, Clone, Copy)]
pub struct MessageDelete {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

/// A reaction added to some message.
#[derive(Debug, Clone)]
pub struct ReactionAdd {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub emoji: Emoji,
    /// Total reactions on the message after this one was added, all emoji.
    pub reaction_total: u64,
    /// The reacting user is the relay's own bot account.
    pub by_relay: bool,
}

/// Payload posted through a relay identity.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundPost {
    pub content: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub embeds: Vec<Embed>,
    pub uploads: Vec<Upload>,
    /// Mirrored content never triggers @everyone, @here, role or user pings.
    pub suppress_mentions: bool,
}

/// New content applied to an existing copy.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyUpdate {
    pub content: String,
    pub embeds: Vec<Embed>,
}
