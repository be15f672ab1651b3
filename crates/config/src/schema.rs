/// Config schema types (relay tunables, storage, Discord credentials, metrics).
use std::{collections::HashMap, fmt, net::SocketAddr};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Default number of origin messages whose copies are tracked.
pub const DEFAULT_CORRELATION_CAPACITY: usize = 200;
/// Default number of copy → origin entries tracked.
pub const DEFAULT_REVERSE_CAPACITY: usize = 600;
/// Default display name of the webhooks the relay creates.
pub const DEFAULT_IDENTITY_NAME: &str = "Channel Link";
/// Dark grey.
pub const DEFAULT_REPLY_EMBED_COLOUR: u32 = 0x607D8B;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChanlinkConfig {
    pub relay: RelayConfig,
    pub database: DatabaseConfig,
    pub discord: DiscordConfig,
    pub metrics: MetricsConfig,
}

/// Relay engine tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// How many origin messages keep their copy list for edit/delete/reaction
    /// propagation. Oldest entries are evicted first.
    pub correlation_capacity: usize,
    /// How many copy ids map back to their origin. Should cover roughly
    /// `correlation_capacity` × copies per message.
    pub reverse_capacity: usize,
    /// Name given to newly created relay webhooks.
    pub identity_name: String,
    /// Colour of the "Reply to" embed attached to mirrored replies.
    pub reply_embed_colour: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            correlation_capacity: DEFAULT_CORRELATION_CAPACITY,
            reverse_capacity: DEFAULT_REVERSE_CAPACITY,
            identity_name: DEFAULT_IDENTITY_NAME.into(),
            reply_embed_colour: DEFAULT_REPLY_EMBED_COLOUR,
        }
    }
}

/// Durable storage for links and relay identities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection url. Defaults to `chanlink.db` in the data directory.
    pub url: Option<String>,
}

impl DatabaseConfig {
    /// The configured url, or a `sqlite:` url inside the data directory.
    #[must_use]
    pub fn resolved_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => {
                let path = crate::loader::data_dir().join("chanlink.db");
                format!("sqlite:{}?mode=rwc", path.display())
            },
        }
    }
}

/// Discord bot credentials.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    #[serde(serialize_with = "serialize_option_secret")]
    pub token: Option<Secret<String>>,
}

impl fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl DiscordConfig {
    /// The bot token, when configured and not an unresolved `${VAR}`.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token
            .as_ref()
            .map(|t| t.expose_secret().as_str())
            .filter(|t| !t.is_empty() && !t.starts_with("${"))
    }
}

/// Metrics and observability configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled.
    pub enabled: bool,
    /// Serve Prometheus metrics on this address, e.g. `127.0.0.1:9185`.
    pub prometheus_listen: Option<SocketAddr>,
    /// Additional labels to add to all metrics.
    pub labels: HashMap<String, String>,
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_relay_constants() {
        let cfg = ChanlinkConfig::default();
        assert_eq!(cfg.relay.correlation_capacity, 200);
        assert_eq!(cfg.relay.reverse_capacity, 600);
        assert_eq!(cfg.relay.identity_name, "Channel Link");
        assert!(!cfg.metrics.enabled);
        assert!(cfg.discord.token().is_none());
    }

    #[test]
    fn token_is_redacted_in_debug_but_serialized() {
        let cfg: ChanlinkConfig = toml::from_str(
            r#"
[discord]
token = "abc.def"
"#,
        )
        .unwrap();
        assert_eq!(cfg.discord.token(), Some("abc.def"));
        assert!(!format!("{cfg:?}").contains("abc.def"));
        assert!(toml::to_string(&cfg).unwrap().contains("abc.def"));
    }

    #[test]
    fn unresolved_placeholder_is_not_a_token() {
        let cfg: ChanlinkConfig = toml::from_str(
            r#"
[discord]
token = "${DISCORD_TOKEN}"
"#,
        )
        .unwrap();
        assert!(cfg.discord.token().is_none());
    }

    #[test]
    fn explicit_database_url_wins() {
        let db = DatabaseConfig {
            url: Some("sqlite::memory:".into()),
        };
        assert_eq!(db.resolved_url(), "sqlite::memory:");
    }
}
