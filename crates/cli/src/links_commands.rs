//! `chanlink links`: administer links against the same database `run` uses.
//!
//! A running relay notices the change before relaying its next message.

use std::sync::Arc;

use {
    anyhow::{Result, bail},
    chanlink_config::ChanlinkConfig,
    chanlink_discord::{DiscordPlatform, http_platform},
    chanlink_relay::{
        ChannelId, Error as RelayError, LinkAdmin, LinkAdminStore, LinkStore, RelayEngine,
        UnlinkOutcome, store_sqlite::SqliteStore,
    },
    clap::Subcommand,
};

#[derive(Subcommand)]
pub enum LinksAction {
    /// List every link with its channels.
    List,
    /// Create a link (if needed) and add channels to it.
    Link {
        /// Link name, case-insensitive.
        name: String,
        /// Channel ids or `<#id>` mentions.
        #[arg(required = true, value_parser = parse_channel)]
        channels: Vec<ChannelId>,
    },
    /// Remove a channel from a link, or delete the whole link.
    Unlink {
        name: String,
        /// Only remove this channel.
        #[arg(long, value_parser = parse_channel)]
        channel: Option<ChannelId>,
        /// Confirm deleting the whole link.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Bind an existing webhook as the relay identity for a channel.
    SetIdentity {
        #[arg(value_parser = parse_channel)]
        channel: ChannelId,
        /// Full webhook url, e.g. https://discord.com/api/webhooks/<id>/<token>.
        webhook_url: String,
    },
}

/// Accepts a bare snowflake or a channel mention.
fn parse_channel(raw: &str) -> std::result::Result<ChannelId, String> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("<#")
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(trimmed);
    digits
        .parse::<u64>()
        .map(ChannelId)
        .map_err(|_| format!("'{raw}' is not a channel id"))
}

async fn open_admin(config: &ChanlinkConfig) -> Result<LinkAdmin<DiscordPlatform>> {
    crate::prepare_data_dir(config)?;
    let store = Arc::new(SqliteStore::new(&config.database.resolved_url()).await?);

    // Identity provisioning only needs REST access.
    let token = config.discord.token().unwrap_or_default();
    let platform = Arc::new(http_platform(token, &config.relay.identity_name));
    let engine_store: Arc<dyn LinkStore> = Arc::clone(&store) as Arc<dyn LinkStore>;
    let engine = Arc::new(RelayEngine::new(
        platform,
        engine_store,
        crate::engine_config(config),
    ));
    let admin_store: Arc<dyn LinkAdminStore> = store;
    Ok(LinkAdmin::new(admin_store, engine))
}

fn require_token(config: &ChanlinkConfig) -> Result<()> {
    if config.discord.token().is_none() {
        bail!("discord.token must be set to provision relay webhooks");
    }
    Ok(())
}

/// Add a "did you mean" hint to unknown-link errors.
async fn explain(admin: &LinkAdmin<DiscordPlatform>, err: RelayError) -> anyhow::Error {
    if let RelayError::UnknownLink { ref name } = err
        && let Ok(suggestions) = admin.suggest(name).await
        && !suggestions.is_empty()
    {
        return anyhow::anyhow!("{err} (did you mean: {}?)", suggestions.join(", "));
    }
    err.into()
}

fn format_channels(channels: &[ChannelId]) -> String {
    channels
        .iter()
        .map(|c| format!("<#{c}>"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub async fn handle_links(action: &LinksAction, config: ChanlinkConfig) -> Result<()> {
    let admin = open_admin(&config).await?;

    match action {
        LinksAction::List => {
            let links = admin.list().await?;
            if links.is_empty() {
                println!("No links.");
            }
            for summary in links {
                println!(
                    "{} ({} channels): {}",
                    summary.link.name,
                    summary.channels.len(),
                    format_channels(&summary.channels)
                );
            }
        },
        LinksAction::Link { name, channels } => {
            require_token(&config)?;
            let outcome = admin.link(name, channels).await?;
            if outcome.created {
                println!("Created link '{}'.", outcome.link.name);
            }
            if !outcome.added.is_empty() {
                println!("Added: {}", format_channels(&outcome.added));
            }
            for (channel, reason) in &outcome.failed {
                eprintln!("Skipped <#{channel}>: {reason}");
            }
            println!(
                "'{}' now links: {}",
                outcome.link.name,
                format_channels(&outcome.channels)
            );
        },
        LinksAction::Unlink { name, channel, yes } => {
            if channel.is_none() && !yes {
                bail!("this deletes link '{name}' and all of its channels; pass --yes to confirm");
            }
            let outcome = match admin.unlink(name, *channel).await {
                Ok(outcome) => outcome,
                Err(e) => return Err(explain(&admin, e).await),
            };
            match outcome {
                UnlinkOutcome::ChannelRemoved { link, channel_id } => {
                    println!("Removed <#{channel_id}> from '{}'.", link.name);
                },
                UnlinkOutcome::LinkRemoved { link, channels } => {
                    println!(
                        "Deleted link '{}' ({}).",
                        link.name,
                        format_channels(&channels)
                    );
                },
            }
        },
        LinksAction::SetIdentity {
            channel,
            webhook_url,
        } => {
            let binding = DiscordPlatform::binding_from_url(webhook_url)?;
            admin.set_identity(*channel, binding).await?;
            println!("Relay identity for <#{channel}> updated.");
        },
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_ids_and_mentions() {
        assert_eq!(parse_channel("42").unwrap(), ChannelId(42));
        assert_eq!(parse_channel("<#1234>").unwrap(), ChannelId(1234));
        assert_eq!(parse_channel(" 7 ").unwrap(), ChannelId(7));
    }

    #[test]
    fn rejects_non_numeric_channels() {
        assert!(parse_channel("general").is_err());
        assert!(parse_channel("<#abc>").is_err());
        assert!(parse_channel("<@123>").is_err());
    }

    #[test]
    fn formats_channel_mentions() {
        assert_eq!(
            format_channels(&[ChannelId(1), ChannelId(2)]),
            "<#1> <#2>"
        );
        assert_eq!(format_channels(&[]), "");
    }
}
