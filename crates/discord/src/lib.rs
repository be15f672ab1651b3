//! Discord adapter for the chanlink relay.
//!
//! Feeds serenity gateway events into [`chanlink_relay::RelayEngine`] and
//! implements [`chanlink_relay::RelayPlatform`] on top of channel webhooks.

pub mod bot;
pub mod convert;
pub mod error;
pub mod handler;
pub mod platform;
pub mod webhook;

pub use {
    bot::{DiscordRelay, http_platform},
    error::{Error, Result},
    handler::RelayHandler,
    platform::DiscordPlatform,
    webhook::parse_webhook_url,
};
