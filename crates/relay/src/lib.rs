//! Cross-channel message relay.
//!
//! Channels grouped under a named link mirror each other: a message posted in
//! one member is re-posted into every other member through that channel's
//! relay identity. Edits, deletions and the first reaction on any copy are
//! propagated to the rest of the copies.
//!
//! Links and identity bindings persist in SQLite (`channel_links`,
//! `channel_identities`); message correlations live in bounded FIFO caches
//! and are lost on restart.

pub mod admin;
pub mod cache;
pub mod content;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod identity;
pub mod links;
pub mod platform;
pub mod platform_memory;
pub mod store;
pub mod store_memory;
pub mod store_sqlite;
pub mod types;

pub use {
    admin::{LinkAdmin, LinkOutcome, LinkSummary, UnlinkOutcome},
    engine::{EngineConfig, FanOutReport, RelayEngine},
    error::{Error, Result},
    platform::RelayPlatform,
    store::{LinkAdminStore, LinkStore},
    types::{
        Attachment, ChannelId, CopyRef, CopyUpdate, Embed, Emoji, IdentityBinding,
        InboundMessage, Link, LinkId, Membership, MessageDelete, MessageEdit, MessageId,
        OutboundPost, ReactionAdd, Upload,
    },
};

/// Run database migrations for the relay crate.
///
/// Creates the `links`, `channel_links` and `channel_identities` tables.
/// Called by [`store_sqlite::SqliteStore::new`]; call it directly when
/// building the store from a shared pool.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
