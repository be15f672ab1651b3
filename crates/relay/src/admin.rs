//! Link administration: create/extend, shrink/destroy, list, and explicit
//! identity binding. Every structural change ends with an engine reload.

use std::{collections::BTreeSet, sync::Arc};

use tracing::{info, warn};

use crate::{
    Error, Result,
    engine::RelayEngine,
    platform::RelayPlatform,
    store::LinkAdminStore,
    types::{ChannelId, IdentityBinding, Link, Membership},
};

/// Result of [`LinkAdmin::link`].
#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub link: Link,
    pub created: bool,
    /// Channels newly added by this call.
    pub added: Vec<ChannelId>,
    /// Channels that could not be provisioned, with the reason.
    pub failed: Vec<(ChannelId, String)>,
    /// Every member of the link after the reload.
    pub channels: Vec<ChannelId>,
}

/// Result of [`LinkAdmin::unlink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlinkOutcome {
    ChannelRemoved { link: Link, channel_id: ChannelId },
    LinkRemoved { link: Link, channels: Vec<ChannelId> },
}

/// A link with its member channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSummary {
    pub link: Link,
    pub channels: Vec<ChannelId>,
}

pub struct LinkAdmin<P: RelayPlatform> {
    store: Arc<dyn LinkAdminStore>,
    engine: Arc<RelayEngine<P>>,
}

impl<P: RelayPlatform> LinkAdmin<P> {
    pub fn new(store: Arc<dyn LinkAdminStore>, engine: Arc<RelayEngine<P>>) -> Self {
        Self { store, engine }
    }

    async fn find_link(&self, name: &str) -> Result<Option<Link>> {
        let links = self.store.list_links().await?;
        Ok(links.into_iter().find(|link| link.matches_name(name)))
    }

    /// Create link `name` if it does not exist, then add `channels` to it.
    pub async fn link(&self, name: &str, channels: &[ChannelId]) -> Result<LinkOutcome> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid_input("link name must not be empty"));
        }

        let (link, created) = match self.find_link(name).await? {
            Some(link) => (link, false),
            None => match self.store.create_link(name).await {
                Ok(link) => {
                    info!(link_id = %link.id, name = %link.name, "created link");
                    (link, true)
                },
                // Another process created it since the lookup.
                Err(Error::InvalidInput { .. }) => match self.find_link(name).await? {
                    Some(link) => (link, false),
                    None => return Err(Error::invalid_input(format!("link '{name}' is taken"))),
                },
                Err(e) => return Err(e),
            },
        };
        let existing: BTreeSet<ChannelId> =
            self.store.link_channels(link.id).await?.into_iter().collect();

        let requested: BTreeSet<ChannelId> = channels.iter().copied().collect();
        let mut added = Vec::new();
        let mut failed = Vec::new();
        for channel_id in requested {
            if let Err(e) = self.engine.identity_for(channel_id).await {
                warn!(%channel_id, error = %e, "not linking channel without relay identity");
                failed.push((channel_id, e.to_string()));
                continue;
            }
            if !existing.contains(&channel_id) {
                self.store
                    .add_membership(Membership {
                        link_id: link.id,
                        channel_id,
                    })
                    .await?;
                added.push(channel_id);
            }
        }

        self.engine.reload_links().await?;
        let channels = self.engine.channels_for(link.id).await;

        Ok(LinkOutcome {
            link,
            created,
            added,
            failed,
            channels,
        })
    }

    /// Remove `channel` from link `name`, or destroy the link entirely when
    /// no channel is given.
    pub async fn unlink(&self, name: &str, channel: Option<ChannelId>) -> Result<UnlinkOutcome> {
        let link = self
            .find_link(name.trim())
            .await?
            .ok_or_else(|| Error::unknown_link(name.trim()))?;
        let channels = self.store.link_channels(link.id).await?;

        let outcome = match channel {
            Some(channel_id) => {
                if !channels.contains(&channel_id) {
                    return Err(Error::NotLinked {
                        name: link.name,
                        channel_id,
                    });
                }
                self.store
                    .remove_membership(Membership {
                        link_id: link.id,
                        channel_id,
                    })
                    .await?;
                info!(link_id = %link.id, %channel_id, "unlinked channel");
                UnlinkOutcome::ChannelRemoved { link, channel_id }
            },
            None => {
                self.store.delete_link(link.id).await?;
                info!(link_id = %link.id, name = %link.name, "removed link");
                UnlinkOutcome::LinkRemoved { link, channels }
            },
        };

        self.engine.reload_links().await?;
        Ok(outcome)
    }

    /// Every link with its member channels.
    pub async fn list(&self) -> Result<Vec<LinkSummary>> {
        let links = self.store.list_links().await?;
        let mut summaries = Vec::with_capacity(links.len());
        for link in links {
            let channels = self.store.link_channels(link.id).await?;
            summaries.push(LinkSummary { link, channels });
        }
        Ok(summaries)
    }

    /// Bind `channel_id` to an explicitly supplied relay identity.
    pub async fn set_identity(&self, channel_id: ChannelId, binding: IdentityBinding) -> Result<()> {
        self.engine.set_identity(channel_id, binding).await
    }

    /// Link names containing `partial`, ignoring case.
    pub async fn suggest(&self, partial: &str) -> Result<Vec<String>> {
        let needle = partial.to_lowercase();
        Ok(self
            .store
            .list_links()
            .await?
            .into_iter()
            .filter(|link| link.name.to_lowercase().contains(&needle))
            .map(|link| link.name)
            .collect())
    }
}
