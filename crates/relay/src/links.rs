//! Read-optimised projection of link memberships.
//!
//! Always rebuilt wholesale from the durable membership list; never patched.

use std::collections::{BTreeSet, HashMap};

use crate::types::{ChannelId, LinkId, Membership};

#[derive(Debug, Clone, Default)]
pub struct LinkIndex {
    channel_links: HashMap<ChannelId, BTreeSet<LinkId>>,
    link_channels: HashMap<LinkId, BTreeSet<ChannelId>>,
}

impl LinkIndex {
    pub fn from_memberships(memberships: impl IntoIterator<Item = Membership>) -> Self {
        let mut index = Self::default();
        for Membership {
            link_id,
            channel_id,
        } in memberships
        {
            index
                .channel_links
                .entry(channel_id)
                .or_default()
                .insert(link_id);
            index
                .link_channels
                .entry(link_id)
                .or_default()
                .insert(channel_id);
        }
        index
    }

    pub fn links_for(&self, channel_id: ChannelId) -> Vec<LinkId> {
        self.channel_links
            .get(&channel_id)
            .map(|links| links.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn channels_for(&self, link_id: LinkId) -> Vec<ChannelId> {
        self.link_channels
            .get(&link_id)
            .map(|channels| channels.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every channel sharing at least one link with `origin`, each listed once,
    /// `origin` itself excluded.
    pub fn destinations_for(&self, origin: ChannelId) -> Vec<ChannelId> {
        let Some(links) = self.channel_links.get(&origin) else {
            return Vec::new();
        };
        links
            .iter()
            .filter_map(|link_id| self.link_channels.get(link_id))
            .flatten()
            .copied()
            .filter(|&channel_id| channel_id != origin)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// All channels that belong to at least one link.
    pub fn channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.channel_links.keys().copied()
    }

    pub fn link_count(&self) -> usize {
        self.link_channels.len()
    }

    pub fn channel_count(&self) -> usize {
        self.channel_links.len()
    }
}
