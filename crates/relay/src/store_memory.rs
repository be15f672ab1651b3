//! In-memory store for testing.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;

use crate::{
    Error, Result,
    store::{LinkAdminStore, LinkStore},
    types::{ChannelId, IdentityBinding, Link, LinkId, Membership},
};

#[derive(Default)]
struct State {
    next_link_id: i64,
    links_version: i64,
    links: BTreeMap<LinkId, Link>,
    memberships: BTreeSet<(LinkId, ChannelId)>,
    identities: HashMap<ChannelId, IdentityBinding>,
}

/// In-memory store backed by ordered maps. Nothing is persisted.
///
/// [`InMemoryStore::set_unavailable`] makes every call fail with
/// [`Error::StorageUnavailable`], standing in for an unreachable database.
pub struct InMemoryStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::storage_unavailable("in-memory store switched off"));
        }
        Ok(self.state.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Current binding for `channel_id`, bypassing the availability switch.
    pub fn binding(&self, channel_id: ChannelId) -> Option<IdentityBinding> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.identities.get(&channel_id).cloned()
    }
}

#[async_trait]
impl LinkStore for InMemoryStore {
    async fn fetch_all_memberships(&self) -> Result<Vec<Membership>> {
        let state = self.lock()?;
        Ok(state
            .memberships
            .iter()
            .map(|&(link_id, channel_id)| Membership {
                link_id,
                channel_id,
            })
            .collect())
    }

    async fn links_version(&self) -> Result<i64> {
        Ok(self.lock()?.links_version)
    }

    async fn fetch_relay_identity(
        &self,
        channel_id: ChannelId,
    ) -> Result<Option<IdentityBinding>> {
        Ok(self.lock()?.identities.get(&channel_id).cloned())
    }

    async fn create_relay_identity(
        &self,
        channel_id: ChannelId,
        binding: &IdentityBinding,
    ) -> Result<()> {
        let mut state = self.lock()?;
        if state.identities.contains_key(&channel_id) {
            return Err(Error::invalid_input(format!(
                "relay identity already bound to channel {channel_id}"
            )));
        }
        state.identities.insert(channel_id, binding.clone());
        Ok(())
    }

    async fn update_relay_identity(
        &self,
        channel_id: ChannelId,
        binding: &IdentityBinding,
    ) -> Result<()> {
        let mut state = self.lock()?;
        match state.identities.get_mut(&channel_id) {
            Some(existing) => {
                *existing = binding.clone();
                Ok(())
            },
            None => Err(Error::invalid_input(format!(
                "no relay identity bound to channel {channel_id}"
            ))),
        }
    }
}

#[async_trait]
impl LinkAdminStore for InMemoryStore {
    async fn list_links(&self) -> Result<Vec<Link>> {
        Ok(self.lock()?.links.values().cloned().collect())
    }

    async fn create_link(&self, name: &str) -> Result<Link> {
        let mut state = self.lock()?;
        if state.links.values().any(|link| link.matches_name(name)) {
            return Err(Error::invalid_input(format!("link '{name}' already exists")));
        }
        state.next_link_id += 1;
        state.links_version += 1;
        let link = Link {
            id: LinkId(state.next_link_id),
            name: name.to_string(),
        };
        state.links.insert(link.id, link.clone());
        Ok(link)
    }

    async fn delete_link(&self, link_id: LinkId) -> Result<()> {
        let mut state = self.lock()?;
        if state.links.remove(&link_id).is_some() {
            state.memberships.retain(|(l, _)| *l != link_id);
            state.links_version += 1;
        }
        Ok(())
    }

    async fn link_channels(&self, link_id: LinkId) -> Result<Vec<ChannelId>> {
        let state = self.lock()?;
        Ok(state
            .memberships
            .iter()
            .filter(|(l, _)| *l == link_id)
            .map(|&(_, c)| c)
            .collect())
    }

    async fn add_membership(&self, membership: Membership) -> Result<()> {
        let mut state = self.lock()?;
        if !state.links.contains_key(&membership.link_id) {
            return Err(Error::invalid_input(format!(
                "link {} does not exist",
                membership.link_id
            )));
        }
        if state
            .memberships
            .insert((membership.link_id, membership.channel_id))
        {
            state.links_version += 1;
        }
        Ok(())
    }

    async fn remove_membership(&self, membership: Membership) -> Result<bool> {
        let mut state = self.lock()?;
        let removed = state
            .memberships
            .remove(&(membership.link_id, membership.channel_id));
        if removed {
            state.links_version += 1;
        }
        Ok(removed)
    }
}
