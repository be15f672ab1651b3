//! Per-channel relay identity cache with provision-if-absent.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::{Result, platform::RelayPlatform, store::LinkStore, types::ChannelId};

pub struct RelayIdentityCache<I> {
    identities: HashMap<ChannelId, I>,
}

impl<I> Default for RelayIdentityCache<I> {
    fn default() -> Self {
        Self {
            identities: HashMap::new(),
        }
    }
}

impl<I: Clone> RelayIdentityCache<I> {
    pub fn get(&self, channel_id: ChannelId) -> Option<&I> {
        self.identities.get(&channel_id)
    }

    /// Overwrite the cached identity for `channel_id`.
    pub fn insert(&mut self, channel_id: ChannelId, identity: I) {
        self.identities.insert(channel_id, identity);
    }

    /// Return the cached identity, else wrap the stored binding, else create
    /// and persist a new identity.
    ///
    /// Takes `&mut self`, so concurrent callers are serialized by whoever owns
    /// the cache and at most one identity is ever created per channel.
    pub async fn get_or_provision<P>(
        &mut self,
        channel_id: ChannelId,
        store: &dyn LinkStore,
        platform: &P,
    ) -> Result<I>
    where
        P: RelayPlatform<Identity = I>,
    {
        if let Some(identity) = self.identities.get(&channel_id) {
            return Ok(identity.clone());
        }

        let identity = match store.fetch_relay_identity(channel_id).await? {
            Some(binding) => {
                debug!(%channel_id, identity_id = binding.identity_id, "reusing stored relay identity");
                platform.resolve_identity(channel_id, &binding).await?
            },
            None => {
                let (identity, binding) = platform.create_identity(channel_id).await?;
                store.create_relay_identity(channel_id, &binding).await?;
                info!(%channel_id, identity_id = binding.identity_id, "created relay identity");
                identity
            },
        };

        self.identities.insert(channel_id, identity.clone());
        Ok(identity)
    }
}
