use std::sync::Arc;

use {
    serenity::all::{Client, Http},
    tracing::info,
};

use chanlink_relay::{EngineConfig, LinkStore, RelayEngine};

use crate::{Result, handler::RelayHandler, platform::DiscordPlatform};

/// REST-only platform, for administration without a gateway session.
pub fn http_platform(token: &str, identity_name: &str) -> DiscordPlatform {
    DiscordPlatform::new(Arc::new(Http::new(token)), identity_name)
}

/// Engine plus the gateway client feeding it.
pub struct DiscordRelay {
    pub engine: Arc<RelayEngine<DiscordPlatform>>,
    pub client: Client,
}

impl DiscordRelay {
    /// Build the engine, load the link index, and prepare the gateway client.
    pub async fn connect(
        token: &str,
        identity_name: &str,
        store: Arc<dyn LinkStore>,
        config: EngineConfig,
    ) -> Result<Self> {
        let platform = Arc::new(http_platform(token, identity_name));
        let engine = Arc::new(RelayEngine::new(platform, store, config));
        engine.reload_links().await?;

        let client = Client::builder(token, RelayHandler::intents())
            .event_handler(RelayHandler::new(Arc::clone(&engine)))
            .await?;
        info!("discord client built");
        Ok(Self { engine, client })
    }

    /// Run the gateway until the shards stop.
    pub async fn start(&mut self) -> Result<()> {
        self.client.start().await?;
        Ok(())
    }
}
