//! `chanlink run`: connect to the gateway and relay until interrupted.

use std::sync::Arc;

use {
    anyhow::{Context, bail},
    chanlink_config::{ChanlinkConfig, Severity, validate_for_run},
    chanlink_discord::{DiscordPlatform, DiscordRelay},
    chanlink_relay::{LinkStore, RelayEngine, store_sqlite::SqliteStore},
    tracing::{error, info, warn},
};

pub async fn run(config: ChanlinkConfig) -> anyhow::Result<()> {
    let mut fatal = 0;
    for d in validate_for_run(&config) {
        match d.severity {
            Severity::Error => {
                error!(path = %d.path, "{}", d.message);
                fatal += 1;
            },
            Severity::Warning => warn!(path = %d.path, "{}", d.message),
            Severity::Info => info!(path = %d.path, "{}", d.message),
        }
    }
    if fatal > 0 {
        bail!("configuration has {fatal} error(s); run `chanlink config check`");
    }
    let Some(token) = config.discord.token() else {
        bail!("discord.token is not set");
    };

    #[cfg(feature = "metrics")]
    let _metrics = chanlink_metrics::init_metrics(chanlink_metrics::MetricsRecorderConfig {
        enabled: config.metrics.enabled,
        listen: config.metrics.prometheus_listen,
        global_labels: config
            .metrics
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    })?;

    crate::prepare_data_dir(&config)?;
    let database_url = config.database.resolved_url();
    let store = SqliteStore::new(&database_url)
        .await
        .with_context(|| format!("opening link store at {database_url}"))?;
    let store: Arc<dyn LinkStore> = Arc::new(store);

    let mut relay = DiscordRelay::connect(
        token,
        &config.relay.identity_name,
        store,
        crate::engine_config(&config),
    )
    .await?;
    info!(
        capacity = config.relay.correlation_capacity,
        "relay engine ready"
    );

    spawn_reload_on_hangup(Arc::clone(&relay.engine));

    let shard_manager = Arc::clone(&relay.client.shard_manager);
    tokio::select! {
        result = relay.start() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            shard_manager.shutdown_all().await;
        },
    }
    Ok(())
}

/// Force a link index rebuild on SIGHUP. New messages already pick up
/// changes made by `chanlink links`; this covers a quiet relay.
#[cfg(unix)]
fn spawn_reload_on_hangup(engine: Arc<RelayEngine<DiscordPlatform>>) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "SIGHUP reload unavailable");
            return;
        },
    };
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            match engine.reload_links().await {
                Ok(()) => info!("link index reloaded"),
                Err(e) => warn!(error = %e, "link reload failed, keeping previous index"),
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_engine: Arc<RelayEngine<DiscordPlatform>>) {}
