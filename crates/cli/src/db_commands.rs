use std::path::{Path, PathBuf};

use {anyhow::bail, chanlink_config::ChanlinkConfig, clap::Subcommand};

#[derive(Subcommand)]
pub enum DbAction {
    /// Delete the default database file (links, memberships, identities).
    Reset {
        /// Confirm the deletion.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Run all pending database migrations.
    Migrate,
}

pub async fn handle_db(action: &DbAction, config: ChanlinkConfig) -> anyhow::Result<()> {
    match action {
        DbAction::Reset { yes } => reset_database(&config, *yes),
        DbAction::Migrate => run_migrations(&config).await,
    }
}

fn default_db_path() -> PathBuf {
    chanlink_config::data_dir().join("chanlink.db")
}

/// The database file plus the WAL and SHM files SQLite may have created.
fn db_files(base: &Path) -> Vec<PathBuf> {
    ["", "-wal", "-shm"]
        .iter()
        .map(|suffix| {
            let mut name = base.as_os_str().to_owned();
            name.push(suffix);
            PathBuf::from(name)
        })
        .collect()
}

fn reset_database(config: &ChanlinkConfig, yes: bool) -> anyhow::Result<()> {
    if config.database.url.is_some() {
        bail!("database.url is set explicitly; remove that database by hand");
    }
    if !yes {
        bail!("this deletes every link and relay identity; pass --yes to confirm");
    }

    let mut deleted = false;
    for path in db_files(&default_db_path()) {
        if path.exists() {
            std::fs::remove_file(&path)?;
            println!("Deleted: {}", path.display());
            deleted = true;
        }
    }

    if deleted {
        println!("Database deleted. Run `chanlink db migrate` to recreate it.");
    } else {
        println!("No database files found.");
    }
    Ok(())
}

async fn run_migrations(config: &ChanlinkConfig) -> anyhow::Result<()> {
    crate::prepare_data_dir(config)?;
    let db_url = config.database.resolved_url();
    println!("Running migrations for {db_url}...");

    let pool = sqlx::SqlitePool::connect(&db_url).await?;
    chanlink_relay::run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("relay migrations failed: {e}"))?;
    pool.close().await;

    println!("All migrations complete.");
    Ok(())
}
