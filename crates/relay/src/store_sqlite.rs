//! SQLite-backed link store using sqlx.

use {
    async_trait::async_trait,
    secrecy::ExposeSecret,
    sqlx::{SqlitePool, sqlite::SqlitePoolOptions},
};

use crate::{
    Error, Result,
    store::{LinkAdminStore, LinkStore},
    types::{ChannelId, IdentityBinding, Link, LinkId, Membership},
};

/// Internal row type for sqlx mapping.
#[derive(sqlx::FromRow)]
struct LinkRow {
    link_id: i64,
    name: String,
}

impl From<LinkRow> for Link {
    fn from(r: LinkRow) -> Self {
        Self {
            id: LinkId(r.link_id),
            name: r.name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct IdentityRow {
    identity_id: i64,
    credential: String,
}

impl From<IdentityRow> for IdentityBinding {
    fn from(r: IdentityRow) -> Self {
        IdentityBinding::new(r.identity_id as u64, r.credential)
    }
}

/// SQLite-backed persistence for links, memberships and relay identities.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new store with its own connection pool and run migrations.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        crate::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a store using an existing pool (migrations must already be run).
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

}

#[async_trait]
impl LinkStore for SqliteStore {
    async fn fetch_all_memberships(&self) -> Result<Vec<Membership>> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            "SELECT link_id, channel_id FROM channel_links ORDER BY link_id, channel_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(link_id, channel_id)| Membership {
                link_id: LinkId(link_id),
                channel_id: ChannelId(channel_id as u64),
            })
            .collect())
    }

    async fn links_version(&self) -> Result<i64> {
        let (version,) = sqlx::query_as::<_, (i64,)>("SELECT version FROM link_state WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(version)
    }

    async fn fetch_relay_identity(
        &self,
        channel_id: ChannelId,
    ) -> Result<Option<IdentityBinding>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT identity_id, credential FROM channel_identities WHERE channel_id = ?",
        )
        .bind(channel_id.get() as i64)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn create_relay_identity(
        &self,
        channel_id: ChannelId,
        binding: &IdentityBinding,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO channel_identities (channel_id, identity_id, credential) VALUES (?, ?, ?)",
        )
        .bind(channel_id.get() as i64)
        .bind(binding.identity_id as i64)
        .bind(binding.credential.expose_secret())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_relay_identity(
        &self,
        channel_id: ChannelId,
        binding: &IdentityBinding,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE channel_identities SET identity_id = ?, credential = ? WHERE channel_id = ?",
        )
        .bind(binding.identity_id as i64)
        .bind(binding.credential.expose_secret())
        .bind(channel_id.get() as i64)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::invalid_input(format!(
                "no relay identity bound to channel {channel_id}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LinkAdminStore for SqliteStore {
    async fn list_links(&self) -> Result<Vec<Link>> {
        let rows = sqlx::query_as::<_, LinkRow>("SELECT link_id, name FROM links ORDER BY link_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_link(&self, name: &str) -> Result<Link> {
        let result = sqlx::query("INSERT INTO links (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    Error::invalid_input(format!("link '{name}' already exists"))
                },
                e => e.into(),
            })?;
        Ok(Link {
            id: LinkId(result.last_insert_rowid()),
            name: name.to_string(),
        })
    }

    async fn delete_link(&self, link_id: LinkId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM channel_links WHERE link_id = ?")
            .bind(link_id.get())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM links WHERE link_id = ?")
            .bind(link_id.get())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn link_channels(&self, link_id: LinkId) -> Result<Vec<ChannelId>> {
        let rows = sqlx::query_as::<_, (i64,)>(
            "SELECT channel_id FROM channel_links WHERE link_id = ? ORDER BY channel_id",
        )
        .bind(link_id.get())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(channel_id,)| ChannelId(channel_id as u64))
            .collect())
    }

    async fn add_membership(&self, membership: Membership) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO channel_links (link_id, channel_id) VALUES (?, ?)")
            .bind(membership.link_id.get())
            .bind(membership.channel_id.get() as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_membership(&self, membership: Membership) -> Result<bool> {
        let result = sqlx::query("DELETE FROM channel_links WHERE link_id = ? AND channel_id = ?")
            .bind(membership.link_id.get())
            .bind(membership.channel_id.get() as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> SqlitePool {
        // A single connection keeps every query on the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::run_migrations(&pool).await.unwrap();
        pool
    }

    async fn test_store() -> SqliteStore {
        SqliteStore::with_pool(test_pool().await)
    }

    fn member(link: &Link, channel: u64) -> Membership {
        Membership {
            link_id: link.id,
            channel_id: ChannelId(channel),
        }
    }

    #[tokio::test]
    async fn test_create_and_list_links() {
        let store = test_store().await;
        let a = store.create_link("study").await.unwrap();
        let b = store.create_link("Games").await.unwrap();
        assert_ne!(a.id, b.id);

        let links = store.list_links().await.unwrap();
        assert_eq!(links, vec![a, b]);
    }

    #[tokio::test]
    async fn test_memberships() {
        let store = test_store().await;
        let link = store.create_link("study").await.unwrap();
        store.add_membership(member(&link, 11)).await.unwrap();
        store.add_membership(member(&link, 10)).await.unwrap();
        store.add_membership(member(&link, 10)).await.unwrap();

        assert_eq!(store.link_channels(link.id).await.unwrap(), vec![
            ChannelId(10),
            ChannelId(11)
        ]);
        assert_eq!(store.fetch_all_memberships().await.unwrap().len(), 2);

        assert!(store.remove_membership(member(&link, 10)).await.unwrap());
        assert!(!store.remove_membership(member(&link, 10)).await.unwrap());
        assert_eq!(store.link_channels(link.id).await.unwrap(), vec![
            ChannelId(11)
        ]);
    }

    #[tokio::test]
    async fn test_delete_link_cascades() {
        let store = test_store().await;
        let keep = store.create_link("keep").await.unwrap();
        let drop = store.create_link("drop").await.unwrap();
        store.add_membership(member(&keep, 1)).await.unwrap();
        store.add_membership(member(&drop, 2)).await.unwrap();

        store.delete_link(drop.id).await.unwrap();

        assert_eq!(store.list_links().await.unwrap(), vec![keep.clone()]);
        assert_eq!(store.fetch_all_memberships().await.unwrap(), vec![
            member(&keep, 1)
        ]);
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected_ignoring_case() {
        let store = test_store().await;
        store.create_link("study").await.unwrap();
        let err = store.create_link("STUDY").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
        assert_eq!(store.list_links().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_links_version_tracks_structural_writes() {
        let store = test_store().await;
        let v0 = store.links_version().await.unwrap();

        let link = store.create_link("study").await.unwrap();
        store.add_membership(member(&link, 1)).await.unwrap();
        let v1 = store.links_version().await.unwrap();
        assert!(v1 > v0);

        // Ignored duplicates and identity writes do not count.
        store.add_membership(member(&link, 1)).await.unwrap();
        store
            .create_relay_identity(ChannelId(1), &IdentityBinding::new(7, "t"))
            .await
            .unwrap();
        assert_eq!(store.links_version().await.unwrap(), v1);

        store.remove_membership(member(&link, 1)).await.unwrap();
        let v2 = store.links_version().await.unwrap();
        assert!(v2 > v1);

        store.delete_link(link.id).await.unwrap();
        assert!(store.links_version().await.unwrap() > v2);
    }

    #[tokio::test]
    async fn test_identity_binding_lifecycle() {
        let store = test_store().await;
        let channel = ChannelId(1_234_567_890_123_456_789);
        assert!(store.fetch_relay_identity(channel).await.unwrap().is_none());

        store
            .create_relay_identity(channel, &IdentityBinding::new(42, "secret"))
            .await
            .unwrap();
        let got = store.fetch_relay_identity(channel).await.unwrap().unwrap();
        assert_eq!(got.identity_id, 42);
        assert_eq!(got.credential.expose_secret(), "secret");

        // A second binding for the same channel is rejected.
        assert!(
            store
                .create_relay_identity(channel, &IdentityBinding::new(43, "other"))
                .await
                .is_err()
        );

        store
            .update_relay_identity(channel, &IdentityBinding::new(43, "rotated"))
            .await
            .unwrap();
        let got = store.fetch_relay_identity(channel).await.unwrap().unwrap();
        assert_eq!(got.identity_id, 43);
        assert_eq!(got.credential.expose_secret(), "rotated");
    }

    #[tokio::test]
    async fn test_update_without_binding_fails() {
        let store = test_store().await;
        let err = store
            .update_relay_identity(ChannelId(5), &IdentityBinding::new(1, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_closed_pool_is_storage_unavailable() {
        let pool = test_pool().await;
        let store = SqliteStore::with_pool(pool.clone());
        pool.close().await;
        let err = store.fetch_all_memberships().await.unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable { .. }));
    }
}
