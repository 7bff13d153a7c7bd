use crate::storage::StorageResult;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Banned IP addresses, managed out-of-band by the admin CLI.
///
/// `is_banned` takes its snapshot at call time so admin edits are visible
/// to the very next request; there is deliberately no caching layer here.
#[async_trait]
pub trait BanRegistry: Send + Sync {
    /// Exact string match against the current ban list
    async fn is_banned(&self, ip_address: &str) -> StorageResult<bool>;

    async fn ban(&self, ip_address: &str) -> StorageResult<()>;

    /// Returns true if the address was on the list
    async fn unban(&self, ip_address: &str) -> StorageResult<bool>;

    async fn banned(&self) -> StorageResult<Vec<String>>;
}

pub struct SqliteBanRegistry {
    pool: Arc<SqlitePool>,
}

impl SqliteBanRegistry {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query("CREATE TABLE IF NOT EXISTS banned_ips (ip_address TEXT PRIMARY KEY)")
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BanRegistry for SqliteBanRegistry {
    async fn is_banned(&self, ip_address: &str) -> StorageResult<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM banned_ips WHERE ip_address = ?",
        )
        .bind(ip_address)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count > 0)
    }

    async fn ban(&self, ip_address: &str) -> StorageResult<()> {
        sqlx::query("INSERT INTO banned_ips (ip_address) VALUES (?) ON CONFLICT DO NOTHING")
            .bind(ip_address)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn unban(&self, ip_address: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM banned_ips WHERE ip_address = ?")
            .bind(ip_address)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn banned(&self) -> StorageResult<Vec<String>> {
        let ips = sqlx::query_scalar::<_, String>(
            "SELECT ip_address FROM banned_ips ORDER BY ip_address",
        )
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(ips)
    }
}
