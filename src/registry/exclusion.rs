use crate::storage::StorageResult;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Externally managed exclusion lists: user-agent keywords and path
/// prefixes. Mutated by the admin CLI, read on every tracked request.
#[async_trait]
pub trait ExclusionSource: Send + Sync {
    async fn agent_keywords(&self) -> StorageResult<Vec<String>>;

    async fn path_prefixes(&self) -> StorageResult<Vec<String>>;

    async fn add_agent_keyword(&self, keyword: &str) -> StorageResult<()>;

    async fn remove_agent_keyword(&self, keyword: &str) -> StorageResult<bool>;

    async fn add_path_prefix(&self, prefix: &str) -> StorageResult<()>;

    async fn remove_path_prefix(&self, prefix: &str) -> StorageResult<bool>;
}

/// Answers "should this request be tracked at all?".
///
/// Combines the externally managed exclusion lists with static prefixes
/// supplied by deployment configuration (media and admin asset roots).
pub struct ExclusionRegistry {
    source: Arc<dyn ExclusionSource>,
    static_prefixes: Vec<String>,
}

impl ExclusionRegistry {
    pub fn new(source: Arc<dyn ExclusionSource>, static_prefixes: Vec<String>) -> Self {
        Self {
            source,
            static_prefixes,
        }
    }

    /// Returns false when the user agent contains any excluded keyword
    /// (case-sensitive substring) or the path starts with any excluded
    /// prefix. Reads a fresh snapshot of the lists on every call.
    pub async fn should_track(&self, path: &str, user_agent: &str) -> StorageResult<bool> {
        for keyword in self.source.agent_keywords().await? {
            if user_agent.contains(keyword.as_str()) {
                return Ok(false);
            }
        }

        for prefix in self.source.path_prefixes().await? {
            if path.starts_with(prefix.as_str()) {
                return Ok(false);
            }
        }

        for prefix in &self.static_prefixes {
            if path.starts_with(prefix.as_str()) {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

pub struct SqliteExclusionSource {
    pool: Arc<SqlitePool>,
}

impl SqliteExclusionSource {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query("CREATE TABLE IF NOT EXISTS excluded_agents (keyword TEXT PRIMARY KEY)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query("CREATE TABLE IF NOT EXISTS excluded_prefixes (prefix TEXT PRIMARY KEY)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }
}

#[async_trait]
impl ExclusionSource for SqliteExclusionSource {
    async fn agent_keywords(&self) -> StorageResult<Vec<String>> {
        let keywords =
            sqlx::query_scalar::<_, String>("SELECT keyword FROM excluded_agents ORDER BY keyword")
                .fetch_all(self.pool.as_ref())
                .await?;
        Ok(keywords)
    }

    async fn path_prefixes(&self) -> StorageResult<Vec<String>> {
        let prefixes =
            sqlx::query_scalar::<_, String>("SELECT prefix FROM excluded_prefixes ORDER BY prefix")
                .fetch_all(self.pool.as_ref())
                .await?;
        Ok(prefixes)
    }

    async fn add_agent_keyword(&self, keyword: &str) -> StorageResult<()> {
        sqlx::query("INSERT INTO excluded_agents (keyword) VALUES (?) ON CONFLICT DO NOTHING")
            .bind(keyword)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn remove_agent_keyword(&self, keyword: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM excluded_agents WHERE keyword = ?")
            .bind(keyword)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_path_prefix(&self, prefix: &str) -> StorageResult<()> {
        sqlx::query("INSERT INTO excluded_prefixes (prefix) VALUES (?) ON CONFLICT DO NOTHING")
            .bind(prefix)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn remove_path_prefix(&self, prefix: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM excluded_prefixes WHERE prefix = ?")
            .bind(prefix)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
