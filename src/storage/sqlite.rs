use crate::models::Visitor;
use crate::storage::{StorageResult, VisitorStore};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

const VISITOR_COLUMNS: &str = "id, session_key, ip_address, user_agent, user_id, url, \
                               referrer, page_views, session_start, last_update";

pub struct SqliteVisitorStore {
    pool: Arc<SqlitePool>,
}

impl SqliteVisitorStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        // Bounded acquire timeout so no store call can block a request
        // indefinitely when the pool is saturated.
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Shared connection pool, reused by the registry tables.
    pub fn pool(&self) -> Arc<SqlitePool> {
        Arc::clone(&self.pool)
    }
}

#[async_trait]
impl VisitorStore for SqliteVisitorStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visitors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_key TEXT NOT NULL,
                ip_address TEXT NOT NULL,
                user_agent TEXT NOT NULL DEFAULT '',
                user_id TEXT,
                url TEXT NOT NULL DEFAULT '',
                referrer TEXT,
                page_views INTEGER NOT NULL DEFAULT 0,
                session_start INTEGER NOT NULL DEFAULT 0,
                last_update INTEGER,
                UNIQUE (session_key, ip_address)
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_visitors_last_update ON visitors(last_update)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_visitors_ip_agent ON visitors(ip_address, user_agent)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn find_by_session_and_ip(
        &self,
        session_key: &str,
        ip_address: &str,
    ) -> StorageResult<Option<Visitor>> {
        let visitor = sqlx::query_as::<_, Visitor>(&format!(
            r#"
            SELECT {VISITOR_COLUMNS}
            FROM visitors
            WHERE session_key = ? AND ip_address = ?
            "#,
        ))
        .bind(session_key)
        .bind(ip_address)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(visitor)
    }

    async fn find_recent_by_ip_and_agent(
        &self,
        ip_address: &str,
        user_agent: &str,
        since: i64,
    ) -> StorageResult<Option<Visitor>> {
        let visitor = sqlx::query_as::<_, Visitor>(&format!(
            r#"
            SELECT {VISITOR_COLUMNS}
            FROM visitors
            WHERE ip_address = ? AND user_agent = ? AND last_update >= ?
            ORDER BY last_update DESC
            LIMIT 1
            "#,
        ))
        .bind(ip_address)
        .bind(user_agent)
        .bind(since)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(visitor)
    }

    async fn save(&self, visitor: &Visitor) -> StorageResult<i64> {
        if let Some(id) = visitor.id {
            // Already persisted: update in place. This is also the path that
            // rewrites session_key after a fuzzy-match adoption, keeping the
            // same row instead of growing a duplicate.
            sqlx::query(
                r#"
                UPDATE visitors
                SET session_key = ?, ip_address = ?, user_agent = ?, user_id = ?,
                    url = ?, referrer = ?, page_views = ?, session_start = ?,
                    last_update = ?
                WHERE id = ?
                "#,
            )
            .bind(&visitor.session_key)
            .bind(&visitor.ip_address)
            .bind(&visitor.user_agent)
            .bind(&visitor.user_id)
            .bind(&visitor.url)
            .bind(&visitor.referrer)
            .bind(visitor.page_views)
            .bind(visitor.session_start)
            .bind(visitor.last_update)
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

            return Ok(id);
        }

        // First contact: conditional insert with a conflict target on the
        // uniqueness key. Two concurrent requests that both resolved to "new"
        // converge on a single row; the loser folds its page view into the
        // winner and last_update stays monotonic.
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO visitors
                (session_key, ip_address, user_agent, user_id, url, referrer,
                 page_views, session_start, last_update)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (session_key, ip_address) DO UPDATE SET
                user_agent = excluded.user_agent,
                user_id = excluded.user_id,
                url = excluded.url,
                page_views = visitors.page_views + excluded.page_views,
                last_update = MAX(COALESCE(visitors.last_update, 0), excluded.last_update)
            RETURNING id
            "#,
        )
        .bind(&visitor.session_key)
        .bind(&visitor.ip_address)
        .bind(&visitor.user_agent)
        .bind(&visitor.user_id)
        .bind(&visitor.url)
        .bind(&visitor.referrer)
        .bind(visitor.page_views)
        .bind(visitor.session_start)
        .bind(visitor.last_update)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(id)
    }

    async fn delete_older_than(&self, cutoff: i64) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM visitors WHERE last_update <= ?")
            .bind(cutoff)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }

    async fn find_active_since(&self, since: i64) -> StorageResult<Vec<Visitor>> {
        let visitors = sqlx::query_as::<_, Visitor>(&format!(
            r#"
            SELECT {VISITOR_COLUMNS}
            FROM visitors
            WHERE last_update >= ?
            ORDER BY last_update DESC
            "#,
        ))
        .bind(since)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(visitors)
    }
}
