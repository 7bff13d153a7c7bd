use crate::models::Visitor;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage operation timed out")]
    Timeout,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => StorageError::Timeout,
            other => StorageError::Other(other.into()),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistent keyed storage of visitor records.
///
/// The store is the sole shared mutable resource of the tracking pipeline;
/// every method must be safe under concurrent access from multiple requests.
#[async_trait]
pub trait VisitorStore: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> anyhow::Result<()>;

    /// Look up a visitor by its uniqueness key
    async fn find_by_session_and_ip(
        &self,
        session_key: &str,
        ip_address: &str,
    ) -> StorageResult<Option<Visitor>>;

    /// Most-recently-updated visitor with this IP and user agent whose
    /// `last_update` is at or after `since`, if any
    async fn find_recent_by_ip_and_agent(
        &self,
        ip_address: &str,
        user_agent: &str,
        since: i64,
    ) -> StorageResult<Option<Visitor>>;

    /// Upsert a visitor record, returning its row id
    async fn save(&self, visitor: &Visitor) -> StorageResult<i64>;

    /// Bulk-delete records with `last_update <= cutoff`, returning the
    /// number removed
    async fn delete_older_than(&self, cutoff: i64) -> StorageResult<u64>;

    /// Visitors with `last_update >= since`, most recent first
    async fn find_active_since(&self, since: i64) -> StorageResult<Vec<Visitor>>;
}
