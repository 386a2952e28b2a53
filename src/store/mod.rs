//! Storage backends for ingested articles and explore snapshots.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ExistingLink, ExploreSnapshot, NewArticle, NewSnapshot, StoredArticle};

pub mod memory;
pub mod rest;
pub mod sqlite;

pub use memory::MemoryStore;
pub use rest::RestStore;
pub use sqlite::SqliteStore;

/// Links per existence lookup. Keeps SQLite bind counts and REST query strings bounded.
pub const LOOKUP_CHUNK_SIZE: usize = 200;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store responded with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected store response: {0}")]
    Decode(String),
}

/// The keyed-record store articles are partitioned into by interest id.
///
/// Implementations only persist and query. Validation, duplicate filtering
/// and sort-order assignment live in [`crate::ingest::IngestService`].
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Stored records in `interest_id` whose link is one of `links`.
    async fn find_by_interest_and_links(
        &self,
        interest_id: &str,
        links: &[String],
    ) -> Result<Vec<ExistingLink>, StoreError>;

    /// Highest `sort_order` in the partition, or `None` when it is empty.
    async fn max_sort_order(&self, interest_id: &str) -> Result<Option<i64>, StoreError>;

    /// Appends `records` in one call and returns how many were persisted.
    async fn insert_batch(&self, records: &[NewArticle]) -> Result<usize, StoreError>;

    /// A page of the partition in display order.
    async fn list_articles(
        &self,
        interest_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StoredArticle>, StoreError>;

    async fn count_articles(&self, interest_id: &str) -> Result<i64, StoreError>;

    async fn insert_snapshot(&self, snapshot: &NewSnapshot) -> Result<ExploreSnapshot, StoreError>;
}
