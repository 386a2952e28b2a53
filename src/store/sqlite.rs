use std::time::Duration;

use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::{ArticleStore, StoreError, LOOKUP_CHUNK_SIZE};
use crate::models::{ExistingLink, ExploreSnapshot, NewArticle, NewSnapshot, StoredArticle};

const SELECT_ARTICLE: &str = r#"
    SELECT
        id, interest_id, title, link, source, time, image,
        datetime, article_type, sort_order, created_at
    FROM explore_news
"#;

#[derive(Debug, FromRow)]
struct SnapshotRow {
    id: i64,
    interest_id: String,
    topic_name: String,
    articles_count: Option<i64>,
    timeframe: Option<String>,
    total_articles: Option<i64>,
    articles_data: Option<String>,
    generated_at: Option<String>,
    created_at: String,
}

impl TryFrom<SnapshotRow> for ExploreSnapshot {
    type Error = StoreError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        let articles_data = row
            .articles_data
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| StoreError::Decode(format!("articles_data: {}", e)))?;

        Ok(Self {
            id: row.id,
            interest_id: row.interest_id,
            topic_name: row.topic_name,
            articles_count: row.articles_count,
            timeframe: row.timeframe,
            total_articles: row.total_articles,
            articles_data,
            generated_at: row.generated_at,
            created_at: row.created_at,
        })
    }
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let mut options = SqlitePoolOptions::new();
        // Every connection to `sqlite::memory:` opens its own database.
        if database_url.contains(":memory:") {
            options = options
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        } else {
            options = options.max_connections(5);
        }

        let pool = options.connect(database_url).await?;
        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS explore_news (
                id INTEGER PRIMARY KEY,
                interest_id TEXT NOT NULL,
                title TEXT NOT NULL,
                link TEXT NOT NULL,
                source TEXT NOT NULL,
                time TEXT,
                image TEXT,
                datetime TEXT NOT NULL,
                article_type TEXT NOT NULL DEFAULT 'regular',
                sort_order INTEGER NOT NULL,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(interest_id, link)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_explore_news_interest_sort
            ON explore_news(interest_id, sort_order)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS explore (
                id INTEGER PRIMARY KEY,
                interest_id TEXT NOT NULL,
                topic_name TEXT NOT NULL,
                articles_count INTEGER,
                timeframe TEXT,
                total_articles INTEGER,
                articles_data TEXT,
                generated_at TEXT,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ArticleStore for SqliteStore {
    async fn find_by_interest_and_links(
        &self,
        interest_id: &str,
        links: &[String],
    ) -> Result<Vec<ExistingLink>, StoreError> {
        let mut existing = Vec::new();

        for chunk in links.chunks(LOOKUP_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT link, title FROM explore_news WHERE interest_id = ");
            builder.push_bind(interest_id);
            builder.push(" AND link IN (");
            let mut separated = builder.separated(", ");
            for link in chunk {
                separated.push_bind(link.as_str());
            }
            separated.push_unseparated(")");

            let rows = builder
                .build_query_as::<ExistingLink>()
                .fetch_all(&self.pool)
                .await?;
            existing.extend(rows);
        }

        Ok(existing)
    }

    async fn max_sort_order(&self, interest_id: &str) -> Result<Option<i64>, StoreError> {
        let max: (Option<i64>,) =
            sqlx::query_as("SELECT MAX(sort_order) FROM explore_news WHERE interest_id = ?")
                .bind(interest_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(max.0)
    }

    async fn insert_batch(&self, records: &[NewArticle]) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut persisted = 0u64;

        for record in records {
            // Rows colliding on (interest_id, link) are skipped and not counted.
            let result = sqlx::query(
                r#"
                INSERT INTO explore_news
                    (interest_id, title, link, source, time, image, datetime, article_type, sort_order)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(interest_id, link) DO NOTHING
                "#,
            )
            .bind(&record.interest_id)
            .bind(&record.title)
            .bind(&record.link)
            .bind(&record.source)
            .bind(&record.time)
            .bind(&record.image)
            .bind(&record.datetime)
            .bind(&record.article_type)
            .bind(record.sort_order)
            .execute(&mut *tx)
            .await?;

            persisted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(persisted as usize)
    }

    async fn list_articles(
        &self,
        interest_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StoredArticle>, StoreError> {
        let query = format!(
            "{} WHERE interest_id = ? ORDER BY sort_order ASC, id ASC LIMIT ? OFFSET ?",
            SELECT_ARTICLE
        );
        let articles = sqlx::query_as::<_, StoredArticle>(&query)
            .bind(interest_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(articles)
    }

    async fn count_articles(&self, interest_id: &str) -> Result<i64, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM explore_news WHERE interest_id = ?")
            .bind(interest_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    async fn insert_snapshot(&self, snapshot: &NewSnapshot) -> Result<ExploreSnapshot, StoreError> {
        let articles_data = snapshot
            .articles_data
            .as_ref()
            .map(|data| data.to_string());

        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            INSERT INTO explore
                (interest_id, topic_name, articles_count, timeframe, total_articles,
                 articles_data, generated_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, COALESCE(?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now')))
            RETURNING
                id, interest_id, topic_name, articles_count, timeframe, total_articles,
                articles_data, generated_at, created_at
            "#,
        )
        .bind(&snapshot.interest_id)
        .bind(&snapshot.topic_name)
        .bind(snapshot.articles_count)
        .bind(&snapshot.timeframe)
        .bind(snapshot.total_articles)
        .bind(articles_data)
        .bind(&snapshot.generated_at)
        .bind(&snapshot.created_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }
}
