use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const DEFAULT_ARTICLE_TYPE: &str = "regular";

/// An article as submitted by a client. Every field is optional so that
/// incomplete entries can be filtered out instead of failing the whole batch.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ArticleInput {
    pub interest_id: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub source: Option<String>,
    pub time: Option<String>,
    pub image: Option<String>,
    pub datetime: Option<String>,
    #[serde(alias = "articleType")]
    pub article_type: Option<String>,
}

/// A validated article with its assigned position, ready to be written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewArticle {
    pub interest_id: String,
    pub title: String,
    pub link: String,
    pub source: String,
    pub time: Option<String>,
    pub image: Option<String>,
    pub datetime: String,
    pub article_type: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct StoredArticle {
    pub id: i64,
    pub interest_id: String,
    pub title: String,
    pub link: String,
    pub source: String,
    pub time: Option<String>,
    pub image: Option<String>,
    pub datetime: String,
    pub article_type: String,
    pub sort_order: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, FromRow, Deserialize)]
pub struct ExistingLink {
    pub link: String,
    pub title: String,
}

/// Per-topic summary record saved alongside the article feed.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SnapshotRequest {
    pub interest_id: Option<String>,
    pub topic_name: Option<String>,
    pub articles_count: Option<i64>,
    pub timeframe: Option<String>,
    pub total_articles: Option<i64>,
    pub articles_data: Option<serde_json::Value>,
    pub generated_at: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSnapshot {
    pub interest_id: String,
    pub topic_name: String,
    pub articles_count: Option<i64>,
    pub timeframe: Option<String>,
    pub total_articles: Option<i64>,
    pub articles_data: Option<serde_json::Value>,
    pub generated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExploreSnapshot {
    pub id: i64,
    pub interest_id: String,
    pub topic_name: String,
    pub articles_count: Option<i64>,
    pub timeframe: Option<String>,
    pub total_articles: Option<i64>,
    pub articles_data: Option<serde_json::Value>,
    pub generated_at: Option<String>,
    pub created_at: String,
}
