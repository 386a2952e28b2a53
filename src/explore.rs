use tracing::{error, info};

use crate::error::IngestError;
use crate::models::{ExploreSnapshot, NewSnapshot, SnapshotRequest};
use crate::store::ArticleStore;

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Saves a per-topic summary. Unlike article ingestion there is no
/// duplicate check; every call appends a new snapshot.
pub async fn save_snapshot(
    store: &dyn ArticleStore,
    request: SnapshotRequest,
) -> Result<ExploreSnapshot, IngestError> {
    let (interest_id, topic_name) =
        match (required(request.interest_id), required(request.topic_name)) {
            (Some(interest_id), Some(topic_name)) => (interest_id, topic_name),
            _ => {
                return Err(IngestError::validation(
                    "Missing required fields: interest_id and topic_name are required",
                ))
            }
        };

    info!(
        "Saving explore snapshot for topic {} ({}), {:?} articles, timeframe {:?}",
        topic_name, interest_id, request.articles_count, request.timeframe
    );

    let snapshot = NewSnapshot {
        interest_id,
        topic_name,
        articles_count: request.articles_count,
        timeframe: request.timeframe,
        total_articles: request.total_articles,
        articles_data: request.articles_data,
        generated_at: request.generated_at,
        created_at: request.created_at,
    };

    store.insert_snapshot(&snapshot).await.map_err(|source| {
        error!("Failed to save explore snapshot: {}", source);
        IngestError::StoreWrite {
            message: "Failed to save to database",
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_save_snapshot() {
        let store = MemoryStore::new();
        let request = SnapshotRequest {
            interest_id: Some("tech".to_string()),
            topic_name: Some("Technology".to_string()),
            articles_count: Some(5),
            timeframe: Some("7d".to_string()),
            articles_data: Some(serde_json::json!({"articles": []})),
            ..Default::default()
        };

        let saved = save_snapshot(&store, request).await.unwrap();

        assert_eq!(saved.interest_id, "tech");
        assert_eq!(saved.topic_name, "Technology");
        assert_eq!(saved.articles_count, Some(5));
        assert_eq!(saved.timeframe.as_deref(), Some("7d"));
        assert!(!saved.created_at.is_empty());
    }

    #[tokio::test]
    async fn test_requires_interest_and_topic() {
        let store = MemoryStore::new();

        for request in [
            SnapshotRequest {
                topic_name: Some("Technology".to_string()),
                ..Default::default()
            },
            SnapshotRequest {
                interest_id: Some("tech".to_string()),
                topic_name: Some(" ".to_string()),
                ..Default::default()
            },
        ] {
            let err = save_snapshot(&store, request).await.unwrap_err();
            assert!(err.is_validation());
            assert_eq!(
                err.to_string(),
                "Missing required fields: interest_id and topic_name are required"
            );
        }
    }
}
