use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{ArticleStore, StoreError};
use crate::models::{ExistingLink, ExploreSnapshot, NewArticle, NewSnapshot, StoredArticle};

#[derive(Default)]
struct MemoryState {
    articles: Vec<StoredArticle>,
    snapshots: Vec<ExploreSnapshot>,
    next_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process store. Applies the same `(interest_id, link)` uniqueness as the
/// SQLite schema.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn find_by_interest_and_links(
        &self,
        interest_id: &str,
        links: &[String],
    ) -> Result<Vec<ExistingLink>, StoreError> {
        let wanted: HashSet<&str> = links.iter().map(String::as_str).collect();
        let state = self.state.read().await;
        Ok(state
            .articles
            .iter()
            .filter(|a| a.interest_id == interest_id && wanted.contains(a.link.as_str()))
            .map(|a| ExistingLink {
                link: a.link.clone(),
                title: a.title.clone(),
            })
            .collect())
    }

    async fn max_sort_order(&self, interest_id: &str) -> Result<Option<i64>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .articles
            .iter()
            .filter(|a| a.interest_id == interest_id)
            .map(|a| a.sort_order)
            .max())
    }

    async fn insert_batch(&self, records: &[NewArticle]) -> Result<usize, StoreError> {
        let mut state = self.state.write().await;
        let created_at = Utc::now().to_rfc3339();
        let mut persisted = 0;

        for record in records {
            let exists = state
                .articles
                .iter()
                .any(|a| a.interest_id == record.interest_id && a.link == record.link);
            if exists {
                continue;
            }

            let article = StoredArticle {
                id: state.next_id(),
                interest_id: record.interest_id.clone(),
                title: record.title.clone(),
                link: record.link.clone(),
                source: record.source.clone(),
                time: record.time.clone(),
                image: record.image.clone(),
                datetime: record.datetime.clone(),
                article_type: record.article_type.clone(),
                sort_order: record.sort_order,
                created_at: created_at.clone(),
            };
            state.articles.push(article);
            persisted += 1;
        }

        Ok(persisted)
    }

    async fn list_articles(
        &self,
        interest_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StoredArticle>, StoreError> {
        let state = self.state.read().await;
        let mut articles: Vec<StoredArticle> = state
            .articles
            .iter()
            .filter(|a| a.interest_id == interest_id)
            .cloned()
            .collect();
        articles.sort_by_key(|a| (a.sort_order, a.id));

        Ok(articles
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_articles(&self, interest_id: &str) -> Result<i64, StoreError> {
        let state = self.state.read().await;
        let count = state
            .articles
            .iter()
            .filter(|a| a.interest_id == interest_id)
            .count();
        Ok(count as i64)
    }

    async fn insert_snapshot(&self, snapshot: &NewSnapshot) -> Result<ExploreSnapshot, StoreError> {
        let mut state = self.state.write().await;
        let saved = ExploreSnapshot {
            id: state.next_id(),
            interest_id: snapshot.interest_id.clone(),
            topic_name: snapshot.topic_name.clone(),
            articles_count: snapshot.articles_count,
            timeframe: snapshot.timeframe.clone(),
            total_articles: snapshot.total_articles,
            articles_data: snapshot.articles_data.clone(),
            generated_at: snapshot.generated_at.clone(),
            created_at: snapshot
                .created_at
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339()),
        };
        state.snapshots.push(saved.clone());
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_article(interest_id: &str, link: &str, sort_order: i64) -> NewArticle {
        NewArticle {
            interest_id: interest_id.to_string(),
            title: "Title".to_string(),
            link: link.to_string(),
            source: "Wire".to_string(),
            time: None,
            image: None,
            datetime: "2024-12-09T12:00:00+00:00".to_string(),
            article_type: "regular".to_string(),
            sort_order,
        }
    }

    #[tokio::test]
    async fn test_insert_skips_existing_link() {
        let store = MemoryStore::new();
        store.insert_batch(&[new_article("tech", "https://a.com", 0)]).await.unwrap();

        let persisted = store
            .insert_batch(&[
                new_article("tech", "https://a.com", 1),
                new_article("sports", "https://a.com", 0),
            ])
            .await
            .unwrap();

        assert_eq!(persisted, 1);
        assert_eq!(store.max_sort_order("tech").await.unwrap(), Some(0));
        assert_eq!(store.count_articles("sports").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_sorted_and_paged() {
        let store = MemoryStore::new();
        store
            .insert_batch(&[
                new_article("tech", "https://c.com", 2),
                new_article("tech", "https://a.com", 0),
                new_article("tech", "https://b.com", 1),
            ])
            .await
            .unwrap();

        let page = store.list_articles("tech", 2, 1).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].link, "https://b.com");
        assert_eq!(page[1].link, "https://c.com");
        assert_eq!(store.count_articles("tech").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_max_sort_order() {
        let store = MemoryStore::new();
        assert_eq!(store.max_sort_order("tech").await.unwrap(), None);

        store
            .insert_batch(&[new_article("tech", "https://a.com", 4)])
            .await
            .unwrap();
        assert_eq!(store.max_sort_order("tech").await.unwrap(), Some(4));
        assert_eq!(store.max_sort_order("sports").await.unwrap(), None);
    }
}
