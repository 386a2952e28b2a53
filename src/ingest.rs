//! Batch ingestion: validate, drop links already stored for the interest,
//! number the survivors after the partition's current maximum, append.

use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info};

use crate::error::IngestError;
use crate::models::{ArticleInput, NewArticle, DEFAULT_ARTICLE_TYPE};
use crate::store::{ArticleStore, StoreError};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IngestRequest {
    pub interest_id: Option<String>,
    pub topic_name: Option<String>,
    pub articles: Option<Vec<ArticleInput>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub success: bool,
    pub message: String,
    pub total_processed: usize,
    pub new_articles: usize,
    pub duplicates_found: usize,
    pub successfully_saved: usize,
    pub errors: Vec<String>,
    pub topic_name: Option<String>,
    pub interest_id: String,
}

/// An article that passed structural validation.
#[derive(Debug, Clone)]
struct Candidate {
    title: String,
    link: String,
    source: String,
    time: Option<String>,
    image: Option<String>,
    datetime: Option<String>,
    article_type: Option<String>,
}

/// Trimmed value, or `None` when absent or blank.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn validate(articles: &[ArticleInput]) -> Vec<Candidate> {
    articles
        .iter()
        .filter_map(|article| {
            present(&article.interest_id)?;
            Some(Candidate {
                title: present(&article.title)?.to_string(),
                link: present(&article.link)?.to_string(),
                source: present(&article.source)?.to_string(),
                time: present(&article.time).map(str::to_string),
                image: present(&article.image).map(str::to_string),
                datetime: present(&article.datetime).map(str::to_string),
                article_type: present(&article.article_type).map(str::to_string),
            })
        })
        .collect()
}

/// Distinct links in first-seen order.
fn distinct_links(candidates: &[Candidate]) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .filter(|c| seen.insert(c.link.as_str()))
        .map(|c| c.link.clone())
        .collect()
}

/// One async mutex per interest id.
///
/// Interest ids come from clients, so entries nobody holds or waits on are
/// pruned on every acquire. The map stays bounded by in-flight partitions.
#[derive(Default)]
struct PartitionLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl PartitionLocks {
    async fn acquire(&self, interest_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // A held guard or a waiter owns a second reference.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(interest_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Sort orders for `count` new records after `last_max`, or `None` when they
/// would not fit in an `i64`.
fn sort_order_range(last_max: Option<i64>, count: usize) -> Option<RangeInclusive<i64>> {
    let first = match last_max {
        Some(max) => max.checked_add(1)?,
        None => 0,
    };
    let span = i64::try_from(count.checked_sub(1)?).ok()?;
    Some(first..=first.checked_add(span)?)
}

pub struct IngestService {
    store: Arc<dyn ArticleStore>,
    locks: Option<PartitionLocks>,
}

impl IngestService {
    /// With `serialize_partitions` off, concurrent batches for one interest can
    /// read the same maximum sort order and write colliding values.
    pub fn new(store: Arc<dyn ArticleStore>, serialize_partitions: bool) -> Self {
        Self {
            store,
            locks: serialize_partitions.then(PartitionLocks::default),
        }
    }

    pub fn store(&self) -> &Arc<dyn ArticleStore> {
        &self.store
    }

    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestReport, IngestError> {
        let articles = request.articles.unwrap_or_default();
        if articles.is_empty() {
            return Err(IngestError::validation(
                "Missing required field: articles array is required",
            ));
        }

        let interest_id = present(&request.interest_id)
            .map(str::to_string)
            .ok_or_else(|| IngestError::validation("Missing required field: interest_id is required"))?;
        let topic_name = request.topic_name;

        info!(
            "Processing {} articles for topic {:?} with interest id {}",
            articles.len(),
            topic_name,
            interest_id
        );

        let candidates = validate(&articles);
        if candidates.is_empty() {
            return Err(IngestError::validation(
                "No valid articles found. Each article must have interest_id, title, link, and source",
            ));
        }
        info!(
            "{} valid articles out of {} submitted",
            candidates.len(),
            articles.len()
        );

        let links = distinct_links(&candidates);
        if links.is_empty() {
            return Err(IngestError::validation(
                "No valid article links found for duplicate checking",
            ));
        }

        let _partition = match &self.locks {
            Some(locks) => Some(locks.acquire(&interest_id).await),
            None => None,
        };

        let existing = self
            .store
            .find_by_interest_and_links(&interest_id, &links)
            .await
            .map_err(|source| {
                error!("Failed to query existing articles: {}", source);
                IngestError::StoreQuery {
                    message: "Failed to check for duplicates",
                    source,
                }
            })?;
        let existing: HashSet<String> = existing.into_iter().map(|e| e.link).collect();
        info!("Found {} existing articles for interest {}", existing.len(), interest_id);

        // Repeats inside the batch count as duplicates of their first occurrence.
        let mut seen = HashSet::new();
        let mut fresh = Vec::new();
        for candidate in candidates.iter() {
            if existing.contains(&candidate.link) || !seen.insert(candidate.link.as_str()) {
                debug!("Duplicate article: {} ({})", candidate.title, candidate.link);
                continue;
            }
            fresh.push(candidate);
        }

        let total_processed = candidates.len();
        let duplicates_found = total_processed - fresh.len();
        info!(
            "{} new articles to save ({} duplicates filtered out)",
            fresh.len(),
            duplicates_found
        );

        if fresh.is_empty() {
            return Ok(IngestReport {
                success: true,
                message: "All articles already exist in database".to_string(),
                total_processed,
                new_articles: 0,
                duplicates_found,
                successfully_saved: 0,
                errors: Vec::new(),
                topic_name,
                interest_id,
            });
        }

        let last_max = self
            .store
            .max_sort_order(&interest_id)
            .await
            .map_err(|source| {
                error!("Failed to read current sort order: {}", source);
                IngestError::StoreQuery {
                    message: "Failed to read current sort order",
                    source,
                }
            })?;
        let sort_orders = sort_order_range(last_max, fresh.len()).ok_or_else(|| {
            error!(
                "Sort order overflow for interest {}: {} articles after {:?}",
                interest_id,
                fresh.len(),
                last_max
            );
            IngestError::StoreQuery {
                message: "Failed to read current sort order",
                source: StoreError::Decode(format!(
                    "sort order {:?} leaves no room for {} articles",
                    last_max,
                    fresh.len()
                )),
            }
        })?;
        let next_sort_order = *sort_orders.start();

        let ingested_at = Utc::now().to_rfc3339();
        let records: Vec<NewArticle> = fresh
            .iter()
            .zip(sort_orders)
            .map(|(candidate, sort_order)| NewArticle {
                interest_id: interest_id.clone(),
                title: candidate.title.clone(),
                link: candidate.link.clone(),
                source: candidate.source.clone(),
                time: candidate.time.clone(),
                image: candidate.image.clone(),
                datetime: candidate
                    .datetime
                    .clone()
                    .unwrap_or_else(|| ingested_at.clone()),
                article_type: candidate
                    .article_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ARTICLE_TYPE.to_string()),
                sort_order,
            })
            .collect();

        let saved = self.store.insert_batch(&records).await.map_err(|source| {
            error!("Failed to insert articles: {}", source);
            IngestError::StoreWrite {
                message: "Failed to save articles to database",
                source,
            }
        })?;
        info!(
            "Saved {} articles for interest {} starting at sort order {}",
            saved,
            interest_id,
            next_sort_order
        );

        Ok(IngestReport {
            success: true,
            message: format!("Successfully processed {} articles", total_processed),
            total_processed,
            new_articles: records.len(),
            duplicates_found,
            successfully_saved: saved,
            errors: Vec::new(),
            topic_name,
            interest_id,
        })
    }
}
