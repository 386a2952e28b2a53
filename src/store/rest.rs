use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use super::{ArticleStore, StoreError, LOOKUP_CHUNK_SIZE};
use crate::config::RestConfig;
use crate::models::{ExistingLink, ExploreSnapshot, NewArticle, NewSnapshot, StoredArticle};

#[derive(Deserialize)]
struct SortOrderRow {
    sort_order: i64,
}

/// Store backed by a hosted PostgREST endpoint, e.g. `https://<project>/rest/v1`.
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
    articles_table: String,
    snapshots_table: String,
}

impl RestStore {
    pub fn new(config: &RestConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("NewsIngest/1.0")
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            articles_table: config.articles_table.clone(),
            snapshots_table: config.snapshots_table.clone(),
        })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.base_url, table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, StoreError> {
        let response = Self::check_status(request.send().await?).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn check_status(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            message: Self::error_message(&body),
        })
    }

    /// PostgREST errors are JSON objects with a `message` field.
    pub fn error_message(body: &str) -> String {
        let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
        if let Some(message) = parsed
            .as_ref()
            .and_then(|v| v.get("message"))
            .and_then(|m| m.as_str())
        {
            return message.to_string();
        }

        let body = body.trim();
        if body.is_empty() {
            "empty response body".to_string()
        } else {
            body.to_string()
        }
    }

    /// Builds an `in.(...)` filter, quoting each value so commas and
    /// parentheses inside URLs survive.
    pub fn in_filter(values: &[String]) -> String {
        let quoted: Vec<String> = values
            .iter()
            .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
            .collect();
        format!("in.({})", quoted.join(","))
    }

    /// Total from a `Content-Range` header such as `0-24/3573` or `*/0`.
    pub fn parse_content_range_total(value: &str) -> Option<i64> {
        value.rsplit('/').next()?.trim().parse().ok()
    }
}

#[async_trait]
impl ArticleStore for RestStore {
    async fn find_by_interest_and_links(
        &self,
        interest_id: &str,
        links: &[String],
    ) -> Result<Vec<ExistingLink>, StoreError> {
        let mut existing = Vec::new();
        let interest_filter = format!("eq.{}", interest_id);

        for chunk in links.chunks(LOOKUP_CHUNK_SIZE) {
            let request = self.request(Method::GET, &self.articles_table).query(&[
                ("select", "link,title"),
                ("interest_id", interest_filter.as_str()),
                ("link", Self::in_filter(chunk).as_str()),
            ]);
            let rows: Vec<ExistingLink> = Self::send_json(request).await?;
            existing.extend(rows);
        }

        debug!("{} existing links for interest {}", existing.len(), interest_id);
        Ok(existing)
    }

    async fn max_sort_order(&self, interest_id: &str) -> Result<Option<i64>, StoreError> {
        let interest_filter = format!("eq.{}", interest_id);
        let request = self.request(Method::GET, &self.articles_table).query(&[
            ("select", "sort_order"),
            ("interest_id", interest_filter.as_str()),
            ("order", "sort_order.desc"),
            ("limit", "1"),
        ]);
        let rows: Vec<SortOrderRow> = Self::send_json(request).await?;
        Ok(rows.first().map(|row| row.sort_order))
    }

    /// Returned rows are only counted. The hosted table may carry columns
    /// (uuid keys, nullable defaults) that [`StoredArticle`] does not model.
    async fn insert_batch(&self, records: &[NewArticle]) -> Result<usize, StoreError> {
        let request = self
            .request(Method::POST, &self.articles_table)
            .header("Prefer", "return=representation")
            .json(records);
        let rows: Vec<serde_json::Value> = Self::send_json(request).await?;
        Ok(rows.len())
    }

    async fn list_articles(
        &self,
        interest_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StoredArticle>, StoreError> {
        let interest_filter = format!("eq.{}", interest_id);
        let limit = limit.to_string();
        let offset = offset.to_string();
        let request = self.request(Method::GET, &self.articles_table).query(&[
            ("select", "*"),
            ("interest_id", interest_filter.as_str()),
            ("order", "sort_order.asc,id.asc"),
            ("limit", limit.as_str()),
            ("offset", offset.as_str()),
        ]);
        Self::send_json(request).await
    }

    async fn count_articles(&self, interest_id: &str) -> Result<i64, StoreError> {
        let interest_filter = format!("eq.{}", interest_id);
        let request = self
            .request(Method::HEAD, &self.articles_table)
            .header("Prefer", "count=exact")
            .query(&[("interest_id", interest_filter.as_str())]);

        let response = Self::check_status(request.send().await?).await?;
        let range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| StoreError::Decode("missing Content-Range header".to_string()))?;

        Self::parse_content_range_total(range)
            .ok_or_else(|| StoreError::Decode(format!("invalid Content-Range: {}", range)))
    }

    async fn insert_snapshot(&self, snapshot: &NewSnapshot) -> Result<ExploreSnapshot, StoreError> {
        let request = self
            .request(Method::POST, &self.snapshots_table)
            .header("Prefer", "return=representation")
            .json(&[snapshot]);
        let rows: Vec<ExploreSnapshot> = Self::send_json(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no rows".to_string()))
    }
}
