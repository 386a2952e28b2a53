//! Integration tests for the news-ingest service
//!
//! These tests verify the full workflow from configuration loading
//! through ingestion against each store backend and the HTTP surface.

use std::io::Write;
use tempfile::NamedTempFile;

mod common {
    use news_ingest::ingest::IngestRequest;
    use news_ingest::models::ArticleInput;
    use tempfile::TempDir;

    /// Create a temporary directory for test databases
    pub fn create_temp_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp directory")
    }

    /// Create a test database path
    pub fn create_db_path(temp_dir: &TempDir) -> String {
        let db_path = temp_dir.path().join("test.db");
        format!("sqlite:{}?mode=rwc", db_path.display())
    }

    pub fn article(interest_id: &str, link: &str) -> ArticleInput {
        ArticleInput {
            interest_id: Some(interest_id.to_string()),
            title: Some(format!("Story {}", link)),
            link: Some(link.to_string()),
            source: Some("Newswire".to_string()),
            time: Some("1 hour ago".to_string()),
            ..Default::default()
        }
    }

    pub fn request(interest_id: &str, links: &[&str]) -> IngestRequest {
        IngestRequest {
            interest_id: Some(interest_id.to_string()),
            topic_name: Some("Technology".to_string()),
            articles: Some(links.iter().map(|l| article(interest_id, l)).collect()),
        }
    }
}

#[cfg(test)]
mod config_integration_tests {
    use super::*;
    use news_ingest::config::{Config, StoreConfig};

    #[test]
    fn test_load_shipped_config() {
        let config = Config::load("ingest.toml");
        assert!(config.is_ok(), "Failed to load ingest.toml: {:?}", config.err());

        let config = config.unwrap();
        assert!(matches!(config.store, StoreConfig::Sqlite { .. }));
        assert_eq!(config.interests.len(), 15);
        assert!(config.interests.iter().any(|i| i.name == "Technology"));
    }

    #[test]
    fn test_config_round_trip() {
        let toml_content = r#"
            bind_address = "127.0.0.1:4000"

            [store]
            backend = "rest"
            url = "https://project.example.co/rest/v1"
            api_key = "anon"
            articles_table = "news"

            [[interests]]
            name = "Travel"
            id = "f47bd5d0-2961-4bb6-9b0c-a5350a242676"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.bind_address, "127.0.0.1:4000");
        match config.store {
            StoreConfig::Rest(rest) => {
                assert_eq!(rest.articles_table, "news");
                assert_eq!(rest.snapshots_table, "explore");
            }
            other => panic!("expected rest store, got {:?}", other),
        }
        assert!(config.ingest.serialize_partitions);
        assert_eq!(config.interests[0].name, "Travel");
    }
}

#[cfg(test)]
mod database_integration_tests {
    use super::common::*;
    use news_ingest::ingest::IngestService;
    use news_ingest::store::{ArticleStore, SqliteStore};
    use std::sync::Arc;

    async fn open(db_url: &str) -> Arc<SqliteStore> {
        let store = SqliteStore::new(db_url).await.unwrap();
        store.initialize().await.unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_full_ingest_workflow() {
        let temp_dir = create_temp_dir();
        let store = open(&create_db_path(&temp_dir)).await;
        let service = IngestService::new(store.clone(), true);

        let first = service
            .ingest(request("tech", &["https://a.com", "https://b.com", "https://c.com"]))
            .await
            .unwrap();
        assert_eq!(first.successfully_saved, 3);

        let second = service
            .ingest(request("tech", &["https://c.com", "https://d.com"]))
            .await
            .unwrap();
        assert_eq!(second.new_articles, 1);
        assert_eq!(second.duplicates_found, 1);

        let articles = store.list_articles("tech", 10, 0).await.unwrap();
        let ordered: Vec<(&str, i64)> = articles
            .iter()
            .map(|a| (a.link.as_str(), a.sort_order))
            .collect();
        assert_eq!(
            ordered,
            vec![
                ("https://a.com", 0),
                ("https://b.com", 1),
                ("https://c.com", 2),
                ("https://d.com", 3),
            ]
        );
        assert_eq!(articles[0].time.as_deref(), Some("1 hour ago"));
        assert_eq!(articles[0].article_type, "regular");
    }

    #[tokio::test]
    async fn test_database_persistence() {
        let temp_dir = create_temp_dir();
        let db_url = create_db_path(&temp_dir);

        {
            let store = open(&db_url).await;
            IngestService::new(store, true)
                .ingest(request("tech", &["https://a.com", "https://b.com"]))
                .await
                .unwrap();
        }

        // Reopen and continue numbering from the stored maximum
        {
            let store = open(&db_url).await;
            let service = IngestService::new(store.clone(), true);

            let report = service
                .ingest(request("tech", &["https://a.com", "https://z.com"]))
                .await
                .unwrap();
            assert_eq!(report.duplicates_found, 1);

            let articles = store.list_articles("tech", 10, 0).await.unwrap();
            assert_eq!(articles.len(), 3);
            assert_eq!(articles[2].link, "https://z.com");
            assert_eq!(articles[2].sort_order, 2);
        }
    }

    #[tokio::test]
    async fn test_concurrent_batches_same_partition() {
        let temp_dir = create_temp_dir();
        let store = open(&create_db_path(&temp_dir)).await;
        let service = Arc::new(IngestService::new(store.clone(), true));

        let mut handles = Vec::new();
        for batch in 0..5 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                let links: Vec<String> = (0..4)
                    .map(|i| format!("https://batch{}-{}.com", batch, i))
                    .collect();
                let links: Vec<&str> = links.iter().map(String::as_str).collect();
                service.ingest(request("tech", &links)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let articles = store.list_articles("tech", 100, 0).await.unwrap();
        let mut orders: Vec<i64> = articles.iter().map(|a| a.sort_order).collect();
        orders.sort_unstable();
        assert_eq!(orders, (0..20).collect::<Vec<i64>>());
    }
}

#[cfg(test)]
mod rest_integration_tests {
    use super::common::*;
    use news_ingest::config::RestConfig;
    use news_ingest::error::IngestError;
    use news_ingest::ingest::IngestService;
    use news_ingest::store::RestStore;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rest_store(server: &MockServer) -> Arc<RestStore> {
        Arc::new(
            RestStore::new(&RestConfig {
                url: format!("{}/rest/v1", server.uri()),
                api_key: "anon".to_string(),
                articles_table: "explore_news".to_string(),
                snapshots_table: "explore".to_string(),
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_ingest_continues_remote_sort_order() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/explore_news"))
            .and(query_param("select", "link,title"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{"link": "https://old.com", "title": "Old"}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/explore_news"))
            .and(query_param("select", "sort_order"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"sort_order": 4}])))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/explore_news"))
            .and(body_partial_json(json!([
                {"link": "https://new1.com", "sort_order": 5, "interest_id": "tech"},
                {"link": "https://new2.com", "sort_order": 6, "interest_id": "tech"}
            ])))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([
                {
                    "id": 10, "interest_id": "tech", "title": "Story https://new1.com",
                    "link": "https://new1.com", "source": "Newswire", "time": "1 hour ago",
                    "image": null, "datetime": "2024-12-09T12:00:00Z", "article_type": "regular",
                    "sort_order": 5, "created_at": "2024-12-09T12:00:01Z"
                },
                {
                    "id": 11, "interest_id": "tech", "title": "Story https://new2.com",
                    "link": "https://new2.com", "source": "Newswire", "time": "1 hour ago",
                    "image": null, "datetime": "2024-12-09T12:00:00Z", "article_type": "regular",
                    "sort_order": 6, "created_at": "2024-12-09T12:00:01Z"
                }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let service = IngestService::new(rest_store(&server), true);
        let report = service
            .ingest(request("tech", &["https://old.com", "https://new1.com", "https://new2.com"]))
            .await
            .unwrap();

        assert_eq!(report.total_processed, 3);
        assert_eq!(report.new_articles, 2);
        assert_eq!(report.duplicates_found, 1);
        assert_eq!(report.successfully_saved, 2);
    }

    #[tokio::test]
    async fn test_remote_rows_with_uuid_keys_count_as_saved() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/explore_news"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([
                {"id": "0f8b6c1e-5d1a-4c4e-9a57-3b1f0c2d9e11", "link": "https://a.com"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let service = IngestService::new(rest_store(&server), true);
        let report = service
            .ingest(request("tech", &["https://a.com"]))
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(report.new_articles, 1);
        assert_eq!(report.successfully_saved, 1);
    }

    #[tokio::test]
    async fn test_remote_write_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(json!({"message": "duplicate key value violates unique constraint"})),
            )
            .mount(&server)
            .await;

        let service = IngestService::new(rest_store(&server), true);
        let err = service
            .ingest(request("tech", &["https://a.com"]))
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::StoreWrite { .. }));
        assert!(err
            .details()
            .unwrap()
            .contains("duplicate key value violates unique constraint"));
    }
}

#[cfg(test)]
mod end_to_end_tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use news_ingest::config::Config;
    use news_ingest::ingest::IngestService;
    use news_ingest::routes::{router, AppState};
    use news_ingest::store::MemoryStore;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_app() -> axum::Router {
        let config = Config::from_str("[store]\nbackend = \"memory\"").unwrap();
        let state = Arc::new(AppState {
            service: Arc::new(IngestService::new(
                Arc::new(MemoryStore::new()),
                config.ingest.serialize_partitions,
            )),
            interests: config.interests,
        });
        router(state)
    }

    async fn post(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_ingest_then_read_back() {
        let app = create_app();
        let body = json!({
            "interest_id": "ai",
            "topic_name": "AI",
            "articles": [
                {"interest_id": "ai", "title": "One", "link": "https://one.com", "source": "Wire", "articleType": "featured"},
                {"interest_id": "ai", "title": "Two", "link": "https://two.com", "source": "Wire"},
                {"interest_id": "ai", "title": "", "link": "https://bad.com", "source": "Wire"}
            ]
        });

        let (status, report) = post(app.clone(), "/api/articles", body.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["success"], true);
        assert_eq!(report["total_processed"], 2);
        assert_eq!(report["new_articles"], 2);
        assert_eq!(report["successfully_saved"], 2);
        assert_eq!(report["topic_name"], "AI");
        assert_eq!(report["errors"], json!([]));

        let (_, again) = post(app.clone(), "/api/articles", body).await;
        assert_eq!(again["new_articles"], 0);
        assert_eq!(again["duplicates_found"], 2);

        let response = app
            .oneshot(Request::builder().uri("/api/articles/ai").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let page: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(page["total"], 2);
        assert_eq!(page["articles"][0]["article_type"], "featured");
        assert_eq!(page["articles"][1]["sort_order"], 1);
    }

    #[tokio::test]
    async fn test_no_valid_articles_is_client_error() {
        let app = create_app();
        let (status, body) = post(
            app,
            "/api/articles",
            json!({
                "interest_id": "ai",
                "articles": [{"title": "No link", "source": "Wire", "interest_id": "ai"}]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("No valid articles found"));
    }
}
