use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use news_ingest::config::{Config, StoreConfig};
use news_ingest::ingest::IngestService;
use news_ingest::routes::{self, AppState};
use news_ingest::store::{ArticleStore, MemoryStore, RestStore, SqliteStore};

async fn open_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn ArticleStore>> {
    let store: Arc<dyn ArticleStore> = match config {
        StoreConfig::Sqlite { database_url } => {
            let store = SqliteStore::new(database_url).await?;
            store.initialize().await?;
            info!("Using SQLite store at {}", database_url);
            Arc::new(store)
        }
        StoreConfig::Rest(rest) => {
            info!("Using REST store at {}", rest.url);
            Arc::new(RestStore::new(rest)?)
        }
        StoreConfig::Memory => {
            info!("Using in-memory store; articles are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "news_ingest=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var("INGEST_CONFIG").unwrap_or_else(|_| "ingest.toml".to_string());
    let mut config = Config::load(&config_path)?;
    config.apply_env_overrides();
    info!(
        "Loaded configuration from {} ({} interests)",
        config_path,
        config.interests.len()
    );

    let store = open_store(&config.store).await?;
    let service = Arc::new(IngestService::new(
        store,
        config.ingest.serialize_partitions,
    ));

    let state = Arc::new(AppState {
        service,
        interests: config.interests.clone(),
    });
    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Server starting on http://{}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
