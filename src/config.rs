use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub interests: Vec<Interest>,
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_database_url() -> String {
    "sqlite:news_ingest.db?mode=rwc".to_string()
}

fn default_articles_table() -> String {
    "explore_news".to_string()
}

fn default_snapshots_table() -> String {
    "explore".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    Sqlite {
        #[serde(default = "default_database_url")]
        database_url: String,
    },
    Rest(RestConfig),
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Sqlite {
            database_url: default_database_url(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RestConfig {
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_articles_table")]
    pub articles_table: String,
    #[serde(default = "default_snapshots_table")]
    pub snapshots_table: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Serialize ingestion per interest id so concurrent batches cannot
    /// read the same max sort order or miss each other's links.
    #[serde(default = "default_true")]
    pub serialize_partitions: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            serialize_partitions: true,
        }
    }
}

/// Topic label and the interest id its articles are stored under.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Interest {
    pub name: String,
    pub id: String,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Applies `BIND_ADDRESS`, `DATABASE_URL`, `STORE_URL` and `STORE_API_KEY`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("BIND_ADDRESS") {
            self.bind_address = addr;
        }

        match &mut self.store {
            StoreConfig::Sqlite { database_url } => {
                if let Some(url) = lookup("DATABASE_URL") {
                    *database_url = url;
                }
            }
            StoreConfig::Rest(rest) => {
                if let Some(url) = lookup("STORE_URL") {
                    rest.url = url;
                }
                if let Some(key) = lookup("STORE_API_KEY") {
                    rest.api_key = key;
                }
            }
            StoreConfig::Memory => {}
        }
    }
}
