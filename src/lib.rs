//! News Ingest - article ingestion service
//!
//! Accepts batches of news articles per topic, filters out entries that are
//! incomplete or whose link is already stored for that topic, and appends the
//! rest in display order to a SQLite, hosted REST, or in-memory store.

pub mod config;
pub mod error;
pub mod explore;
pub mod ingest;
pub mod models;
pub mod routes;
pub mod store;
