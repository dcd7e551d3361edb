//! Web search used by the Content agent to gather candidate sources.

mod serpapi;

pub use serpapi::SerpApiProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError>;
}
