use std::time::Duration;

use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::config::SearchConfig;
use crate::error::SearchError;

use super::{SearchHit, SearchProvider};

/// SerpAPI adapter. Supported engines: google, bing, duckduckgo (per SerpAPI
/// docs); the free plan caps around 250 searches/month.
pub struct SerpApiProvider {
    client: reqwest::Client,
    api_key: secrecy::SecretString,
    engine: String,
}

impl SerpApiProvider {
    pub fn new(config: &SearchConfig, user_agent: &str, timeout_s: u64) -> Result<Self, SearchError> {
        if config.api_key.expose_secret().is_empty() {
            return Err(SearchError::NotConfigured);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_s))
            .user_agent(user_agent.to_string())
            .build()
            .map_err(|e| SearchError::Http(e.to_string()))?;

        Ok(Self { client, api_key: config.api_key.clone(), engine: config.engine.clone() })
    }
}

#[async_trait::async_trait]
impl SearchProvider for SerpApiProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let num = limit.clamp(1, 10);

        let response = self
            .client
            .get("https://serpapi.com/search.json")
            .query(&[
                ("engine", self.engine.as_str()),
                ("q", query),
                ("api_key", self.api_key.expose_secret()),
                ("num", &num.to_string()),
            ])
            .send()
            .await
            .map_err(|e| SearchError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SearchError::Http(format!("HTTP {}", response.status())));
        }

        let body: SerpApiResponse =
            response.json().await.map_err(|e| SearchError::Http(e.to_string()))?;

        let mut hits = Vec::new();
        for item in body.organic_results.unwrap_or_default() {
            let title = item.title.or(item.name).unwrap_or_default();
            let url = item.link.or(item.url).unwrap_or_default();
            if !title.is_empty() && !url.is_empty() {
                hits.push(SearchHit { title: title.chars().take(240).collect(), url });
            }
            if hits.len() >= limit {
                break;
            }
        }
        Ok(hits)
    }
}

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    organic_results: Option<Vec<OrganicResult>>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    title: Option<String>,
    name: Option<String>,
    link: Option<String>,
    url: Option<String>,
}
