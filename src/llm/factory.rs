use std::collections::HashMap;
use std::sync::Arc;

use secrecy::ExposeSecret;
use tokio::sync::Mutex;

use crate::config::LlmConfig;
use crate::error::LlmError;

use super::openai::OpenAiProvider;
use super::provider::LlmProvider;

/// Cache key mirrors the full tuple the original memoized an LLM client on:
/// provider, model, credentials, base url, temperature, timeout and retries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    provider: String,
    model: String,
    api_key: String,
    base_url: String,
    temperature_bits: u32,
    timeout_s: u64,
    max_retries: u32,
}

/// Lazily constructs and memoizes `LlmProvider` clients so repeated agent
/// runs against the same model reuse one underlying HTTP client instead of
/// building a new one per job.
pub struct LlmClientFactory {
    config: LlmConfig,
    cache: Mutex<HashMap<CacheKey, Arc<dyn LlmProvider>>>,
}

impl LlmClientFactory {
    pub fn new(config: LlmConfig) -> Self {
        Self { config, cache: Mutex::new(HashMap::new()) }
    }

    pub async fn client_for_model(&self, model: &str, temperature: f32) -> Result<Arc<dyn LlmProvider>, LlmError> {
        let key = CacheKey {
            provider: self.config.provider.clone(),
            model: model.to_string(),
            api_key: self.config.api_key.expose_secret().to_string(),
            base_url: self.config.base_url.clone(),
            temperature_bits: temperature.to_bits(),
            timeout_s: self.config.timeout_s,
            max_retries: self.config.max_retries,
        };

        let mut cache = self.cache.lock().await;
        if let Some(client) = cache.get(&key) {
            return Ok(Arc::clone(client));
        }

        let client: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(&self.config, model.to_string())?);
        cache.insert(key, Arc::clone(&client));
        Ok(client)
    }

    pub async fn content_client(&self, temperature: f32) -> Result<Arc<dyn LlmProvider>, LlmError> {
        let model = self.config.model_content.clone();
        self.client_for_model(&model, temperature).await
    }

    pub async fn code_client(&self, temperature: f32) -> Result<Arc<dyn LlmProvider>, LlmError> {
        let model = self.config.model_code.clone();
        self.client_for_model(&model, temperature).await
    }
}
