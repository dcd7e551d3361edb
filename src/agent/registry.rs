use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::UnknownAgentKind;
use crate::job::AgentKind;
use crate::llm::LlmClientFactory;
use crate::web::WebClient;

use super::{Agent, CodeAgent, ContentAgent};

/// Lazily constructs and memoizes the singleton Code/Content agents. Each
/// agent is built once, on first use, and shared across every job that
/// routes to it afterward.
pub struct AgentRegistry {
    llm: Arc<LlmClientFactory>,
    web: Arc<WebClient>,
    code: Mutex<Option<Arc<dyn Agent>>>,
    content: Mutex<Option<Arc<dyn Agent>>>,
}

impl AgentRegistry {
    pub fn new(llm: Arc<LlmClientFactory>, web: Arc<WebClient>) -> Self {
        Self { llm, web, code: Mutex::new(None), content: Mutex::new(None) }
    }

    pub async fn get(&self, kind: AgentKind) -> Result<Arc<dyn Agent>, UnknownAgentKind> {
        match kind {
            AgentKind::Code => {
                let mut slot = self.code.lock().await;
                if let Some(agent) = slot.as_ref() {
                    return Ok(Arc::clone(agent));
                }
                let agent: Arc<dyn Agent> = Arc::new(CodeAgent::new(Arc::clone(&self.llm)));
                *slot = Some(Arc::clone(&agent));
                Ok(agent)
            }
            AgentKind::Content => {
                let mut slot = self.content.lock().await;
                if let Some(agent) = slot.as_ref() {
                    return Ok(Arc::clone(agent));
                }
                let agent: Arc<dyn Agent> =
                    Arc::new(ContentAgent::new(Arc::clone(&self.llm), Arc::clone(&self.web)));
                *slot = Some(Arc::clone(&agent));
                Ok(agent)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::config::WebConfig;

    fn test_llm_factory() -> Arc<LlmClientFactory> {
        Arc::new(LlmClientFactory::new(LlmConfig {
            provider: "openai".into(),
            model_content: "gpt-4o-mini".into(),
            model_code: "gpt-4o-mini".into(),
            timeout_s: 30,
            max_retries: 0,
            api_key: secrecy::SecretString::from("test-key".to_string()),
            base_url: "https://api.openai.com/v1".into(),
        }))
    }

    fn test_web_client() -> Arc<WebClient> {
        Arc::new(WebClient::new(
            &WebConfig { user_agent: "test".into(), timeout_s: 5, whitelist: vec![] },
            None,
        ))
    }

    #[tokio::test]
    async fn get_returns_the_same_instance_on_repeated_calls() {
        let registry = AgentRegistry::new(test_llm_factory(), test_web_client());
        let a = registry.get(AgentKind::Code).await.unwrap();
        let b = registry.get(AgentKind::Code).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn code_and_content_are_independent_singletons() {
        let registry = AgentRegistry::new(test_llm_factory(), test_web_client());
        let code = registry.get(AgentKind::Code).await.unwrap();
        let content = registry.get(AgentKind::Content).await.unwrap();
        assert!(!Arc::ptr_eq(&code, &content));
    }
}
