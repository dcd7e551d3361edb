use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AgentError;
use crate::llm::{ChatMessage, CompletionRequest, LlmClientFactory, Role};
use crate::web::WebClient;

use super::{Agent, AgentOutput, ProgressCb, Source};

const MIN_SOURCES: usize = 2;
const SEARCH_LIMIT: usize = 5;
const MIN_ANSWER_CHARS: usize = 10;
const MIN_SOURCE_TITLE_CHARS: usize = 2;
const TEMPERATURE: f32 = 0.35;

const PROMPT_PREAMBLE_HEADER: &str = "You write a short, sourced answer using only the links below. \
Return JSON strictly matching this schema: \
{\"answer\": string, \"sources\": [{\"title\": string, \"url\": string}]}. \
Cite only URLs that appear in the provided sources. Respond with JSON only, no markdown fences.\n\nSources:\n";

#[derive(Debug, serde::Deserialize)]
struct RawContentOutput {
    answer: String,
    sources: Vec<Source>,
}

/// Produces a sourced answer backed by at least two gathered web sources,
/// then enforces that the model only cited URLs it was actually given.
pub struct ContentAgent {
    llm: Arc<LlmClientFactory>,
    web: Arc<WebClient>,
}

impl ContentAgent {
    pub fn new(llm: Arc<LlmClientFactory>, web: Arc<WebClient>) -> Self {
        Self { llm, web }
    }

    async fn gather_sources(&self, query: &str) -> Result<Vec<Source>, AgentError> {
        let hits = self.web.search(query, SEARCH_LIMIT).await?;
        let mut sources = Vec::new();
        for hit in hits {
            let Ok(page) = self.web.fetch(&hit.url).await else { continue };
            sources.push(Source { title: page.title, url: page.url });
            if sources.len() >= MIN_SOURCES {
                break;
            }
        }
        Ok(sources)
    }
}

#[async_trait]
impl Agent for ContentAgent {
    async fn run(
        &self,
        task: &str,
        _job_id: Uuid,
        _request_id: &str,
        progress_cb: ProgressCb<'_>,
    ) -> Result<AgentOutput, AgentError> {
        progress_cb(0.20);

        let sources = self.gather_sources(task).await?;
        if sources.len() < MIN_SOURCES {
            return Err(AgentError::InsufficientSources);
        }

        let sources_block: String =
            sources.iter().map(|s| format!("- {} — {}\n", s.title, s.url)).collect();

        let client = self.llm.content_client(TEMPERATURE).await?;
        let request = CompletionRequest {
            messages: vec![ChatMessage {
                role: Role::User,
                content: format!("{PROMPT_PREAMBLE_HEADER}{sources_block}\nTask:\n{task}"),
            }],
            temperature: TEMPERATURE,
        };

        progress_cb(0.80);
        let response = client.complete(request).await?;

        let raw: RawContentOutput = serde_json::from_str(response.content.trim())
            .map_err(|e| crate::error::LlmError::InvalidOutput { reason: e.to_string() })?;

        if raw.answer.trim().chars().count() < MIN_ANSWER_CHARS {
            return Err(crate::error::LlmError::InvalidOutput {
                reason: format!("answer is shorter than {MIN_ANSWER_CHARS} characters"),
            }
            .into());
        }

        let allowed: HashSet<&str> = sources.iter().map(|s| s.url.as_str()).collect();
        let filtered: Vec<Source> = raw
            .sources
            .into_iter()
            .filter(|s| allowed.contains(s.url.as_str()) && s.title.trim().chars().count() >= MIN_SOURCE_TITLE_CHARS)
            .collect();

        if filtered.len() < MIN_SOURCES {
            return Err(AgentError::ModelOutputSourcesNotInWhitelist);
        }

        progress_cb(0.90);
        Ok(AgentOutput::Content { answer: raw.answer, sources: filtered })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_filtering_keeps_only_urls_in_the_gathered_set() {
        let gathered =
            vec![Source { title: "A".into(), url: "https://a.example".into() }, Source { title: "B".into(), url: "https://b.example".into() }];
        let allowed: HashSet<&str> = gathered.iter().map(|s| s.url.as_str()).collect();

        let model_sources = vec![
            Source { title: "A".into(), url: "https://a.example".into() },
            Source { title: "Fabricated".into(), url: "https://not-given.example".into() },
        ];
        let filtered: Vec<Source> =
            model_sources.into_iter().filter(|s| allowed.contains(s.url.as_str())).collect();

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].url, "https://a.example");
    }

    #[test]
    fn source_filtering_also_drops_sources_with_too_short_a_title() {
        let gathered = vec![Source { title: "A".into(), url: "https://a.example".into() }];
        let allowed: HashSet<&str> = gathered.iter().map(|s| s.url.as_str()).collect();

        let model_sources = vec![Source { title: "x".into(), url: "https://a.example".into() }];
        let filtered: Vec<Source> = model_sources
            .into_iter()
            .filter(|s| allowed.contains(s.url.as_str()) && s.title.trim().chars().count() >= MIN_SOURCE_TITLE_CHARS)
            .collect();

        assert!(filtered.is_empty(), "a 1-char title is below the minimum and must be dropped");
    }
}
