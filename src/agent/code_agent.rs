use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AgentError;
use crate::llm::{ChatMessage, CompletionRequest, LlmClientFactory, Role};

use super::{Agent, AgentOutput, ProgressCb};

const PROMPT_PREAMBLE: &str = r#"You generate minimal, side-effect-free code snippets.

Return JSON strictly matching this schema:
{"language": string, "code": string, "explanation": string}

Constraints:
- Single programming language (fill `language`).
- Keep `explanation` short and optional.
- Do not include comments that simulate execution results.
- Respond with JSON only, no markdown fences.

Task:
"#;

const TEMPERATURE: f32 = 0.2;

static CTRL_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F]").unwrap());
static CODE_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^```[a-zA-Z0-9_-]*\n(.*)\n```$").unwrap());

fn sanitize_text(s: &str) -> String {
    CTRL_CHARS_RE.replace_all(s, "").to_string()
}

fn strip_md_code_fence(s: &str) -> String {
    let trimmed = s.trim();
    match CODE_FENCE_RE.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct RawCodeOutput {
    language: String,
    code: String,
    explanation: String,
}

/// Generates a single code snippet plus a short explanation. Uses a low
/// temperature: code generation benefits from determinism more than answer
/// generation does.
pub struct CodeAgent {
    llm: Arc<LlmClientFactory>,
}

impl CodeAgent {
    pub fn new(llm: Arc<LlmClientFactory>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Agent for CodeAgent {
    async fn run(
        &self,
        task: &str,
        _job_id: Uuid,
        _request_id: &str,
        progress_cb: ProgressCb<'_>,
    ) -> Result<AgentOutput, AgentError> {
        progress_cb(0.30);

        let cleaned_task = sanitize_text(&strip_md_code_fence(task));
        let client = self.llm.code_client(TEMPERATURE).await?;

        let request = CompletionRequest {
            messages: vec![ChatMessage {
                role: Role::User,
                content: format!("{PROMPT_PREAMBLE}{cleaned_task}"),
            }],
            temperature: TEMPERATURE,
        };

        progress_cb(0.70);
        let response = client.complete(request).await?;

        let raw: RawCodeOutput = serde_json::from_str(response.content.trim())
            .map_err(|e| crate::error::LlmError::InvalidOutput { reason: e.to_string() })?;

        let code = strip_md_code_fence(&sanitize_text(&raw.code));
        let explanation = sanitize_text(&raw.explanation);
        let language = sanitize_text(&raw.language);

        if code.trim().chars().filter(|c| !c.is_whitespace()).count() < 5 {
            return Err(AgentError::EmptyOrInvalidCode);
        }
        if language.trim().is_empty() {
            return Err(AgentError::EmptyOrInvalidCode);
        }

        progress_cb(0.90);
        Ok(AgentOutput::Code { language, code, explanation })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_code_fence() {
        let wrapped = "```rust\nfn main() {}\n```";
        assert_eq!(strip_md_code_fence(wrapped), "fn main() {}");
    }

    #[test]
    fn leaves_plain_code_untouched() {
        assert_eq!(strip_md_code_fence("fn main() {}"), "fn main() {}");
    }

    #[test]
    fn sanitize_text_strips_control_chars_but_keeps_tabs_and_newlines() {
        let dirty = "fn main() {\n\t\x01let x = 1;\x07\n}";
        let clean = sanitize_text(dirty);
        assert!(!clean.contains('\u{1}'));
        assert!(!clean.contains('\u{7}'));
        assert!(clean.contains('\n'));
        assert!(clean.contains('\t'));
    }
}
