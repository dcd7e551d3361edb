//! Fetches and extracts page metadata for the Content agent, with an
//! optional host whitelist, plus a thin delegate to the search provider.

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use std::sync::LazyLock;

use crate::config::WebConfig;
use crate::error::WebError;
use crate::search::{SearchHit, SearchProvider};

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static META_DESC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta\s+(?:name=["']description["']|property=["']og:description["'])\s+content=["'](.*?)["']"#).unwrap()
});
static FIRST_P_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<p[^>]*>(.*?)</p>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

fn collapse(s: &str) -> String {
    WHITESPACE_RE.replace_all(s.trim(), " ").to_string()
}

pub struct WebClient {
    client: reqwest::Client,
    search_provider: Option<Arc<dyn SearchProvider>>,
    whitelist: Vec<String>,
    user_agent: String,
}

impl WebClient {
    pub fn new(config: &WebConfig, search_provider: Option<Arc<dyn SearchProvider>>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_s))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .expect("static web client configuration is always valid");

        Self {
            client,
            search_provider,
            whitelist: config.whitelist.iter().map(|d| d.to_lowercase()).collect(),
            user_agent: config.user_agent.clone(),
        }
    }

    pub async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, crate::error::SearchError> {
        let provider = self
            .search_provider
            .as_ref()
            .ok_or(crate::error::SearchError::NotConfigured)?;
        let hits = provider.search(query, limit).await?;
        Ok(hits.into_iter().take(limit.max(1)).collect())
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, WebError> {
        if !self.is_allowed(url) {
            return Err(WebError::NotWhitelisted(url.to_string()));
        }

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                WebError::Timeout { url: url.to_string() }
            } else {
                WebError::Http { url: url.to_string(), reason: e.to_string() }
            }
        })?;

        if !response.status().is_success() {
            return Err(WebError::Http { url: url.to_string(), reason: format!("HTTP {}", response.status()) });
        }

        let html = response
            .text()
            .await
            .map_err(|e| WebError::Http { url: url.to_string(), reason: e.to_string() })?;

        let title = extract_title(&html).unwrap_or_else(|| host_as_title(url));
        let snippet = extract_meta_description(&html).or_else(|| first_p_tag(&html)).unwrap_or_default();

        Ok(FetchedPage { title, url: url.to_string(), snippet })
    }

    fn is_allowed(&self, url: &str) -> bool {
        if self.whitelist.is_empty() {
            return true;
        }
        let Ok(parsed) = reqwest::Url::parse(url) else { return false };
        let Some(host) = parsed.host_str() else { return false };
        let host = host.to_lowercase();
        self.whitelist.iter().any(|d| host == *d || host.ends_with(&format!(".{d}")))
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

fn extract_title(html: &str) -> Option<String> {
    let captured = TITLE_RE.captures(html)?.get(1)?.as_str();
    let cleaned = collapse(captured);
    Some(cleaned.chars().take(240).collect())
}

fn extract_meta_description(html: &str) -> Option<String> {
    let captured = META_DESC_RE.captures(html)?.get(1)?.as_str();
    let cleaned = collapse(captured);
    Some(cleaned.chars().take(300).collect())
}

fn first_p_tag(html: &str) -> Option<String> {
    let captured = FIRST_P_RE.captures(html)?.get(1)?.as_str();
    let stripped = TAG_RE.replace_all(captured, " ");
    let cleaned = collapse(&stripped);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.chars().take(300).collect())
    }
}

fn host_as_title(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "web".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_from_simple_html() {
        let html = "<html><head><title>  Hello   World </title></head></html>";
        assert_eq!(extract_title(html), Some("Hello World".to_string()));
    }

    #[test]
    fn extracts_meta_description_when_no_title_snippet_needed() {
        let html = r#"<meta name="description" content="A page about Rust."/>"#;
        assert_eq!(extract_meta_description(html), Some("A page about Rust.".to_string()));
    }

    #[test]
    fn falls_back_to_first_paragraph() {
        let html = "<p>First <b>paragraph</b> text.</p>";
        assert_eq!(first_p_tag(html), Some("First paragraph text.".to_string()));
    }

    #[test]
    fn host_as_title_falls_back_on_unparsable_url() {
        assert_eq!(host_as_title("not a url"), "web");
    }
}
