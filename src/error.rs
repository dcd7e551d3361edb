//! Error types shared across the job pipeline.

/// Errors from the Job Store / Event Log persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("unique constraint violated")]
    Conflict,
}

impl From<deadpool_postgres::PoolError> for DatabaseError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        DatabaseError::Pool(e.to_string())
    }
}

/// Errors from the Queue Producer.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Errors from the LLM client factory / provider.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm request to {provider} failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("llm request to {provider} timed out after {timeout_s}s")]
    Timeout { provider: String, timeout_s: u64 },

    #[error("llm returned output that does not match the expected schema: {reason}")]
    InvalidOutput { reason: String },

    #[error("llm configuration error: {reason}")]
    Config { reason: String },
}

impl LlmError {
    /// Whether this failure is transient (HTTP transport / timeout) and thus
    /// safe to retry at the broker level.
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmError::RequestFailed { .. } | LlmError::Timeout { .. })
    }
}

/// Errors from the web fetcher.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("http error fetching {url}: {reason}")]
    Http { url: String, reason: String },

    #[error("url not whitelisted: {0}")]
    NotWhitelisted(String),

    #[error("request to {url} timed out")]
    Timeout { url: String },
}

/// Errors from the search provider.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search provider http error: {0}")]
    Http(String),

    #[error("search provider not configured")]
    NotConfigured,
}

/// Errors surfaced by the Code/Content agents.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("insufficient_sources")]
    InsufficientSources,

    #[error("model_output_sources_not_in_whitelist")]
    ModelOutputSourcesNotInWhitelist,

    #[error("empty_or_invalid_code")]
    EmptyOrInvalidCode,

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Web(#[from] WebError),

    #[error(transparent)]
    Search(#[from] SearchError),
}

impl AgentError {
    /// The stable error code stored on the job, mirroring `error_codes`/`code` on
    /// the originating exception.
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::InsufficientSources => "insufficient_sources",
            AgentError::ModelOutputSourcesNotInWhitelist => "model_output_sources_not_in_whitelist",
            AgentError::EmptyOrInvalidCode => "empty_or_invalid_code",
            AgentError::Llm(_) => "agent_run_error",
            AgentError::Web(_) => "agent_run_error",
            AgentError::Search(_) => "agent_run_error",
        }
    }

    /// Whether the broker should retry this failure.
    pub fn retryable(&self) -> bool {
        match self {
            AgentError::Llm(e) => e.is_transient(),
            AgentError::Web(WebError::Timeout { .. } | WebError::Http { .. }) => true,
            AgentError::Search(SearchError::Http(_)) => true,
            _ => false,
        }
    }
}

/// Errors from the unknown-agent-kind path in the Agent Registry.
#[derive(Debug, thiserror::Error)]
#[error("unknown agent kind: {0}")]
pub struct UnknownAgentKind(pub String);

/// Errors loading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidVar { var: String, reason: String },
}

/// Authentication failures distinguished at the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token_expired")]
    TokenExpired,

    #[error("invalid_token")]
    InvalidToken,

    #[error("unauthorized_access")]
    UnauthorizedAccess,
}

/// Errors surfaced by the Orchestrator to its HTTP caller.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("queue_unavailable")]
    QueueUnavailable,

    #[error("not_found")]
    NotFound,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}
