//! Process configuration, loaded once from the environment at startup.

use secrecy::SecretString;

use crate::error::ConfigError;

fn env_var(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(v) => v.parse().map_err(|_| ConfigError::InvalidVar {
            var: key.to_string(),
            reason: "could not parse".to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub debug: bool,
    pub api_prefix: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub pool_size: usize,
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.dbname
        )
    }
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub redis_url: String,
    pub queue_name: String,
    pub consumer_block_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret_key: SecretString,
    pub algorithm: String,
}

#[derive(Clone)]
pub struct LlmConfig {
    pub provider: String,
    pub model_content: String,
    pub model_code: String,
    pub timeout_s: u64,
    pub max_retries: u32,
    pub api_key: SecretString,
    pub base_url: String,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model_content", &self.model_content)
            .field("model_code", &self.model_code)
            .field("timeout_s", &self.timeout_s)
            .field("max_retries", &self.max_retries)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub user_agent: String,
    pub timeout_s: u64,
    pub whitelist: Vec<String>,
}

#[derive(Clone)]
pub struct SearchConfig {
    pub provider: String,
    pub api_key: SecretString,
    pub engine: String,
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("engine", &self.engine)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub jwt: JwtConfig,
    pub llm: LlmConfig,
    pub web: WebConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the process environment. Call `dotenvy::dotenv()`
    /// before this in binaries that want `.env` support outside production.
    pub fn from_env() -> Result<Self, ConfigError> {
        let app_env = env_var_or("APP_ENV", "development");

        Ok(Config {
            app: AppConfig {
                debug: env_parse("APP_DEBUG", app_env != "production")?,
                env: app_env,
                api_prefix: env_var_or("APP_STR", "/api/v1"),
            },
            database: DatabaseConfig {
                host: env_var("POSTGRES_HOST")?,
                port: env_parse("POSTGRES_PORT", 5432)?,
                user: env_var("POSTGRES_USER")?,
                password: env_var("POSTGRES_PASSWORD")?,
                dbname: env_var("POSTGRES_DB")?,
                pool_size: env_parse("POSTGRES_POOL_SIZE", 16)?,
            },
            queue: QueueConfig {
                redis_url: env_var("REDIS_URL")?,
                queue_name: env_var_or("QUEUE_NAME", "agent_execute"),
                consumer_block_timeout_ms: env_parse("QUEUE_BLOCK_TIMEOUT_MS", 5000)?,
            },
            jwt: JwtConfig {
                secret_key: SecretString::from(env_var("JWT_SECRET_KEY")?),
                algorithm: env_var_or("JWT_ALGORITHM", "HS256"),
            },
            llm: LlmConfig {
                provider: env_var_or("LLM_PROVIDER", "openai"),
                model_content: env_var("LLM_MODEL_CONTENT")?,
                model_code: env_var("LLM_MODEL_CODE")?,
                timeout_s: env_parse("LLM_TIMEOUT_S", 30)?,
                max_retries: env_parse("LLM_MAX_RETRIES", 2)?,
                api_key: SecretString::from(env_var("OPENAI_API_KEY")?),
                base_url: env_var_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            },
            web: WebConfig {
                user_agent: env_var_or("WEB_USER_AGENT", "peerforge/content-agent"),
                timeout_s: env_parse("WEB_TIMEOUT_S", 10)?,
                whitelist: env_var_or("WEB_WHITELIST", "")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            search: SearchConfig {
                provider: env_var_or("WEB_SEARCH_PROVIDER", "serpapi"),
                api_key: SecretString::from(env_var_or("SERPAPI_API_KEY", "")),
                engine: env_var_or("SERPAPI_ENGINE", "duckduckgo"),
            },
            logging: LoggingConfig {
                level: env_var_or("LOG_LEVEL", "info"),
                json: env_parse("LOG_JSON", app_env_is_production())?,
            },
        })
    }
}

fn app_env_is_production() -> bool {
    std::env::var("APP_ENV").map(|v| v == "production").unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_var_fails_fast() {
        // SAFETY: test-only process-wide env mutation, no concurrent test touches these vars.
        unsafe {
            std::env::remove_var("POSTGRES_HOST");
        }
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(v) if v == "POSTGRES_HOST"));
    }
}
