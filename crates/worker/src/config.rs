use std::time::Duration;

use zds_core::content_type::{parse_type_list, ContentType, PublicationPolicy};
use zds_core::filters::DEFAULT_CHAIN;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Search engine connection settings.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Base URL of the Elasticsearch cluster.
    pub url: String,
    /// Index holding content documents.
    pub index: String,
    /// Timeout for a single request.
    pub timeout: Duration,
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Time between two scheduled reindex passes.
    pub reindex_interval: Duration,
    /// Flagged contents fetched per page during a pass.
    pub reindex_batch_size: i64,
    pub search: SearchConfig,
    /// Filter names applied, in order, to revision bodies before indexing.
    pub index_text_filters: Vec<String>,
    /// Content types that may be published without an approved revision.
    pub publish_without_validation: Vec<ContentType>,
    pub bot_account: String,
    pub anonymous_account: String,
    pub external_account: String,
    pub log_format: LogFormat,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                               |
    /// |------------------------------|---------------------------------------|
    /// | `DATABASE_URL`               | required                              |
    /// | `REINDEX_INTERVAL_SECS`      | `60`                                  |
    /// | `REINDEX_BATCH_SIZE`         | `100`                                 |
    /// | `ES_URL`                     | `http://localhost:9200`               |
    /// | `ES_INDEX`                   | `zds_content`                         |
    /// | `ES_TIMEOUT_SECS`            | `10`                                  |
    /// | `INDEX_TEXT_FILTERS`         | `strip_markdown,collapse_whitespace`  |
    /// | `PUBLISH_WITHOUT_VALIDATION` | `opinion`                             |
    /// | `BOT_ACCOUNT`                | `admin`                               |
    /// | `ANONYMOUS_ACCOUNT`          | `anonymous`                           |
    /// | `EXTERNAL_ACCOUNT`           | `external`                            |
    /// | `LOG_FORMAT`                 | `text` (`json` for JSON lines)        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let reindex_interval_secs: u64 =
            parse_positive("REINDEX_INTERVAL_SECS", &var("REINDEX_INTERVAL_SECS", "60"))?;
        let reindex_batch_size: i64 =
            parse_positive("REINDEX_BATCH_SIZE", &var("REINDEX_BATCH_SIZE", "100"))?;
        let es_timeout_secs: u64 = parse_positive("ES_TIMEOUT_SECS", &var("ES_TIMEOUT_SECS", "10"))?;

        let index_text_filters = match lookup("INDEX_TEXT_FILTERS") {
            Some(raw) => split_list(&raw),
            None => DEFAULT_CHAIN.iter().map(|s| s.to_string()).collect(),
        };

        let raw_types = var("PUBLISH_WITHOUT_VALIDATION", "opinion");
        let publish_without_validation =
            parse_type_list(&raw_types).map_err(|e| ConfigError::Invalid {
                var: "PUBLISH_WITHOUT_VALIDATION",
                value: raw_types.clone(),
                reason: e.to_string(),
            })?;

        let raw_format = var("LOG_FORMAT", "text");
        let log_format = match raw_format.trim().to_ascii_lowercase().as_str() {
            "text" | "" => LogFormat::Text,
            "json" => LogFormat::Json,
            _ => {
                return Err(ConfigError::Invalid {
                    var: "LOG_FORMAT",
                    value: raw_format,
                    reason: "expected 'text' or 'json'".into(),
                })
            }
        };

        Ok(Self {
            database_url,
            reindex_interval: Duration::from_secs(reindex_interval_secs),
            reindex_batch_size,
            search: SearchConfig {
                url: var("ES_URL", "http://localhost:9200"),
                index: var("ES_INDEX", "zds_content"),
                timeout: Duration::from_secs(es_timeout_secs),
            },
            index_text_filters,
            publish_without_validation,
            bot_account: var("BOT_ACCOUNT", "admin"),
            anonymous_account: var("ANONYMOUS_ACCOUNT", "anonymous"),
            external_account: var("EXTERNAL_ACCOUNT", "external"),
            log_format,
        })
    }

    /// Member accounts that must exist before the worker starts.
    pub fn required_members(&self) -> Vec<String> {
        vec![
            self.bot_account.clone(),
            self.anonymous_account.clone(),
            self.external_account.clone(),
        ]
    }

    /// Publication policy built from `PUBLISH_WITHOUT_VALIDATION`.
    pub fn publication_policy(&self) -> PublicationPolicy {
        PublicationPolicy::new(self.publish_without_validation.iter().copied())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_positive<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let parsed: T = value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })?;
    if parsed <= T::default() {
        return Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(parsed)
}
