use crate::aggregator::{AggregatorSettings, DEFAULT_CONCURRENCY};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_NIH_REPORTER_URL: &str = "https://api.reporter.nih.gov/v2/projects/search";
const DEFAULT_ORG_NAMES: &str = "UNIVERSITY OF VIRGINIA,University of Virginia";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the aggregator and its collaborators.
///
/// Built once at start-up and passed explicitly to whatever needs it.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Schools aggregated when none are given on the command line.
    pub schools_to_scrape: Vec<String>,
    /// JSON roster export used as the faculty directory.
    pub roster_path: PathBuf,
    /// NIH RePORTER client settings.
    pub nih: NihConfig,
    /// Embedding provider settings.
    pub embedding: EmbeddingConfig,
    /// Vector store settings.
    pub qdrant: QdrantConfig,
    /// Maximum number of faculty members enriched concurrently.
    pub aggregator_concurrency: usize,
    /// Optional overall time budget per school.
    pub aggregator_deadline_secs: Option<u64>,
}

/// NIH RePORTER search parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct NihConfig {
    /// Project search endpoint.
    pub reporter_url: String,
    /// Organizations the investigator must be affiliated with.
    pub org_names: Vec<String>,
    /// Fiscal years searched.
    pub fiscal_years: Vec<i32>,
    /// Results requested per page.
    pub page_size: usize,
}

/// Embedding provider selection and model parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding provider used to generate vector representations.
    pub provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub model: String,
    /// Dimensionality of the produced vectors.
    pub dimension: usize,
    /// Token budget of a faculty document.
    pub max_tokens: usize,
    /// API key for the OpenAI provider.
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    /// URL of the Ollama runtime.
    pub ollama_url: String,
}

/// Qdrant connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct QdrantConfig {
    /// Base URL of the Qdrant instance that stores faculty embeddings.
    pub url: String,
    /// Collection holding faculty vectors.
    pub collection_name: String,
    /// Optional API key required to access Qdrant.
    pub api_key: Option<String>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Deterministic local hashing, no network access.
    Hashing,
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI embeddings API.
    OpenAI,
}

impl Config {
    /// Load `.env` (when present) and then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config = Self::from_env()?;
        tracing::debug!(
            schools = ?config.schools_to_scrape,
            roster = %config.roster_path.display(),
            qdrant_url = %config.qdrant.url,
            collection = %config.qdrant.collection_name,
            embedding_provider = ?config.embedding.provider,
            concurrency = config.aggregator_concurrency,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let embedding = EmbeddingConfig {
            provider: load_env_optional("EMBEDDING_PROVIDER")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".into()))
                })
                .transpose()?
                .unwrap_or(EmbeddingProvider::Hashing),
            model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-ada-002".to_string()),
            dimension: parse_optional("EMBEDDING_DIMENSION")?.unwrap_or(1536),
            max_tokens: parse_optional("EMBEDDING_MAX_TOKENS")?.unwrap_or(8192),
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_base_url: load_env_optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            ollama_url: load_env_optional("OLLAMA_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
        };
        if embedding.dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        if embedding.provider == EmbeddingProvider::OpenAI && embedding.openai_api_key.is_none() {
            return Err(ConfigError::MissingVariable("OPENAI_API_KEY".into()));
        }

        let aggregator_concurrency =
            parse_optional("AGGREGATOR_CONCURRENCY")?.unwrap_or(DEFAULT_CONCURRENCY);
        if aggregator_concurrency == 0 {
            return Err(ConfigError::InvalidValue("AGGREGATOR_CONCURRENCY".into()));
        }

        Ok(Self {
            schools_to_scrape: split_list(
                &load_env_optional("SCHOOLS_TO_SCRAPE").unwrap_or_else(|| "SEAS".to_string()),
            ),
            roster_path: load_env_optional("ROSTER_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/roster.json")),
            nih: NihConfig {
                reporter_url: load_env_optional("NIH_REPORTER_URL")
                    .unwrap_or_else(|| DEFAULT_NIH_REPORTER_URL.to_string()),
                org_names: split_list(
                    &load_env_optional("NIH_ORG_NAMES")
                        .unwrap_or_else(|| DEFAULT_ORG_NAMES.to_string()),
                ),
                fiscal_years: match load_env_optional("NIH_FISCAL_YEARS") {
                    Some(value) => parse_fiscal_years(&value)
                        .ok_or_else(|| ConfigError::InvalidValue("NIH_FISCAL_YEARS".into()))?,
                    None => default_fiscal_years(),
                },
                page_size: parse_optional("NIH_PAGE_SIZE")?.unwrap_or(500),
            },
            embedding,
            qdrant: QdrantConfig {
                url: load_env("QDRANT_URL")?,
                collection_name: load_env_optional("QDRANT_COLLECTION_NAME")
                    .unwrap_or_else(|| "faculty".to_string()),
                api_key: load_env_optional("QDRANT_API_KEY"),
            },
            aggregator_concurrency,
            aggregator_deadline_secs: parse_optional("AGGREGATOR_DEADLINE_SECS")?,
        })
    }

    /// Aggregator settings derived from this configuration.
    pub fn aggregator_settings(&self) -> AggregatorSettings {
        AggregatorSettings {
            concurrency: self.aggregator_concurrency,
            deadline: self.aggregator_deadline_secs.map(Duration::from_secs),
        }
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_fiscal_years() -> Vec<i32> {
    (2020..2026).collect()
}

/// Accepts `2020,2021` lists and inclusive `2020..2025` ranges.
fn parse_fiscal_years(value: &str) -> Option<Vec<i32>> {
    if let Some((start, end)) = value.split_once("..") {
        let start: i32 = start.trim().parse().ok()?;
        let end: i32 = end.trim().parse().ok()?;
        return (start <= end).then(|| (start..=end).collect());
    }
    let years = split_list(value)
        .iter()
        .map(|year| year.parse().ok())
        .collect::<Option<Vec<i32>>>()?;
    (!years.is_empty()).then_some(years)
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hashing" => Ok(Self::Hashing),
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}
