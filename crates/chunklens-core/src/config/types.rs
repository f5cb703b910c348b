use std::fmt;

use chunklens_document::caption::DEFAULT_LABELS;
use chunklens_document::{ChunkingConfig, EnhancementConfig};
use chunklens_llm::ModelPricing;
use chunklens_quality::QualityConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub captions: CaptionConfig,
    #[serde(default)]
    pub enhancement: EnhancementConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    60
}

/// OpenAI-compatible completion backend. Prices default to the model's published rates.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_cost_per_million: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_cost_per_million: Option<f64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            input_cost_per_million: None,
            output_cost_per_million: None,
        }
    }
}

impl LlmConfig {
    /// Configured prices when both are set, otherwise the lookup table for the model.
    #[must_use]
    pub fn pricing(&self) -> ModelPricing {
        match (self.input_cost_per_million, self.output_cost_per_million) {
            (Some(input), Some(output)) => ModelPricing::new(input, output),
            _ => ModelPricing::for_model(&self.model),
        }
    }
}

fn default_labels() -> Vec<String> {
    DEFAULT_LABELS.iter().map(|&l| l.to_owned()).collect()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptionConfig {
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            labels: default_labels(),
        }
    }
}

fn default_sqlite_path() -> String {
    "chunklens.db".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: default_sqlite_path(),
        }
    }
}

fn default_source_dir() -> String {
    "documents".into()
}

/// Where rendered documents are read from: `<directory>/<id>.html`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_dir")]
    pub directory: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            directory: default_source_dir(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// A credential that never shows up in logs or serialized config.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Default, Clone)]
pub struct ResolvedSecrets {
    pub llm_api_key: Option<Secret>,
}
