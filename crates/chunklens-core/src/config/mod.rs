mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::Context;
use chunklens_llm::any::AnyProvider;
use chunklens_llm::openai::OpenAiProvider;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Completion backend described by `[llm]`. A missing API key is sent as empty,
    /// which local OpenAI-compatible servers accept.
    #[must_use]
    pub fn provider(&self) -> AnyProvider {
        let api_key = self
            .secrets
            .llm_api_key
            .as_ref()
            .map(|k| k.expose().to_owned())
            .unwrap_or_default();
        AnyProvider::OpenAi(
            OpenAiProvider::new(api_key, self.llm.base_url.clone(), self.llm.model.clone())
                .with_max_retries(self.llm.max_retries)
                .with_timeout(self.llm.timeout_secs),
        )
    }
}
