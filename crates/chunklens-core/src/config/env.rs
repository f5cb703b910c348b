use std::str::FromStr;

use super::{Config, Secret};

/// Parse `key` into `target`, keeping the current value when the variable is unset or invalid.
fn parse_into<T: FromStr>(key: &str, target: &mut T) {
    if let Ok(v) = std::env::var(key) {
        match v.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!("ignoring invalid {key} value: {v}"),
        }
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CHUNKLENS_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("CHUNKLENS_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("CHUNKLENS_LLM_API_KEY")
            && !v.is_empty()
        {
            self.secrets.llm_api_key = Some(Secret::new(v));
        }
        parse_into("CHUNKLENS_LLM_MAX_RETRIES", &mut self.llm.max_retries);
        parse_into("CHUNKLENS_LLM_TIMEOUT_SECS", &mut self.llm.timeout_secs);

        parse_into(
            "CHUNKLENS_CHUNKING_DEFAULT_MAX_TOKENS",
            &mut self.chunking.default_max_tokens,
        );
        parse_into(
            "CHUNKLENS_CHUNKING_SHORT_TARGET_TOKENS",
            &mut self.chunking.short_target_tokens,
        );
        parse_into(
            "CHUNKLENS_CHUNKING_SHORT_MAX_TOKENS",
            &mut self.chunking.short_max_tokens,
        );
        parse_into(
            "CHUNKLENS_CHUNKING_PARA_MAX_TOKENS",
            &mut self.chunking.para_max_tokens,
        );

        parse_into(
            "CHUNKLENS_ENHANCEMENT_MAX_TOKENS",
            &mut self.enhancement.max_tokens,
        );
        parse_into(
            "CHUNKLENS_QUALITY_MIN_TOKENS",
            &mut self.quality.min_tokens,
        );

        if let Ok(v) = std::env::var("CHUNKLENS_SQLITE_PATH") {
            self.storage.sqlite_path = v;
        }
        if let Ok(v) = std::env::var("CHUNKLENS_SOURCE_DIR") {
            self.source.directory = v;
        }
        if let Ok(v) = std::env::var("CHUNKLENS_LOG_LEVEL") {
            self.observability.log_level = v;
        }
    }
}
