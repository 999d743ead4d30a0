use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Main configuration structure loaded from fork_mind.toml and FORK_*
/// environment variables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub pipeline: PipelineConfig,
}

/// Transport settings for the generative model endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_ms: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_ms: 60_000,
            max_tokens: 2048,
            temperature: 0.7,
        }
    }
}

/// Behavior knobs for the orchestrator
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Max characters of the user's narrative echoed into progress messages
    pub preview_chars: usize,
    /// Emit per-stage sub-progress events between model call and validation
    pub verbose_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preview_chars: 80,
            verbose_progress: true,
        }
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables.
    /// Uses FORK_MIND_CONFIG or defaults to "fork_mind.toml"; a missing
    /// file just means defaults.
    pub fn load() -> anyhow::Result<Self> {
        crate::load_env();

        let config_path =
            std::env::var("FORK_MIND_CONFIG").unwrap_or_else(|_| "fork_mind.toml".to_string());

        let mut config: Config = if let Ok(content) = std::fs::read_to_string(&config_path) {
            toml::from_str(&content).with_context(|| format!("parse {config_path}"))?
        } else {
            tracing::debug!("config file {} not found, using defaults", config_path);
            Self::default()
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Env-first overrides; each knob has a FORK_* variable.
    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("FORK_BASE_URL") {
            self.model.base_url = v;
        }
        if let Ok(v) = std::env::var("FORK_MODEL") {
            self.model.model = v;
        }
        if let Some(v) = std::env::var("FORK_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.model.timeout_ms = v;
        }
        if let Some(v) = std::env::var("FORK_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            self.model.max_tokens = v;
        }
        if let Some(v) = std::env::var("FORK_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
        {
            self.model.temperature = v.clamp(0.0, 2.0);
        }
        if let Ok(v) = std::env::var("FORK_VERBOSE_PROGRESS") {
            self.pipeline.verbose_progress = v == "1" || v.eq_ignore_ascii_case("true");
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.model.base_url.is_empty() {
            anyhow::bail!("model.base_url must not be empty");
        }
        if !self.model.base_url.starts_with("http://") && !self.model.base_url.starts_with("https://")
        {
            anyhow::bail!(
                "model.base_url '{}' must start with http:// or https://",
                self.model.base_url
            );
        }
        if self.model.timeout_ms == 0 {
            anyhow::bail!("model.timeout_ms must be > 0");
        }
        if self.model.max_tokens == 0 {
            anyhow::bail!("model.max_tokens must be > 0");
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            anyhow::bail!("model.temperature must be between 0.0 and 2.0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let mut config = Config::default();
        config.model.base_url = "ftp://nope".to_string();
        assert!(config.validate().is_err());
    }
}
