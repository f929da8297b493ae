use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// External AI service configuration
    pub service: ServiceConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the OpenAI-compatible API
    pub endpoint: String,

    /// API key; the OPENAI_API_KEY environment variable takes precedence
    pub api_key: String,

    /// Speech-to-text model name
    pub transcription_model: String,

    /// Text-generation model name used for translation
    pub translation_model: String,

    /// Token ceiling per translation completion
    pub max_completion_tokens: u32,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Retry policy for service calls
    pub retry: RetryConfig,
}

/// Bounded retry with exponential backoff for external service calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 disables retrying)
    pub max_retries: u32,

    /// Base backoff in milliseconds, doubled on each retry
    pub backoff_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base_ms: 1000,
        }
    }
}

impl RetryConfig {
    /// Delay in milliseconds before retry `attempt` (1-based), doubling per
    /// attempt. The shift and the product are both clamped so an oversized
    /// policy saturates instead of overflowing.
    pub fn backoff_delay_ms(&self, attempt: u32) -> u64 {
        let shift = attempt.saturating_sub(1).min(16);
        self.backoff_base_ms.saturating_mul(1u64 << shift)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root directory for per-run working directories
    pub work_root: Option<PathBuf>,

    /// Concurrency limit for per-language translation fan-out
    pub max_concurrent_translations: usize,

    /// Timeout in seconds for spawned tools (ffmpeg, document converters)
    pub external_tool_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                endpoint: "https://api.openai.com".to_string(),
                api_key: String::new(),
                transcription_model: "whisper-1".to_string(),
                translation_model: "gpt-4o-mini".to_string(),
                max_completion_tokens: 1000,
                request_timeout_secs: 120,
                retry: RetryConfig::default(),
            },
            app: AppConfig {
                work_root: None,
                max_concurrent_translations: 3,
                external_tool_timeout_secs: 300,
            },
        }
    }
}

impl ServiceConfig {
    /// Effective API key: environment variable over config file.
    pub fn api_key(&self) -> String {
        std::env::var("OPENAI_API_KEY").unwrap_or_else(|_| self.api_key.clone())
    }
}

impl AppConfig {
    /// Effective work root, defaulting to a crate-named directory under the
    /// system temp dir.
    pub fn work_root(&self) -> PathBuf {
        self.work_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("video-translator"))
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content =
                fs_err::read_to_string(&config_path).context("Failed to read config file")?;

            let config: Config =
                serde_yaml::from_str(&content).context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("video-translator").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.service.endpoint.is_empty() {
            anyhow::bail!("Service endpoint must be configured");
        }

        if self.service.max_completion_tokens == 0 {
            anyhow::bail!("max_completion_tokens must be greater than zero");
        }

        if self.app.max_concurrent_translations == 0 {
            anyhow::bail!("max_concurrent_translations must be greater than zero");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Endpoint: {}", self.service.endpoint);
        println!(
            "  Transcription Model: {}",
            self.service.transcription_model
        );
        println!("  Translation Model: {}", self.service.translation_model);
        println!("  Max Tokens: {}", self.service.max_completion_tokens);
        println!("  Work Root: {}", self.app.work_root().display());
        println!(
            "  Concurrent Translations: {}",
            self.app.max_concurrent_translations
        );
    }
}
