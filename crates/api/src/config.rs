use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub mode: OperationMode,
    pub vision: VisionConfig,
    pub concurrency: ConcurrencyConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Fast,     // Many parallel vision calls, short timeouts, large cache
    Accurate, // Few parallel calls, patient retries, always ask the model
    Balanced, // Default
}

impl std::str::FromStr for OperationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "accurate" => Ok(Self::Accurate),
            other => bail!("Unknown TRAIL_MODE '{}' (expected fast, balanced or accurate)", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub max_concurrent_vision_calls: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            request_timeout_secs: 60,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: OperationMode::Balanced,
            vision: VisionConfig::default(),
            concurrency: ConcurrencyConfig {
                max_concurrent_vision_calls: 4,
            },
            retry: RetryConfig {
                max_retries: 3,
                initial_backoff_ms: 1000,
                max_backoff_ms: 10000,
            },
            cache: CacheConfig {
                enabled: true,
                max_entries: 10000,
            },
        }
    }
}

impl AppConfig {
    pub fn fast_mode() -> Self {
        Self {
            mode: OperationMode::Fast,
            vision: VisionConfig {
                request_timeout_secs: 30,
                ..VisionConfig::default()
            },
            concurrency: ConcurrencyConfig {
                max_concurrent_vision_calls: 10,
            },
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 500,
                max_backoff_ms: 5000,
            },
            cache: CacheConfig {
                enabled: true,
                max_entries: 50000,
            },
        }
    }

    pub fn accurate_mode() -> Self {
        Self {
            mode: OperationMode::Accurate,
            vision: VisionConfig {
                request_timeout_secs: 120,
                ..VisionConfig::default()
            },
            concurrency: ConcurrencyConfig {
                max_concurrent_vision_calls: 2,
            },
            retry: RetryConfig {
                max_retries: 5,
                initial_backoff_ms: 2000,
                max_backoff_ms: 20000,
            },
            cache: CacheConfig {
                enabled: false,
                max_entries: 0,
            },
        }
    }

    pub fn for_mode(mode: OperationMode) -> Self {
        match mode {
            OperationMode::Fast => Self::fast_mode(),
            OperationMode::Balanced => Self::default(),
            OperationMode::Accurate => Self::accurate_mode(),
        }
    }

    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = ?path, "Loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from a preset plus overrides returned by `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = match lookup("TRAIL_MODE") {
            Some(raw) => raw.parse()?,
            None => OperationMode::Balanced,
        };
        let mut config = Self::for_mode(mode);

        if let Some(key) = lookup("GEMINI_API_KEY") {
            config.vision.api_key = key;
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            config.vision.model = model;
        }
        if let Some(url) = lookup("GEMINI_BASE_URL") {
            config.vision.base_url = url;
        }
        if let Some(raw) = lookup("TRAIL_MAX_CONCURRENCY") {
            config.concurrency.max_concurrent_vision_calls = raw
                .trim()
                .parse()
                .with_context(|| format!("TRAIL_MAX_CONCURRENCY must be a number, got '{}'", raw))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency.max_concurrent_vision_calls == 0 {
            bail!("max_concurrent_vision_calls must be at least 1");
        }
        if self.vision.model.trim().is_empty() {
            bail!("Vision model name must not be empty");
        }
        Ok(())
    }
}
