use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ColloquyError, Result};

/// Top-level configuration for the Colloquy engine.
///
/// Loaded from `~/.colloquy/config.toml` by default. Each section maps to one
/// component and is passed to that component at construction time; nothing
/// reads configuration ambiently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColloquyConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

impl ColloquyConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ColloquyConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ColloquyError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level filter: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Embedding backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding model name.
    pub model: String,
    /// ONNX model file path.
    pub model_path: String,
    /// Tokenizer file path.
    pub tokenizer_path: String,
    /// Embedding dimension. Every vector in the corpus shares this length.
    pub dimensions: usize,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum entries retained in the text-to-vector cache.
    pub max_cache_entries: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            model_path: "models/all-MiniLM-L6-v2.onnx".to_string(),
            tokenizer_path: "models/tokenizer.json".to_string(),
            dimensions: 384,
            timeout_secs: 30,
            max_cache_entries: 2048,
        }
    }
}

/// Text-completion gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Ordered provider chain, tried in sequence on failure. Known names:
    /// "ollama". The deterministic mock always terminates the chain, so an
    /// empty list runs fully offline.
    pub providers: Vec<String>,
    /// Base URL of the local Ollama-compatible server.
    pub ollama_url: String,
    /// Model name requested from providers.
    pub model: String,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Retries within one provider after a rate-limit response.
    pub rate_limit_retries: u32,
    /// Base backoff between rate-limit retries, in milliseconds.
    pub retry_backoff_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            ollama_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            timeout_secs: 30,
            rate_limit_retries: 2,
            retry_backoff_ms: 250,
        }
    }
}

/// Post-conversation analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Maximum topics persisted per conversation.
    pub max_topics: usize,
    /// Token budget requested for summary completions.
    pub summary_max_tokens: u32,
    /// Target sentence count the summary prompt asks for.
    pub summary_target_sentences: usize,
    /// Sampling temperature for summary completions.
    pub summary_temperature: f32,
    /// Messages per window in chunked summarization.
    pub chunk_size: usize,
    /// Transcript length in characters above which chunking kicks in.
    pub chunk_threshold_chars: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_topics: 10,
            summary_max_tokens: 200,
            summary_target_sentences: 3,
            summary_temperature: 0.5,
            chunk_size: 20,
            chunk_threshold_chars: 6000,
        }
    }
}

/// Query engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Ranked results returned per query.
    pub top_k: usize,
    /// Overall grounding-context size budget in characters.
    pub context_budget_chars: usize,
    /// Transcript excerpt length used when a candidate has no summary.
    pub excerpt_chars: usize,
    /// Token budget requested for answer synthesis.
    pub answer_max_tokens: u32,
    /// Sampling temperature for answer synthesis.
    pub answer_temperature: f32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            context_budget_chars: 2400,
            excerpt_chars: 240,
            answer_max_tokens: 500,
            answer_temperature: 0.7,
        }
    }
}
