//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys split on `__`). Provides helpers to expand
//! `~` and `${VAR}` and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

pub struct Config {
    figment: Figment,
    /// Directory the config files were read from; relative paths in settings resolve against it.
    base: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Defaults, then `config.toml`, then `config.<env>.toml`, then `APP_*` env vars.
    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base: dir.to_path_buf() };
        config.settings()?;
        Ok(config)
    }

    /// The full typed settings, validated, with `embedding.model_dir` resolved against the config directory.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;
        settings.validate()?;
        if let Some(dir) = settings.embedding.model_dir.take() {
            settings.embedding.model_dir = Some(resolve_with_base(&self.base, dir).display().to_string());
        }
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalSettings,
    pub completion: CompletionSettings,
    pub retry: RetryPolicy,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        let checks = [
            (self.retrieval.top_k, "retrieval.top_k"),
            (self.retrieval.context_budget, "retrieval.context_budget"),
            (self.embedding.batch_size, "embedding.batch_size"),
            (self.embedding.concurrency, "embedding.concurrency"),
            (self.retry.max_attempts as usize, "retry.max_attempts"),
        ];
        for (value, name) in checks {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{name} must be greater than zero")));
            }
        }
        if let Some(cap) = self.embedding.max_unit_chars {
            if self.chunking.chunk_size > cap {
                return Err(Error::InvalidConfig(format!(
                    "chunking.chunk_size ({}) exceeds embedding.max_unit_chars ({cap})",
                    self.chunking.chunk_size
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// candle BGE-M3 on this machine
    Local,
    /// OpenAI-compatible `/embeddings` endpoint
    OpenAi,
    /// deterministic feature hashing, no I/O
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderKind,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Overrides the provider's native dimension where the provider allows it.
    pub dimension: Option<usize>,
    pub batch_size: usize,
    pub concurrency: usize,
    /// Caps unit size below the provider's own limit.
    pub max_unit_chars: Option<usize>,
    pub query_prefix: Option<String>,
    pub model_dir: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::OpenAi,
            model: None,
            endpoint: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            dimension: None,
            batch_size: 64,
            concurrency: 4,
            max_unit_chars: None,
            query_prefix: None,
            model_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    /// Upper bound, in characters, on the assembled context.
    pub context_budget: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 5, context_budget: 6_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompletionSettings {
    pub model: String,
    pub endpoint: Option<String>,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            endpoint: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.2,
            max_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingSettings {
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { filter: "info".to_string() }
    }
}

/// Read an API key from the named environment variable.
pub fn api_key_from_env(var: &str) -> Result<String> {
    env::var(var)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| Error::InvalidConfig(format!("environment variable {var} is not set")))
}

/// Expand `$VAR`/`${VAR}` and a leading `~` in a document or model path. Unknown variables are left as written.
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let raw = input.as_ref();
    let with_vars = shellexpand::env(raw).unwrap_or(std::borrow::Cow::Borrowed(raw));
    PathBuf::from(shellexpand::tilde(&with_vars).as_ref())
}

/// `path` after expansion, joined onto `base` unless it is already absolute.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, path: S) -> PathBuf {
    match expand_path(path) {
        p if p.is_absolute() => p,
        p => base.join(p),
    }
}
