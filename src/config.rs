use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_data_base")]
    pub data_base: String,

    #[serde(default = "default_catalog")]
    pub catalog: String,

    #[serde(default = "default_checkpoints_dir")]
    pub checkpoints_dir: String,

    #[serde(default)]
    pub whisper: WhisperConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WhisperConfig {
    #[serde(default = "default_whisper_binary")]
    pub binary: String,
    #[serde(default = "default_whisper_model")]
    pub model: String,
    #[serde(default = "default_whisper_device")]
    pub device: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_binary")]
    pub binary: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// MinIO client alias. Empty means auto-detect via `mc alias ls`.
    #[serde(default)]
    pub alias: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_trim_db")]
    pub trim_db: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            binary: default_whisper_binary(),
            model: default_whisper_model(),
            device: default_whisper_device(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            binary: default_storage_binary(),
            bucket: default_bucket(),
            alias: String::new(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            trim_db: default_trim_db(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_base: default_data_base(),
            catalog: default_catalog(),
            checkpoints_dir: default_checkpoints_dir(),
            whisper: WhisperConfig::default(),
            storage: StorageConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

fn default_data_base() -> String {
    "data".to_string()
}
fn default_catalog() -> String {
    "data/character_catalog.json".to_string()
}
fn default_checkpoints_dir() -> String {
    "trained_ckpts".to_string()
}
fn default_whisper_binary() -> String {
    "whisper".to_string()
}
fn default_whisper_model() -> String {
    "medium".to_string()
}
fn default_whisper_device() -> String {
    "cuda".to_string()
}
fn default_storage_binary() -> String {
    "mc".to_string()
}
fn default_bucket() -> String {
    "voice-loras".to_string()
}
fn default_sample_rate() -> u32 {
    24000
}
fn default_trim_db() -> f32 {
    20.0
}
fn default_timeout_secs() -> u64 {
    600
}

impl Config {
    /// Loads `config.yml` from the given path, or returns defaults when the
    /// file does not exist. All fields are optional in the file.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }
}
