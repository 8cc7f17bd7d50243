//! Pipeline configuration.
//!
//! Layered the usual way: serialized defaults, then an optional TOML file,
//! then `GAMELIKE_`-prefixed environment variables (double underscore as
//! the section separator, e.g. `GAMELIKE_MATRIX__CHUNK_SIZE=250`).

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Hyperparams;

/// Configuration loading or validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file/env layers could not be read or merged.
    #[error("could not load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// A knob has a nonsensical value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Input and output locations plus the raw-record field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Raw catalog file (JSON array or JSON Lines of item records).
    pub catalog_path: PathBuf,
    /// Raw ownership file (JSON Lines, one user record per line).
    pub ownership_path: PathBuf,
    /// Directory all artifacts are written into.
    pub output_dir: PathBuf,
    /// Catalog columns kept for the cleaned item table.
    pub keep_columns: Vec<String>,
    /// Catalog column holding the item id.
    pub id_column: String,
    /// Ownership field holding the owned-item list.
    pub owned_list_field: String,
    /// Field of each owned-list entry holding the item id.
    pub sub_item_field: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("data/games.json"),
            ownership_path: PathBuf::from("data/user_games.jsonl"),
            output_dir: PathBuf::from("data/results"),
            keep_columns: ["id", "app_name", "genres", "release_date", "url"]
                .map(String::from)
                .to_vec(),
            id_column: "id".into(),
            owned_list_field: "items".into(),
            sub_item_field: "item_id".into(),
        }
    }
}

/// Knobs bounding peak memory during matrix construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    /// Users per chunk.
    pub chunk_size: usize,
    /// Byte ceiling for any single dense intermediate.
    pub memory_budget_bytes: u64,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            memory_budget_bytes: crate::matrix::MEMORY_BUDGET_DEFAULT,
        }
    }
}

/// Training and evaluation knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Factorizer hyperparameters.
    pub hyperparams: Hyperparams,
    /// Fraction of subsampled rows used for the train partition.
    pub train_fraction: f32,
    /// Evaluation considers `1 / splits_divisor` of the matrix rows.
    pub splits_divisor: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            hyperparams: Hyperparams::default(),
            train_fraction: 0.9,
            splits_divisor: 2,
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Inputs, outputs, and raw field names.
    pub data: DataConfig,
    /// Memory/chunking knobs.
    pub matrix: MatrixConfig,
    /// Model knobs.
    pub model: ModelConfig,
}

impl PipelineConfig {
    /// Loads defaults merged with `path` (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        let config: Self = figment
            .merge(Env::prefixed("GAMELIKE_").split("__"))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects knob values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.matrix.chunk_size == 0 {
            return Err(ConfigError::Invalid("matrix.chunk_size must be at least 1".into()));
        }
        if self.matrix.memory_budget_bytes == 0 {
            return Err(ConfigError::Invalid(
                "matrix.memory_budget_bytes must be positive".into(),
            ));
        }
        if self.model.splits_divisor == 0 {
            return Err(ConfigError::Invalid(
                "model.splits_divisor must be at least 1".into(),
            ));
        }
        if !(0.5..1.0).contains(&self.model.train_fraction) {
            return Err(ConfigError::Invalid(format!(
                "model.train_fraction must lie in [0.5, 1.0), got {}",
                self.model.train_fraction
            )));
        }
        if self.model.hyperparams.factors == 0 {
            return Err(ConfigError::Invalid("model.hyperparams.factors must be at least 1".into()));
        }
        if self.model.hyperparams.epochs == 0 {
            return Err(ConfigError::Invalid("model.hyperparams.epochs must be at least 1".into()));
        }
        if self.model.hyperparams.threads == 0 {
            return Err(ConfigError::Invalid("model.hyperparams.threads must be at least 1".into()));
        }
        if self.data.keep_columns.is_empty() {
            return Err(ConfigError::Invalid("data.keep_columns must not be empty".into()));
        }
        Ok(())
    }
}
