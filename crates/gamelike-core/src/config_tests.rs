use std::io::Write;

use crate::config::{ConfigError, PipelineConfig};
use crate::model::Loss;

#[test]
fn defaults_are_valid() {
    let config = PipelineConfig::default();
    config.validate().unwrap();
    assert_eq!(config.matrix.chunk_size, 500);
    assert_eq!(config.model.splits_divisor, 2);
}

#[test]
fn toml_file_overrides_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[data]
id_column = "game_id"

[matrix]
chunk_size = 250

[model]
train_fraction = 0.8

[model.hyperparams]
factors = 16
loss = "logistic"
"#
    )
    .unwrap();

    let config = PipelineConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.data.id_column, "game_id");
    assert_eq!(config.matrix.chunk_size, 250);
    assert!((config.model.train_fraction - 0.8).abs() < 1e-6);
    assert_eq!(config.model.hyperparams.factors, 16);
    assert_eq!(config.model.hyperparams.loss, Loss::Logistic);
    // Untouched knobs keep their defaults.
    assert_eq!(config.model.hyperparams.seed, 42);
}

#[test]
fn zero_chunk_size_is_rejected() {
    let mut config = PipelineConfig::default();
    config.matrix.chunk_size = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn out_of_range_train_fraction_is_rejected() {
    let mut config = PipelineConfig::default();
    config.model.train_fraction = 1.5;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn zero_splits_divisor_is_rejected() {
    let mut config = PipelineConfig::default();
    config.model.splits_divisor = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::Invalid(_))
    ));
}
