//! Batch orchestration: raw records in, similarity matrix out.
//!
//! Strictly sequential; every stage failure is fatal to the whole run and
//! nothing is retried here. Reruns are the scheduler's responsibility, and
//! concurrent runs against the same output directory are not supported.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::catalog::{join_catalog, normalize_catalog, normalize_ownership};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::interaction::Assembler;
use crate::model::{evaluate, train};
use crate::similarity::derive;
use crate::source::{read_records, JsonLines};

/// File names written into the configured output directory.
pub mod artifacts {
    /// Cleaned item table for the relational-store ingestion step.
    pub const GAMES_CSV: &str = "games.csv";
    /// Ordered item-id list (postcard), one entry per matrix column.
    pub const ITEM_IDS: &str = "item_ids.bin";
    /// Scalar AUC score as plain text, for operational monitoring.
    pub const AUC_TXT: &str = "auc.txt";
    /// Item-item similarity matrix as delimited text.
    pub const SIMILARITIES_CSV: &str = "similarities.csv";
}

/// Summary of one completed run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineReport {
    /// User rows in the interaction matrix.
    pub users: usize,
    /// Item columns in the interaction matrix.
    pub items: usize,
    /// Stored interactions.
    pub interactions: usize,
    /// Ownership rows dropped at the catalog join.
    pub dropped_unmatched: usize,
    /// Ranking quality of the evaluation split.
    pub auc: f32,
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} users x {} items, {} interactions ({} unmatched rows dropped), auc {:.4}",
            self.users, self.items, self.interactions, self.dropped_unmatched, self.auc
        )
    }
}

/// Runs the full pipeline described by `config`.
///
/// Stages, in order: normalize catalog (write the item table), flatten and
/// join ownership, assemble the interaction matrix (persist the item-id
/// list), evaluate (persist the AUC), retrain on the full matrix, derive
/// and persist the similarity matrix.
pub fn run(config: &PipelineConfig) -> Result<PipelineReport> {
    std::fs::create_dir_all(&config.data.output_dir)
        .map_err(|e| Error::io(&config.data.output_dir, e))?;

    // Record normalization.
    let raw_catalog = read_records(&config.data.catalog_path)?;
    let catalog = normalize_catalog(
        &raw_catalog,
        &config.data.keep_columns,
        &config.data.id_column,
    )?;
    catalog.write_csv(out_path(config, artifacts::GAMES_CSV))?;
    info!("normalized catalog: {} items", catalog.len());

    let events = normalize_ownership(
        JsonLines::open(&config.data.ownership_path)?,
        &config.data.owned_list_field,
        &config.data.sub_item_field,
    )?;
    let flattened = events.len();
    let rows = join_catalog(events, &catalog);
    let dropped_unmatched = flattened - rows.len();

    // Interaction matrix.
    let assembler = Assembler {
        chunk_size: config.matrix.chunk_size,
        budget: config.matrix.memory_budget_bytes,
    };
    let interactions = assembler.assemble(&rows)?;
    interactions.save_item_ids(out_path(config, artifacts::ITEM_IDS))?;

    // Evaluation is decoupled from production training: its model is
    // thrown away and only the score survives.
    let auc = evaluate(
        &interactions.matrix,
        config.model.train_fraction,
        config.model.splits_divisor,
        &config.model.hyperparams,
        config.matrix.memory_budget_bytes,
    )?;
    write_auc(out_path(config, artifacts::AUC_TXT), auc)?;
    info!("evaluation auc: {auc:.4}");

    // Production embeddings from the full matrix.
    let embeddings = train(&interactions.matrix, &config.model.hyperparams)?;
    let similarity = derive(embeddings.item_factors(), &interactions.item_ids)?;
    similarity.write_csv(out_path(config, artifacts::SIMILARITIES_CSV))?;

    let report = PipelineReport {
        users: interactions.matrix.rows(),
        items: interactions.matrix.cols(),
        interactions: interactions.matrix.nnz(),
        dropped_unmatched,
        auc,
    };
    info!("pipeline complete: {report}");
    Ok(report)
}

fn out_path(config: &PipelineConfig, name: &str) -> PathBuf {
    config.data.output_dir.join(name)
}

fn write_auc(path: impl AsRef<Path>, auc: f32) -> Result<()> {
    std::fs::write(path.as_ref(), format!("{auc}\n")).map_err(|e| Error::io(path.as_ref(), e))
}
