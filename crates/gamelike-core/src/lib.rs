//! # gamelike-core
//!
//! Batch pipeline turning raw game-ownership records into an item-item
//! similarity matrix that serves "games like this" recommendations.
//!
//! The stages, leaf to root: record normalization ([`catalog`]), chunked
//! sparse-matrix construction ([`interaction`]), latent-factor training
//! and ranking evaluation ([`model`]), and cosine-similarity derivation
//! ([`similarity`]). [`pipeline::run`] drives them in order from a
//! [`config::PipelineConfig`].
//!
//! ## Quick start
//!
//! ```
//! use gamelike_core::catalog::OwnershipEvent;
//! use gamelike_core::interaction::Assembler;
//! use gamelike_core::model::{train, Hyperparams};
//! use gamelike_core::similarity::derive;
//!
//! fn main() -> gamelike_core::Result<()> {
//!     let rows = vec![
//!         OwnershipEvent { user: 0, item: 10, owned: 1.0 },
//!         OwnershipEvent { user: 0, item: 20, owned: 1.0 },
//!         OwnershipEvent { user: 1, item: 10, owned: 1.0 },
//!     ];
//!
//!     let interactions = Assembler::new(500).assemble(&rows)?;
//!     let embeddings = train(&interactions.matrix, &Hyperparams::default())?;
//!     let similarity = derive(embeddings.item_factors(), &interactions.item_ids)?;
//!
//!     let like_10 = similarity.top_k(10, 5)?;
//!     assert_eq!(like_10.len(), 1); // only item 20 remains after the self-match
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod catalog;
#[cfg(test)]
mod catalog_tests;
pub mod config;
#[cfg(test)]
mod config_tests;
pub mod error;
#[cfg(test)]
mod error_tests;
pub mod interaction;
#[cfg(test)]
mod interaction_tests;
pub mod matrix;
pub mod model;
pub mod pipeline;
pub mod similarity;
#[cfg(test)]
mod similarity_tests;
pub mod source;

pub use catalog::{Catalog, ItemId, OwnershipEvent};
pub use config::{ConfigError, PipelineConfig};
pub use error::{Error, Result};
pub use interaction::{Assembler, Interactions};
pub use matrix::{CsrMatrix, DenseMatrix};
pub use model::{auc_score, evaluate, train, Embeddings, Hyperparams, Loss};
pub use pipeline::{run, PipelineReport};
pub use similarity::{derive, SimilarityMatrix};
