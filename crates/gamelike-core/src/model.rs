//! Latent-factor model training and ranking evaluation.
//!
//! A seeded mini-batch SGD factorizer over the sparse interaction matrix.
//! Gradient computation is embarrassingly parallel per user and runs on a
//! bounded rayon pool sized by the `threads` hyperparameter; updates are
//! applied sequentially in user order, so the result depends only on the
//! seed, never on the thread count. Evaluation and full training are
//! independent entry points: [`evaluate`] never feeds back into the
//! production [`train`] call.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::matrix::{check_dense_budget, CsrMatrix, DenseMatrix};

/// Users per gradient batch. Within a batch, per-user gradients are
/// computed against a frozen snapshot of the factors.
const BATCH_USERS: usize = 256;

/// Loss function for the factorizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Loss {
    /// Bayesian personalized ranking: optimizes the order of a positive
    /// item against a sampled negative. The ranking-oriented choice.
    Bpr,
    /// Logistic loss over observed positives and sampled negatives.
    Logistic,
}

/// Training hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparams {
    /// Embedding dimensionality.
    pub factors: usize,
    /// Loss function.
    pub loss: Loss,
    /// Passes over the interaction matrix.
    pub epochs: usize,
    /// SGD step size.
    pub learning_rate: f32,
    /// L2 penalty applied to every touched factor.
    pub regularization: f32,
    /// Parallelism degree for gradient computation.
    pub threads: usize,
    /// Random seed; a fixed seed makes training deterministic.
    pub seed: u64,
}

impl Default for Hyperparams {
    fn default() -> Self {
        Self {
            factors: 30,
            loss: Loss::Bpr,
            epochs: 20,
            learning_rate: 0.05,
            regularization: 0.0,
            threads: 1,
            seed: 42,
        }
    }
}

impl Hyperparams {
    fn validate(&self) -> Result<()> {
        if self.factors == 0 {
            return Err(Error::TypeConstraint("factors must be at least 1".into()));
        }
        if self.threads == 0 {
            return Err(Error::TypeConstraint("threads must be at least 1".into()));
        }
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(Error::TypeConstraint(
                "learning rate must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Learned latent factors: one dense vector per user row and one per item
/// column of the interaction matrix.
#[derive(Debug, Clone)]
pub struct Embeddings {
    user_factors: DenseMatrix,
    item_factors: DenseMatrix,
}

impl Embeddings {
    /// Bundles user and item factor matrices.
    ///
    /// # Errors
    ///
    /// [`Error::TypeConstraint`] when the two matrices disagree on the
    /// embedding dimensionality.
    pub fn new(user_factors: DenseMatrix, item_factors: DenseMatrix) -> Result<Self> {
        if user_factors.cols() != item_factors.cols() {
            return Err(Error::TypeConstraint(format!(
                "user factors have {} dimensions, item factors {}",
                user_factors.cols(),
                item_factors.cols()
            )));
        }
        Ok(Self {
            user_factors,
            item_factors,
        })
    }

    /// Item embedding matrix: row *i* corresponds to interaction-matrix
    /// column *i*.
    #[must_use]
    pub fn item_factors(&self) -> &DenseMatrix {
        &self.item_factors
    }

    /// User embedding matrix: row *u* corresponds to interaction-matrix
    /// row *u*.
    #[must_use]
    pub fn user_factors(&self) -> &DenseMatrix {
        &self.user_factors
    }

    /// Predicted affinity of user `u` for item `i`.
    ///
    /// # Panics
    ///
    /// Panics when either index is out of range.
    #[must_use]
    pub fn score(&self, u: usize, i: usize) -> f32 {
        dot(self.user_factors.row(u), self.item_factors.row(i))
    }
}

/// Per-user gradient contribution, scaled by the learning rate.
struct UserUpdate {
    user: usize,
    user_delta: Vec<f32>,
    item_deltas: Vec<(usize, Vec<f32>)>,
}

/// Fits the factorization model on the full sparse matrix.
///
/// Deterministic for a fixed `hp.seed` regardless of `hp.threads`.
pub fn train(matrix: &CsrMatrix, hp: &Hyperparams) -> Result<Embeddings> {
    hp.validate()?;
    debug!(
        "training factorizer: {} factors, {:?} loss, {} epochs, seed {}",
        hp.factors, hp.loss, hp.epochs, hp.seed
    );

    let k = hp.factors;
    let mut user_factors = init_factors(matrix.rows(), k, hp.seed);
    let mut item_factors = init_factors(matrix.cols(), k, hp.seed.wrapping_add(1));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(hp.threads)
        .build()
        .map_err(Error::other)?;

    for epoch in 0..hp.epochs {
        let mut start = 0;
        while start < matrix.rows() {
            let end = usize::min(start + BATCH_USERS, matrix.rows());
            let updates: Vec<UserUpdate> = pool.install(|| {
                (start..end)
                    .into_par_iter()
                    .filter_map(|u| user_update(matrix, &user_factors, &item_factors, u, epoch, hp))
                    .collect()
            });
            // Applied in user order so the outcome is independent of how
            // the pool scheduled the batch.
            for update in updates {
                add_assign(user_factors.row_mut(update.user), &update.user_delta);
                for (item, delta) in update.item_deltas {
                    add_assign(item_factors.row_mut(item), &delta);
                }
            }
            start = end;
        }
        debug!("epoch {} of {} complete", epoch + 1, hp.epochs);
    }

    Embeddings::new(user_factors, item_factors)
}

/// Splits the matrix, trains on the train partition, and scores ranking
/// quality (AUC) on the padded held-out partition.
///
/// The matrix is first subsampled to `1 / splits_divisor` of its rows as a
/// memory guard; the subsample must fit the dense `budget` or the call
/// fails with [`Error::ResourceExhausted`], in which case the caller must
/// rerun with a larger divisor. Rows are split at
/// `floor(train_fraction * rows)`; the test partition is padded with zero
/// rows at its head up to the train partition's height, so both partitions
/// share one user-id space.
///
/// # Errors
///
/// [`Error::TypeConstraint`] when `splits_divisor` is 0 or
/// `train_fraction` lies outside `[0.5, 1.0)` (a smaller fraction would
/// make the test partition taller than the train partition, which the
/// padding scheme cannot represent).
pub fn evaluate(
    matrix: &CsrMatrix,
    train_fraction: f32,
    splits_divisor: usize,
    hp: &Hyperparams,
    budget: u64,
) -> Result<f32> {
    if splits_divisor == 0 {
        return Err(Error::TypeConstraint(
            "splits divisor must be at least 1".into(),
        ));
    }
    if !(0.5..1.0).contains(&train_fraction) {
        return Err(Error::TypeConstraint(format!(
            "train fraction must lie in [0.5, 1.0), got {train_fraction}"
        )));
    }

    let sub_rows = matrix.rows() / splits_divisor;
    let sub = matrix.slice_rows(0..sub_rows);

    // The held-out partition is scored row by row against every item, the
    // dense-equivalent working set; the budget is checked up front so an
    // oversized subsample fails before any training happens.
    check_dense_budget(
        sub.rows(),
        sub.cols(),
        budget,
        "increase the splits divisor",
    )?;

    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let train_cut = (f64::from(train_fraction) * sub_rows as f64).floor() as usize;
    let held_out = sub_rows - train_cut;
    if held_out > train_cut {
        // Flooring the cut can leave the held-out side taller than the
        // train side on small subsamples, which the padding scheme cannot
        // represent.
        return Err(Error::TypeConstraint(format!(
            "train partition ({train_cut} rows) is smaller than the held-out \
             partition ({held_out} rows); increase train_fraction or reduce \
             the splits divisor"
        )));
    }

    let train_partition = sub.slice_rows(0..train_cut);
    let mut test_partition = CsrMatrix::with_columns(sub.cols());
    for _ in 0..train_cut - held_out {
        test_partition.push_row(&[])?;
    }
    test_partition.vstack(&sub.slice_rows(train_cut..sub_rows))?;

    debug!(
        "evaluation split: {} train rows, {} held-out rows ({} zero-padded)",
        train_cut,
        held_out,
        train_cut - held_out
    );

    let model = train(&train_partition, hp)?;
    Ok(auc_score(&model, &test_partition))
}

/// Mean per-user AUC of the model's item ranking over `test`.
///
/// Row *u* of `test` is scored with user factor *u*; users without a
/// positive (including pad rows) or without a negative are skipped. When
/// no user is scorable the result is 0.5 (chance level) with a warning.
#[must_use]
pub fn auc_score(model: &Embeddings, test: &CsrMatrix) -> f32 {
    let mut total = 0.0_f64;
    let mut counted = 0_usize;

    for u in 0..usize::min(test.rows(), model.user_factors().rows()) {
        let (positives, _) = test.row(u);
        if positives.is_empty() || positives.len() == test.cols() {
            continue;
        }

        let mut pos_scores = Vec::with_capacity(positives.len());
        let mut neg_scores = Vec::with_capacity(test.cols() - positives.len());
        for i in 0..test.cols() {
            let score = model.score(u, i);
            if positives.binary_search(&i).is_ok() {
                pos_scores.push(score);
            } else {
                neg_scores.push(score);
            }
        }
        total += pairwise_auc(&mut pos_scores, &mut neg_scores);
        counted += 1;
    }

    if counted == 0 {
        warn!("no scorable users in the test partition, reporting chance-level auc");
        return 0.5;
    }
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let mean = (total / counted as f64) as f32;
    mean
}

/// Fraction of (positive, negative) pairs ranked correctly, ties at 0.5.
fn pairwise_auc(pos: &mut [f32], neg: &mut [f32]) -> f64 {
    pos.sort_unstable_by(f32::total_cmp);
    neg.sort_unstable_by(f32::total_cmp);

    let mut correct = 0.0_f64;
    for &p in pos.iter() {
        let below = neg.partition_point(|&n| n < p);
        let not_above = neg.partition_point(|&n| n <= p);
        #[allow(clippy::cast_precision_loss)]
        {
            correct += below as f64 + 0.5 * (not_above - below) as f64;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    {
        correct / (pos.len() as f64 * neg.len() as f64)
    }
}

fn init_factors(rows: usize, k: usize, seed: u64) -> DenseMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    #[allow(clippy::cast_precision_loss)]
    let scale = 1.0 / (k as f32).sqrt();
    let mut factors = DenseMatrix::zeros(rows, k);
    for i in 0..rows {
        for j in 0..k {
            factors.set(i, j, rng.gen_range(-scale..scale));
        }
    }
    factors
}

/// Gradients for one user's positives, computed against a frozen factor
/// snapshot. Pure in its inputs, so batches parallelize freely.
fn user_update(
    matrix: &CsrMatrix,
    user_factors: &DenseMatrix,
    item_factors: &DenseMatrix,
    u: usize,
    epoch: usize,
    hp: &Hyperparams,
) -> Option<UserUpdate> {
    let (positives, _) = matrix.row(u);
    if positives.is_empty() {
        return None;
    }

    // Per-(epoch, user) stream: the sampled negatives do not depend on
    // scheduling order.
    let mut rng = StdRng::seed_from_u64(
        hp.seed ^ (epoch as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
            ^ (u as u64).wrapping_mul(0xbf58_476d_1ce4_e5b9),
    );

    let k = hp.factors;
    let lr = hp.learning_rate;
    let reg = hp.regularization;
    let user_vec = user_factors.row(u);
    let mut user_delta = vec![0.0_f32; k];
    let mut item_deltas: Vec<(usize, Vec<f32>)> = Vec::with_capacity(positives.len() * 2);

    for &pos in positives {
        let negative = sample_negative(&mut rng, positives, matrix.cols());
        let pos_vec = item_factors.row(pos);

        match hp.loss {
            Loss::Bpr => {
                let Some(neg) = negative else { continue };
                let neg_vec = item_factors.row(neg);
                let x = dot(user_vec, pos_vec) - dot(user_vec, neg_vec);
                let g = sigmoid(-x);

                let mut pos_delta = vec![0.0_f32; k];
                let mut neg_delta = vec![0.0_f32; k];
                for f in 0..k {
                    user_delta[f] += lr * (g * (pos_vec[f] - neg_vec[f]) - reg * user_vec[f]);
                    pos_delta[f] = lr * (g * user_vec[f] - reg * pos_vec[f]);
                    neg_delta[f] = lr * (-g * user_vec[f] - reg * neg_vec[f]);
                }
                item_deltas.push((pos, pos_delta));
                item_deltas.push((neg, neg_delta));
            }
            Loss::Logistic => {
                let g_pos = 1.0 - sigmoid(dot(user_vec, pos_vec));
                let mut pos_delta = vec![0.0_f32; k];
                for f in 0..k {
                    user_delta[f] += lr * (g_pos * pos_vec[f] - reg * user_vec[f]);
                    pos_delta[f] = lr * (g_pos * user_vec[f] - reg * pos_vec[f]);
                }
                item_deltas.push((pos, pos_delta));

                if let Some(neg) = negative {
                    let neg_vec = item_factors.row(neg);
                    let g_neg = -sigmoid(dot(user_vec, neg_vec));
                    let mut neg_delta = vec![0.0_f32; k];
                    for f in 0..k {
                        user_delta[f] += lr * g_neg * neg_vec[f];
                        neg_delta[f] = lr * (g_neg * user_vec[f] - reg * neg_vec[f]);
                    }
                    item_deltas.push((neg, neg_delta));
                }
            }
        }
    }

    Some(UserUpdate {
        user: u,
        user_delta,
        item_deltas,
    })
}

/// Samples an item the user has not interacted with. Gives up after a few
/// attempts when positives dominate the column space.
fn sample_negative(rng: &mut StdRng, positives: &[usize], cols: usize) -> Option<usize> {
    if positives.len() >= cols {
        return None;
    }
    for _ in 0..4 {
        let candidate = rng.gen_range(0..cols);
        if positives.binary_search(&candidate).is_err() {
            return Some(candidate);
        }
    }
    None
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn add_assign(target: &mut [f32], delta: &[f32]) {
    for (t, d) in target.iter_mut().zip(delta) {
        *t += d;
    }
}
