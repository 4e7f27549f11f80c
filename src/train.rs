//! Training-loop control: configuration, progress reporting, cooperative
//! cancellation.
//!
//! The loops themselves live with each model (the objective differs); this
//! module owns everything they share. Scheduling is single-threaded and
//! cooperative: the progress callback is the yield point, and the cancel
//! token is polled right after each callback fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ndarray::{Array2, ArrayView2};
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::{Error, Result};

/// Training configuration shared by all model variants.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Number of epochs; each epoch takes one optimizer step on a fresh
    /// minibatch.
    pub epochs: usize,
    /// Minibatch size (clamped to the dataset size).
    pub batch_size: usize,
    /// Progress callback cadence, in epochs.
    pub update_interval: usize,
    /// Adam learning rate.
    pub lr: f64,
    /// RNG seed for minibatch draws, noise, and time sampling.
    pub seed: u64,
    /// Samples to draw for each progress preview (0 disables previews).
    pub preview_samples: usize,
    /// Integration frames used when drawing preview samples.
    pub preview_steps: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 1_000,
            batch_size: 32,
            update_interval: 50,
            lr: 1e-3,
            seed: 123,
            preview_samples: 256,
            preview_steps: 32,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Domain("batch_size must be >= 1"));
        }
        if self.update_interval == 0 {
            return Err(Error::Domain("update_interval must be >= 1"));
        }
        if !(self.lr > 0.0) || !self.lr.is_finite() {
            return Err(Error::Domain("lr must be positive and finite"));
        }
        if self.preview_samples > 0 && self.preview_steps == 0 {
            return Err(Error::Domain("preview_steps must be >= 1"));
        }
        Ok(())
    }
}

/// Snapshot handed to the progress callback at each reporting interval.
#[derive(Debug, Clone)]
pub struct TrainProgress {
    /// Zero-based epoch the snapshot was taken at.
    pub epoch: usize,
    /// Minibatch loss at that epoch.
    pub loss: f32,
    /// Intermediate samples `[preview_samples, dim]` for live plotting, if
    /// previews are enabled.
    pub preview: Option<Array2<f32>>,
}

/// Summary of a completed (or cancelled) training run.
#[derive(Debug, Clone)]
pub struct TrainReport {
    /// Epochs actually executed.
    pub epochs_run: usize,
    /// Loss of the last executed epoch (0.0 if no epoch ran).
    pub final_loss: f32,
    /// Whether the run stopped early through the cancel token.
    pub cancelled: bool,
}

/// Shared cancellation flag, polled at each reporting interval.
///
/// Clone the token and hand one side to the UI; setting it stops training at
/// the next interval boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Interval arithmetic for progress reporting.
///
/// Fires on epochs `interval - 1, 2*interval - 1, ...`, i.e. exactly
/// `floor(epochs / interval)` times over a run of `epochs` epochs, and never
/// when `epochs < interval`.
#[derive(Debug, Clone, Copy)]
pub struct ProgressGate {
    interval: usize,
}

impl ProgressGate {
    pub fn new(interval: usize) -> Result<Self> {
        if interval == 0 {
            return Err(Error::Domain("update_interval must be >= 1"));
        }
        Ok(Self { interval })
    }

    /// Whether the gate fires after epoch `epoch` (zero-based) completes.
    pub fn fires(&self, epoch: usize) -> bool {
        (epoch + 1) % self.interval == 0
    }

    /// Total firings over a run of `epochs` epochs.
    pub fn count(&self, epochs: usize) -> usize {
        epochs / self.interval
    }
}

/// Draw a minibatch of rows from `data` without replacement.
///
/// When `batch_size >= data.nrows()` the whole dataset is used as-is.
pub(crate) fn minibatch(
    data: &ArrayView2<f32>,
    batch_size: usize,
    rng: &mut ChaCha8Rng,
) -> Array2<f32> {
    let n = data.nrows();
    let d = data.ncols();
    if batch_size >= n {
        return data.to_owned();
    }

    let mut out = Array2::<f32>::zeros((batch_size, d));
    for (bi, i) in index::sample(rng, n, batch_size).into_iter().enumerate() {
        out.row_mut(bi).assign(&data.row(i));
    }
    out
}

/// Standard-normal batch `[n, d]` from an explicit RNG.
pub(crate) fn standard_normal(n: usize, d: usize, rng: &mut ChaCha8Rng) -> Array2<f32> {
    let mut out = Array2::<f32>::zeros((n, d));
    for i in 0..n {
        for k in 0..d {
            out[[i, k]] = StandardNormal.sample(rng);
        }
    }
    out
}
