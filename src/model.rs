//! The contract shared by all generative model variants.
//!
//! A model owns a time-conditioned network and exposes five operations:
//! training, field evaluation, single-step integration, and the two sampling
//! entry points that produce trajectory tensors for animation. The numerical
//! defaults (`step`, `sample`, `sample_from_initial_points`) are provided on
//! the trait itself; a variant only has to supply its objective (`train`),
//! its field semantics (`forward`), and its initial-distribution policy
//! (`draw_initial_points`).

use std::path::Path;

use ndarray::{Array2, Array3, ArrayView2};

use crate::net::{BurnBackend, FieldNet};
use crate::sampler::OdeSampler;
use crate::time::TimeBatch;
use crate::train::{CancelToken, TrainConfig, TrainProgress, TrainReport};
use crate::{Error, Result};

/// Network topology configuration shared by the model variants.
#[derive(Debug, Clone, Copy)]
pub struct ModelConfig {
    /// Data-space dimensionality.
    pub dim: usize,
    /// Hidden layer width of the field network.
    pub hidden: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { dim: 2, hidden: 64 }
    }
}

/// A trainable generative flow over `R^dim`.
///
/// Sampling time runs over `[0, 1]`, from the model's initial distribution at
/// `t = 0` to the data distribution at `t = 1`.
pub trait GenerativeModel {
    /// Data-space dimensionality.
    fn dim(&self) -> usize;

    /// Evaluate the model's vector field (or drift derived from its noise
    /// estimate) at a state batch `[batch, dim]` and a time batch.
    ///
    /// Both time layouts are accepted; see [`TimeBatch`]. Returns
    /// `[batch, dim]`.
    fn forward(&self, x_t: &ArrayView2<f32>, t: &TimeBatch) -> Result<Array2<f32>>;

    /// Train the model on a batch of data points `[num_points, dim]` using
    /// its own objective.
    ///
    /// `on_progress` is invoked every `cfg.update_interval` epochs with the
    /// current epoch, minibatch loss, and (when enabled) a preview sample
    /// batch for live plotting. The callback boundary is the cooperative
    /// yield point: `cancel` is polled right after each invocation and the
    /// run stops before `cfg.epochs` once it is observed set.
    fn train(
        &mut self,
        data: &ArrayView2<f32>,
        cfg: &TrainConfig,
        on_progress: &mut dyn FnMut(&TrainProgress),
        cancel: &CancelToken,
    ) -> Result<TrainReport>;

    /// Draw `num_samples` points from the model's initial distribution.
    ///
    /// The policy is the variant's to choose; it is the distribution that
    /// [`GenerativeModel::sample`] integrates away from.
    fn draw_initial_points(&self, num_samples: usize, seed: u64) -> Result<Array2<f32>>;

    /// Atomically swap the owned network (e.g. for restoring an exported
    /// model). The replacement must match the model's dimensionality.
    fn replace_network(&mut self, net: FieldNet<BurnBackend>) -> Result<()>;

    /// Export the network weights through the backend's serialization
    /// primitive.
    fn save(&self, path: &Path) -> Result<()>;

    /// Integrate one step from `t_start` to `t_end` with the midpoint
    /// method: evaluate the field at the start, half-step to estimate the
    /// midpoint state, evaluate there, and advance the full interval with
    /// the midpoint estimate.
    fn step(&self, x_t: &ArrayView2<f32>, t_start: f32, t_end: f32) -> Result<Array2<f32>> {
        OdeSampler::default().step(self, x_t, t_start, t_end)
    }

    /// Draw `num_samples` trajectories from the initial distribution.
    ///
    /// Returns `[num_total_steps, num_samples, dim]`; frame 0 is the initial
    /// points, the last frame is the integrated sample at `t = 1`.
    fn sample(&self, num_samples: usize, num_total_steps: usize, seed: u64) -> Result<Array3<f32>> {
        let x0 = self.draw_initial_points(num_samples, seed)?;
        self.sample_from_initial_points(&x0.view(), num_total_steps)
    }

    /// Like [`GenerativeModel::sample`], but integrating the caller's
    /// initial points, for reproducible or interactively seeded
    /// visualizations.
    fn sample_from_initial_points(
        &self,
        initial_points: &ArrayView2<f32>,
        num_total_steps: usize,
    ) -> Result<Array3<f32>> {
        if initial_points.ncols() != self.dim() {
            return Err(Error::Shape("initial points do not match model dim"));
        }
        OdeSampler::default().sample_from_initial_points(self, initial_points, num_total_steps)
    }
}
