//! Noise-prediction diffusion, sampled through its probability-flow drift.
//!
//! The forward (noising) process follows the trigonometric
//! variance-preserving schedule `alpha(s) = sin(pi s / 2)`,
//! `sigma(s) = cos(pi s / 2)` with `x_s = alpha(s) x1 + sigma(s) eps`, so
//! `s = 0` is pure noise and `s = 1` is data: sampling shares the forward
//! `0 -> 1` integration direction of the other variants. Training fits the
//! network to predict `eps` by MSE (denoising score matching). For sampling,
//! the noise estimate is converted to the deterministic drift
//!
//! ```text
//! v(x, s) = alpha'(s) x1_pred + sigma'(s) eps_hat,
//! x1_pred = (x - sigma(s) eps_hat) / alpha(s)
//! ```
//!
//! which is the continuous-time form of the deterministic (eta = 0) reverse
//! update. `alpha` vanishes at `s = 0`, where clean data is unidentifiable
//! from pure noise; the drift clamps `s` away from that endpoint.

use std::f32::consts::FRAC_PI_2;
use std::path::Path;

use burn_core::optim::{AdamConfig, GradientsParams, Optimizer};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::model::{GenerativeModel, ModelConfig};
use crate::net::{self, BurnBackend, FieldNet, NetDevice};
use crate::ode::{self, OdeMethod};
use crate::time::TimeBatch;
use crate::train::{self, CancelToken, ProgressGate, TrainConfig, TrainProgress, TrainReport};
use crate::{Error, Result};

/// Drift evaluations clamp `s` to `[S_FLOOR, 1]`.
const S_FLOOR: f32 = 1e-2;

fn alpha(s: f32) -> f32 {
    (FRAC_PI_2 * s).sin()
}

fn sigma(s: f32) -> f32 {
    (FRAC_PI_2 * s).cos()
}

fn d_alpha(s: f32) -> f32 {
    FRAC_PI_2 * (FRAC_PI_2 * s).cos()
}

fn d_sigma(s: f32) -> f32 {
    -FRAC_PI_2 * (FRAC_PI_2 * s).sin()
}

/// Convert a per-row noise estimate into the probability-flow drift.
fn drift_rows(
    x_s: &ArrayView2<f32>,
    t_col: &Array2<f32>,
    eps_hat: &Array2<f32>,
) -> Array2<f32> {
    let (n, d) = x_s.dim();
    let mut out = Array2::<f32>::zeros((n, d));
    for i in 0..n {
        let s = t_col[[i, 0]].clamp(S_FLOOR, 1.0);
        let (a, sg) = (alpha(s), sigma(s));
        let (da, ds) = (d_alpha(s), d_sigma(s));
        for k in 0..d {
            let x1_pred = (x_s[[i, k]] - sg * eps_hat[[i, k]]) / a;
            out[[i, k]] = da * x1_pred + ds * eps_hat[[i, k]];
        }
    }
    out
}

/// A diffusion model over `R^dim` with a standard-normal prior (which is
/// exactly the `s = 0` marginal of the noising process).
pub struct DiffusionModel {
    net: FieldNet<BurnBackend>,
    device: NetDevice,
    dim: usize,
}

impl DiffusionModel {
    pub fn new(cfg: &ModelConfig) -> Self {
        let device = NetDevice::default();
        let net = FieldNet::new(&device, cfg.dim, cfg.hidden);
        Self {
            net,
            device,
            dim: cfg.dim,
        }
    }

    /// Restore previously exported weights into this model's topology.
    pub fn load_weights(&mut self, path: &Path) -> Result<()> {
        self.net = FieldNet::load(&self.device, self.dim, self.net.hidden(), path)?;
        Ok(())
    }
}

fn drift_field(
    net: &FieldNet<BurnBackend>,
    device: &NetDevice,
    x: &ArrayView2<f32>,
    t: f32,
) -> Result<Array2<f32>> {
    let t_col = Array2::from_elem((x.nrows(), 1), t);
    let eps_hat = net::eval_on_arrays(net, device, x, &t_col)?;
    Ok(drift_rows(x, &t_col, &eps_hat))
}

fn preview_batch(
    net: &FieldNet<BurnBackend>,
    device: &NetDevice,
    dim: usize,
    cfg: &TrainConfig,
    epoch: usize,
) -> Result<Array2<f32>> {
    let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed.wrapping_add(epoch as u64));
    let x0 = train::standard_normal(cfg.preview_samples, dim, &mut rng);
    let traj = ode::integrate_path(
        OdeMethod::Midpoint,
        &x0.view(),
        0.0,
        1.0,
        cfg.preview_steps,
        |x, t| drift_field(net, device, x, t),
    )?;
    Ok(traj.index_axis(Axis(0), cfg.preview_steps - 1).to_owned())
}

impl GenerativeModel for DiffusionModel {
    fn dim(&self) -> usize {
        self.dim
    }

    /// The probability-flow drift derived from the network's noise estimate.
    fn forward(&self, x_t: &ArrayView2<f32>, t: &TimeBatch) -> Result<Array2<f32>> {
        if x_t.ncols() != self.dim {
            return Err(Error::Shape("state batch does not match model dim"));
        }
        if t.len() != x_t.nrows() {
            return Err(Error::Shape("time batch length does not match state batch"));
        }
        let t_col = t.to_column()?;
        let eps_hat = net::eval_on_arrays(&self.net, &self.device, x_t, &t_col)?;
        Ok(drift_rows(x_t, &t_col, &eps_hat))
    }

    fn train(
        &mut self,
        data: &ArrayView2<f32>,
        cfg: &TrainConfig,
        on_progress: &mut dyn FnMut(&TrainProgress),
        cancel: &CancelToken,
    ) -> Result<TrainReport> {
        if data.nrows() == 0 {
            return Err(Error::Domain("training data must be non-empty"));
        }
        if data.ncols() != self.dim {
            return Err(Error::Shape("training data does not match model dim"));
        }
        cfg.validate()?;
        let gate = ProgressGate::new(cfg.update_interval)?;

        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
        let mut net = self.net.clone();
        let mut optim = AdamConfig::new().init::<BurnBackend, FieldNet<BurnBackend>>();

        let mut last_loss = 0.0f32;
        let mut cancelled = false;
        let mut epochs_run = 0usize;

        for epoch in 0..cfg.epochs {
            let x1 = train::minibatch(data, cfg.batch_size, &mut rng);
            let bs = x1.nrows();
            let eps = train::standard_normal(bs, self.dim, &mut rng);

            let mut ts = Array1::<f32>::zeros(bs);
            let mut xs = Array2::<f32>::zeros((bs, self.dim));
            for i in 0..bs {
                let s: f32 = rng.random();
                ts[i] = s;
                let (a, sg) = (alpha(s), sigma(s));
                for k in 0..self.dim {
                    xs[[i, k]] = a * x1[[i, k]] + sg * eps[[i, k]];
                }
            }

            let x_s = net::ndarray_to_tensor::<BurnBackend>(&self.device, &xs.view());
            let t_b = net::flat_to_tensor_column::<BurnBackend>(&self.device, &ts);
            let eps_b = net::ndarray_to_tensor::<BurnBackend>(&self.device, &eps.view());

            let pred = net.forward(x_s, t_b);
            let loss = (pred - eps_b).powf_scalar(2.0).mean();
            last_loss = loss.clone().into_scalar();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &net);
            net = optim.step(cfg.lr, net, grads);

            epochs_run = epoch + 1;

            if gate.fires(epoch) {
                debug!(epoch, loss = last_loss, "diffusion progress");
                let preview = if cfg.preview_samples > 0 {
                    Some(preview_batch(&net, &self.device, self.dim, cfg, epoch)?)
                } else {
                    None
                };
                on_progress(&TrainProgress {
                    epoch,
                    loss: last_loss,
                    preview,
                });
                if cancel.is_cancelled() {
                    cancelled = true;
                    break;
                }
            }
        }

        self.net = net;
        Ok(TrainReport {
            epochs_run,
            final_loss: last_loss,
            cancelled,
        })
    }

    fn draw_initial_points(&self, num_samples: usize, seed: u64) -> Result<Array2<f32>> {
        if num_samples == 0 {
            return Err(Error::Domain("num_samples must be >= 1"));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Ok(train::standard_normal(num_samples, self.dim, &mut rng))
    }

    fn replace_network(&mut self, net: FieldNet<BurnBackend>) -> Result<()> {
        if net.dim() != self.dim {
            return Err(Error::Shape("replacement network does not match model dim"));
        }
        self.net = net;
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<()> {
        self.net.save(path)
    }
}
