//! Conditional flow matching over the linear interpolation path.
//!
//! Training regresses the field network toward the straight-line velocity:
//! sample a data point `x1`, base noise `x0 ~ N(0, I)` and `t ~ U[0, 1]`,
//! form `x_t = (1 - t) x0 + t x1`, and fit `v(x_t, t)` to the target
//! `u = x1 - x0` by MSE. Sampling integrates the learned field from the
//! standard-normal prior at `t = 0` to the data distribution at `t = 1`.

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

/// A flow-matching model over `R^dim` with a standard-normal prior.
pub struct FlowMatchingModel {
    net: FieldNet<BurnBackend>,
    device: NetDevice,
    dim: usize,
}

impl FlowMatchingModel {
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

fn velocity(
    net: &FieldNet<BurnBackend>,
    device: &NetDevice,
    x: &ArrayView2<f32>,
    t: f32,
) -> Result<Array2<f32>> {
    let t_col = Array2::from_elem((x.nrows(), 1), t);
    net::eval_on_arrays(net, device, x, &t_col)
}

/// Integrate the in-training network into a preview batch for live plotting.
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
        |x, t| velocity(net, device, x, t),
    )?;
    Ok(traj.index_axis(Axis(0), cfg.preview_steps - 1).to_owned())
}

impl GenerativeModel for FlowMatchingModel {
    fn dim(&self) -> usize {
        self.dim
    }

    fn forward(&self, x_t: &ArrayView2<f32>, t: &TimeBatch) -> Result<Array2<f32>> {
        if x_t.ncols() != self.dim {
            return Err(Error::Shape("state batch does not match model dim"));
        }
        if t.len() != x_t.nrows() {
            return Err(Error::Shape("time batch length does not match state batch"));
        }
        let t_col = t.to_column()?;
        net::eval_on_arrays(&self.net, &self.device, x_t, &t_col)
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
            let x0 = train::standard_normal(bs, self.dim, &mut rng);

            let mut ts = Array1::<f32>::zeros(bs);
            let mut xt = Array2::<f32>::zeros((bs, self.dim));
            let mut u = Array2::<f32>::zeros((bs, self.dim));
            for i in 0..bs {
                let t: f32 = rng.random();
                ts[i] = t;
                for k in 0..self.dim {
                    xt[[i, k]] = (1.0 - t) * x0[[i, k]] + t * x1[[i, k]];
                    u[[i, k]] = x1[[i, k]] - x0[[i, k]];
                }
            }

            let x_t = net::ndarray_to_tensor::<BurnBackend>(&self.device, &xt.view());
            let t_b = net::flat_to_tensor_column::<BurnBackend>(&self.device, &ts);
            let u_b = net::ndarray_to_tensor::<BurnBackend>(&self.device, &u.view());

            let pred = net.forward(x_t, t_b);
            let loss = (pred - u_b).powf_scalar(2.0).mean();
            last_loss = loss.clone().into_scalar();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &net);
            net = optim.step(cfg.lr, net, grads);

            epochs_run = epoch + 1;

            if gate.fires(epoch) {
                debug!(epoch, loss = last_loss, "flow matching progress");
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
