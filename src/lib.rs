//! # flowscope
//!
//! Trainable generative models (flow matching, score-based diffusion) for
//! interactive, low-dimensional visualization.
//!
//! This crate is intentionally small:
//!
//! - it implements **training loops** with live progress callbacks and
//!   cooperative cancellation, designed to interleave with a UI event loop,
//! - it implements **vector-field evaluation** and **fixed-step ODE sampling**
//!   that records full trajectories for animation,
//! - it does not provide a UI, a dataset pipeline, or an experiment runner
//!   (those belong to the embedding application).
//!
//! ## Public invariants (must not change)
//!
//! - **Determinism knobs are explicit**: training and sampling entry points
//!   take a `seed` (or a config does). For a given model instance, identical
//!   seeds reproduce identical minibatch streams and trajectories. Network
//!   weight initialization is the backend's randomness, not ours.
//! - **ndarray-first public surface**: states are `Array2<f32>` batches of
//!   shape `[batch, dim]`, trajectories are `Array3<f32>` of shape
//!   `[frames, batch, dim]`. The `burn` network backend stays behind
//!   [`net::FieldNet`] and the [`model::GenerativeModel::replace_network`]
//!   seam.
//! - **Trajectory frames span the closed interval**: frame 0 of a sampled
//!   trajectory is exactly the initial points, the last frame is the fully
//!   integrated sample, and a single-frame trajectory is the initial points
//!   unchanged.
//! - **Cancellation is cooperative**: training polls its [`train::CancelToken`]
//!   at each progress interval; the progress callback is the yield point.
//!
//! ## Module map
//!
//! - `model`: the [`model::GenerativeModel`] contract (train / forward / step /
//!   sample / sample_from_initial_points) shared by all variants
//! - `flow_matching`: conditional flow matching over a linear path
//! - `diffusion`: noise-prediction diffusion sampled via its probability-flow
//!   drift
//! - `net`: the time-conditioned feed-forward field network (burn backend)
//! - `ode`: fixed-step ODE integrators used for sampling (`Euler`, `Midpoint`,
//!   `Heun`) and trajectory accumulation
//! - `sampler`: model-independent sampling strategy (integrator + interval)
//! - `train`: training configuration, progress reporting, cancellation
//! - `time`: the dual flat/column time-batch representation and its
//!   canonical form

pub mod diffusion;
pub mod flow_matching;
pub mod model;
pub mod net;
pub mod ode;
pub mod sampler;
pub mod time;
pub mod train;

/// flowscope error variants.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("shape mismatch: {0}")]
    Shape(&'static str),
    #[error("domain error: {0}")]
    Domain(&'static str),
    #[error("model serialization failed: {0}")]
    Record(String),
}

pub type Result<T> = std::result::Result<T, Error>;
