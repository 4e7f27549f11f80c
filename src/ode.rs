//! Minimal fixed-step ODE integrators for sampling generative flows.
//!
//! Sampling integrates
//! \[
//! \frac{dx}{dt} = v(x,t)
//! \]
//! over a batch of states at once. We keep this module tiny and
//! deterministic: no adaptive stepping, no hidden tolerances.
//!
//! The midpoint rule is the contract every model's `step` honors; `Euler` and
//! `Heun` exist so the sampler can trade accuracy for field evaluations.

use ndarray::{Array2, Array3, ArrayView2, Axis};

use crate::{Error, Result};

/// Fixed-step ODE method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OdeMethod {
    /// Explicit Euler (1st order).
    Euler,
    /// Explicit midpoint (2nd order): half step, re-evaluate, full step.
    Midpoint,
    /// Heun / explicit trapezoid (2nd order).
    Heun,
}

/// Advance a batch of states `[batch, dim]` from `t_start` to `t_end` in one
/// fixed step.
///
/// `f` returns the field `v(x, t)` for a state batch at a shared scalar time.
/// Errors from `f` propagate unchanged.
pub fn step_fixed(
    method: OdeMethod,
    x: &ArrayView2<f32>,
    t_start: f32,
    t_end: f32,
    f: &mut impl FnMut(&ArrayView2<f32>, f32) -> Result<Array2<f32>>,
) -> Result<Array2<f32>> {
    if !t_start.is_finite() || !t_end.is_finite() {
        return Err(Error::Domain("step endpoints must be finite"));
    }
    let dt = t_end - t_start;

    match method {
        OdeMethod::Euler => {
            let v = f(x, t_start)?;
            Ok(x.to_owned() + &v * dt)
        }
        OdeMethod::Midpoint => {
            let v0 = f(x, t_start)?;
            let x_mid = x.to_owned() + &v0 * (0.5 * dt);
            let t_mid = t_start + 0.5 * dt;
            let v_mid = f(&x_mid.view(), t_mid)?;
            Ok(x.to_owned() + &v_mid * dt)
        }
        OdeMethod::Heun => {
            let v0 = f(x, t_start)?;
            let x_pred = x.to_owned() + &v0 * dt;
            let v1 = f(&x_pred.view(), t_end)?;
            Ok(x.to_owned() + (v0 + v1) * (0.5 * dt))
        }
    }
}

/// Integrate a batch of states over `[t_start, t_end]`, recording the
/// trajectory.
///
/// Returns `[num_frames, batch, dim]`. Frame `k` is the state at
/// `t_start + k * (t_end - t_start) / (num_frames - 1)`: frame 0 is exactly
/// `x0`, the last frame is the state at `t_end`, and `num_frames - 1` steps
/// are taken in between. `num_frames == 1` records the initial states
/// unchanged without evaluating the field.
pub fn integrate_path(
    method: OdeMethod,
    x0: &ArrayView2<f32>,
    t_start: f32,
    t_end: f32,
    num_frames: usize,
    mut f: impl FnMut(&ArrayView2<f32>, f32) -> Result<Array2<f32>>,
) -> Result<Array3<f32>> {
    if num_frames == 0 {
        return Err(Error::Domain("num_frames must be >= 1"));
    }
    if !t_start.is_finite() || !t_end.is_finite() {
        return Err(Error::Domain("integration endpoints must be finite"));
    }

    let (n, d) = x0.dim();
    let mut traj = Array3::<f32>::zeros((num_frames, n, d));
    traj.index_axis_mut(Axis(0), 0).assign(x0);

    if num_frames == 1 {
        return Ok(traj);
    }

    let dt = (t_end - t_start) / ((num_frames - 1) as f32);
    let mut x = x0.to_owned();
    for k in 0..num_frames - 1 {
        let t0 = t_start + (k as f32) * dt;
        x = step_fixed(method, &x.view(), t0, t0 + dt, &mut f)?;
        traj.index_axis_mut(Axis(0), k + 1).assign(&x);
    }

    Ok(traj)
}
