use flowscope::flow_matching::FlowMatchingModel;
use flowscope::model::{GenerativeModel, ModelConfig};
use flowscope::train::{CancelToken, TrainConfig};
use ndarray::{Array2, Array3, ArrayView2, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

/// A tight cluster around `center` with spread `std`.
fn cluster(n: usize, center: [f32; 2], std: f32, seed: u64) -> Array2<f32> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut out = Array2::<f32>::zeros((n, 2));
    for i in 0..n {
        for k in 0..2 {
            let z: f32 = StandardNormal.sample(&mut rng);
            out[[i, k]] = center[k] + std * z;
        }
    }
    out
}

fn mean_dist_to(points: &ArrayView2<f32>, center: [f32; 2]) -> f32 {
    let n = points.nrows();
    let mut s = 0.0f64;
    for i in 0..n {
        let dx = (points[[i, 0]] - center[0]) as f64;
        let dy = (points[[i, 1]] - center[1]) as f64;
        s += (dx * dx + dy * dy).sqrt();
    }
    (s / n as f64) as f32
}

fn mean_sq_diff(a: &Array3<f32>, b: &Array3<f32>, frame_a: usize, frame_b: usize) -> f32 {
    let fa = a.index_axis(Axis(0), frame_a);
    let fb = b.index_axis(Axis(0), frame_b);
    let mut s = 0.0f64;
    for (x, y) in fa.iter().zip(fb.iter()) {
        let d = (*x as f64) - (*y as f64);
        s += d * d;
    }
    (s / fa.len() as f64) as f32
}

#[test]
fn training_moves_samples_toward_the_data() {
    let center = [2.0f32, 0.0];
    let data = cluster(128, center, 0.1, 11);

    let mut model = FlowMatchingModel::new(&ModelConfig { dim: 2, hidden: 32 });
    let cfg = TrainConfig {
        epochs: 600,
        batch_size: 32,
        update_interval: 100,
        lr: 2e-3,
        seed: 7,
        preview_samples: 0,
        ..TrainConfig::default()
    };

    let report = model
        .train(&data.view(), &cfg, &mut |_p| {}, &CancelToken::new())
        .unwrap();
    assert_eq!(report.epochs_run, 600);

    let steps = 32usize;
    let traj = model.sample(256, steps, 99).unwrap();
    assert_eq!(traj.dim(), (steps, 256, 2));
    assert!(traj.iter().all(|v| v.is_finite()), "trajectory contains NaN");

    let initial = traj.index_axis(Axis(0), 0);
    let last = traj.index_axis(Axis(0), steps - 1);
    let before = mean_dist_to(&initial, center);
    let after = mean_dist_to(&last, center);
    assert!(
        after < before,
        "integrated samples did not move toward the data: before={before} after={after}"
    );
}

#[test]
fn single_frame_trajectory_equals_the_initial_points() {
    let model = FlowMatchingModel::new(&ModelConfig { dim: 2, hidden: 8 });
    let x0 = cluster(16, [0.0, 0.0], 1.0, 3);

    let traj = model.sample_from_initial_points(&x0.view(), 1).unwrap();
    assert_eq!(traj.dim(), (1, 16, 2));
    assert_eq!(traj.index_axis(Axis(0), 0), x0.view());
}

#[test]
fn sampling_is_reproducible_for_the_same_seed() {
    let model = FlowMatchingModel::new(&ModelConfig { dim: 2, hidden: 8 });

    let a = model.sample(32, 16, 42).unwrap();
    let b = model.sample(32, 16, 42).unwrap();
    let c = model.sample(32, 16, 43).unwrap();

    assert_eq!(a.dim(), (16, 32, 2));
    let self_diff = mean_sq_diff(&a, &b, 15, 15);
    assert!(self_diff <= 1e-12, "same seed must reproduce: diff={self_diff}");
    assert!(mean_sq_diff(&a, &c, 15, 15) > 0.0);
}

/// Sampling should converge as the step budget increases: the gap between a
/// 16-frame and a 32-frame endpoint should not exceed the gap between an
/// 8-frame and a 16-frame endpoint (same initial points throughout).
#[test]
fn sampling_converges_with_more_steps() {
    let model = FlowMatchingModel::new(&ModelConfig { dim: 2, hidden: 16 });
    let x0 = cluster(64, [0.0, 0.0], 1.0, 17);

    let s8 = model.sample_from_initial_points(&x0.view(), 8).unwrap();
    let s16 = model.sample_from_initial_points(&x0.view(), 16).unwrap();
    let s32 = model.sample_from_initial_points(&x0.view(), 32).unwrap();

    let coarse_gap = mean_sq_diff(&s8, &s16, 7, 15);
    let fine_gap = mean_sq_diff(&s16, &s32, 15, 31);
    assert!(
        fine_gap <= coarse_gap + 1e-6,
        "no step convergence: coarse_gap={coarse_gap} fine_gap={fine_gap}"
    );
}

#[test]
fn step_agrees_with_a_dense_trajectory() {
    // Two frames over [0, 1] is exactly one midpoint step of the full
    // interval; the trait's `step` must match it.
    let model = FlowMatchingModel::new(&ModelConfig { dim: 2, hidden: 8 });
    let x0 = cluster(8, [0.5, -0.5], 0.5, 23);

    let traj = model.sample_from_initial_points(&x0.view(), 2).unwrap();
    let stepped = model.step(&x0.view(), 0.0, 1.0).unwrap();

    let last = traj.index_axis(Axis(0), 1);
    for (a, b) in last.iter().zip(stepped.iter()) {
        assert!((a - b).abs() < 1e-6, "step/trajectory mismatch: {a} vs {b}");
    }
}
