//! Flow matching on a 2-D spiral.
//!
//! Prints:
//! - training loss at each progress interval
//! - mean distance from the final samples to their nearest spiral point

use flowscope::flow_matching::FlowMatchingModel;
use flowscope::model::{GenerativeModel, ModelConfig};
use flowscope::train::{CancelToken, TrainConfig, TrainProgress};
use ndarray::{Array2, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

fn make_spiral(n: usize, noise: f32, seed: u64) -> Array2<f32> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut out = Array2::<f32>::zeros((n, 2));
    for i in 0..n {
        let u = i as f32 / n as f32;
        let theta = u * 3.0 * std::f32::consts::TAU / 2.0;
        let r = 0.3 + 1.2 * u;
        let nx: f32 = StandardNormal.sample(&mut rng);
        let ny: f32 = StandardNormal.sample(&mut rng);
        out[[i, 0]] = r * theta.cos() + noise * nx;
        out[[i, 1]] = r * theta.sin() + noise * ny;
    }
    out
}

fn mean_nearest_dist(samples: &Array2<f32>, data: &Array2<f32>) -> f32 {
    let mut total = 0.0f64;
    for s in samples.rows() {
        let mut best = f32::INFINITY;
        for d in data.rows() {
            let dx = s[0] - d[0];
            let dy = s[1] - d[1];
            best = best.min((dx * dx + dy * dy).sqrt());
        }
        total += best as f64;
    }
    (total / samples.nrows() as f64) as f32
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let data = make_spiral(512, 0.02, 42);

    let mut model = FlowMatchingModel::new(&ModelConfig::default());
    let cfg = TrainConfig {
        epochs: 2_000,
        batch_size: 64,
        update_interval: 200,
        lr: 2e-3,
        seed: 7,
        preview_samples: 0,
        ..TrainConfig::default()
    };

    model.train(
        &data.view(),
        &cfg,
        &mut |p: &TrainProgress| println!("epoch {:>5}  loss {:.4}", p.epoch, p.loss),
        &CancelToken::new(),
    )?;

    let steps = 64usize;
    let traj = model.sample(512, steps, 99)?;
    let last = traj.index_axis(Axis(0), steps - 1).to_owned();

    println!("trajectory shape: {:?}", traj.dim());
    println!(
        "mean nearest-spiral distance: {:.4}",
        mean_nearest_dist(&last, &data)
    );
    Ok(())
}
