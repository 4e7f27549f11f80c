//! The time-conditioned field network.
//!
//! A 4-layer feed-forward approximator: input width `dim + 1` (the state with
//! one scalar time feature appended), three hidden ELU layers of width
//! `hidden`, and a linear output head of width `dim`. Tensor allocation,
//! layer composition, autodiff, and serialization all delegate to `burn`;
//! the rest of the crate talks to this module through `ndarray` batches.

use std::path::Path;

use burn_core as burn;

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use burn::nn::{Linear, LinearConfig};
use ndarray::{Array1, Array2, ArrayView2};

use crate::{Error, Result};

/// Default burn backend for training and inference: ndarray + autodiff.
pub type BurnBackend = Autodiff<NdArray<f32>>;

/// Device of the default backend (CPU).
pub type NetDevice = <BurnBackend as Backend>::Device;

/// Exponential linear unit, composed from tensor primitives (burn ships no
/// ELU layer). `elu(x) = x` for `x > 0`, `exp(x) - 1` otherwise.
fn elu<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 2> {
    let pos = x.clone().clamp_min(0.0);
    let neg = x.clamp_max(0.0).exp().sub_scalar(1.0);
    pos + neg
}

/// The feed-forward vector-field / noise-estimate network.
#[derive(Module, Debug)]
pub struct FieldNet<B: Backend> {
    l1: Linear<B>,
    l2: Linear<B>,
    l3: Linear<B>,
    out: Linear<B>,
    dim: usize,
    hidden: usize,
}

impl<B: Backend> FieldNet<B> {
    /// Initialize the network for data dimensionality `dim` with hidden
    /// width `hidden`. The input layer is `dim + 1` wide to take the time
    /// conditioning feature.
    pub fn new(device: &B::Device, dim: usize, hidden: usize) -> Self {
        let l1 = LinearConfig::new(dim + 1, hidden).init(device);
        let l2 = LinearConfig::new(hidden, hidden).init(device);
        let l3 = LinearConfig::new(hidden, hidden).init(device);
        let out = LinearConfig::new(hidden, dim).init(device);
        Self {
            l1,
            l2,
            l3,
            out,
            dim,
            hidden,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn hidden(&self) -> usize {
        self.hidden
    }

    /// Forward pass for a batch.
    ///
    /// Shapes:
    /// - `x_t`: `[batch, dim]`
    /// - `t`: `[batch, 1]` (column vector)
    ///
    /// Returns `[batch, dim]`.
    pub fn forward(&self, x_t: Tensor<B, 2>, t: Tensor<B, 2>) -> Tensor<B, 2> {
        let feats = Tensor::cat(vec![x_t, t], 1);
        let h = elu(self.l1.forward(feats));
        let h = elu(self.l2.forward(h));
        let h = elu(self.l3.forward(h));
        self.out.forward(h)
    }

    /// Persist the network weights (the "download/export" primitive).
    pub fn save(&self, path: &Path) -> Result<()> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        self.clone()
            .save_file(path.to_path_buf(), &recorder)
            .map_err(|e| Error::Record(e.to_string()))
    }

    /// Load previously saved weights into a freshly built topology.
    pub fn load(device: &B::Device, dim: usize, hidden: usize, path: &Path) -> Result<Self> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        Self::new(device, dim, hidden)
            .load_file(path.to_path_buf(), &recorder, device)
            .map_err(|e| Error::Record(e.to_string()))
    }
}

pub(crate) fn ndarray_to_tensor<B: Backend>(
    device: &B::Device,
    x: &ArrayView2<f32>,
) -> Tensor<B, 2> {
    let (n, d) = x.dim();
    let data = burn::tensor::TensorData::new(x.iter().copied().collect::<Vec<f32>>(), [n, d]);
    Tensor::from_data(data, device)
}

pub(crate) fn column_to_tensor<B: Backend>(device: &B::Device, t: &Array2<f32>) -> Tensor<B, 2> {
    ndarray_to_tensor::<B>(device, &t.view())
}

pub(crate) fn flat_to_tensor_column<B: Backend>(
    device: &B::Device,
    t: &Array1<f32>,
) -> Tensor<B, 2> {
    let n = t.len();
    let data = burn::tensor::TensorData::new(t.iter().copied().collect::<Vec<f32>>(), [n, 1]);
    Tensor::from_data(data, device)
}

pub(crate) fn tensor_to_ndarray<B: Backend>(t: Tensor<B, 2>) -> Result<Array2<f32>> {
    let [n, d] = t.dims();
    let flat = t
        .to_data()
        .to_vec::<f32>()
        .map_err(|_| Error::Shape("tensor data could not be read back as f32"))?;
    Array2::from_shape_vec((n, d), flat)
        .map_err(|_| Error::Shape("tensor data length does not match its shape"))
}

/// Evaluate the network on ndarray batches, keeping burn types internal.
pub(crate) fn eval_on_arrays<B: Backend>(
    net: &FieldNet<B>,
    device: &B::Device,
    x_t: &ArrayView2<f32>,
    t_col: &Array2<f32>,
) -> Result<Array2<f32>> {
    let x = ndarray_to_tensor::<B>(device, x_t);
    let t = column_to_tensor::<B>(device, t_col);
    tensor_to_ndarray(net.forward(x, t))
}

#[cfg(test)]
mod tests {
    use super::*;

    type B = BurnBackend;

    #[test]
    fn field_net_shapes_smoke() {
        let device = <B as Backend>::Device::default();
        let net = FieldNet::<B>::new(&device, 3, 8);

        let x = Array2::<f32>::zeros((5, 3));
        let t = Array2::<f32>::from_elem((5, 1), 0.5);
        let out = eval_on_arrays(&net, &device, &x.view(), &t).unwrap();
        assert_eq!(out.dim(), (5, 3));
    }

    #[test]
    fn elu_matches_reference_values() {
        let device = <B as Backend>::Device::default();
        let data = burn::tensor::TensorData::new(vec![-2.0f32, -0.5, 0.0, 0.5, 2.0], [1, 5]);
        let x = Tensor::<B, 2>::from_data(data, &device);

        let out = elu(x).to_data().to_vec::<f32>().unwrap();
        let expected = [
            (-2.0f32).exp() - 1.0,
            (-0.5f32).exp() - 1.0,
            0.0,
            0.5,
            2.0,
        ];
        for (got, want) in out.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-6, "elu mismatch: {got} vs {want}");
        }
    }

    #[test]
    fn conversions_round_trip() {
        let device = <B as Backend>::Device::default();
        let x = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let t = ndarray_to_tensor::<B>(&device, &x.view());
        let back = tensor_to_ndarray(t).unwrap();
        assert_eq!(back, x);
    }
}
