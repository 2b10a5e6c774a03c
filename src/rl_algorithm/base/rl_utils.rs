use burn::module::AutodiffModule;
use burn::optim::GradientsParams;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{Bool, Element, Int, Tensor, TensorData};
use burn::LearningRate;

use ndarray::{Array2, Array3};
use num_traits::{ToPrimitive, Zero};

use super::optimizer::AgentOptimizer;
use crate::rl_algorithm::error::AgentError;

/// One backward pass and one optimizer step on `module`.
pub(crate) fn update_parameters<B: AutodiffBackend, M: AutodiffModule<B>>(
    loss: Tensor<B, 1>,
    module: M,
    optimizer: &mut AgentOptimizer<B, M>,
    learning_rate: LearningRate,
) -> M {
    let gradients = loss.backward();
    let gradient_params = GradientsParams::from_grads(gradients, &module);
    optimizer.step(learning_rate, module, gradient_params)
}

/// Rejects tensors containing NaN or infinities before they reach an
/// optimizer step or the environment.
pub fn ensure_finite<B: Backend, const D: usize>(
    tensor: &Tensor<B, D>,
    context: &str,
) -> Result<(), AgentError> {
    let has_pos_inf = tensor
        .clone()
        .equal_elem(f32::INFINITY)
        .any()
        .into_scalar();
    let has_neg_inf = tensor
        .clone()
        .equal_elem(f32::NEG_INFINITY)
        .any()
        .into_scalar();
    let has_nan = tensor.clone().is_nan().any().into_scalar();
    if has_pos_inf || has_neg_inf || has_nan {
        return Err(AgentError::Numerical(context.to_string()));
    }
    Ok(())
}

/// Repeats one per-episode scalar across `length` timesteps, yielding a
/// `(batch * length,)` vector aligned with flattened trajectories.
pub(crate) fn broadcast_per_episode<B: Backend>(
    per_episode: Tensor<B, 1>,
    length: usize,
) -> Tensor<B, 1> {
    per_episode
        .unsqueeze_dim::<2>(1)
        .repeat_dim(1, length)
        .flatten::<1>(0, 1)
}

/// `[gamma^0, gamma^1, .., gamma^(length-1)]` on the given device.
pub fn discount_factors<B: Backend>(
    gamma: f32,
    length: usize,
    device: &B::Device,
) -> Tensor<B, 1> {
    Tensor::<B, 1, Int>::arange(0..length as i64, device)
        .float()
        .mul_scalar(gamma.ln())
        .exp()
}

pub fn ndarray2tensor2<B: Backend, T: Element + Zero + ToPrimitive>(
    arr: Array2<T>,
    device: &B::Device,
) -> Tensor<B, 2> {
    let shape = arr.shape().to_vec();
    let vec = arr.into_raw_vec_and_offset().0;
    Tensor::<B, 2>::from_data(TensorData::new(vec, shape), device)
}

pub fn ndarray2tensor3<B: Backend, T: Element + Zero + ToPrimitive>(
    arr: Array3<T>,
    device: &B::Device,
) -> Tensor<B, 3> {
    let shape = arr.shape().to_vec();
    let vec = arr.into_raw_vec_and_offset().0;
    Tensor::<B, 3>::from_data(TensorData::new(vec, shape), device)
}

pub fn bool_ndarray2tensor2<B: Backend>(
    arr: Array2<bool>,
    device: &B::Device,
) -> Tensor<B, 2, Bool> {
    let shape = arr.shape().to_vec();
    let vec = arr.into_raw_vec_and_offset().0;
    Tensor::<B, 2, Bool>::from_data(TensorData::new(vec, shape), device)
}

pub fn tensor2vec1<B: Backend>(tensor: &Tensor<B, 1>) -> Vec<f32> {
    tensor.to_data().into_vec::<f32>().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    #[test]
    fn test_discount_factors() {
        let device = NdArrayDevice::Cpu;
        let discounts = discount_factors::<NdArray>(0.5, 4, &device);
        let values = tensor2vec1(&discounts);
        let expected = [1.0, 0.5, 0.25, 0.125];
        for (v, e) in values.iter().zip(expected) {
            assert!((v - e).abs() < 1e-6);
        }
    }

    #[test]
    fn test_discount_factors_gamma_one() {
        let device = NdArrayDevice::Cpu;
        let discounts = discount_factors::<NdArray>(1.0, 3, &device);
        assert_eq!(tensor2vec1(&discounts), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_ensure_finite() {
        let device = NdArrayDevice::Cpu;
        let ok = Tensor::<NdArray, 1>::from_floats([1.0, -2.0], &device);
        assert!(ensure_finite(&ok, "ok").is_ok());

        let nan = Tensor::<NdArray, 1>::from_floats([1.0, f32::NAN], &device);
        assert!(matches!(
            ensure_finite(&nan, "nan"),
            Err(AgentError::Numerical(_))
        ));

        let inf = Tensor::<NdArray, 1>::from_floats([f32::INFINITY, 0.0], &device);
        assert!(ensure_finite(&inf, "inf").is_err());
    }
}
