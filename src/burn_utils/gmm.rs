use burn::prelude::*;

use crate::rl_algorithm::error::AgentError;

/// Negative log-likelihood of `batch` under a diagonal Gaussian mixture.
///
/// Shapes: `batch (n, fs)`, `mus (n, gs, fs)`, `sigmas (n, gs, fs)`,
/// `logpi (n, gs)` with `gs` mixture components over `fs` features. The
/// per-item log-likelihood is
/// `logsumexp_k(logpi_k + sum_f log N(x_f | mu_kf, sigma_kf))`, computed
/// with the max-subtraction shift so large magnitudes survive the `exp`.
///
/// `correction_factor` rescales the probability mass of component 0 for the
/// items where it saturates to 1 after the shift, which keeps degenerate
/// mixtures from pinning the loss. `reduce` selects the mean over items;
/// otherwise the per-item vector is returned. The feature axis is never
/// reduced away on its own — it only enters through the per-component sum.
pub fn gmm_loss<B: Backend>(
    batch: Tensor<B, 2>,
    mus: Tensor<B, 3>,
    sigmas: Tensor<B, 3>,
    logpi: Tensor<B, 2>,
    correction_factor: Option<f32>,
    reduce: bool,
) -> Result<Tensor<B, 1>, AgentError> {
    let [n, fs] = batch.shape().dims();
    let [mn, gs, mfs] = mus.shape().dims();
    if mn != n || mfs != fs || sigmas.shape().dims::<3>() != [n, gs, fs] {
        return Err(AgentError::Shape(format!(
            "gmm_loss: batch ({n}, {fs}) does not match mixture ({mn}, {gs}, {mfs})"
        )));
    }
    if logpi.shape().dims::<2>() != [n, gs] {
        return Err(AgentError::Shape(format!(
            "gmm_loss: logpi {:?} does not match ({n}, {gs})",
            logpi.shape().dims::<2>()
        )));
    }

    let half_log_two_pi = (2.0 * std::f32::consts::PI).ln() / 2.0;
    let value = batch.unsqueeze_dim::<3>(1);
    let component_log_probs = -((value - mus).powf_scalar(2.0)
        / (sigmas.clone().powf_scalar(2.0) * 2.0))
        - sigmas.log()
        - half_log_two_pi;

    let g_log_probs = logpi + component_log_probs.sum_dim(2).squeeze::<2>(2);
    let max_log_probs = g_log_probs.clone().max_dim(1);
    let mut g_probs = (g_log_probs - max_log_probs.clone()).exp();

    if let Some(factor) = correction_factor {
        let head = g_probs.clone().slice([0..n, 0..1]);
        let saturated = head.clone().equal_elem(1.0);
        let head = head.clone().mask_where(saturated, head * factor);
        g_probs = if gs > 1 {
            Tensor::cat(vec![head, g_probs.slice([0..n, 1..gs])], 1)
        } else {
            head
        };
    }

    let log_prob = (max_log_probs + g_probs.sum_dim(1).log()).flatten::<1>(0, 1);
    if reduce {
        Ok(-log_prob.mean())
    } else {
        Ok(-log_prob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    #[test]
    fn test_single_component_is_gaussian_nll() {
        let device = NdArrayDevice::default();
        let batch = Tensor::<NdArray, 2>::from_floats([[0.5]], &device);
        let mus = Tensor::<NdArray, 3>::from_floats([[[0.0]]], &device);
        let sigmas = Tensor::<NdArray, 3>::from_floats([[[1.0]]], &device);
        let logpi = Tensor::<NdArray, 2>::from_floats([[0.0]], &device);

        let loss = gmm_loss(batch, mus, sigmas, logpi, None, true).unwrap();
        // -log N(0.5 | 0, 1) = 0.5^2/2 + 0.5*ln(2*pi)
        assert!((loss.into_scalar() - 1.0439385).abs() < 1e-5);
    }

    #[test]
    fn test_two_component_mixture() {
        let device = NdArrayDevice::default();
        let batch = Tensor::<NdArray, 2>::from_floats([[0.0]], &device);
        let mus = Tensor::<NdArray, 3>::from_floats([[[0.0], [1.0]]], &device);
        let sigmas = Tensor::<NdArray, 3>::from_floats([[[1.0], [1.0]]], &device);
        let half = 0.5f32.ln();
        let logpi = Tensor::<NdArray, 2>::from_floats([[half, half]], &device);

        let loss = gmm_loss(batch, mus, sigmas, logpi, None, true).unwrap();
        // -ln(0.5*N(0|0,1) + 0.5*N(0|1,1))
        assert!((loss.into_scalar() - 1.1380982).abs() < 1e-4);
    }

    #[test]
    fn test_unreduced_keeps_batch_axis() {
        let device = NdArrayDevice::default();
        let batch = Tensor::<NdArray, 2>::from_floats([[0.0, 0.0], [1.0, -1.0]], &device);
        let mus = Tensor::<NdArray, 3>::zeros([2, 3, 2], &device);
        let sigmas = Tensor::<NdArray, 3>::ones([2, 3, 2], &device);
        let logpi = Tensor::<NdArray, 2>::from_floats(
            [[-1.0986123; 3], [-1.0986123; 3]],
            &device,
        );

        let loss = gmm_loss(batch, mus, sigmas, logpi, None, false).unwrap();
        assert_eq!(loss.shape().dims, [2]);
    }

    #[test]
    fn test_correction_factor_on_saturated_head() {
        let device = NdArrayDevice::default();
        let batch = Tensor::<NdArray, 2>::from_floats([[0.5]], &device);
        let mus = Tensor::<NdArray, 3>::from_floats([[[0.0]]], &device);
        let sigmas = Tensor::<NdArray, 3>::from_floats([[[1.0]]], &device);
        let logpi = Tensor::<NdArray, 2>::from_floats([[0.0]], &device);

        // A single component always saturates after the shift, so the
        // corrected loss differs by exactly -ln(factor).
        let plain = gmm_loss(
            batch.clone(),
            mus.clone(),
            sigmas.clone(),
            logpi.clone(),
            None,
            true,
        )
        .unwrap()
        .into_scalar();
        let corrected = gmm_loss(batch, mus, sigmas, logpi, Some(0.5), true)
            .unwrap()
            .into_scalar();
        assert!((corrected - plain - 2.0f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let device = NdArrayDevice::default();
        let batch = Tensor::<NdArray, 2>::zeros([2, 3], &device);
        let mus = Tensor::<NdArray, 3>::zeros([2, 4, 2], &device);
        let sigmas = Tensor::<NdArray, 3>::ones([2, 4, 2], &device);
        let logpi = Tensor::<NdArray, 2>::zeros([2, 4], &device);

        assert!(gmm_loss(batch, mus, sigmas, logpi, None, true).is_err());
    }
}
