use burn::tensor::activation::log_softmax;
use burn::tensor::{backend::Backend, Distribution as RandomSource, Tensor};

/// Categorical distribution over `num_actions` classes, parameterized by
/// unnormalized logits of shape `(batch, num_actions)`.
///
/// Action values travel as float tensors of shape `(batch, 1)` holding the
/// class index, so discrete and continuous policies share one call-site
/// contract.
#[derive(Debug, Clone)]
pub struct Categorical<B: Backend> {
    logits: Tensor<B, 2>,
}

impl<B: Backend> Categorical<B> {
    pub fn new(logits: Tensor<B, 2>) -> Self {
        Self { logits }
    }

    pub fn logits(&self) -> Tensor<B, 2> {
        self.logits.clone()
    }

    fn log_probs(&self) -> Tensor<B, 2> {
        log_softmax(self.logits.clone(), 1)
    }

    /// Gumbel-argmax sample, shape `(batch, 1)` with index values.
    pub fn sample(&self) -> Tensor<B, 2> {
        let uniform = Tensor::<B, 2>::random(
            self.logits.shape(),
            RandomSource::Uniform(1e-10, 1.0),
            &self.logits.device(),
        );
        let gumbel = uniform.log().neg().log().neg();
        (self.logits.clone() + gumbel).argmax(1).float()
    }

    /// Index of the largest logit, shape `(batch, 1)`.
    pub fn mode(&self) -> Tensor<B, 2> {
        self.logits.clone().argmax(1).float()
    }

    /// Log-probability of the given class indices, shape `(batch, 1)`.
    pub fn log_prob(&self, value: Tensor<B, 2>) -> Tensor<B, 2> {
        self.log_probs().gather(1, value.int())
    }

    /// Same as [`log_prob`](Self::log_prob) with the trailing axis folded,
    /// shape `(batch,)`.
    pub fn independent_log_prob(&self, value: Tensor<B, 2>) -> Tensor<B, 1> {
        self.log_prob(value).flatten::<1>(0, 1)
    }

    /// Shannon entropy, shape `(batch,)`.
    pub fn entropy(&self) -> Tensor<B, 1> {
        let log_probs = self.log_probs();
        (log_probs.clone().exp() * log_probs)
            .sum_dim(1)
            .neg()
            .flatten::<1>(0, 1)
    }

    /// `KL(self || other)`, shape `(batch,)`.
    pub fn kl(&self, other: &Self) -> Tensor<B, 1> {
        let log_probs = self.log_probs();
        (log_probs.clone().exp() * (log_probs - other.log_probs()))
            .sum_dim(1)
            .flatten::<1>(0, 1)
    }

    pub fn detach(self) -> Self {
        Self {
            logits: self.logits.detach(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    fn uniform_three() -> Categorical<NdArray> {
        let device = NdArrayDevice::default();
        Categorical::new(Tensor::from_floats([[0.0, 0.0, 0.0]], &device))
    }

    #[test]
    fn test_log_prob_uniform() {
        let device = NdArrayDevice::default();
        let dist = uniform_three();
        let action = Tensor::<NdArray, 2>::from_floats([[2.0]], &device);
        let log_prob = dist.independent_log_prob(action).into_scalar();
        assert!((log_prob - (1.0f32 / 3.0).ln()).abs() < 1e-6);
    }

    #[test]
    fn test_entropy_uniform() {
        let dist = uniform_three();
        assert!((dist.entropy().into_scalar() - 3.0f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn test_mode_picks_largest_logit() {
        let device = NdArrayDevice::default();
        let dist = Categorical::<NdArray>::new(Tensor::from_floats(
            [[0.1, 2.0, -1.0], [3.0, 0.0, 0.0]],
            &device,
        ));
        let mode = dist.mode();
        let data = mode.into_data();
        let values = data.as_slice::<f32>().unwrap();
        assert_eq!(values, &[1.0, 0.0]);
    }

    #[test]
    fn test_kl_self_is_zero() {
        let dist = uniform_three();
        assert!(dist.kl(&dist.clone()).into_scalar().abs() < 1e-6);
    }

    #[test]
    fn test_sample_in_range() {
        let dist = uniform_three();
        for _ in 0..20 {
            let value = dist.sample().into_scalar();
            assert!((0.0..=2.0).contains(&value));
        }
    }
}
