use burn::tensor::{backend::Backend, Tensor, TensorData};
use rand::prelude::*;
use rand_distr::StandardNormal;

/// Diagonal Gaussian over a batch of action vectors.
///
/// `loc` and `scale` are both `(batch, action_dim)`; every operation keeps
/// the batch axis and treats action dimensions as independent.
#[derive(Debug, Clone)]
pub struct Normal<B: Backend> {
    loc: Tensor<B, 2>,
    scale: Tensor<B, 2>,
}

impl<B: Backend> Normal<B> {
    pub fn new(loc: Tensor<B, 2>, scale: Tensor<B, 2>) -> Self {
        Self { loc, scale }
    }

    pub fn loc(&self) -> Tensor<B, 2> {
        self.loc.clone()
    }

    pub fn scale(&self) -> Tensor<B, 2> {
        self.scale.clone()
    }

    /// Reparameterized sample: `loc + eps * scale` with `eps ~ N(0, 1)`.
    pub fn sample(&self) -> Tensor<B, 2> {
        let rng = rand::rng();
        let vec = rng
            .sample_iter::<f32, StandardNormal>(StandardNormal)
            .take(self.loc.shape().num_elements())
            .collect::<Vec<f32>>();
        let shape = [vec.len()];
        let eps = Tensor::<B, 1>::from_data(TensorData::new(vec, shape), &self.loc.device())
            .reshape(self.loc.shape());
        self.loc.clone() + eps * self.scale.clone()
    }

    /// Per-dimension Gaussian log-density of `value`, shape `(batch, action_dim)`.
    pub fn log_prob(&self, value: Tensor<B, 2>) -> Tensor<B, 2> {
        let half_log_two_pi = (2.0 * std::f32::consts::PI).ln() / 2.0;
        -((value - self.loc.clone()).powf_scalar(2.0)
            / (self.scale.clone().powf_scalar(2.0) * 2.0))
            - self.scale.clone().log()
            - half_log_two_pi
    }

    /// Joint log-density across action dimensions, shape `(batch,)`.
    pub fn independent_log_prob(&self, value: Tensor<B, 2>) -> Tensor<B, 1> {
        self.log_prob(value).sum_dim(1).flatten::<1>(0, 1)
    }

    /// Differential entropy summed over action dimensions, shape `(batch,)`.
    pub fn entropy(&self) -> Tensor<B, 1> {
        let constant = 0.5 + 0.5 * (2.0 * std::f32::consts::PI).ln();
        (self.scale.clone().log() + constant)
            .sum_dim(1)
            .flatten::<1>(0, 1)
    }

    /// `KL(self || other)` summed over action dimensions, shape `(batch,)`.
    pub fn kl(&self, other: &Self) -> Tensor<B, 1> {
        let var = self.scale.clone().powf_scalar(2.0);
        let other_var = other.scale.clone().powf_scalar(2.0);
        let mean_gap = (self.loc.clone() - other.loc.clone()).powf_scalar(2.0);
        let per_dim = other.scale.clone().log() - self.scale.clone().log()
            + (var + mean_gap) / (other_var * 2.0)
            - 0.5;
        per_dim.sum_dim(1).flatten::<1>(0, 1)
    }

    pub fn detach(self) -> Self {
        Self {
            loc: self.loc.detach(),
            scale: self.scale.detach(),
        }
    }
}
