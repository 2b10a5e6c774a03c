use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::rl_algorithm::error::AgentError;

pub mod categorical;
pub mod normal;

pub use categorical::Categorical;
pub use normal::Normal;

/// Policy distribution over one batch of actions.
///
/// Tagged dispatch over the two supported action-space kinds; built fresh
/// from policy-network outputs on every forward pass.
#[derive(Debug, Clone)]
pub enum Distribution<B: Backend> {
    Normal(Normal<B>),
    Categorical(Categorical<B>),
}

impl<B: Backend> Distribution<B> {
    /// Stochastic draw, shape `(batch, action_dim)`.
    pub fn sample(&self) -> Tensor<B, 2> {
        match self {
            Distribution::Normal(normal) => normal.sample(),
            Distribution::Categorical(categorical) => categorical.sample(),
        }
    }

    /// Deterministic action: Gaussian mean or argmax class index.
    pub fn mode(&self) -> Tensor<B, 2> {
        match self {
            Distribution::Normal(normal) => normal.loc(),
            Distribution::Categorical(categorical) => categorical.mode(),
        }
    }

    /// Joint log-probability of `value`, shape `(batch,)`.
    pub fn independent_log_prob(&self, value: Tensor<B, 2>) -> Tensor<B, 1> {
        match self {
            Distribution::Normal(normal) => normal.independent_log_prob(value),
            Distribution::Categorical(categorical) => categorical.independent_log_prob(value),
        }
    }

    /// Entropy per batch item, shape `(batch,)`.
    pub fn entropy(&self) -> Tensor<B, 1> {
        match self {
            Distribution::Normal(normal) => normal.entropy(),
            Distribution::Categorical(categorical) => categorical.entropy(),
        }
    }

    /// `KL(self || other)` per batch item. Both sides must be the same
    /// distribution kind.
    pub fn kl(&self, other: &Self) -> Result<Tensor<B, 1>, AgentError> {
        match (self, other) {
            (Distribution::Normal(p), Distribution::Normal(q)) => Ok(p.kl(q)),
            (Distribution::Categorical(p), Distribution::Categorical(q)) => Ok(p.kl(q)),
            _ => Err(AgentError::Shape(
                "kl divergence between different distribution kinds".to_string(),
            )),
        }
    }

    pub fn is_continuous(&self) -> bool {
        matches!(self, Distribution::Normal(_))
    }

    /// Drops gradient tracking from the distribution parameters.
    pub fn detach(self) -> Self {
        match self {
            Distribution::Normal(normal) => Distribution::Normal(normal.detach()),
            Distribution::Categorical(categorical) => {
                Distribution::Categorical(categorical.detach())
            }
        }
    }
}

impl<B: AutodiffBackend> Distribution<B> {
    /// Lifts an inner-backend distribution into the autodiff backend as a
    /// constant (no history attached).
    pub fn from_inner(inner: Distribution<B::InnerBackend>) -> Self {
        match inner {
            Distribution::Normal(normal) => Distribution::Normal(Normal::new(
                Tensor::from_inner(normal.loc()),
                Tensor::from_inner(normal.scale()),
            )),
            Distribution::Categorical(categorical) => Distribution::Categorical(
                Categorical::new(Tensor::from_inner(categorical.logits())),
            ),
        }
    }
}
