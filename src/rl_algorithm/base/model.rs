use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::burn_utils::distribution::Distribution;
use crate::rl_algorithm::error::AgentError;

use super::rl_utils::ensure_finite;

/// Differentiable mapping from observations to a policy distribution.
///
/// `autodiff_forward` runs on the training backend and participates in the
/// gradient graph; `eval_forward` runs on the inner backend and never
/// records history.
pub trait PolicyModel<B: AutodiffBackend>: AutodiffModule<B> {
    fn autodiff_forward(&self, obs: Tensor<B, 2>) -> Distribution<B>;

    fn eval_forward(&self, obs: Tensor<B::InnerBackend, 2>) -> Distribution<B::InnerBackend>;

    fn observation_dim(&self) -> usize;

    /// Width of the action tensors this policy produces and consumes.
    fn action_dim(&self) -> usize;
}

/// Differentiable mapping from observations to one scalar value per item.
pub trait ValueModel<B: AutodiffBackend>: AutodiffModule<B> {
    fn autodiff_forward(&self, obs: Tensor<B, 2>) -> Tensor<B, 1>;

    fn eval_forward(&self, obs: Tensor<B::InnerBackend, 2>) -> Tensor<B::InnerBackend, 1>;

    fn observation_dim(&self) -> usize;
}

/// Greedy action: distribution mode. Continuous policies must produce
/// finite outputs; anything else must not reach the environment.
pub(crate) fn deterministic_action<B: AutodiffBackend, P: PolicyModel<B>>(
    policy: &P,
    observation: Tensor<B::InnerBackend, 2>,
) -> Result<Tensor<B::InnerBackend, 2>, AgentError> {
    let distribution = policy.eval_forward(observation);
    let action = distribution.mode();
    if distribution.is_continuous() && ensure_finite(&action, "action").is_err() {
        return Err(AgentError::NonFiniteAction(
            "policy mean contains NaN or Inf".to_string(),
        ));
    }
    Ok(action)
}

/// Exploratory action: one draw from the current policy distribution.
pub(crate) fn stochastic_action<B: AutodiffBackend, P: PolicyModel<B>>(
    policy: &P,
    observation: Tensor<B::InnerBackend, 2>,
) -> Tensor<B::InnerBackend, 2> {
    policy.eval_forward(observation).sample()
}
