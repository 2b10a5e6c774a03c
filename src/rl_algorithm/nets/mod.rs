use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::burn_utils::distribution::Distribution;

use super::base::config::ActionSpace;
use super::base::model::PolicyModel;

pub mod categorical_mlp_policy;
pub mod mlp_value;
pub mod normal_mlp_policy;

pub use categorical_mlp_policy::{CategoricalMlpPolicy, CategoricalMlpPolicyConfig};
pub use mlp_value::{MlpValue, MlpValueConfig};
pub use normal_mlp_policy::{NormalMlpPolicy, NormalMlpPolicyConfig};

/// Policy network dispatching over the action-space kind.
#[derive(Module, Debug)]
pub enum PolicyNet<B: Backend> {
    Normal(NormalMlpPolicy<B>),
    Categorical(CategoricalMlpPolicy<B>),
}

impl<B: Backend> PolicyNet<B> {
    pub(crate) fn forward(&self, obs: Tensor<B, 2>) -> Distribution<B> {
        match self {
            PolicyNet::Normal(policy) => policy.forward(obs),
            PolicyNet::Categorical(policy) => policy.forward(obs),
        }
    }
}

impl<B: AutodiffBackend> PolicyModel<B> for PolicyNet<B> {
    fn autodiff_forward(&self, obs: Tensor<B, 2>) -> Distribution<B> {
        self.forward(obs)
    }

    fn eval_forward(&self, obs: Tensor<B::InnerBackend, 2>) -> Distribution<B::InnerBackend> {
        self.valid().forward(obs)
    }

    fn observation_dim(&self) -> usize {
        match self {
            PolicyNet::Normal(policy) => policy.observation_dim(),
            PolicyNet::Categorical(policy) => policy.observation_dim(),
        }
    }

    fn action_dim(&self) -> usize {
        match self {
            PolicyNet::Normal(policy) => policy.action_dim(),
            PolicyNet::Categorical(_) => 1,
        }
    }
}

/// Builds the policy network matching the action-space discriminant.
pub fn build_policy_net<B: Backend>(
    action_space: &ActionSpace,
    observation_dim: usize,
    n_layers: usize,
    layer_size: usize,
    device: &B::Device,
) -> PolicyNet<B> {
    match action_space {
        ActionSpace::Continuous { dim, bound } => PolicyNet::Normal(
            NormalMlpPolicyConfig::new(*dim, observation_dim, n_layers, layer_size)
                .with_bound(*bound)
                .init(device),
        ),
        ActionSpace::Discrete { count } => PolicyNet::Categorical(
            CategoricalMlpPolicyConfig::new(*count, observation_dim, n_layers, layer_size)
                .init(device),
        ),
    }
}
