use crate::burn_utils::distribution::categorical::Categorical;
use crate::burn_utils::distribution::Distribution;
use crate::burn_utils::{build_mlp, Sequence};
use crate::rl_algorithm::base::model::PolicyModel;
use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

/// Logits MLP policy for discrete action spaces.
#[derive(Module, Debug)]
pub struct CategoricalMlpPolicy<B: Backend> {
    logits_net: Sequence<B>,
    observation_dim: usize,
    action_count: usize,
}

impl<B: Backend> CategoricalMlpPolicy<B> {
    pub(crate) fn forward(&self, input: Tensor<B, 2>) -> Distribution<B> {
        let logits = self.logits_net.forward(input);
        Distribution::Categorical(Categorical::new(logits))
    }

    pub fn action_count(&self) -> usize {
        self.action_count
    }
}

impl<B: AutodiffBackend> PolicyModel<B> for CategoricalMlpPolicy<B> {
    fn autodiff_forward(&self, obs: Tensor<B, 2>) -> Distribution<B> {
        self.forward(obs)
    }

    fn eval_forward(&self, obs: Tensor<B::InnerBackend, 2>) -> Distribution<B::InnerBackend> {
        self.valid().forward(obs)
    }

    fn observation_dim(&self) -> usize {
        self.observation_dim
    }

    fn action_dim(&self) -> usize {
        1
    }
}

#[derive(Config, Debug)]
pub struct CategoricalMlpPolicyConfig {
    action_count: usize,
    observation_dim: usize,
    n_layers: usize,
    layer_size: usize,
}

impl CategoricalMlpPolicyConfig {
    /// Returns the initialized policy.
    pub fn init<B: Backend>(&self, device: &B::Device) -> CategoricalMlpPolicy<B> {
        let logits_net = build_mlp(
            self.observation_dim,
            self.action_count,
            self.n_layers,
            self.layer_size,
            device,
        );
        CategoricalMlpPolicy {
            logits_net,
            observation_dim: self.observation_dim,
            action_count: self.action_count,
        }
    }
}
