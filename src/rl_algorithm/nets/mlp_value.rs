use crate::burn_utils::{build_mlp, Sequence};
use crate::rl_algorithm::base::model::ValueModel;
use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

/// MLP state-value estimator: one scalar per observation.
#[derive(Module, Debug)]
pub struct MlpValue<B: Backend> {
    net: Sequence<B>,
    observation_dim: usize,
}

impl<B: Backend> MlpValue<B> {
    pub(crate) fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 1> {
        self.net.forward(input).flatten::<1>(0, 1)
    }
}

impl<B: AutodiffBackend> ValueModel<B> for MlpValue<B> {
    fn autodiff_forward(&self, obs: Tensor<B, 2>) -> Tensor<B, 1> {
        self.forward(obs)
    }

    fn eval_forward(&self, obs: Tensor<B::InnerBackend, 2>) -> Tensor<B::InnerBackend, 1> {
        self.valid().forward(obs)
    }

    fn observation_dim(&self) -> usize {
        self.observation_dim
    }
}

#[derive(Config, Debug)]
pub struct MlpValueConfig {
    observation_dim: usize,
    n_layers: usize,
    layer_size: usize,
}

impl MlpValueConfig {
    /// Returns the initialized value network.
    pub fn init<B: Backend>(&self, device: &B::Device) -> MlpValue<B> {
        let net = build_mlp(
            self.observation_dim,
            1,
            self.n_layers,
            self.layer_size,
            device,
        );
        MlpValue {
            net,
            observation_dim: self.observation_dim,
        }
    }
}
