use crate::burn_utils::distribution::normal::Normal;
use crate::burn_utils::distribution::Distribution;
use crate::burn_utils::{build_mlp, Sequence};
use crate::rl_algorithm::base::model::PolicyModel;
use burn::module::AutodiffModule;
use burn::nn::Tanh;
use burn::tensor::backend::AutodiffBackend;
use burn::{nn::Linear, nn::LinearConfig, prelude::*};

/// Gaussian MLP policy for bounded continuous action spaces.
///
/// The mean head is squashed by tanh and scaled to the action bound. The
/// log standard deviation is state independent: a bias-free, zero
/// initialized `Linear(1, action_dim)` applied to a constant one, so it
/// starts at `std = 1` and is learned like any other parameter.
#[derive(Module, Debug)]
pub struct NormalMlpPolicy<B: Backend> {
    mean_net: Sequence<B>,
    logstd_linear: Linear<B>,
    one: Tensor<B, 1>,
    tanh: Tanh,
    bound: f32,
    observation_dim: usize,
    action_dim: usize,
}

impl<B: Backend> NormalMlpPolicy<B> {
    pub(crate) fn forward(&self, input: Tensor<B, 2>) -> Distribution<B> {
        let batch_size = input.shape().dims::<2>()[0];

        let mean = self.tanh.forward(self.mean_net.forward(input));
        let mean = mean.mul_scalar(self.bound);

        let logstd = self.logstd_linear.forward(self.one.clone());
        let std = logstd
            .exp()
            .unsqueeze::<2>()
            .expand([batch_size, self.action_dim]);

        Distribution::Normal(Normal::new(mean, std))
    }
}

impl<B: AutodiffBackend> PolicyModel<B> for NormalMlpPolicy<B> {
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
        self.action_dim
    }
}

#[derive(Config, Debug)]
pub struct NormalMlpPolicyConfig {
    action_dim: usize,
    observation_dim: usize,
    n_layers: usize,
    layer_size: usize,
    #[config(default = 1.0)]
    bound: f32,
}

impl NormalMlpPolicyConfig {
    /// Returns the initialized policy.
    pub fn init<B: Backend>(&self, device: &B::Device) -> NormalMlpPolicy<B> {
        let mean_net = build_mlp(
            self.observation_dim,
            self.action_dim,
            self.n_layers,
            self.layer_size,
            device,
        );
        let logstd_linear = LinearConfig::new(1, self.action_dim)
            .with_bias(false)
            .with_initializer(nn::Initializer::Zeros)
            .init::<B>(device);
        NormalMlpPolicy {
            mean_net,
            logstd_linear,
            one: Tensor::ones([1], device),
            tanh: Tanh::new(),
            bound: self.bound,
            observation_dim: self.observation_dim,
            action_dim: self.action_dim,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    #[test]
    fn test_forward_shapes_and_bound() {
        let device = NdArrayDevice::Cpu;
        let policy = NormalMlpPolicyConfig::new(2, 3, 1, 8)
            .with_bound(2.0)
            .init::<NdArray>(&device);
        let obs = Tensor::<NdArray, 2>::ones([5, 3], &device);

        match policy.forward(obs) {
            Distribution::Normal(normal) => {
                assert_eq!(normal.loc().shape().dims, [5, 2]);
                let max_abs = normal.loc().abs().max().into_scalar();
                assert!(max_abs <= 2.0);
                // Zero-initialized logstd head starts at std = 1.
                let std = normal.scale().into_data().into_vec::<f32>().unwrap();
                assert!(std.iter().all(|s| (s - 1.0).abs() < 1e-6));
            }
            _ => panic!("continuous policy must produce a Normal distribution"),
        }
    }
}
