use burn::grad_clipping::GradientClippingConfig;
use burn::nn::loss::{MseLoss, Reduction};
use burn::prelude::*;
use burn::record::{DefaultFileRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::cast::ToElement;
use log::info;

use crate::burn_utils::sync::{hard_update, soft_update};
use crate::rl_algorithm::base::config::{
    check_discount, check_learning_rate, check_network_dims, check_unit_interval,
};
use crate::rl_algorithm::base::memory::TrajectoryBatch;
use crate::rl_algorithm::base::model::ValueModel;
use crate::rl_algorithm::base::optimizer::{AgentOptimizer, OptimizerKind};
use crate::rl_algorithm::base::rl_utils::{self, discount_factors, ensure_finite};
use crate::rl_algorithm::error::AgentError;
use crate::rl_algorithm::nets::{MlpValue, MlpValueConfig};
use crate::FType;

/// Configuration surface of [`ValueCritic`].
#[derive(Clone)]
pub struct CriticConfig {
    pub observation_dim: usize,
    pub n_layers: usize,
    pub layer_size: usize,
    pub learning_rate: f64,
    /// Time-step scale multiplying the learning rate.
    pub dt: f64,
    pub optimizer: OptimizerKind,
    pub weight_decay: f32,
    /// Discount factor, in `(0, 1]`.
    pub gamma: f32,
    /// Target retention weight of the soft update, in `[0, 1]`.
    pub tau: f32,
    pub grad_clip: Option<GradientClippingConfig>,
}

impl CriticConfig {
    pub fn new(observation_dim: usize) -> Self {
        Self {
            observation_dim,
            n_layers: 2,
            layer_size: 256,
            learning_rate: 1e-3,
            dt: 1.0,
            optimizer: OptimizerKind::default(),
            weight_decay: 0.0,
            gamma: 0.99,
            tau: 0.99,
            grad_clip: Some(GradientClippingConfig::Norm(1.0)),
        }
    }
}

/// State-value estimator with a lagged target network.
///
/// The live network is trained toward target-bootstrapped returns; after
/// every optimizer step the target is pulled toward the live network by a
/// soft update with retention weight `tau`.
pub struct ValueCritic<B: AutodiffBackend, V: ValueModel<B>> {
    v_function: V,
    target_v_function: V,
    optimizer: AgentOptimizer<B, V>,
    learning_rate: f64,
    gamma: f32,
    tau: f32,
    device: B::Device,
}

impl<B: AutodiffBackend> ValueCritic<B, MlpValue<B>> {
    /// Builds an MLP critic from the configuration, validating every
    /// hyperparameter before any network is allocated.
    pub fn configure(config: &CriticConfig, device: &B::Device) -> Result<Self, AgentError> {
        check_network_dims(config.observation_dim, config.n_layers, config.layer_size)?;
        check_discount(config.gamma)?;
        check_unit_interval("tau", config.tau)?;
        check_learning_rate(config.learning_rate, config.dt)?;

        let net_config =
            MlpValueConfig::new(config.observation_dim, config.n_layers, config.layer_size);
        let v_function: MlpValue<B> = net_config.init(device);
        let target_v_function = hard_update(&v_function, net_config.init(device))?;

        Ok(Self {
            v_function,
            target_v_function,
            optimizer: AgentOptimizer::build(
                config.optimizer,
                config.weight_decay,
                config.grad_clip.clone(),
            ),
            learning_rate: config.learning_rate * config.dt,
            gamma: config.gamma,
            tau: config.tau,
            device: device.clone(),
        })
    }
}

impl<B: AutodiffBackend, V: ValueModel<B>> ValueCritic<B, V> {
    /// State value of each observation. The target path runs without
    /// gradient tracking and comes back as a constant.
    pub fn value(&self, obs: Tensor<B, 2>, use_target: bool) -> Tensor<B, 1> {
        if use_target {
            Tensor::from_inner(self.target_v_function.eval_forward(obs.inner()))
        } else {
            self.v_function.autodiff_forward(obs)
        }
    }

    /// Truncated n-step return with bootstrap, one value per episode:
    /// `sum_t gamma^t * r_t + (1 - done_L) * gamma^L * v(last_obs)`.
    ///
    /// Episodes whose final transition is terminal get no value
    /// continuation: the bootstrap term is exactly zero there.
    pub fn bootstrapped_return(
        &self,
        traj: &TrajectoryBatch<B>,
        use_target: bool,
    ) -> Result<Tensor<B, 1>, AgentError> {
        let (_, last) = traj.split_last()?;
        let length = traj.length();

        let discounts = discount_factors::<B>(self.gamma, length, &self.device);
        let discounted_rewards = (traj.rewards().clone() * discounts.unsqueeze::<2>())
            .sum_dim(1)
            .flatten::<1>(0, 1);

        let last_value = self.value(last.observation, use_target);
        let not_done = last.done.bool_not().float();
        let bootstrap = not_done * last_value.mul_scalar(self.gamma.powi(length as i32));

        Ok(discounted_rewards + bootstrap)
    }

    /// One optimization step: minimize the MSE between the live value at
    /// the initial observation and the detached target-bootstrapped
    /// return, then soft-update the target network.
    pub fn optimize(&mut self, traj: &TrajectoryBatch<B>) -> Result<FType, AgentError> {
        let expected = self.bootstrapped_return(traj, true)?.detach();
        let v = self.v_function.autodiff_forward(traj.initial_observations());

        let loss = MseLoss::new().forward(v, expected, Reduction::Mean);
        ensure_finite(&loss, "value loss")?;
        let loss_value = loss.clone().into_scalar().to_f32();

        let net = self.v_function.clone();
        self.v_function = rl_utils::update_parameters(loss, net, &mut self.optimizer, self.learning_rate);
        self.target_v_function =
            soft_update(&self.v_function, self.target_v_function.clone(), self.tau)?;

        info!("value_loss:{:.3e}", loss_value);
        Ok(loss_value)
    }

    /// Resets the target network to an exact copy of the live network.
    pub fn reset_target(&mut self) -> Result<(), AgentError> {
        self.target_v_function =
            hard_update(&self.v_function, self.target_v_function.clone())?;
        Ok(())
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    /// Re-binds the critic and both networks to another device.
    pub fn to_device(self, device: &B::Device) -> Self {
        Self {
            v_function: self.v_function.fork(device),
            target_v_function: self.target_v_function.fork(device),
            optimizer: self.optimizer,
            learning_rate: self.learning_rate,
            gamma: self.gamma,
            tau: self.tau,
            device: device.clone(),
        }
    }

    /// Persists both value networks under `dir`.
    pub fn save(&self, dir: &str) -> Result<(), AgentError> {
        let recorder = DefaultFileRecorder::<FullPrecisionSettings>::new();
        recorder
            .record(
                self.v_function.clone().into_record(),
                format!("{dir}/v_function").into(),
            )
            .map_err(|e| AgentError::Checkpoint(e.to_string()))?;
        recorder
            .record(
                self.target_v_function.clone().into_record(),
                format!("{dir}/target_v_function").into(),
            )
            .map_err(|e| AgentError::Checkpoint(e.to_string()))?;
        Ok(())
    }

    /// Restores both value networks from `dir`.
    pub fn load(mut self, dir: &str) -> Result<Self, AgentError> {
        let recorder = DefaultFileRecorder::<FullPrecisionSettings>::new();
        self.v_function = self
            .v_function
            .load_file(format!("{dir}/v_function"), &recorder, &self.device)
            .map_err(|e| AgentError::Checkpoint(e.to_string()))?;
        self.target_v_function = self
            .target_v_function
            .load_file(format!("{dir}/target_v_function"), &recorder, &self.device)
            .map_err(|e| AgentError::Checkpoint(e.to_string()))?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::{Autodiff, NdArray};
    use ndarray::{Array2, Array3};

    type TB = Autodiff<NdArray>;

    fn critic(observation_dim: usize) -> ValueCritic<TB, MlpValue<TB>> {
        let mut config = CriticConfig::new(observation_dim);
        config.n_layers = 1;
        config.layer_size = 16;
        ValueCritic::configure(&config, &NdArrayDevice::Cpu).unwrap()
    }

    fn zero_reward_batch(done_last: bool) -> TrajectoryBatch<TB> {
        let observations = Array3::from_shape_fn((3, 4, 2), |(b, t, f)| {
            0.1 * (b as f32 + 1.0) * (t as f32 + f as f32)
        });
        let actions = Array3::zeros((3, 4, 1));
        let rewards = Array2::zeros((3, 4));
        let dones = Array2::from_shape_fn((3, 4), |(_, t)| done_last && t == 3);
        TrajectoryBatch::from_arrays(observations, actions, rewards, dones, &NdArrayDevice::Cpu)
            .unwrap()
    }

    #[test]
    fn test_zero_rewards_bootstrap_is_discounted_last_value() {
        let critic = critic(2);
        let traj = zero_reward_batch(false);

        let (_, last) = traj.split_last().unwrap();
        let expected = critic
            .value(last.observation, true)
            .mul_scalar(0.99f32.powi(4));
        let actual = critic.bootstrapped_return(&traj, true).unwrap();

        let diff = (actual - expected).abs().max().into_scalar();
        assert!(diff < 1e-6);
    }

    #[test]
    fn test_terminal_episode_has_no_bootstrap() {
        let critic = critic(2);
        let traj = zero_reward_batch(true);

        let actual = critic.bootstrapped_return(&traj, true).unwrap();
        assert!(actual.abs().max().into_scalar() < 1e-7);
    }

    #[test]
    fn test_rewards_are_discounted() {
        let critic = critic(2);
        let observations = Array3::zeros((1, 3, 2));
        let actions = Array3::zeros((1, 3, 1));
        let rewards = Array2::from_shape_vec((1, 3), vec![1.0, 1.0, 1.0]).unwrap();
        let dones = Array2::from_elem((1, 3), false);
        let traj = TrajectoryBatch::from_arrays(
            observations,
            actions,
            rewards,
            dones,
            &NdArrayDevice::Cpu,
        )
        .unwrap();

        let returns = critic.bootstrapped_return(&traj, true).unwrap();
        let (_, last) = traj.split_last().unwrap();
        let tail = critic
            .value(last.observation, true)
            .mul_scalar(0.99f32.powi(3))
            .into_scalar();
        let expected = 1.0 + 0.99 + 0.99f32.powi(2) + tail;
        assert!((returns.into_scalar() - expected).abs() < 1e-5);
    }

    #[test]
    fn test_optimize_returns_finite_loss() {
        let mut critic = critic(2);
        let traj = zero_reward_batch(false);
        let loss = critic.optimize(&traj).unwrap();
        assert!(loss.is_finite());
    }

    #[test]
    fn test_optimize_rejects_non_finite_loss() {
        let mut critic = critic(1);
        let observations = Array3::from_elem((1, 2, 1), f32::NAN);
        let actions = Array3::zeros((1, 2, 1));
        let rewards = Array2::zeros((1, 2));
        let dones = Array2::from_elem((1, 2), false);
        let traj = TrajectoryBatch::from_arrays(
            observations,
            actions,
            rewards,
            dones,
            &NdArrayDevice::Cpu,
        )
        .unwrap();

        assert!(matches!(
            critic.optimize(&traj),
            Err(AgentError::Numerical(_))
        ));
    }

    #[test]
    fn test_configure_rejects_bad_hyperparameters() {
        let device = NdArrayDevice::Cpu;
        let mut config = CriticConfig::new(0);
        assert!(ValueCritic::<TB, _>::configure(&config, &device).is_err());

        config.observation_dim = 2;
        config.gamma = 0.0;
        assert!(ValueCritic::<TB, _>::configure(&config, &device).is_err());

        config.gamma = 0.99;
        config.tau = 1.5;
        assert!(ValueCritic::<TB, _>::configure(&config, &device).is_err());
    }
}
