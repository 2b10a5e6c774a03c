use burn::grad_clipping::GradientClippingConfig;
use burn::prelude::*;
use burn::record::{DefaultFileRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::cast::ToElement;
use log::info;

use crate::burn_utils::distribution::Distribution;
use crate::rl_algorithm::a2c::check_entropy_coef;
use crate::rl_algorithm::base::config::{
    check_learning_rate, check_network_dims, ActionSpace,
};
use crate::rl_algorithm::base::memory::TrajectoryBatch;
use crate::rl_algorithm::base::model::{deterministic_action, stochastic_action, PolicyModel};
use crate::rl_algorithm::base::optimizer::{AgentOptimizer, OptimizerKind};
use crate::rl_algorithm::base::rl_utils::{self, broadcast_per_episode, ensure_finite};
use crate::rl_algorithm::error::AgentError;
use crate::rl_algorithm::nets::{build_policy_net, PolicyNet};
use crate::FType;

/// Clipped-surrogate PPO loss.
///
/// The importance log-ratio `log_prob(actions) - old_log_prob` is clipped
/// asymmetrically before exponentiation: capped at `ln(1 + eps_clamp)`
/// where the advantage is positive and floored at `ln(1 - eps_clamp)`
/// where it is not, bounding how far a single step can push the policy in
/// the direction the advantage rewards. The advantage is treated as a
/// constant.
///
/// `old_distribution` is only consulted for the KL penalty and is
/// mandatory when `c_kl != 0`.
pub fn ppo_loss<B: Backend>(
    distribution: &Distribution<B>,
    actions: Tensor<B, 2>,
    advantage: Tensor<B, 1>,
    old_log_prob: Tensor<B, 1>,
    old_distribution: Option<&Distribution<B>>,
    c_entropy: f32,
    eps_clamp: f32,
    c_kl: f32,
) -> Result<Tensor<B, 1>, AgentError> {
    let advantage = advantage.detach();
    let log_ratio = distribution.independent_log_prob(actions) - old_log_prob;

    let positive = advantage.clone().greater_elem(0.0);
    let clipped = log_ratio
        .clone()
        .clamp_max((1.0 + eps_clamp).ln())
        .mask_where(positive.bool_not(), log_ratio.clamp_min((1.0 - eps_clamp).ln()));
    let ratio = clipped.exp();

    let mut loss = (ratio * advantage).mean().neg();
    if c_entropy != 0.0 {
        loss = loss - distribution.entropy().mean().mul_scalar(c_entropy);
    }
    if c_kl != 0.0 {
        let old = old_distribution.ok_or_else(|| {
            AgentError::MissingArgument(
                "old_distribution is required when c_kl != 0".to_string(),
            )
        })?;
        loss = loss + old.kl(distribution)?.mean().mul_scalar(c_kl);
    }
    Ok(loss)
}

/// Configuration surface of [`PpoActor`].
#[derive(Clone)]
pub struct PpoActorConfig {
    pub action_space: ActionSpace,
    pub observation_dim: usize,
    pub n_layers: usize,
    pub layer_size: usize,
    pub learning_rate: f64,
    /// Time-step scale multiplying the learning rate.
    pub dt: f64,
    pub optimizer: OptimizerKind,
    pub weight_decay: f32,
    /// Entropy-bonus coefficient.
    pub c_entropy: f32,
    /// Ratio-clipping epsilon, in `(0, 1)`.
    pub eps_clamp: f32,
    /// KL-penalty coefficient; zero disables the penalty.
    pub c_kl: f32,
    pub grad_clip: Option<GradientClippingConfig>,
}

impl PpoActorConfig {
    pub fn new(action_space: ActionSpace, observation_dim: usize) -> Self {
        Self {
            action_space,
            observation_dim,
            n_layers: 2,
            layer_size: 256,
            learning_rate: 1e-3,
            dt: 1.0,
            optimizer: OptimizerKind::default(),
            weight_decay: 0.0,
            c_entropy: 1e-2,
            eps_clamp: 0.2,
            c_kl: 0.0,
            grad_clip: Some(GradientClippingConfig::Norm(1.0)),
        }
    }
}

/// Proximal-policy actor: the A2C update with importance-ratio clipping
/// and an optional KL penalty against the pre-step policy.
pub struct PpoActor<B: AutodiffBackend, P: PolicyModel<B>> {
    policy_function: P,
    optimizer: AgentOptimizer<B, P>,
    learning_rate: f64,
    c_entropy: f32,
    eps_clamp: f32,
    c_kl: f32,
    device: B::Device,
}

impl<B: AutodiffBackend> PpoActor<B, PolicyNet<B>> {
    /// Builds the actor for the configured action space.
    pub fn configure(config: &PpoActorConfig, device: &B::Device) -> Result<Self, AgentError> {
        config.action_space.validate()?;
        check_network_dims(config.observation_dim, config.n_layers, config.layer_size)?;
        check_learning_rate(config.learning_rate, config.dt)?;
        check_entropy_coef(config.c_entropy)?;
        if !(config.eps_clamp > 0.0 && config.eps_clamp < 1.0) {
            return Err(AgentError::Config(format!(
                "clip epsilon must lie in (0, 1), got {}",
                config.eps_clamp
            )));
        }
        if !config.c_kl.is_finite() || config.c_kl < 0.0 {
            return Err(AgentError::Config(format!(
                "kl coefficient must be finite and non-negative, got {}",
                config.c_kl
            )));
        }

        let policy_function = build_policy_net(
            &config.action_space,
            config.observation_dim,
            config.n_layers,
            config.layer_size,
            device,
        );
        Ok(Self {
            policy_function,
            optimizer: AgentOptimizer::build(
                config.optimizer,
                config.weight_decay,
                config.grad_clip.clone(),
            ),
            learning_rate: config.learning_rate * config.dt,
            c_entropy: config.c_entropy,
            eps_clamp: config.eps_clamp,
            c_kl: config.c_kl,
            device: device.clone(),
        })
    }
}

impl<B: AutodiffBackend, P: PolicyModel<B>> PpoActor<B, P> {
    /// Deterministic action: Gaussian mean or argmax logit index.
    pub fn act(
        &self,
        obs: Tensor<B::InnerBackend, 2>,
    ) -> Result<Tensor<B::InnerBackend, 2>, AgentError> {
        deterministic_action(&self.policy_function, obs)
    }

    /// Stochastic action sampled from the current policy distribution.
    pub fn act_noisy(&self, obs: Tensor<B::InnerBackend, 2>) -> Tensor<B::InnerBackend, 2> {
        stochastic_action(&self.policy_function, obs)
    }

    /// Policy distribution at `obs` on the training backend.
    pub fn policy_distribution(&self, obs: Tensor<B, 2>) -> Distribution<B> {
        self.policy_function.autodiff_forward(obs)
    }

    /// One clipped-surrogate step. The pre-step policy supplies the old
    /// log-probabilities (and the KL reference when `c_kl != 0`) as
    /// constants; `advantage` holds one scalar per episode.
    pub fn optimize(
        &mut self,
        traj: &TrajectoryBatch<B>,
        advantage: Tensor<B, 1>,
    ) -> Result<FType, AgentError> {
        let batch_size = traj.batch_size();
        if advantage.shape().dims::<1>() != [batch_size] {
            return Err(AgentError::Shape(format!(
                "advantage has {:?} entries for {batch_size} episodes",
                advantage.shape().dims::<1>()
            )));
        }

        let obs = traj.flat_observations();
        let actions = traj.flat_actions();

        let old_distribution =
            Distribution::from_inner(self.policy_function.eval_forward(obs.clone().inner()));
        let old_log_prob = old_distribution.independent_log_prob(actions.clone());

        let distribution = self.policy_function.autodiff_forward(obs);
        let advantage = broadcast_per_episode(advantage.detach(), traj.length());

        let loss = ppo_loss(
            &distribution,
            actions,
            advantage,
            old_log_prob,
            Some(&old_distribution),
            self.c_entropy,
            self.eps_clamp,
            self.c_kl,
        )?;
        ensure_finite(&loss, "policy loss")?;

        let loss_value = loss.clone().into_scalar().to_f32();
        info!(
            "loss_actor:{:.3e}\tentropy:{:.3e}",
            loss_value,
            distribution.entropy().mean().into_scalar().to_f32()
        );

        let net = self.policy_function.clone();
        self.policy_function =
            rl_utils::update_parameters(loss, net, &mut self.optimizer, self.learning_rate);
        Ok(loss_value)
    }

    /// Re-binds the actor and its policy to another device.
    pub fn to_device(self, device: &B::Device) -> Self {
        Self {
            policy_function: self.policy_function.fork(device),
            optimizer: self.optimizer,
            learning_rate: self.learning_rate,
            c_entropy: self.c_entropy,
            eps_clamp: self.eps_clamp,
            c_kl: self.c_kl,
            device: device.clone(),
        }
    }

    /// Persists the policy network under `dir`.
    pub fn save(&self, dir: &str) -> Result<(), AgentError> {
        let recorder = DefaultFileRecorder::<FullPrecisionSettings>::new();
        recorder
            .record(
                self.policy_function.clone().into_record(),
                format!("{dir}/policy_function").into(),
            )
            .map_err(|e| AgentError::Checkpoint(e.to_string()))?;
        Ok(())
    }

    /// Restores the policy network from `dir`.
    pub fn load(mut self, dir: &str) -> Result<Self, AgentError> {
        let recorder = DefaultFileRecorder::<FullPrecisionSettings>::new();
        self.policy_function = self
            .policy_function
            .load_file(format!("{dir}/policy_function"), &recorder, &self.device)
            .map_err(|e| AgentError::Checkpoint(e.to_string()))?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::burn_utils::distribution::categorical::Categorical;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::backend::Autodiff;
    use ndarray::{Array2, Array3};

    type TB = Autodiff<NdArray>;

    fn uniform_distribution(n: usize) -> Distribution<NdArray> {
        let device = NdArrayDevice::Cpu;
        Distribution::Categorical(Categorical::new(Tensor::zeros([n, 3], &device)))
    }

    #[test]
    fn test_unit_ratio_reduces_to_mean_advantage() {
        let device = NdArrayDevice::Cpu;
        let distribution = uniform_distribution(4);
        let actions = Tensor::<NdArray, 2>::from_floats([[0.0], [1.0], [2.0], [0.0]], &device);
        let old_log_prob = distribution.independent_log_prob(actions.clone());
        let advantage = Tensor::<NdArray, 1>::from_floats([1.0, 2.0, 3.0, 4.0], &device);

        let loss = ppo_loss(
            &distribution,
            actions,
            advantage,
            old_log_prob,
            None,
            0.0,
            0.2,
            0.0,
        )
        .unwrap();
        assert!((loss.into_scalar() + 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_positive_advantage_ratio_is_capped() {
        let device = NdArrayDevice::Cpu;
        let distribution = uniform_distribution(1);
        let actions = Tensor::<NdArray, 2>::from_floats([[0.0]], &device);
        // Old policy gave this action far less probability: raw ratio e^5.
        let old_log_prob =
            distribution.independent_log_prob(actions.clone()) - 5.0;
        let advantage = Tensor::<NdArray, 1>::from_floats([1.0], &device);

        let loss = ppo_loss(
            &distribution,
            actions,
            advantage,
            old_log_prob,
            None,
            0.0,
            0.2,
            0.0,
        )
        .unwrap();
        assert!((loss.into_scalar() + 1.2).abs() < 1e-5);
    }

    #[test]
    fn test_negative_advantage_ratio_is_floored() {
        let device = NdArrayDevice::Cpu;
        let distribution = uniform_distribution(1);
        let actions = Tensor::<NdArray, 2>::from_floats([[0.0]], &device);
        let old_log_prob =
            distribution.independent_log_prob(actions.clone()) + 5.0;
        let advantage = Tensor::<NdArray, 1>::from_floats([-1.0], &device);

        let loss = ppo_loss(
            &distribution,
            actions,
            advantage,
            old_log_prob,
            None,
            0.0,
            0.2,
            0.0,
        )
        .unwrap();
        assert!((loss.into_scalar() - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_kl_penalty_requires_old_distribution() {
        let device = NdArrayDevice::Cpu;
        let distribution = uniform_distribution(2);
        let actions = Tensor::<NdArray, 2>::from_floats([[0.0], [1.0]], &device);
        let old_log_prob = distribution.independent_log_prob(actions.clone());
        let advantage = Tensor::<NdArray, 1>::from_floats([1.0, 1.0], &device);

        let missing = ppo_loss(
            &distribution,
            actions.clone(),
            advantage.clone(),
            old_log_prob.clone(),
            None,
            0.0,
            0.2,
            0.1,
        );
        assert!(matches!(missing, Err(AgentError::MissingArgument(_))));

        let disabled = ppo_loss(
            &distribution,
            actions.clone(),
            advantage.clone(),
            old_log_prob.clone(),
            None,
            0.0,
            0.2,
            0.0,
        );
        assert!(disabled.is_ok());

        let supplied = ppo_loss(
            &distribution,
            actions,
            advantage,
            old_log_prob,
            Some(&distribution),
            0.0,
            0.2,
            0.1,
        );
        // KL of a distribution against itself adds nothing.
        assert!((supplied.unwrap().into_scalar() + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_optimize_returns_finite_loss() {
        let device = NdArrayDevice::Cpu;
        let mut config = PpoActorConfig::new(ActionSpace::Discrete { count: 3 }, 4);
        config.n_layers = 1;
        config.layer_size = 16;
        config.c_kl = 0.1;
        let mut actor = PpoActor::<TB, _>::configure(&config, &device).unwrap();

        let observations =
            Array3::from_shape_fn((2, 3, 4), |(b, t, f)| 0.1 * (b + t + f) as f32);
        let actions = Array3::from_shape_fn((2, 3, 1), |(b, t, _)| ((b + t) % 3) as f32);
        let rewards = Array2::zeros((2, 3));
        let dones = Array2::from_elem((2, 3), false);
        let traj =
            TrajectoryBatch::from_arrays(observations, actions, rewards, dones, &device).unwrap();

        let advantage = Tensor::<TB, 1>::from_floats([0.5, -0.5], &device);
        let loss = actor.optimize(&traj, advantage).unwrap();
        assert!(loss.is_finite());
    }

    #[test]
    fn test_configure_rejects_bad_epsilon() {
        let device = NdArrayDevice::Cpu;
        let mut config = PpoActorConfig::new(ActionSpace::Discrete { count: 3 }, 4);
        config.eps_clamp = 1.0;
        assert!(matches!(
            PpoActor::<TB, _>::configure(&config, &device),
            Err(AgentError::Config(_))
        ));
    }
}
