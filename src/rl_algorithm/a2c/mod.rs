use burn::grad_clipping::GradientClippingConfig;
use burn::prelude::*;
use burn::record::{DefaultFileRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::cast::ToElement;
use log::info;

use crate::burn_utils::distribution::Distribution;
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

/// Configuration surface of [`A2cActor`].
#[derive(Clone)]
pub struct A2cActorConfig {
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
    pub grad_clip: Option<GradientClippingConfig>,
}

impl A2cActorConfig {
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
            grad_clip: Some(GradientClippingConfig::Norm(1.0)),
        }
    }
}

pub(crate) fn check_entropy_coef(c_entropy: f32) -> Result<(), AgentError> {
    if !c_entropy.is_finite() || c_entropy < 0.0 {
        return Err(AgentError::Config(format!(
            "entropy coefficient must be finite and non-negative, got {c_entropy}"
        )));
    }
    Ok(())
}

/// Advantage actor: entropy-regularized policy gradient weighted by a
/// caller-supplied advantage signal.
///
/// Stateless between calls apart from the policy parameters; `act` and
/// `act_noisy` are read-only inference, `optimize` performs exactly one
/// gradient step.
pub struct A2cActor<B: AutodiffBackend, P: PolicyModel<B>> {
    policy_function: P,
    optimizer: AgentOptimizer<B, P>,
    learning_rate: f64,
    c_entropy: f32,
    device: B::Device,
}

impl<B: AutodiffBackend> A2cActor<B, PolicyNet<B>> {
    /// Builds the actor for the configured action space.
    pub fn configure(config: &A2cActorConfig, device: &B::Device) -> Result<Self, AgentError> {
        config.action_space.validate()?;
        check_network_dims(config.observation_dim, config.n_layers, config.layer_size)?;
        check_learning_rate(config.learning_rate, config.dt)?;
        check_entropy_coef(config.c_entropy)?;

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
            device: device.clone(),
        })
    }
}

impl<B: AutodiffBackend, P: PolicyModel<B>> A2cActor<B, P> {
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

    /// One policy-gradient step. `advantage` holds one scalar per episode
    /// and is treated as a constant: no gradient flows through it.
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

        let distribution = self.policy_function.autodiff_forward(traj.flat_observations());
        let log_prob = distribution.independent_log_prob(traj.flat_actions());
        let entropy = distribution.entropy();

        let advantage = broadcast_per_episode(advantage.detach(), traj.length());
        let policy_loss = (log_prob * advantage).mean().neg();
        let entropy_mean = entropy.mean();
        let loss = policy_loss.clone() - entropy_mean.clone().mul_scalar(self.c_entropy);
        ensure_finite(&loss, "policy loss")?;

        let loss_value = loss.clone().into_scalar().to_f32();
        info!(
            "loss_actor:{:.3e}\tentropy:{:.3e}",
            policy_loss.into_scalar().to_f32(),
            entropy_mean.into_scalar().to_f32()
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
