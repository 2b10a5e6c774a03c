//! Actor-critic reinforcement-learning agents on top of burn.
//!
//! Two on-policy actors (A2C and PPO) paired with a bootstrapping value
//! critic that maintains a lagged target network. Environments, replay
//! storage and training loops live outside this crate; it consumes
//! fixed-length [`TrajectoryBatch`]es and performs one blocking gradient
//! step per `optimize` call.

pub mod burn_utils;
pub mod rl_algorithm;

/// Scalar type used for losses and logged metrics.
pub type FType = f32;

pub use burn_utils::distribution::Distribution;
pub use burn_utils::gmm::gmm_loss;
pub use burn_utils::sync::{hard_update, soft_update};
pub use rl_algorithm::a2c::{A2cActor, A2cActorConfig};
pub use rl_algorithm::base::config::ActionSpace;
pub use rl_algorithm::base::memory::{LastStep, TrajectoryBatch};
pub use rl_algorithm::critic::{CriticConfig, ValueCritic};
pub use rl_algorithm::error::AgentError;
pub use rl_algorithm::ppo::{ppo_loss, PpoActor, PpoActorConfig};
