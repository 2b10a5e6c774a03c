use burn::{
    prelude::Backend,
    tensor::{Bool, Tensor},
};
use ndarray::{Array2, Array3};

use super::rl_utils::{bool_ndarray2tensor2, ndarray2tensor2, ndarray2tensor3};
use crate::rl_algorithm::error::AgentError;

/// The split-off final transition of a batch, one entry per episode.
#[derive(Debug, Clone)]
pub struct LastStep<B: Backend> {
    pub observation: Tensor<B, 2>,
    pub action: Tensor<B, 2>,
    pub reward: Tensor<B, 1>,
    pub done: Tensor<B, 1, Bool>,
}

/// A fixed-length batch of transitions: `batch_size` parallel episodes that
/// all share the same time `length`.
///
/// Read-only after construction; [`to_device`](Self::to_device) returns a
/// new batch instead of mutating. Discrete actions travel as index-valued
/// float tensors with `action_dim = 1`.
pub struct TrajectoryBatch<B: Backend> {
    observations: Tensor<B, 3>, // (batch_size, length, obs_dim)
    actions: Tensor<B, 3>,      // (batch_size, length, action_dim)
    rewards: Tensor<B, 2>,      // (batch_size, length)
    dones: Tensor<B, 2, Bool>,  // (batch_size, length)
    batch_size: usize,
    length: usize,
    obs_dim: usize,
    action_dim: usize,
    device: B::Device,
}

impl<B: Backend> TrajectoryBatch<B> {
    pub fn new(
        observations: Tensor<B, 3>,
        actions: Tensor<B, 3>,
        rewards: Tensor<B, 2>,
        dones: Tensor<B, 2, Bool>,
    ) -> Result<Self, AgentError> {
        let [batch_size, length, obs_dim] = observations.shape().dims();
        let [ab, al, action_dim] = actions.shape().dims();
        if length == 0 {
            return Err(AgentError::Shape("trajectory length 0".to_string()));
        }
        if ab != batch_size || al != length {
            return Err(AgentError::Shape(format!(
                "actions ({ab}, {al}, _) do not align with observations ({batch_size}, {length}, _)"
            )));
        }
        if rewards.shape().dims::<2>() != [batch_size, length]
            || dones.shape().dims::<2>() != [batch_size, length]
        {
            return Err(AgentError::Shape(format!(
                "rewards/dones do not align with ({batch_size}, {length}) episodes"
            )));
        }
        let device = observations.device();
        Ok(Self {
            observations,
            actions,
            rewards,
            dones,
            batch_size,
            length,
            obs_dim,
            action_dim,
            device,
        })
    }

    /// Builds a batch from host arrays, checking that `done` is monotonic
    /// within each episode (a terminated episode stays terminated).
    pub fn from_arrays(
        observations: Array3<f32>,
        actions: Array3<f32>,
        rewards: Array2<f32>,
        dones: Array2<bool>,
        device: &B::Device,
    ) -> Result<Self, AgentError> {
        if observations.shape()[1] == 0 {
            return Err(AgentError::Shape("trajectory length 0".to_string()));
        }
        for (episode, row) in dones.outer_iter().enumerate() {
            let mut terminated = false;
            for &done in row.iter() {
                if terminated && !done {
                    return Err(AgentError::Shape(format!(
                        "done flag regresses within episode {episode}"
                    )));
                }
                terminated |= done;
            }
        }

        Self::new(
            ndarray2tensor3(observations, device),
            ndarray2tensor3(actions, device),
            ndarray2tensor2(rewards, device),
            bool_ndarray2tensor2(dones, device),
        )
    }

    pub fn observations(&self) -> &Tensor<B, 3> {
        &self.observations
    }

    pub fn actions(&self) -> &Tensor<B, 3> {
        &self.actions
    }

    pub fn rewards(&self) -> &Tensor<B, 2> {
        &self.rewards
    }

    pub fn dones(&self) -> &Tensor<B, 2, Bool> {
        &self.dones
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn obs_dim(&self) -> usize {
        self.obs_dim
    }

    pub fn action_dim(&self) -> usize {
        self.action_dim
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Observations of every timestep flattened to `(batch * length, obs_dim)`.
    pub fn flat_observations(&self) -> Tensor<B, 2> {
        self.observations.clone().flatten::<2>(0, 1)
    }

    /// Actions of every timestep flattened to `(batch * length, action_dim)`.
    pub fn flat_actions(&self) -> Tensor<B, 2> {
        self.actions.clone().flatten::<2>(0, 1)
    }

    /// Observations at `t = 0`, shape `(batch, obs_dim)`.
    pub fn initial_observations(&self) -> Tensor<B, 2> {
        self.observations
            .clone()
            .slice([0..self.batch_size, 0..1])
            .squeeze(1)
    }

    /// Splits off the final transition, leaving the summed-reward prefix.
    pub fn split_last(&self) -> Result<(TrajectoryBatch<B>, LastStep<B>), AgentError> {
        if self.length < 1 {
            return Err(AgentError::Shape(
                "cannot split the last step of an empty trajectory".to_string(),
            ));
        }
        let b = self.batch_size;
        let l = self.length;

        let last = LastStep {
            observation: self.observations.clone().slice([0..b, l - 1..l]).squeeze(1),
            action: self.actions.clone().slice([0..b, l - 1..l]).squeeze(1),
            reward: self.rewards.clone().slice([0..b, l - 1..l]).squeeze(1),
            done: self.dones.clone().slice([0..b, l - 1..l]).squeeze(1),
        };

        let truncated = if l == 1 {
            TrajectoryBatch {
                observations: Tensor::empty([b, 0, self.obs_dim], &self.device),
                actions: Tensor::empty([b, 0, self.action_dim], &self.device),
                rewards: Tensor::empty([b, 0], &self.device),
                dones: Tensor::empty([b, 0], &self.device),
                batch_size: b,
                length: 0,
                obs_dim: self.obs_dim,
                action_dim: self.action_dim,
                device: self.device.clone(),
            }
        } else {
            TrajectoryBatch {
                observations: self.observations.clone().slice([0..b, 0..l - 1]),
                actions: self.actions.clone().slice([0..b, 0..l - 1]),
                rewards: self.rewards.clone().slice([0..b, 0..l - 1]),
                dones: self.dones.clone().slice([0..b, 0..l - 1]),
                batch_size: b,
                length: l - 1,
                obs_dim: self.obs_dim,
                action_dim: self.action_dim,
                device: self.device.clone(),
            }
        };

        Ok((truncated, last))
    }

    /// An equivalent batch bound to `device`; `self` is left untouched.
    pub fn to_device(&self, device: &B::Device) -> Self {
        Self {
            observations: self.observations.clone().to_device(device),
            actions: self.actions.clone().to_device(device),
            rewards: self.rewards.clone().to_device(device),
            dones: self.dones.clone().to_device(device),
            batch_size: self.batch_size,
            length: self.length,
            obs_dim: self.obs_dim,
            action_dim: self.action_dim,
            device: device.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use ndarray::{Array2, Array3};

    fn sample_batch() -> TrajectoryBatch<NdArray> {
        let device = NdArrayDevice::Cpu;
        let observations =
            Array3::from_shape_fn((2, 3, 4), |(b, t, f)| (b * 100 + t * 10 + f) as f32);
        let actions = Array3::from_shape_fn((2, 3, 1), |(b, t, _)| (b * 10 + t) as f32);
        let rewards = Array2::from_shape_fn((2, 3), |(b, t)| b as f32 + t as f32 * 0.5);
        let dones = Array2::from_shape_fn((2, 3), |(b, t)| b == 1 && t == 2);
        TrajectoryBatch::from_arrays(observations, actions, rewards, dones, &device).unwrap()
    }

    #[test]
    fn test_construction_and_accessors() {
        let batch = sample_batch();
        assert_eq!(batch.batch_size(), 2);
        assert_eq!(batch.length(), 3);
        assert_eq!(batch.obs_dim(), 4);
        assert_eq!(batch.action_dim(), 1);
        assert_eq!(batch.flat_observations().shape().dims, [6, 4]);
        assert_eq!(batch.initial_observations().shape().dims, [2, 4]);
    }

    #[test]
    fn test_split_last() {
        let batch = sample_batch();
        let (truncated, last) = batch.split_last().unwrap();

        assert_eq!(truncated.length(), 2);
        assert_eq!(last.observation.shape().dims, [2, 4]);

        let last_rewards = last.reward.into_data().into_vec::<f32>().unwrap();
        assert_eq!(last_rewards, vec![1.0, 2.0]);

        let last_dones = last.done.into_data().into_vec::<bool>().unwrap();
        assert_eq!(last_dones, vec![false, true]);
    }

    #[test]
    fn test_zero_length_is_rejected() {
        let device = NdArrayDevice::Cpu;
        let result = TrajectoryBatch::<NdArray>::from_arrays(
            Array3::zeros((2, 0, 4)),
            Array3::zeros((2, 0, 1)),
            Array2::zeros((2, 0)),
            Array2::from_elem((2, 0), false),
            &device,
        );
        assert!(matches!(result, Err(AgentError::Shape(_))));
    }

    #[test]
    fn test_done_regression_is_rejected() {
        let device = NdArrayDevice::Cpu;
        let mut dones = Array2::from_elem((1, 3), false);
        dones[[0, 1]] = true;
        let result = TrajectoryBatch::<NdArray>::from_arrays(
            Array3::zeros((1, 3, 2)),
            Array3::zeros((1, 3, 1)),
            Array2::zeros((1, 3)),
            dones,
            &device,
        );
        assert!(matches!(result, Err(AgentError::Shape(_))));
    }

    #[test]
    fn test_to_device_preserves_contents() {
        let batch = sample_batch();
        let moved = batch.to_device(&NdArrayDevice::Cpu);
        let diff = (batch.rewards().clone() - moved.rewards().clone())
            .abs()
            .sum()
            .into_scalar();
        assert_eq!(diff, 0.0);
    }
}
