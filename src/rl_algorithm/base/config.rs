use crate::rl_algorithm::error::AgentError;

/// Explicit action-space discriminant, chosen by the caller instead of
/// being inferred from runtime types.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionSpace {
    /// Bounded box `[-bound, bound]^dim`.
    Continuous { dim: usize, bound: f32 },
    /// `count` distinct actions, encoded as index-valued tensors.
    Discrete { count: usize },
}

impl ActionSpace {
    /// Width of action tensors for this space: `dim` for continuous
    /// spaces, one index column for discrete ones.
    pub fn action_dim(&self) -> usize {
        match self {
            ActionSpace::Continuous { dim, .. } => *dim,
            ActionSpace::Discrete { .. } => 1,
        }
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        match self {
            ActionSpace::Continuous { dim, bound } => {
                if *dim == 0 {
                    return Err(AgentError::Config(
                        "continuous action space needs at least one dimension".to_string(),
                    ));
                }
                if !bound.is_finite() || *bound <= 0.0 {
                    return Err(AgentError::Config(format!(
                        "continuous action bound must be positive and finite, got {bound}"
                    )));
                }
            }
            ActionSpace::Discrete { count } => {
                if *count < 2 {
                    return Err(AgentError::Config(format!(
                        "discrete action space needs at least two actions, got {count}"
                    )));
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn check_network_dims(
    observation_dim: usize,
    n_layers: usize,
    layer_size: usize,
) -> Result<(), AgentError> {
    if observation_dim == 0 {
        return Err(AgentError::Config(
            "observation space needs at least one feature".to_string(),
        ));
    }
    if n_layers == 0 || layer_size == 0 {
        return Err(AgentError::Config(format!(
            "network needs at least one hidden layer of nonzero width, got {n_layers}x{layer_size}"
        )));
    }
    Ok(())
}

pub(crate) fn check_unit_interval(name: &str, value: f32) -> Result<(), AgentError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(AgentError::Config(format!(
            "{name} must lie in [0, 1], got {value}"
        )));
    }
    Ok(())
}

pub(crate) fn check_discount(gamma: f32) -> Result<(), AgentError> {
    if !(gamma > 0.0 && gamma <= 1.0) {
        return Err(AgentError::Config(format!(
            "discount gamma must lie in (0, 1], got {gamma}"
        )));
    }
    Ok(())
}

pub(crate) fn check_learning_rate(lr: f64, dt: f64) -> Result<(), AgentError> {
    if !(lr > 0.0 && lr.is_finite()) || !(dt > 0.0 && dt.is_finite()) {
        return Err(AgentError::Config(format!(
            "learning rate and step scale must be positive and finite, got {lr} and {dt}"
        )));
    }
    Ok(())
}
