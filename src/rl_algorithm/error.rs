use thiserror::Error;

/// Failures raised by agents, the critic and the numerical utilities.
///
/// Every variant is fatal to the optimization step that raised it; callers
/// decide whether to abort training or restore a checkpoint. There is no
/// retry path.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Empty trajectory, or tensor shapes that disagree between components.
    #[error("shape error: {0}")]
    Shape(String),

    /// A deterministic continuous action came out NaN or infinite.
    #[error("non-finite action: {0}")]
    NonFiniteAction(String),

    /// A loss term became NaN or infinite before the optimizer step.
    #[error("non-finite value in {0}")]
    Numerical(String),

    /// An optional argument became mandatory for the requested computation.
    #[error("missing argument: {0}")]
    MissingArgument(String),

    /// Live and target networks do not share the same parameter topology.
    #[error("parameter topology mismatch: {0}")]
    TopologyMismatch(String),

    /// Rejected configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Checkpoint serialization or deserialization failed.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),
}
