use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{Adam, AdamConfig, AdamW, AdamWConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn::LearningRate;

/// Gradient-descent algorithm selector.
///
/// Unsupported algorithms are unrepresentable; the selection is made at
/// configuration time, not parsed from a string at step time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    Adam,
    AdamW,
}

impl Default for OptimizerKind {
    fn default() -> Self {
        OptimizerKind::AdamW
    }
}

/// A built optimizer for one network, dispatching over [`OptimizerKind`].
pub enum AgentOptimizer<B: AutodiffBackend, M: AutodiffModule<B>> {
    Adam(OptimizerAdaptor<Adam, M, B>),
    AdamW(OptimizerAdaptor<AdamW, M, B>),
}

impl<B: AutodiffBackend, M: AutodiffModule<B>> AgentOptimizer<B, M> {
    pub fn build(
        kind: OptimizerKind,
        weight_decay: f32,
        grad_clip: Option<GradientClippingConfig>,
    ) -> Self {
        match kind {
            OptimizerKind::Adam => AgentOptimizer::Adam(
                AdamConfig::new()
                    .with_weight_decay(Some(WeightDecayConfig::new(weight_decay.into())))
                    .with_grad_clipping(grad_clip)
                    .init(),
            ),
            OptimizerKind::AdamW => AgentOptimizer::AdamW(
                AdamWConfig::new()
                    .with_weight_decay(weight_decay.into())
                    .with_grad_clipping(grad_clip)
                    .init(),
            ),
        }
    }

    pub fn step(&mut self, lr: LearningRate, module: M, grads: GradientsParams) -> M {
        match self {
            AgentOptimizer::Adam(optimizer) => optimizer.step(lr, module, grads),
            AgentOptimizer::AdamW(optimizer) => optimizer.step(lr, module, grads),
        }
    }
}
