use burn::module::{Module, ModuleMapper, ModuleVisitor, ParamId};
use burn::prelude::*;

use crate::rl_algorithm::error::AgentError;

/// Parameters flattened to 1D with their original shapes, collected in
/// traversal order. Traversal order is deterministic for a fixed module
/// structure, which lets two independently initialized networks of the same
/// architecture be matched position by position.
struct ParamCollector<B: Backend> {
    floats: Vec<(Vec<usize>, Tensor<B, 1>)>,
    ints: Vec<(Vec<usize>, Tensor<B, 1, Int>)>,
    bools: Vec<(Vec<usize>, Tensor<B, 1, Bool>)>,
}

impl<B: Backend> ParamCollector<B> {
    fn collect<M: Module<B>>(module: &M) -> Self {
        let mut collector = Self {
            floats: Vec::new(),
            ints: Vec::new(),
            bools: Vec::new(),
        };
        module.visit(&mut collector);
        collector
    }
}

impl<B: Backend> ModuleVisitor<B> for ParamCollector<B> {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        let dims = tensor.dims().to_vec();
        let numel = dims.iter().product::<usize>();
        self.floats.push((dims, tensor.clone().reshape([numel])));
    }

    fn visit_int<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D, Int>) {
        let dims = tensor.dims().to_vec();
        let numel = dims.iter().product::<usize>();
        self.ints.push((dims, tensor.clone().reshape([numel])));
    }

    fn visit_bool<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D, Bool>) {
        let dims = tensor.dims().to_vec();
        let numel = dims.iter().product::<usize>();
        self.bools.push((dims, tensor.clone().reshape([numel])));
    }
}

/// Writes live values into the target module: float parameters are blended
/// with `retention` kept on the target side, non-float tensors (buffers)
/// are copied verbatim.
struct SyncMapper<B: Backend> {
    live: ParamCollector<B>,
    retention: f32,
    float_idx: usize,
    int_idx: usize,
    bool_idx: usize,
}

impl<B: Backend> ModuleMapper<B> for SyncMapper<B> {
    fn map_float<const D: usize>(&mut self, _id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        let dims: [usize; D] = tensor.dims();
        let (_, live) = &self.live.floats[self.float_idx];
        self.float_idx += 1;
        let live = live.clone().reshape(dims);
        let out = if self.retention == 0.0 {
            live
        } else if self.retention == 1.0 {
            tensor
        } else {
            tensor * self.retention + live * (1.0 - self.retention)
        };
        out.detach()
    }

    fn map_int<const D: usize>(
        &mut self,
        _id: ParamId,
        tensor: Tensor<B, D, Int>,
    ) -> Tensor<B, D, Int> {
        let dims: [usize; D] = tensor.dims();
        let (_, live) = &self.live.ints[self.int_idx];
        self.int_idx += 1;
        live.clone().reshape(dims)
    }

    fn map_bool<const D: usize>(
        &mut self,
        _id: ParamId,
        tensor: Tensor<B, D, Bool>,
    ) -> Tensor<B, D, Bool> {
        let dims: [usize; D] = tensor.dims();
        let (_, live) = &self.live.bools[self.bool_idx];
        self.bool_idx += 1;
        live.clone().reshape(dims)
    }
}

fn check_topology<B: Backend>(
    live: &ParamCollector<B>,
    target: &ParamCollector<B>,
) -> Result<(), AgentError> {
    let live_shapes: Vec<&Vec<usize>> = live.floats.iter().map(|(s, _)| s).collect();
    let target_shapes: Vec<&Vec<usize>> = target.floats.iter().map(|(s, _)| s).collect();
    if live_shapes != target_shapes {
        return Err(AgentError::TopologyMismatch(format!(
            "float parameters {live_shapes:?} vs {target_shapes:?}"
        )));
    }
    let live_buffers: Vec<&Vec<usize>> = live.ints.iter().map(|(s, _)| s).collect();
    let target_buffers: Vec<&Vec<usize>> = target.ints.iter().map(|(s, _)| s).collect();
    if live_buffers != target_buffers
        || live.bools.len() != target.bools.len()
        || live
            .bools
            .iter()
            .zip(target.bools.iter())
            .any(|((a, _), (b, _))| a != b)
    {
        return Err(AgentError::TopologyMismatch(
            "buffer tensors differ between live and target".to_string(),
        ));
    }
    Ok(())
}

fn sync<B: Backend, M: Module<B>>(live: &M, target: M, retention: f32) -> Result<M, AgentError> {
    let live_params = ParamCollector::collect(live);
    let target_params = ParamCollector::collect(&target);
    check_topology(&live_params, &target_params)?;

    let mut mapper = SyncMapper {
        live: live_params,
        retention,
        float_idx: 0,
        int_idx: 0,
        bool_idx: 0,
    };
    Ok(target.map(&mut mapper))
}

/// Copies every parameter and buffer of `live` into `target` verbatim.
///
/// Both networks must share the same architecture; a parameter-count or
/// shape disagreement is a [`AgentError::TopologyMismatch`].
pub fn hard_update<B: Backend, M: Module<B>>(live: &M, target: M) -> Result<M, AgentError> {
    sync(live, target, 0.0)
}

/// Exponential blend of `target` toward `live`:
/// `target <- tau * target + (1 - tau) * live`.
///
/// `tau` is the retention weight of the target parameter: `tau = 1` leaves
/// the target parameters untouched, `tau = 0` equals [`hard_update`].
/// Buffers are copied verbatim in every case, never blended.
pub fn soft_update<B: Backend, M: Module<B>>(
    live: &M,
    target: M,
    tau: f32,
) -> Result<M, AgentError> {
    if !(0.0..=1.0).contains(&tau) {
        return Err(AgentError::Config(format!(
            "soft update retention tau must lie in [0, 1], got {tau}"
        )));
    }
    sync(live, target, tau)
}
