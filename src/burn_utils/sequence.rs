use burn::{
    nn::{Linear, LinearConfig, Relu, Tanh},
    prelude::*,
};

#[derive(Module, Debug)]
pub enum Forwarder<B: Backend> {
    Linear(Linear<B>),
    Relu(Relu),
    Tanh(Tanh),
}

/// A flat stack of forwarders applied in order.
#[derive(Module, Debug)]
pub struct Sequence<B: Backend> {
    forwarder_vec: Vec<Forwarder<B>>,
}

impl<B: Backend> Sequence<B> {
    pub fn push(&mut self, forwarder: Forwarder<B>) {
        self.forwarder_vec.push(forwarder);
    }

    pub fn forward<const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        let mut out = input;
        for forwarder in &self.forwarder_vec {
            out = match forwarder {
                Forwarder::Linear(linear) => linear.forward(out),
                Forwarder::Relu(relu) => relu.forward(out),
                Forwarder::Tanh(tanh) => tanh.forward(out),
            }
        }
        out
    }
}

/// Builds `n_layers` hidden Linear+Relu blocks followed by a Linear head.
pub fn build_mlp<B: Backend>(
    input_size: usize,
    output_size: usize,
    n_layers: usize,
    hidden_dim: usize,
    device: &B::Device,
) -> Sequence<B> {
    let mut seq: Sequence<B> = Sequence {
        forwarder_vec: vec![],
    };
    let mut in_size = input_size;
    for _ in 0..n_layers {
        seq.push(Forwarder::Linear(
            LinearConfig::new(in_size, hidden_dim).init(device),
        ));
        seq.push(Forwarder::Relu(Relu::new()));
        in_size = hidden_dim;
    }
    seq.push(Forwarder::Linear(
        LinearConfig::new(in_size, output_size).init(device),
    ));
    seq
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    #[test]
    fn test_build_mlp_shapes() {
        let device = NdArrayDevice::Cpu;
        let mlp = build_mlp::<NdArray>(4, 3, 2, 16, &device);
        let input = Tensor::<NdArray, 2>::zeros([5, 4], &device);
        let out = mlp.forward(input);
        assert_eq!(out.shape().dims, [5, 3]);
    }

    #[test]
    fn test_build_mlp_no_hidden_layer() {
        let device = NdArrayDevice::Cpu;
        let mlp = build_mlp::<NdArray>(4, 2, 0, 16, &device);
        let input = Tensor::<NdArray, 2>::zeros([1, 4], &device);
        let out = mlp.forward(input);
        assert_eq!(out.shape().dims, [1, 2]);
    }
}
