use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Fully connected layer, weights stored row-major (`outputs` rows of `inputs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub inputs: usize,
    pub outputs: usize,
    pub weights: Vec<f32>,
    pub biases: Vec<f32>,
}

impl DenseLayer {
    /// Uniform Xavier/Glorot initialization.
    fn new(inputs: usize, outputs: usize, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (inputs + outputs) as f32).sqrt();
        let weights = (0..inputs * outputs)
            .map(|_| rng.gen_range(-limit..limit))
            .collect();
        Self {
            inputs,
            outputs,
            weights,
            biases: vec![0.0; outputs],
        }
    }

    fn forward(&self, x: &[f32]) -> Vec<f32> {
        self.weights
            .chunks_exact(self.inputs)
            .zip(&self.biases)
            .map(|(row, b)| row.iter().zip(x).map(|(w, v)| w * v).sum::<f32>() + b)
            .collect()
    }

    fn is_consistent(&self) -> bool {
        self.weights.len() == self.inputs * self.outputs && self.biases.len() == self.outputs
    }
}

/// Intermediate values kept from a forward pass for the backward pass.
#[derive(Debug, Clone)]
pub struct Activations {
    pub hidden: Vec<f32>,
    pub probabilities: Vec<f32>,
}

/// D -> H (ReLU) -> C (softmax).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    hidden: DenseLayer,
    output: DenseLayer,
}

impl Mlp {
    pub fn new(inputs: usize, hidden: usize, outputs: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            hidden: DenseLayer::new(inputs, hidden, &mut rng),
            output: DenseLayer::new(hidden, outputs, &mut rng),
        }
    }

    pub fn input_dim(&self) -> usize {
        self.hidden.inputs
    }

    pub fn output_dim(&self) -> usize {
        self.output.outputs
    }

    /// Shapes line up end to end. Checked on anything loaded from disk.
    pub fn is_consistent(&self) -> bool {
        self.hidden.is_consistent()
            && self.output.is_consistent()
            && self.hidden.outputs == self.output.inputs
    }

    pub fn forward(&self, x: &[f32]) -> Activations {
        let hidden: Vec<f32> = self
            .hidden
            .forward(x)
            .into_iter()
            .map(|z| z.max(0.0))
            .collect();
        let probabilities = softmax(&self.output.forward(&hidden));
        Activations {
            hidden,
            probabilities,
        }
    }

    /// One SGD step given the loss gradient with respect to the output logits.
    pub fn backward(&mut self, x: &[f32], acts: &Activations, grad_logits: &[f32], lr: f32) {
        let h = self.hidden.outputs;

        // Gradient reaching the hidden activations, taken before the output weights move.
        let mut grad_hidden = vec![0.0f32; h];
        for (j, g) in grad_logits.iter().enumerate() {
            let row = &self.output.weights[j * h..(j + 1) * h];
            for (gh, w) in grad_hidden.iter_mut().zip(row) {
                *gh += w * g;
            }
        }

        for (j, g) in grad_logits.iter().enumerate() {
            let row = &mut self.output.weights[j * h..(j + 1) * h];
            for (w, a) in row.iter_mut().zip(&acts.hidden) {
                *w -= lr * g * a;
            }
            self.output.biases[j] -= lr * g;
        }

        let d = self.hidden.inputs;
        for (k, gh) in grad_hidden.iter().enumerate() {
            // ReLU gate.
            if acts.hidden[k] <= 0.0 {
                continue;
            }
            let row = &mut self.hidden.weights[k * d..(k + 1) * d];
            for (w, v) in row.iter_mut().zip(x) {
                *w -= lr * gh * v;
            }
            self.hidden.biases[k] -= lr * gh;
        }
    }
}

/// Numerically stable softmax. Empty in, empty out.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|z| (z - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        let n = logits.len().max(1) as f32;
        return vec![1.0 / n; logits.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}
