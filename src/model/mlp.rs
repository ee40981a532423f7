//! Multi-output multilayer perceptron.
//!
//! Hidden layers apply the configured activation; the output layer is linear
//! and is split into consecutive segments, one per category head. The code
//! predicted for a head is the arg-max of its segment.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ModelError;

/// A fitted classifier producing one code per category head
pub trait Classifier {
    /// Expected length of an input vector
    fn input_width(&self) -> usize;

    /// Number of classes of every head, in category order
    fn heads(&self) -> &[usize];

    /// Predict one code per head for a single input vector
    fn predict(&self, input: &[f64]) -> Result<Vec<usize>, ModelError>;
}

/// Hidden-layer activation function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// `max(0, x)`
    Relu,
    /// Hyperbolic tangent
    Tanh,
    /// Logistic sigmoid
    Logistic,
    /// No-op
    Identity,
}

impl Activation {
    #[inline]
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Tanh => x.tanh(),
            Activation::Logistic => 1.0 / (1.0 + (-x).exp()),
            Activation::Identity => x,
        }
    }
}

/// Dense layer, `weights` is `out x in`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Weight matrix, one row per output unit
    pub weights: Vec<Vec<f64>>,
    /// Bias per output unit
    pub bias: Vec<f64>,
}

impl Layer {
    fn inputs(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    fn outputs(&self) -> usize {
        self.bias.len()
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect()
    }
}

/// Feed-forward network with one output segment per category.
///
/// Deserializing goes through the same shape checks as [`Mlp::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MlpArtifact")]
pub struct Mlp {
    activation: Activation,
    layers: Vec<Layer>,
    heads: Vec<usize>,
}

/// Unchecked on-disk form of [`Mlp`]
#[derive(Deserialize)]
struct MlpArtifact {
    activation: Activation,
    layers: Vec<Layer>,
    heads: Vec<usize>,
}

impl TryFrom<MlpArtifact> for Mlp {
    type Error = ModelError;

    fn try_from(artifact: MlpArtifact) -> Result<Self, Self::Error> {
        Mlp::new(artifact.activation, artifact.layers, artifact.heads)
    }
}

impl Mlp {
    /// Build a network, checking that layer shapes chain and that the output
    /// width matches the heads
    pub fn new(activation: Activation, layers: Vec<Layer>, heads: Vec<usize>) -> Result<Self, ModelError> {
        let mlp = Self {
            activation,
            layers,
            heads,
        };
        mlp.validate()?;
        Ok(mlp)
    }

    /// Load a classifier artifact
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.layers.is_empty() {
            return Err(ModelError::DimensionMismatch("classifier has no layers".into()));
        }
        if self.heads.is_empty() || self.heads.contains(&0) {
            return Err(ModelError::DimensionMismatch(format!(
                "invalid head sizes {:?}",
                self.heads
            )));
        }

        let mut expected_in = self.layers[0].inputs();
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.weights.len() != layer.outputs() {
                return Err(ModelError::DimensionMismatch(format!(
                    "layer {} has {} weight rows but {} biases",
                    i,
                    layer.weights.len(),
                    layer.outputs()
                )));
            }
            if layer.weights.iter().any(|row| row.len() != expected_in) {
                return Err(ModelError::DimensionMismatch(format!(
                    "layer {} expects {} inputs",
                    i, expected_in
                )));
            }
            expected_in = layer.outputs();
        }

        let total: usize = self.heads.iter().sum();
        if expected_in != total {
            return Err(ModelError::DimensionMismatch(format!(
                "output layer has {} units, heads need {}",
                expected_in, total
            )));
        }
        Ok(())
    }
}

impl Classifier for Mlp {
    fn input_width(&self) -> usize {
        self.layers.first().map_or(0, Layer::inputs)
    }

    fn heads(&self) -> &[usize] {
        &self.heads
    }

    fn predict(&self, input: &[f64]) -> Result<Vec<usize>, ModelError> {
        if input.len() != self.input_width() {
            return Err(ModelError::DimensionMismatch(format!(
                "input has {} features, classifier expects {}",
                input.len(),
                self.input_width()
            )));
        }

        let last = self.layers.len() - 1;
        let mut activations = input.to_vec();
        for (i, layer) in self.layers.iter().enumerate() {
            activations = layer.forward(&activations);
            if i < last {
                activations
                    .iter_mut()
                    .for_each(|x| *x = self.activation.apply(*x));
            }
        }

        let mut codes = Vec::with_capacity(self.heads.len());
        let mut offset = 0;
        for &size in &self.heads {
            codes.push(argmax(&activations[offset..offset + size]));
            offset += size;
        }
        Ok(codes)
    }
}

/// Index of the largest value; the first one wins ties
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
