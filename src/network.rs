use crate::error::{Error, Result};
use crate::utils::softmax;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dense row-major matrix. Serialized as a list of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { rows, cols, data: vec![0.0; rows * cols] }
    }

    /// Reshape a flat buffer; fails when the element count is off.
    pub fn from_flat(name: &str, rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::ShapeMismatch {
                name: name.to_string(),
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.data[r * self.cols + c]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }
}

impl TryFrom<Vec<Vec<f64>>> for Matrix {
    type Error = String;

    fn try_from(rows: Vec<Vec<f64>>) -> std::result::Result<Self, Self::Error> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != cols) {
            return Err("ragged matrix rows".to_string());
        }
        let n = rows.len();
        Ok(Self { rows: n, cols, data: rows.into_iter().flatten().collect() })
    }
}

impl From<Matrix> for Vec<Vec<f64>> {
    fn from(m: Matrix) -> Self {
        if m.cols == 0 {
            return vec![Vec::new(); m.rows];
        }
        m.data.chunks(m.cols).map(<[f64]>::to_vec).collect()
    }
}

/// Weights `W_i` of shape `(n_{i-1}, n_i)` and biases `b_i` of shape `(n_i, 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    pub weights: Vec<Matrix>,
    pub biases: Vec<Matrix>,
}

impl Params {
    /// Zero-mean Gaussian weights with variance `2 / n_i`, zero biases.
    pub fn he_init<R: Rng + ?Sized>(layer_sizes: &[usize], rng: &mut R) -> Result<Self> {
        let mut weights = Vec::with_capacity(layer_sizes.len().saturating_sub(1));
        let mut biases = Vec::with_capacity(layer_sizes.len().saturating_sub(1));
        for i in 1..layer_sizes.len() {
            let sigma = (2.0 / layer_sizes[i] as f64).sqrt();
            let normal = Normal::new(0.0, sigma)
                .map_err(|e| Error::InvalidConfig(format!("layer {i}: {e}")))?;
            let mut w = Matrix::zeros(layer_sizes[i - 1], layer_sizes[i]);
            for v in w.as_mut_slice() {
                *v = normal.sample(rng);
            }
            weights.push(w);
            biases.push(Matrix::zeros(layer_sizes[i], 1));
        }
        Ok(Self { weights, biases })
    }

    /// Names in layer order: `W_1, b_1, W_2, b_2, ...`.
    pub fn named(&self) -> Vec<(String, &Matrix)> {
        let mut out = Vec::with_capacity(self.weights.len() * 2);
        for (k, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            out.push((format!("W_{}", k + 1), w));
            out.push((format!("b_{}", k + 1), b));
        }
        out
    }

    /// Rebuild from named tensors, checking each against `layer_sizes`.
    /// Entries that are not `W_i` / `b_i` (cached `A_i`) are ignored.
    pub fn from_named(named: &BTreeMap<String, Matrix>, layer_sizes: &[usize]) -> Result<Self> {
        let depth = layer_sizes.len().saturating_sub(1);
        let mut weights = Vec::with_capacity(depth);
        let mut biases = Vec::with_capacity(depth);
        for i in 1..=depth {
            let w_name = format!("W_{i}");
            let b_name = format!("b_{i}");
            let w = named.get(&w_name).ok_or_else(|| Error::MissingChromosome(w_name.clone()))?;
            let b = named.get(&b_name).ok_or_else(|| Error::MissingChromosome(b_name.clone()))?;
            weights.push(Matrix::from_flat(
                &w_name,
                layer_sizes[i - 1],
                layer_sizes[i],
                w.as_slice().to_vec(),
            )?);
            biases.push(Matrix::from_flat(&b_name, layer_sizes[i], 1, b.as_slice().to_vec())?);
        }
        Ok(Self { weights, biases })
    }

    pub fn to_named(&self) -> BTreeMap<String, Matrix> {
        self.named().into_iter().map(|(k, m)| (k, m.clone())).collect()
    }

    fn check(&self, layer_sizes: &[usize]) -> Result<()> {
        let depth = layer_sizes.len().saturating_sub(1);
        if self.weights.len() != depth || self.biases.len() != depth {
            return Err(Error::ChromosomeCount {
                expected: 2 * depth,
                actual: self.weights.len() + self.biases.len(),
            });
        }
        for i in 1..=depth {
            let (w, b) = (&self.weights[i - 1], &self.biases[i - 1]);
            if w.shape() != (layer_sizes[i - 1], layer_sizes[i]) {
                return Err(Error::ShapeMismatch {
                    name: format!("W_{i}"),
                    expected: layer_sizes[i - 1] * layer_sizes[i],
                    actual: w.len(),
                });
            }
            if b.shape() != (layer_sizes[i], 1) {
                return Err(Error::ShapeMismatch {
                    name: format!("b_{i}"),
                    expected: layer_sizes[i],
                    actual: b.len(),
                });
            }
        }
        Ok(())
    }
}

/// Hidden layer nonlinearity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Relu,
    Sigmoid,
    Tanh,
    LeakyRelu,
    Linear,
}

impl Activation {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::LeakyRelu => {
                if x > 0.0 { x } else { x * 0.01 }
            }
            Activation::Linear => x,
        }
    }
}

fn check_layer_sizes(layer_sizes: &[usize]) -> Result<()> {
    if layer_sizes.len() < 2 || layer_sizes.contains(&0) {
        return Err(Error::InvalidConfig(format!("bad layer sizes {layer_sizes:?}")));
    }
    Ok(())
}

/// Fixed-topology multi layer perceptron with a softmax output.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedForwardNetwork {
    layer_sizes: Vec<usize>,
    params: Params,
    activation: Activation,
    /// `A_0 .. A_L` from the last forward pass.
    activations: Vec<Vec<f64>>,
}

impl FeedForwardNetwork {
    pub fn new<R: Rng + ?Sized>(
        layer_sizes: Vec<usize>,
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        check_layer_sizes(&layer_sizes)?;
        let params = Params::he_init(&layer_sizes, rng)?;
        Self::with_params(layer_sizes, params, activation)
    }

    pub fn with_params(layer_sizes: Vec<usize>, params: Params, activation: Activation) -> Result<Self> {
        check_layer_sizes(&layer_sizes)?;
        params.check(&layer_sizes)?;
        Ok(Self { layer_sizes, params, activation, activations: Vec::new() })
    }

    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Cached layer outputs from the last [`forward`](Self::forward) call.
    pub fn activations(&self) -> &[Vec<f64>] {
        &self.activations
    }

    /// Propagate `input` and return the output probabilities.
    pub fn forward(&mut self, input: &[f64]) -> Vec<f64> {
        assert_eq!(input.len(), self.layer_sizes[0], "input size does not match the input layer");
        let depth = self.layer_sizes.len() - 1;
        self.activations.clear();
        self.activations.push(input.to_vec());

        let mut a = input.to_vec();
        for i in 0..depth {
            let w = &self.params.weights[i];
            let b = self.params.biases[i].as_slice();
            let (n_in, n_out) = w.shape();
            // Z = W^T . A + b
            let mut z = b.to_vec();
            for (k, zk) in z.iter_mut().enumerate() {
                for r in 0..n_in {
                    *zk += w.get(r, k) * a[r];
                }
            }
            debug_assert_eq!(z.len(), n_out);
            a = if i + 1 < depth {
                z.into_iter().map(|x| self.activation.apply(x)).collect()
            } else {
                softmax(&z)
            };
            self.activations.push(a.clone());
        }
        a
    }
}
