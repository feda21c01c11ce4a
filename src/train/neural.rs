//! Feedforward neural classifier: one hidden ReLU layer, softmax
//! cross-entropy loss, full-batch Adam

use crate::error::TrainingError;
use crate::source_class::SourceClass;
use crate::train::ClassifierTrait;

use log::debug;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

const N_CLASSES: usize = SourceClass::ALL.len();

/// Defaults follow the reference training setup: a wide single hidden layer
/// with a conservative learning rate
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpConfig {
    pub hidden: usize,
    pub max_iter: usize,
    pub learning_rate: f64,
    /// Stop when the loss improves by less than this between iterations
    pub tol: f64,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden: 1000,
            max_iter: 5000,
            learning_rate: 1e-4,
            tol: 1e-4,
        }
    }
}

/// Trained multilayer perceptron
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NeuralNetworkClassifier {
    w1: Array2<f64>,
    b1: Array1<f64>,
    w2: Array2<f64>,
    b2: Array1<f64>,
}

impl NeuralNetworkClassifier {
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: &[SourceClass],
        config: &MlpConfig,
        seed: u64,
    ) -> Result<Self, TrainingError> {
        let (n_samples, n_features) = x.dim();
        if n_samples == 0 {
            return Err(TrainingError::EmptyTable);
        }
        if y.len() != n_samples {
            return Err(TrainingError::DimensionMismatch(format!(
                "{} labels for {} feature rows",
                y.len(),
                n_samples
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        // He initialization for the ReLU layer, Glorot-ish for the readout
        let mut init = |rows: usize, cols: usize, scale: f64| {
            Array2::from_shape_simple_fn((rows, cols), || {
                let xi: f64 = StandardNormal.sample(&mut rng);
                xi * scale
            })
        };
        let mut model = Self {
            w1: init(n_features, config.hidden, (2.0 / n_features as f64).sqrt()),
            b1: Array1::zeros(config.hidden),
            w2: init(
                config.hidden,
                N_CLASSES,
                (1.0 / config.hidden as f64).sqrt(),
            ),
            b2: Array1::zeros(N_CLASSES),
        };

        let targets: Vec<usize> = y.iter().map(SourceClass::ordinal).collect();
        let mut adam = Adam::new(&model, config.learning_rate);
        let mut previous_loss = f64::INFINITY;
        for iteration in 0..config.max_iter {
            let (loss, gradients) = model.loss_and_gradients(x, &targets);
            adam.step(&mut model, &gradients);
            if (previous_loss - loss).abs() < config.tol {
                debug!("converged at iteration {iteration}, loss {loss:.6}");
                break;
            }
            previous_loss = loss;
        }
        Ok(model)
    }

    fn loss_and_gradients(&self, x: ArrayView2<'_, f64>, targets: &[usize]) -> (f64, Gradients) {
        let n = x.nrows() as f64;

        let pre_hidden = x.dot(&self.w1) + &self.b1;
        let hidden = pre_hidden.mapv(|v| v.max(0.0));
        let logits = hidden.dot(&self.w2) + &self.b2;
        let probabilities = softmax_rows(&logits);

        let mut loss = 0.0;
        // d loss / d logits
        let mut delta = probabilities;
        for (i, &target) in targets.iter().enumerate() {
            loss -= delta[[i, target]].max(f64::MIN_POSITIVE).ln();
            delta[[i, target]] -= 1.0;
        }
        loss /= n;
        delta /= n;

        let grad_w2 = hidden.t().dot(&delta);
        let grad_b2 = delta.sum_axis(Axis(0));
        let mut back = delta.dot(&self.w2.t());
        back.zip_mut_with(&pre_hidden, |g, &pre| {
            if pre <= 0.0 {
                *g = 0.0;
            }
        });
        let grad_w1 = x.t().dot(&back);
        let grad_b1 = back.sum_axis(Axis(0));

        (
            loss,
            Gradients {
                w1: grad_w1,
                b1: grad_b1,
                w2: grad_w2,
                b2: grad_b2,
            },
        )
    }
}

impl ClassifierTrait for NeuralNetworkClassifier {
    fn predict(&self, features: ArrayView1<'_, f64>) -> SourceClass {
        let hidden = (features.dot(&self.w1) + &self.b1).mapv(|v| v.max(0.0));
        let logits = hidden.dot(&self.w2) + &self.b2;
        let ordinal = logits
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
            .expect("logits are non-empty");
        SourceClass::ALL[ordinal]
    }
}

struct Gradients {
    w1: Array2<f64>,
    b1: Array1<f64>,
    w2: Array2<f64>,
    b2: Array1<f64>,
}

/// Adam optimizer state over the four parameter blocks
struct Adam {
    learning_rate: f64,
    step: i32,
    m_w1: Array2<f64>,
    v_w1: Array2<f64>,
    m_b1: Array1<f64>,
    v_b1: Array1<f64>,
    m_w2: Array2<f64>,
    v_w2: Array2<f64>,
    m_b2: Array1<f64>,
    v_b2: Array1<f64>,
}

impl Adam {
    const BETA1: f64 = 0.9;
    const BETA2: f64 = 0.999;
    const EPSILON: f64 = 1e-8;

    fn new(model: &NeuralNetworkClassifier, learning_rate: f64) -> Self {
        Self {
            learning_rate,
            step: 0,
            m_w1: Array2::zeros(model.w1.dim()),
            v_w1: Array2::zeros(model.w1.dim()),
            m_b1: Array1::zeros(model.b1.len()),
            v_b1: Array1::zeros(model.b1.len()),
            m_w2: Array2::zeros(model.w2.dim()),
            v_w2: Array2::zeros(model.w2.dim()),
            m_b2: Array1::zeros(model.b2.len()),
            v_b2: Array1::zeros(model.b2.len()),
        }
    }

    fn step(&mut self, model: &mut NeuralNetworkClassifier, gradients: &Gradients) {
        self.step += 1;
        let correction1 = 1.0 - Self::BETA1.powi(self.step);
        let correction2 = 1.0 - Self::BETA2.powi(self.step);
        let rate = self.learning_rate * correction2.sqrt() / correction1;

        macro_rules! update {
            ($param: expr, $grad: expr, $m: expr, $v: expr) => {
                $m.zip_mut_with($grad, |m, &g| *m = Self::BETA1 * *m + (1.0 - Self::BETA1) * g);
                $v.zip_mut_with($grad, |v, &g| {
                    *v = Self::BETA2 * *v + (1.0 - Self::BETA2) * g * g
                });
                ndarray::Zip::from(&mut $param)
                    .and(&$m)
                    .and(&$v)
                    .for_each(|p, &m, &v| *p -= rate * m / (v.sqrt() + Self::EPSILON));
            };
        }
        update!(model.w1, &gradients.w1, self.m_w1, self.v_w1);
        update!(model.b1, &gradients.b1, self.m_b1, self.v_b1);
        update!(model.w2, &gradients.w2, self.m_w2, self.v_w2);
        update!(model.b2, &gradients.b2, self.m_b2, self.v_b2);
    }
}

fn softmax_rows(logits: &Array2<f64>) -> Array2<f64> {
    let mut result = logits.clone();
    for mut row in result.rows_mut() {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    result
}
