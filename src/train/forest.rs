//! Ensemble-tree classifier: bootstrap-aggregated CART trees with random
//! feature subsampling

use crate::error::TrainingError;
use crate::source_class::SourceClass;
use crate::train::ClassifierTrait;

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const N_CLASSES: usize = SourceClass::ALL.len();

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_estimators: usize,
    /// Unlimited when `None`
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
enum Node {
    Leaf {
        class: SourceClass,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn predict(&self, x: ArrayView1<'_, f64>) -> SourceClass {
        let mut node = 0;
        loop {
            match self.nodes[node] {
                Node::Leaf { class } => return class,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if x[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

/// Trained ensemble of CART trees deciding by majority vote
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForestClassifier {
    /// Fit on a `(n_samples, n_features)` matrix and per-row labels
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: &[SourceClass],
        config: &ForestConfig,
        seed: u64,
    ) -> Result<Self, TrainingError> {
        let n_samples = x.nrows();
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

        let trees = (0..config.n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
                let sample: Vec<usize> =
                    (0..n_samples).map(|_| rng.random_range(0..n_samples)).collect();
                let mut builder = TreeBuilder {
                    x,
                    y,
                    config,
                    nodes: Vec::new(),
                };
                builder.grow(sample, 0, &mut rng);
                DecisionTree {
                    nodes: builder.nodes,
                }
            })
            .collect();

        Ok(Self {
            trees,
            n_features: x.ncols(),
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

impl ClassifierTrait for RandomForestClassifier {
    fn predict(&self, features: ArrayView1<'_, f64>) -> SourceClass {
        assert_eq!(features.len(), self.n_features);
        let mut votes = [0_usize; N_CLASSES];
        for tree in &self.trees {
            votes[tree.predict(features).ordinal()] += 1;
        }
        majority(&votes)
    }
}

// The view's lifetime must stay independent of the slice borrows, otherwise
// reborrowing inside the per-tree closures over-constrains the caller
struct TreeBuilder<'v, 'b> {
    x: ArrayView2<'v, f64>,
    y: &'b [SourceClass],
    config: &'b ForestConfig,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_, '_> {
    /// Grow the subtree for `indices`, returning its root node index
    fn grow(&mut self, indices: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let counts = class_counts(self.y, &indices);
        let depth_capped = self
            .config
            .max_depth
            .is_some_and(|max_depth| depth >= max_depth);
        if depth_capped
            || indices.len() < self.config.min_samples_split
            || counts.iter().filter(|&&c| c > 0).count() <= 1
        {
            return self.push_leaf(&counts);
        }

        let Some((feature, threshold)) = self.best_split(&indices, &counts, rng) else {
            return self.push_leaf(&counts);
        };

        let (left_indices, right_indices): (Vec<_>, Vec<_>) = indices
            .into_iter()
            .partition(|&i| self.x[[i, feature]] <= threshold);
        if left_indices.len() < self.config.min_samples_leaf
            || right_indices.len() < self.config.min_samples_leaf
        {
            return self.push_leaf(&counts);
        }

        // Reserve the split slot before growing children
        let node = self.nodes.len();
        self.nodes.push(Node::Leaf {
            class: SourceClass::Variable,
        });
        let left = self.grow(left_indices, depth + 1, rng);
        let right = self.grow(right_indices, depth + 1, rng);
        self.nodes[node] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        node
    }

    fn push_leaf(&mut self, counts: &[usize; N_CLASSES]) -> usize {
        self.nodes.push(Node::Leaf {
            class: majority(counts),
        });
        self.nodes.len() - 1
    }

    /// Best Gini split over a random sqrt-sized feature subset
    fn best_split(
        &self,
        indices: &[usize],
        counts: &[usize; N_CLASSES],
        rng: &mut StdRng,
    ) -> Option<(usize, f64)> {
        let n_features = self.x.ncols();
        let mtry = (n_features as f64).sqrt().round().max(1.0) as usize;
        let parent_gini = gini(counts, indices.len());

        let mut best: Option<(usize, f64)> = None;
        let mut best_improvement = 0.0;
        for feature in rand::seq::index::sample(rng, n_features, mtry.min(n_features)) {
            let mut ordered: Vec<(f64, usize)> = indices
                .iter()
                .map(|&i| (self.x[[i, feature]], self.y[i].ordinal()))
                .collect();
            ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

            let total = ordered.len();
            let mut left_counts = [0_usize; N_CLASSES];
            for (split, &(value, class)) in ordered.iter().enumerate() {
                if split > 0 {
                    let previous = ordered[split - 1].0;
                    if value > previous {
                        let right_counts: [usize; N_CLASSES] =
                            std::array::from_fn(|c| counts[c] - left_counts[c]);
                        let weighted = (split as f64 * gini(&left_counts, split)
                            + (total - split) as f64 * gini(&right_counts, total - split))
                            / total as f64;
                        let improvement = parent_gini - weighted;
                        if improvement > best_improvement {
                            best_improvement = improvement;
                            best = Some((feature, 0.5 * (previous + value)));
                        }
                    }
                }
                left_counts[class] += 1;
            }
        }
        best
    }
}

fn class_counts(y: &[SourceClass], indices: &[usize]) -> [usize; N_CLASSES] {
    let mut counts = [0_usize; N_CLASSES];
    for &i in indices {
        counts[y[i].ordinal()] += 1;
    }
    counts
}

fn gini(counts: &[usize; N_CLASSES], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

fn majority(votes: &[usize; N_CLASSES]) -> SourceClass {
    let ordinal = votes
        .iter()
        .enumerate()
        .max_by_key(|&(_, &count)| count)
        .map(|(ordinal, _)| ordinal)
        .expect("vote array is non-empty");
    SourceClass::ALL[ordinal]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;

    use ndarray::Array2;

    #[test]
    fn separable_blobs_are_classified() {
        let (x, y) = class_blobs(30, 6, 0.1);
        let forest =
            RandomForestClassifier::fit(x.view(), &y, &ForestConfig::default(), 0).unwrap();

        let correct = x
            .rows()
            .into_iter()
            .zip(&y)
            .filter(|(row, label)| forest.predict(row.view()) == **label)
            .count();
        assert!(correct as f64 >= 0.95 * y.len() as f64);

        // A held-out point near the CV blob center
        let mut probe = vec![0.0; 6];
        probe[SourceClass::CataclysmicVariable.ordinal()] = 5.0;
        let probe = ndarray::Array1::from_vec(probe);
        assert_eq!(
            forest.predict(probe.view()),
            SourceClass::CataclysmicVariable
        );
    }

    #[test]
    fn single_class_input_yields_that_class() {
        let x = Array2::zeros((8, 3));
        let y = vec![SourceClass::LongPeriodVariable; 8];
        let forest = RandomForestClassifier::fit(
            x.view(),
            &y,
            &ForestConfig {
                n_estimators: 5,
                ..Default::default()
            },
            0,
        )
        .unwrap();
        let probe = ndarray::Array1::from_vec(vec![1.0, -1.0, 0.5]);
        assert_eq!(forest.predict(probe.view()), SourceClass::LongPeriodVariable);
    }

    #[test]
    fn label_count_mismatch_is_rejected() {
        let x = Array2::zeros((4, 2));
        let y = vec![SourceClass::Constant; 3];
        assert!(RandomForestClassifier::fit(x.view(), &y, &ForestConfig::default(), 0).is_err());
    }
}
