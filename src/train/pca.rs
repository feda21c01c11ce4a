//! Principal component reduction of feature vectors

use crate::error::TrainingError;
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Guard against dividing by a vanishing eigenvalue when whitening
const VARIANCE_FLOOR: f64 = 1e-12;

/// Fitted linear projection: mean-centering followed by projection onto the
/// leading principal axes, optionally whitened to unit component variance
///
/// Immutable after fitting.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PcaTransform {
    mean: Array1<f64>,
    /// One principal axis per row, descending explained variance
    components: Array2<f64>,
    explained_variance: Array1<f64>,
    whiten: bool,
}

impl PcaTransform {
    /// Fit on a `(n_samples, n_features)` matrix
    ///
    /// The output dimensionality is `n_components` clipped to what the data
    /// can support, never more than `n_features`.
    pub fn fit(
        x: ArrayView2<'_, f64>,
        n_components: usize,
        whiten: bool,
    ) -> Result<Self, TrainingError> {
        let (n_samples, n_features) = x.dim();
        if n_samples < 2 {
            return Err(TrainingError::DimensionMismatch(format!(
                "principal components require at least 2 samples, got {n_samples}"
            )));
        }
        let n_components = n_components.min(n_features).min(n_samples - 1);

        let mean = x.mean_axis(Axis(0)).expect("n_samples >= 2");
        let centered = &x - &mean;
        let cov = centered.t().dot(&centered) / (n_samples - 1) as f64;

        // The covariance matrix is symmetric, so the storage order of the
        // conversion does not matter
        let cov = DMatrix::from_iterator(n_features, n_features, cov.iter().copied());
        let eigen = cov.symmetric_eigen();

        let mut order: Vec<usize> = (0..n_features).collect();
        order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
        order.truncate(n_components);

        let mut components = Array2::zeros((n_components, n_features));
        let mut explained_variance = Array1::zeros(n_components);
        for (row, &source) in order.iter().enumerate() {
            explained_variance[row] = eigen.eigenvalues[source].max(0.0);
            let axis = eigen.eigenvectors.column(source);
            for (col, &value) in axis.iter().enumerate() {
                components[[row, col]] = value;
            }
        }

        Ok(Self {
            mean,
            components,
            explained_variance,
            whiten,
        })
    }

    /// Project a `(n_samples, n_features)` matrix onto the fitted axes
    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        assert_eq!(
            x.ncols(),
            self.mean.len(),
            "input feature count differs from the fitted one"
        );
        let centered = &x - &self.mean;
        let mut projected = centered.dot(&self.components.t());
        if self.whiten {
            for (mut column, &variance) in projected
                .axis_iter_mut(Axis(1))
                .zip(self.explained_variance.iter())
            {
                let scale = variance.max(VARIANCE_FLOOR).sqrt().recip();
                column.mapv_inplace(|v| v * scale);
            }
        }
        projected
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn explained_variance(&self) -> &Array1<f64> {
        &self.explained_variance
    }
}
