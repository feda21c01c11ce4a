//! Noise models turning a clean magnitude series into observed
//! magnitude/uncertainty pairs
//!
//! A failing attempt is an expected outcome of extreme parameter draws, so
//! the observation step returns an explicit [`TransientError`] tag instead of
//! panicking; the instance generator branches on it and retries.

use crate::error::TransientError;

use ndarray::{Array1, Zip};
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};

/// Ratio between a magnitude difference and the corresponding relative flux
/// difference, `2.5 / ln 10`
const POGSON: f64 = 1.085_736_204_758_129_5;

type CustomNoiseFn = dyn Fn(&Array1<f64>, &mut StdRng) -> Result<(Array1<f64>, Array1<f64>), TransientError>
    + Send
    + Sync;

/// Perturbs a clean magnitude series into an observed one
///
/// Either the built-in signal-to-noise-scaled Gaussian model or a
/// caller-supplied closure.
pub enum NoiseModel {
    Gaussian { zero_point: f64 },
    Custom(Box<CustomNoiseFn>),
}

impl NoiseModel {
    /// Built-in Gaussian model: photon-limited S/N derived from the given
    /// magnitude zero point
    pub fn gaussian(zero_point: f64) -> Self {
        Self::Gaussian { zero_point }
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Array1<f64>, &mut StdRng) -> Result<(Array1<f64>, Array1<f64>), TransientError>
            + Send
            + Sync
            + 'static,
    {
        Self::Custom(Box::new(f))
    }

    /// Observe a clean magnitude series, returning `(mag, magerr)`
    pub fn observe(
        &self,
        mag: &Array1<f64>,
        rng: &mut StdRng,
    ) -> Result<(Array1<f64>, Array1<f64>), TransientError> {
        match self {
            Self::Gaussian { zero_point } => gaussian_observe(mag, *zero_point, rng),
            Self::Custom(f) => {
                let (mag, magerr) = f(mag, rng)?;
                if mag.len() != magerr.len() {
                    return Err(TransientError("mag and magerr sizes differ"));
                }
                Ok((mag, magerr))
            }
        }
    }
}

impl std::fmt::Debug for NoiseModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gaussian { zero_point } => f
                .debug_struct("Gaussian")
                .field("zero_point", zero_point)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn gaussian_observe(
    mag: &Array1<f64>,
    zero_point: f64,
    rng: &mut StdRng,
) -> Result<(Array1<f64>, Array1<f64>), TransientError> {
    let flux: Array1<f64> = Zip::from(mag).map_collect(|&m| f64::powf(10.0, -0.4 * (m - zero_point)));
    // Photon-limited: S/N = sqrt(flux), sigma_m = POGSON / (S/N)
    let magerr = flux.mapv(|f| POGSON / f.sqrt());
    if magerr.iter().any(|&sigma| !sigma.is_finite() || sigma <= 0.0) {
        return Err(TransientError("non-finite or non-positive magnitude error"));
    }
    let observed = Zip::from(mag).and(&magerr).map_collect(|&m, &sigma| {
        let xi: f64 = StandardNormal.sample(rng);
        m + sigma * xi
    });
    if observed.iter().any(|&m| !m.is_finite()) {
        return Err(TransientError("non-finite observed magnitude"));
    }
    Ok((observed, magerr))
}
