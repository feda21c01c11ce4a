//! Interface to the external feature extractor

use crate::data::LightCurve;
use crate::error::SynthesisError;

use ndarray::Array1;

/// Length of the statistical feature vector extracted from every light curve
pub const FEATURE_DIM: usize = 82;

/// Maps an accepted light curve to a fixed-length numeric feature vector
///
/// The statistical definitions of the features are outside this crate; the
/// synthesizer only requires that every returned vector has exactly
/// [`FEATURE_DIM`] finite entries in a stable order.
pub trait ExtractFeatures {
    fn extract(&self, light_curve: &LightCurve) -> Result<Array1<f64>, SynthesisError>;
}
