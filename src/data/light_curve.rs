use ndarray::Array1;

/// A single observed light curve: index-aligned epochs, magnitudes and
/// magnitude uncertainties
///
/// Produced by a simulator plus a noise model and never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct LightCurve {
    time: Array1<f64>,
    mag: Array1<f64>,
    magerr: Array1<f64>,
}

impl LightCurve {
    /// Construct from equally-sized arrays
    ///
    /// Panics if the lengths differ: aligned lengths are a construction-site
    /// invariant, not a runtime condition.
    pub fn new(time: Array1<f64>, mag: Array1<f64>, magerr: Array1<f64>) -> Self {
        assert_eq!(
            time.len(),
            mag.len(),
            "time and mag should have the same size"
        );
        assert_eq!(
            mag.len(),
            magerr.len(),
            "mag and magerr should have the same size"
        );
        Self { time, mag, magerr }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    #[inline]
    pub fn time(&self) -> &Array1<f64> {
        &self.time
    }

    #[inline]
    pub fn mag(&self) -> &Array1<f64> {
        &self.mag
    }

    #[inline]
    pub fn magerr(&self) -> &Array1<f64> {
        &self.magerr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    #[test]
    fn aligned_arrays_are_accepted() {
        let lc = LightCurve::new(
            array![0.0, 1.0, 2.0],
            array![18.1, 18.3, 18.2],
            array![0.01, 0.01, 0.02],
        );
        assert_eq!(lc.len(), 3);
        assert!(!lc.is_empty());
    }

    #[test]
    #[should_panic(expected = "same size")]
    fn misaligned_arrays_panic() {
        let _ = LightCurve::new(array![0.0, 1.0], array![18.1], array![0.01]);
    }
}
