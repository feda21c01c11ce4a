//! Detectability acceptance tests for the rare-event classes
//!
//! A simulated outburst or lensing event is only useful for training if the
//! cadence actually samples it; the gate decides that per instance.

use crate::data::LightCurve;
use crate::simulate::{MicrolensingEvent, OutburstWindows};

use ndarray::Array1;
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};

/// Minimum sample counts a CV outburst must collect to be accepted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutburstThresholds {
    /// Samples within at least one full outburst
    pub n1: usize,
    /// Samples within the rise or decline of that outburst
    pub n2: usize,
}

impl Default for OutburstThresholds {
    fn default() -> Self {
        Self { n1: 7, n2: 1 }
    }
}

/// Class-specific acceptance test for simulated events
pub trait QualityGate {
    /// Is at least one outburst sufficiently sampled by the cadence?
    fn cataclysmic(
        &self,
        time: &Array1<f64>,
        windows: &OutburstWindows,
        thresholds: &OutburstThresholds,
    ) -> bool;

    /// Is the lensing event both sampled and bright enough to see over the
    /// noise?
    fn microlensing(
        &self,
        light_curve: &LightCurve,
        event: &MicrolensingEvent,
        min_points: usize,
    ) -> bool;
}

/// Default gate: pure sample-counting rules
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct CadenceGate;

impl QualityGate for CadenceGate {
    fn cataclysmic(
        &self,
        time: &Array1<f64>,
        windows: &OutburstWindows,
        thresholds: &OutburstThresholds,
    ) -> bool {
        itertools::izip!(
            &windows.start,
            &windows.end,
            &windows.end_rise,
            &windows.end_high
        )
        .any(|(&start, &end, &end_rise, &end_high)| {
            let in_burst = count_within(time, start, end);
            let in_rise = count_within(time, start, end_rise);
            let in_decline = count_within(time, end_high, end);
            in_burst >= thresholds.n1 && in_rise + in_decline >= thresholds.n2
        })
    }

    fn microlensing(
        &self,
        light_curve: &LightCurve,
        event: &MicrolensingEvent,
        min_points: usize,
    ) -> bool {
        let in_event = count_within(
            light_curve.time(),
            event.t_0 - event.t_e,
            event.t_0 + event.t_e,
        );
        if in_event < min_points {
            return false;
        }
        // The peak must stand out of the baseline by more than the typical
        // uncertainty; remember that brighter means smaller magnitude
        let peak = match light_curve.mag().min() {
            Ok(&peak) => peak,
            Err(_) => return false,
        };
        let median_err = median(light_curve.magerr());
        event.baseline - peak > 3.0 * median_err
    }
}

fn count_within(time: &Array1<f64>, from: f64, to: f64) -> usize {
    time.iter().filter(|&&t| t >= from && t <= to).count()
}

fn median(values: &Array1<f64>) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    match sorted.len() {
        0 => f64::NAN,
        n if n % 2 == 1 => sorted[n / 2],
        n => 0.5 * (sorted[n / 2 - 1] + sorted[n / 2]),
    }
}
