//! Per-class instance generation: simulate, add noise, gate, accept or retry

use crate::data::LightCurve;
use crate::error::{ConfigurationError, SynthesisError, TransientError};
use crate::features::{ExtractFeatures, FEATURE_DIM};
use crate::noise::NoiseModel;
use crate::quality::QualityGate;
use crate::simulate::{LpvReference, Simulate};
use crate::source_class::SourceClass;
use crate::synthesizer::SynthesisConfig;

use log::warn;
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;

/// Hard cap on simulation attempts per instance; reaching it aborts the whole
/// synthesis run
pub const MAX_ATTEMPTS: usize = 100;

/// Attempt number past which a slow-convergence advisory is logged
pub const SLOW_ATTEMPT: usize = 20;

/// One accepted labeled instance, identity not yet assigned
#[derive(Clone, Debug)]
pub struct SyntheticInstance {
    pub class: SourceClass,
    pub light_curve: LightCurve,
    pub features: Array1<f64>,
}

/// Produces exactly one quality-gate-accepted instance of a requested class
///
/// Borrows all collaborators; generation has no side effects beyond consuming
/// randomness, so instances can be produced concurrently with one generator.
pub struct InstanceGenerator<'a, S, G, E> {
    simulator: &'a S,
    gate: &'a G,
    extractor: &'a E,
    noise: &'a NoiseModel,
    lpv_reference: &'a LpvReference,
    timestamps: &'a [Array1<f64>],
    config: &'a SynthesisConfig,
}

impl<'a, S, G, E> InstanceGenerator<'a, S, G, E>
where
    S: Simulate,
    G: QualityGate,
    E: ExtractFeatures,
{
    /// Fails when the timestamp pool is empty or contains an empty cadence;
    /// `generate` relies on the pool being drawable
    pub fn new(
        simulator: &'a S,
        gate: &'a G,
        extractor: &'a E,
        noise: &'a NoiseModel,
        lpv_reference: &'a LpvReference,
        timestamps: &'a [Array1<f64>],
        config: &'a SynthesisConfig,
    ) -> Result<Self, ConfigurationError> {
        if timestamps.is_empty() || timestamps.iter().any(Array1::is_empty) {
            return Err(ConfigurationError::MalformedTimestamps);
        }
        Ok(Self {
            simulator,
            gate,
            extractor,
            noise,
            lpv_reference,
            timestamps,
            config,
        })
    }

    /// Generate one accepted instance of `class`
    ///
    /// Every attempt draws a fresh cadence and baseline. Transient noise
    /// failures and quality-gate rejections both consume an attempt, so the
    /// cap bounds the total work per instance.
    pub fn generate(
        &self,
        class: SourceClass,
        rng: &mut StdRng,
    ) -> Result<SyntheticInstance, SynthesisError> {
        for attempt in 1..=MAX_ATTEMPTS {
            if attempt == SLOW_ATTEMPT + 1 {
                warn!(
                    "taking longer than usual to simulate an accepted {class} light curve; \
                    this happens when the timestamps are too sparse for the event to be \
                    sampled, generation will fail after {MAX_ATTEMPTS} attempts"
                );
            }
            let time = self
                .timestamps
                .choose(rng)
                .expect("pool is non-empty by construction");
            let baseline = rng.random_range(self.config.min_mag..self.config.max_mag);

            match self.attempt(class, time, baseline, rng) {
                Ok(Some(light_curve)) => {
                    let features = self.extractor.extract(&light_curve)?;
                    if features.len() != FEATURE_DIM {
                        return Err(SynthesisError::FeatureDimension {
                            actual: features.len(),
                        });
                    }
                    return Ok(SyntheticInstance {
                        class,
                        light_curve,
                        features,
                    });
                }
                // Gate rejection or out-of-domain noise draw: try again
                Ok(None) | Err(TransientError(_)) => continue,
            }
        }
        Err(SynthesisError::RetryExhausted {
            class,
            attempts: MAX_ATTEMPTS,
        })
    }

    /// One simulation attempt: `Ok(Some(_))` is acceptance, `Ok(None)` is a
    /// quality-gate rejection, `Err(_)` is a transient noise failure
    fn attempt(
        &self,
        class: SourceClass,
        time: &Array1<f64>,
        baseline: f64,
        rng: &mut StdRng,
    ) -> Result<Option<LightCurve>, TransientError> {
        match class {
            SourceClass::Variable => {
                let mag = self.simulator.variable(time, baseline, rng);
                let (mag, magerr) = self.noise.observe(&mag, rng)?;
                Ok(Some(LightCurve::new(time.clone(), mag, magerr)))
            }
            SourceClass::Constant => {
                let mag = self.simulator.constant(time, baseline, rng);
                let (mag, magerr) = self.noise.observe(&mag, rng)?;
                Ok(Some(LightCurve::new(time.clone(), mag, magerr)))
            }
            SourceClass::LongPeriodVariable => {
                let mag = self
                    .simulator
                    .long_period(time, baseline, self.lpv_reference, rng);
                let (mag, magerr) = self.noise.observe(&mag, rng)?;
                Ok(Some(LightCurve::new(time.clone(), mag, magerr)))
            }
            SourceClass::CataclysmicVariable => {
                let (mag, windows) = self.simulator.cataclysmic(time, baseline, rng);
                // The outburst windows are known before noise injection, so
                // gate first and skip the noise draw for invisible outbursts
                if !self.gate.cataclysmic(time, &windows, &self.config.cv_thresholds) {
                    return Ok(None);
                }
                let (mag, magerr) = self.noise.observe(&mag, rng)?;
                Ok(Some(LightCurve::new(time.clone(), mag, magerr)))
            }
            SourceClass::Microlensing => {
                let (mag, event) =
                    self.simulator
                        .microlensing(time, baseline, &self.config.ml_ranges, rng);
                // Detectability depends on the realized uncertainties, so the
                // gate runs on the noisy curve
                let (mag, magerr) = self.noise.observe(&mag, rng)?;
                let light_curve = LightCurve::new(time.clone(), mag, magerr);
                if !self
                    .gate
                    .microlensing(&light_curve, &event, self.config.ml_min_points)
                {
                    return Ok(None);
                }
                Ok(Some(light_curve))
            }
        }
    }
}
