//! Interface to the external light-curve simulator
//!
//! The physical models live outside this crate: the synthesizer only needs a
//! clean magnitude series per class, plus the event metadata the quality gate
//! inspects.

use crate::error::TrainingError;

use ndarray::Array1;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;

/// Produces one clean (noise-free) magnitude series for a requested class
///
/// Implementations draw class parameters from their own distributions using
/// the supplied generator; the synthesizer controls seeding.
pub trait Simulate {
    fn variable(&self, time: &Array1<f64>, baseline: f64, rng: &mut StdRng) -> Array1<f64>;

    fn constant(&self, time: &Array1<f64>, baseline: f64, rng: &mut StdRng) -> Array1<f64>;

    /// Returns the magnitude series together with the outburst windows the
    /// quality gate needs
    fn cataclysmic(
        &self,
        time: &Array1<f64>,
        baseline: f64,
        rng: &mut StdRng,
    ) -> (Array1<f64>, OutburstWindows);

    /// Event parameters are drawn from `ranges` where given, otherwise from
    /// the implementation's own distributions
    fn microlensing(
        &self,
        time: &Array1<f64>,
        baseline: f64,
        ranges: &MicrolensingRanges,
        rng: &mut StdRng,
    ) -> (Array1<f64>, MicrolensingEvent);

    fn long_period(
        &self,
        time: &Array1<f64>,
        baseline: f64,
        reference: &LpvReference,
        rng: &mut StdRng,
    ) -> Array1<f64>;
}

/// Outburst timing of a simulated cataclysmic variable
///
/// All four arrays are index-aligned per outburst: the i-th outburst starts
/// at `start[i]`, finishes rising at `end_rise[i]`, leaves the high state at
/// `end_high[i]` and returns to quiescence at `end[i]`.
#[derive(Clone, Debug, PartialEq)]
pub struct OutburstWindows {
    pub start: Vec<f64>,
    pub end: Vec<f64>,
    pub end_rise: Vec<f64>,
    pub end_high: Vec<f64>,
}

/// Parameters of a simulated microlensing event
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MicrolensingEvent {
    /// Baseline magnitude actually used by the simulator
    pub baseline: f64,
    /// Impact parameter in Einstein radii
    pub u_0: f64,
    /// Epoch of peak magnification
    pub t_0: f64,
    /// Einstein crossing time
    pub t_e: f64,
    /// Source flux fraction, unity for an unblended event
    pub blend_ratio: f64,
}

/// Optional caller overrides for the microlensing parameter distributions
///
/// Each field is a `(min, max)` pair for a uniform draw; `None` leaves the
/// choice to the simulator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MicrolensingRanges {
    pub t_0: Option<(f64, f64)>,
    pub u_0: Option<(f64, f64)>,
    pub t_e: Option<(f64, f64)>,
}

/// Read-only period/amplitude reference table for LPV simulation
///
/// Loaded once per dataset run and shared by reference with every LPV
/// instance; columns come from a catalog of Mira-type variables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LpvReference {
    pub primary_period: Array1<f64>,
    pub primary_amplitude: Array1<f64>,
    pub secondary_period: Array1<f64>,
    pub secondary_amplitude: Array1<f64>,
    pub tertiary_period: Array1<f64>,
    pub tertiary_amplitude: Array1<f64>,
}

impl LpvReference {
    /// Build from six equally-sized columns
    pub fn from_columns(columns: [Array1<f64>; 6]) -> Self {
        let [
            primary_period,
            primary_amplitude,
            secondary_period,
            secondary_amplitude,
            tertiary_period,
            tertiary_amplitude,
        ] = columns;
        let n = primary_period.len();
        for column in [
            &primary_amplitude,
            &secondary_period,
            &secondary_amplitude,
            &tertiary_period,
            &tertiary_amplitude,
        ] {
            assert_eq!(column.len(), n, "reference columns should have the same size");
        }
        Self {
            primary_period,
            primary_amplitude,
            secondary_period,
            secondary_amplitude,
            tertiary_period,
            tertiary_amplitude,
        }
    }

    /// Load from a whitespace-delimited table of six numeric columns
    ///
    /// Lines starting with `#` are skipped.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TrainingError> {
        let path = path.as_ref();
        let reader = std::io::BufReader::new(std::fs::File::open(path)?);
        let mut columns: [Vec<f64>; 6] = std::array::from_fn(|_| Vec::new());
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let parse = |s: &str| {
                s.parse::<f64>().map_err(|err| TrainingError::Parse {
                    path: path.into(),
                    line: i + 1,
                    detail: err.to_string(),
                })
            };
            let mut fields = trimmed.split_whitespace();
            for column in columns.iter_mut() {
                let field = fields.next().ok_or_else(|| TrainingError::Parse {
                    path: path.into(),
                    line: i + 1,
                    detail: "expected 6 columns".into(),
                })?;
                column.push(parse(field)?);
            }
        }
        if columns[0].is_empty() {
            return Err(TrainingError::EmptyTable);
        }
        Ok(Self::from_columns(columns.map(Array1::from_vec)))
    }

    pub fn len(&self) -> usize {
        self.primary_period.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary_period.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn lpv_reference_from_table_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("miras.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "# P1 A1 P2 A2 P3 A3").unwrap();
        writeln!(file, "332.0 2.5 170.1 0.4 81.0 0.1").unwrap();
        writeln!(file, "401.5 3.1 200.9 0.6 95.5 0.2").unwrap();
        drop(file);

        let reference = LpvReference::from_path(&path).unwrap();
        assert_eq!(reference.len(), 2);
        assert_eq!(reference.primary_period[1], 401.5);
        assert_eq!(reference.tertiary_amplitude[0], 0.1);
    }

    #[test]
    fn truncated_row_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("miras.txt");
        std::fs::write(&path, "332.0 2.5 170.1\n").unwrap();
        assert!(matches!(
            LpvReference::from_path(&path),
            Err(TrainingError::Parse { line: 1, .. })
        ));
    }
}
