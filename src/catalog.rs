//! The frozen training catalog and its two on-disk artifacts
//!
//! Both artifacts are serialized from the same entry list, so they always
//! describe the same instances: a binary light-curve table with one row per
//! observation, and a plain-text feature table with one row per instance.

use crate::data::LightCurve;
use crate::error::SynthesisError;
use crate::features::FEATURE_DIM;
use crate::source_class::SourceClass;

use itertools::izip;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Width of the fixed-size class-label field in the binary table, matching
/// the 20-character string column of the original archive format
const LABEL_FIELD: usize = 20;

/// Byte size of one binary observation row:
/// label + u32 id + f64 time + f32 mag + f32 magerr
const ROW_SIZE: usize = LABEL_FIELD + 4 + 8 + 4 + 4;

const FORMAT_NAME: &str = "light-curve-synth/lightcurves";
const FORMAT_VERSION: u32 = 1;

/// One accepted instance of the catalog
#[derive(Clone, Debug)]
pub struct CatalogEntry {
    pub class: SourceClass,
    pub id: u32,
    pub light_curve: LightCurve,
    pub features: Array1<f64>,
}

/// Complete synthesized training set, frozen after synthesis
#[derive(Clone, Debug, Default)]
pub struct TrainingCatalog {
    entries: Vec<CatalogEntry>,
}

/// One observation row of the binary light-curve table
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObservationRow {
    pub class: SourceClass,
    pub id: u32,
    pub time: f64,
    pub mag: f32,
    pub magerr: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ArchiveHeader {
    format: String,
    version: u32,
    rows: u64,
    instances: u64,
    columns: Vec<String>,
}

impl TrainingCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Feature rows as a `(n_instances, FEATURE_DIM)` matrix, in entry order
    pub fn feature_matrix(&self) -> ndarray::Array2<f64> {
        let mut matrix = ndarray::Array2::zeros((self.entries.len(), FEATURE_DIM));
        for (mut row, entry) in matrix.rows_mut().into_iter().zip(&self.entries) {
            row.assign(&entry.features);
        }
        matrix
    }

    pub fn labels(&self) -> Vec<SourceClass> {
        self.entries.iter().map(|entry| entry.class).collect()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    /// Write the binary light-curve table
    ///
    /// Layout: little-endian `u32` header length, JSON header, then
    /// fixed-width rows `[label: 20-byte space-padded ASCII][id: u32]
    /// [time: f64][mag: f32][magerr: f32]`, grouped by instance.
    pub fn write_light_curves(&self, path: impl AsRef<Path>) -> Result<(), SynthesisError> {
        let rows: u64 = self
            .entries
            .iter()
            .map(|entry| entry.light_curve.len() as u64)
            .sum();
        let header = ArchiveHeader {
            format: FORMAT_NAME.into(),
            version: FORMAT_VERSION,
            rows,
            instances: self.entries.len() as u64,
            columns: ["Class", "ID", "time", "mag", "magerr"]
                .map(String::from)
                .to_vec(),
        };
        let header_json = serde_json::to_vec(&header)?;

        let mut writer = BufWriter::new(std::fs::File::create(path)?);
        writer.write_all(&(header_json.len() as u32).to_le_bytes())?;
        writer.write_all(&header_json)?;

        let mut label_field = [0_u8; LABEL_FIELD];
        for entry in &self.entries {
            label_field.fill(b' ');
            label_field[..entry.class.label().len()]
                .copy_from_slice(entry.class.label().as_bytes());
            for (&time, &mag, &magerr) in izip!(
                entry.light_curve.time(),
                entry.light_curve.mag(),
                entry.light_curve.magerr()
            ) {
                writer.write_all(&label_field)?;
                writer.write_all(&entry.id.to_le_bytes())?;
                writer.write_all(&time.to_le_bytes())?;
                writer.write_all(&(mag as f32).to_le_bytes())?;
                writer.write_all(&(magerr as f32).to_le_bytes())?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Write the plain-text feature table: one whitespace-delimited row per
    /// instance, `label id f0 ... f81`, no collection-literal decoration
    pub fn write_features(&self, path: impl AsRef<Path>) -> Result<(), SynthesisError> {
        let mut writer = BufWriter::new(std::fs::File::create(path)?);
        for entry in &self.entries {
            debug_assert_eq!(entry.features.len(), FEATURE_DIM);
            write!(writer, "{} {}", entry.class.label(), entry.id)?;
            for &value in entry.features.iter() {
                write!(writer, " {value}")?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Write a reduced-feature table with the same row shape as the feature
/// table: `label id c0 ... c_{k-1}`
pub fn write_reduced_features(
    path: impl AsRef<Path>,
    labels: &[SourceClass],
    ids: &[u32],
    components: &ndarray::Array2<f64>,
) -> Result<(), SynthesisError> {
    assert_eq!(labels.len(), components.nrows());
    assert_eq!(ids.len(), components.nrows());
    let mut writer = BufWriter::new(std::fs::File::create(path)?);
    for ((label, id), row) in labels.iter().zip(ids).zip(components.rows()) {
        write!(writer, "{} {}", label.label(), id)?;
        for &value in row {
            write!(writer, " {value}")?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read back a binary light-curve table written by
/// [`TrainingCatalog::write_light_curves`]
pub fn read_light_curves(path: impl AsRef<Path>) -> Result<Vec<ObservationRow>, SynthesisError> {
    let mut reader = BufReader::new(std::fs::File::open(path)?);

    let mut len_bytes = [0_u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    let mut header_json = vec![0_u8; header_len];
    reader.read_exact(&mut header_json)?;
    let header: ArchiveHeader = serde_json::from_slice(&header_json)?;
    if header.format != FORMAT_NAME || header.version != FORMAT_VERSION {
        return Err(SynthesisError::CorruptArchive(format!(
            "unexpected format {}/{}",
            header.format, header.version
        )));
    }

    // The row count is untrusted input: cap the pre-allocation and let
    // read_exact report the real end of the table
    let mut rows = Vec::with_capacity(header.rows.min(1 << 20) as usize);
    let mut row = [0_u8; ROW_SIZE];
    for _ in 0..header.rows {
        reader.read_exact(&mut row).map_err(|_| {
            SynthesisError::CorruptArchive("table is shorter than the header claims".into())
        })?;
        let label = std::str::from_utf8(&row[..LABEL_FIELD])
            .map_err(|err| SynthesisError::CorruptArchive(err.to_string()))?
            .trim_end();
        let class: SourceClass = label
            .parse()
            .map_err(|_| SynthesisError::CorruptArchive(format!("unknown label {label:?}")))?;
        rows.push(ObservationRow {
            class,
            id: u32::from_le_bytes(row[20..24].try_into().unwrap()),
            time: f64::from_le_bytes(row[24..32].try_into().unwrap()),
            mag: f32::from_le_bytes(row[32..36].try_into().unwrap()),
            magerr: f32::from_le_bytes(row[36..40].try_into().unwrap()),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    fn sample_catalog() -> TrainingCatalog {
        let entries = [(SourceClass::Variable, 1), (SourceClass::Microlensing, 61)]
            .into_iter()
            .map(|(class, id)| CatalogEntry {
                class,
                id,
                light_curve: LightCurve::new(
                    array![0.0, 1.5, 3.25],
                    array![18.5, 18.25, 18.75],
                    array![0.02, 0.02, 0.03],
                ),
                features: Array1::linspace(0.0, 81.0, FEATURE_DIM),
            })
            .collect();
        TrainingCatalog::new(entries)
    }

    #[test]
    fn binary_table_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lightcurves.dat");
        let catalog = sample_catalog();
        catalog.write_light_curves(&path).unwrap();

        let rows = read_light_curves(&path).unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].class, SourceClass::Variable);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[0].time, 0.0);
        assert_eq!(rows[3].class, SourceClass::Microlensing);
        assert_eq!(rows[3].id, 61);
        assert_eq!(rows[5].time, 3.25);
        assert_eq!(rows[5].mag, 18.75_f32);
    }

    #[test]
    fn artifacts_describe_the_same_instances() {
        let dir = tempfile::tempdir().unwrap();
        let lc_path = dir.path().join("lightcurves.dat");
        let feat_path = dir.path().join("all_features.txt");
        let catalog = sample_catalog();
        catalog.write_light_curves(&lc_path).unwrap();
        catalog.write_features(&feat_path).unwrap();

        let mut archive_ids: Vec<(String, u32)> = read_light_curves(&lc_path)
            .unwrap()
            .into_iter()
            .map(|row| (row.class.label().into(), row.id))
            .collect();
        archive_ids.dedup();

        let table_ids: Vec<(String, u32)> = std::fs::read_to_string(&feat_path)
            .unwrap()
            .lines()
            .map(|line| {
                let mut fields = line.split_whitespace();
                (
                    fields.next().unwrap().to_owned(),
                    fields.next().unwrap().parse().unwrap(),
                )
            })
            .collect();
        assert_eq!(archive_ids, table_ids);
    }

    #[test]
    fn feature_table_has_no_literal_decoration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all_features.txt");
        sample_catalog().write_features(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        for forbidden in ["[", "]", ",", "'"] {
            assert!(!text.contains(forbidden), "found {forbidden:?} in table");
        }
        for line in text.lines() {
            assert_eq!(line.split_whitespace().count(), 2 + FEATURE_DIM);
        }
    }

    #[test]
    fn absurd_header_row_count_is_an_error_not_an_allocation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lightcurves.dat");
        let header = serde_json::json!({
            "format": FORMAT_NAME,
            "version": FORMAT_VERSION,
            "rows": u64::MAX,
            "instances": 1,
            "columns": ["Class", "ID", "time", "mag", "magerr"],
        });
        let header_json = serde_json::to_vec(&header).unwrap();
        let mut bytes = (header_json.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(&header_json);
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(
            read_light_curves(&path),
            Err(SynthesisError::CorruptArchive(_))
        ));
    }

    #[test]
    fn truncated_archive_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lightcurves.dat");
        sample_catalog().write_light_curves(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 10]).unwrap();
        assert!(matches!(
            read_light_curves(&path),
            Err(SynthesisError::CorruptArchive(_))
        ));
    }
}
