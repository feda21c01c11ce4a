//! Whitespace-delimited feature-table parsing

use crate::error::TrainingError;
use crate::source_class::SourceClass;

use ndarray::Array2;
use std::io::BufRead;
use std::path::Path;

/// In-memory feature table: one labeled, identified feature row per instance
#[derive(Clone, Debug)]
pub struct FeatureTable {
    pub labels: Vec<SourceClass>,
    pub ids: Vec<u32>,
    pub features: Array2<f64>,
}

impl FeatureTable {
    /// Parse a table of rows `label id f0 ... f_{d-1}`
    ///
    /// All rows must have the same width; blank lines and `#` comments are
    /// skipped.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TrainingError> {
        let path = path.as_ref();
        let reader = std::io::BufReader::new(std::fs::File::open(path)?);

        let mut labels = Vec::new();
        let mut ids = Vec::new();
        let mut values = Vec::new();
        let mut width: Option<usize> = None;

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let parse_error = |detail: String| TrainingError::Parse {
                path: path.into(),
                line: i + 1,
                detail,
            };

            let mut fields = trimmed.split_whitespace();
            let label = fields
                .next()
                .expect("non-blank line has at least one field");
            labels.push(
                label
                    .parse::<SourceClass>()
                    .map_err(|err| parse_error(err.to_string()))?,
            );
            ids.push(
                fields
                    .next()
                    .ok_or_else(|| parse_error("missing identity column".into()))?
                    .parse::<u32>()
                    .map_err(|err| parse_error(err.to_string()))?,
            );

            let row_start = values.len();
            for field in fields {
                values.push(
                    field
                        .parse::<f64>()
                        .map_err(|err| parse_error(err.to_string()))?,
                );
            }
            let row_width = values.len() - row_start;
            match width {
                None => width = Some(row_width),
                Some(expected) if expected != row_width => {
                    return Err(parse_error(format!(
                        "row has {row_width} features, previous rows have {expected}"
                    )));
                }
                Some(_) => {}
            }
        }

        let width = width.ok_or(TrainingError::EmptyTable)?;
        if width == 0 {
            return Err(TrainingError::DimensionMismatch(
                "feature table has no feature columns".into(),
            ));
        }
        let features = Array2::from_shape_vec((labels.len(), width), values)
            .expect("row width is validated above");
        Ok(Self {
            labels,
            ids,
            features,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.labels.len()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    fn write_table(rows: &[&str]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        (dir, path)
    }

    #[test]
    fn parses_labels_ids_and_features() {
        let (_dir, path) = write_table(&[
            "# label id f0 f1",
            "VARIABLE 1 0.5 -1.25",
            "ML 61 2e-3 4.0",
        ]);
        let table = FeatureTable::from_path(&path).unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.n_features(), 2);
        assert_eq!(
            table.labels,
            [SourceClass::Variable, SourceClass::Microlensing]
        );
        assert_eq!(table.ids, [1, 61]);
        assert_eq!(table.features[[1, 0]], 2e-3);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let (_dir, path) = write_table(&["VARIABLE 1 0.5 1.0", "CV 41 0.5"]);
        assert!(matches!(
            FeatureTable::from_path(&path),
            Err(TrainingError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn unknown_label_is_rejected() {
        let (_dir, path) = write_table(&["QSO 1 0.5"]);
        assert!(FeatureTable::from_path(&path).is_err());
    }

    #[test]
    fn empty_file_is_an_empty_table() {
        let (_dir, path) = write_table(&[]);
        assert!(matches!(
            FeatureTable::from_path(&path),
            Err(TrainingError::EmptyTable)
        ));
    }
}
