//! Post-hoc classification report over a labeled feature table

use crate::source_class::SourceClass;
use crate::train::table::FeatureTable;
use crate::train::{Classifier, ClassifierTrait};

use conv::ConvUtil;
use log::info;
use std::fmt;

const N_CLASSES: usize = SourceClass::ALL.len();

/// Confusion matrix and derived accuracies of a classifier evaluated on a
/// labeled table
#[derive(Clone, Debug, PartialEq)]
pub struct ClassificationReport {
    /// `matrix[true][predicted]`
    pub matrix: [[usize; N_CLASSES]; N_CLASSES],
    pub accuracy: f64,
}

impl ClassificationReport {
    /// Evaluate `classifier` on every row of `table`
    pub fn evaluate(classifier: &Classifier, table: &FeatureTable) -> Self {
        let mut matrix = [[0_usize; N_CLASSES]; N_CLASSES];
        for (row, &label) in table.features.rows().into_iter().zip(&table.labels) {
            let predicted = classifier.predict(row);
            matrix[label.ordinal()][predicted.ordinal()] += 1;
        }
        let correct: usize = (0..N_CLASSES).map(|c| matrix[c][c]).sum();
        let accuracy = correct.approx_as::<f64>().unwrap()
            / table.n_rows().max(1).approx_as::<f64>().unwrap();
        Self { matrix, accuracy }
    }

    /// Fraction of class-`c` instances predicted correctly
    pub fn recall(&self, class: SourceClass) -> f64 {
        let row = &self.matrix[class.ordinal()];
        let total: usize = row.iter().sum();
        if total == 0 {
            return f64::NAN;
        }
        row[class.ordinal()] as f64 / total as f64
    }

    pub fn log(&self) {
        for line in self.to_string().lines() {
            info!("{line}");
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "classification accuracy: {:.4}", self.accuracy)?;
        write!(f, "{:>10}", "")?;
        for class in SourceClass::ALL {
            write!(f, "{:>10}", class.label())?;
        }
        writeln!(f)?;
        for (true_class, row) in SourceClass::ALL.into_iter().zip(&self.matrix) {
            write!(f, "{:>10}", true_class.label())?;
            for count in row {
                write!(f, "{count:>10}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;
    use crate::train::forest::{ForestConfig, RandomForestClassifier};

    use approx::assert_abs_diff_eq;

    #[test]
    fn report_on_training_data_is_nearly_diagonal() {
        let (x, y) = class_blobs(20, 6, 0.1);
        let forest =
            RandomForestClassifier::fit(x.view(), &y, &ForestConfig::default(), 0).unwrap();
        let table = FeatureTable {
            labels: y.clone(),
            ids: (1..=y.len() as u32).collect(),
            features: x,
        };
        let report = ClassificationReport::evaluate(&forest.into(), &table);
        assert!(report.accuracy > 0.95);
        let diagonal: usize = (0..N_CLASSES).map(|c| report.matrix[c][c]).sum();
        assert_abs_diff_eq!(
            report.accuracy,
            diagonal as f64 / table.n_rows() as f64,
            epsilon = 1e-12,
        );
        assert!(report.recall(SourceClass::Variable) > 0.9);
    }
}
