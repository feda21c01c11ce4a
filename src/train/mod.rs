//! Feature reduction and model fitting
//!
//! Runs standalone against any feature table produced by the synthesizer (or
//! by an earlier run): fit a PCA reduction and/or a classifier, returning
//! immutable inference objects.

pub mod forest;
pub mod neural;
pub mod pca;
pub mod report;
pub mod table;

pub use forest::{ForestConfig, RandomForestClassifier};
pub use neural::{MlpConfig, NeuralNetworkClassifier};
pub use pca::PcaTransform;
pub use report::ClassificationReport;
pub use table::FeatureTable;

use crate::error::{ConfigurationError, TrainingError};
use crate::features::FEATURE_DIM;
use crate::source_class::SourceClass;

use enum_dispatch::enum_dispatch;
use log::warn;
use ndarray::ArrayView1;
use std::path::Path;
use std::str::FromStr;

/// Recognized classifier families
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    RandomForest,
    NeuralNetwork,
}

impl FromStr for ModelKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rf" | "tree" => Ok(Self::RandomForest),
            "nn" | "neural" => Ok(Self::NeuralNetwork),
            _ => Err(ConfigurationError::UnknownModelKind(s.into())),
        }
    }
}

/// Maps a feature vector to a source class
#[enum_dispatch]
pub trait ClassifierTrait {
    fn predict(&self, features: ArrayView1<'_, f64>) -> SourceClass;
}

/// Any trained classifier
#[enum_dispatch(ClassifierTrait)]
#[derive(Clone, Debug)]
pub enum Classifier {
    RandomForest(RandomForestClassifier),
    NeuralNetwork(NeuralNetworkClassifier),
}

/// A fitted classifier plus the reduction transform it was trained behind,
/// when one was requested
#[derive(Clone, Debug)]
pub struct TrainedModel {
    pub classifier: Classifier,
    pub pca: Option<PcaTransform>,
}

/// Per-model hyperparameters; defaults mirror the reference setup
#[derive(Clone, Debug, Default)]
pub struct TrainConfig {
    pub forest: ForestConfig,
    pub mlp: MlpConfig,
    pub seed: u64,
}

/// Train a classifier (and optionally a PCA reduction) from feature tables
/// on disk
///
/// With `reduced_path` given, the PCA transform is fit on the numeric columns
/// of the *original* table and the classifier on the *reduced* one; the
/// returned transform maps new raw feature vectors into the space the
/// classifier expects. Without it the classifier is fit directly on the
/// original table.
pub fn train(
    features_path: impl AsRef<Path>,
    reduced_path: Option<&Path>,
    kind: ModelKind,
    config: &TrainConfig,
) -> Result<TrainedModel, TrainingError> {
    let table = FeatureTable::from_path(features_path)?;
    if kind == ModelKind::NeuralNetwork && reduced_path.is_none() {
        warn!(
            "training a neural classifier on raw high-dimensional features; \
            a PCA-reduced table usually converges better"
        );
    }

    match reduced_path {
        Some(reduced_path) => {
            let pca = PcaTransform::fit(table.features.view(), FEATURE_DIM, true)?;
            let reduced = FeatureTable::from_path(reduced_path)?;
            let classifier = fit_classifier(kind, &reduced, config)?;
            Ok(TrainedModel {
                classifier,
                pca: Some(pca),
            })
        }
        None => {
            let classifier = fit_classifier(kind, &table, config)?;
            Ok(TrainedModel {
                classifier,
                pca: None,
            })
        }
    }
}

fn fit_classifier(
    kind: ModelKind,
    table: &FeatureTable,
    config: &TrainConfig,
) -> Result<Classifier, TrainingError> {
    Ok(match kind {
        ModelKind::RandomForest => RandomForestClassifier::fit(
            table.features.view(),
            &table.labels,
            &config.forest,
            config.seed,
        )?
        .into(),
        ModelKind::NeuralNetwork => NeuralNetworkClassifier::fit(
            table.features.view(),
            &table.labels,
            &config.mlp,
            config.seed,
        )?
        .into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;

    use std::io::Write;

    #[test]
    fn model_kind_parsing() {
        assert_eq!("rf".parse::<ModelKind>().unwrap(), ModelKind::RandomForest);
        assert_eq!(
            "neural".parse::<ModelKind>().unwrap(),
            ModelKind::NeuralNetwork
        );
        assert!(matches!(
            "svm".parse::<ModelKind>(),
            Err(ConfigurationError::UnknownModelKind(_))
        ));
    }

    fn write_blob_table(path: &Path, per_class: usize, dim: usize) {
        let (x, y) = class_blobs(per_class, dim, 0.1);
        let mut file = std::fs::File::create(path).unwrap();
        for (i, (row, label)) in x.rows().into_iter().zip(&y).enumerate() {
            write!(file, "{} {}", label.label(), i + 1).unwrap();
            for value in row {
                write!(file, " {value}").unwrap();
            }
            writeln!(file).unwrap();
        }
    }

    #[test]
    fn trains_forest_without_reduction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.txt");
        write_blob_table(&path, 20, 6);

        let model = train(&path, None, ModelKind::RandomForest, &TrainConfig::default()).unwrap();
        assert!(model.pca.is_none());

        let probe = ndarray::Array1::zeros(6);
        assert!(SourceClass::ALL.contains(&model.classifier.predict(probe.view())));
    }

    #[test]
    fn trains_classifier_on_reduced_table_and_returns_transform() {
        let dir = tempfile::tempdir().unwrap();
        let features = dir.path().join("features.txt");
        write_blob_table(&features, 20, 6);

        // Reduce the same table and write it back out
        let table = FeatureTable::from_path(&features).unwrap();
        let pca = PcaTransform::fit(table.features.view(), 6, true).unwrap();
        let projected = pca.transform(table.features.view());
        let reduced_path = dir.path().join("pca_features.txt");
        let mut file = std::fs::File::create(&reduced_path).unwrap();
        for ((row, label), id) in projected.rows().into_iter().zip(&table.labels).zip(&table.ids) {
            write!(file, "{} {}", label.label(), id).unwrap();
            for value in row {
                write!(file, " {value}").unwrap();
            }
            writeln!(file).unwrap();
        }
        drop(file);

        let model = train(
            &features,
            Some(&reduced_path),
            ModelKind::RandomForest,
            &TrainConfig::default(),
        )
        .unwrap();
        let transform = model.pca.expect("reduction was requested");
        // The transform feeds the classifier: dimensionalities must agree
        let projected_probe = transform.transform(table.features.slice(ndarray::s![..1, ..]));
        assert!(SourceClass::ALL.contains(
            &model.classifier.predict(projected_probe.row(0))
        ));
    }
}
