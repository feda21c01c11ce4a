#![doc = include_str!("../README.md")]


mod catalog;
pub use catalog::{
    read_light_curves, write_reduced_features, CatalogEntry, ObservationRow, TrainingCatalog,
};

mod data;
pub use data::LightCurve;

mod error;
pub use error::{ConfigurationError, SynthesisError, TrainingError, TransientError};

mod features;
pub use features::{ExtractFeatures, FEATURE_DIM};

mod generator;
pub use generator::{InstanceGenerator, SyntheticInstance, MAX_ATTEMPTS, SLOW_ATTEMPT};

mod identity;
pub use identity::identity;

mod noise;
pub use noise::NoiseModel;

mod quality;
pub use quality::{CadenceGate, OutburstThresholds, QualityGate};

mod simulate;
pub use simulate::{
    LpvReference, MicrolensingEvent, MicrolensingRanges, OutburstWindows, Simulate,
};

mod source_class;
pub use source_class::SourceClass;

mod synthesizer;
pub use synthesizer::{
    SynthesisConfig, TrainingArtifacts, TrainingSetSynthesizer, MIN_N_CLASS,
};

pub mod train;
pub use train::{
    train, ClassificationReport, Classifier, ClassifierTrait, FeatureTable, ForestConfig,
    MlpConfig, ModelKind, NeuralNetworkClassifier, PcaTransform, RandomForestClassifier,
    TrainConfig, TrainedModel,
};

pub use ndarray;
