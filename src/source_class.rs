use crate::error::ConfigurationError;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of astrophysical source classes the synthesizer knows about
///
/// The declaration order is the synthesis order and defines the class ordinal
/// used for identity assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceClass {
    Variable,
    Constant,
    CataclysmicVariable,
    Microlensing,
    LongPeriodVariable,
}

impl SourceClass {
    /// All classes in synthesis order
    pub const ALL: [Self; 5] = [
        Self::Variable,
        Self::Constant,
        Self::CataclysmicVariable,
        Self::Microlensing,
        Self::LongPeriodVariable,
    ];

    /// Position in the synthesis order, `0..5`
    pub const fn ordinal(&self) -> usize {
        match self {
            Self::Variable => 0,
            Self::Constant => 1,
            Self::CataclysmicVariable => 2,
            Self::Microlensing => 3,
            Self::LongPeriodVariable => 4,
        }
    }

    /// Label used in catalog artifacts
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Variable => "VARIABLE",
            Self::Constant => "CONSTANT",
            Self::CataclysmicVariable => "CV",
            Self::Microlensing => "ML",
            Self::LongPeriodVariable => "LPV",
        }
    }

    /// Does instance acceptance go through a quality gate?
    pub const fn is_gated(&self) -> bool {
        matches!(self, Self::CataclysmicVariable | Self::Microlensing)
    }
}

impl fmt::Display for SourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SourceClass {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|class| class.label() == s)
            .ok_or_else(|| ConfigurationError::UnknownClassLabel(s.into()))
    }
}
