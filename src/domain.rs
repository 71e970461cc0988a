use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::DatasetError;

/// CMS data-taking period. The canonical spelling doubles as the sheet name
/// of the dataset spreadsheet.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum,
)]
pub enum Period {
    #[default]
    #[value(name = "Run2016preVFP")]
    Run2016preVFP,
    #[value(name = "Run2016postVFP")]
    Run2016postVFP,
    #[value(name = "Run2017")]
    Run2017,
    #[value(name = "Run2018")]
    Run2018,
}

impl Period {
    pub const ALL: [Period; 4] = [
        Period::Run2016preVFP,
        Period::Run2016postVFP,
        Period::Run2017,
        Period::Run2018,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Run2016preVFP => "Run2016preVFP",
            Period::Run2016postVFP => "Run2016postVFP",
            Period::Run2017 => "Run2017",
            Period::Run2018 => "Run2018",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Period {
    type Err = DatasetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Period::ALL
            .into_iter()
            .find(|period| period.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| DatasetError::InvalidPeriod(value.to_string()))
    }
}

/// Processing tier of a dataset.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    ValueEnum,
)]
pub enum Tier {
    #[value(name = "MiniAOD")]
    MiniAod,
    #[value(name = "NanoAOD")]
    NanoAod,
    #[value(name = "ReNanoAOD")]
    ReNanoAod,
    #[default]
    #[value(name = "NTuple")]
    NTuple,
}

/// How the file locations of a tier are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Query the CMS data catalog; the resolver key is a catalog dataset name.
    CatalogQuery,
    /// Walk a directory tree on EOS; the resolver key is a path fragment.
    FilesystemEnumeration,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::MiniAod, Tier::NanoAod, Tier::ReNanoAod, Tier::NTuple];

    /// Column header in the dataset spreadsheet.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::MiniAod => "MiniAOD",
            Tier::NanoAod => "NanoAOD",
            Tier::ReNanoAod => "ReNanoAOD",
            Tier::NTuple => "NTuple",
        }
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            Tier::MiniAod | Tier::NanoAod => Strategy::CatalogQuery,
            Tier::ReNanoAod | Tier::NTuple => Strategy::FilesystemEnumeration,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Tier {
    type Err = DatasetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Tier::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| DatasetError::InvalidTier(value.to_string()))
    }
}
