use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DatasetError {
    #[error("invalid data-taking period: {0}")]
    InvalidPeriod(String),

    #[error("invalid data tier: {0}")]
    InvalidTier(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("dataset spreadsheet unavailable: {0}")]
    SourceUnavailable(String),

    #[error("dataset spreadsheet returned status {status}: {message}")]
    SourceStatus { status: u16, message: String },

    #[error("malformed dataset spreadsheet: {0}")]
    MalformedSource(String),

    #[error("no {tier} entry for dataset {dataset}")]
    #[diagnostic(help("run `stops-datasets catalog` to see the datasets of a period"))]
    UnknownDatasetOrTier { dataset: String, tier: String },

    #[error("metadata query failed for {key}: {message}")]
    QueryFailed { key: String, message: String },

    #[error("cannot enumerate {root}: {message}")]
    EnumerationFailed { root: PathBuf, message: String },

    #[error("invalid file location: {0}")]
    InvalidLocation(String),

    #[error("locations {first} and {second} both map to {destination}")]
    DuplicateDestination {
        first: String,
        second: String,
        destination: String,
    },

    #[error("staging job {index} failed with exit code {exit_code}: {source_url} -> {destination}")]
    StagingFailed {
        index: usize,
        source_url: String,
        destination: String,
        exit_code: i32,
    },

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("async runtime error: {0}")]
    Runtime(String),
}
