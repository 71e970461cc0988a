use std::path::PathBuf;
use std::process::Command;

use serde::Deserialize;
use tracing::debug;

use crate::error::DatasetError;
use crate::tools;

/// Catalog lookup of the logical file names of a dataset.
pub trait MetadataQuery: Send + Sync {
    /// Logical file names (`/store/...`) in catalog order.
    fn query_files(&self, dataset: &str) -> Result<Vec<String>, DatasetError>;
}

#[derive(Debug, Deserialize)]
struct DasRecord {
    file: Vec<DasFile>,
}

#[derive(Debug, Deserialize)]
struct DasFile {
    name: String,
}

/// `dasgoclient` subprocess. The binary is looked up once; its absence only
/// matters when a query is made.
#[derive(Debug, Clone)]
pub struct DasgoClient {
    binary: Option<PathBuf>,
}

impl DasgoClient {
    pub fn new() -> Self {
        Self {
            binary: tools::find_in_path(tools::DASGOCLIENT),
        }
    }

    pub fn with_binary(binary: PathBuf) -> Self {
        Self {
            binary: Some(binary),
        }
    }

    fn require_binary(&self) -> Result<&PathBuf, DatasetError> {
        self.binary
            .as_ref()
            .ok_or_else(|| DatasetError::MissingTool(tools::DASGOCLIENT.to_string()))
    }

    pub fn query_args(dataset: &str) -> Vec<String> {
        vec!["-json".to_string(), format!("-query=file dataset={dataset}")]
    }
}

impl Default for DasgoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataQuery for DasgoClient {
    fn query_files(&self, dataset: &str) -> Result<Vec<String>, DatasetError> {
        let binary = self.require_binary()?;
        debug!(dataset, "querying DAS for files");
        let output = Command::new(binary)
            .args(Self::query_args(dataset))
            .output()
            .map_err(|err| DatasetError::QueryFailed {
                key: dataset.to_string(),
                message: err.to_string(),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("{} exited with {}", binary.display(), output.status)
            } else {
                stderr
            };
            return Err(DatasetError::QueryFailed {
                key: dataset.to_string(),
                message,
            });
        }
        parse_records(dataset, &output.stdout)
    }
}

/// Parse `dasgoclient -json` output into logical file names.
pub fn parse_records(dataset: &str, stdout: &[u8]) -> Result<Vec<String>, DatasetError> {
    let query_failed = |message: String| DatasetError::QueryFailed {
        key: dataset.to_string(),
        message,
    };
    let records: Vec<DasRecord> = serde_json::from_slice(stdout)
        .map_err(|err| query_failed(format!("unexpected DAS output: {err}")))?;
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            record
                .file
                .into_iter()
                .next()
                .map(|file| file.name)
                .ok_or_else(|| query_failed(format!("record {index} has no file entry")))
        })
        .collect()
}
