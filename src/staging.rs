//! Concurrent staging of remote files into the local cache.
//!
//! Every job runs as its own task. A job whose destination already exists is
//! skipped without taking a pool slot. The others wait for a slot in the
//! [`StagingPool`] and hand the transfer to a [`Copier`]. After the first
//! failed transfer no further transfer is started; transfers already running
//! are awaited before the error is returned.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tokio::process::Command;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::DatasetError;
use crate::store::Store;
use crate::tools;

/// One source location and the cache path it is copied to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagingJob {
    pub source: String,
    pub destination: Utf8PathBuf,
}

/// Build the jobs for `locations`, keeping only the first `max_files` when it
/// is non-zero. Two locations mapping to the same cache path are rejected.
pub fn plan_jobs(
    store: &Store,
    locations: &[String],
    max_files: usize,
) -> Result<Vec<StagingJob>, DatasetError> {
    let selected = if max_files > 0 && locations.len() > max_files {
        &locations[..max_files]
    } else {
        locations
    };

    let mut seen = HashMap::<Utf8PathBuf, &str>::new();
    let mut jobs = Vec::with_capacity(selected.len());
    for location in selected {
        let destination = store.destination_for(location)?;
        if let Some(first) = seen.insert(destination.clone(), location.as_str()) {
            return Err(DatasetError::DuplicateDestination {
                first: first.to_string(),
                second: location.clone(),
                destination: destination.to_string(),
            });
        }
        jobs.push(StagingJob {
            source: location.clone(),
            destination,
        });
    }
    Ok(jobs)
}

/// Copies one remote file to a local path and reports the exit code of the
/// transfer. Retrying is left to the implementation.
pub trait Copier: Send + Sync + 'static {
    fn copy(
        &self,
        source: &str,
        destination: &Utf8Path,
        retries: u32,
    ) -> impl Future<Output = Result<i32, DatasetError>> + Send;
}

/// `xrdcp` subprocess.
#[derive(Debug, Clone)]
pub struct XrdcpCopier {
    binary: Option<PathBuf>,
}

impl XrdcpCopier {
    pub fn new() -> Self {
        Self {
            binary: tools::find_in_path(tools::XRDCP),
        }
    }

    pub fn with_binary(binary: PathBuf) -> Self {
        Self {
            binary: Some(binary),
        }
    }

    pub fn copy_args(source: &str, destination: &Utf8Path, retries: u32) -> Vec<String> {
        vec![
            "--nopbar".to_string(),
            "--force".to_string(),
            "--retry".to_string(),
            retries.to_string(),
            source.to_string(),
            destination.to_string(),
        ]
    }
}

impl Default for XrdcpCopier {
    fn default() -> Self {
        Self::new()
    }
}

impl Copier for XrdcpCopier {
    async fn copy(
        &self,
        source: &str,
        destination: &Utf8Path,
        retries: u32,
    ) -> Result<i32, DatasetError> {
        let binary = self
            .binary
            .as_ref()
            .ok_or_else(|| DatasetError::MissingTool(tools::XRDCP.to_string()))?;
        let status = Command::new(binary)
            .args(Self::copy_args(source, destination, retries))
            // stdout carries the staged paths
            .stdout(Stdio::from(std::io::stderr()))
            .status()
            .await
            .map_err(|err| {
                DatasetError::Filesystem(format!("spawn {}: {err}", binary.display()))
            })?;
        // killed by a signal
        Ok(status.code().unwrap_or(-1))
    }
}

/// Bounded set of transfer slots shared by the jobs of one batch.
#[derive(Debug, Clone)]
pub struct StagingPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl StagingPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, DatasetError> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|err| DatasetError::Runtime(err.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Copied,
    Skipped,
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagingReport {
    /// Destination of every job, in job order.
    pub paths: Vec<Utf8PathBuf>,
    pub copied: usize,
    pub skipped: usize,
}

pub struct StagingEngine<C> {
    copier: Arc<C>,
    pool: StagingPool,
    retries: u32,
}

impl<C: Copier> StagingEngine<C> {
    pub fn new(copier: C, pool: StagingPool, retries: u32) -> Self {
        Self {
            copier: Arc::new(copier),
            pool,
            retries,
        }
    }

    pub fn pool(&self) -> &StagingPool {
        &self.pool
    }

    pub async fn stage_all(&self, jobs: &[StagingJob]) -> Result<Vec<Utf8PathBuf>, DatasetError> {
        self.stage_all_report(jobs).await.map(|report| report.paths)
    }

    pub async fn stage_all_report(
        &self,
        jobs: &[StagingJob],
    ) -> Result<StagingReport, DatasetError> {
        let failed = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();
        for (index, job) in jobs.iter().enumerate() {
            let copier = Arc::clone(&self.copier);
            let pool = self.pool.clone();
            let failed = Arc::clone(&failed);
            let job = job.clone();
            let retries = self.retries;
            tasks.spawn(async move {
                stage_one(index, &job, copier.as_ref(), &pool, &failed, retries)
                    .await
                    .map(|outcome| (index, outcome))
            });
        }

        let mut outcomes = vec![None; jobs.len()];
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|err| DatasetError::Runtime(err.to_string()));
            match result.and_then(|inner| inner) {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(err) => {
                    failed.store(true, Ordering::SeqCst);
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        let count = |wanted: JobOutcome| {
            outcomes
                .iter()
                .filter(|outcome| **outcome == Some(wanted))
                .count()
        };
        let copied = count(JobOutcome::Copied);
        let skipped = count(JobOutcome::Skipped);

        if let Some(err) = first_error {
            warn!(
                copied,
                skipped,
                abandoned = count(JobOutcome::Abandoned),
                "staging aborted"
            );
            return Err(err);
        }

        info!(copied, skipped, "staging finished");
        Ok(StagingReport {
            paths: jobs.iter().map(|job| job.destination.clone()).collect(),
            copied,
            skipped,
        })
    }
}

async fn stage_one<C: Copier>(
    index: usize,
    job: &StagingJob,
    copier: &C,
    pool: &StagingPool,
    failed: &AtomicBool,
    retries: u32,
) -> Result<JobOutcome, DatasetError> {
    if job.destination.as_std_path().exists() {
        debug!(source = %job.source, "already staged");
        return Ok(JobOutcome::Skipped);
    }

    let _permit = pool.acquire().await?;
    if failed.load(Ordering::SeqCst) {
        debug!(source = %job.source, "not started after earlier failure");
        return Ok(JobOutcome::Abandoned);
    }

    // The flag is set before the slot is released, so no job waiting for
    // this slot can start a transfer after a failure.
    let result = transfer(index, job, copier, retries).await;
    if result.is_err() {
        failed.store(true, Ordering::SeqCst);
    }
    result
}

async fn transfer<C: Copier>(
    index: usize,
    job: &StagingJob,
    copier: &C,
    retries: u32,
) -> Result<JobOutcome, DatasetError> {
    if let Some(parent) = job.destination.parent() {
        tokio::fs::create_dir_all(parent.as_std_path())
            .await
            .map_err(|err| DatasetError::Filesystem(format!("{parent}: {err}")))?;
    }

    debug!(source = %job.source, "staging");
    let exit_code = copier.copy(&job.source, &job.destination, retries).await?;
    if exit_code == 0 {
        return Ok(JobOutcome::Copied);
    }

    error!(source = %job.source, exit_code, "staging failed");
    if job.destination.as_std_path().exists() {
        if let Err(err) = tokio::fs::remove_file(job.destination.as_std_path()).await {
            warn!(destination = %job.destination, %err, "could not remove partial file");
        }
    }
    Err(DatasetError::StagingFailed {
        index,
        source_url: job.source.clone(),
        destination: job.destination.to_string(),
        exit_code,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn locations(count: usize) -> Vec<String> {
        (0..count)
            .map(|index| format!("root://xrootd-cms.infn.it//store/mc/sample/file_{index}.root"))
            .collect()
    }

    #[test]
    fn max_files_keeps_resolver_order() {
        let store = Store::new("/cache");
        let jobs = plan_jobs(&store, &locations(10), 3).unwrap();
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].source, locations(10)[0]);
        assert_eq!(jobs[2].destination, "/cache/mc/sample/file_2.root");

        let all = plan_jobs(&store, &locations(10), 0).unwrap();
        assert_eq!(all.len(), 10);
    }

    #[test]
    fn duplicate_destinations_are_rejected() {
        let store = Store::new("/cache");
        let locations = vec![
            "root://xrootd-cms.infn.it//store/mc/a.root".to_string(),
            "root://eos.grid.vbc.ac.at//store/mc/a.root".to_string(),
        ];
        let err = plan_jobs(&store, &locations, 0).unwrap_err();
        assert_matches!(err, DatasetError::DuplicateDestination { destination, .. } if destination == "/cache/mc/a.root");
    }

    #[test]
    fn xrdcp_arguments() {
        let args = XrdcpCopier::copy_args(
            "root://host//store/a.root",
            Utf8Path::new("/cache/a.root"),
            3,
        );
        assert_eq!(
            args,
            vec![
                "--nopbar",
                "--force",
                "--retry",
                "3",
                "root://host//store/a.root",
                "/cache/a.root"
            ]
        );
    }

    #[test]
    fn report_serializes_paths_as_strings() {
        let report = StagingReport {
            paths: vec![Utf8PathBuf::from("/cache/mc/a.root")],
            copied: 1,
            skipped: 0,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"paths": ["/cache/mc/a.root"], "copied": 1, "skipped": 0})
        );
    }

    #[test]
    fn pool_never_empty() {
        let pool = StagingPool::new(0);
        assert_eq!(pool.capacity(), 1);
        assert_eq!(pool.available(), 1);
    }
}
