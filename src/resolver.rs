//! Dataset resolution: turn a (dataset, tier) resolver key into XRootD URLs.
//!
//! Catalog tiers are resolved through DAS and addressed via the global
//! redirector. Filesystem tiers are found by walking the EOS mount and are
//! addressed via the local redirector.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::Settings;
use crate::das::MetadataQuery;
use crate::domain::{Strategy, Tier};
use crate::error::DatasetError;

const PAYLOAD_EXTENSION: &str = "root";

/// One way of producing the file locations of a dataset.
pub trait LocationSource {
    fn locate(&self, dataset: &str, key: &str, tier: Tier) -> Result<Vec<String>, DatasetError>;
}

pub struct CatalogQueryStrategy<Q> {
    query: Q,
    redirector: String,
}

impl<Q: MetadataQuery> CatalogQueryStrategy<Q> {
    pub fn new(query: Q, redirector: impl Into<String>) -> Self {
        Self {
            query,
            redirector: redirector.into(),
        }
    }
}

impl<Q: MetadataQuery> LocationSource for CatalogQueryStrategy<Q> {
    fn locate(&self, _dataset: &str, key: &str, _tier: Tier) -> Result<Vec<String>, DatasetError> {
        let names = self.query.query_files(key)?;
        Ok(names
            .into_iter()
            .map(|name| format!("root://{}/{}", self.redirector, name))
            .collect())
    }
}

pub struct FilesystemStrategy {
    eos_mount: Utf8PathBuf,
    ntuple_root: Utf8PathBuf,
    redirector: String,
}

impl FilesystemStrategy {
    pub fn new(
        eos_mount: impl Into<Utf8PathBuf>,
        ntuple_root: impl Into<Utf8PathBuf>,
        redirector: impl Into<String>,
    ) -> Self {
        Self {
            eos_mount: eos_mount.into(),
            ntuple_root: ntuple_root.into(),
            redirector: redirector.into(),
        }
    }

    /// Directory holding the files of `dataset` at `tier`.
    ///
    /// N-tuples live under `<key>/Met/<dataset>`, so the dataset name appears
    /// in the path a second time.
    pub fn root_for(&self, dataset: &str, key: &str, tier: Tier) -> Utf8PathBuf {
        match tier {
            Tier::NTuple => self.ntuple_root.join(key).join("Met").join(dataset),
            _ => self.eos_mount.join(key.strip_prefix('/').unwrap_or(key)),
        }
    }

    /// All payload files below `root`, sorted by path.
    pub fn enumerate(&self, root: &Utf8Path) -> Result<Vec<Utf8PathBuf>, DatasetError> {
        let enumeration_failed = |message: String| DatasetError::EnumerationFailed {
            root: root.as_std_path().to_path_buf(),
            message,
        };

        let metadata = fs::metadata(root.as_std_path())
            .map_err(|err| enumeration_failed(err.to_string()))?;
        if !metadata.is_dir() {
            return Err(enumeration_failed("not a directory".to_string()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root.as_std_path()).follow_links(true) {
            let entry = entry.map_err(|err| enumeration_failed(err.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = Utf8PathBuf::from_path_buf(entry.into_path()).map_err(|path| {
                enumeration_failed(format!("non-utf8 path {}", path.display()))
            })?;
            if path.extension() == Some(PAYLOAD_EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// `root://<redirector>//<path below the EOS mount>`.
    pub fn location_for(&self, path: &Utf8Path) -> Result<String, DatasetError> {
        let suffix = path
            .strip_prefix(&self.eos_mount)
            .map_err(|_| DatasetError::InvalidLocation(path.to_string()))?;
        let suffix = suffix
            .components()
            .map(|component| component.as_str())
            .collect::<Vec<_>>()
            .join("/");
        Ok(format!("root://{}//{}", self.redirector, suffix))
    }
}

impl LocationSource for FilesystemStrategy {
    fn locate(&self, dataset: &str, key: &str, tier: Tier) -> Result<Vec<String>, DatasetError> {
        let root = self.root_for(dataset, key, tier);
        debug!(%root, "listing files");
        self.enumerate(&root)?
            .iter()
            .map(|path| self.location_for(path))
            .collect()
    }
}

/// Picks the strategy for a tier and runs it.
pub struct LocationResolver<Q> {
    catalog_query: CatalogQueryStrategy<Q>,
    filesystem: FilesystemStrategy,
}

impl<Q: MetadataQuery> LocationResolver<Q> {
    pub fn new(catalog_query: CatalogQueryStrategy<Q>, filesystem: FilesystemStrategy) -> Self {
        Self {
            catalog_query,
            filesystem,
        }
    }

    pub fn from_settings(query: Q, settings: &Settings) -> Self {
        Self::new(
            CatalogQueryStrategy::new(query, settings.global_redirector.clone()),
            FilesystemStrategy::new(
                settings.eos_mount.clone(),
                settings.ntuple_root(),
                settings.local_redirector.clone(),
            ),
        )
    }

    pub fn strategy(&self, tier: Tier) -> &dyn LocationSource {
        match tier.strategy() {
            Strategy::CatalogQuery => &self.catalog_query,
            Strategy::FilesystemEnumeration => &self.filesystem,
        }
    }

    pub fn resolve(&self, dataset: &str, key: &str, tier: Tier) -> Result<Vec<String>, DatasetError> {
        let locations = self.strategy(tier).locate(dataset, key, tier)?;
        debug!(dataset, %tier, files = locations.len(), "resolved dataset");
        Ok(locations)
    }
}
