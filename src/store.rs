use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::DatasetError;

/// Number of leading `/`-separated URL segments that are not part of the
/// cached path: `root:`, the empty authority separator, the redirector host,
/// the empty segment of the double slash and the top-level `store` directory.
pub const DROPPED_URL_SEGMENTS: usize = 5;

/// The local staging cache. Files persist across runs.
#[derive(Debug, Clone)]
pub struct Store {
    cache_root: Utf8PathBuf,
}

impl Store {
    pub fn new(cache_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
        }
    }

    pub fn cache_root(&self) -> &Utf8Path {
        &self.cache_root
    }

    pub fn ensure_cache_root(&self) -> Result<(), DatasetError> {
        fs::create_dir_all(self.cache_root.as_std_path())
            .map_err(|err| DatasetError::Filesystem(format!("{}: {err}", self.cache_root)))
    }

    /// Cache path of a source location. Depends only on the location and the
    /// cache root.
    pub fn destination_for(&self, location: &str) -> Result<Utf8PathBuf, DatasetError> {
        let segments = location
            .split('/')
            .skip(DROPPED_URL_SEGMENTS)
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect::<Vec<_>>();
        if segments.is_empty() || segments.contains(&"..") {
            return Err(DatasetError::InvalidLocation(location.to_string()));
        }
        Ok(segments
            .into_iter()
            .fold(self.cache_root.clone(), |path, segment| path.join(segment)))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn destination_drops_redirector_and_store() {
        let store = Store::new("/scratch/cache");
        let global = store
            .destination_for("root://xrootd-cms.infn.it//store/mc/RunIISummer20/a.root")
            .unwrap();
        assert_eq!(global, "/scratch/cache/mc/RunIISummer20/a.root");

        let local = store
            .destination_for("root://eos.grid.vbc.ac.at//store/user/liko/x/tree_1.root")
            .unwrap();
        assert_eq!(local, "/scratch/cache/user/liko/x/tree_1.root");
    }

    #[test]
    fn destination_rejects_escaping_paths() {
        let store = Store::new("/scratch/cache");
        let err = store
            .destination_for("root://host//store/../../etc/passwd")
            .unwrap_err();
        assert_matches!(err, DatasetError::InvalidLocation(_));

        let err = store.destination_for("root://host//store").unwrap_err();
        assert_matches!(err, DatasetError::InvalidLocation(_));
    }
}
