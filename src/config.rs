use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::DatasetError;

pub const DEFAULT_SPREADSHEET_ID: &str = "1ddNADBoH1f-bL9faXes15c4hPGvB9ugLOv_7VvinKL8";
pub const LOCAL_EOS_REDIRECTOR: &str = "eos.grid.vbc.ac.at";
pub const GLOBAL_EOS_REDIRECTOR: &str = "xrootd-cms.infn.it";
pub const EOS_MOUNT: &str = "/eos/vbc/experiments/cms";
pub const NTUPLE_PREFIX: &str = "store/user/liko/StopsCompressed/nanoTuples";
pub const MAX_COPIES: usize = 4;
pub const COPY_RETRIES: u32 = 3;

const CONFIG_ENV: &str = "STOPS_DATASETS_CONFIG";
const CACHE_ENV: &str = "STOPS_DATASETS_CACHE";
const MAX_COPIES_ENV: &str = "STOPS_DATASETS_MAX_COPIES";
const SHEET_ENV: &str = "STOPS_DATASETS_SHEET";

/// On-disk form of the settings; every field may be omitted.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default)]
    pub cache_root: Option<String>,
    #[serde(default)]
    pub local_redirector: Option<String>,
    #[serde(default)]
    pub global_redirector: Option<String>,
    #[serde(default)]
    pub eos_mount: Option<String>,
    #[serde(default)]
    pub ntuple_prefix: Option<String>,
    #[serde(default)]
    pub max_copies: Option<usize>,
    #[serde(default)]
    pub copy_retries: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub spreadsheet_id: String,
    pub cache_root: Utf8PathBuf,
    pub local_redirector: String,
    pub global_redirector: String,
    pub eos_mount: Utf8PathBuf,
    /// N-tuple production area, relative to `eos_mount`.
    pub ntuple_prefix: String,
    pub max_copies: usize,
    pub copy_retries: u32,
}

impl Settings {
    pub fn with_cache_root(cache_root: Utf8PathBuf) -> Self {
        Self {
            spreadsheet_id: DEFAULT_SPREADSHEET_ID.to_string(),
            cache_root,
            local_redirector: LOCAL_EOS_REDIRECTOR.to_string(),
            global_redirector: GLOBAL_EOS_REDIRECTOR.to_string(),
            eos_mount: Utf8PathBuf::from(EOS_MOUNT),
            ntuple_prefix: NTUPLE_PREFIX.to_string(),
            max_copies: MAX_COPIES,
            copy_retries: COPY_RETRIES,
        }
    }

    pub fn defaults() -> Result<Self, DatasetError> {
        Ok(Self::with_cache_root(default_cache_root()?))
    }

    pub fn ntuple_root(&self) -> Utf8PathBuf {
        self.eos_mount.join(&self.ntuple_prefix)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then the config file, then environment overrides.
    pub fn resolve(path: Option<&str>) -> Result<Settings, DatasetError> {
        let explicit = path
            .map(PathBuf::from)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let file = match explicit {
            Some(config_path) => Some(Self::read(config_path)?),
            None => match default_config_path() {
                Some(config_path) if config_path.exists() => Some(Self::read(config_path)?),
                _ => None,
            },
        };

        let mut settings = Self::resolve_config(Settings::defaults()?, file.unwrap_or_default());
        Self::apply_env(&mut settings, |name| std::env::var(name).ok())?;
        Ok(settings)
    }

    fn read(config_path: PathBuf) -> Result<ConfigFile, DatasetError> {
        let content = fs::read_to_string(&config_path)
            .map_err(|_| DatasetError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| DatasetError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(defaults: Settings, config: ConfigFile) -> Settings {
        Settings {
            spreadsheet_id: config.spreadsheet_id.unwrap_or(defaults.spreadsheet_id),
            cache_root: config
                .cache_root
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.cache_root),
            local_redirector: config.local_redirector.unwrap_or(defaults.local_redirector),
            global_redirector: config
                .global_redirector
                .unwrap_or(defaults.global_redirector),
            eos_mount: config
                .eos_mount
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.eos_mount),
            ntuple_prefix: config.ntuple_prefix.unwrap_or(defaults.ntuple_prefix),
            max_copies: config.max_copies.unwrap_or(defaults.max_copies).max(1),
            copy_retries: config.copy_retries.unwrap_or(defaults.copy_retries),
        }
    }

    pub fn apply_env<F>(settings: &mut Settings, lookup: F) -> Result<(), DatasetError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(CACHE_ENV).filter(|value| !value.trim().is_empty()) {
            settings.cache_root = Utf8PathBuf::from(value.trim());
        }
        if let Some(value) = lookup(SHEET_ENV).filter(|value| !value.trim().is_empty()) {
            settings.spreadsheet_id = value.trim().to_string();
        }
        if let Some(value) = lookup(MAX_COPIES_ENV) {
            let parsed = value.trim().parse::<usize>().map_err(|_| {
                DatasetError::ConfigParse(format!("{MAX_COPIES_ENV} must be an integer: {value}"))
            })?;
            settings.max_copies = parsed.max(1);
        }
        Ok(())
    }
}

fn default_config_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.config_dir().join("stops-datasets").join("config.json"))
}

/// `/scratch-cbe/users/<login>/cache`, or the user cache directory when no
/// login name is available.
pub fn default_cache_root() -> Result<Utf8PathBuf, DatasetError> {
    let login = std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .ok()
        .filter(|value| !value.trim().is_empty());
    if let Some(login) = login {
        return Ok(Utf8PathBuf::from("/scratch-cbe/users")
            .join(login.trim())
            .join("cache"));
    }

    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.cache_dir().join("stops-datasets")).ok()
        })
        .ok_or_else(|| DatasetError::Filesystem("unable to resolve cache directory".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_keeps_defaults() {
        let defaults = Settings::with_cache_root(Utf8PathBuf::from("/tmp/cache"));
        let resolved = ConfigLoader::resolve_config(defaults.clone(), ConfigFile::default());
        assert_eq!(resolved, defaults);
        assert_eq!(
            resolved.ntuple_root(),
            "/eos/vbc/experiments/cms/store/user/liko/StopsCompressed/nanoTuples"
        );
    }

    #[test]
    fn zero_copies_is_clamped() {
        let defaults = Settings::with_cache_root(Utf8PathBuf::from("/tmp/cache"));
        let config = ConfigFile {
            max_copies: Some(0),
            ..ConfigFile::default()
        };
        let resolved = ConfigLoader::resolve_config(defaults, config);
        assert_eq!(resolved.max_copies, 1);
    }
}
