use std::collections::HashMap;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use stops_datasets::config::{ConfigFile, ConfigLoader, Settings};
use stops_datasets::error::DatasetError;

fn defaults() -> Settings {
    Settings::with_cache_root(Utf8PathBuf::from("/scratch-cbe/users/someone/cache"))
}

#[test]
fn file_values_override_defaults() {
    let config: ConfigFile = serde_json::from_str(
        r#"{"cache_root": "/tmp/stage", "max_copies": 8, "eos_mount": "/mnt/eos"}"#,
    )
    .unwrap();
    let settings = ConfigLoader::resolve_config(defaults(), config);

    assert_eq!(settings.cache_root, "/tmp/stage");
    assert_eq!(settings.max_copies, 8);
    assert_eq!(settings.copy_retries, 3);
    assert_eq!(settings.local_redirector, "eos.grid.vbc.ac.at");
    assert_eq!(
        settings.ntuple_root(),
        "/mnt/eos/store/user/liko/StopsCompressed/nanoTuples"
    );
}

#[test]
fn environment_overrides_file() {
    let env = HashMap::from([
        ("STOPS_DATASETS_CACHE", "/data/cache"),
        ("STOPS_DATASETS_MAX_COPIES", "2"),
        ("STOPS_DATASETS_SHEET", "other-sheet"),
    ]);
    let mut settings = defaults();
    ConfigLoader::apply_env(&mut settings, |name| env.get(name).map(|v| v.to_string())).unwrap();

    assert_eq!(settings.cache_root, "/data/cache");
    assert_eq!(settings.max_copies, 2);
    assert_eq!(settings.spreadsheet_id, "other-sheet");
}

#[test]
fn invalid_copy_limit_is_rejected() {
    let mut settings = defaults();
    let err = ConfigLoader::apply_env(&mut settings, |name| {
        (name == "STOPS_DATASETS_MAX_COPIES").then(|| "many".to_string())
    })
    .unwrap_err();
    assert_matches!(err, DatasetError::ConfigParse(_));
}

#[test]
fn explicit_config_must_exist() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("missing.json");
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, DatasetError::ConfigRead(p) if p == path);
}

#[test]
fn explicit_config_must_be_json() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("config.json");
    std::fs::write(&path, "cache_root = 1").unwrap();
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, DatasetError::ConfigParse(_));
}
