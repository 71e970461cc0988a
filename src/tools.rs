use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

pub const DASGOCLIENT: &str = "dasgoclient";
pub const XRDCP: &str = "xrdcp";
pub const VOMS_PROXY_INIT: &str = "voms-proxy-init";
pub const VOMS_PROXY_INFO: &str = "voms-proxy-info";

const KNOWN_TOOLS: [(&str, &[&str]); 4] = [
    (DASGOCLIENT, &["-version"]),
    (XRDCP, &["--version"]),
    (VOMS_PROXY_INIT, &["--version"]),
    (VOMS_PROXY_INFO, &["--version"]),
];

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub path: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolReport {
    pub tools: Vec<ToolInfo>,
}

pub fn report() -> ToolReport {
    let tools = KNOWN_TOOLS
        .iter()
        .map(|(name, version_args)| {
            let path = find_in_path(name);
            let version = path
                .as_ref()
                .and_then(|path| tool_version(path, version_args));
            ToolInfo {
                name: name.to_string(),
                path: path.map(|path| path.display().to_string()),
                version,
            }
        })
        .collect();
    ToolReport { tools }
}

pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn tool_version(path: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new(path).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    // xrdcp prints its version on stderr
    let text = if output.stdout.is_empty() {
        output.stderr
    } else {
        output.stdout
    };
    let text = String::from_utf8_lossy(&text);
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}
