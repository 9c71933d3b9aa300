//! Path resolution utilities.
//!
//! Small helpers shared by the cluster store, the CLI config loader and the
//! tool resolver.

use std::path::{Path, PathBuf};

/// Name of the cluster store directory created under the home directory.
pub const STORE_DIR_NAME: &str = ".ccm";

/// Subdirectories of an install directory that hold runnable tools, in
/// lookup order.
pub const TOOL_DIRS: [&str; 2] = ["bin", "tools/bin"];

/// Expands `~` to the user's home directory.
///
/// If the path starts with `~`, replaces it with the user's home directory.
/// Otherwise returns the path unchanged.
///
/// # Example
///
/// ```
/// use ccm_core::util::paths::expand_tilde;
///
/// let expanded = expand_tilde("~/clusters");
/// assert!(!expanded.starts_with("~"));
/// ```
pub fn expand_tilde<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

/// Default cluster store directory (`~/.ccm`).
pub fn default_store_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(STORE_DIR_NAME))
}

/// Lists the runnable files found in the tool directories of an install.
///
/// Earlier directories win when the same name appears twice. Missing
/// directories are skipped.
pub fn discover_tools(install_dir: &Path) -> Vec<(String, PathBuf)> {
    let mut found: Vec<(String, PathBuf)> = Vec::new();
    for sub in TOOL_DIRS {
        let Ok(entries) = std::fs::read_dir(install_dir.join(sub)) else {
            continue;
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort();
        for path in paths {
            let Some(name) = tool_name(&path) else {
                continue;
            };
            if !found.iter().any(|(existing, _)| *existing == name) {
                found.push((name, path));
            }
        }
    }
    found
}

/// Tool name for a script path: the file stem for Windows launchers
/// (`nodetool.bat` → `nodetool`), the file name otherwise.
fn tool_name(path: &Path) -> Option<String> {
    let ext = path.extension().and_then(|e| e.to_str());
    match ext {
        Some("bat") | Some("ps1") | Some("cmd") => path.file_stem(),
        _ => path.file_name(),
    }
    .and_then(|n| n.to_str())
    .map(str::to_string)
}
