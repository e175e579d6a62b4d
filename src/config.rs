//! Optional config file loading. Search order: ./fanficdl.toml, then
//! $XDG_CONFIG_HOME/fanficdl/config.toml (or ~/.config/fanficdl/config.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default, deny_unknown_fields)]
pub struct Config {
    /// Default output directory when -o is not set. Paths are relative to CWD.
    pub output_dir: Option<PathBuf>,
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Upper bound on concurrent chapter fetches (clamped to 1..=8).
    pub max_concurrent_fetches: Option<usize>,
}

/// Where config files are looked for, in priority order.
pub fn config_paths() -> Result<Vec<PathBuf>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("fanficdl.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("fanficdl").join("config.toml"));
    }
    Ok(paths)
}

/// First existing file from [config_paths].
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    load_first(&config_paths()?)
}

fn load_first(paths: &[PathBuf]) -> Result<Option<Config>, String> {
    for path in paths {
        if path.exists() {
            let config = load_file(path)?;
            tracing::debug!(path = %path.display(), "loaded config");
            return Ok(Some(config));
        }
    }
    Ok(None)
}

fn load_file(path: &Path) -> Result<Config, String> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
    toml::from_str(&s).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
}
