use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "docload";
const LOG_FILENAME: &str = "docload.log";

/// Where `docload.log` goes: the state directory when the platform has
/// one, the cache directory otherwise.
pub fn resolve_log_path() -> Result<PathBuf> {
    let base = dirs::state_dir()
        .or_else(dirs::cache_dir)
        .context("No state or cache directory for the log file")?;
    log_path_under(&base)
}

fn log_path_under(base: &Path) -> Result<PathBuf> {
    let dir = base.join(APP_DIR);
    fs::create_dir_all(&dir).with_context(|| format!("Cannot create {}", dir.display()))?;
    Ok(dir.join(LOG_FILENAME))
}
