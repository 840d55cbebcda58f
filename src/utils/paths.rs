//! Cross-Platform Path Utilities
//!
//! Resolves where the controller keeps its settings.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

const APP_DIR: &str = "interpreter-bridge";
const SETTINGS_FILE: &str = "settings.json";

/// Get the application config directory (`<config dir>/interpreter-bridge/`)
pub fn app_config_dir() -> AppResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .ok_or_else(|| AppError::config("Could not determine config directory"))
}

/// Get the settings file path (`<config dir>/interpreter-bridge/settings.json`)
pub fn settings_path() -> AppResult<PathBuf> {
    Ok(app_config_dir()?.join(SETTINGS_FILE))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
