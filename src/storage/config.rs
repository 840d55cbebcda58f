//! JSON Settings Management
//!
//! Handles reading and writing the controller settings file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::models::settings::ControllerSettings;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{ensure_dir, settings_path};

/// Settings store backed by one pretty-printed JSON file
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: ControllerSettings,
}

impl SettingsStore {
    /// Open the store at the default location
    pub fn new() -> AppResult<Self> {
        Self::open(settings_path()?)
    }

    /// Open the store at `path`, writing defaults if the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }

        let settings = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            let defaults = ControllerSettings::default();
            Self::save_to_file(&path, &defaults)?;
            tracing::info!(path = %path.display(), "Created default controller settings");
            defaults
        };

        Ok(Self { path, settings })
    }

    fn load_from_file(path: &Path) -> AppResult<ControllerSettings> {
        let content = fs::read_to_string(path)?;
        let settings: ControllerSettings = serde_json::from_str(&content)?;
        settings.validate().map_err(AppError::validation)?;
        Ok(settings)
    }

    fn save_to_file(path: &Path, settings: &ControllerSettings) -> AppResult<()> {
        settings.validate().map_err(AppError::validation)?;
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Replace the settings and persist them
    pub fn update(&mut self, settings: ControllerSettings) -> AppResult<()> {
        Self::save_to_file(&self.path, &settings)?;
        self.settings = settings;
        Ok(())
    }

    /// Reload settings from disk
    pub fn reload(&mut self) -> AppResult<()> {
        self.settings = Self::load_from_file(&self.path)?;
        Ok(())
    }

    /// Reset settings to defaults
    pub fn reset(&mut self) -> AppResult<()> {
        self.update(ControllerSettings::default())
    }
}
