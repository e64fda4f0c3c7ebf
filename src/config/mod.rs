use crate::models::Settings;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::fs;

/// Settings file name inside the configuration directory
pub const SETTINGS_FILE: &str = "Pagesmith Settings.yaml";

/// Prefix of environment variables that override the settings file
/// (`PAGESMITH_DEBUG_MODE=true`, `PAGESMITH_OUTPUT_DIR=out`, ...)
pub const ENV_PREFIX: &str = "PAGESMITH";

/// Loads and saves [`Settings`].
///
/// Values are layered: built-in defaults, then `Pagesmith Settings.yaml`,
/// then `PAGESMITH_*` environment variables.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager rooted at `config_dir`, creating the directory
    /// if needed
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join(SETTINGS_FILE),
            config_dir,
        })
    }

    /// Load settings from the file and the process environment
    pub fn load_settings(&self) -> Result<Settings> {
        self.load_settings_with_env(None)
    }

    /// Load settings with an explicit environment in place of the process
    /// environment. Keys are full variable names, prefix included.
    pub fn load_settings_with_env(&self, env: Option<HashMap<String, String>>) -> Result<Settings> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
        }

        let layered = config::Config::builder()
            .add_source(
                config::File::new(self.settings_path.as_str(), config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        let settings: Settings = layered
            .try_deserialize()
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!("Loaded settings from {}", self.config_dir);
        Ok(settings)
    }

    /// Write settings back to `Pagesmith Settings.yaml`
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }
}
