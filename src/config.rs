//! TOML configuration of the front end.
//!
//! Every field has a default, so an empty or partial file is valid. Loading
//! follows the same fail-safe rule as the rest of the persistence code: a
//! missing file means defaults, a malformed one is an error.

use crate::controller::button_registry::ButtonRegistry;
use crate::controller::control_surface::InputSettings;
use crate::controller::dpad_sampler::DEFAULT_DEAD_ZONE;
use crate::engine::DEFAULT_CORE;
use crate::persistence::DEFAULT_MIN_STATE_SIZE;
use color_eyre::eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const APP_DIR: &str = "retropocket";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct FrontendConfig {
    pub log_level: String,
    pub input: InputConfig,
    pub engine: EngineConfig,
    pub saves: SaveConfig,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            input: InputConfig::default(),
            engine: EngineConfig::default(),
            saves: SaveConfig::default(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    pub dead_zone: f32,
    pub haptic_ms: u64,
    pub profile: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dead_zone: DEFAULT_DEAD_ZONE,
            haptic_ms: 8,
            profile: "retroarch".to_string(),
        }
    }
}

impl InputConfig {
    pub fn settings(&self) -> InputSettings {
        InputSettings {
            dead_zone: self.dead_zone,
            haptic_pulse: Duration::from_millis(self.haptic_ms),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub core: String,
    pub run_forever: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            core: DEFAULT_CORE.to_string(),
            run_forever: true,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    ObjectStore,
    Filesystem,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::ObjectStore => write!(f, "object store"),
            BackendKind::Filesystem => write!(f, "filesystem"),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SaveConfig {
    /// States below this size are treated as engine error messages
    pub min_state_size: usize,
    pub backend: BackendKind,
    pub directory: PathBuf,
    pub subdirectory: String,
    pub database: String,
    pub store: String,
    pub schema_version: u32,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            min_state_size: DEFAULT_MIN_STATE_SIZE,
            backend: BackendKind::ObjectStore,
            directory: default_data_dir(),
            subdirectory: "savestates".to_string(),
            database: "RetroPocketDB".to_string(),
            store: "snes_states_v2".to_string(),
            schema_version: 2,
        }
    }
}

fn default_data_dir() -> PathBuf {
    let mut path = dirs::data_dir().unwrap_or_else(|| {
        warn!("Could not determine data directory, using current directory");
        PathBuf::from(".")
    });
    path.push(APP_DIR);
    path
}

impl FrontendConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: FrontendConfig =
            toml::from_str(content).map_err(|e| eyre!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        Self::from_toml(&content)
    }

    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            warn!("Config file {} does not exist, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path).await
    }

    /// Writes a default config to `path` unless a file is already there.
    pub async fn ensure_default(path: &Path) -> Result<()> {
        if tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| eyre!("Failed to serialize default config: {}", e))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file: {}", e))?;
        info!("Wrote default config to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let dead_zone = self.input.dead_zone;
        if !(0.0..1.0).contains(&dead_zone) {
            return Err(eyre!("input.dead_zone must be in [0, 1), got {}", dead_zone));
        }
        if self.saves.min_state_size == 0 {
            return Err(eyre!("saves.min_state_size must be positive"));
        }
        ButtonRegistry::default()
            .profile(&self.input.profile)
            .map_err(|e| eyre!("input.profile: {}", e))?;
        Ok(())
    }
}
