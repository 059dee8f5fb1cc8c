//! Boot Configuration
//!
//! Selects the scene backend, the loader's debug knobs and the scenes the
//! simulated host knows about.
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Environment variables: `STAGEHAND_LOADER`, `STAGEHAND_DEBUG_DELAY`
//! 2. Config file named by `STAGEHAND_CONFIG`, else `stagehand.toml`
//! 3. Built-in demo defaults
//!
//! # Example Config File
//!
//! ```toml
//! [loader]
//! debug_delay_ms = 1000
//! debug_yield_logging = true
//! handoff = "direct"            # direct, worker
//!
//! [demo]
//! loader_type = "scene_manager" # scene_manager, addressables
//! next_scene_name = "Level1"
//! next_scene_address = "scenes/level1"
//! additive_scene_name = "Additive"
//! additive_scene_address = "scenes/additive"
//! frame_time_ms = 16
//! max_frames = 600
//!
//! [scenes.Level1]
//! stage_frames = 3
//! activate_frames = 2
//! ```
//!
//! A `[scenes]` table replaces the built-in scene set entirely.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use stagehand_core::{Result, StagehandError};
use stagehand_host::{Component, LoadProfile, SceneObject};
use stagehand_loader::LoaderConfig;

/// Default config file, relative to the working directory
const DEFAULT_CONFIG_FILE: &str = "stagehand.toml";

/// Which backend the demo drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderType {
    /// Progress-based scene manager, scenes addressed by name
    #[default]
    SceneManager,
    /// Addressables, scenes addressed by content address
    Addressables,
}

impl std::fmt::Display for LoaderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SceneManager => write!(f, "scene_manager"),
            Self::Addressables => write!(f, "addressables"),
        }
    }
}

impl std::str::FromStr for LoaderType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scene_manager" | "scenemanager" | "scene-manager" | "" => Ok(Self::SceneManager),
            "addressables" | "addressable" => Ok(Self::Addressables),
            _ => Err(format!("Unknown loader type: {}", s)),
        }
    }
}

/// Demo flow configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Backend to drive
    pub loader_type: LoaderType,
    /// Scene loaded by `change_scene` (scene manager)
    pub next_scene_name: String,
    /// Scene loaded by `change_scene` (addressables)
    pub next_scene_address: String,
    /// Scene loaded by `load_additive` (scene manager)
    pub additive_scene_name: String,
    /// Scene loaded by `load_additive` (addressables)
    pub additive_scene_address: String,
    /// Simulated frame length
    pub frame_time_ms: u64,
    /// Frame cap per demo step
    pub max_frames: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            loader_type: LoaderType::SceneManager,
            next_scene_name: "Level1".to_string(),
            next_scene_address: "scenes/level1".to_string(),
            additive_scene_name: "Additive".to_string(),
            additive_scene_address: "scenes/additive".to_string(),
            frame_time_ms: 16,
            max_frames: 600,
        }
    }
}

impl DemoConfig {
    /// Simulated frame length
    pub fn frame_time(&self) -> Duration {
        Duration::from_millis(self.frame_time_ms.max(1))
    }
}

/// Complete boot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    /// Scene transition engine settings
    pub loader: LoaderConfig,
    /// Demo flow settings
    pub demo: DemoConfig,
    /// Scenes known to the host, keyed by name or address
    pub scenes: BTreeMap<String, LoadProfile>,
    /// Config file path (for reloading)
    #[serde(skip)]
    pub config_path: Option<String>,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            loader: LoaderConfig::default()
                .with_debug_delay(1000)
                .with_yield_logging(true),
            demo: DemoConfig::default(),
            scenes: default_scenes(),
            config_path: None,
        }
    }
}

impl BootConfig {
    /// Load boot configuration from all sources
    pub fn load() -> Self {
        let path = std::env::var("STAGEHAND_CONFIG")
            .ok()
            .filter(|p| !p.is_empty())
            .or_else(|| {
                Path::new(DEFAULT_CONFIG_FILE)
                    .exists()
                    .then(|| DEFAULT_CONFIG_FILE.to_string())
            });

        let mut config = match path {
            Some(path) => match Self::load_from_file(&path) {
                Ok(loaded) => {
                    log::info!("Loaded boot config from {}", path);
                    loaded
                }
                Err(e) => {
                    log::warn!("Ignoring {}: {}", path, e);
                    Self::default()
                }
            },
            None => Self::default(),
        };

        if let Ok(loader) = std::env::var("STAGEHAND_LOADER") {
            match loader.parse() {
                Ok(loader_type) => {
                    config.demo.loader_type = loader_type;
                    log::info!("Loader type from env: {}", config.demo.loader_type);
                }
                Err(e) => log::warn!("{}", e),
            }
        }

        if let Ok(delay) = std::env::var("STAGEHAND_DEBUG_DELAY") {
            config.apply_debug_delay(&delay);
        }

        config
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| StagehandError::Config(format!("{}: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&content)?;
        config.config_path = Some(path.display().to_string());
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| StagehandError::Config(e.to_string()))
    }

    /// Override the debug delay from free text; unparsable input is ignored
    pub fn apply_debug_delay(&mut self, text: &str) -> bool {
        match text.trim().parse::<u32>() {
            Ok(millis) => {
                self.loader.debug_delay_ms = millis;
                true
            }
            Err(_) => {
                log::debug!("Ignoring debug delay '{}'", text);
                false
            }
        }
    }

    /// Log a summary of the configuration
    pub fn log_summary(&self) {
        log::info!("Boot configuration:");
        log::info!("  Loader type: {}", self.demo.loader_type);
        log::info!("  Hand-off: {}", self.loader.handoff);
        log::info!("  Debug delay: {} ms", self.loader.debug_delay_ms);
        log::info!("  Yield logging: {}", self.loader.debug_yield_logging);
        log::info!("  Frame time: {} ms", self.demo.frame_time_ms);
        log::info!("  Scenes: {}", self.scenes.len());
        if let Some(ref path) = self.config_path {
            log::info!("  Config file: {}", path);
        }
    }
}

/// Built-in demo scenes, registered under both their names and addresses
fn default_scenes() -> BTreeMap<String, LoadProfile> {
    let level = || {
        LoadProfile::new(3, 2).with_roots(vec![
            SceneObject::new("Main Camera")
                .with_component(Component::Camera)
                .with_component(Component::AudioListener),
            SceneObject::new("EventSystem").with_component(Component::EventSystem),
            SceneObject::new("Canvas"),
        ])
    };
    let additive = || {
        LoadProfile::new(2, 1).with_roots(vec![
            SceneObject::new("Additive Camera")
                .with_component(Component::Camera)
                .with_component(Component::AudioListener),
            SceneObject::new("EventSystem").with_component(Component::EventSystem),
            SceneObject::new("Props").with_child(
                SceneObject::new("Jukebox").with_component(Component::AudioListener),
            ),
        ])
    };

    let mut scenes = BTreeMap::new();
    scenes.insert("Level1".to_string(), level());
    scenes.insert("scenes/level1".to_string(), level());
    scenes.insert("Additive".to_string(), additive());
    scenes.insert("scenes/additive".to_string(), additive());
    scenes
}
