//! Engine configuration loaded from a TOML file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Ember".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Filesystem locations of the assets the engine loads at startup.
///
/// The renderer itself never touches the filesystem; these paths are resolved
/// by the application, which hands the loaded bytes down.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetPaths {
    pub model: String,
    pub texture: String,
    pub vertex_shader: String,
    pub fragment_shader: String,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            model: "assets/models/viking_room.obj".to_string(),
            texture: "assets/textures/viking_room.png".to_string(),
            vertex_shader: "shaders/shader.vert.spv".to_string(),
            fragment_shader: "shaders/shader.frag.spv".to_string(),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub assets: AssetPaths,
    /// Maximum frames rendered per second; 0 disables the cap.
    pub frame_cap: u32,
    /// Render multisampled at the highest sample count the device supports.
    pub msaa: bool,
    /// Enable the Vulkan validation layer. Defaults to on in debug builds.
    pub validation: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            assets: AssetPaths::default(),
            frame_cap: 150,
            msaa: true,
            validation: cfg!(debug_assertions),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.frame_cap, 150);
        assert!(config.msaa);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            frame_cap = 60

            [window]
            title = "Test"
            "#,
        )
        .unwrap();
        assert_eq!(config.frame_cap, 60);
        assert_eq!(config.window.title, "Test");
        assert_eq!(config.window.width, 1280);
    }

    #[test]
    fn test_round_trip() {
        let config = Config::default();
        let text = toml::to_string(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.window.title, config.window.title);
        assert_eq!(back.frame_cap, config.frame_cap);
        assert_eq!(back.assets.model, config.assets.model);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/ember.toml").unwrap();
        assert_eq!(config.window.width, 1280);
    }
}
