// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Renderer settings, loadable from RON.
//!
//! Every field has a default, so a settings file only needs to name what it
//! overrides:
//!
//! ```
//! use prism_core::config::RendererSettings;
//!
//! let settings = RendererSettings::from_ron_str("(grid_line_count: 200)").unwrap();
//! assert_eq!(settings.grid_line_count, 200);
//! assert_eq!(settings.max_lights, prism_core::renderer::MAX_LIGHTS);
//! ```

use crate::math::{LinearRgba, Vec3};
use crate::renderer::light::MAX_LIGHTS;
use crate::renderer::tiled::{LightCullConfig, TileSize, MAX_LIGHTS_PER_TILE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors raised while loading or saving [`RendererSettings`].
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The contents are not valid settings.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Height fog defaults applied to every viewport with the fog flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FogSettings {
    /// Fog color.
    pub color: LinearRgba,
    /// Base density.
    pub density: f32,
    /// Exponential falloff with height above `position`.
    pub height_falloff: f32,
    /// Distance from the eye where fog starts.
    pub start_distance: f32,
    /// Distance beyond which fog no longer accumulates.
    pub cutoff_distance: f32,
    /// Upper bound of the fog opacity.
    pub max_opacity: f32,
    /// World position of the fog volume's base.
    pub position: Vec3,
}

impl Default for FogSettings {
    fn default() -> Self {
        Self {
            color: LinearRgba::rgb(0.7, 0.75, 0.8),
            density: 0.02,
            height_falloff: 0.2,
            start_distance: 5.0,
            cutoff_distance: 800.0,
            max_opacity: 0.9,
            position: Vec3::ZERO,
        }
    }
}

/// Tunables of the whole renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Light culling tile size.
    pub tile_size: TileSize,
    /// Capacity of each tile's light list.
    pub max_lights_per_tile: u32,
    /// Capacity of the light buffer.
    pub max_lights: usize,
    /// Lines drawn along each axis of the grid.
    pub grid_line_count: u32,
    /// Color of the reference grid.
    pub grid_color: LinearRgba,
    /// Color of mesh bounding boxes.
    pub bounds_color: LinearRgba,
    /// Color of light volumes.
    pub light_volume_color: LinearRgba,
    /// Whether point and spot lights push their volume into the line batch.
    pub show_light_volumes: bool,
    /// Render target clear color.
    pub clear_color: LinearRgba,
    /// Fog defaults.
    pub fog: FogSettings,
    /// Directory watched for shader changes.
    pub shader_dir: PathBuf,
    /// Debounce window of the shader watcher, in milliseconds.
    pub hot_reload_interval_ms: u64,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            tile_size: TileSize::X16,
            max_lights_per_tile: MAX_LIGHTS_PER_TILE,
            max_lights: MAX_LIGHTS,
            grid_line_count: 5000,
            grid_color: LinearRgba::new(0.35, 0.35, 0.35, 1.0),
            bounds_color: LinearRgba::new(1.0, 1.0, 0.0, 1.0),
            light_volume_color: LinearRgba::new(1.0, 0.85, 0.3, 1.0),
            show_light_volumes: true,
            clear_color: LinearRgba::new(0.1, 0.1, 0.12, 1.0),
            fog: FogSettings::default(),
            shader_dir: PathBuf::from("shaders"),
            hot_reload_interval_ms: 50,
        }
    }
}

impl RendererSettings {
    /// Parses settings from a RON string.
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        ron::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Loads settings from a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Serializes the settings as pretty RON.
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        let pretty = ron::ser::PrettyConfig::default().indentor("  ".to_string());
        ron::ser::to_string_pretty(self, pretty).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Writes the settings to a RON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }

    /// The light culling configuration derived from these settings.
    pub fn light_cull_config(&self) -> LightCullConfig {
        LightCullConfig {
            tile_size: self.tile_size,
            max_lights_per_tile: self.max_lights_per_tile,
        }
    }

    /// The shader watcher debounce window.
    pub fn hot_reload_interval(&self) -> Duration {
        Duration::from_millis(self.hot_reload_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let settings = RendererSettings::default();
        assert_eq!(settings.light_cull_config(), LightCullConfig::default());
        assert_eq!(settings.hot_reload_interval(), Duration::from_millis(50));
        assert_eq!(settings.grid_line_count, 5000);
    }

    #[test]
    fn test_partial_override() {
        let settings =
            RendererSettings::from_ron_str("(tile_size: X32, shader_dir: \"assets/shaders\")").unwrap();
        assert_eq!(settings.tile_size, TileSize::X32);
        assert_eq!(settings.shader_dir, PathBuf::from("assets/shaders"));
        assert_eq!(settings.max_lights_per_tile, MAX_LIGHTS_PER_TILE);
    }

    #[test]
    fn test_text_round_trip() {
        let mut settings = RendererSettings::default();
        settings.fog.density = 0.5;
        let text = settings.to_ron_string().unwrap();
        assert_eq!(RendererSettings::from_ron_str(&text).unwrap(), settings);
    }

    #[test]
    fn test_parse_error_display() {
        let err = RendererSettings::from_ron_str("(grid_line_count: \"many\")").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("Parse error:"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = RendererSettings::load("/definitely/not/here.ron").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
