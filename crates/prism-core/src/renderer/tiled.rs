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

//! Screen-tile layout for tiled light culling.
//!
//! The screen is split into square tiles. A compute pass tests every light
//! against each tile's depth-bounded frustum slice and writes the indices of
//! the survivors into a flat per-tile list, plus one counter per tile. This
//! module only describes the sizes involved; the pass itself lives in the
//! lanes crate.
//!
//! # Performance Characteristics
//!
//! - **Dispatch**: one workgroup per tile, `TILE_SIZE × TILE_SIZE` threads each
//! - **Memory**: index buffer scales with `tiles × max_lights_per_tile`

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Default tile edge in pixels.
pub const TILE_SIZE: u32 = 16;

/// Default capacity of one tile's light list.
pub const MAX_LIGHTS_PER_TILE: u32 = 256;

/// The tile size for light culling.
///
/// Smaller tiles cull more precisely but cost more workgroups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TileSize {
    /// 16×16 pixel tiles.
    #[default]
    X16,
    /// 32×32 pixel tiles.
    X32,
}

impl TileSize {
    /// Returns the tile size in pixels.
    #[inline]
    pub const fn pixels(&self) -> u32 {
        match self {
            TileSize::X16 => TILE_SIZE,
            TileSize::X32 => 32,
        }
    }

    /// Number of tiles covering `screen_size` pixels, rounding up.
    ///
    /// # Examples
    ///
    /// ```
    /// use prism_core::renderer::tiled::TileSize;
    /// assert_eq!(TileSize::X16.tile_count(1920), 120);
    /// assert_eq!(TileSize::X16.tile_count(1921), 121);
    /// ```
    #[inline]
    pub const fn tile_count(&self, screen_size: u32) -> u32 {
        screen_size.div_ceil(self.pixels())
    }
}

/// Tile grid dimensions for one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TileGrid {
    /// Tiles across.
    pub tiles_x: u32,
    /// Tiles down.
    pub tiles_y: u32,
}

impl TileGrid {
    /// Total number of tiles.
    #[inline]
    pub const fn total(&self) -> u32 {
        self.tiles_x * self.tiles_y
    }

    /// Workgroup counts for the culling dispatch.
    #[inline]
    pub const fn dispatch_size(&self) -> (u32, u32, u32) {
        (self.tiles_x, self.tiles_y, 1)
    }
}

/// Configuration of the tiled culling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightCullConfig {
    /// The tile size for light culling.
    pub tile_size: TileSize,
    /// Capacity of each tile's index list. Lights beyond it are dropped for
    /// that tile only.
    pub max_lights_per_tile: u32,
}

impl Default for LightCullConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LightCullConfig {
    /// Creates a configuration with 16-pixel tiles and 256 lights per tile.
    pub const fn new() -> Self {
        Self {
            tile_size: TileSize::X16,
            max_lights_per_tile: MAX_LIGHTS_PER_TILE,
        }
    }

    /// Calculates the tile grid for a given screen size.
    #[inline]
    pub const fn tile_grid(&self, screen_width: u32, screen_height: u32) -> TileGrid {
        TileGrid {
            tiles_x: self.tile_size.tile_count(screen_width),
            tiles_y: self.tile_size.tile_count(screen_height),
        }
    }

    /// Size in bytes of the per-tile visible light index buffer.
    pub fn light_index_buffer_size(&self, screen_width: u32, screen_height: u32) -> u64 {
        let tiles = self.tile_grid(screen_width, screen_height).total() as u64;
        tiles * self.max_lights_per_tile as u64 * std::mem::size_of::<u32>() as u64
    }

    /// Size in bytes of the per-tile light count buffer.
    pub fn light_count_buffer_size(&self, screen_width: u32, screen_height: u32) -> u64 {
        let tiles = self.tile_grid(screen_width, screen_height).total() as u64;
        tiles * std::mem::size_of::<u32>() as u64
    }
}

/// Uniforms consumed by the culling compute shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightCullParams {
    /// Tile grid dimensions (tiles_x, tiles_y).
    pub tile_count: [u32; 2],
    /// Tile size in pixels.
    pub tile_size: u32,
    /// Capacity of each tile's index list.
    pub max_lights_per_tile: u32,
}

impl LightCullParams {
    /// Builds the uniforms for a configuration at a resolution.
    pub fn new(config: &LightCullConfig, screen_width: u32, screen_height: u32) -> Self {
        let grid = config.tile_grid(screen_width, screen_height);
        Self {
            tile_count: [grid.tiles_x, grid.tiles_y],
            tile_size: config.tile_size.pixels(),
            max_lights_per_tile: config.max_lights_per_tile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_count_uses_ceiling_division() {
        assert_eq!(TileSize::X16.tile_count(1920), 120);
        assert_eq!(TileSize::X16.tile_count(1921), 121);
        assert_eq!(TileSize::X16.tile_count(1080), 68);
        assert_eq!(TileSize::X16.tile_count(1), 1);
        assert_eq!(TileSize::X16.tile_count(0), 0);
        assert_eq!(TileSize::X32.tile_count(1920), 60);
    }

    #[test]
    fn test_default_config() {
        let config = LightCullConfig::default();
        assert_eq!(config.tile_size.pixels(), 16);
        assert_eq!(config.max_lights_per_tile, 256);
    }

    #[test]
    fn test_dispatch_matches_grid() {
        let grid = LightCullConfig::new().tile_grid(1921, 1080);
        assert_eq!(grid.dispatch_size(), (121, 68, 1));
        assert_eq!(grid.total(), 121 * 68);
    }

    #[test]
    fn test_buffer_sizes() {
        let config = LightCullConfig::default();
        // 120 * 68 = 8160 tiles
        assert_eq!(config.light_index_buffer_size(1920, 1080), 8160 * 256 * 4);
        assert_eq!(config.light_count_buffer_size(1920, 1080), 8160 * 4);
    }

    #[test]
    fn test_params_are_uniform_sized() {
        assert_eq!(std::mem::size_of::<LightCullParams>() % 16, 0);
        let params = LightCullParams::new(&LightCullConfig::default(), 800, 600);
        assert_eq!(params.tile_count, [50, 38]);
        assert_eq!(params.tile_size, 16);
    }
}
