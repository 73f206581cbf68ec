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

//! View modes, viewport types and show flags.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Selects the shading model and debug visualization of a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ViewMode {
    /// Blinn-Phong lighting per pixel.
    #[default]
    LitPhong,
    /// Lighting evaluated per vertex.
    LitGouraud,
    /// Diffuse-only lighting per pixel.
    LitLambert,
    /// Base color only.
    Unlit,
    /// Unlit shading rasterized as lines.
    Wireframe,
    /// Linearized scene depth.
    SceneDepth,
    /// World-space normals as colors.
    WorldNormal,
    /// Per-tile light counts as a heat map.
    LightDebug,
}

impl ViewMode {
    /// All modes, ordered by their persisted code.
    pub const ALL: [ViewMode; 8] = [
        ViewMode::LitPhong,
        ViewMode::LitGouraud,
        ViewMode::LitLambert,
        ViewMode::Unlit,
        ViewMode::Wireframe,
        ViewMode::SceneDepth,
        ViewMode::WorldNormal,
        ViewMode::LightDebug,
    ];

    /// Integer code used in persisted viewport settings.
    pub fn code(self) -> u32 {
        Self::ALL.iter().position(|m| *m == self).unwrap_or(0) as u32
    }

    /// Decodes a persisted code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Whether geometry is rasterized as lines.
    #[inline]
    pub fn is_wireframe(self) -> bool {
        self == ViewMode::Wireframe
    }
}

/// Projection of a viewport: free perspective or one of six axis-aligned
/// orthographic views looking at the shared pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ViewportType {
    /// Looking down -Z.
    Top,
    /// Looking down -X.
    Front,
    /// Looking down -Y.
    Left,
    /// Free-flying perspective camera.
    #[default]
    Perspective,
    /// Looking up +Z.
    Bottom,
    /// Looking down +X.
    Back,
    /// Looking down +Y.
    Right,
}

impl ViewportType {
    /// All types, ordered by their persisted code.
    pub const ALL: [ViewportType; 7] = [
        ViewportType::Top,
        ViewportType::Front,
        ViewportType::Left,
        ViewportType::Perspective,
        ViewportType::Bottom,
        ViewportType::Back,
        ViewportType::Right,
    ];

    /// Integer code used in persisted viewport settings.
    pub fn code(self) -> u32 {
        Self::ALL.iter().position(|t| *t == self).unwrap_or(3) as u32
    }

    /// Decodes a persisted code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Whether this is one of the orthographic types.
    #[inline]
    pub fn is_ortho(self) -> bool {
        self != ViewportType::Perspective
    }
}

bitflags! {
    /// Per-viewport visibility toggles.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ShowFlags: u32 {
        /// Accumulate world bounding boxes of meshes into the line batch.
        const AABB = 1 << 0;
        /// Draw static meshes.
        const PRIMITIVES = 1 << 1;
        /// Draw text and icon billboards.
        const BILLBOARD_TEXT = 1 << 2;
        /// Apply height fog.
        const FOG = 1 << 3;
        /// Draw the reference grid.
        const GRID = 1 << 4;
    }
}

impl Default for ShowFlags {
    fn default() -> Self {
        ShowFlags::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_show_flags_is_31() {
        assert_eq!(ShowFlags::default().bits(), 31);
    }

    #[test]
    fn codes_round_trip() {
        for mode in ViewMode::ALL {
            assert_eq!(ViewMode::from_code(mode.code()), Some(mode));
        }
        assert_eq!(ViewportType::default().code(), 3);
        assert_eq!(ViewportType::from_code(42), None);
    }
}
