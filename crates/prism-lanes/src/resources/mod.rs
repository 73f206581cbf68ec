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

//! GPU resource ownership for the lanes.
//!
//! Buffers and targets that more than one lane touches are registered in the
//! [`GpuResourceManager`] under the names below. Everything else is owned by
//! the lane that created it through the RAII wrappers in [`handles`].

mod asset_cache;
pub mod handles;
mod manager;
mod ring;

pub use self::asset_cache::{GpuMesh, MeshCache, TextureCache};
pub use self::handles::*;
pub use self::manager::GpuResourceManager;
pub use self::ring::{DrawConstantRing, DrawSlot, DEFAULT_CHUNK_BLOCKS, MIN_UNIFORM_ALIGNMENT};

/// Color target every geometry lane draws into.
pub const SCENE_COLOR: &str = "SceneColor";
/// Depth target written by the mesh lane and read by culling, fog and depth debug.
pub const SCENE_DEPTH: &str = "SceneDepth";
/// `CameraConstants` of the viewport being rendered.
pub const CAMERA_CONSTANTS: &str = "CameraConstants";
/// `ScreenConstants` of the viewport being rendered.
pub const SCREEN_CONSTANTS: &str = "ScreenConstants";
/// `LightBufferHeader`.
pub const LIGHT_HEADER: &str = "LightHeader";
/// Array of `GpuLightRecord`.
pub const LIGHT_BUFFER: &str = "LightBuffer";
/// Flat per-tile visible light index lists.
pub const TILE_LIGHT_INDICES: &str = "TileLightIndices";
/// One visible light count per tile.
pub const TILE_LIGHT_COUNTS: &str = "TileLightCounts";
/// `LightCullParams`.
pub const CULL_PARAMS: &str = "LightCullParams";
/// `FogConstants`.
pub const FOG_CONSTANTS: &str = "FogConstants";
