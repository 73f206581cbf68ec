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

//! Backend-agnostic rendering contracts.
//!
//! This module defines the common language of every render pass: the
//! abstract [`GraphicsDevice`] and [`CommandEncoder`] traits, plain-data
//! descriptors and handles, the error hierarchy, and the fixed GPU layouts
//! (light records, tile buffers, constant blocks) shared between the CPU side
//! and the WGSL shaders.
//!
//! The concrete backend lives in `prism-infra`; the passes in `prism-lanes`
//! and the orchestrator in `prism-agents` only see these traits.

pub mod api;
pub mod constants;
pub mod error;
pub mod light;
pub mod tiled;
pub mod traits;

pub use self::api::*;
pub use self::constants::*;
pub use self::error::{PipelineError, RenderError, ResourceError, ShaderError};
pub use self::light::{
    GpuLightRecord, LightBufferHeader, LightKind, LightParams, GLOBAL_AMBIENT, MAX_LIGHTS,
};
pub use self::tiled::{
    LightCullConfig, LightCullParams, TileGrid, TileSize, MAX_LIGHTS_PER_TILE, TILE_SIZE,
};
pub use self::traits::{CommandEncoder, ComputePass, GraphicsDevice, RenderPass};
