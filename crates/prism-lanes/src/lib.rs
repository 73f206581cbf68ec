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

//! # Prism Lanes
//!
//! The render passes of the Prism renderer and what they share: named GPU
//! resources, the per-draw constant ring, mesh and texture caches, and the
//! hot-reloadable shader library.
//!
//! Every pass implements [`render_lane::RenderLane`]. The lanes never talk to
//! a graphics API directly; they record through the
//! [`GraphicsDevice`](prism_core::renderer::GraphicsDevice) contract.

pub mod render_lane;
pub mod resources;
pub mod shader_library;

/// An in-memory [`GraphicsDevice`](prism_core::renderer::GraphicsDevice)
/// recording passes, for tests of the lanes and of code driving them.
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use render_lane::{FrameContext, PrimitiveBatch, RenderLane};
pub use resources::GpuResourceManager;
pub use shader_library::{ShaderLibrary, ShaderSnapshot};
