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

//! Backend-agnostic GPU resource descriptors and handles.
//!
//! Everything in here is plain data: ids are opaque handles issued by a
//! [`GraphicsDevice`](crate::renderer::traits::GraphicsDevice) and
//! descriptors are consumed by it to create the backing resources.

pub mod bind_group;
pub mod buffer;
pub mod command;
pub mod pipeline;
pub mod shader;
pub mod texture;

pub use self::bind_group::*;
pub use self::buffer::*;
pub use self::command::*;
pub use self::pipeline::*;
pub use self::shader::*;
pub use self::texture::*;

/// Information about the adapter backing a graphics device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RendererAdapterInfo {
    /// The adapter name reported by the driver.
    pub name: String,
    /// The backend in use (e.g. "Vulkan", "Metal", "Dx12", "Mock").
    pub backend: String,
    /// A short description of the device class (discrete, integrated, cpu...).
    pub device_type: String,
}
