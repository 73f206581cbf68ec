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

//! Owning wrappers around device resource ids.
//!
//! Each wrapper keeps the device alive and destroys its resource when
//! dropped, so resize paths and early returns never have to release by
//! hand. Failures during destruction are logged and otherwise ignored.

use prism_core::renderer::{
    BindGroupId, BindGroupLayoutId, BufferId, ComputePipelineId, GraphicsDevice, PipelineLayoutId,
    RenderPipelineId, SamplerId, ShaderModuleId, TextureId, TextureViewId,
};
use std::fmt;
use std::sync::Arc;

macro_rules! owned_handle {
    ($(#[$meta:meta])* $name:ident, $id:ty, $destroy:ident) => {
        $(#[$meta])*
        pub struct $name {
            id: $id,
            device: Arc<dyn GraphicsDevice>,
        }

        impl $name {
            /// Takes ownership of `id`, which must have been created by `device`.
            pub fn new(device: Arc<dyn GraphicsDevice>, id: $id) -> Self {
                Self { id, device }
            }

            /// The wrapped id.
            #[inline]
            pub fn id(&self) -> $id {
                self.id
            }

            /// A reference to the wrapped id, for APIs that borrow it for
            /// the duration of a pass.
            #[inline]
            pub fn id_ref(&self) -> &$id {
                &self.id
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                if let Err(e) = self.device.$destroy(self.id) {
                    log::warn!(
                        concat!(stringify!($name), ": failed to destroy {:?}: {}"),
                        self.id,
                        e
                    );
                }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.id).finish()
            }
        }
    };
}

owned_handle!(
    /// An owned GPU buffer.
    OwnedBuffer,
    BufferId,
    destroy_buffer
);
owned_handle!(
    /// An owned texture.
    OwnedTexture,
    TextureId,
    destroy_texture
);
owned_handle!(
    /// An owned texture view.
    OwnedTextureView,
    TextureViewId,
    destroy_texture_view
);
owned_handle!(
    /// An owned sampler.
    OwnedSampler,
    SamplerId,
    destroy_sampler
);
owned_handle!(
    /// An owned bind group.
    OwnedBindGroup,
    BindGroupId,
    destroy_bind_group
);
owned_handle!(
    /// An owned bind group layout.
    OwnedBindGroupLayout,
    BindGroupLayoutId,
    destroy_bind_group_layout
);
owned_handle!(
    /// An owned pipeline layout.
    OwnedPipelineLayout,
    PipelineLayoutId,
    destroy_pipeline_layout
);
owned_handle!(
    /// An owned render pipeline.
    OwnedRenderPipeline,
    RenderPipelineId,
    destroy_render_pipeline
);
owned_handle!(
    /// An owned compute pipeline.
    OwnedComputePipeline,
    ComputePipelineId,
    destroy_compute_pipeline
);
owned_handle!(
    /// An owned shader module.
    OwnedShaderModule,
    ShaderModuleId,
    destroy_shader_module
);
