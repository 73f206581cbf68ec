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

//! Named GPU resources shared between lanes.

use super::handles::{OwnedBuffer, OwnedTexture, OwnedTextureView};
use bytemuck::Pod;
use prism_core::renderer::{
    align_to, BufferBinding, BufferDescriptor, BufferId, BufferUsage, GraphicsDevice,
    ResourceError, TextureAspect, TextureDescriptor, TextureFormat, TextureUsage,
    TextureViewDescriptor, TextureViewId,
};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
struct ManagedBuffer {
    buffer: OwnedBuffer,
    size: u64,
    revision: u64,
}

#[derive(Debug)]
struct ManagedTarget {
    // Views are declared first so they drop before their texture.
    view: OwnedTextureView,
    depth_view: Option<OwnedTextureView>,
    _texture: OwnedTexture,
    width: u32,
    height: u32,
    format: TextureFormat,
    revision: u64,
}

/// Owns the buffers and render targets that several lanes bind by name.
///
/// Creating a resource under a name that is already taken releases the old
/// resource first, so a resize never holds two generations at once. Every
/// creation bumps a revision counter; lanes compare revisions to know when
/// their cached bind groups point at released resources.
#[derive(Debug)]
pub struct GpuResourceManager {
    device: Arc<dyn GraphicsDevice>,
    buffers: HashMap<String, ManagedBuffer>,
    targets: HashMap<String, ManagedTarget>,
    next_revision: u64,
}

impl GpuResourceManager {
    /// Creates an empty manager on `device`.
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self {
            device,
            buffers: HashMap::new(),
            targets: HashMap::new(),
            next_revision: 1,
        }
    }

    /// The device resources are created on.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    fn bump_revision(&mut self) -> u64 {
        let revision = self.next_revision;
        self.next_revision += 1;
        revision
    }

    fn insert_buffer(
        &mut self,
        name: &str,
        size: u64,
        usage: BufferUsage,
    ) -> Result<BufferId, ResourceError> {
        // Release before allocating the replacement.
        if self.buffers.remove(name).is_some() {
            log::debug!("GpuResourceManager: released buffer '{name}'");
        }

        let id = self.device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Owned(name.to_string())),
            size,
            usage,
            mapped_at_creation: false,
        })?;
        let revision = self.bump_revision();
        self.buffers.insert(
            name.to_string(),
            ManagedBuffer {
                buffer: OwnedBuffer::new(self.device.clone(), id),
                size,
                revision,
            },
        );
        Ok(id)
    }

    /// Creates a uniform buffer sized for `T`.
    ///
    /// An existing buffer of the same size under `name` is kept.
    pub fn create_constant_buffer<T: Pod>(&mut self, name: &str) -> Result<BufferId, ResourceError> {
        let size = align_to(std::mem::size_of::<T>() as u64, 16);
        if let Some(existing) = self.buffers.get(name) {
            if existing.size == size {
                return Ok(existing.buffer.id());
            }
        }
        self.insert_buffer(name, size, BufferUsage::UNIFORM | BufferUsage::COPY_DST)
    }

    /// Writes `value` to the start of the constant buffer `name`.
    pub fn update_constant<T: Pod>(&self, name: &str, value: &T) -> Result<(), ResourceError> {
        let managed = self.buffers.get(name).ok_or(ResourceError::NotFound)?;
        self.device
            .write_buffer(managed.buffer.id(), 0, bytemuck::bytes_of(value))
    }

    /// Creates (or recreates) a read-write storage buffer of `size` bytes.
    ///
    /// The previous buffer under `name` is always released first, even when
    /// the size is unchanged.
    pub fn create_structured_buffer(&mut self, name: &str, size: u64) -> Result<BufferId, ResourceError> {
        let size = align_to(size.max(16), 16);
        self.insert_buffer(
            name,
            size,
            BufferUsage::STORAGE | BufferUsage::COPY_DST | BufferUsage::COPY_SRC,
        )
    }

    /// Writes raw bytes into the structured buffer `name`.
    pub fn update_structured(&self, name: &str, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let managed = self.buffers.get(name).ok_or(ResourceError::NotFound)?;
        if offset + data.len() as u64 > managed.size {
            return Err(ResourceError::OutOfBounds);
        }
        self.device.write_buffer(managed.buffer.id(), offset, data)
    }

    /// Releases the buffer or render target `name`. Returns whether
    /// anything was released.
    pub fn release(&mut self, name: &str) -> bool {
        self.buffers.remove(name).is_some() || self.targets.remove(name).is_some()
    }

    /// Releases everything.
    pub fn release_all(&mut self) {
        self.buffers.clear();
        self.targets.clear();
    }

    /// The buffer registered under `name`.
    pub fn buffer(&self, name: &str) -> Option<&BufferId> {
        self.buffers.get(name).map(|m| m.buffer.id_ref())
    }

    /// The size of the buffer registered under `name`.
    pub fn buffer_size(&self, name: &str) -> Option<u64> {
        self.buffers.get(name).map(|m| m.size)
    }

    /// A whole-buffer binding for `name`.
    pub fn binding(&self, name: &str) -> Option<BufferBinding> {
        self.buffers.get(name).map(|m| BufferBinding {
            buffer: m.buffer.id(),
            offset: 0,
            size: None,
        })
    }

    /// Creates (or recreates) a render target with a full view and, for
    /// depth formats, a depth-only view for sampling.
    pub fn create_render_target(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<TextureViewId, ResourceError> {
        if self.targets.remove(name).is_some() {
            log::debug!("GpuResourceManager: released render target '{name}'");
        }

        let texture = self.device.create_texture(&TextureDescriptor {
            label: Some(Cow::Owned(name.to_string())),
            width: width.max(1),
            height: height.max(1),
            format,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        })?;
        let texture = OwnedTexture::new(self.device.clone(), texture);

        let view = self.device.create_texture_view(
            texture.id(),
            &TextureViewDescriptor {
                label: Some(Cow::Owned(format!("{name} View"))),
                aspect: TextureAspect::All,
            },
        )?;
        let view = OwnedTextureView::new(self.device.clone(), view);

        let depth_view = if format.is_depth() {
            let id = self.device.create_texture_view(
                texture.id(),
                &TextureViewDescriptor {
                    label: Some(Cow::Owned(format!("{name} Depth View"))),
                    aspect: TextureAspect::DepthOnly,
                },
            )?;
            Some(OwnedTextureView::new(self.device.clone(), id))
        } else {
            None
        };

        let id = view.id();
        let revision = self.bump_revision();
        self.targets.insert(
            name.to_string(),
            ManagedTarget {
                view,
                depth_view,
                _texture: texture,
                width,
                height,
                format,
                revision,
            },
        );
        Ok(id)
    }

    /// The attachment view of the render target `name`.
    pub fn target_view(&self, name: &str) -> Option<&TextureViewId> {
        self.targets.get(name).map(|t| t.view.id_ref())
    }

    /// The view used to sample a render target: the depth-only view for
    /// depth targets, the full view otherwise.
    pub fn sample_view(&self, name: &str) -> Option<&TextureViewId> {
        self.targets
            .get(name)
            .map(|t| t.depth_view.as_ref().unwrap_or(&t.view).id_ref())
    }

    /// The size of the render target `name`.
    pub fn target_size(&self, name: &str) -> Option<(u32, u32)> {
        self.targets.get(name).map(|t| (t.width, t.height))
    }

    /// The format of the render target `name`.
    pub fn target_format(&self, name: &str) -> Option<TextureFormat> {
        self.targets.get(name).map(|t| t.format)
    }

    /// The revision of the buffer or render target `name`. It changes
    /// every time the resource is recreated.
    pub fn revision(&self, name: &str) -> Option<u64> {
        self.buffers
            .get(name)
            .map(|m| m.revision)
            .or_else(|| self.targets.get(name).map(|t| t.revision))
    }

    /// Number of live buffers.
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Number of live render targets.
    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockDevice;
    use prism_core::renderer::LightBufferHeader;

    fn manager() -> (Arc<MockDevice>, GpuResourceManager) {
        let device = Arc::new(MockDevice::default());
        let manager = GpuResourceManager::new(device.clone());
        (device, manager)
    }

    #[test]
    fn test_recreate_releases_previous() {
        let (device, mut manager) = manager();
        let first = manager.create_structured_buffer("Tiles", 1024).unwrap();
        let rev = manager.revision("Tiles").unwrap();
        let second = manager.create_structured_buffer("Tiles", 1024).unwrap();

        assert_ne!(first, second);
        assert!(manager.revision("Tiles").unwrap() > rev);
        assert_eq!(device.live_buffer_count(), 1);
        assert_eq!(manager.live_buffers(), 1);
    }

    #[test]
    fn test_constant_buffer_is_reused() {
        let (device, mut manager) = manager();
        let a = manager.create_constant_buffer::<LightBufferHeader>("Header").unwrap();
        let b = manager.create_constant_buffer::<LightBufferHeader>("Header").unwrap();
        assert_eq!(a, b);
        assert_eq!(device.live_buffer_count(), 1);

        manager.update_constant("Header", &LightBufferHeader::new(3)).unwrap();
        let bytes = device.buffer_contents(a).unwrap();
        assert_eq!(&bytes[16..20], &3u32.to_ne_bytes());
    }

    #[test]
    fn test_out_of_bounds_write() {
        let (_device, mut manager) = manager();
        manager.create_structured_buffer("Small", 32).unwrap();
        assert_eq!(
            manager.update_structured("Small", 16, &[0u8; 32]),
            Err(ResourceError::OutOfBounds)
        );
        assert_eq!(
            manager.update_structured("Missing", 0, &[0u8; 4]),
            Err(ResourceError::NotFound)
        );
    }

    #[test]
    fn test_depth_target_has_sample_view() {
        let (device, mut manager) = manager();
        let view = manager
            .create_render_target("SceneDepth", 64, 32, TextureFormat::Depth32Float)
            .unwrap();
        assert_ne!(manager.sample_view("SceneDepth"), Some(&view));
        assert_eq!(manager.target_size("SceneDepth"), Some((64, 32)));

        manager.create_render_target("SceneDepth", 128, 64, TextureFormat::Depth32Float).unwrap();
        assert_eq!(device.live_texture_count(), 1);
        assert_eq!(device.live_view_count(), 2);

        manager.release_all();
        assert_eq!(device.live_texture_count(), 0);
        assert_eq!(device.live_view_count(), 0);
    }
}
