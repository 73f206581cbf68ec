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

//! GPU copies of scene meshes and textures, uploaded on first use.

use super::handles::{OwnedBuffer, OwnedSampler, OwnedTexture, OwnedTextureView};
use prism_core::renderer::{
    AddressMode, BufferDescriptor, BufferUsage, FilterMode, GraphicsDevice, ResourceError,
    SamplerDescriptor, SamplerId, TextureDescriptor, TextureFormat, TextureUsage,
    TextureViewDescriptor, TextureViewId,
};
use prism_core::scene::{MeshData, MeshHandle, TextureData, TextureHandle};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

/// Vertex and index buffers of one uploaded mesh.
#[derive(Debug)]
pub struct GpuMesh {
    /// Interleaved `StaticVertex` data.
    pub vertex_buffer: OwnedBuffer,
    /// `u32` indices.
    pub index_buffer: OwnedBuffer,
    /// Number of indices.
    pub index_count: u32,
}

/// Uploads meshes once per handle.
#[derive(Debug)]
pub struct MeshCache {
    device: Arc<dyn GraphicsDevice>,
    meshes: HashMap<MeshHandle, GpuMesh>,
}

impl MeshCache {
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self {
            device,
            meshes: HashMap::new(),
        }
    }

    /// Uploads `data` under `handle` unless it is already resident.
    pub fn ensure(&mut self, handle: MeshHandle, data: &MeshData) -> Result<(), ResourceError> {
        if self.meshes.contains_key(&handle) {
            return Ok(());
        }
        if data.vertices.is_empty() || data.indices.is_empty() {
            return Err(ResourceError::InvalidHandle);
        }

        let vertex = self.device.create_buffer_with_data(
            &BufferDescriptor {
                label: Some(Cow::Owned(format!("Mesh {} Vertices", handle.0))),
                size: std::mem::size_of_val(data.vertices.as_slice()) as u64,
                usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            },
            bytemuck::cast_slice(&data.vertices),
        )?;
        let vertex_buffer = OwnedBuffer::new(self.device.clone(), vertex);

        let index = self.device.create_buffer_with_data(
            &BufferDescriptor {
                label: Some(Cow::Owned(format!("Mesh {} Indices", handle.0))),
                size: std::mem::size_of_val(data.indices.as_slice()) as u64,
                usage: BufferUsage::INDEX | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            },
            bytemuck::cast_slice(&data.indices),
        )?;

        self.meshes.insert(
            handle,
            GpuMesh {
                vertex_buffer,
                index_buffer: OwnedBuffer::new(self.device.clone(), index),
                index_count: data.indices.len() as u32,
            },
        );
        Ok(())
    }

    pub fn get(&self, handle: MeshHandle) -> Option<&GpuMesh> {
        self.meshes.get(&handle)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn clear(&mut self) {
        self.meshes.clear();
    }
}

#[derive(Debug)]
struct GpuTexture {
    view: OwnedTextureView,
    _texture: OwnedTexture,
}

/// Uploads textures once per handle and keeps a white fallback for
/// untextured or malformed entries.
#[derive(Debug)]
pub struct TextureCache {
    device: Arc<dyn GraphicsDevice>,
    textures: HashMap<TextureHandle, GpuTexture>,
    fallback: GpuTexture,
    linear_sampler: OwnedSampler,
    point_sampler: OwnedSampler,
}

impl TextureCache {
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Result<Self, ResourceError> {
        let fallback = upload(device.as_ref(), &device, "White", &TextureData::white())?;
        let linear = device.create_sampler(&SamplerDescriptor {
            label: Some(Cow::Borrowed("Linear Sampler")),
            filter: FilterMode::Linear,
            address_mode: AddressMode::Repeat,
        })?;
        let linear_sampler = OwnedSampler::new(device.clone(), linear);
        let point = device.create_sampler(&SamplerDescriptor {
            label: Some(Cow::Borrowed("Point Sampler")),
            filter: FilterMode::Nearest,
            address_mode: AddressMode::ClampToEdge,
        })?;
        Ok(Self {
            point_sampler: OwnedSampler::new(device.clone(), point),
            linear_sampler,
            fallback,
            textures: HashMap::new(),
            device,
        })
    }

    /// The view for `handle`, uploading it from `data` on first use.
    ///
    /// Missing or malformed textures resolve to the white fallback.
    pub fn view(&mut self, handle: Option<TextureHandle>, data: Option<&TextureData>) -> TextureViewId {
        let (Some(handle), Some(data)) = (handle, data) else {
            return self.fallback.view.id();
        };
        if !self.textures.contains_key(&handle) {
            if !data.is_well_formed() {
                log::warn!("TextureCache: texture {} is malformed, using white", handle.0);
                return self.fallback.view.id();
            }
            let label = format!("Texture {}", handle.0);
            match upload(self.device.as_ref(), &self.device, &label, data) {
                Ok(texture) => {
                    self.textures.insert(handle, texture);
                }
                Err(e) => {
                    log::error!("TextureCache: failed to upload texture {}: {e}", handle.0);
                    return self.fallback.view.id();
                }
            }
        }
        self.textures
            .get(&handle)
            .map_or(self.fallback.view.id(), |t| t.view.id())
    }

    pub fn fallback_view(&self) -> TextureViewId {
        self.fallback.view.id()
    }

    pub fn linear_sampler(&self) -> SamplerId {
        self.linear_sampler.id()
    }

    pub fn point_sampler(&self) -> SamplerId {
        self.point_sampler.id()
    }
}

fn upload(
    device: &dyn GraphicsDevice,
    owner: &Arc<dyn GraphicsDevice>,
    label: &str,
    data: &TextureData,
) -> Result<GpuTexture, ResourceError> {
    let texture = device.create_texture(&TextureDescriptor {
        label: Some(Cow::Owned(label.to_string())),
        width: data.width,
        height: data.height,
        format: TextureFormat::Rgba8UnormSrgb,
        usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
    })?;
    let texture = OwnedTexture::new(owner.clone(), texture);
    device.write_texture(texture.id(), &data.pixels, data.width, data.height)?;
    let view = device.create_texture_view(texture.id(), &TextureViewDescriptor::default())?;
    Ok(GpuTexture {
        view: OwnedTextureView::new(owner.clone(), view),
        _texture: texture,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockDevice;
    use prism_core::math::{Vec2, Vec3};
    use prism_core::scene::StaticVertex;

    fn triangle() -> MeshData {
        MeshData {
            vertices: vec![
                StaticVertex::new(Vec3::ZERO, Vec3::Z, Vec2::ZERO),
                StaticVertex::new(Vec3::X, Vec3::Z, Vec2::ZERO),
                StaticVertex::new(Vec3::Y, Vec3::Z, Vec2::ZERO),
            ],
            indices: vec![0, 1, 2],
        }
    }

    #[test]
    fn test_mesh_uploaded_once() {
        let device = Arc::new(MockDevice::default());
        let mut cache = MeshCache::new(device.clone());
        cache.ensure(MeshHandle(1), &triangle()).unwrap();
        cache.ensure(MeshHandle(1), &triangle()).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(MeshHandle(1)).unwrap().index_count, 3);
        assert_eq!(device.live_buffer_count(), 2);

        let vertices = device
            .buffer_contents(cache.get(MeshHandle(1)).unwrap().vertex_buffer.id())
            .unwrap();
        assert_eq!(vertices.len(), 3 * std::mem::size_of::<StaticVertex>());
    }

    #[test]
    fn test_empty_mesh_rejected() {
        let device = Arc::new(MockDevice::default());
        let mut cache = MeshCache::new(device);
        let empty = MeshData {
            vertices: Vec::new(),
            indices: Vec::new(),
        };
        assert_eq!(cache.ensure(MeshHandle(2), &empty), Err(ResourceError::InvalidHandle));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_malformed_texture_falls_back() {
        let device = Arc::new(MockDevice::default());
        let mut cache = TextureCache::new(device.clone()).unwrap();
        let broken = TextureData {
            width: 4,
            height: 4,
            pixels: vec![0; 3],
        };
        assert_eq!(cache.view(Some(TextureHandle(5)), Some(&broken)), cache.fallback_view());
        assert_eq!(cache.view(None, None), cache.fallback_view());

        let good = TextureData {
            width: 1,
            height: 1,
            pixels: vec![255; 4],
        };
        let view = cache.view(Some(TextureHandle(6)), Some(&good));
        assert_ne!(view, cache.fallback_view());
        assert_eq!(device.live_texture_count(), 2);
    }
}
