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

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use prism_core::renderer::api::{
    BindGroupDescriptor, BindGroupId, BindGroupLayoutDescriptor, BindGroupLayoutId,
    BindingResource, BufferDescriptor, BufferId, BufferUsage, CommandBufferId,
    ComputePipelineDescriptor, ComputePipelineId, PipelineLayoutDescriptor, PipelineLayoutId,
    RenderPipelineDescriptor, RenderPipelineId, RendererAdapterInfo, SamplerDescriptor, SamplerId,
    ShaderModuleDescriptor, ShaderModuleId, ShaderSourceData, TextureDescriptor, TextureFormat,
    TextureId, TextureViewDescriptor, TextureViewId,
};
use prism_core::renderer::traits::{CommandEncoder, GraphicsDevice};
use prism_core::renderer::{ResourceError, ShaderError};

use super::command::WgpuCommandEncoder;
use super::context::{ContextOptions, WgpuGraphicsContext};
use super::conversions::{from_wgpu_texture_format, IntoWgpu};

#[derive(Debug)]
struct WgpuTextureEntry {
    wgpu_texture: Arc<wgpu::Texture>,
    format: TextureFormat,
}

/// The internal, non-clonable state of the WgpuDevice.
///
/// Every resource table maps an opaque id to an `Arc` of the wgpu object so
/// that passes can look a resource up, clone the handle and drop the lock
/// before recording.
#[derive(Debug)]
pub struct WgpuDeviceInternal {
    context: Arc<WgpuGraphicsContext>,
    shader_modules: Mutex<HashMap<ShaderModuleId, Arc<wgpu::ShaderModule>>>,
    bind_group_layouts: Mutex<HashMap<BindGroupLayoutId, Arc<wgpu::BindGroupLayout>>>,
    bind_groups: Mutex<HashMap<BindGroupId, Arc<wgpu::BindGroup>>>,
    pipeline_layouts: Mutex<HashMap<PipelineLayoutId, Arc<wgpu::PipelineLayout>>>,
    render_pipelines: Mutex<HashMap<RenderPipelineId, Arc<wgpu::RenderPipeline>>>,
    compute_pipelines: Mutex<HashMap<ComputePipelineId, Arc<wgpu::ComputePipeline>>>,
    buffers: Mutex<HashMap<BufferId, Arc<wgpu::Buffer>>>,
    textures: Mutex<HashMap<TextureId, WgpuTextureEntry>>,
    texture_views: Mutex<HashMap<TextureViewId, Arc<wgpu::TextureView>>>,
    samplers: Mutex<HashMap<SamplerId, Arc<wgpu::Sampler>>>,

    // One counter for every resource kind keeps ids unique across tables,
    // which makes stale ids easy to spot in logs.
    next_id: AtomicUsize,

    /// Command buffers that have been finished but not yet submitted.
    pending_command_buffers: Mutex<HashMap<CommandBufferId, wgpu::CommandBuffer>>,
    /// A thread-safe counter to generate unique command buffer IDs.
    command_buffer_id_counter: AtomicU64,
}

/// A clonable, thread-safe handle to the wgpu graphics device.
/// It wraps the actual device state (`WgpuDeviceInternal`) in an Arc,
/// allowing it to be shared with command encoders.
#[derive(Clone, Debug)]
pub struct WgpuDevice {
    internal: Arc<WgpuDeviceInternal>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, ResourceError> {
    mutex
        .lock()
        .map_err(|e| ResourceError::BackendError(format!("Mutex poisoned ({what}): {e}")))
}

fn lookup<K: std::hash::Hash + Eq, V: Clone>(mutex: &Mutex<HashMap<K, V>>, key: &K) -> Option<V> {
    mutex
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(key)
        .cloned()
}

fn remove<K: std::hash::Hash + Eq, V>(
    mutex: &Mutex<HashMap<K, V>>,
    key: &K,
    what: &str,
) -> Result<(), ResourceError> {
    match lock(mutex, what)?.remove(key) {
        Some(_) => Ok(()),
        None => Err(ResourceError::NotFound),
    }
}

impl WgpuDevice {
    pub fn new(context: Arc<WgpuGraphicsContext>) -> Self {
        Self {
            internal: Arc::new(WgpuDeviceInternal {
                context,
                shader_modules: Mutex::new(HashMap::new()),
                bind_group_layouts: Mutex::new(HashMap::new()),
                bind_groups: Mutex::new(HashMap::new()),
                pipeline_layouts: Mutex::new(HashMap::new()),
                render_pipelines: Mutex::new(HashMap::new()),
                compute_pipelines: Mutex::new(HashMap::new()),
                buffers: Mutex::new(HashMap::new()),
                textures: Mutex::new(HashMap::new()),
                texture_views: Mutex::new(HashMap::new()),
                samplers: Mutex::new(HashMap::new()),
                next_id: AtomicUsize::new(1),
                pending_command_buffers: Mutex::new(HashMap::new()),
                command_buffer_id_counter: AtomicU64::new(0),
            }),
        }
    }

    /// Opens an adapter without a window and wraps it in a device.
    pub fn headless(options: &ContextOptions) -> anyhow::Result<Self> {
        let context = WgpuGraphicsContext::new_blocking(options)?;
        Ok(Self::new(Arc::new(context)))
    }

    pub fn context(&self) -> &WgpuGraphicsContext {
        &self.internal.context
    }

    fn next_id(&self) -> usize {
        self.internal.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn device(&self) -> &wgpu::Device {
        &self.internal.context.device
    }

    fn queue(&self) -> &wgpu::Queue {
        &self.internal.context.queue
    }

    // --- Lookups used by the command encoder ---

    pub fn get_wgpu_render_pipeline(&self, id: RenderPipelineId) -> Option<Arc<wgpu::RenderPipeline>> {
        lookup(&self.internal.render_pipelines, &id)
    }

    pub fn get_wgpu_compute_pipeline(&self, id: ComputePipelineId) -> Option<Arc<wgpu::ComputePipeline>> {
        lookup(&self.internal.compute_pipelines, &id)
    }

    pub fn get_wgpu_bind_group(&self, id: BindGroupId) -> Option<Arc<wgpu::BindGroup>> {
        lookup(&self.internal.bind_groups, &id)
    }

    pub fn get_wgpu_buffer(&self, id: BufferId) -> Option<Arc<wgpu::Buffer>> {
        lookup(&self.internal.buffers, &id)
    }

    pub fn get_wgpu_texture_view(&self, id: TextureViewId) -> Option<Arc<wgpu::TextureView>> {
        lookup(&self.internal.texture_views, &id)
    }

    /// Blocks until every submitted command buffer has executed.
    pub fn poll_device_blocking(&self) {
        if let Err(e) = self.device().poll(wgpu::PollType::wait_indefinitely()) {
            log::warn!("Failed to poll device: {e:?}");
        }
    }

    /// Stores a finished command buffer until it is submitted.
    pub(crate) fn register_command_buffer(&self, buffer: wgpu::CommandBuffer) -> CommandBufferId {
        let id = CommandBufferId(
            self.internal
                .command_buffer_id_counter
                .fetch_add(1, Ordering::SeqCst),
        );
        self.internal
            .pending_command_buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, buffer);
        id
    }

    fn resolve_layouts(&self, ids: &[BindGroupLayoutId]) -> Result<Vec<Arc<wgpu::BindGroupLayout>>, ResourceError> {
        let layouts = lock(&self.internal.bind_group_layouts, "bind_group_layouts")?;
        ids.iter()
            .map(|id| layouts.get(id).cloned().ok_or(ResourceError::NotFound))
            .collect()
    }

    fn resolve_pipeline_layout(
        &self,
        id: Option<PipelineLayoutId>,
    ) -> Result<Option<Arc<wgpu::PipelineLayout>>, ResourceError> {
        match id {
            Some(id) => lookup(&self.internal.pipeline_layouts, &id)
                .map(Some)
                .ok_or(ResourceError::NotFound),
            None => Ok(None),
        }
    }

    fn resolve_shader(&self, id: ShaderModuleId) -> Result<Arc<wgpu::ShaderModule>, ResourceError> {
        lookup(&self.internal.shader_modules, &id).ok_or_else(|| ShaderError::NotFound { id }.into())
    }
}

/// A bound resource with its wgpu handle held alive while the bind group is built.
enum ResolvedBinding {
    Buffer(Arc<wgpu::Buffer>, u64, Option<NonZeroU64>),
    View(Arc<wgpu::TextureView>),
    Sampler(Arc<wgpu::Sampler>),
}

impl GraphicsDevice for WgpuDevice {
    // --- Shader Module Operations ---

    fn create_shader_module(&self, descriptor: &ShaderModuleDescriptor) -> Result<ShaderModuleId, ResourceError> {
        let label = descriptor.label.unwrap_or("unnamed");
        let source = match &descriptor.source {
            ShaderSourceData::Wgsl(text) => wgpu::ShaderSource::Wgsl(text.clone()),
        };
        let module = self.device().create_shader_module(wgpu::ShaderModuleDescriptor {
            label: descriptor.label,
            source,
        });

        // An invalid module is still returned by wgpu; the diagnostics tell
        // whether it may be used.
        let info = pollster::block_on(module.get_compilation_info());
        let errors: Vec<String> = info
            .messages
            .iter()
            .filter(|m| m.message_type == wgpu::CompilationMessageType::Error)
            .map(|m| match &m.location {
                Some(loc) => format!("{}:{}: {}", loc.line_number, loc.line_position, m.message),
                None => m.message.clone(),
            })
            .collect();
        if !errors.is_empty() {
            return Err(ShaderError::CompilationError {
                label: label.to_string(),
                details: errors.join("\n"),
            }
            .into());
        }

        let id = ShaderModuleId(self.next_id());
        lock(&self.internal.shader_modules, "shader_modules")?.insert(id, Arc::new(module));
        log::debug!("WgpuDevice: Created shader module '{label}' with ID: {id:?}");
        Ok(id)
    }

    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError> {
        match lock(&self.internal.shader_modules, "shader_modules")?.remove(&id) {
            Some(_) => Ok(()),
            None => Err(ShaderError::NotFound { id }.into()),
        }
    }

    // --- Bind Groups ---

    fn create_bind_group_layout(
        &self,
        descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<BindGroupLayoutId, ResourceError> {
        let entries: Vec<wgpu::BindGroupLayoutEntry> = descriptor
            .entries
            .iter()
            .map(|e| wgpu::BindGroupLayoutEntry {
                binding: e.binding,
                visibility: e.visibility.into_wgpu(),
                ty: e.ty.into_wgpu(),
                count: None,
            })
            .collect();
        let layout = self.device().create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: descriptor.label,
            entries: &entries,
        });
        let id = BindGroupLayoutId(self.next_id());
        lock(&self.internal.bind_group_layouts, "bind_group_layouts")?.insert(id, Arc::new(layout));
        Ok(id)
    }

    fn destroy_bind_group_layout(&self, id: BindGroupLayoutId) -> Result<(), ResourceError> {
        remove(&self.internal.bind_group_layouts, &id, "bind_group_layouts")
    }

    fn create_bind_group(&self, descriptor: &BindGroupDescriptor) -> Result<BindGroupId, ResourceError> {
        let layout = lookup(&self.internal.bind_group_layouts, &descriptor.layout).ok_or(ResourceError::NotFound)?;

        let resolved = descriptor
            .entries
            .iter()
            .map(|entry| {
                let resource = match entry.resource {
                    BindingResource::Buffer(binding) => ResolvedBinding::Buffer(
                        self.get_wgpu_buffer(binding.buffer).ok_or(ResourceError::NotFound)?,
                        binding.offset,
                        binding.size,
                    ),
                    BindingResource::TextureView(view) => {
                        ResolvedBinding::View(self.get_wgpu_texture_view(view).ok_or(ResourceError::NotFound)?)
                    }
                    BindingResource::Sampler(sampler) => ResolvedBinding::Sampler(
                        lookup(&self.internal.samplers, &sampler).ok_or(ResourceError::NotFound)?,
                    ),
                };
                Ok((entry.binding, resource))
            })
            .collect::<Result<Vec<_>, ResourceError>>()?;

        let entries: Vec<wgpu::BindGroupEntry> = resolved
            .iter()
            .map(|(binding, resource)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: match resource {
                    ResolvedBinding::Buffer(buffer, offset, size) => {
                        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: buffer.as_ref(),
                            offset: *offset,
                            size: *size,
                        })
                    }
                    ResolvedBinding::View(view) => wgpu::BindingResource::TextureView(view.as_ref()),
                    ResolvedBinding::Sampler(sampler) => wgpu::BindingResource::Sampler(sampler.as_ref()),
                },
            })
            .collect();

        let bind_group = self.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: descriptor.label,
            layout: &layout,
            entries: &entries,
        });
        let id = BindGroupId(self.next_id());
        lock(&self.internal.bind_groups, "bind_groups")?.insert(id, Arc::new(bind_group));
        Ok(id)
    }

    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError> {
        remove(&self.internal.bind_groups, &id, "bind_groups")
    }

    // --- Pipelines ---

    fn create_pipeline_layout(&self, descriptor: &PipelineLayoutDescriptor) -> Result<PipelineLayoutId, ResourceError> {
        let layouts = self.resolve_layouts(descriptor.bind_group_layouts)?;
        let layout_refs: Vec<&wgpu::BindGroupLayout> = layouts.iter().map(|l| l.as_ref()).collect();
        let layout = self.device().create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: descriptor.label,
            bind_group_layouts: &layout_refs,
            immediate_size: 0,
        });
        let id = PipelineLayoutId(self.next_id());
        lock(&self.internal.pipeline_layouts, "pipeline_layouts")?.insert(id, Arc::new(layout));
        Ok(id)
    }

    fn destroy_pipeline_layout(&self, id: PipelineLayoutId) -> Result<(), ResourceError> {
        remove(&self.internal.pipeline_layouts, &id, "pipeline_layouts")
    }

    fn create_render_pipeline(&self, descriptor: &RenderPipelineDescriptor) -> Result<RenderPipelineId, ResourceError> {
        log::debug!(
            "WgpuDevice: Creating render pipeline with label: {:?}",
            descriptor.label
        );
        let module = self.resolve_shader(descriptor.shader_module)?;
        let layout = self.resolve_pipeline_layout(descriptor.layout)?;

        // 1. Vertex buffer layouts
        let attributes: Vec<Vec<wgpu::VertexAttribute>> = descriptor
            .vertex_buffers
            .iter()
            .map(|vb| {
                vb.attributes
                    .iter()
                    .map(|a| wgpu::VertexAttribute {
                        format: a.format.into_wgpu(),
                        offset: a.offset,
                        shader_location: a.shader_location,
                    })
                    .collect()
            })
            .collect();
        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = descriptor
            .vertex_buffers
            .iter()
            .zip(attributes.iter())
            .map(|(vb, attrs)| wgpu::VertexBufferLayout {
                array_stride: vb.array_stride,
                step_mode: vb.step_mode.into_wgpu(),
                attributes: attrs,
            })
            .collect();

        // 2. Fixed-function state
        let primitive = wgpu::PrimitiveState {
            topology: descriptor.primitive.topology.into_wgpu(),
            polygon_mode: descriptor.primitive.polygon_mode.into_wgpu(),
            cull_mode: descriptor.primitive.cull_mode.into_wgpu(),
            ..Default::default()
        };
        let depth_stencil = descriptor.depth_stencil.map(|ds| wgpu::DepthStencilState {
            format: ds.format.into_wgpu(),
            depth_write_enabled: ds.depth_write_enabled,
            depth_compare: ds.depth_compare.into_wgpu(),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });
        let targets: Vec<Option<wgpu::ColorTargetState>> = descriptor
            .color_target
            .iter()
            .map(|ct| {
                Some(wgpu::ColorTargetState {
                    format: ct.format.into_wgpu(),
                    blend: ct.blend.into_wgpu(),
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        // 3. The pipeline itself
        let fragment = descriptor.fragment_entry.as_deref().map(|entry| wgpu::FragmentState {
            module: &module,
            entry_point: Some(entry),
            targets: &targets,
            compilation_options: Default::default(),
        });
        let pipeline = self.device().create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: descriptor.label.as_deref(),
            layout: layout.as_deref(),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some(descriptor.vertex_entry.as_ref()),
                buffers: &vertex_buffers,
                compilation_options: Default::default(),
            },
            fragment,
            primitive,
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let id = RenderPipelineId(self.next_id());
        lock(&self.internal.render_pipelines, "render_pipelines")?.insert(id, Arc::new(pipeline));
        log::debug!(
            "WgpuDevice: Created render pipeline '{}' with ID: {id:?}",
            descriptor.label.as_deref().unwrap_or_default()
        );
        Ok(id)
    }

    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError> {
        remove(&self.internal.render_pipelines, &id, "render_pipelines")
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError> {
        let module = self.resolve_shader(descriptor.shader_module)?;
        let layout = self.resolve_pipeline_layout(descriptor.layout)?;
        let pipeline = self.device().create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: descriptor.label.as_deref(),
            layout: layout.as_deref(),
            module: &module,
            entry_point: Some(descriptor.entry_point.as_ref()),
            compilation_options: Default::default(),
            cache: None,
        });
        let id = ComputePipelineId(self.next_id());
        lock(&self.internal.compute_pipelines, "compute_pipelines")?.insert(id, Arc::new(pipeline));
        Ok(id)
    }

    fn destroy_compute_pipeline(&self, id: ComputePipelineId) -> Result<(), ResourceError> {
        remove(&self.internal.compute_pipelines, &id, "compute_pipelines")
    }

    // --- Buffer Operations ---

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let buffer = self.device().create_buffer(&wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size: descriptor.size,
            usage: descriptor.usage.into_wgpu(),
            mapped_at_creation: descriptor.mapped_at_creation,
        });
        let id = BufferId(self.next_id());
        lock(&self.internal.buffers, "buffers")?.insert(id, Arc::new(buffer));
        log::debug!(
            "WgpuDevice: Created buffer '{}' with ID: {id:?}, size: {} bytes",
            descriptor.label.as_deref().unwrap_or_default(),
            descriptor.size
        );
        Ok(id)
    }

    fn create_buffer_with_data(&self, descriptor: &BufferDescriptor, data: &[u8]) -> Result<BufferId, ResourceError> {
        if data.len() as u64 > descriptor.size {
            return Err(ResourceError::OutOfBounds);
        }
        let id = self.create_buffer(&BufferDescriptor {
            usage: descriptor.usage | BufferUsage::COPY_DST,
            mapped_at_creation: false,
            ..descriptor.clone()
        })?;
        self.write_buffer(id, 0, data)?;
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        remove(&self.internal.buffers, &id, "buffers")
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let buffer = self.get_wgpu_buffer(id).ok_or(ResourceError::NotFound)?;
        if offset + data.len() as u64 > buffer.size() {
            return Err(ResourceError::OutOfBounds);
        }
        self.queue().write_buffer(&buffer, offset, data);
        Ok(())
    }

    fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> Result<Vec<u8>, ResourceError> {
        let source = self.get_wgpu_buffer(id).ok_or(ResourceError::NotFound)?;
        if offset + size > source.size() {
            return Err(ResourceError::OutOfBounds);
        }
        let staging = self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Readback Encoder") });
        encoder.copy_buffer_to_buffer(&source, offset, &staging, 0, size);
        self.queue().submit(Some(encoder.finish()));

        let (tx, rx) = crossbeam_channel::bounded(1);
        staging.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.poll_device_blocking();
        rx.recv()
            .map_err(|_| ResourceError::BackendError("readback callback dropped".into()))?
            .map_err(|e| ResourceError::BackendError(format!("Buffer mapping failed: {e:?}")))?;

        let bytes = staging.slice(..).get_mapped_range().to_vec();
        staging.unmap();
        Ok(bytes)
    }

    // --- Textures ---

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let texture = self.device().create_texture(&wgpu::TextureDescriptor {
            label: descriptor.label.as_deref(),
            size: wgpu::Extent3d {
                width: descriptor.width.max(1),
                height: descriptor.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: descriptor.format.into_wgpu(),
            usage: descriptor.usage.into_wgpu(),
            view_formats: &[],
        });
        let id = TextureId(self.next_id());
        lock(&self.internal.textures, "textures")?.insert(
            id,
            WgpuTextureEntry {
                wgpu_texture: Arc::new(texture),
                format: descriptor.format,
            },
        );
        log::debug!(
            "WgpuDevice: Created texture '{}' {}x{} with ID: {id:?}",
            descriptor.label.as_deref().unwrap_or_default(),
            descriptor.width,
            descriptor.height
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        remove(&self.internal.textures, &id, "textures")
    }

    fn write_texture(&self, id: TextureId, data: &[u8], width: u32, height: u32) -> Result<(), ResourceError> {
        let (texture, format) = {
            let textures = lock(&self.internal.textures, "textures")?;
            let entry = textures.get(&id).ok_or(ResourceError::NotFound)?;
            (Arc::clone(&entry.wgpu_texture), entry.format)
        };
        let bytes_per_row = width * format.bytes_per_texel();
        if (bytes_per_row as u64) * (height as u64) > data.len() as u64 {
            return Err(ResourceError::OutOfBounds);
        }
        self.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn create_texture_view(
        &self,
        texture_id: TextureId,
        descriptor: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError> {
        let texture = {
            let textures = lock(&self.internal.textures, "textures")?;
            Arc::clone(&textures.get(&texture_id).ok_or(ResourceError::NotFound)?.wgpu_texture)
        };
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: descriptor.label.as_deref(),
            aspect: descriptor.aspect.into_wgpu(),
            ..Default::default()
        });
        let id = TextureViewId(self.next_id());
        lock(&self.internal.texture_views, "texture_views")?.insert(id, Arc::new(view));
        Ok(id)
    }

    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError> {
        remove(&self.internal.texture_views, &id, "texture_views")
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        let address_mode = descriptor.address_mode.into_wgpu();
        let filter = descriptor.filter.into_wgpu();
        let sampler = self.device().create_sampler(&wgpu::SamplerDescriptor {
            label: descriptor.label.as_deref(),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: filter,
            min_filter: filter,
            ..Default::default()
        });
        let id = SamplerId(self.next_id());
        lock(&self.internal.samplers, "samplers")?.insert(id, Arc::new(sampler));
        Ok(id)
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        remove(&self.internal.samplers, &id, "samplers")
    }

    // --- Commands ---

    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder> {
        let encoder = self
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label });
        Box::new(WgpuCommandEncoder::new(encoder, self.clone()))
    }

    fn submit_command_buffer(&self, command_buffer: CommandBufferId) {
        let buffer = self
            .internal
            .pending_command_buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&command_buffer);
        match buffer {
            Some(buffer) => {
                self.queue().submit(std::iter::once(buffer));
            }
            None => log::error!(
                "Attempted to submit a CommandBufferId ({command_buffer:?}) that does not exist."
            ),
        }
    }

    // --- Capabilities ---

    fn color_format(&self) -> TextureFormat {
        from_wgpu_texture_format(self.internal.context.color_format).unwrap_or(TextureFormat::Rgba8UnormSrgb)
    }

    fn get_adapter_info(&self) -> RendererAdapterInfo {
        let context = &self.internal.context;
        RendererAdapterInfo {
            name: context.adapter_name.clone(),
            backend: format!("{:?}", context.adapter_backend),
            device_type: match context.adapter_device_type {
                wgpu::DeviceType::IntegratedGpu => "integrated",
                wgpu::DeviceType::DiscreteGpu => "discrete",
                wgpu::DeviceType::VirtualGpu => "virtual",
                wgpu::DeviceType::Cpu => "cpu",
                _ => "unknown",
            }
            .to_string(),
        }
    }

    fn supports_feature(&self, feature_name: &str) -> bool {
        let features = self.internal.context.active_device_features;
        match feature_name {
            "polygon_mode_line" => features.contains(wgpu::Features::POLYGON_MODE_LINE),
            "gpu_timestamps" => features.contains(wgpu::Features::TIMESTAMP_QUERY),
            _ => {
                log::warn!("WgpuDevice: Unsupported feature_name query in supports_feature: {feature_name}");
                false
            }
        }
    }
}

impl WgpuDevice {
    /// Number of live resources across every table.
    pub fn live_resource_count(&self) -> usize {
        fn len<K, V>(table: &Mutex<HashMap<K, V>>) -> usize {
            table.lock().unwrap_or_else(PoisonError::into_inner).len()
        }
        let i = &self.internal;
        len(&i.shader_modules)
            + len(&i.bind_group_layouts)
            + len(&i.bind_groups)
            + len(&i.pipeline_layouts)
            + len(&i.render_pipelines)
            + len(&i.compute_pipelines)
            + len(&i.buffers)
            + len(&i.textures)
            + len(&i.texture_views)
            + len(&i.samplers)
    }
}
