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

//! An in-memory device and frame helpers for tests.

use crate::render_lane::{FrameContext, PrimitiveBatch};
use crate::resources::{GpuResourceManager, CAMERA_CONSTANTS, SCENE_COLOR, SCENE_DEPTH, SCREEN_CONSTANTS};
use crate::shader_library::{DeviceShaderCompiler, ShaderLibrary};
use prism_core::config::RendererSettings;
use prism_core::renderer::*;
use prism_core::scene::SceneSource;
use prism_core::viewport::{ViewState, Viewport as ViewportDesc, ViewportGroup, ViewportRect};
use prism_telemetry::FrameStats;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What a [`MockEncoder`] recorded.
#[derive(Debug, Default, Clone, PartialEq)]
pub enum Command {
    #[default]
    None,
    BeginRender(String),
    BeginCompute(String),
    Dispatch(u32, u32, u32),
    Draw { vertices: Range<u32>, instances: Range<u32> },
    DrawIndexed { indices: Range<u32> },
    ClearBuffer(BufferId),
    SetViewport(Viewport),
}

#[derive(Debug, Default)]
struct State {
    buffers: HashMap<usize, Vec<u8>>,
    textures: HashSet<usize>,
    views: HashSet<usize>,
    bind_groups: HashSet<usize>,
    pipelines: HashSet<usize>,
    compute_pipelines: HashSet<usize>,
    shaders: HashSet<usize>,
}

#[derive(Debug, Default)]
pub struct MockDevice {
    next_id: AtomicUsize,
    state: Mutex<State>,
    pub commands: Arc<Mutex<Vec<Command>>>,
    pub fail_pipelines: std::sync::atomic::AtomicBool,
}

impl MockDevice {
    fn id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn live_buffer_count(&self) -> usize {
        self.state.lock().unwrap().buffers.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.state.lock().unwrap().textures.len()
    }

    pub fn live_view_count(&self) -> usize {
        self.state.lock().unwrap().views.len()
    }

    pub fn live_bind_group_count(&self) -> usize {
        self.state.lock().unwrap().bind_groups.len()
    }

    pub fn buffer_contents(&self, id: BufferId) -> Option<Vec<u8>> {
        self.state.lock().unwrap().buffers.get(&id.0).cloned()
    }

    pub fn take_commands(&self) -> Vec<Command> {
        std::mem::take(&mut *self.commands.lock().unwrap())
    }
}

pub struct MockEncoder {
    commands: Arc<Mutex<Vec<Command>>>,
}

impl MockEncoder {
    pub fn new(device: &MockDevice) -> Self {
        Self {
            commands: device.commands.clone(),
        }
    }
}

struct MockPass {
    commands: Arc<Mutex<Vec<Command>>>,
}

impl MockPass {
    fn push(&self, command: Command) {
        self.commands.lock().unwrap().push(command);
    }
}

impl<'pass> RenderPass<'pass> for MockPass {
    fn set_pipeline(&mut self, _pipeline: &'pass RenderPipelineId) {}
    fn set_bind_group(&mut self, _index: u32, _bind_group: &'pass BindGroupId, _offsets: &[u32]) {}
    fn set_vertex_buffer(&mut self, _slot: u32, _buffer: &'pass BufferId, _offset: u64) {}
    fn set_index_buffer(&mut self, _buffer: &'pass BufferId, _offset: u64, _format: IndexFormat) {}
    fn set_viewport(&mut self, viewport: &Viewport) {
        self.push(Command::SetViewport(*viewport));
    }
    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.push(Command::Draw { vertices, instances });
    }
    fn draw_indexed(&mut self, indices: Range<u32>, _base_vertex: i32, _instances: Range<u32>) {
        self.push(Command::DrawIndexed { indices });
    }
}

impl<'pass> ComputePass<'pass> for MockPass {
    fn set_pipeline(&mut self, _pipeline: &'pass ComputePipelineId) {}
    fn set_bind_group(&mut self, _index: u32, _bind_group: &'pass BindGroupId, _offsets: &[u32]) {}
    fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32) {
        self.push(Command::Dispatch(x, y, z));
    }
}

impl CommandEncoder for MockEncoder {
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'encoder>,
    ) -> Box<dyn RenderPass<'encoder> + 'encoder> {
        let label = descriptor.label.unwrap_or_default().to_string();
        self.commands.lock().unwrap().push(Command::BeginRender(label));
        Box::new(MockPass {
            commands: self.commands.clone(),
        })
    }

    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        descriptor: &ComputePassDescriptor<'encoder>,
    ) -> Box<dyn ComputePass<'encoder> + 'encoder> {
        let label = descriptor.label.unwrap_or_default().to_string();
        self.commands.lock().unwrap().push(Command::BeginCompute(label));
        Box::new(MockPass {
            commands: self.commands.clone(),
        })
    }

    fn clear_buffer(&mut self, buffer: &BufferId, _offset: u64, _size: Option<u64>) {
        self.commands.lock().unwrap().push(Command::ClearBuffer(*buffer));
    }

    fn copy_buffer_to_buffer(&mut self, _: &BufferId, _: u64, _: &BufferId, _: u64, _: u64) {}

    fn finish(self: Box<Self>) -> CommandBufferId {
        CommandBufferId(0)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl GraphicsDevice for MockDevice {
    fn create_shader_module(&self, _d: &ShaderModuleDescriptor) -> Result<ShaderModuleId, ResourceError> {
        let id = self.id();
        self.state.lock().unwrap().shaders.insert(id);
        Ok(ShaderModuleId(id))
    }

    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError> {
        self.state.lock().unwrap().shaders.remove(&id.0);
        Ok(())
    }

    fn create_bind_group_layout(&self, _d: &BindGroupLayoutDescriptor) -> Result<BindGroupLayoutId, ResourceError> {
        Ok(BindGroupLayoutId(self.id()))
    }

    fn destroy_bind_group_layout(&self, _id: BindGroupLayoutId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_bind_group(&self, _d: &BindGroupDescriptor) -> Result<BindGroupId, ResourceError> {
        let id = self.id();
        self.state.lock().unwrap().bind_groups.insert(id);
        Ok(BindGroupId(id))
    }

    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError> {
        self.state.lock().unwrap().bind_groups.remove(&id.0);
        Ok(())
    }

    fn create_pipeline_layout(&self, _d: &PipelineLayoutDescriptor) -> Result<PipelineLayoutId, ResourceError> {
        Ok(PipelineLayoutId(self.id()))
    }

    fn destroy_pipeline_layout(&self, _id: PipelineLayoutId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_render_pipeline(&self, d: &RenderPipelineDescriptor) -> Result<RenderPipelineId, ResourceError> {
        if self.fail_pipelines.load(Ordering::Relaxed) {
            return Err(ResourceError::BackendError(format!("{:?} rejected", d.label)));
        }
        let id = self.id();
        self.state.lock().unwrap().pipelines.insert(id);
        Ok(RenderPipelineId(id))
    }

    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError> {
        self.state.lock().unwrap().pipelines.remove(&id.0);
        Ok(())
    }

    fn create_compute_pipeline(&self, _d: &ComputePipelineDescriptor) -> Result<ComputePipelineId, ResourceError> {
        let id = self.id();
        self.state.lock().unwrap().compute_pipelines.insert(id);
        Ok(ComputePipelineId(id))
    }

    fn destroy_compute_pipeline(&self, id: ComputePipelineId) -> Result<(), ResourceError> {
        self.state.lock().unwrap().compute_pipelines.remove(&id.0);
        Ok(())
    }

    fn create_buffer(&self, d: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let id = self.id();
        self.state.lock().unwrap().buffers.insert(id, vec![0; d.size as usize]);
        Ok(BufferId(id))
    }

    fn create_buffer_with_data(&self, _d: &BufferDescriptor, data: &[u8]) -> Result<BufferId, ResourceError> {
        let id = self.id();
        self.state.lock().unwrap().buffers.insert(id, data.to_vec());
        Ok(BufferId(id))
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        match self.state.lock().unwrap().buffers.remove(&id.0) {
            Some(_) => Ok(()),
            None => Err(ResourceError::NotFound),
        }
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut state = self.state.lock().unwrap();
        let buffer = state.buffers.get_mut(&id.0).ok_or(ResourceError::NotFound)?;
        let end = offset as usize + data.len();
        if end > buffer.len() {
            return Err(ResourceError::OutOfBounds);
        }
        buffer[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> Result<Vec<u8>, ResourceError> {
        let state = self.state.lock().unwrap();
        let buffer = state.buffers.get(&id.0).ok_or(ResourceError::NotFound)?;
        buffer
            .get(offset as usize..(offset + size) as usize)
            .map(<[u8]>::to_vec)
            .ok_or(ResourceError::OutOfBounds)
    }

    fn create_texture(&self, _d: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let id = self.id();
        self.state.lock().unwrap().textures.insert(id);
        Ok(TextureId(id))
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        self.state.lock().unwrap().textures.remove(&id.0);
        Ok(())
    }

    fn write_texture(&self, _id: TextureId, _data: &[u8], _w: u32, _h: u32) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_texture_view(&self, _t: TextureId, _d: &TextureViewDescriptor) -> Result<TextureViewId, ResourceError> {
        let id = self.id();
        self.state.lock().unwrap().views.insert(id);
        Ok(TextureViewId(id))
    }

    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError> {
        self.state.lock().unwrap().views.remove(&id.0);
        Ok(())
    }

    fn create_sampler(&self, _d: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        Ok(SamplerId(self.id()))
    }

    fn destroy_sampler(&self, _id: SamplerId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_command_encoder(&self, _label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(MockEncoder::new(self))
    }

    fn submit_command_buffer(&self, _command_buffer: CommandBufferId) {}

    fn color_format(&self) -> TextureFormat {
        TextureFormat::Rgba8Unorm
    }

    fn get_adapter_info(&self) -> RendererAdapterInfo {
        RendererAdapterInfo::default()
    }

    fn supports_feature(&self, _feature_name: &str) -> bool {
        false
    }
}

/// Everything but the resources and scene a lane needs to run one viewport.
pub struct TestFrame {
    pub viewport: ViewportDesc,
    pub view: ViewState,
    pub settings: RendererSettings,
    pub primitives: PrimitiveBatch,
    pub stats: FrameStats,
    pub target_size: (u32, u32),
}

impl TestFrame {
    /// A full-target viewport with the default camera, ticked once.
    pub fn new(width: u32, height: u32) -> Self {
        let mut viewport = ViewportDesc::new(0, ViewportRect::new(0.0, 0.0, width as f32, height as f32));
        let view = viewport.camera.tick(&ViewportGroup::default());
        Self {
            viewport,
            view,
            settings: RendererSettings::default(),
            primitives: PrimitiveBatch::new(),
            stats: FrameStats::default(),
            target_size: (width, height),
        }
    }

    pub fn ctx<'a>(&'a mut self, resources: &'a GpuResourceManager, scene: &'a dyn SceneSource) -> FrameContext<'a> {
        FrameContext {
            resources,
            scene,
            viewport: &self.viewport,
            view: &self.view,
            settings: &self.settings,
            primitives: &mut self.primitives,
            stats: &mut self.stats,
            target_size: self.target_size,
        }
    }
}

/// A library with the built-in sources, compiling through `device`.
pub fn shader_library(device: &Arc<MockDevice>) -> ShaderLibrary {
    let device: Arc<dyn GraphicsDevice> = device.clone();
    ShaderLibrary::with_builtin_sources(Arc::new(DeviceShaderCompiler::new(device)))
}

/// A manager holding the shared targets and per-viewport constant buffers.
pub fn shared_resources(device: &Arc<MockDevice>, width: u32, height: u32) -> GpuResourceManager {
    let mut resources = GpuResourceManager::new(device.clone());
    resources
        .create_render_target(SCENE_COLOR, width, height, TextureFormat::Rgba8Unorm)
        .unwrap();
    resources
        .create_render_target(SCENE_DEPTH, width, height, TextureFormat::Depth32Float)
        .unwrap();
    resources.create_constant_buffer::<CameraConstants>(CAMERA_CONSTANTS).unwrap();
    resources.create_constant_buffer::<ScreenConstants>(SCREEN_CONSTANTS).unwrap();
    resources
}

/// A two-triangle unit quad on the XY plane, facing +Z.
pub fn quad_mesh() -> prism_core::scene::MeshData {
    use prism_core::math::{Vec2, Vec3};
    use prism_core::scene::{MeshData, StaticVertex};
    let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
    MeshData {
        vertices: corners
            .iter()
            .map(|&(x, y)| StaticVertex::new(Vec3::new(x, y, 0.0), Vec3::Z, Vec2::new((x + 1.0) * 0.5, (y + 1.0) * 0.5)))
            .collect(),
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}
