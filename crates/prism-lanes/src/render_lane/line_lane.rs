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

//! Debug line pass: reference grid, axis lines and the frame's
//! [`PrimitiveBatch`].

use super::shaders::LINE_FILE;
use super::{require_buffer, FrameContext, RenderLane};
use crate::resources::{
    GpuResourceManager, OwnedBindGroup, OwnedBindGroupLayout, OwnedBuffer, OwnedPipelineLayout,
    OwnedRenderPipeline, CAMERA_CONSTANTS, SCENE_COLOR, SCENE_DEPTH,
};
use crate::shader_library::{ShaderLibrary, ShaderSnapshot, VariantDesc};
use prism_core::math::{LinearRgba, Vec3};
use prism_core::renderer::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor, BindGroupLayoutEntry,
    BlendMode, BufferDescriptor, BufferId, BufferUsage, ColorTargetState, CommandEncoder,
    DepthStencilState, GpuBox, GpuCone, GpuObb, GpuSphere, GraphicsDevice, GridConstants,
    Operations, PipelineLayoutDescriptor, PrimitiveCounts, PrimitiveState, PrimitiveTopology,
    RenderError, RenderPassColorAttachment, RenderPassDepthStencilAttachment,
    RenderPassDescriptor, RenderPipelineDescriptor, ResourceError, ShaderStageFlags,
    TextureFormat,
};
use prism_core::viewport::ShowFlags;
use std::borrow::Cow;
use std::mem::size_of;
use std::sync::Arc;

/// Places the grid on the Z=0 plane under the eye, snapped to whole cells so
/// lines do not swim as the camera moves.
pub fn grid_origin(eye: Vec3, spacing: f32) -> Vec3 {
    let spacing = spacing.max(f32::EPSILON);
    Vec3::new(
        (eye.x / spacing).round() * spacing,
        (eye.y / spacing).round() * spacing,
        0.0,
    )
}

/// A storage buffer that only ever grows.
#[derive(Debug)]
struct StorageArray {
    label: &'static str,
    buffer: OwnedBuffer,
    capacity: u64,
}

impl StorageArray {
    fn new(device: &Arc<dyn GraphicsDevice>, label: &'static str, capacity: u64) -> Result<Self, ResourceError> {
        let id = device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed(label)),
            size: capacity,
            usage: BufferUsage::STORAGE | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        })?;
        Ok(Self {
            label,
            buffer: OwnedBuffer::new(device.clone(), id),
            capacity,
        })
    }

    /// Writes `bytes`, reallocating to the next power of two when they do
    /// not fit. Returns whether the buffer was replaced.
    fn write(&mut self, device: &Arc<dyn GraphicsDevice>, bytes: &[u8]) -> Result<bool, ResourceError> {
        if bytes.is_empty() {
            return Ok(false);
        }
        let mut grew = false;
        if bytes.len() as u64 > self.capacity {
            let capacity = (bytes.len() as u64).next_power_of_two();
            log::debug!("LineLane: growing {} to {capacity} bytes", self.label);
            *self = Self::new(device, self.label, capacity)?;
            grew = true;
        }
        device.write_buffer(self.buffer.id(), 0, bytes)?;
        Ok(grew)
    }
}

#[derive(Debug)]
struct GpuState {
    device: Arc<dyn GraphicsDevice>,
    layout: OwnedBindGroupLayout,
    pipeline_layout: OwnedPipelineLayout,
    grid: OwnedBuffer,
    counts: OwnedBuffer,
    boxes: StorageArray,
    obbs: StorageArray,
    cones: StorageArray,
    spheres: StorageArray,
    variant: u64,
    color_format: TextureFormat,
    bind_group: Option<OwnedBindGroup>,
    // Camera buffer revision and storage buffers the group was built over.
    bound: Option<(Option<u64>, [BufferId; 4])>,
}

impl GpuState {
    fn storage_ids(&self) -> [BufferId; 4] {
        [self.boxes.buffer.id(), self.obbs.buffer.id(), self.cones.buffer.id(), self.spheres.buffer.id()]
    }

    fn bind_group(&mut self, resources: &GpuResourceManager) -> Result<&OwnedBindGroup, RenderError> {
        let key = (resources.revision(CAMERA_CONSTANTS), self.storage_ids());
        if self.bind_group.is_none() || self.bound != Some(key) {
            self.bind_group = None;
            let camera = require_buffer(resources, CAMERA_CONSTANTS)?;
            let [boxes, obbs, cones, spheres] = key.1;
            let id = self.device.create_bind_group(&BindGroupDescriptor {
                label: Some("Line Bind Group"),
                layout: self.layout.id(),
                entries: &[
                    BindGroupEntry::buffer(0, camera, None),
                    BindGroupEntry::buffer(1, self.grid.id(), None),
                    BindGroupEntry::buffer(2, self.counts.id(), None),
                    BindGroupEntry::buffer(3, boxes, None),
                    BindGroupEntry::buffer(4, obbs, None),
                    BindGroupEntry::buffer(5, cones, None),
                    BindGroupEntry::buffer(6, spheres, None),
                ],
            })?;
            self.bind_group = Some(OwnedBindGroup::new(self.device.clone(), id));
            self.bound = Some(key);
        }
        self.bind_group.as_ref().ok_or(RenderError::NotInitialized)
    }
}

fn uniform(device: &Arc<dyn GraphicsDevice>, label: &'static str, size: usize) -> Result<OwnedBuffer, ResourceError> {
    let id = device.create_buffer(&BufferDescriptor {
        label: Some(Cow::Borrowed(label)),
        size: size as u64,
        usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        mapped_at_creation: false,
    })?;
    Ok(OwnedBuffer::new(device.clone(), id))
}

/// Rasterizes the debug primitives collected by earlier lanes plus the grid
/// and axis lines in one instanced draw.
#[derive(Debug, Default)]
pub struct LineLane {
    gpu: Option<GpuState>,
    pipeline: Option<OwnedRenderPipeline>,
    last_instance_count: u32,
}

impl LineLane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Segments drawn by the last [`RenderLane::render`].
    pub fn last_instance_count(&self) -> u32 {
        self.last_instance_count
    }

    fn build_pipeline(gpu: &GpuState, snapshot: &ShaderSnapshot) -> Result<OwnedRenderPipeline, RenderError> {
        let id = gpu.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(Cow::Borrowed("Line Pipeline")),
            layout: Some(gpu.pipeline_layout.id()),
            shader_module: *snapshot.module(gpu.variant)?,
            vertex_entry: Cow::Borrowed("vs_main"),
            fragment_entry: Some(Cow::Borrowed("fs_main")),
            vertex_buffers: Cow::Borrowed(&[]),
            color_target: Some(ColorTargetState {
                format: gpu.color_format,
                blend: BlendMode::AlphaBlend,
            }),
            primitive: PrimitiveState {
                topology: PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: Some(DepthStencilState::opaque(TextureFormat::Depth32Float)),
        })?;
        Ok(OwnedRenderPipeline::new(gpu.device.clone(), id))
    }

    fn create_gpu_state(resources: &GpuResourceManager, shaders: &ShaderLibrary) -> Result<GpuState, RenderError> {
        let device = resources.device().clone();
        let v = ShaderStageFlags::VERTEX;
        let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Line Layout"),
            entries: &[
                BindGroupLayoutEntry::uniform(0, v),
                BindGroupLayoutEntry::uniform(1, v),
                BindGroupLayoutEntry::uniform(2, v),
                BindGroupLayoutEntry::storage(3, v, true),
                BindGroupLayoutEntry::storage(4, v, true),
                BindGroupLayoutEntry::storage(5, v, true),
                BindGroupLayoutEntry::storage(6, v, true),
            ],
        })?;
        let layout = OwnedBindGroupLayout::new(device.clone(), layout);
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Line Pipeline Layout"),
            bind_group_layouts: &[layout.id()],
        })?;
        let pipeline_layout = OwnedPipelineLayout::new(device.clone(), pipeline_layout);
        let variant = shaders.register_variant(&VariantDesc::new(LINE_FILE, "fs_main"))?;

        // Storage bindings may not be empty, so every array starts with room
        // for a few elements.
        Ok(GpuState {
            grid: uniform(&device, "Line Grid", size_of::<GridConstants>())?,
            counts: uniform(&device, "Line Counts", size_of::<PrimitiveCounts>())?,
            boxes: StorageArray::new(&device, "Line Boxes", 64 * size_of::<GpuBox>() as u64)?,
            obbs: StorageArray::new(&device, "Line Oriented Boxes", 16 * size_of::<GpuObb>() as u64)?,
            cones: StorageArray::new(&device, "Line Cones", 16 * size_of::<GpuCone>() as u64)?,
            spheres: StorageArray::new(&device, "Line Spheres", 16 * size_of::<GpuSphere>() as u64)?,
            color_format: resources
                .target_format(SCENE_COLOR)
                .unwrap_or_else(|| device.color_format()),
            bind_group: None,
            bound: None,
            pipeline_layout,
            layout,
            variant,
            device,
        })
    }
}

impl RenderLane for LineLane {
    fn name(&self) -> &'static str {
        "LineLane"
    }

    fn on_gpu_init(&mut self, resources: &mut GpuResourceManager, shaders: &ShaderLibrary) -> Result<(), RenderError> {
        let gpu = Self::create_gpu_state(resources, shaders)?;
        self.pipeline = Some(Self::build_pipeline(&gpu, &shaders.snapshot())?);
        self.gpu = Some(gpu);
        log::info!("LineLane: initialized");
        Ok(())
    }

    fn on_shaders_changed(&mut self, shaders: &ShaderSnapshot) {
        let Some(gpu) = &self.gpu else {
            return;
        };
        match Self::build_pipeline(gpu, shaders) {
            Ok(pipeline) => self.pipeline = Some(pipeline),
            Err(e) => log::error!("LineLane: keeping previous pipeline: {e}"),
        }
    }

    fn prepare(&mut self, ctx: &mut FrameContext<'_>) -> Result<(), RenderError> {
        if ctx.viewport.shows(ShowFlags::GRID) && ctx.primitives.grid().is_none() {
            let spacing = ctx.viewport.grid_size;
            ctx.primitives.set_grid(
                grid_origin(ctx.view.eye, spacing),
                spacing,
                ctx.settings.grid_line_count,
                ctx.settings.grid_color,
            );
        }
        Ok(())
    }

    fn render(&mut self, ctx: &mut FrameContext<'_>, encoder: &mut dyn CommandEncoder) -> Result<(), RenderError> {
        let (Some(gpu), Some(pipeline)) = (self.gpu.as_mut(), &self.pipeline) else {
            return Err(RenderError::NotInitialized);
        };
        let batch = &*ctx.primitives;
        let device = gpu.device.clone();

        let grid = batch.grid().copied().unwrap_or(GridConstants {
            origin: Vec3::ZERO,
            spacing: 1.0,
            color: LinearRgba::TRANSPARENT,
            line_count: 0,
            _pad: [0; 3],
        });
        device.write_buffer(gpu.grid.id(), 0, bytemuck::bytes_of(&grid))?;
        device.write_buffer(gpu.counts.id(), 0, bytemuck::bytes_of(&batch.counts()))?;
        gpu.boxes.write(&device, bytemuck::cast_slice(batch.boxes()))?;
        gpu.obbs.write(&device, bytemuck::cast_slice(batch.obbs()))?;
        gpu.cones.write(&device, bytemuck::cast_slice(batch.cones()))?;
        gpu.spheres.write(&device, bytemuck::cast_slice(batch.spheres()))?;
        let instances = batch.instance_count();

        let resources = ctx.resources;
        let bind_group = gpu.bind_group(resources)?;
        let (Some(color), Some(depth)) = (resources.target_view(SCENE_COLOR), resources.target_view(SCENE_DEPTH)) else {
            return Err(RenderError::RenderingFailed("scene targets are missing".into()));
        };
        let color_attachments = [RenderPassColorAttachment {
            view: color,
            ops: Operations::load(),
        }];
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Line Pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: depth,
                    depth_ops: Some(Operations::load()),
                }),
            });
            pass.set_viewport(&ctx.viewport.rect.to_gpu_viewport());
            pass.set_pipeline(pipeline.id_ref());
            pass.set_bind_group(0, bind_group.id_ref(), &[]);
            pass.draw(0..2, 0..instances);
        }

        self.last_instance_count = instances;
        ctx.stats.draw_calls += 1;
        ctx.stats.line_segments += instances;
        ctx.primitives.clear();
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.pipeline.is_some()
    }

    fn on_gpu_shutdown(&mut self) {
        self.pipeline = None;
        self.gpu = None;
        self.last_instance_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::AXIS_LINES;
    use crate::test_support::{shader_library, shared_resources, Command, MockDevice, MockEncoder, TestFrame};
    use prism_core::math::Aabb;
    use prism_core::scene::Scene;

    fn setup() -> (Arc<MockDevice>, GpuResourceManager, LineLane) {
        let device = Arc::new(MockDevice::default());
        let mut resources = shared_resources(&device, 64, 64);
        let mut lane = LineLane::new();
        lane.on_gpu_init(&mut resources, &shader_library(&device)).unwrap();
        (device, resources, lane)
    }

    #[test]
    fn test_grid_origin_snaps_to_cells() {
        let origin = grid_origin(Vec3::new(14.0, -26.0, 40.0), 10.0);
        assert_eq!(origin, Vec3::new(10.0, -30.0, 0.0));
    }

    #[test]
    fn test_draws_batch_and_clears_it() {
        let (device, resources, mut lane) = setup();
        let scene = Scene::new();
        let mut frame = TestFrame::new(64, 64);
        frame.settings.grid_line_count = 10;
        // More boxes than the initial allocation holds.
        for i in 0..100 {
            let min = Vec3::splat(i as f32);
            frame.primitives.add_aabb(&Aabb::from_min_max(min, min + Vec3::ONE), LinearRgba::RED);
        }

        let mut encoder = MockEncoder::new(&device);
        device.take_commands();
        {
            let mut ctx = frame.ctx(&resources, &scene);
            lane.prepare(&mut ctx).unwrap();
            lane.render(&mut ctx, &mut encoder).unwrap();
        }
        let expected = 20 + AXIS_LINES + 100 * 12;
        assert_eq!(lane.last_instance_count(), expected);
        assert!(frame.primitives.is_empty());
        assert_eq!(frame.stats.line_segments, expected);
        assert!(device.take_commands().contains(&Command::Draw {
            vertices: 0..2,
            instances: 0..expected
        }));
    }

    #[test]
    fn test_grid_flag_off_draws_only_axes() {
        let (device, resources, mut lane) = setup();
        let scene = Scene::new();
        let mut frame = TestFrame::new(64, 64);
        frame.viewport.show_flags.remove(ShowFlags::GRID);
        let mut encoder = MockEncoder::new(&device);
        let mut ctx = frame.ctx(&resources, &scene);
        lane.prepare(&mut ctx).unwrap();
        lane.render(&mut ctx, &mut encoder).unwrap();
        assert_eq!(lane.last_instance_count(), AXIS_LINES);
    }
}
