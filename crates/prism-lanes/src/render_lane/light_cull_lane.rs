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

//! Tiled light culling.
//!
//! Splits the viewport into square tiles and, on the GPU, keeps for each
//! tile the indices of the lights whose influence sphere overlaps it. The
//! lit mesh shaders then only loop over their tile's list.
//!
//! # Buffers
//!
//! Two shared storage buffers, sized for the full render target:
//!
//! - `TileLightIndices`: `tiles * max_lights_per_tile` light indices, one
//!   fixed-size slice per tile.
//! - `TileLightCounts`: one count per tile, never above
//!   `max_lights_per_tile`.
//!
//! Both are cleared before every dispatch so a tile never reads indices
//! left over from another viewport or a previous frame.

use super::{require_buffer, require_sample_view, FrameContext, RenderLane, SharedBindGroup};
use crate::resources::{
    GpuResourceManager, OwnedBindGroupLayout, OwnedComputePipeline, OwnedPipelineLayout,
    CAMERA_CONSTANTS, CULL_PARAMS, LIGHT_BUFFER, LIGHT_HEADER, SCENE_DEPTH, SCREEN_CONSTANTS,
    TILE_LIGHT_COUNTS, TILE_LIGHT_INDICES,
};
use crate::shader_library::{ShaderLibrary, ShaderSnapshot, VariantDesc};
use prism_core::renderer::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor, BindGroupLayoutEntry,
    CommandEncoder, ComputePassDescriptor, ComputePipelineDescriptor, GraphicsDevice,
    LightCullConfig, LightCullParams, PipelineLayoutDescriptor, RenderError, ShaderStageFlags,
    TextureSampleType, TileGrid,
};
use std::borrow::Cow;
use std::sync::Arc;

use super::shaders::LIGHT_CULL_FILE;

const ENTRY_POINT: &str = "cs_main";

/// The shared resources bound by the culling pass, in binding order.
const BOUND_RESOURCES: [&str; 8] = [
    CAMERA_CONSTANTS,
    SCREEN_CONSTANTS,
    CULL_PARAMS,
    LIGHT_HEADER,
    LIGHT_BUFFER,
    SCENE_DEPTH,
    TILE_LIGHT_INDICES,
    TILE_LIGHT_COUNTS,
];

/// Compute lane filling the per-tile light lists.
#[derive(Debug)]
pub struct LightCullLane {
    config: LightCullConfig,
    // Grid the tile buffers are currently sized for.
    buffer_grid: Option<TileGrid>,
    variant: Option<u64>,
    layout: Option<OwnedBindGroupLayout>,
    pipeline_layout: Option<OwnedPipelineLayout>,
    pipeline: Option<OwnedComputePipeline>,
    bind_group: SharedBindGroup,
    last_dispatch: Option<(u32, u32, u32)>,
    device: Option<Arc<dyn GraphicsDevice>>,
}

impl LightCullLane {
    pub fn new(config: LightCullConfig) -> Self {
        Self {
            config,
            buffer_grid: None,
            variant: None,
            layout: None,
            pipeline_layout: None,
            pipeline: None,
            bind_group: SharedBindGroup::default(),
            last_dispatch: None,
            device: None,
        }
    }

    pub fn config(&self) -> &LightCullConfig {
        &self.config
    }

    /// Workgroup counts of the most recent dispatch.
    pub fn last_dispatch(&self) -> Option<(u32, u32, u32)> {
        self.last_dispatch
    }

    /// The grid the tile buffers were last sized for.
    pub fn buffer_grid(&self) -> Option<TileGrid> {
        self.buffer_grid
    }

    fn create_layout(device: &Arc<dyn GraphicsDevice>) -> Result<OwnedBindGroupLayout, RenderError> {
        let c = ShaderStageFlags::COMPUTE;
        let id = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Light Cull Layout"),
            entries: &[
                BindGroupLayoutEntry::uniform(0, c),
                BindGroupLayoutEntry::uniform(1, c),
                BindGroupLayoutEntry::uniform(2, c),
                BindGroupLayoutEntry::uniform(3, c),
                BindGroupLayoutEntry::storage(4, c, true),
                BindGroupLayoutEntry::texture(5, c, TextureSampleType::Depth),
                BindGroupLayoutEntry::storage(6, c, false),
                BindGroupLayoutEntry::storage(7, c, false),
            ],
        })?;
        Ok(OwnedBindGroupLayout::new(device.clone(), id))
    }

    fn build_pipeline(&self, snapshot: &ShaderSnapshot) -> Result<OwnedComputePipeline, RenderError> {
        let (Some(device), Some(layout), Some(variant)) =
            (&self.device, &self.pipeline_layout, self.variant)
        else {
            return Err(RenderError::NotInitialized);
        };
        let id = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some(Cow::Borrowed("Light Cull Pipeline")),
            layout: Some(layout.id()),
            shader_module: *snapshot.module(variant)?,
            entry_point: Cow::Borrowed(ENTRY_POINT),
        })?;
        Ok(OwnedComputePipeline::new(device.clone(), id))
    }

    /// (Re)creates the tile buffers for a `width x height` target.
    fn resize_tile_buffers(
        &mut self,
        resources: &mut GpuResourceManager,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        let grid = self.config.tile_grid(width, height);
        if self.buffer_grid == Some(grid) {
            return Ok(());
        }
        // The manager releases the previous buffers before allocating.
        resources.create_structured_buffer(
            TILE_LIGHT_INDICES,
            self.config.light_index_buffer_size(width, height),
        )?;
        resources.create_structured_buffer(
            TILE_LIGHT_COUNTS,
            self.config.light_count_buffer_size(width, height),
        )?;
        self.buffer_grid = Some(grid);
        log::debug!(
            "LightCullLane: tile buffers sized for {}x{} tiles",
            grid.tiles_x,
            grid.tiles_y
        );
        Ok(())
    }
}

impl Default for LightCullLane {
    fn default() -> Self {
        Self::new(LightCullConfig::default())
    }
}

impl RenderLane for LightCullLane {
    fn name(&self) -> &'static str {
        "LightCullLane"
    }

    fn on_gpu_init(
        &mut self,
        resources: &mut GpuResourceManager,
        shaders: &ShaderLibrary,
    ) -> Result<(), RenderError> {
        let device = resources.device().clone();
        resources.create_constant_buffer::<LightCullParams>(CULL_PARAMS)?;

        let layout = Self::create_layout(&device)?;
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Light Cull Pipeline Layout"),
            bind_group_layouts: &[layout.id()],
        })?;
        self.pipeline_layout = Some(OwnedPipelineLayout::new(device.clone(), pipeline_layout));
        self.layout = Some(layout);
        self.device = Some(device);

        self.variant = Some(shaders.register_variant(&VariantDesc::new(LIGHT_CULL_FILE, ENTRY_POINT))?);
        self.pipeline = Some(self.build_pipeline(&shaders.snapshot())?);

        if let Some((width, height)) = resources.target_size(SCENE_DEPTH) {
            self.resize_tile_buffers(resources, width, height)?;
        }
        log::info!("LightCullLane: initialized");
        Ok(())
    }

    fn on_resize(
        &mut self,
        resources: &mut GpuResourceManager,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        self.resize_tile_buffers(resources, width, height)
    }

    fn on_shaders_changed(&mut self, shaders: &ShaderSnapshot) {
        match self.build_pipeline(shaders) {
            Ok(pipeline) => self.pipeline = Some(pipeline),
            Err(e) => log::error!("LightCullLane: keeping previous pipeline: {e}"),
        }
    }

    fn prepare(&mut self, ctx: &mut FrameContext<'_>) -> Result<(), RenderError> {
        let (width, height) = ctx.viewport_pixels();
        let params = LightCullParams::new(&self.config, width, height);
        ctx.resources.update_constant(CULL_PARAMS, &params)?;
        Ok(())
    }

    fn render(
        &mut self,
        ctx: &mut FrameContext<'_>,
        encoder: &mut dyn CommandEncoder,
    ) -> Result<(), RenderError> {
        let (Some(pipeline), Some(layout)) = (&self.pipeline, &self.layout) else {
            return Err(RenderError::NotInitialized);
        };
        let (width, height) = ctx.viewport_pixels();
        if width == 0 || height == 0 {
            return Ok(());
        }
        let grid = self.config.tile_grid(width, height);
        let resources = ctx.resources;

        let indices = require_buffer(resources, TILE_LIGHT_INDICES)?;
        let counts = require_buffer(resources, TILE_LIGHT_COUNTS)?;
        encoder.clear_buffer(&indices, 0, None);
        encoder.clear_buffer(&counts, 0, None);

        let device = resources.device();
        let layout_id = layout.id();
        let bind_group = self.bind_group.get_or_create(resources, &BOUND_RESOURCES, || {
            device.create_bind_group(&BindGroupDescriptor {
                label: Some("Light Cull Bind Group"),
                layout: layout_id,
                entries: &[
                    BindGroupEntry::buffer(0, require_buffer(resources, CAMERA_CONSTANTS)?, None),
                    BindGroupEntry::buffer(1, require_buffer(resources, SCREEN_CONSTANTS)?, None),
                    BindGroupEntry::buffer(2, require_buffer(resources, CULL_PARAMS)?, None),
                    BindGroupEntry::buffer(3, require_buffer(resources, LIGHT_HEADER)?, None),
                    BindGroupEntry::buffer(4, require_buffer(resources, LIGHT_BUFFER)?, None),
                    BindGroupEntry::texture_view(5, require_sample_view(resources, SCENE_DEPTH)?),
                    BindGroupEntry::buffer(6, indices, None),
                    BindGroupEntry::buffer(7, counts, None),
                ],
            })
            .map_err(RenderError::from)
        })?;

        let (x, y, z) = grid.dispatch_size();
        {
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("Light Cull Pass"),
            });
            pass.set_pipeline(pipeline.id_ref());
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(x, y, z);
        }

        self.last_dispatch = Some((x, y, z));
        ctx.stats.dispatches += 1;
        ctx.stats.tiles += grid.total();
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.pipeline.is_some()
    }

    fn on_gpu_shutdown(&mut self) {
        self.bind_group.reset();
        self.pipeline = None;
        self.pipeline_layout = None;
        self.layout = None;
        self.buffer_grid = None;
        self.device = None;
        log::info!("LightCullLane: shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::LightBufferLane;
    use crate::test_support::{shader_library, shared_resources, Command, MockDevice, MockEncoder, TestFrame};
    use prism_core::scene::Scene;

    fn setup(width: u32, height: u32) -> (Arc<MockDevice>, GpuResourceManager, LightCullLane) {
        let device = Arc::new(MockDevice::default());
        let mut resources = shared_resources(&device, width, height);
        let shaders = shader_library(&device);
        LightBufferLane::new(16)
            .on_gpu_init(&mut resources, &shaders)
            .unwrap();
        let mut lane = LightCullLane::default();
        lane.on_gpu_init(&mut resources, &shaders).unwrap();
        (device, resources, lane)
    }

    fn run(lane: &mut LightCullLane, device: &MockDevice, resources: &GpuResourceManager, frame: &mut TestFrame) {
        let scene = Scene::new();
        let mut encoder = MockEncoder::new(device);
        let mut ctx = frame.ctx(resources, &scene);
        lane.prepare(&mut ctx).unwrap();
        lane.render(&mut ctx, &mut encoder).unwrap();
    }

    #[test]
    fn test_dispatch_uses_ceiling_division() {
        let (device, mut resources, mut lane) = setup(1920, 1080);
        let mut frame = TestFrame::new(1920, 1080);
        run(&mut lane, &device, &resources, &mut frame);
        assert_eq!(lane.last_dispatch(), Some((120, 68, 1)));
        assert_eq!(frame.stats.tiles, 120 * 68);

        resources
            .create_render_target(SCENE_DEPTH, 1921, 1080, prism_core::renderer::TextureFormat::Depth32Float)
            .unwrap();
        lane.on_resize(&mut resources, 1921, 1080).unwrap();
        let mut frame = TestFrame::new(1921, 1080);
        run(&mut lane, &device, &resources, &mut frame);
        assert_eq!(lane.last_dispatch(), Some((121, 68, 1)));
    }

    #[test]
    fn test_buffers_cleared_before_every_dispatch() {
        let (device, resources, mut lane) = setup(64, 64);
        let mut frame = TestFrame::new(64, 64);
        device.take_commands();
        run(&mut lane, &device, &resources, &mut frame);
        run(&mut lane, &device, &resources, &mut frame);

        let indices = *resources.buffer(TILE_LIGHT_INDICES).unwrap();
        let counts = *resources.buffer(TILE_LIGHT_COUNTS).unwrap();
        let expected = [
            Command::ClearBuffer(indices),
            Command::ClearBuffer(counts),
            Command::BeginCompute("Light Cull Pass".into()),
            Command::Dispatch(4, 4, 1),
        ];
        let commands = device.take_commands();
        assert_eq!(commands.len(), 8);
        assert_eq!(&commands[..4], &expected);
        assert_eq!(&commands[4..], &expected);
    }

    #[test]
    fn test_resize_recreates_buffers_only_when_grid_changes() {
        let (device, mut resources, mut lane) = setup(1920, 1080);
        let size = |r: &GpuResourceManager| r.buffer_size(TILE_LIGHT_COUNTS).unwrap();
        assert_eq!(size(&resources), 120 * 68 * 4);
        let revision = resources.revision(TILE_LIGHT_INDICES);
        let live = device.live_buffer_count();

        // Same tile grid.
        lane.on_resize(&mut resources, 1915, 1080).unwrap();
        assert_eq!(resources.revision(TILE_LIGHT_INDICES), revision);

        lane.on_resize(&mut resources, 1280, 720).unwrap();
        assert_eq!(size(&resources), 80 * 45 * 4);
        assert_eq!(
            resources.buffer_size(TILE_LIGHT_INDICES),
            Some(80 * 45 * 256 * 4)
        );
        assert_ne!(resources.revision(TILE_LIGHT_INDICES), revision);
        assert_eq!(device.live_buffer_count(), live);
    }

    #[test]
    fn test_split_viewport_dispatches_its_own_grid() {
        let (device, resources, mut lane) = setup(1920, 1080);
        let mut frame = TestFrame::new(1920, 1080);
        frame.viewport.rect = prism_core::viewport::ViewportRect::new(960.0, 540.0, 960.0, 540.0);
        let scene = Scene::new();
        let mut encoder = MockEncoder::new(&device);
        let mut ctx = frame.ctx(&resources, &scene);
        lane.prepare(&mut ctx).unwrap();
        lane.render(&mut ctx, &mut encoder).unwrap();
        assert_eq!(lane.last_dispatch(), Some((60, 34, 1)));
    }
}
