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

//! Camera-facing quads: icons, text labels and flip-book particles.

use super::shaders::BILLBOARD_FILE;
use super::{require_buffer, FrameContext, RenderLane, SharedBindGroup, TextureBindGroups};
use crate::resources::{
    DrawConstantRing, DrawSlot, GpuResourceManager, OwnedBindGroupLayout, OwnedPipelineLayout,
    OwnedRenderPipeline, TextureCache, CAMERA_CONSTANTS, SCENE_COLOR, SCENE_DEPTH,
};
use crate::shader_library::{ShaderLibrary, ShaderSnapshot, VariantDesc};
use bytemuck::{Pod, Zeroable};
use prism_core::math::{LinearRgba, Vec2, Vec3};
use prism_core::renderer::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor, BindGroupLayoutEntry,
    BlendMode, ColorTargetState, CommandEncoder, CompareFunction, DepthStencilState,
    GraphicsDevice, Operations, PipelineLayoutDescriptor, PrimitiveState, RenderError,
    RenderPassColorAttachment, RenderPassDepthStencilAttachment, RenderPassDescriptor,
    RenderPipelineDescriptor, ShaderStageFlags, SubUvConstants, TextureFormat, TextureSampleType,
    TextureViewId,
};
use prism_core::scene::{BillboardInstance, BillboardKind};
use prism_core::viewport::ShowFlags;
use std::borrow::Cow;
use std::mem::size_of;
use std::sync::Arc;

/// Vertices expanded by the vertex shader for one quad.
pub const QUAD_VERTICES: u32 = 6;

/// Per-quad uniform block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BillboardBlock {
    pub center: Vec3,
    pub _pad0: f32,
    /// Camera right, scaled to half the quad width.
    pub right: Vec3,
    pub _pad1: f32,
    /// Camera up, scaled to half the quad height.
    pub up: Vec3,
    pub _pad2: f32,
    pub sub_uv: SubUvConstants,
    pub uuid_color: LinearRgba,
}

/// The atlas window of cell `(u, v)` in a `columns x rows` grid.
pub fn atlas_cell(u: u32, v: u32, columns: u32, rows: u32) -> (Vec2, Vec2) {
    let scale = Vec2::new(1.0 / columns.max(1) as f32, 1.0 / rows.max(1) as f32);
    (Vec2::new(u as f32 * scale.x, v as f32 * scale.y), scale)
}

/// The atlas cell of a flip-book frame, wrapping over the cell count.
pub fn sub_uv_cell(frame: u32, columns: u32, rows: u32) -> (u32, u32) {
    let columns = columns.max(1);
    let frame = frame % (columns * rows.max(1));
    (frame % columns, frame / columns)
}

/// The atlas cell of a glyph in an ASCII-ordered atlas, or `None` when the
/// character is outside the atlas.
pub fn glyph_cell(c: char, columns: u32, rows: u32) -> Option<(u32, u32)> {
    let code = c as u32;
    let columns = columns.max(1);
    (code < columns * rows).then_some((code % columns, code / columns))
}

#[derive(Debug, Clone, Copy)]
struct Quad {
    slot: DrawSlot,
    texture: TextureViewId,
}

#[derive(Debug)]
struct GpuState {
    device: Arc<dyn GraphicsDevice>,
    camera_layout: OwnedBindGroupLayout,
    texture_layout: OwnedBindGroupLayout,
    pipeline_layout: OwnedPipelineLayout,
    ring: DrawConstantRing,
    texture_groups: TextureBindGroups,
    textures: TextureCache,
    variant: u64,
    color_format: TextureFormat,
    _block_layout: OwnedBindGroupLayout,
}

/// Draws billboards alpha-blended over the opaque scene, sorted back to
/// front, depth-tested without writing depth.
#[derive(Debug, Default)]
pub struct BillboardLane {
    gpu: Option<GpuState>,
    pipeline: Option<OwnedRenderPipeline>,
    camera_group: SharedBindGroup,
    quads: Vec<Quad>,
}

impl BillboardLane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quads collected for the current viewport; a text label contributes
    /// one quad per drawable glyph.
    pub fn quad_count(&self) -> usize {
        self.quads.len()
    }

    fn build_pipeline(gpu: &GpuState, snapshot: &ShaderSnapshot) -> Result<OwnedRenderPipeline, RenderError> {
        let id = gpu.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(Cow::Borrowed("Billboard Pipeline")),
            layout: Some(gpu.pipeline_layout.id()),
            shader_module: *snapshot.module(gpu.variant)?,
            vertex_entry: Cow::Borrowed("vs_main"),
            fragment_entry: Some(Cow::Borrowed("fs_main")),
            vertex_buffers: Cow::Borrowed(&[]),
            color_target: Some(ColorTargetState {
                format: gpu.color_format,
                blend: BlendMode::AlphaBlend,
            }),
            primitive: PrimitiveState::default(),
            depth_stencil: Some(DepthStencilState {
                format: TextureFormat::Depth32Float,
                depth_write_enabled: false,
                depth_compare: CompareFunction::LessEqual,
            }),
        })?;
        Ok(OwnedRenderPipeline::new(gpu.device.clone(), id))
    }

    fn create_gpu_state(resources: &GpuResourceManager, shaders: &ShaderLibrary) -> Result<GpuState, RenderError> {
        let device = resources.device().clone();
        let camera_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Billboard Camera Layout"),
            entries: &[BindGroupLayoutEntry::uniform(0, ShaderStageFlags::VERTEX)],
        })?;
        let camera_layout = OwnedBindGroupLayout::new(device.clone(), camera_layout);
        let block_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Billboard Block Layout"),
            entries: &[BindGroupLayoutEntry::dynamic_uniform(0, ShaderStageFlags::VERTEX_FRAGMENT)],
        })?;
        let block_layout = OwnedBindGroupLayout::new(device.clone(), block_layout);
        let texture_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Billboard Atlas Layout"),
            entries: &[
                BindGroupLayoutEntry::texture(0, ShaderStageFlags::FRAGMENT, TextureSampleType::Float { filterable: true }),
                BindGroupLayoutEntry::sampler(1, ShaderStageFlags::FRAGMENT, true),
            ],
        })?;
        let texture_layout = OwnedBindGroupLayout::new(device.clone(), texture_layout);
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Billboard Pipeline Layout"),
            bind_group_layouts: &[camera_layout.id(), block_layout.id(), texture_layout.id()],
        })?;
        let pipeline_layout = OwnedPipelineLayout::new(device.clone(), pipeline_layout);

        let ring = DrawConstantRing::new(
            device.clone(),
            block_layout.id(),
            0,
            size_of::<BillboardBlock>() as u64,
            "Billboard Constants",
        )?;
        let variant = shaders.register_variant(&VariantDesc::new(BILLBOARD_FILE, "fs_main"))?;

        Ok(GpuState {
            color_format: resources
                .target_format(SCENE_COLOR)
                .unwrap_or_else(|| device.color_format()),
            textures: TextureCache::new(device.clone())?,
            texture_groups: TextureBindGroups::default(),
            ring,
            pipeline_layout,
            texture_layout,
            camera_layout,
            _block_layout: block_layout,
            variant,
            device,
        })
    }

    fn push_quad(gpu: &mut GpuState, quads: &mut Vec<Quad>, block: &BillboardBlock, texture: TextureViewId) -> Result<(), RenderError> {
        let slot = gpu.ring.push(bytemuck::bytes_of(block))?;
        gpu.texture_groups.ensure(&gpu.device, gpu.texture_layout.id(), texture, gpu.textures.linear_sampler())?;
        quads.push(Quad { slot, texture });
        Ok(())
    }

    fn collect(
        gpu: &mut GpuState,
        quads: &mut Vec<Quad>,
        billboard: &BillboardInstance,
        ctx: &FrameContext<'_>,
    ) -> Result<(), RenderError> {
        let scene = ctx.scene;
        let data = billboard.texture.and_then(|h| scene.texture_data(h));
        let texture = gpu.textures.view(billboard.texture, data);

        let scale = Vec3::new(
            billboard.transform.cols[0].truncate().length(),
            billboard.transform.cols[1].truncate().length(),
            1.0,
        );
        let half = Vec2::new(billboard.size.x * scale.x * 0.5, billboard.size.y * scale.y * 0.5);
        let right = ctx.view.view.row(0).truncate().normalize();
        let up = ctx.view.view.row(1).truncate().normalize();
        let center = billboard.transform.translation();

        let block = |center: Vec3, (uv_offset, uv_scale): (Vec2, Vec2)| BillboardBlock {
            center,
            _pad0: 0.0,
            right: right * half.x,
            _pad1: 0.0,
            up: up * half.y,
            _pad2: 0.0,
            sub_uv: SubUvConstants {
                uv_offset,
                uv_scale,
                tint: billboard.tint,
            },
            uuid_color: LinearRgba::from_object_id(billboard.id),
        };

        match &billboard.kind {
            BillboardKind::Icon { cell_u, cell_v, columns, rows } => {
                let cell = atlas_cell(*cell_u, *cell_v, *columns, *rows);
                Self::push_quad(gpu, quads, &block(center, cell), texture)
            }
            BillboardKind::SubUv { frame, columns, rows } => {
                let (u, v) = sub_uv_cell(*frame, *columns, *rows);
                let cell = atlas_cell(u, v, *columns, *rows);
                Self::push_quad(gpu, quads, &block(center, cell), texture)
            }
            BillboardKind::Text { text, columns, rows } => {
                let count = text.chars().count();
                let advance = right * (half.x * 2.0);
                let first = center - advance * ((count.max(1) - 1) as f32 * 0.5);
                for (i, c) in text.chars().enumerate() {
                    let Some((u, v)) = glyph_cell(c, *columns, *rows) else {
                        continue;
                    };
                    if c == ' ' {
                        continue;
                    }
                    let cell = atlas_cell(u, v, *columns, *rows);
                    Self::push_quad(gpu, quads, &block(first + advance * i as f32, cell), texture)?;
                }
                Ok(())
            }
        }
    }
}

impl RenderLane for BillboardLane {
    fn name(&self) -> &'static str {
        "BillboardLane"
    }

    fn on_gpu_init(&mut self, resources: &mut GpuResourceManager, shaders: &ShaderLibrary) -> Result<(), RenderError> {
        let gpu = Self::create_gpu_state(resources, shaders)?;
        self.pipeline = Some(Self::build_pipeline(&gpu, &shaders.snapshot())?);
        self.gpu = Some(gpu);
        log::info!("BillboardLane: initialized");
        Ok(())
    }

    fn on_shaders_changed(&mut self, shaders: &ShaderSnapshot) {
        let Some(gpu) = &self.gpu else {
            return;
        };
        match Self::build_pipeline(gpu, shaders) {
            Ok(pipeline) => self.pipeline = Some(pipeline),
            Err(e) => log::error!("BillboardLane: keeping previous pipeline: {e}"),
        }
    }

    fn prepare(&mut self, ctx: &mut FrameContext<'_>) -> Result<(), RenderError> {
        self.quads.clear();
        let Some(gpu) = self.gpu.as_mut() else {
            return Err(RenderError::NotInitialized);
        };
        let show_text = ctx.viewport.shows(ShowFlags::BILLBOARD_TEXT);
        let show_sprites = ctx.viewport.shows(ShowFlags::PRIMITIVES);

        let scene = ctx.scene;
        let world = scene.active_world();
        let eye = ctx.view.eye;
        let mut visible: Vec<&BillboardInstance> = Vec::new();
        for billboard in scene.billboard_instances().iter().filter(|b| b.world == world) {
            let shown = match billboard.kind {
                BillboardKind::Text { .. } => show_text,
                _ => show_sprites,
            };
            if !shown {
                continue;
            }
            if !billboard.world_bounds().intersects_frustum(&ctx.view.frustum) {
                ctx.stats.culled_objects += 1;
                continue;
            }
            visible.push(billboard);
        }
        // Farthest first for blending.
        visible.sort_by(|a, b| {
            let da = a.transform.translation().distance(eye);
            let db = b.transform.translation().distance(eye);
            db.total_cmp(&da)
        });

        for billboard in visible {
            Self::collect(gpu, &mut self.quads, billboard, ctx)?;
        }
        Ok(())
    }

    fn render(&mut self, ctx: &mut FrameContext<'_>, encoder: &mut dyn CommandEncoder) -> Result<(), RenderError> {
        let (Some(gpu), Some(pipeline)) = (&self.gpu, &self.pipeline) else {
            return Err(RenderError::NotInitialized);
        };
        if self.quads.is_empty() {
            return Ok(());
        }
        let resources = ctx.resources;
        let layout = gpu.camera_layout.id();
        let camera_group = self.camera_group.get_or_create(resources, &[CAMERA_CONSTANTS], || {
            let camera = require_buffer(resources, CAMERA_CONSTANTS)?;
            gpu.device
                .create_bind_group(&BindGroupDescriptor {
                    label: Some("Billboard Camera Bind Group"),
                    layout,
                    entries: &[BindGroupEntry::buffer(0, camera, None)],
                })
                .map_err(RenderError::from)
        })?;

        let (Some(color), Some(depth)) = (resources.target_view(SCENE_COLOR), resources.target_view(SCENE_DEPTH)) else {
            return Err(RenderError::RenderingFailed("scene targets are missing".into()));
        };
        let color_attachments = [RenderPassColorAttachment {
            view: color,
            ops: Operations::load(),
        }];

        let mut draw_calls = 0;
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Billboard Pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: depth,
                    depth_ops: Some(Operations::load()),
                }),
            });
            pass.set_viewport(&ctx.viewport.rect.to_gpu_viewport());
            pass.set_pipeline(pipeline.id_ref());
            pass.set_bind_group(0, camera_group, &[]);
            for quad in &self.quads {
                let Some(atlas) = gpu.texture_groups.get(&quad.texture) else {
                    continue;
                };
                pass.set_bind_group(1, gpu.ring.bind_group(quad.slot), &[quad.slot.offset]);
                pass.set_bind_group(2, atlas, &[]);
                pass.draw(0..QUAD_VERTICES, 0..1);
                draw_calls += 1;
            }
        }
        ctx.stats.draw_calls += draw_calls;
        Ok(())
    }

    fn clear(&mut self) {
        self.quads.clear();
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.ring.reset();
        }
    }

    fn is_ready(&self) -> bool {
        self.pipeline.is_some()
    }

    fn on_gpu_shutdown(&mut self) {
        self.quads.clear();
        self.camera_group.reset();
        self.pipeline = None;
        if let Some(mut gpu) = self.gpu.take() {
            gpu.texture_groups.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{shader_library, shared_resources, Command, MockDevice, MockEncoder, TestFrame};
    use prism_core::math::Mat4;
    use prism_core::scene::{Scene, WorldId};

    fn billboard(id: u32, kind: BillboardKind, at: Vec3) -> BillboardInstance {
        BillboardInstance {
            id,
            world: WorldId(0),
            transform: Mat4::from_translation(at),
            texture: None,
            kind,
            size: Vec2::new(1.0, 1.0),
            tint: LinearRgba::WHITE,
        }
    }

    fn icon() -> BillboardKind {
        BillboardKind::Icon {
            cell_u: 1,
            cell_v: 0,
            columns: 4,
            rows: 4,
        }
    }

    #[test]
    fn test_block_layout() {
        assert_eq!(size_of::<BillboardBlock>(), 96);
    }

    #[test]
    fn test_atlas_cells() {
        let (offset, scale) = atlas_cell(1, 2, 4, 4);
        assert_eq!(offset, Vec2::new(0.25, 0.5));
        assert_eq!(scale, Vec2::new(0.25, 0.25));
        assert_eq!(sub_uv_cell(5, 4, 2), (1, 1));
        assert_eq!(sub_uv_cell(9, 4, 2), (1, 0));
        assert_eq!(glyph_cell('A', 16, 8), Some((1, 4)));
        assert_eq!(glyph_cell('é', 16, 8), None);
    }

    #[test]
    fn test_text_emits_one_quad_per_glyph() {
        let device = Arc::new(MockDevice::default());
        let mut resources = shared_resources(&device, 128, 128);
        let mut lane = BillboardLane::new();
        lane.on_gpu_init(&mut resources, &shader_library(&device)).unwrap();

        let mut scene = Scene::new();
        let text = BillboardKind::Text {
            text: "Hi there".into(),
            columns: 16,
            rows: 8,
        };
        scene.add_billboard(billboard(1, text, Vec3::ZERO));
        scene.add_billboard(billboard(2, icon(), Vec3::ZERO));

        let mut frame = TestFrame::new(128, 128);
        let mut encoder = MockEncoder::new(&device);
        device.take_commands();
        {
            let mut ctx = frame.ctx(&resources, &scene);
            lane.prepare(&mut ctx).unwrap();
            lane.render(&mut ctx, &mut encoder).unwrap();
        }
        // Seven glyphs, the space is skipped, plus the icon.
        assert_eq!(lane.quad_count(), 8);
        let draws = device
            .take_commands()
            .into_iter()
            .filter(|c| matches!(c, Command::Draw { .. }))
            .count();
        assert_eq!(draws, 8);
        assert_eq!(frame.stats.draw_calls, 8);
    }

    #[test]
    fn test_show_flags_and_culling() {
        let device = Arc::new(MockDevice::default());
        let mut resources = shared_resources(&device, 128, 128);
        let mut lane = BillboardLane::new();
        lane.on_gpu_init(&mut resources, &shader_library(&device)).unwrap();

        let mut scene = Scene::new();
        let text = BillboardKind::Text {
            text: "A".into(),
            columns: 16,
            rows: 8,
        };
        scene.add_billboard(billboard(1, text, Vec3::ZERO));
        scene.add_billboard(billboard(2, icon(), Vec3::ZERO));
        scene.add_billboard(billboard(3, icon(), Vec3::splat(60.0)));

        let mut frame = TestFrame::new(128, 128);
        frame.viewport.show_flags = ShowFlags::BILLBOARD_TEXT;
        lane.prepare(&mut frame.ctx(&resources, &scene)).unwrap();
        assert_eq!(lane.quad_count(), 1);

        frame.viewport.show_flags = ShowFlags::PRIMITIVES;
        frame.stats = Default::default();
        lane.clear();
        lane.prepare(&mut frame.ctx(&resources, &scene)).unwrap();
        assert_eq!(lane.quad_count(), 1);
        assert_eq!(frame.stats.culled_objects, 1);
    }
}
