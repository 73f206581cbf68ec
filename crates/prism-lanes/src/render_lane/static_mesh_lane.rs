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

//! Static mesh pass.
//!
//! Draws every visible mesh instance of the active world into the scene
//! color and depth targets, with one pipeline per shading model. Lit models
//! read the tile light lists written by [`LightCullLane`](super::LightCullLane).

use super::shaders::STATIC_MESH_FILE;
use super::{require_buffer, FrameContext, RenderLane, SharedBindGroup, TextureBindGroups};
use crate::resources::{
    DrawConstantRing, DrawSlot, GpuResourceManager, MeshCache, OwnedBindGroupLayout,
    OwnedPipelineLayout, OwnedRenderPipeline, TextureCache, CAMERA_CONSTANTS, CULL_PARAMS,
    LIGHT_BUFFER, LIGHT_HEADER, SCENE_COLOR, SCENE_DEPTH, SCREEN_CONSTANTS, TILE_LIGHT_COUNTS,
    TILE_LIGHT_INDICES,
};
use crate::shader_library::{ShaderLibrary, ShaderSnapshot, ShadingVariant, VariantDesc};
use bytemuck::{Pod, Zeroable};
use prism_core::renderer::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor, BindGroupLayoutEntry,
    BlendMode, ColorTargetState, CommandEncoder, CullMode, DepthStencilState, GraphicsDevice,
    IndexFormat, MaterialConstants, Operations, PerObjectConstants, PipelineLayoutDescriptor,
    PolygonMode, PrimitiveState, PrimitiveTopology, RenderError, RenderPassColorAttachment,
    RenderPassDepthStencilAttachment, RenderPassDescriptor, RenderPipelineDescriptor,
    ShaderStageFlags, SubMeshConstants, TextureConstants, TextureFormat, TextureSampleType,
    TextureViewId, VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode,
};
use prism_core::math::Vec2;
use prism_core::scene::{MaterialSubset, MeshHandle, MeshInstance, StaticVertex};
use prism_core::viewport::ShowFlags;
use std::borrow::Cow;
use std::collections::HashMap;
use std::mem::size_of;
use std::sync::Arc;

const FRAME_RESOURCES: [&str; 7] = [
    CAMERA_CONSTANTS,
    SCREEN_CONSTANTS,
    CULL_PARAMS,
    LIGHT_HEADER,
    LIGHT_BUFFER,
    TILE_LIGHT_INDICES,
    TILE_LIGHT_COUNTS,
];

const VERTEX_ATTRIBUTES: [VertexAttribute; 4] = [
    VertexAttribute {
        format: VertexFormat::Float32x3,
        offset: 0,
        shader_location: 0,
    },
    VertexAttribute {
        format: VertexFormat::Float32x3,
        offset: 12,
        shader_location: 1,
    },
    VertexAttribute {
        format: VertexFormat::Float32x4,
        offset: 24,
        shader_location: 2,
    },
    VertexAttribute {
        format: VertexFormat::Float32x2,
        offset: 40,
        shader_location: 3,
    },
];

/// The per-draw uniform block, bound with a dynamic offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshDrawBlock {
    pub object: PerObjectConstants,
    pub material: MaterialConstants,
    pub sub_mesh: SubMeshConstants,
    pub texture: TextureConstants,
}

impl MeshDrawBlock {
    /// The block for sub-mesh `index` of an object.
    pub fn new(object: PerObjectConstants, subset: &MaterialSubset, index: usize, selected_sub_mesh: Option<usize>) -> Self {
        Self {
            object,
            material: subset.material,
            sub_mesh: SubMeshConstants {
                is_selected_sub_mesh: if selected_sub_mesh == Some(index) { 1.0 } else { 0.0 },
                _pad: [0.0; 3],
            },
            texture: TextureConstants {
                u_offset: subset.uv_offset.x,
                v_offset: subset.uv_offset.y,
                _pad: [0.0; 2],
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct MeshDraw {
    mesh: MeshHandle,
    slot: DrawSlot,
    index_start: u32,
    index_count: u32,
    texture: TextureViewId,
}

#[derive(Debug)]
struct Pipelines {
    shaded: HashMap<ShadingVariant, OwnedRenderPipeline>,
    wireframe: OwnedRenderPipeline,
}

#[derive(Debug)]
struct GpuState {
    device: Arc<dyn GraphicsDevice>,
    frame_layout: OwnedBindGroupLayout,
    texture_layout: OwnedBindGroupLayout,
    pipeline_layout: OwnedPipelineLayout,
    ring: DrawConstantRing,
    // Declared before the caches so groups drop before their views.
    texture_groups: TextureBindGroups,
    meshes: MeshCache,
    textures: TextureCache,
    variants: HashMap<ShadingVariant, u64>,
    color_format: TextureFormat,
    line_mode: bool,
    _draw_layout: OwnedBindGroupLayout,
}

/// Draws static meshes with the viewport's shading model.
#[derive(Debug, Default)]
pub struct StaticMeshLane {
    gpu: Option<GpuState>,
    pipelines: Option<Pipelines>,
    frame_group: SharedBindGroup,
    draws: Vec<MeshDraw>,
}

impl StaticMeshLane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws collected for the current viewport.
    pub fn draw_count(&self) -> usize {
        self.draws.len()
    }

    fn build_pipelines(gpu: &GpuState, snapshot: &ShaderSnapshot) -> Result<Pipelines, RenderError> {
        let build = |variant: ShadingVariant, polygon_mode: PolygonMode| -> Result<OwnedRenderPipeline, RenderError> {
            let key = gpu.variants.get(&variant).copied().ok_or(RenderError::NotInitialized)?;
            let id = gpu.device.create_render_pipeline(&RenderPipelineDescriptor {
                label: Some(Cow::Owned(format!("Static Mesh {variant:?} Pipeline"))),
                layout: Some(gpu.pipeline_layout.id()),
                shader_module: *snapshot.module(key)?,
                vertex_entry: Cow::Borrowed(variant.vertex_entry()),
                fragment_entry: Some(Cow::Borrowed(variant.fragment_entry())),
                vertex_buffers: Cow::Owned(vec![VertexBufferLayout {
                    array_stride: size_of::<StaticVertex>() as u64,
                    step_mode: VertexStepMode::Vertex,
                    attributes: Cow::Borrowed(&VERTEX_ATTRIBUTES),
                }]),
                color_target: Some(ColorTargetState {
                    format: gpu.color_format,
                    blend: BlendMode::Opaque,
                }),
                primitive: PrimitiveState {
                    topology: PrimitiveTopology::TriangleList,
                    polygon_mode,
                    cull_mode: CullMode::None,
                },
                depth_stencil: Some(DepthStencilState::opaque(TextureFormat::Depth32Float)),
            })?;
            Ok(OwnedRenderPipeline::new(gpu.device.clone(), id))
        };

        let mut shaded = HashMap::new();
        for variant in ShadingVariant::ALL {
            shaded.insert(variant, build(variant, PolygonMode::Fill)?);
        }
        let wireframe_mode = if gpu.line_mode {
            PolygonMode::Line
        } else {
            PolygonMode::Fill
        };
        let wireframe = build(ShadingVariant::Unlit, wireframe_mode)?;
        Ok(Pipelines { shaded, wireframe })
    }

    fn create_gpu_state(
        resources: &GpuResourceManager,
        shaders: &ShaderLibrary,
    ) -> Result<GpuState, RenderError> {
        let device = resources.device().clone();
        let vf = ShaderStageFlags::VERTEX_FRAGMENT;
        let f = ShaderStageFlags::FRAGMENT;

        let frame_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Static Mesh Frame Layout"),
            entries: &[
                BindGroupLayoutEntry::uniform(0, vf),
                BindGroupLayoutEntry::uniform(1, f),
                BindGroupLayoutEntry::uniform(2, f),
                BindGroupLayoutEntry::uniform(3, vf),
                BindGroupLayoutEntry::storage(4, vf, true),
                BindGroupLayoutEntry::storage(5, f, true),
                BindGroupLayoutEntry::storage(6, f, true),
            ],
        })?;
        let frame_layout = OwnedBindGroupLayout::new(device.clone(), frame_layout);

        let draw_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Static Mesh Draw Layout"),
            entries: &[BindGroupLayoutEntry::dynamic_uniform(0, vf)],
        })?;
        let draw_layout = OwnedBindGroupLayout::new(device.clone(), draw_layout);

        let texture_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Static Mesh Texture Layout"),
            entries: &[
                BindGroupLayoutEntry::texture(0, f, TextureSampleType::Float { filterable: true }),
                BindGroupLayoutEntry::sampler(1, f, true),
            ],
        })?;
        let texture_layout = OwnedBindGroupLayout::new(device.clone(), texture_layout);

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Static Mesh Pipeline Layout"),
            bind_group_layouts: &[frame_layout.id(), draw_layout.id(), texture_layout.id()],
        })?;
        let pipeline_layout = OwnedPipelineLayout::new(device.clone(), pipeline_layout);

        let ring = DrawConstantRing::new(
            device.clone(),
            draw_layout.id(),
            0,
            size_of::<MeshDrawBlock>() as u64,
            "Static Mesh Draw Constants",
        )?;

        let mut variants = HashMap::new();
        for variant in ShadingVariant::ALL {
            let desc = VariantDesc::new(STATIC_MESH_FILE, variant.fragment_entry());
            variants.insert(variant, shaders.register_variant(&desc)?);
        }

        let line_mode = device.supports_feature("polygon_mode_line");
        if !line_mode {
            log::warn!("StaticMeshLane: line polygon mode unsupported, wireframe draws filled");
        }

        Ok(GpuState {
            color_format: resources
                .target_format(SCENE_COLOR)
                .unwrap_or_else(|| device.color_format()),
            textures: TextureCache::new(device.clone())?,
            meshes: MeshCache::new(device.clone()),
            texture_groups: TextureBindGroups::default(),
            ring,
            pipeline_layout,
            texture_layout,
            frame_layout,
            _draw_layout: draw_layout,
            variants,
            line_mode,
            device,
        })
    }

    fn collect_draws(gpu: &mut GpuState, instance: &MeshInstance, ctx: &FrameContext<'_>, draws: &mut Vec<MeshDraw>) -> Result<(), RenderError> {
        let scene = ctx.scene;
        let Some(data) = scene.mesh_data(instance.mesh) else {
            log::warn!("StaticMeshLane: mesh {} of object {} is missing", instance.mesh.0, instance.id);
            return Ok(());
        };
        if let Err(e) = gpu.meshes.ensure(instance.mesh, data) {
            log::warn!("StaticMeshLane: cannot upload mesh {}: {e}", instance.mesh.0);
            return Ok(());
        }
        let index_total = data.indices.len() as u32;
        let object = PerObjectConstants::new(instance.transform, instance.id, instance.is_selected);

        let whole = [MaterialSubset {
            index_start: 0,
            index_count: index_total,
            material: MaterialConstants::default(),
            texture: None,
            uv_offset: Vec2::ZERO,
        }];
        let subsets = if instance.subsets.is_empty() {
            &whole[..]
        } else {
            &instance.subsets[..]
        };

        for (index, subset) in subsets.iter().enumerate() {
            let end = subset.index_start.saturating_add(subset.index_count);
            if subset.index_count == 0 || end > index_total {
                log::warn!(
                    "StaticMeshLane: subset {index} of object {} is out of range, skipped",
                    instance.id
                );
                continue;
            }
            let block = MeshDrawBlock::new(object, subset, index, instance.selected_sub_mesh);
            let slot = gpu.ring.push(bytemuck::bytes_of(&block))?;

            let data = subset.texture.and_then(|h| scene.texture_data(h));
            let texture = gpu.textures.view(subset.texture, data);
            gpu.texture_groups.ensure(
                &gpu.device,
                gpu.texture_layout.id(),
                texture,
                gpu.textures.linear_sampler(),
            )?;

            draws.push(MeshDraw {
                mesh: instance.mesh,
                slot,
                index_start: subset.index_start,
                index_count: subset.index_count,
                texture,
            });
        }
        Ok(())
    }
}

impl RenderLane for StaticMeshLane {
    fn name(&self) -> &'static str {
        "StaticMeshLane"
    }

    fn on_gpu_init(
        &mut self,
        resources: &mut GpuResourceManager,
        shaders: &ShaderLibrary,
    ) -> Result<(), RenderError> {
        let gpu = Self::create_gpu_state(resources, shaders)?;
        let pipelines = Self::build_pipelines(&gpu, &shaders.snapshot())?;
        self.gpu = Some(gpu);
        self.pipelines = Some(pipelines);
        log::info!("StaticMeshLane: initialized");
        Ok(())
    }

    fn on_shaders_changed(&mut self, shaders: &ShaderSnapshot) {
        let Some(gpu) = &self.gpu else {
            return;
        };
        match Self::build_pipelines(gpu, shaders) {
            Ok(pipelines) => self.pipelines = Some(pipelines),
            Err(e) => log::error!("StaticMeshLane: keeping previous pipelines: {e}"),
        }
    }

    fn prepare(&mut self, ctx: &mut FrameContext<'_>) -> Result<(), RenderError> {
        self.draws.clear();
        let Some(gpu) = self.gpu.as_mut() else {
            return Err(RenderError::NotInitialized);
        };
        let show_meshes = ctx.viewport.shows(ShowFlags::PRIMITIVES);
        let show_bounds = ctx.viewport.shows(ShowFlags::AABB);
        if !show_meshes && !show_bounds {
            return Ok(());
        }

        let scene = ctx.scene;
        let world = scene.active_world();
        for instance in scene.mesh_instances() {
            if instance.world != world || instance.is_gizmo {
                continue;
            }
            let bounds = instance.world_bounds();
            if !bounds.intersects_frustum(&ctx.view.frustum) {
                ctx.stats.culled_objects += 1;
                continue;
            }
            if show_bounds {
                ctx.primitives.add_aabb(&bounds, ctx.settings.bounds_color);
            }
            if show_meshes {
                Self::collect_draws(gpu, instance, ctx, &mut self.draws)?;
            }
        }
        Ok(())
    }

    fn render(
        &mut self,
        ctx: &mut FrameContext<'_>,
        encoder: &mut dyn CommandEncoder,
    ) -> Result<(), RenderError> {
        let (Some(gpu), Some(pipelines)) = (&self.gpu, &self.pipelines) else {
            return Err(RenderError::NotInitialized);
        };
        if self.draws.is_empty() {
            return Ok(());
        }
        let resources = ctx.resources;
        let pipeline = if ctx.viewport.view_mode.is_wireframe() {
            &pipelines.wireframe
        } else {
            pipelines
                .shaded
                .get(&ShadingVariant::for_view_mode(ctx.viewport.view_mode))
                .ok_or(RenderError::NotInitialized)?
        };

        let layout = gpu.frame_layout.id();
        let frame_group = self.frame_group.get_or_create(resources, &FRAME_RESOURCES, || {
            let entries: Vec<BindGroupEntry> = FRAME_RESOURCES
                .iter()
                .enumerate()
                .map(|(binding, name)| {
                    require_buffer(resources, name).map(|b| BindGroupEntry::buffer(binding as u32, b, None))
                })
                .collect::<Result<_, _>>()?;
            gpu.device
                .create_bind_group(&BindGroupDescriptor {
                    label: Some("Static Mesh Frame Bind Group"),
                    layout,
                    entries: &entries,
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
                label: Some("Static Mesh Pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: depth,
                    depth_ops: Some(Operations::load()),
                }),
            });
            pass.set_viewport(&ctx.viewport.rect.to_gpu_viewport());
            pass.set_pipeline(pipeline.id_ref());
            pass.set_bind_group(0, frame_group, &[]);

            for draw in &self.draws {
                let (Some(mesh), Some(texture_group)) =
                    (gpu.meshes.get(draw.mesh), gpu.texture_groups.get(&draw.texture))
                else {
                    continue;
                };
                pass.set_bind_group(1, gpu.ring.bind_group(draw.slot), &[draw.slot.offset]);
                pass.set_bind_group(2, texture_group, &[]);
                pass.set_vertex_buffer(0, mesh.vertex_buffer.id_ref(), 0);
                pass.set_index_buffer(mesh.index_buffer.id_ref(), 0, IndexFormat::Uint32);
                pass.draw_indexed(draw.index_start..draw.index_start + draw.index_count, 0, 0..1);
                draw_calls += 1;
            }
        }
        ctx.stats.draw_calls += draw_calls;
        Ok(())
    }

    fn clear(&mut self) {
        self.draws.clear();
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.ring.reset();
        }
    }

    fn is_ready(&self) -> bool {
        self.pipelines.is_some()
    }

    fn on_gpu_shutdown(&mut self) {
        self.draws.clear();
        self.frame_group.reset();
        self.pipelines = None;
        if let Some(mut gpu) = self.gpu.take() {
            gpu.texture_groups.clear();
        }
        log::info!("StaticMeshLane: shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::{LightBufferLane, LightCullLane};
    use crate::test_support::{quad_mesh, shader_library, shared_resources, Command, MockDevice, MockEncoder, TestFrame};
    use prism_core::math::{Aabb, Mat4, Vec3};
    use prism_core::scene::{Scene, WorldId};
    use prism_core::viewport::ViewMode;
    use std::sync::atomic::Ordering;

    fn setup() -> (Arc<MockDevice>, GpuResourceManager, StaticMeshLane) {
        let device = Arc::new(MockDevice::default());
        let mut resources = shared_resources(&device, 320, 240);
        let shaders = shader_library(&device);
        LightBufferLane::new(16).on_gpu_init(&mut resources, &shaders).unwrap();
        LightCullLane::default().on_gpu_init(&mut resources, &shaders).unwrap();
        let mut lane = StaticMeshLane::new();
        lane.on_gpu_init(&mut resources, &shaders).unwrap();
        (device, resources, lane)
    }

    fn instance(scene: &mut Scene, id: u32, at: Vec3) -> MeshInstance {
        let mesh = scene.add_mesh_data(quad_mesh());
        MeshInstance {
            id,
            world: WorldId(0),
            transform: Mat4::from_translation(at),
            bounds: Aabb::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0)),
            mesh,
            subsets: Vec::new(),
            selected_sub_mesh: None,
            is_selected: false,
            is_gizmo: false,
        }
    }

    #[test]
    fn test_block_fits_one_uniform_slot() {
        assert_eq!(size_of::<MeshDrawBlock>(), 256);
    }

    #[test]
    fn test_block_carries_subset_uv_offset_and_selection() {
        let subset = MaterialSubset {
            index_start: 0,
            index_count: 6,
            material: MaterialConstants::default(),
            texture: None,
            uv_offset: Vec2::new(0.25, -0.5),
        };
        let object = PerObjectConstants::new(Mat4::IDENTITY, 7, false);

        let block = MeshDrawBlock::new(object, &subset, 1, Some(1));
        assert_eq!(block.texture.u_offset, 0.25);
        assert_eq!(block.texture.v_offset, -0.5);
        assert_eq!(block.sub_mesh.is_selected_sub_mesh, 1.0);
        assert_eq!(MeshDrawBlock::new(object, &subset, 0, Some(1)).sub_mesh.is_selected_sub_mesh, 0.0);
    }

    #[test]
    fn test_culls_and_filters_instances() {
        let (device, resources, mut lane) = setup();
        let mut scene = Scene::new();

        let mut visible = instance(&mut scene, 1, Vec3::ZERO);
        visible.subsets = vec![
            MaterialSubset {
                index_start: 0,
                index_count: 3,
                material: MaterialConstants::default(),
                texture: None,
                uv_offset: Vec2::ZERO,
            },
            MaterialSubset {
                index_start: 3,
                index_count: 3,
                material: MaterialConstants::default(),
                texture: None,
                uv_offset: Vec2::ZERO,
            },
        ];
        scene.add_mesh(visible);
        // Behind the default camera.
        let behind = instance(&mut scene, 2, Vec3::splat(50.0));
        scene.add_mesh(behind);
        let mut gizmo = instance(&mut scene, 3, Vec3::ZERO);
        gizmo.is_gizmo = true;
        scene.add_mesh(gizmo);
        let mut elsewhere = instance(&mut scene, 4, Vec3::ZERO);
        elsewhere.world = WorldId(9);
        scene.add_mesh(elsewhere);

        let mut frame = TestFrame::new(320, 240);
        let mut encoder = MockEncoder::new(&device);
        device.take_commands();
        {
            let mut ctx = frame.ctx(&resources, &scene);
            lane.prepare(&mut ctx).unwrap();
            lane.render(&mut ctx, &mut encoder).unwrap();
        }

        assert_eq!(lane.draw_count(), 2);
        assert_eq!(frame.stats.culled_objects, 1);
        assert_eq!(frame.stats.draw_calls, 2);
        assert_eq!(frame.primitives.boxes().len(), 1);
        let draws: Vec<_> = device
            .take_commands()
            .into_iter()
            .filter(|c| matches!(c, Command::DrawIndexed { .. }))
            .collect();
        assert_eq!(
            draws,
            vec![
                Command::DrawIndexed { indices: 0..3 },
                Command::DrawIndexed { indices: 3..6 }
            ]
        );
    }

    #[test]
    fn test_primitives_flag_hides_meshes() {
        let (_device, resources, mut lane) = setup();
        let mut scene = Scene::new();
        let mesh = instance(&mut scene, 1, Vec3::ZERO);
        scene.add_mesh(mesh);

        let mut frame = TestFrame::new(320, 240);
        frame.viewport.show_flags = ShowFlags::AABB;
        lane.prepare(&mut frame.ctx(&resources, &scene)).unwrap();
        assert_eq!(lane.draw_count(), 0);
        assert_eq!(frame.primitives.boxes().len(), 1);
    }

    #[test]
    fn test_out_of_range_subset_is_skipped() {
        let (_device, resources, mut lane) = setup();
        let mut scene = Scene::new();
        let mut mesh = instance(&mut scene, 1, Vec3::ZERO);
        mesh.subsets = vec![MaterialSubset {
            index_start: 3,
            index_count: 30,
            material: MaterialConstants::default(),
            texture: None,
            uv_offset: Vec2::ZERO,
        }];
        scene.add_mesh(mesh);

        let mut frame = TestFrame::new(320, 240);
        lane.prepare(&mut frame.ctx(&resources, &scene)).unwrap();
        assert_eq!(lane.draw_count(), 0);
    }

    #[test]
    fn test_wireframe_uses_fill_fallback_without_feature() {
        let (device, resources, mut lane) = setup();
        assert!(lane.is_ready());
        let mut scene = Scene::new();
        let mesh = instance(&mut scene, 1, Vec3::ZERO);
        scene.add_mesh(mesh);

        let mut frame = TestFrame::new(320, 240);
        frame.viewport.view_mode = ViewMode::Wireframe;
        let mut encoder = MockEncoder::new(&device);
        let mut ctx = frame.ctx(&resources, &scene);
        lane.prepare(&mut ctx).unwrap();
        lane.render(&mut ctx, &mut encoder).unwrap();
        assert_eq!(ctx.stats.draw_calls, 1);
    }

    #[test]
    fn test_failed_pipelines_leave_lane_unready() {
        let device = Arc::new(MockDevice::default());
        device.fail_pipelines.store(true, Ordering::Relaxed);
        let mut resources = shared_resources(&device, 64, 64);
        let mut lane = StaticMeshLane::new();
        assert!(lane.on_gpu_init(&mut resources, &shader_library(&device)).is_err());
        assert!(!lane.is_ready());
    }
}
