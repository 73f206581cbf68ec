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

//! Transform gizmo drawn over the selected object.

use super::shaders::GIZMO_FILE;
use super::{require_buffer, FrameContext, RenderLane, SharedBindGroup};
use crate::resources::{
    DrawConstantRing, DrawSlot, GpuResourceManager, OwnedBindGroupLayout, OwnedBuffer,
    OwnedPipelineLayout, OwnedRenderPipeline, CAMERA_CONSTANTS, SCENE_COLOR, SCENE_DEPTH,
};
use crate::shader_library::{ShaderLibrary, ShaderSnapshot, VariantDesc};
use bytemuck::{Pod, Zeroable};
use prism_core::math::{LinearRgba, Mat4, Vec3, Vec4};
use prism_core::renderer::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor, BindGroupLayoutEntry,
    BlendMode, BufferDescriptor, BufferUsage, ColorTargetState, CommandEncoder, DepthStencilState,
    GraphicsDevice, IndexFormat, Operations, PipelineLayoutDescriptor, PrimitiveState, RenderError,
    RenderPassColorAttachment, RenderPassDepthStencilAttachment, RenderPassDescriptor,
    RenderPipelineDescriptor, ResourceError, ShaderStageFlags, TextureFormat, VertexAttribute,
    VertexBufferLayout, VertexFormat, VertexStepMode,
};
use prism_core::scene::GizmoMode;
use prism_core::viewport::ViewState;
use std::borrow::Cow;
use std::f32::consts::TAU;
use std::mem::size_of;
use std::sync::Arc;

/// Fraction of the eye distance (or of the orthographic width) covered by
/// one handle, keeping the gizmo a constant size on screen.
pub const GIZMO_SCREEN_FRACTION: f32 = 0.15;

const SEGMENTS: u32 = 16;

const VERTEX_ATTRIBUTES: [VertexAttribute; 2] = [
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
];

/// Gizmo vertex: position and normal.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GizmoVertex {
    pub position: Vec3,
    pub normal: Vec3,
}

/// Per-handle uniform block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GizmoBlock {
    pub model: Mat4,
    pub color: LinearRgba,
    pub uuid_color: LinearRgba,
}

/// Indexed handle geometry along +X, unit length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GizmoMesh {
    pub vertices: Vec<GizmoVertex>,
    pub indices: Vec<u32>,
}

impl GizmoMesh {
    fn vertex(&mut self, position: Vec3, normal: Vec3) -> u32 {
        self.vertices.push(GizmoVertex { position, normal });
        self.vertices.len() as u32 - 1
    }

    /// A tube or cone frustum around +X from `x0` (radius `r0`) to `x1`
    /// (radius `r1`).
    fn add_frustum(&mut self, x0: f32, r0: f32, x1: f32, r1: f32) {
        let slope = (r0 - r1) / (x1 - x0).max(f32::EPSILON);
        let base = self.vertices.len() as u32;
        for i in 0..=SEGMENTS {
            let a = i as f32 / SEGMENTS as f32 * TAU;
            let (s, c) = a.sin_cos();
            let normal = Vec3::new(slope, c, s).normalize();
            self.vertex(Vec3::new(x0, c * r0, s * r0), normal);
            self.vertex(Vec3::new(x1, c * r1, s * r1), normal);
        }
        for i in 0..SEGMENTS {
            let k = base + i * 2;
            self.indices.extend_from_slice(&[k, k + 2, k + 1, k + 1, k + 2, k + 3]);
        }
        // Cap the wide end facing -X.
        if r0 > 0.0 {
            let center = self.vertex(Vec3::new(x0, 0.0, 0.0), -Vec3::X);
            let ring = self.vertices.len() as u32;
            for i in 0..=SEGMENTS {
                let a = i as f32 / SEGMENTS as f32 * TAU;
                let (s, c) = a.sin_cos();
                self.vertex(Vec3::new(x0, c * r0, s * r0), -Vec3::X);
            }
            for i in 0..SEGMENTS {
                self.indices.extend_from_slice(&[center, ring + i + 1, ring + i]);
            }
        }
    }

    fn add_cube(&mut self, center: Vec3, half: f32) {
        for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
            for sign in [1.0f32, -1.0] {
                let n = axis * sign;
                let u = if axis == Vec3::X { Vec3::Y } else { Vec3::X };
                let v = n.cross(u);
                let base = self.vertices.len() as u32;
                for (du, dv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                    self.vertex(center + (n + u * du + v * dv) * half, n);
                }
                self.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
            }
        }
    }

    /// Shaft plus cone head.
    pub fn arrow() -> Self {
        let mut mesh = Self::default();
        mesh.add_frustum(0.0, 0.02, 0.8, 0.02);
        mesh.add_frustum(0.8, 0.07, 1.0, 0.0);
        mesh
    }

    /// Shaft ending in a cube.
    pub fn scale_handle() -> Self {
        let mut mesh = Self::default();
        mesh.add_frustum(0.0, 0.02, 0.9, 0.02);
        mesh.add_cube(Vec3::new(0.94, 0.0, 0.0), 0.06);
        mesh
    }

    /// A torus in the YZ plane: rotation about +X.
    pub fn ring() -> Self {
        const TUBE: f32 = 0.02;
        const TUBE_SEGMENTS: u32 = 8;
        let mut mesh = Self::default();
        for i in 0..=SEGMENTS * 4 {
            let a = i as f32 / (SEGMENTS * 4) as f32 * TAU;
            let (s, c) = a.sin_cos();
            let center = Vec3::new(0.0, c, s);
            for j in 0..=TUBE_SEGMENTS {
                let b = j as f32 / TUBE_SEGMENTS as f32 * TAU;
                let (bs, bc) = b.sin_cos();
                let normal = center * bc + Vec3::X * bs;
                mesh.vertex(center + normal * TUBE, normal);
            }
        }
        let stride = TUBE_SEGMENTS + 1;
        for i in 0..SEGMENTS * 4 {
            for j in 0..TUBE_SEGMENTS {
                let k = i * stride + j;
                mesh.indices
                    .extend_from_slice(&[k, k + stride, k + 1, k + 1, k + stride, k + stride + 1]);
            }
        }
        mesh
    }

    /// The handle geometry for `mode`.
    pub fn for_mode(mode: GizmoMode) -> Self {
        match mode {
            GizmoMode::Translate => Self::arrow(),
            GizmoMode::Rotate => Self::ring(),
            GizmoMode::Scale => Self::scale_handle(),
        }
    }
}

/// Rotation taking +X onto each world axis, as proper rotations (cyclic
/// permutations of the basis).
pub fn axis_basis(axis: usize) -> Mat4 {
    let (x, y, z) = match axis {
        0 => (Vec3::X, Vec3::Y, Vec3::Z),
        1 => (Vec3::Y, Vec3::Z, Vec3::X),
        _ => (Vec3::Z, Vec3::X, Vec3::Y),
    };
    Mat4::from_cols(x.extend(0.0), y.extend(0.0), z.extend(0.0), Vec4::W)
}

/// World-space handle length for a gizmo at `pivot`.
pub fn gizmo_scale(view: &ViewState, pivot: Vec3, ortho: bool) -> f32 {
    let scale = if ortho {
        let m00 = view.projection.cols[0].x;
        if m00.abs() > f32::EPSILON {
            2.0 / m00.abs() * GIZMO_SCREEN_FRACTION
        } else {
            1.0
        }
    } else {
        view.eye.distance(pivot) * GIZMO_SCREEN_FRACTION
    };
    scale.max(f32::EPSILON)
}

const AXIS_COLORS: [LinearRgba; 3] = [LinearRgba::RED, LinearRgba::GREEN, LinearRgba::BLUE];

#[derive(Debug)]
struct GpuGizmoMesh {
    vertex_buffer: OwnedBuffer,
    index_buffer: OwnedBuffer,
    index_count: u32,
}

fn upload(device: &Arc<dyn GraphicsDevice>, mode: GizmoMode) -> Result<GpuGizmoMesh, ResourceError> {
    let mesh = GizmoMesh::for_mode(mode);
    let vertex = device.create_buffer_with_data(
        &BufferDescriptor {
            label: Some(Cow::Owned(format!("Gizmo {mode:?} Vertices"))),
            size: (mesh.vertices.len() * size_of::<GizmoVertex>()) as u64,
            usage: BufferUsage::VERTEX,
            mapped_at_creation: false,
        },
        bytemuck::cast_slice(&mesh.vertices),
    )?;
    let vertex_buffer = OwnedBuffer::new(device.clone(), vertex);
    let index = device.create_buffer_with_data(
        &BufferDescriptor {
            label: Some(Cow::Owned(format!("Gizmo {mode:?} Indices"))),
            size: (mesh.indices.len() * size_of::<u32>()) as u64,
            usage: BufferUsage::INDEX,
            mapped_at_creation: false,
        },
        bytemuck::cast_slice(&mesh.indices),
    )?;
    Ok(GpuGizmoMesh {
        vertex_buffer,
        index_buffer: OwnedBuffer::new(device.clone(), index),
        index_count: mesh.indices.len() as u32,
    })
}

#[derive(Debug)]
struct GpuState {
    device: Arc<dyn GraphicsDevice>,
    camera_layout: OwnedBindGroupLayout,
    pipeline_layout: OwnedPipelineLayout,
    ring: DrawConstantRing,
    // Indexed like `GizmoMode` declaration order.
    meshes: [GpuGizmoMesh; 3],
    variant: u64,
    color_format: TextureFormat,
    _block_layout: OwnedBindGroupLayout,
}

fn mesh_index(mode: GizmoMode) -> usize {
    match mode {
        GizmoMode::Translate => 0,
        GizmoMode::Rotate => 1,
        GizmoMode::Scale => 2,
    }
}

/// Draws the three axis handles of the active gizmo mode on top of the
/// scene. Nothing is drawn without a selection.
#[derive(Debug, Default)]
pub struct GizmoLane {
    gpu: Option<GpuState>,
    pipeline: Option<OwnedRenderPipeline>,
    camera_group: SharedBindGroup,
    handles: Vec<DrawSlot>,
    mode: GizmoMode,
}

impl GizmoLane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles collected for the current viewport.
    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    fn build_pipeline(gpu: &GpuState, snapshot: &ShaderSnapshot) -> Result<OwnedRenderPipeline, RenderError> {
        let id = gpu.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(Cow::Borrowed("Gizmo Pipeline")),
            layout: Some(gpu.pipeline_layout.id()),
            shader_module: *snapshot.module(gpu.variant)?,
            vertex_entry: Cow::Borrowed("vs_main"),
            fragment_entry: Some(Cow::Borrowed("fs_main")),
            vertex_buffers: Cow::Owned(vec![VertexBufferLayout {
                array_stride: size_of::<GizmoVertex>() as u64,
                step_mode: VertexStepMode::Vertex,
                attributes: Cow::Borrowed(&VERTEX_ATTRIBUTES),
            }]),
            color_target: Some(ColorTargetState {
                format: gpu.color_format,
                blend: BlendMode::Opaque,
            }),
            primitive: PrimitiveState::default(),
            depth_stencil: Some(DepthStencilState::disabled(TextureFormat::Depth32Float)),
        })?;
        Ok(OwnedRenderPipeline::new(gpu.device.clone(), id))
    }

    fn create_gpu_state(resources: &GpuResourceManager, shaders: &ShaderLibrary) -> Result<GpuState, RenderError> {
        let device = resources.device().clone();
        let camera_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Gizmo Camera Layout"),
            entries: &[BindGroupLayoutEntry::uniform(0, ShaderStageFlags::VERTEX_FRAGMENT)],
        })?;
        let camera_layout = OwnedBindGroupLayout::new(device.clone(), camera_layout);
        let block_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Gizmo Block Layout"),
            entries: &[BindGroupLayoutEntry::dynamic_uniform(0, ShaderStageFlags::VERTEX_FRAGMENT)],
        })?;
        let block_layout = OwnedBindGroupLayout::new(device.clone(), block_layout);
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Gizmo Pipeline Layout"),
            bind_group_layouts: &[camera_layout.id(), block_layout.id()],
        })?;
        let pipeline_layout = OwnedPipelineLayout::new(device.clone(), pipeline_layout);

        Ok(GpuState {
            ring: DrawConstantRing::new(
                device.clone(),
                block_layout.id(),
                0,
                size_of::<GizmoBlock>() as u64,
                "Gizmo Constants",
            )?,
            meshes: [
                upload(&device, GizmoMode::Translate)?,
                upload(&device, GizmoMode::Rotate)?,
                upload(&device, GizmoMode::Scale)?,
            ],
            variant: shaders.register_variant(&VariantDesc::new(GIZMO_FILE, "fs_main"))?,
            color_format: resources
                .target_format(SCENE_COLOR)
                .unwrap_or_else(|| device.color_format()),
            _block_layout: block_layout,
            pipeline_layout,
            camera_layout,
            device,
        })
    }
}

impl RenderLane for GizmoLane {
    fn name(&self) -> &'static str {
        "GizmoLane"
    }

    fn on_gpu_init(&mut self, resources: &mut GpuResourceManager, shaders: &ShaderLibrary) -> Result<(), RenderError> {
        let gpu = Self::create_gpu_state(resources, shaders)?;
        self.pipeline = Some(Self::build_pipeline(&gpu, &shaders.snapshot())?);
        self.gpu = Some(gpu);
        log::info!("GizmoLane: initialized");
        Ok(())
    }

    fn on_shaders_changed(&mut self, shaders: &ShaderSnapshot) {
        let Some(gpu) = &self.gpu else {
            return;
        };
        match Self::build_pipeline(gpu, shaders) {
            Ok(pipeline) => self.pipeline = Some(pipeline),
            Err(e) => log::error!("GizmoLane: keeping previous pipeline: {e}"),
        }
    }

    fn prepare(&mut self, ctx: &mut FrameContext<'_>) -> Result<(), RenderError> {
        self.handles.clear();
        let Some(gpu) = self.gpu.as_mut() else {
            return Err(RenderError::NotInitialized);
        };
        let Some(selection) = ctx.scene.selection() else {
            return Ok(());
        };
        self.mode = ctx.scene.gizmo_mode();

        let pivot = selection.transform.translation();
        let ortho = ctx.viewport.camera.viewport_type().is_ortho();
        let scale = Mat4::from_scale(Vec3::splat(gizmo_scale(ctx.view, pivot, ortho)));
        let translation = Mat4::from_translation(pivot);
        let uuid_color = LinearRgba::from_object_id(selection.id);

        for (axis, color) in AXIS_COLORS.iter().enumerate() {
            let block = GizmoBlock {
                model: translation * axis_basis(axis) * scale,
                color: *color,
                uuid_color,
            };
            self.handles.push(gpu.ring.push(bytemuck::bytes_of(&block))?);
        }
        Ok(())
    }

    fn render(&mut self, ctx: &mut FrameContext<'_>, encoder: &mut dyn CommandEncoder) -> Result<(), RenderError> {
        let (Some(gpu), Some(pipeline)) = (&self.gpu, &self.pipeline) else {
            return Err(RenderError::NotInitialized);
        };
        if self.handles.is_empty() {
            return Ok(());
        }
        let resources = ctx.resources;
        let layout = gpu.camera_layout.id();
        let camera_group = self.camera_group.get_or_create(resources, &[CAMERA_CONSTANTS], || {
            let camera = require_buffer(resources, CAMERA_CONSTANTS)?;
            gpu.device
                .create_bind_group(&BindGroupDescriptor {
                    label: Some("Gizmo Camera Bind Group"),
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
        let mesh = &gpu.meshes[mesh_index(self.mode)];
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Gizmo Pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: depth,
                    depth_ops: Some(Operations::load()),
                }),
            });
            pass.set_viewport(&ctx.viewport.rect.to_gpu_viewport());
            pass.set_pipeline(pipeline.id_ref());
            pass.set_bind_group(0, camera_group, &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.id_ref(), 0);
            pass.set_index_buffer(mesh.index_buffer.id_ref(), 0, IndexFormat::Uint32);
            for slot in &self.handles {
                pass.set_bind_group(1, gpu.ring.bind_group(*slot), &[slot.offset]);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }
        ctx.stats.draw_calls += self.handles.len() as u32;
        Ok(())
    }

    fn clear(&mut self) {
        self.handles.clear();
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.ring.reset();
        }
    }

    fn is_ready(&self) -> bool {
        self.pipeline.is_some()
    }

    fn on_gpu_shutdown(&mut self) {
        self.handles.clear();
        self.camera_group.reset();
        self.pipeline = None;
        self.gpu = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{shader_library, shared_resources, Command, MockDevice, MockEncoder, TestFrame};
    use approx::assert_relative_eq;
    use prism_core::scene::{Scene, Selection};

    #[test]
    fn test_meshes_are_well_formed() {
        for mode in [GizmoMode::Translate, GizmoMode::Rotate, GizmoMode::Scale] {
            let mesh = GizmoMesh::for_mode(mode);
            assert!(!mesh.indices.is_empty());
            assert_eq!(mesh.indices.len() % 3, 0);
            assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
        }
        let arrow = GizmoMesh::arrow();
        let tip = arrow.vertices.iter().map(|v| v.position.x).fold(f32::MIN, f32::max);
        assert_relative_eq!(tip, 1.0);
    }

    #[test]
    fn test_axis_basis_maps_x_onto_each_axis() {
        for (axis, expected) in [Vec3::X, Vec3::Y, Vec3::Z].into_iter().enumerate() {
            let mapped = axis_basis(axis).transform_vector3(Vec3::X);
            assert_eq!(mapped, expected);
        }
    }

    #[test]
    fn test_scale_follows_eye_distance() {
        let frame = TestFrame::new(64, 64);
        let distance = frame.view.eye.length();
        assert_relative_eq!(
            gizmo_scale(&frame.view, Vec3::ZERO, false),
            distance * GIZMO_SCREEN_FRACTION,
            epsilon = 1e-4
        );
    }

    #[test]
    fn test_draws_three_handles_only_with_selection() {
        let device = Arc::new(MockDevice::default());
        let mut resources = shared_resources(&device, 64, 64);
        let mut lane = GizmoLane::new();
        lane.on_gpu_init(&mut resources, &shader_library(&device)).unwrap();

        let mut scene = Scene::new();
        let mut frame = TestFrame::new(64, 64);
        lane.prepare(&mut frame.ctx(&resources, &scene)).unwrap();
        assert_eq!(lane.handle_count(), 0);

        scene.set_selection(Some(Selection {
            id: 7,
            transform: Mat4::from_translation(Vec3::new(1.0, 2.0, 0.0)),
        }));
        scene.set_gizmo_mode(GizmoMode::Rotate);
        let mut encoder = MockEncoder::new(&device);
        device.take_commands();
        {
            let mut ctx = frame.ctx(&resources, &scene);
            lane.prepare(&mut ctx).unwrap();
            lane.render(&mut ctx, &mut encoder).unwrap();
        }
        let ring_indices = GizmoMesh::ring().indices.len() as u32;
        let draws: Vec<_> = device
            .take_commands()
            .into_iter()
            .filter(|c| matches!(c, Command::DrawIndexed { .. }))
            .collect();
        assert_eq!(draws, vec![Command::DrawIndexed { indices: 0..ring_indices }; 3]);
        assert_eq!(frame.stats.draw_calls, 3);
    }
}
