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

//! The scene collaborator interface consumed by the render passes.
//!
//! Passes never walk an object model. They read flat instance lists through
//! [`SceneSource`], filter them by the active world, and resolve mesh and
//! texture payloads by handle. [`Scene`] is a plain in-memory implementation
//! used by hosts that do not bring their own object model, and by tests.

use crate::math::{Aabb, LinearRgba, Mat4, Vec2, Vec3};
use crate::renderer::constants::MaterialConstants;
use crate::renderer::light::{LightKind, LightParams};
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifies a world (level) inside the editor. Only instances of the
/// active world are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WorldId(pub u32);

/// Handle to mesh geometry owned by the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u32);

/// Handle to an RGBA8 texture owned by the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

/// The vertex layout of static meshes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct StaticVertex {
    /// Object-space position.
    pub position: Vec3,
    /// Object-space normal.
    pub normal: Vec3,
    /// Vertex color.
    pub color: LinearRgba,
    /// Texture coordinate.
    pub uv: Vec2,
}

impl StaticVertex {
    /// Creates a white vertex.
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            normal,
            color: LinearRgba::WHITE,
            uv,
        }
    }
}

/// Indexed triangle geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Vertices.
    pub vertices: Vec<StaticVertex>,
    /// Triangle list indices.
    pub indices: Vec<u32>,
}

impl MeshData {
    /// The object-space bounds of the vertices, or [`Aabb::INVALID`] when
    /// the mesh is empty.
    pub fn bounds(&self) -> Aabb {
        self.vertices
            .iter()
            .fold(Aabb::INVALID, |acc, v| acc.merge(&Aabb::from_min_max(v.position, v.position)))
    }
}

/// Tightly packed RGBA8 pixels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextureData {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// A 1x1 opaque white texture.
    pub fn white() -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: vec![255; 4],
        }
    }

    /// Whether the pixel buffer matches the dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0 && self.height > 0 && self.pixels.len() == (self.width * self.height * 4) as usize
    }
}

/// A contiguous index range drawn with its own material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialSubset {
    /// First index of the range.
    pub index_start: u32,
    /// Number of indices.
    pub index_count: u32,
    /// Surface parameters.
    pub material: MaterialConstants,
    /// Diffuse texture; white when absent.
    pub texture: Option<TextureHandle>,
    /// Texture coordinate offset added before sampling.
    pub uv_offset: Vec2,
}

/// A renderable static mesh placed in a world.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshInstance {
    /// Object id, encoded into the picking color.
    pub id: u32,
    /// Owning world.
    pub world: WorldId,
    /// Object to world.
    pub transform: Mat4,
    /// Object-space bounds.
    pub bounds: Aabb,
    /// Geometry.
    pub mesh: MeshHandle,
    /// Material subsets. Empty means one draw over all indices with the
    /// default material.
    pub subsets: Vec<MaterialSubset>,
    /// Index of the highlighted subset, if any.
    pub selected_sub_mesh: Option<usize>,
    /// Whether the object is selected in the editor.
    pub is_selected: bool,
    /// Meshes owned by the gizmo are drawn by the gizmo pass only.
    pub is_gizmo: bool,
}

impl MeshInstance {
    /// World-space bounds.
    pub fn world_bounds(&self) -> Aabb {
        self.bounds.transform_world(&self.transform)
    }
}

/// A light placed in a world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightInstance {
    /// Object id.
    pub id: u32,
    /// Owning world.
    pub world: WorldId,
    /// Point, spot or directional.
    pub kind: LightKind,
    /// Object to world; the light shines along the transformed +X axis.
    pub transform: Mat4,
    /// Light parameters.
    pub params: LightParams,
}

impl LightInstance {
    /// World-space position.
    pub fn position(&self) -> Vec3 {
        self.transform.translation()
    }

    /// World-space forward vector, normalized.
    pub fn direction(&self) -> Vec3 {
        self.transform.transform_vector3(Vec3::X).normalize()
    }
}

/// What a billboard shows.
#[derive(Debug, Clone, PartialEq)]
pub enum BillboardKind {
    /// One cell of an icon atlas.
    Icon {
        /// Atlas column.
        cell_u: u32,
        /// Atlas row.
        cell_v: u32,
        /// Atlas columns.
        columns: u32,
        /// Atlas rows.
        rows: u32,
    },
    /// A string rendered from a glyph atlas laid out in ASCII order.
    Text {
        /// The text.
        text: String,
        /// Glyph atlas columns.
        columns: u32,
        /// Glyph atlas rows.
        rows: u32,
    },
    /// A flip-book particle animated through the atlas cells.
    SubUv {
        /// Current frame; wraps over the cell count.
        frame: u32,
        /// Atlas columns.
        columns: u32,
        /// Atlas rows.
        rows: u32,
    },
}

/// A camera-facing quad placed in a world.
#[derive(Debug, Clone, PartialEq)]
pub struct BillboardInstance {
    /// Object id.
    pub id: u32,
    /// Owning world.
    pub world: WorldId,
    /// Object to world; only the translation and scale are used.
    pub transform: Mat4,
    /// Atlas texture.
    pub texture: Option<TextureHandle>,
    /// What to show.
    pub kind: BillboardKind,
    /// Quad (or glyph) size in world units.
    pub size: Vec2,
    /// Multiplied into the sampled color.
    pub tint: LinearRgba,
}

impl BillboardInstance {
    /// Object-space bounds of the camera-facing quad, sized for any
    /// orientation.
    pub fn bounds(&self) -> Aabb {
        let extent = match &self.kind {
            BillboardKind::Text { text, .. } => self.size.x * text.chars().count().max(1) as f32,
            _ => self.size.x.max(self.size.y),
        };
        Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(extent * 0.5))
    }

    /// World-space bounds.
    pub fn world_bounds(&self) -> Aabb {
        self.bounds().transform_world(&self.transform)
    }
}

/// The active manipulation handle set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GizmoMode {
    /// Axis arrows.
    #[default]
    Translate,
    /// Axis rings.
    Rotate,
    /// Axis handles ending in cubes.
    Scale,
}

/// The object the gizmo is attached to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    /// Selected object id.
    pub id: u32,
    /// Its world transform; the gizmo sits at its translation.
    pub transform: Mat4,
}

/// Read access to the scene for one frame.
pub trait SceneSource {
    /// The world whose instances are rendered.
    fn active_world(&self) -> WorldId;

    /// Every mesh instance, of every world.
    fn mesh_instances(&self) -> &[MeshInstance];

    /// Every light instance, of every world.
    fn light_instances(&self) -> &[LightInstance];

    /// Every billboard instance, of every world.
    fn billboard_instances(&self) -> &[BillboardInstance];

    /// Resolves mesh geometry.
    fn mesh_data(&self, handle: MeshHandle) -> Option<&MeshData>;

    /// Resolves texture pixels.
    fn texture_data(&self, handle: TextureHandle) -> Option<&TextureData>;

    /// The current selection, if any.
    fn selection(&self) -> Option<Selection>;

    /// The current gizmo mode.
    fn gizmo_mode(&self) -> GizmoMode;
}

/// An in-memory [`SceneSource`].
#[derive(Debug, Default)]
pub struct Scene {
    active_world: WorldId,
    meshes: Vec<MeshInstance>,
    lights: Vec<LightInstance>,
    billboards: Vec<BillboardInstance>,
    mesh_data: HashMap<MeshHandle, MeshData>,
    texture_data: HashMap<TextureHandle, TextureData>,
    selection: Option<Selection>,
    gizmo_mode: GizmoMode,
    next_handle: u32,
}

impl Scene {
    /// Creates an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes the rendered world.
    pub fn set_active_world(&mut self, world: WorldId) {
        self.active_world = world;
    }

    fn allocate_handle(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    /// Stores geometry and returns its handle.
    pub fn add_mesh_data(&mut self, data: MeshData) -> MeshHandle {
        let handle = MeshHandle(self.allocate_handle());
        self.mesh_data.insert(handle, data);
        handle
    }

    /// Stores a texture and returns its handle.
    pub fn add_texture(&mut self, data: TextureData) -> TextureHandle {
        let handle = TextureHandle(self.allocate_handle());
        self.texture_data.insert(handle, data);
        handle
    }

    /// Adds a mesh instance.
    pub fn add_mesh(&mut self, instance: MeshInstance) {
        self.meshes.push(instance);
    }

    /// Adds a light instance.
    pub fn add_light(&mut self, instance: LightInstance) {
        self.lights.push(instance);
    }

    /// Adds a billboard instance.
    pub fn add_billboard(&mut self, instance: BillboardInstance) {
        self.billboards.push(instance);
    }

    /// Mutable access to the lights.
    pub fn lights_mut(&mut self) -> &mut Vec<LightInstance> {
        &mut self.lights
    }

    /// Mutable access to the meshes.
    pub fn meshes_mut(&mut self) -> &mut Vec<MeshInstance> {
        &mut self.meshes
    }

    /// Selects an object, or clears the selection.
    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.selection = selection;
    }

    /// Changes the gizmo mode.
    pub fn set_gizmo_mode(&mut self, mode: GizmoMode) {
        self.gizmo_mode = mode;
    }
}

impl SceneSource for Scene {
    fn active_world(&self) -> WorldId {
        self.active_world
    }

    fn mesh_instances(&self) -> &[MeshInstance] {
        &self.meshes
    }

    fn light_instances(&self) -> &[LightInstance] {
        &self.lights
    }

    fn billboard_instances(&self) -> &[BillboardInstance] {
        &self.billboards
    }

    fn mesh_data(&self, handle: MeshHandle) -> Option<&MeshData> {
        self.mesh_data.get(&handle)
    }

    fn texture_data(&self, handle: TextureHandle) -> Option<&TextureData> {
        self.texture_data.get(&handle)
    }

    fn selection(&self) -> Option<Selection> {
        self.selection
    }

    fn gizmo_mode(&self) -> GizmoMode {
        self.gizmo_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout() {
        assert_eq!(std::mem::size_of::<StaticVertex>(), 48);
    }

    #[test]
    fn test_mesh_bounds() {
        let data = MeshData {
            vertices: vec![
                StaticVertex::new(Vec3::new(-1.0, 0.0, 2.0), Vec3::Z, Vec2::ZERO),
                StaticVertex::new(Vec3::new(3.0, -2.0, 0.0), Vec3::Z, Vec2::ONE),
            ],
            indices: vec![0, 1, 0],
        };
        let bounds = data.bounds();
        assert_eq!(bounds.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(3.0, 0.0, 2.0));
        assert!(!MeshData::default().bounds().is_valid());
    }

    #[test]
    fn test_light_direction_follows_transform() {
        let light = LightInstance {
            id: 1,
            world: WorldId(0),
            kind: LightKind::Directional,
            transform: Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            params: LightParams::default(),
        };
        assert_eq!(light.position(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(light.direction(), Vec3::X);
    }

    #[test]
    fn test_text_billboard_bounds_grow_with_length() {
        let mut billboard = BillboardInstance {
            id: 7,
            world: WorldId(0),
            transform: Mat4::IDENTITY,
            texture: None,
            kind: BillboardKind::Text {
                text: "ab".to_string(),
                columns: 16,
                rows: 16,
            },
            size: Vec2::new(0.5, 0.5),
            tint: LinearRgba::WHITE,
        };
        let short = billboard.bounds().half_extents().x;
        billboard.kind = BillboardKind::Text {
            text: "abcd".to_string(),
            columns: 16,
            rows: 16,
        };
        assert!(billboard.bounds().half_extents().x > short);
    }

    #[test]
    fn test_scene_handles_are_distinct() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh_data(MeshData::default());
        let texture = scene.add_texture(TextureData::white());
        assert_ne!(mesh.0, texture.0);
        assert!(scene.mesh_data(mesh).is_some());
        assert!(scene.texture_data(texture).is_some_and(TextureData::is_well_formed));
        assert!(scene.selection().is_none());
    }
}
