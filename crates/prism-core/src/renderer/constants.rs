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

//! Per-draw and per-frame constant block layouts.
//!
//! Each struct mirrors a WGSL uniform or storage struct. All of them are
//! `#[repr(C)]`, padded by hand to 16-byte rows, and `Pod` so they can be
//! uploaded with `bytemuck::bytes_of`.

use crate::math::{LinearRgba, Mat4, Vec2, Vec3};
use bytemuck::{Pod, Zeroable};

/// Constants for one object draw.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PerObjectConstants {
    /// Model (object to world) matrix.
    pub model: Mat4,
    /// Inverse transpose of the model matrix, for normals.
    pub normal_matrix: Mat4,
    /// Object id encoded as a color, written to the picking target.
    pub uuid_color: LinearRgba,
    /// Non-zero when the object is selected.
    pub is_selected: u32,
    /// Padding.
    pub _pad: [u32; 3],
}

impl PerObjectConstants {
    /// Builds the constants for a model matrix.
    pub fn new(model: Mat4, uuid: u32, is_selected: bool) -> Self {
        Self {
            model,
            normal_matrix: model.normal_matrix(),
            uuid_color: LinearRgba::from_object_id(uuid),
            is_selected: u32::from(is_selected),
            _pad: [0; 3],
        }
    }
}

/// Camera matrices shared by every pass of a viewport.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraConstants {
    /// World to view.
    pub view: Mat4,
    /// View to clip.
    pub projection: Mat4,
    /// Clip to view.
    pub inv_projection: Mat4,
    /// World-space eye position.
    pub position: Vec3,
    /// Padding.
    pub _pad0: f32,
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
    /// Padding.
    pub _pad1: [f32; 2],
}

impl CameraConstants {
    /// Builds the block, deriving the inverse projection.
    pub fn new(view: Mat4, projection: Mat4, position: Vec3, near: f32, far: f32) -> Self {
        Self {
            view,
            projection,
            inv_projection: projection.inverse().unwrap_or(Mat4::IDENTITY),
            position,
            _pad0: 0.0,
            near,
            far,
            _pad1: [0.0; 2],
        }
    }
}

/// Viewport placement inside the full render target.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ScreenConstants {
    /// Full target size in pixels.
    pub screen_size: [u32; 2],
    /// Viewport origin as a fraction of the target (x / sw, y / sh).
    pub uv_offset: Vec2,
    /// Viewport size as a fraction of the target (w / sw, h / sh).
    pub uv_scale: Vec2,
    /// Tile grid dimensions for the light culling buffers.
    pub tile_count: [u32; 2],
}

/// Surface parameters of one material subset.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialConstants {
    /// Diffuse color.
    pub diffuse: Vec3,
    /// Transparency scalar.
    pub transparency: f32,
    /// Ambient color.
    pub ambient: Vec3,
    /// Density scalar.
    pub density: f32,
    /// Specular color.
    pub specular: Vec3,
    /// Specular exponent.
    pub specular_scalar: f32,
    /// Emissive color.
    pub emissive: Vec3,
    /// Padding.
    pub _pad: f32,
}

impl Default for MaterialConstants {
    fn default() -> Self {
        Self {
            diffuse: Vec3::splat(0.7),
            transparency: 0.0,
            ambient: Vec3::splat(0.2),
            density: 1.0,
            specular: Vec3::splat(0.5),
            specular_scalar: 32.0,
            emissive: Vec3::ZERO,
            _pad: 0.0,
        }
    }
}

/// Flags a sub-mesh as the selected one.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct SubMeshConstants {
    /// 1.0 for the selected sub-mesh.
    pub is_selected_sub_mesh: f32,
    /// Padding.
    pub _pad: [f32; 3],
}

/// Texture coordinate scrolling.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct TextureConstants {
    /// U offset.
    pub u_offset: f32,
    /// V offset.
    pub v_offset: f32,
    /// Padding.
    pub _pad: [f32; 2],
}

/// Atlas window and tint for billboards.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SubUvConstants {
    /// Top-left UV of the atlas cell.
    pub uv_offset: Vec2,
    /// UV size of the atlas cell.
    pub uv_scale: Vec2,
    /// Multiplied into the sampled color.
    pub tint: LinearRgba,
}

impl Default for SubUvConstants {
    fn default() -> Self {
        Self {
            uv_offset: Vec2::ZERO,
            uv_scale: Vec2::ONE,
            tint: LinearRgba::WHITE,
        }
    }
}

/// Height fog parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FogConstants {
    /// Clip to world, used to rebuild positions from depth.
    pub inv_view_proj: Mat4,
    /// Fog color; alpha is ignored.
    pub color: LinearRgba,
    /// World-space eye position.
    pub camera_pos: Vec3,
    /// Base density.
    pub density: f32,
    /// Exponential falloff with height.
    pub height_falloff: f32,
    /// Distance where fog starts.
    pub start_distance: f32,
    /// Distance beyond which no fog is applied.
    pub cutoff_distance: f32,
    /// Upper bound of the fog opacity.
    pub max_opacity: f32,
    /// World position of the fog volume's base.
    pub fog_position: Vec3,
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
    /// Padding.
    pub _pad: [f32; 3],
}

/// Grid placement for the line pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GridConstants {
    /// Grid center.
    pub origin: Vec3,
    /// Distance between two lines.
    pub spacing: f32,
    /// Line color.
    pub color: LinearRgba,
    /// Lines along each axis.
    pub line_count: u32,
    /// Padding.
    pub _pad: [u32; 3],
}

/// Instance counts of the primitive batch, read by the line vertex shader to
/// map an instance index to a primitive.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct PrimitiveCounts {
    /// Axis-aligned boxes.
    pub boxes: u32,
    /// Cones.
    pub cones: u32,
    /// Oriented boxes.
    pub obbs: u32,
    /// Spheres.
    pub spheres: u32,
    /// Grid lines (both axes).
    pub grid_lines: u32,
    /// Segments per cone circle.
    pub cone_segments: u32,
    /// Segments per sphere circle.
    pub sphere_segments: u32,
    /// Padding.
    pub _pad: u32,
}

/// One debug axis-aligned box.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuBox {
    /// Minimum corner.
    pub min: Vec3,
    /// Padding.
    pub _pad0: f32,
    /// Maximum corner.
    pub max: Vec3,
    /// Padding.
    pub _pad1: f32,
    /// Line color.
    pub color: LinearRgba,
}

/// One debug oriented box: a unit cube transformed by `transform`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuObb {
    /// Unit cube to world.
    pub transform: Mat4,
    /// Line color.
    pub color: LinearRgba,
}

/// One debug cone.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuCone {
    /// Tip of the cone.
    pub apex: Vec3,
    /// Radius of the base circle.
    pub radius: f32,
    /// Center of the base circle.
    pub base_center: Vec3,
    /// Apex to base distance.
    pub height: f32,
    /// Line color.
    pub color: LinearRgba,
}

/// One debug sphere, drawn as three great circles.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuSphere {
    /// Center.
    pub center: Vec3,
    /// Radius.
    pub radius: f32,
    /// Line color.
    pub color: LinearRgba,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_blocks_are_row_aligned() {
        assert_eq!(size_of::<PerObjectConstants>(), 160);
        assert_eq!(size_of::<CameraConstants>(), 224);
        assert_eq!(size_of::<ScreenConstants>(), 32);
        assert_eq!(size_of::<MaterialConstants>(), 64);
        assert_eq!(size_of::<FogConstants>(), 144);
        for size in [
            size_of::<SubMeshConstants>(),
            size_of::<TextureConstants>(),
            size_of::<SubUvConstants>(),
            size_of::<GridConstants>(),
            size_of::<PrimitiveCounts>(),
            size_of::<GpuBox>(),
            size_of::<GpuObb>(),
            size_of::<GpuCone>(),
            size_of::<GpuSphere>(),
        ] {
            assert_eq!(size % 16, 0);
        }
    }

    #[test]
    fn test_per_object_flags() {
        let c = PerObjectConstants::new(Mat4::IDENTITY, 0xFF, true);
        assert_eq!(c.is_selected, 1);
        assert_eq!(c.uuid_color.r, 1.0);
        assert_eq!(c.normal_matrix, Mat4::IDENTITY);
    }

    #[test]
    fn test_camera_inverse_projection() {
        let proj = Mat4::perspective_lh_zo(1.0, 1.5, 0.1, 100.0);
        let c = CameraConstants::new(Mat4::IDENTITY, proj, Vec3::ZERO, 0.1, 100.0);
        let roundtrip = proj * c.inv_projection;
        for (i, col) in roundtrip.cols.iter().enumerate() {
            for j in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((col[j] - expected).abs() < 1e-4);
            }
        }
    }
}
