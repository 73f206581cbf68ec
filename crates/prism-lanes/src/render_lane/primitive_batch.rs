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

//! Debug primitives collected during a frame and rasterized by the line lane.
//!
//! Lanes that want something outlined (mesh bounds, light volumes) push it
//! here; the line lane turns the whole batch into one instanced line-list
//! draw. Every instance is one line segment, so the instance count is a pure
//! function of the primitive counts.

use prism_core::math::{degrees_to_radians, Aabb, LinearRgba, Mat4, Vec3};
use prism_core::renderer::{GpuBox, GpuCone, GpuObb, GpuSphere, GridConstants, PrimitiveCounts};

/// Segments used to approximate a cone's base circle.
pub const CONE_SEGMENTS: u32 = 32;
/// Segments per great circle of a sphere.
pub const SPHERE_SEGMENTS: u32 = 32;
/// The X, Y and Z axis lines always drawn at the grid origin.
pub const AXIS_LINES: u32 = 3;
/// Edges of a box.
pub const BOX_EDGES: u32 = 12;

/// Per-frame list of debug primitives.
#[derive(Debug, Default, Clone)]
pub struct PrimitiveBatch {
    boxes: Vec<GpuBox>,
    obbs: Vec<GpuObb>,
    cones: Vec<GpuCone>,
    spheres: Vec<GpuSphere>,
    grid: Option<GridConstants>,
}

impl PrimitiveBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outlines an axis-aligned box. Invalid boxes are ignored.
    pub fn add_aabb(&mut self, aabb: &Aabb, color: LinearRgba) {
        if !aabb.is_valid() {
            return;
        }
        self.boxes.push(GpuBox {
            min: aabb.min,
            _pad0: 0.0,
            max: aabb.max,
            _pad1: 0.0,
            color,
        });
    }

    /// Outlines the unit cube `[-1, 1]^3` transformed by `transform`.
    pub fn add_obb(&mut self, transform: Mat4, color: LinearRgba) {
        self.obbs.push(GpuObb { transform, color });
    }

    /// Outlines a cone from `apex` along `direction`, with the given height
    /// and half angle in degrees.
    pub fn add_cone(&mut self, apex: Vec3, direction: Vec3, height: f32, half_angle_degrees: f32, color: LinearRgba) {
        let direction = direction.normalize();
        let radius = height * degrees_to_radians(half_angle_degrees.clamp(0.0, 89.0)).tan();
        self.cones.push(GpuCone {
            apex,
            radius,
            base_center: apex + direction * height,
            height,
            color,
        });
    }

    /// Outlines a sphere with three great circles.
    pub fn add_sphere(&mut self, center: Vec3, radius: f32, color: LinearRgba) {
        self.spheres.push(GpuSphere { center, radius, color });
    }

    /// Sets the reference grid: `line_count` lines along each of X and Y.
    pub fn set_grid(&mut self, origin: Vec3, spacing: f32, line_count: u32, color: LinearRgba) {
        self.grid = Some(GridConstants {
            origin,
            spacing: spacing.max(f32::EPSILON),
            color,
            line_count,
            _pad: [0; 3],
        });
    }

    pub fn grid(&self) -> Option<&GridConstants> {
        self.grid.as_ref()
    }

    pub fn boxes(&self) -> &[GpuBox] {
        &self.boxes
    }

    pub fn obbs(&self) -> &[GpuObb] {
        &self.obbs
    }

    pub fn cones(&self) -> &[GpuCone] {
        &self.cones
    }

    pub fn spheres(&self) -> &[GpuSphere] {
        &self.spheres
    }

    /// Counts as laid out for the line shader.
    pub fn counts(&self) -> PrimitiveCounts {
        PrimitiveCounts {
            boxes: self.boxes.len() as u32,
            cones: self.cones.len() as u32,
            obbs: self.obbs.len() as u32,
            spheres: self.spheres.len() as u32,
            grid_lines: self.grid.map_or(0, |g| g.line_count * 2),
            cone_segments: CONE_SEGMENTS,
            sphere_segments: SPHERE_SEGMENTS,
            _pad: 0,
        }
    }

    /// Line segments needed to draw the batch, axis lines included.
    pub fn instance_count(&self) -> u32 {
        let c = self.counts();
        c.grid_lines
            + AXIS_LINES
            + c.boxes * BOX_EDGES
            + c.cones * 2 * c.cone_segments
            + c.obbs * BOX_EDGES
            + c.spheres * 3 * c.sphere_segments
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
            && self.obbs.is_empty()
            && self.cones.is_empty()
            && self.spheres.is_empty()
            && self.grid.is_none()
    }

    /// Drops everything. Called once the line lane has drawn the batch.
    pub fn clear(&mut self) {
        self.boxes.clear();
        self.obbs.clear();
        self.cones.clear();
        self.spheres.clear();
        self.grid = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_instance_count_formula() {
        let mut batch = PrimitiveBatch::new();
        assert_eq!(batch.instance_count(), AXIS_LINES);

        batch.set_grid(Vec3::ZERO, 10.0, 100, LinearRgba::WHITE);
        batch.add_aabb(&Aabb::from_min_max(Vec3::ZERO, Vec3::ONE), LinearRgba::RED);
        batch.add_aabb(&Aabb::from_min_max(Vec3::ZERO, Vec3::ONE), LinearRgba::RED);
        batch.add_cone(Vec3::ZERO, Vec3::X, 5.0, 30.0, LinearRgba::GREEN);
        batch.add_obb(Mat4::IDENTITY, LinearRgba::BLUE);
        batch.add_sphere(Vec3::ZERO, 2.0, LinearRgba::WHITE);

        let expected = 200 + 3 + 2 * 12 + 2 * 32 + 12 + 3 * 32;
        assert_eq!(batch.instance_count(), expected);
    }

    #[test]
    fn test_invalid_aabb_is_skipped() {
        let mut batch = PrimitiveBatch::new();
        batch.add_aabb(&Aabb::INVALID, LinearRgba::RED);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_cone_geometry() {
        let mut batch = PrimitiveBatch::new();
        batch.add_cone(Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0), 10.0, 45.0, LinearRgba::WHITE);
        let cone = batch.cones()[0];
        assert_relative_eq!(cone.radius, 10.0, epsilon = 1e-4);
        assert_eq!(cone.base_center, Vec3::new(0.0, 0.0, 10.0));
    }

    #[test]
    fn test_clear_resets_grid() {
        let mut batch = PrimitiveBatch::new();
        batch.set_grid(Vec3::ZERO, 1.0, 4, LinearRgba::WHITE);
        assert_eq!(batch.counts().grid_lines, 8);
        batch.clear();
        assert!(batch.is_empty());
        assert_eq!(batch.counts().grid_lines, 0);
    }
}
