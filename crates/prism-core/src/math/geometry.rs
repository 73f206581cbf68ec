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

//! Bounding volumes, rays, planes and view frustums.
//!
//! These are used for picking (ray casts against bounding boxes) and for
//! per-object visibility culling against the active camera frustum.

use super::{Mat4, Vec3, EPSILON};

/// Directions closer to zero than this are treated as parallel to a slab.
const RAY_PARALLEL_EPSILON: f32 = 1e-6;

/// An axis-aligned bounding box defined by its minimum and maximum corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// The corner of the box with the smallest coordinates on all axes.
    pub min: Vec3,
    /// The corner of the box with the largest coordinates on all axes.
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5))
    }
}

impl Aabb {
    /// An empty box; merging anything with it yields the other operand.
    pub const INVALID: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Creates a box from two opposite corners, in any order.
    #[inline]
    pub fn from_min_max(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Creates a box from its center and half-extents.
    #[inline]
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        let half_extents = half_extents.abs();
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// The center point of the box.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// The distance from the center to each face.
    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Whether `min <= max` on every axis.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Returns the smallest box enclosing both boxes.
    #[inline]
    pub fn merge(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Whether the point lies inside or on the box.
    #[inline]
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Re-projects the box through an affine world matrix.
    ///
    /// The center is transformed as a point and the new half-extents are the
    /// local half-extents weighted by the absolute value of each basis vector,
    /// so the result always encloses the rotated box.
    pub fn transform_world(&self, world: &Mat4) -> Self {
        let center = world.transform_point3(self.center());
        let he = self.half_extents();
        let basis_x = world.cols[0].truncate().abs();
        let basis_y = world.cols[1].truncate().abs();
        let basis_z = world.cols[2].truncate().abs();
        let extents = basis_x * he.x + basis_y * he.y + basis_z * he.z;
        Self::from_center_half_extents(center, extents)
    }

    /// Slab test against a ray.
    ///
    /// # Returns
    ///
    /// The distance along the ray to the entry point (`0.0` when the origin is
    /// inside the box), or `None` if the ray misses or the box is behind it.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let dir = ray.direction[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if dir.abs() < RAY_PARALLEL_EPSILON {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / dir;
            let mut t1 = (lo - origin) * inv;
            let mut t2 = (hi - origin) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return None;
            }
        }

        if t_max < 0.0 {
            return None;
        }
        Some(t_min.max(0.0))
    }

    /// Conservative frustum test using the box's bounding sphere.
    ///
    /// The box is rejected only when its bounding sphere lies entirely on
    /// the outer side of at least one plane.
    pub fn intersects_frustum(&self, frustum: &Frustum) -> bool {
        let center = self.center();
        let radius = self.half_extents().length();
        frustum.intersects_sphere(center, radius)
    }
}

/// A half-line used for picking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// The starting point of the ray.
    pub origin: Vec3,
    /// The unit direction of the ray.
    pub direction: Vec3,
}

impl Ray {
    /// Creates a ray, normalizing the direction.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// The point at distance `t` along the ray.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// A plane `dot(normal, p) + d = 0`; points with a non-negative signed
/// distance are on the inner side.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Plane {
    /// The unit normal of the plane.
    pub normal: Vec3,
    /// The signed offset of the plane from the origin.
    pub d: f32,
}

impl Plane {
    /// Builds a plane through three points. The normal follows the winding
    /// `(b - a) x (c - a)`.
    pub fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Self {
        let normal = (b - a).cross(c - a).normalize();
        Self {
            normal,
            d: -normal.dot(a),
        }
    }

    /// Returns the plane with its orientation reversed.
    #[inline]
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            d: -self.d,
        }
    }

    /// Signed distance from the plane to `p`.
    #[inline]
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) + self.d
    }
}

/// The six half-spaces bounding a camera's visible volume.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Frustum {
    /// Planes in the order left, right, bottom, top, near, far.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Index of the left plane in [`Frustum::planes`].
    pub const LEFT: usize = 0;
    /// Index of the right plane.
    pub const RIGHT: usize = 1;
    /// Index of the bottom plane.
    pub const BOTTOM: usize = 2;
    /// Index of the top plane.
    pub const TOP: usize = 3;
    /// Index of the near plane.
    pub const NEAR: usize = 4;
    /// Index of the far plane.
    pub const FAR: usize = 5;

    /// Builds the frustum from its eight corners.
    ///
    /// Corners are given as `[top_left, top_right, bottom_left, bottom_right]`
    /// for the near and the far rectangle. Each plane is built from three
    /// corners and then oriented so its normal points into the volume.
    pub fn from_corners(near: [Vec3; 4], far: [Vec3; 4]) -> Self {
        let [ntl, ntr, nbl, nbr] = near;
        let [ftl, ftr, fbl, fbr] = far;

        let mut centroid = Vec3::ZERO;
        for p in near.iter().chain(far.iter()) {
            centroid += *p;
        }
        let centroid = centroid / 8.0;

        let inward = |plane: Plane| {
            if plane.signed_distance(centroid) < 0.0 {
                plane.flipped()
            } else {
                plane
            }
        };

        Self {
            planes: [
                inward(Plane::from_points(ntl, nbl, fbl)),
                inward(Plane::from_points(ntr, fbr, nbr)),
                inward(Plane::from_points(nbl, nbr, fbr)),
                inward(Plane::from_points(ntl, ftl, ftr)),
                inward(Plane::from_points(ntl, ntr, nbr)),
                inward(Plane::from_points(ftl, fbl, fbr)),
            ],
        }
    }

    /// Builds a perspective frustum from a camera basis and lens parameters.
    #[allow(clippy::too_many_arguments)]
    pub fn from_perspective(
        eye: Vec3,
        forward: Vec3,
        right: Vec3,
        up: Vec3,
        fov_y_radians: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let tan_half = (fov_y_radians * 0.5).tan();
        let rect = |dist: f32| {
            let half_h = tan_half * dist;
            let half_w = half_h * aspect;
            Self::rectangle(eye + forward * dist, right, up, half_w, half_h)
        };
        Self::from_corners(rect(near), rect(far))
    }

    /// Builds an orthographic frustum (a box) from a camera basis.
    #[allow(clippy::too_many_arguments)]
    pub fn from_orthographic(
        eye: Vec3,
        forward: Vec3,
        right: Vec3,
        up: Vec3,
        width: f32,
        height: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let (half_w, half_h) = ((width * 0.5).max(EPSILON), (height * 0.5).max(EPSILON));
        Self::from_corners(
            Self::rectangle(eye + forward * near, right, up, half_w, half_h),
            Self::rectangle(eye + forward * far, right, up, half_w, half_h),
        )
    }

    fn rectangle(center: Vec3, right: Vec3, up: Vec3, half_w: f32, half_h: f32) -> [Vec3; 4] {
        let (r, u) = (right * half_w, up * half_h);
        [center + u - r, center + u + r, center - u - r, center - u + r]
    }

    /// Whether the point lies inside or on every plane.
    pub fn contains_point(&self, p: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.signed_distance(p) >= 0.0)
    }

    /// Whether a sphere touches the volume.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(center) >= -radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{degrees_to_radians, Quaternion};
    use approx::assert_relative_eq;

    fn test_frustum() -> Frustum {
        Frustum::from_perspective(
            Vec3::new(-20.0, 0.0, 0.0),
            Vec3::X,
            Vec3::Y,
            Vec3::Z,
            degrees_to_radians(60.0),
            16.0 / 9.0,
            0.1,
            1000.0,
        )
    }

    #[test]
    fn ray_aimed_at_center_hits_with_positive_distance() {
        let aabb = Aabb::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0));
        let ray = Ray::new(Vec3::new(-10.0, 0.0, 0.0), Vec3::X);
        let t = aabb.intersect_ray(&ray).expect("ray should hit");
        assert!(t > 0.0);
        assert_relative_eq!(t, 9.0, epsilon = 1e-5);
    }

    #[test]
    fn ray_aimed_away_misses() {
        let aabb = Aabb::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0));
        let ray = Ray::new(Vec3::new(-10.0, 0.0, 0.0), -Vec3::X);
        assert!(aabb.intersect_ray(&ray).is_none());
        let parallel = Ray::new(Vec3::new(-10.0, 5.0, 0.0), Vec3::X);
        assert!(aabb.intersect_ray(&parallel).is_none());
    }

    #[test]
    fn ray_from_inside_reports_zero() {
        let aabb = Aabb::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0));
        let ray = Ray::new(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(aabb.intersect_ray(&ray), Some(0.0));
    }

    #[test]
    fn transform_world_encloses_rotated_box() {
        let aabb = Aabb::from_min_max(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let world = Mat4::from_scale_rotation_translation(
            Vec3::ONE,
            Quaternion::from_axis_angle(Vec3::Z, degrees_to_radians(45.0)),
            Vec3::new(5.0, 0.0, 0.0),
        );
        let moved = aabb.transform_world(&world);
        assert_relative_eq!(moved.center().x, 5.0, epsilon = 1e-5);
        assert_relative_eq!(moved.half_extents().x, 2.0_f32.sqrt(), epsilon = 1e-5);
        assert_relative_eq!(moved.half_extents().z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn frustum_planes_face_inward() {
        let frustum = test_frustum();
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, 0.0)));
        // Eye sits behind the near plane.
        assert!(frustum.planes[Frustum::NEAR].signed_distance(Vec3::new(-20.0, 0.0, 0.0)) <= 0.0);
        // One unit past the far plane.
        assert!(frustum.planes[Frustum::FAR].signed_distance(Vec3::new(981.0, 0.0, 0.0)) < 0.0);
        assert!(!frustum.contains_point(Vec3::new(0.0, 500.0, 0.0)));
    }

    #[test]
    fn aabb_frustum_test_accepts_inside_and_rejects_far_outside() {
        let frustum = test_frustum();
        let local = Aabb::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0));
        let inside = local.transform_world(&Mat4::IDENTITY);
        assert!(inside.intersects_frustum(&frustum));

        let outside = local.transform_world(&Mat4::from_translation(Vec3::new(-5000.0, 5000.0, 5000.0)));
        assert!(!outside.intersects_frustum(&frustum));
    }

    #[test]
    fn orthographic_frustum_is_a_box() {
        let frustum = Frustum::from_orthographic(
            Vec3::new(0.0, 0.0, 100.0),
            -Vec3::Z,
            Vec3::Y,
            Vec3::X,
            20.0,
            10.0,
            0.1,
            200.0,
        );
        assert!(frustum.contains_point(Vec3::new(4.0, 9.0, 0.0)));
        assert!(!frustum.contains_point(Vec3::new(6.0, 0.0, 0.0)));
    }
}
