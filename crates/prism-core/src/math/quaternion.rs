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

//! Unit quaternions for 3D rotations.

use super::{degrees_to_radians, Vec3, EPSILON};
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// A rotation stored as `(x, y, z, w)` with `w` the scalar part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct Quaternion {
    /// The x component of the vector part.
    pub x: f32,
    /// The y component of the vector part.
    pub y: f32,
    /// The z component of the vector part.
    pub z: f32,
    /// The scalar part.
    pub w: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    /// The identity rotation.
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Creates a quaternion from its raw components.
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Creates a rotation of `angle_radians` around `axis`.
    /// The axis is normalized internally.
    pub fn from_axis_angle(axis: Vec3, angle_radians: f32) -> Self {
        let axis = axis.normalize();
        let (s, c) = (angle_radians * 0.5).sin_cos();
        Self::new(axis.x * s, axis.y * s, axis.z * s, c)
    }

    /// Creates a rotation from Euler angles in degrees, `(roll, pitch, yaw)`
    /// stored in `(x, y, z)`.
    ///
    /// Roll turns about +X (forward), pitch about +Y (right) and yaw about
    /// +Z (up); the composite applies roll first and yaw last. Positive pitch
    /// tilts the forward vector up.
    pub fn from_euler_degrees(rotation: Vec3) -> Self {
        let roll = Self::from_axis_angle(Vec3::X, degrees_to_radians(rotation.x));
        // Positive pitch raises +X towards +Z, which is a negative turn about +Y.
        let pitch = Self::from_axis_angle(Vec3::Y, -degrees_to_radians(rotation.y));
        let yaw = Self::from_axis_angle(Vec3::Z, degrees_to_radians(rotation.z));
        yaw * pitch * roll
    }

    /// Returns the quaternion scaled to unit length, or the identity if degenerate.
    pub fn normalize(&self) -> Self {
        let len_sq = self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w;
        if len_sq < EPSILON * EPSILON {
            return Self::IDENTITY;
        }
        let inv = 1.0 / len_sq.sqrt();
        Self::new(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
    }

    /// The inverse of a unit quaternion.
    #[inline]
    pub fn conjugate(&self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Rotates a vector by this quaternion.
    #[inline]
    pub fn rotate_vec3(&self, v: Vec3) -> Vec3 {
        let u = Vec3::new(self.x, self.y, self.z);
        let s = self.w;
        2.0 * u.dot(v) * u + (s * s - u.dot(u)) * v + 2.0 * s * u.cross(v)
    }
}

impl Mul for Quaternion {
    type Output = Self;
    /// Composes two rotations; `a * b` applies `b` first.
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-5);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-5);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-5);
    }

    #[test]
    fn yaw_turns_forward_towards_right() {
        let q = Quaternion::from_euler_degrees(Vec3::new(0.0, 0.0, 90.0));
        assert_vec_eq(q.rotate_vec3(Vec3::X), Vec3::Y);
    }

    #[test]
    fn positive_pitch_looks_up() {
        let q = Quaternion::from_euler_degrees(Vec3::new(0.0, 90.0, 0.0));
        assert_vec_eq(q.rotate_vec3(Vec3::X), Vec3::Z);
    }

    #[test]
    fn conjugate_undoes_rotation() {
        let q = Quaternion::from_euler_degrees(Vec3::new(12.0, -30.0, 145.0));
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_vec_eq(q.conjugate().rotate_vec3(q.rotate_vec3(v)), v);
    }
}
