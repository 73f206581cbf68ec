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

//! A column-major 4x4 matrix and the left-handed view/projection builders.

use super::{Quaternion, Vec3, Vec4, EPSILON};
use std::ops::Mul;

/// A 4x4 column-major matrix, used for 3D affine transformations and for
/// camera view/projection matrices.
///
/// Vectors are treated as columns: `m * v` applies `m` to `v`, and
/// `a * b` applies `b` first. The memory layout can be uploaded to the GPU as is.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Mat4 {
    /// The columns of the matrix. `cols[0]` is the first column, and so on.
    pub cols: [Vec4; 4],
}

impl Mat4 {
    /// The 4x4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [Vec4::X, Vec4::Y, Vec4::Z, Vec4::W],
    };

    /// A 4x4 matrix with all elements set to 0.
    pub const ZERO: Self = Self {
        cols: [Vec4::ZERO; 4],
    };

    /// Creates a new matrix from four column vectors.
    #[inline]
    pub fn from_cols(c0: Vec4, c1: Vec4, c2: Vec4, c3: Vec4) -> Self {
        Self {
            cols: [c0, c1, c2, c3],
        }
    }

    /// Returns a row of the matrix as a `Vec4`.
    #[inline]
    pub fn row(&self, index: usize) -> Vec4 {
        Vec4::new(
            self.cols[0][index],
            self.cols[1][index],
            self.cols[2][index],
            self.cols[3][index],
        )
    }

    /// Creates a translation matrix.
    #[inline]
    pub fn from_translation(v: Vec3) -> Self {
        Self::from_cols(Vec4::X, Vec4::Y, Vec4::Z, v.extend(1.0))
    }

    /// Creates a non-uniform scaling matrix.
    #[inline]
    pub fn from_scale(scale: Vec3) -> Self {
        Self::from_cols(
            Vec4::new(scale.x, 0.0, 0.0, 0.0),
            Vec4::new(0.0, scale.y, 0.0, 0.0),
            Vec4::new(0.0, 0.0, scale.z, 0.0),
            Vec4::W,
        )
    }

    /// Creates a rotation matrix from a unit quaternion.
    pub fn from_quat(q: Quaternion) -> Self {
        let (x2, y2, z2) = (q.x + q.x, q.y + q.y, q.z + q.z);
        let (xx, xy, xz) = (q.x * x2, q.x * y2, q.x * z2);
        let (yy, yz, zz) = (q.y * y2, q.y * z2, q.z * z2);
        let (wx, wy, wz) = (q.w * x2, q.w * y2, q.w * z2);

        Self::from_cols(
            Vec4::new(1.0 - (yy + zz), xy + wz, xz - wy, 0.0),
            Vec4::new(xy - wz, 1.0 - (xx + zz), yz + wx, 0.0),
            Vec4::new(xz + wy, yz - wx, 1.0 - (xx + yy), 0.0),
            Vec4::W,
        )
    }

    /// Builds a scale-rotate-translate world matrix.
    #[inline]
    pub fn from_scale_rotation_translation(scale: Vec3, rotation: Quaternion, translation: Vec3) -> Self {
        Self::from_translation(translation) * Self::from_quat(rotation) * Self::from_scale(scale)
    }

    /// Creates a left-handed view matrix looking from `eye` along `forward`.
    ///
    /// View space has +X right, +Y up and +Z into the screen.
    ///
    /// # Returns
    ///
    /// `None` if `forward` is degenerate or parallel to `up`.
    pub fn look_to_lh(eye: Vec3, forward: Vec3, up: Vec3) -> Option<Self> {
        if forward.length_squared() < EPSILON * EPSILON {
            return None;
        }
        let f = forward.normalize();
        let s = up.cross(f);
        if s.length_squared() < EPSILON * EPSILON {
            return None;
        }
        let s = s.normalize();
        let u = f.cross(s);

        Some(Self::from_cols(
            Vec4::new(s.x, u.x, f.x, 0.0),
            Vec4::new(s.y, u.y, f.y, 0.0),
            Vec4::new(s.z, u.z, f.z, 0.0),
            Vec4::new(-eye.dot(s), -eye.dot(u), -eye.dot(f), 1.0),
        ))
    }

    /// Creates a left-handed view matrix looking from `eye` towards `target`.
    #[inline]
    pub fn look_at_lh(eye: Vec3, target: Vec3, up: Vec3) -> Option<Self> {
        Self::look_to_lh(eye, target - eye, up)
    }

    /// Creates a left-handed perspective projection with a `[0, 1]` depth range.
    ///
    /// Degenerate inputs (non-positive near plane, `far <= near`, zero aspect)
    /// are clamped to the smallest usable values instead of panicking.
    pub fn perspective_lh_zo(fov_y_radians: f32, aspect_ratio: f32, z_near: f32, z_far: f32) -> Self {
        let z_near = z_near.max(EPSILON);
        let z_far = z_far.max(z_near + EPSILON);
        let aspect_ratio = if aspect_ratio.abs() < EPSILON {
            1.0
        } else {
            aspect_ratio
        };
        let f = 1.0 / (fov_y_radians * 0.5).tan();
        let range = z_far / (z_far - z_near);

        Self::from_cols(
            Vec4::new(f / aspect_ratio, 0.0, 0.0, 0.0),
            Vec4::new(0.0, f, 0.0, 0.0),
            Vec4::new(0.0, 0.0, range, 1.0),
            Vec4::new(0.0, 0.0, -range * z_near, 0.0),
        )
    }

    /// Creates a centered left-handed orthographic projection with a `[0, 1]` depth range.
    pub fn orthographic_lh_zo(width: f32, height: f32, z_near: f32, z_far: f32) -> Self {
        let depth = (z_far - z_near).max(EPSILON);
        Self::from_cols(
            Vec4::new(2.0 / width.max(EPSILON), 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 / height.max(EPSILON), 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0 / depth, 0.0),
            Vec4::new(0.0, 0.0, -z_near / depth, 1.0),
        )
    }

    /// Returns the transpose of the matrix.
    #[inline]
    pub fn transpose(&self) -> Self {
        Self::from_cols(self.row(0), self.row(1), self.row(2), self.row(3))
    }

    /// Computes the inverse of the matrix.
    /// Returns `None` if the matrix is not invertible.
    pub fn inverse(&self) -> Option<Self> {
        let m = |c: usize, r: usize| self.cols[c][r];

        // 2x2 minors of the first two and last two columns.
        let b00 = m(0, 0) * m(1, 1) - m(0, 1) * m(1, 0);
        let b01 = m(0, 0) * m(1, 2) - m(0, 2) * m(1, 0);
        let b02 = m(0, 0) * m(1, 3) - m(0, 3) * m(1, 0);
        let b03 = m(0, 1) * m(1, 2) - m(0, 2) * m(1, 1);
        let b04 = m(0, 1) * m(1, 3) - m(0, 3) * m(1, 1);
        let b05 = m(0, 2) * m(1, 3) - m(0, 3) * m(1, 2);
        let b06 = m(2, 0) * m(3, 1) - m(2, 1) * m(3, 0);
        let b07 = m(2, 0) * m(3, 2) - m(2, 2) * m(3, 0);
        let b08 = m(2, 0) * m(3, 3) - m(2, 3) * m(3, 0);
        let b09 = m(2, 1) * m(3, 2) - m(2, 2) * m(3, 1);
        let b10 = m(2, 1) * m(3, 3) - m(2, 3) * m(3, 1);
        let b11 = m(2, 2) * m(3, 3) - m(2, 3) * m(3, 2);

        let det = b00 * b11 - b01 * b10 + b02 * b09 + b03 * b08 - b04 * b07 + b05 * b06;
        if det.abs() < f32::EPSILON * f32::EPSILON {
            return None;
        }
        let inv = 1.0 / det;

        Some(Self::from_cols(
            Vec4::new(
                (m(1, 1) * b11 - m(1, 2) * b10 + m(1, 3) * b09) * inv,
                (m(0, 2) * b10 - m(0, 1) * b11 - m(0, 3) * b09) * inv,
                (m(3, 1) * b05 - m(3, 2) * b04 + m(3, 3) * b03) * inv,
                (m(2, 2) * b04 - m(2, 1) * b05 - m(2, 3) * b03) * inv,
            ),
            Vec4::new(
                (m(1, 2) * b08 - m(1, 0) * b11 - m(1, 3) * b07) * inv,
                (m(0, 0) * b11 - m(0, 2) * b08 + m(0, 3) * b07) * inv,
                (m(3, 2) * b02 - m(3, 0) * b05 - m(3, 3) * b01) * inv,
                (m(2, 0) * b05 - m(2, 2) * b02 + m(2, 3) * b01) * inv,
            ),
            Vec4::new(
                (m(1, 0) * b10 - m(1, 1) * b08 + m(1, 3) * b06) * inv,
                (m(0, 1) * b08 - m(0, 0) * b10 - m(0, 3) * b06) * inv,
                (m(3, 0) * b04 - m(3, 1) * b02 + m(3, 3) * b00) * inv,
                (m(2, 1) * b02 - m(2, 0) * b04 - m(2, 3) * b00) * inv,
            ),
            Vec4::new(
                (m(1, 1) * b07 - m(1, 0) * b09 - m(1, 2) * b06) * inv,
                (m(0, 0) * b09 - m(0, 1) * b07 + m(0, 2) * b06) * inv,
                (m(3, 1) * b01 - m(3, 0) * b03 - m(3, 2) * b00) * inv,
                (m(2, 0) * b03 - m(2, 1) * b01 + m(2, 2) * b00) * inv,
            ),
        ))
    }

    /// The inverse-transpose of the matrix, used to transform normals.
    /// Falls back to the identity for singular matrices.
    #[inline]
    pub fn normal_matrix(&self) -> Self {
        self.inverse().unwrap_or(Self::IDENTITY).transpose()
    }

    /// Transforms a point (w = 1), applying the perspective divide.
    #[inline]
    pub fn transform_point3(&self, p: Vec3) -> Vec3 {
        let r = *self * p.extend(1.0);
        if r.w.abs() > EPSILON {
            r.truncate() / r.w
        } else {
            r.truncate()
        }
    }

    /// Transforms a direction (w = 0).
    #[inline]
    pub fn transform_vector3(&self, v: Vec3) -> Vec3 {
        (*self * v.extend(0.0)).truncate()
    }

    /// Returns the translation stored in the last column.
    #[inline]
    pub fn translation(&self) -> Vec3 {
        self.cols[3].truncate()
    }
}

impl Default for Mat4 {
    /// Returns the 4x4 identity matrix.
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Mat4> for Mat4 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Mat4) -> Self {
        Self::from_cols(
            self * rhs.cols[0],
            self * rhs.cols[1],
            self * rhs.cols[2],
            self * rhs.cols[3],
        )
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;
    #[inline]
    fn mul(self, rhs: Vec4) -> Vec4 {
        self.cols[0] * rhs.x + self.cols[1] * rhs.y + self.cols[2] * rhs.z + self.cols[3] * rhs.w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::degrees_to_radians;
    use approx::assert_relative_eq;

    fn assert_mat_eq(a: Mat4, b: Mat4) {
        for c in 0..4 {
            for r in 0..4 {
                assert_relative_eq!(a.cols[c][r], b.cols[c][r], epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn inverse_of_trs_round_trips() {
        let m = Mat4::from_scale_rotation_translation(
            Vec3::new(2.0, 3.0, 0.5),
            Quaternion::from_axis_angle(Vec3::Z, 0.7),
            Vec3::new(10.0, -4.0, 2.0),
        );
        let inv = m.inverse().expect("trs matrices are invertible");
        assert_mat_eq(m * inv, Mat4::IDENTITY);
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        assert!(Mat4::ZERO.inverse().is_none());
        assert_eq!(Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0)).normal_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn lh_view_maps_forward_to_positive_z() {
        let view = Mat4::look_to_lh(Vec3::new(-5.0, 0.0, 0.0), Vec3::X, Vec3::Z).unwrap();
        let p = view.transform_point3(Vec3::ZERO);
        assert_relative_eq!(p.z, 5.0, epsilon = 1e-5);
        // World +Y (right) ends up on view +X.
        let r = view.transform_vector3(Vec3::Y);
        assert_relative_eq!(r.x, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn perspective_depth_range_is_zero_to_one() {
        let proj = Mat4::perspective_lh_zo(degrees_to_radians(60.0), 16.0 / 9.0, 0.1, 1000.0);
        assert_relative_eq!(proj.transform_point3(Vec3::new(0.0, 0.0, 0.1)).z, 0.0, epsilon = 1e-5);
        assert_relative_eq!(proj.transform_point3(Vec3::new(0.0, 0.0, 1000.0)).z, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn look_at_rejects_parallel_up() {
        assert!(Mat4::look_at_lh(Vec3::ZERO, Vec3::new(0.0, 0.0, 5.0), Vec3::Z).is_none());
    }
}
