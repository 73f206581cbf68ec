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

//! The editor viewport camera: view/projection matrices and frustum planes.
//!
//! Conventions: Z is up, X is forward, Y is right, left-handed. Rotations are
//! Euler angles in degrees stored as `(roll, pitch, yaw)`.

use crate::math::{
    clamp, degrees_to_radians, Frustum, Mat4, Quaternion, Ray, Vec3, Vec4, EPSILON,
};
use crate::viewport::mode::ViewportType;
use crate::viewport::ViewportRect;
use serde::{Deserialize, Serialize};

/// Pitch limit in degrees, both directions.
pub const PITCH_LIMIT: f32 = 89.0;
/// Smallest allowed orthographic zoom.
pub const MIN_ORTHO_SIZE: f32 = 0.1;
/// Distance of an orthographic eye from the pivot.
pub const ORTHO_CAMERA_DISTANCE: f32 = 100_000.0;
/// Camera speed multiplier range.
pub const CAMERA_SPEED_RANGE: (f32, f32) = (0.198, 176.0);

/// State shared by every viewport of one editor window.
///
/// Orthographic viewports all orbit the same pivot and share one zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportGroup {
    /// Point orthographic cameras look at.
    pub pivot: Vec3,
    /// Orthographic view height in world units.
    ortho_size: f32,
}

impl Default for ViewportGroup {
    fn default() -> Self {
        Self {
            pivot: Vec3::ZERO,
            ortho_size: 10.0,
        }
    }
}

impl ViewportGroup {
    /// Orthographic view height in world units.
    pub fn ortho_size(&self) -> f32 {
        self.ortho_size
    }

    /// Sets the orthographic zoom, never below [`MIN_ORTHO_SIZE`].
    pub fn set_ortho_size(&mut self, size: f32) {
        self.ortho_size = size.max(MIN_ORTHO_SIZE);
    }

    /// Adds `delta` to the orthographic zoom.
    pub fn zoom(&mut self, delta: f32) {
        self.set_ortho_size(self.ortho_size + delta);
    }

    /// Pans the pivot in the plane of an orthographic camera.
    pub fn pan(&mut self, camera: &ViewportCamera, delta_x: f32, delta_y: f32) {
        let (_, right, up) = camera.ortho_basis();
        self.pivot = self.pivot + right * (delta_x * -0.05) + up * (delta_y * 0.05);
    }
}

/// Matrices and planes derived from a camera for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    /// World to view.
    pub view: Mat4,
    /// View to clip.
    pub projection: Mat4,
    /// Culling volume in world space.
    pub frustum: Frustum,
    /// Eye position.
    pub eye: Vec3,
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
}

impl ViewState {
    /// `projection * view`.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// A viewport camera.
///
/// Every setter invalidates the derived [`ViewState`];
/// [`ViewportCamera::view_state`] returns `None` until
/// [`ViewportCamera::tick`] has recomputed it.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportCamera {
    location: Vec3,
    rotation: Vec3,
    fov_degrees: f32,
    near: f32,
    far: f32,
    aspect_ratio: f32,
    speed_scalar: f32,
    viewport_type: ViewportType,
    state: Option<ViewState>,
}

impl Default for ViewportCamera {
    fn default() -> Self {
        Self {
            location: Vec3::new(8.0, 8.0, 8.0),
            rotation: Vec3::new(0.0, -35.0, -135.0),
            fov_degrees: 60.0,
            near: 0.1,
            far: 1000.0,
            aspect_ratio: 16.0 / 9.0,
            speed_scalar: 1.0,
            viewport_type: ViewportType::Perspective,
            state: None,
        }
    }
}

impl ViewportCamera {
    /// Creates a perspective camera at `location` with `(roll, pitch, yaw)`
    /// rotation in degrees.
    pub fn new(location: Vec3, rotation: Vec3) -> Self {
        let mut camera = Self {
            location,
            ..Default::default()
        };
        camera.set_rotation(rotation);
        camera
    }

    /// Eye position of the perspective camera.
    pub fn location(&self) -> Vec3 {
        self.location
    }

    pub fn set_location(&mut self, location: Vec3) {
        self.location = location;
        self.state = None;
    }

    /// Vertical field of view in degrees.
    pub fn fov_degrees(&self) -> f32 {
        self.fov_degrees
    }

    pub fn set_fov_degrees(&mut self, degrees: f32) {
        self.fov_degrees = degrees;
        self.state = None;
    }

    /// Near plane distance.
    pub fn near(&self) -> f32 {
        self.near
    }

    /// Far plane distance.
    pub fn far(&self) -> f32 {
        self.far
    }

    /// Sets the clip distances. `far` is kept beyond `near`.
    pub fn set_clip_planes(&mut self, near: f32, far: f32) {
        self.near = near.max(EPSILON);
        self.far = far.max(self.near + EPSILON);
        self.state = None;
    }

    /// `(roll, pitch, yaw)` in degrees.
    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    /// Sets the rotation, clamping pitch to ±[`PITCH_LIMIT`].
    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.rotation = Vec3::new(
            rotation.x,
            clamp(rotation.y, -PITCH_LIMIT, PITCH_LIMIT),
            rotation.z,
        );
        self.state = None;
    }

    /// Turns around world up.
    pub fn rotate_yaw(&mut self, degrees: f32) {
        let r = self.rotation;
        self.set_rotation(Vec3::new(r.x, r.y, r.z + degrees));
    }

    /// Tilts up or down; the result is clamped.
    pub fn rotate_pitch(&mut self, degrees: f32) {
        let r = self.rotation;
        self.set_rotation(Vec3::new(r.x, r.y + degrees, r.z));
    }

    /// Unit vector the perspective camera looks along.
    pub fn forward(&self) -> Vec3 {
        self.orientation().rotate_vec3(Vec3::X).normalize()
    }

    /// Unit vector to the right of the perspective camera.
    pub fn right(&self) -> Vec3 {
        self.orientation().rotate_vec3(Vec3::Y).normalize()
    }

    /// Unit vector above the perspective camera.
    pub fn up(&self) -> Vec3 {
        self.orientation().rotate_vec3(Vec3::Z).normalize()
    }

    fn orientation(&self) -> Quaternion {
        Quaternion::from_euler_degrees(self.rotation)
    }

    /// Moves along the forward vector, scaled by the camera speed.
    pub fn move_forward(&mut self, amount: f32) {
        self.set_location(self.location + self.forward() * (amount * self.speed_scalar));
    }

    /// Moves along the right vector, scaled by the camera speed.
    pub fn move_right(&mut self, amount: f32) {
        self.set_location(self.location + self.right() * (amount * self.speed_scalar));
    }

    /// Moves along world up, scaled by the camera speed.
    pub fn move_up(&mut self, amount: f32) {
        self.set_location(self.location + Vec3::Z * (amount * self.speed_scalar));
    }

    /// Camera speed multiplier.
    pub fn speed_scalar(&self) -> f32 {
        self.speed_scalar
    }

    /// Sets the speed multiplier, clamped to [`CAMERA_SPEED_RANGE`].
    pub fn set_speed_scalar(&mut self, value: f32) {
        self.speed_scalar = clamp(value, CAMERA_SPEED_RANGE.0, CAMERA_SPEED_RANGE.1);
    }

    /// Width over height of the viewport.
    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    /// Adopts the aspect ratio of `rect` and invalidates the derived state.
    pub fn set_aspect_from_rect(&mut self, rect: &ViewportRect) {
        if rect.height > 0.0 && rect.width > 0.0 {
            self.aspect_ratio = rect.width / rect.height;
        }
        self.state = None;
    }

    /// The projection type.
    pub fn viewport_type(&self) -> ViewportType {
        self.viewport_type
    }

    /// Switches projection type and invalidates the derived state.
    pub fn set_viewport_type(&mut self, viewport_type: ViewportType) {
        if self.viewport_type != viewport_type {
            self.viewport_type = viewport_type;
            self.state = None;
        }
    }

    /// Fixed look direction, right and up vectors of an orthographic view.
    fn ortho_basis(&self) -> (Vec3, Vec3, Vec3) {
        let (forward, up_hint) = match self.viewport_type {
            ViewportType::Top => (-Vec3::Z, -Vec3::Y),
            ViewportType::Bottom => (Vec3::Z, -Vec3::Y),
            ViewportType::Front => (-Vec3::X, Vec3::Z),
            ViewportType::Back => (Vec3::X, Vec3::Z),
            ViewportType::Left => (-Vec3::Y, Vec3::Z),
            ViewportType::Right => (Vec3::Y, Vec3::Z),
            ViewportType::Perspective => return (self.forward(), self.right(), self.up()),
        };
        let right = up_hint.cross(forward).normalize();
        (forward, right, forward.cross(right))
    }

    /// Eye of an orthographic view, far out along the view axis.
    fn ortho_eye(&self, group: &ViewportGroup) -> Vec3 {
        let (forward, _, _) = self.ortho_basis();
        group.pivot - forward * ORTHO_CAMERA_DISTANCE
    }

    /// Eye position for the current type.
    pub fn eye(&self, group: &ViewportGroup) -> Vec3 {
        if self.viewport_type.is_ortho() {
            self.ortho_eye(group)
        } else {
            self.location
        }
    }

    fn far_plane(&self) -> f32 {
        if self.viewport_type.is_ortho() {
            ORTHO_CAMERA_DISTANCE * 2.0
        } else {
            self.far
        }
    }

    /// Recomputes the view matrix from the camera type.
    pub fn update_view_matrix(&self, group: &ViewportGroup) -> Mat4 {
        let eye = self.eye(group);
        let (forward, _, up) = self.ortho_basis();
        Mat4::look_to_lh(eye, forward, up).unwrap_or(Mat4::IDENTITY)
    }

    /// Recomputes the projection matrix from the camera type.
    pub fn update_projection_matrix(&self, group: &ViewportGroup) -> Mat4 {
        if self.viewport_type.is_ortho() {
            let height = group.ortho_size();
            Mat4::orthographic_lh_zo(height * self.aspect_ratio, height, self.near, self.far_plane())
        } else {
            Mat4::perspective_lh_zo(
                degrees_to_radians(self.fov_degrees),
                self.aspect_ratio,
                self.near,
                self.far,
            )
        }
    }

    /// Builds the six culling planes from the near and far corner points.
    pub fn extract_frustum_planes(&self, group: &ViewportGroup) -> Frustum {
        let eye = self.eye(group);
        let (forward, right, up) = self.ortho_basis();
        if self.viewport_type.is_ortho() {
            let height = group.ortho_size();
            Frustum::from_orthographic(
                eye,
                forward,
                right,
                up,
                height * self.aspect_ratio,
                height,
                self.near,
                self.far_plane(),
            )
        } else {
            Frustum::from_perspective(
                eye,
                forward,
                right,
                up,
                degrees_to_radians(self.fov_degrees),
                self.aspect_ratio,
                self.near,
                self.far,
            )
        }
    }

    /// Recomputes view, projection and frustum. Call once per frame before
    /// any culling.
    pub fn tick(&mut self, group: &ViewportGroup) -> ViewState {
        let state = ViewState {
            view: self.update_view_matrix(group),
            projection: self.update_projection_matrix(group),
            frustum: self.extract_frustum_planes(group),
            eye: self.eye(group),
            near: self.near,
            far: self.far_plane(),
        };
        self.state = Some(state);
        state
    }

    /// The state computed by the last [`tick`](Self::tick), if still valid.
    pub fn view_state(&self) -> Option<&ViewState> {
        self.state.as_ref()
    }

    /// Builds a world-space picking ray through a pixel of `rect`.
    ///
    /// Returns `None` before the first tick or when the matrices are singular.
    pub fn screen_point_to_ray(&self, rect: &ViewportRect, x: f32, y: f32) -> Option<Ray> {
        let state = self.state.as_ref()?;
        if rect.width <= EPSILON || rect.height <= EPSILON {
            return None;
        }
        let ndc_x = (x - rect.x) / rect.width * 2.0 - 1.0;
        let ndc_y = 1.0 - (y - rect.y) / rect.height * 2.0;
        let inv = state.view_projection().inverse()?;
        let unproject = |z: f32| {
            let p = inv * Vec4::new(ndc_x, ndc_y, z, 1.0);
            if p.w.abs() < EPSILON {
                None
            } else {
                Some(p.truncate() / p.w)
            }
        };
        let near = unproject(0.0)?;
        let far = unproject(1.0)?;
        Some(Ray::new(near, far - near))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Aabb;
    use approx::assert_relative_eq;

    fn rect() -> ViewportRect {
        ViewportRect::new(0.0, 0.0, 1600.0, 900.0)
    }

    #[test]
    fn basis_stays_orthonormal_across_pitch_range() {
        let mut camera = ViewportCamera::default();
        for pitch in [-120.0, -89.0, -45.0, 0.0, 30.0, 89.0, 140.0] {
            for yaw in [-180.0, -33.0, 0.0, 90.0, 271.0] {
                camera.set_rotation(Vec3::new(0.0, pitch, yaw));
                let (f, r, u) = (camera.forward(), camera.right(), camera.up());
                assert_relative_eq!(f.length(), 1.0, epsilon = 1e-4);
                assert_relative_eq!(u.length(), 1.0, epsilon = 1e-4);
                assert!(f.dot(r).abs() < 1e-4);
                assert!(u.dot(r).abs() < 1e-4);
                assert!(f.dot(u).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = ViewportCamera::default();
        camera.set_rotation(Vec3::new(0.0, 120.0, 0.0));
        assert_eq!(camera.rotation().y, PITCH_LIMIT);
        camera.rotate_pitch(-500.0);
        assert_eq!(camera.rotation().y, -PITCH_LIMIT);
    }

    #[test]
    fn speed_and_zoom_are_clamped() {
        let mut camera = ViewportCamera::default();
        camera.set_speed_scalar(0.0);
        assert_eq!(camera.speed_scalar(), 0.198);
        camera.set_speed_scalar(1000.0);
        assert_eq!(camera.speed_scalar(), 176.0);

        let mut group = ViewportGroup::default();
        group.zoom(-50.0);
        assert_eq!(group.ortho_size(), MIN_ORTHO_SIZE);
    }

    #[test]
    fn frustum_excludes_eye_and_points_past_far() {
        let mut camera = ViewportCamera::new(Vec3::new(0.0, 0.0, 20.0), Vec3::new(0.0, -89.0, 0.0));
        let group = ViewportGroup::default();
        let state = camera.tick(&group);
        let eye = camera.location();
        let far_point = eye + camera.forward() * (camera.far() + 1.0);
        assert!(state.frustum.planes[Frustum::NEAR].signed_distance(eye) <= 0.0);
        assert!(state.frustum.planes[Frustum::FAR].signed_distance(far_point) < 0.0);
        let ahead = eye + camera.forward() * 10.0;
        assert!(state.frustum.contains_point(ahead));
    }

    #[test]
    fn switching_type_invalidates_state() {
        let mut camera = ViewportCamera::default();
        let mut group = ViewportGroup::default();
        camera.tick(&group);
        assert!(camera.view_state().is_some());
        camera.set_viewport_type(ViewportType::Top);
        assert!(camera.view_state().is_none());

        group.pivot = Vec3::new(3.0, 4.0, 0.0);
        let state = camera.tick(&group);
        assert_relative_eq!(state.eye.z, ORTHO_CAMERA_DISTANCE, epsilon = 1e-2);
        // The pivot sits in the middle of the screen.
        let clip = state.view_projection() * group.pivot.extend(1.0);
        assert!(clip.x.abs() < 1e-3 && clip.y.abs() < 1e-3);
        assert!(state.frustum.contains_point(group.pivot));
    }

    #[test]
    fn center_ray_hits_box_in_front() {
        let mut camera = ViewportCamera::new(Vec3::new(-10.0, 0.0, 0.0), Vec3::ZERO);
        camera.set_aspect_from_rect(&rect());
        camera.tick(&ViewportGroup::default());
        let ray = camera.screen_point_to_ray(&rect(), 800.0, 450.0).unwrap();
        assert_relative_eq!(ray.direction.x, 1.0, epsilon = 1e-3);
        let hit = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE).intersect_ray(&ray);
        assert_relative_eq!(hit.unwrap(), 9.0 - camera.near(), epsilon = 1e-2);
    }

    #[test]
    fn camera_looking_at_origin_sees_it() {
        let mut camera = ViewportCamera::new(Vec3::new(0.0, 0.0, 20.0), Vec3::new(0.0, -89.0, 0.0));
        let state = camera.tick(&ViewportGroup::default());
        let clip = state.view_projection() * Vec3::ZERO.extend(1.0);
        let depth = clip.z / clip.w;
        assert!(depth > 0.0 && depth < 1.0);
    }

    #[test]
    fn moving_after_tick_invalidates_state() {
        let mut camera = ViewportCamera::default();
        let group = ViewportGroup::default();
        let before = camera.tick(&group);
        assert_eq!(camera.view_state().map(|s| s.eye), Some(before.eye));

        camera.move_forward(50.0);
        assert!(camera.view_state().is_none());
        assert!(camera.screen_point_to_ray(&rect(), 800.0, 450.0).is_none());

        camera.tick(&group);
        camera.set_rotation(Vec3::new(0.0, 10.0, 45.0));
        assert!(camera.view_state().is_none());

        let after = camera.tick(&group);
        assert_eq!(after.eye, camera.location());
        assert!((after.eye - before.eye).length() > 1.0);
    }

    #[test]
    fn lens_setters_invalidate_state() {
        let mut camera = ViewportCamera::default();
        let group = ViewportGroup::default();
        camera.tick(&group);
        camera.set_fov_degrees(90.0);
        assert!(camera.view_state().is_none());

        camera.tick(&group);
        camera.set_clip_planes(1.0, 0.5);
        assert!(camera.view_state().is_none());
        assert!(camera.far() > camera.near());
        assert_eq!(camera.tick(&group).near, 1.0);

        camera.set_location(Vec3::ONE);
        assert!(camera.view_state().is_none());
    }
}
