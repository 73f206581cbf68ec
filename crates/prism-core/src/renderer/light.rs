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

//! Light descriptions and their GPU-visible record layout.
//!
//! Scene lights come in three kinds with slightly different parameter sets.
//! Before upload they are all normalized into a single fixed-size
//! [`GpuLightRecord`], so the culling and shading shaders can index one flat
//! structured buffer regardless of the light kind.

use crate::math::{LinearRgba, Vec3};
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Maximum number of lights written to the light structured buffer per frame.
pub const MAX_LIGHTS: usize = 8192;

/// Ambient term applied to every lit pixel.
pub const GLOBAL_AMBIENT: LinearRgba = LinearRgba::new(0.2, 0.2, 0.2, 1.0);

/// The kind of a light source.
///
/// The discriminants match the `kind` field read by the shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum LightKind {
    /// Omni-directional light with radius falloff.
    Point = 1,
    /// Cone light with angular and radius falloff.
    Spot = 2,
    /// Infinitely distant light, only its direction matters.
    Directional = 3,
}

impl LightKind {
    /// All kinds, in the order lights are collected each frame.
    pub const COLLECTION_ORDER: [LightKind; 3] =
        [LightKind::Point, LightKind::Spot, LightKind::Directional];

    /// The integer code stored in [`GpuLightRecord::kind`].
    #[inline]
    pub const fn gpu_code(self) -> i32 {
        self as i32
    }

    /// Whether the record carries a meaningful direction.
    #[inline]
    pub const fn has_direction(self) -> bool {
        matches!(self, LightKind::Spot | LightKind::Directional)
    }
}

/// Authoring parameters shared by every light kind.
///
/// Cone angles are in degrees and only read for [`LightKind::Spot`].
///
/// # Examples
///
/// ```
/// use prism_core::renderer::light::LightParams;
///
/// let lamp = LightParams {
///     intensity: 25.0,
///     radius: 4.0,
///     ..Default::default()
/// };
/// assert!(lamp.enabled);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightParams {
    /// Base color in linear space; alpha is ignored.
    pub color: LinearRgba,
    /// Distance attenuation scalar.
    pub attenuation: f32,
    /// Brightness multiplier.
    pub intensity: f32,
    /// Radius beyond which the light contributes nothing.
    pub radius: f32,
    /// Inner cone angle in degrees.
    pub inner_cone_angle: f32,
    /// Outer cone angle in degrees.
    pub outer_cone_angle: f32,
    /// Exponent shaping the angular falloff between the two cones.
    pub falloff: f32,
    /// Disabled lights are still written but skipped by the shaders.
    pub enabled: bool,
}

impl Default for LightParams {
    fn default() -> Self {
        Self {
            color: LinearRgba::rgb(0.1, 0.1, 0.1),
            attenuation: 0.1,
            intensity: 10.0,
            radius: 10.0,
            inner_cone_angle: 0.0,
            outer_cone_angle: 45.0,
            falloff: 0.0,
            enabled: true,
        }
    }
}

/// GPU representation of one light, shared by all kinds.
///
/// # Memory Layout
///
/// 96 bytes, six 16-byte rows. Every `vec3` is followed by an explicit pad so
/// the struct matches the WGSL `Light` struct member for member.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLightRecord {
    /// Linear RGB color.
    pub color: [f32; 3],
    /// Padding.
    pub _pad0: f32,
    /// World position (zero for directional lights).
    pub position: [f32; 3],
    /// Padding.
    pub _pad1: f32,
    /// World forward vector (zero for point lights).
    pub direction: [f32; 3],
    /// Padding.
    pub _pad2: f32,
    /// Distance attenuation scalar.
    pub attenuation: f32,
    /// Brightness multiplier.
    pub intensity: f32,
    /// Influence radius.
    pub radius: f32,
    /// Inner cone angle in degrees.
    pub inner_cone_angle: f32,
    /// Outer cone angle in degrees.
    pub outer_cone_angle: f32,
    /// Angular falloff exponent.
    pub falloff: f32,
    /// Padding.
    pub _pad3: [f32; 2],
    /// 1 when the light contributes, 0 otherwise.
    pub enabled: i32,
    /// [`LightKind`] code.
    pub kind: i32,
    /// Padding.
    pub _pad4: [i32; 2],
}

impl GpuLightRecord {
    /// Builds a record from a world-space light.
    ///
    /// `direction` is normalized for spot and directional lights and dropped
    /// for point lights.
    pub fn from_parts(kind: LightKind, position: Vec3, direction: Vec3, params: &LightParams) -> Self {
        let direction = if kind.has_direction() {
            direction.normalize().to_array()
        } else {
            [0.0; 3]
        };
        let position = match kind {
            LightKind::Directional => [0.0; 3],
            _ => position.to_array(),
        };
        Self {
            color: params.color.rgb_vec3().to_array(),
            position,
            direction,
            attenuation: params.attenuation,
            intensity: params.intensity,
            radius: params.radius,
            inner_cone_angle: params.inner_cone_angle,
            outer_cone_angle: params.outer_cone_angle,
            falloff: params.falloff,
            enabled: i32::from(params.enabled),
            kind: kind.gpu_code(),
            ..Self::zeroed()
        }
    }

    /// The kind decoded from the record, `None` for an empty slot.
    pub fn light_kind(&self) -> Option<LightKind> {
        match self.kind {
            1 => Some(LightKind::Point),
            2 => Some(LightKind::Spot),
            3 => Some(LightKind::Directional),
            _ => None,
        }
    }
}

/// Uniform header uploaded alongside the light records.
///
/// `light_count` bounds every shader loop over the record array, so slots at
/// or beyond it are never read.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightBufferHeader {
    /// Ambient term.
    pub global_ambient: LinearRgba,
    /// Number of valid records.
    pub light_count: u32,
    /// Padding.
    pub _pad: [u32; 3],
}

impl LightBufferHeader {
    /// Creates a header for `light_count` records with the default ambient.
    pub fn new(light_count: u32) -> Self {
        Self {
            global_ambient: GLOBAL_AMBIENT,
            light_count,
            _pad: [0; 3],
        }
    }
}

impl Default for LightBufferHeader {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_layout_is_six_rows() {
        assert_eq!(std::mem::size_of::<GpuLightRecord>(), 96);
        assert_eq!(std::mem::size_of::<LightBufferHeader>(), 32);
    }

    #[test]
    fn default_params_match_editor_defaults() {
        let p = LightParams::default();
        assert_eq!(p.intensity, 10.0);
        assert_eq!(p.radius, 10.0);
        assert_eq!(p.outer_cone_angle, 45.0);
        assert_eq!(p.attenuation, 0.1);
    }

    #[test]
    fn point_light_drops_direction() {
        let record = GpuLightRecord::from_parts(
            LightKind::Point,
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::X,
            &LightParams::default(),
        );
        assert_eq!(record.position, [1.0, 2.0, 3.0]);
        assert_eq!(record.direction, [0.0; 3]);
        assert_eq!(record.kind, 1);
        assert_eq!(record.enabled, 1);
        assert_eq!(record.light_kind(), Some(LightKind::Point));
    }

    #[test]
    fn directional_light_keeps_normalized_direction() {
        let record = GpuLightRecord::from_parts(
            LightKind::Directional,
            Vec3::new(5.0, 5.0, 5.0),
            Vec3::new(0.0, 0.0, -4.0),
            &LightParams::default(),
        );
        assert_eq!(record.position, [0.0; 3]);
        assert_eq!(record.direction, [0.0, 0.0, -1.0]);
        assert_eq!(record.kind, 3);
    }

    #[test]
    fn zeroed_slot_has_no_kind() {
        let empty: GpuLightRecord = Zeroable::zeroed();
        assert_eq!(empty.light_kind(), None);
        assert_eq!(empty.enabled, 0);
    }
}
