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

//! Editor viewports: camera, screen rectangle, view mode and show flags.
//!
//! A [`Viewport`] is what the frame orchestrator renders into. The
//! persisted per-viewport state is exposed as flat string key/value pairs so
//! an external settings store can load and save it without this crate doing
//! any file I/O.

mod camera;
mod mode;

pub use self::camera::{
    ViewState, ViewportCamera, ViewportGroup, CAMERA_SPEED_RANGE, MIN_ORTHO_SIZE,
    ORTHO_CAMERA_DISTANCE, PITCH_LIMIT,
};
pub use self::mode::{ShowFlags, ViewMode, ViewportType};

use crate::math::Vec3;
use crate::renderer::api::Viewport as GpuViewport;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A screen-space rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewportRect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl ViewportRect {
    /// Creates a rectangle.
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Whether the rectangle covers at least one pixel.
    pub fn is_valid(&self) -> bool {
        self.width >= 1.0 && self.height >= 1.0
    }

    /// Whether the pixel lies inside the rectangle, edges included.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }

    /// The rasterizer viewport for this rectangle.
    pub fn to_gpu_viewport(&self) -> GpuViewport {
        GpuViewport {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// One editor viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    /// Position in the viewport layout, used as the settings key suffix.
    pub index: u32,
    /// Screen rectangle inside the shared render target.
    pub rect: ViewportRect,
    /// The camera.
    pub camera: ViewportCamera,
    /// Active view mode.
    pub view_mode: ViewMode,
    /// Visibility toggles.
    pub show_flags: ShowFlags,
    /// Grid spacing in world units.
    pub grid_size: f32,
}

impl Viewport {
    /// Creates a viewport with default camera and flags.
    pub fn new(index: u32, rect: ViewportRect) -> Self {
        let mut camera = ViewportCamera::default();
        camera.set_aspect_from_rect(&rect);
        Self {
            index,
            rect,
            camera,
            view_mode: ViewMode::default(),
            show_flags: ShowFlags::default(),
            grid_size: 10.0,
        }
    }

    /// Changes the screen rectangle and the camera aspect with it.
    pub fn resize(&mut self, rect: ViewportRect) {
        self.rect = rect;
        self.camera.set_aspect_from_rect(&rect);
    }

    /// Whether a show flag is set.
    #[inline]
    pub fn shows(&self, flag: ShowFlags) -> bool {
        self.show_flags.contains(flag)
    }

    fn key(&self, name: &str) -> String {
        format!("{name}{}", self.index)
    }

    /// Writes the persisted state into `settings`.
    pub fn save_settings(&self, settings: &mut HashMap<String, String>) {
        let location = self.camera.location();
        let rotation = self.camera.rotation();
        let entries = [
            ("CameraSpeedScalar", self.camera.speed_scalar().to_string()),
            ("GridSize", self.grid_size.to_string()),
            ("PerspectiveCameraLocX", location.x.to_string()),
            ("PerspectiveCameraLocY", location.y.to_string()),
            ("PerspectiveCameraLocZ", location.z.to_string()),
            ("PerspectiveCameraRotX", rotation.x.to_string()),
            ("PerspectiveCameraRotY", rotation.y.to_string()),
            ("PerspectiveCameraRotZ", rotation.z.to_string()),
            ("ShowFlag", self.show_flags.bits().to_string()),
            ("ViewMode", self.view_mode.code().to_string()),
            ("ViewportType", self.camera.viewport_type().code().to_string()),
        ];
        for (name, value) in entries {
            settings.insert(self.key(name), value);
        }
    }

    /// Reads the persisted state from `settings`.
    ///
    /// Missing or malformed entries fall back to the defaults; unknown show
    /// flag bits are dropped.
    pub fn load_settings(&mut self, settings: &HashMap<String, String>) {
        let index = self.index;
        let read = |name: &str, default: f32| -> f32 {
            settings
                .get(&format!("{name}{index}"))
                .and_then(|v| v.trim().parse::<f32>().ok())
                .unwrap_or(default)
        };

        self.camera.set_speed_scalar(read("CameraSpeedScalar", 1.0));
        self.grid_size = read("GridSize", 10.0);
        self.camera.set_location(Vec3::new(
            read("PerspectiveCameraLocX", 0.0),
            read("PerspectiveCameraLocY", 0.0),
            read("PerspectiveCameraLocZ", 0.0),
        ));
        self.camera.set_rotation(Vec3::new(
            read("PerspectiveCameraRotX", 0.0),
            read("PerspectiveCameraRotY", 0.0),
            read("PerspectiveCameraRotZ", 0.0),
        ));
        self.show_flags = ShowFlags::from_bits_truncate(read("ShowFlag", 31.0) as u32);
        self.view_mode = ViewMode::from_code(read("ViewMode", 0.0) as u32).unwrap_or_default();
        self.camera.set_viewport_type(
            ViewportType::from_code(read("ViewportType", 3.0) as u32).unwrap_or_default(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_survive_save_and_load() {
        let mut viewport = Viewport::new(2, ViewportRect::new(0.0, 0.0, 640.0, 480.0));
        viewport.camera.set_location(Vec3::new(1.0, -2.5, 3.0));
        viewport.camera.set_rotation(Vec3::new(0.0, 12.0, 45.0));
        viewport.view_mode = ViewMode::Wireframe;
        viewport.show_flags = ShowFlags::GRID | ShowFlags::FOG;
        viewport.camera.set_viewport_type(ViewportType::Left);

        let mut settings = HashMap::new();
        viewport.save_settings(&mut settings);
        assert_eq!(settings.get("ViewMode2").map(String::as_str), Some("4"));
        assert_eq!(settings.get("ShowFlag2").map(String::as_str), Some("24"));

        let mut restored = Viewport::new(2, ViewportRect::new(0.0, 0.0, 640.0, 480.0));
        restored.camera.tick(&ViewportGroup::default());
        restored.load_settings(&settings);
        assert!(restored.camera.view_state().is_none());
        assert_eq!(restored.camera.location(), viewport.camera.location());
        assert_eq!(restored.camera.rotation(), viewport.camera.rotation());
        assert_eq!(restored.view_mode, ViewMode::Wireframe);
        assert_eq!(restored.show_flags, viewport.show_flags);
        assert_eq!(restored.camera.viewport_type(), ViewportType::Left);
    }

    #[test]
    fn missing_settings_use_defaults() {
        let mut viewport = Viewport::new(0, ViewportRect::new(0.0, 0.0, 10.0, 10.0));
        let mut settings = HashMap::new();
        settings.insert("GridSize0".to_string(), "not a number".to_string());
        viewport.load_settings(&settings);
        assert_eq!(viewport.grid_size, 10.0);
        assert_eq!(viewport.show_flags.bits(), 31);
        assert_eq!(viewport.camera.viewport_type(), ViewportType::Perspective);
    }

    #[test]
    fn rect_contains_edges() {
        let rect = ViewportRect::new(10.0, 10.0, 100.0, 50.0);
        assert!(rect.contains(10.0, 60.0));
        assert!(!rect.contains(111.0, 20.0));
        assert!(!ViewportRect::new(0.0, 0.0, 0.0, 10.0).is_valid());
    }
}
