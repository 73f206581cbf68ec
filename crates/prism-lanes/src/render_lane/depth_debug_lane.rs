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

//! Scene depth visualization.

use super::fullscreen::{FullscreenInput, FullscreenPass};
use super::shaders::DEPTH_DEBUG_FILE;
use super::{FrameContext, RenderLane};
use crate::resources::{GpuResourceManager, CAMERA_CONSTANTS, SCENE_DEPTH, SCREEN_CONSTANTS};
use crate::shader_library::{ShaderLibrary, ShaderSnapshot};
use prism_core::renderer::{BlendMode, CommandEncoder, RenderError};

const INPUTS: &[FullscreenInput] = &[
    FullscreenInput::Uniform(CAMERA_CONSTANTS),
    FullscreenInput::Uniform(SCREEN_CONSTANTS),
    FullscreenInput::Depth(SCENE_DEPTH),
];

/// Replaces the viewport's color with its linearized depth, near black and
/// far white. Used by the scene depth view mode in place of fog.
#[derive(Debug, Default)]
pub struct DepthDebugLane {
    pass: Option<FullscreenPass>,
}

impl DepthDebugLane {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderLane for DepthDebugLane {
    fn name(&self) -> &'static str {
        "DepthDebugLane"
    }

    fn on_gpu_init(&mut self, resources: &mut GpuResourceManager, shaders: &ShaderLibrary) -> Result<(), RenderError> {
        self.pass = Some(FullscreenPass::new(
            resources,
            shaders,
            "Depth Debug Pass",
            DEPTH_DEBUG_FILE,
            INPUTS,
            BlendMode::Opaque,
        )?);
        Ok(())
    }

    fn on_shaders_changed(&mut self, shaders: &ShaderSnapshot) {
        if let Some(pass) = self.pass.as_mut() {
            pass.rebuild(shaders);
        }
    }

    fn render(&mut self, ctx: &mut FrameContext<'_>, encoder: &mut dyn CommandEncoder) -> Result<(), RenderError> {
        self.pass
            .as_mut()
            .ok_or(RenderError::NotInitialized)?
            .draw(ctx, encoder)
    }

    fn is_ready(&self) -> bool {
        self.pass.as_ref().is_some_and(FullscreenPass::is_ready)
    }

    fn on_gpu_shutdown(&mut self) {
        if let Some(mut pass) = self.pass.take() {
            pass.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{shader_library, shared_resources, Command, MockDevice, MockEncoder, TestFrame};
    use prism_core::renderer::TextureFormat;
    use prism_core::scene::Scene;
    use std::sync::Arc;

    #[test]
    fn test_draws_one_fullscreen_triangle() {
        let device = Arc::new(MockDevice::default());
        let mut resources = shared_resources(&device, 32, 32);
        let mut lane = DepthDebugLane::new();
        lane.on_gpu_init(&mut resources, &shader_library(&device)).unwrap();

        let scene = Scene::new();
        let mut frame = TestFrame::new(32, 32);
        let mut encoder = MockEncoder::new(&device);
        device.take_commands();
        lane.render(&mut frame.ctx(&resources, &scene), &mut encoder).unwrap();
        assert!(device.take_commands().contains(&Command::Draw {
            vertices: 0..3,
            instances: 0..1
        }));

        // A resized depth target is picked up on the next draw.
        let before = device.live_bind_group_count();
        resources
            .create_render_target(SCENE_DEPTH, 64, 64, TextureFormat::Depth32Float)
            .unwrap();
        lane.render(&mut frame.ctx(&resources, &scene), &mut encoder).unwrap();
        assert_eq!(device.live_bind_group_count(), before);
        assert_eq!(frame.stats.draw_calls, 2);
    }
}
