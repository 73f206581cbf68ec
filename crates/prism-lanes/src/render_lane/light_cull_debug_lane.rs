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

//! Heat map of the per-tile light counts.

use super::fullscreen::{FullscreenInput, FullscreenPass};
use super::shaders::LIGHT_CULL_DEBUG_FILE;
use super::{FrameContext, RenderLane};
use crate::resources::{GpuResourceManager, CULL_PARAMS, SCREEN_CONSTANTS, TILE_LIGHT_COUNTS};
use crate::shader_library::{ShaderLibrary, ShaderSnapshot};
use prism_core::renderer::{BlendMode, CommandEncoder, RenderError};

const INPUTS: &[FullscreenInput] = &[
    FullscreenInput::Uniform(SCREEN_CONSTANTS),
    FullscreenInput::Uniform(CULL_PARAMS),
    FullscreenInput::Storage(TILE_LIGHT_COUNTS),
];

/// Colors every culling tile of the viewport by the number of lights the
/// culling pass assigned to it. Replaces the debug lines and gizmo in the
/// light debug view mode.
#[derive(Debug, Default)]
pub struct LightCullDebugLane {
    pass: Option<FullscreenPass>,
}

impl LightCullDebugLane {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderLane for LightCullDebugLane {
    fn name(&self) -> &'static str {
        "LightCullDebugLane"
    }

    fn on_gpu_init(&mut self, resources: &mut GpuResourceManager, shaders: &ShaderLibrary) -> Result<(), RenderError> {
        self.pass = Some(FullscreenPass::new(
            resources,
            shaders,
            "Light Cull Debug Pass",
            LIGHT_CULL_DEBUG_FILE,
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
    use crate::render_lane::LightCullLane;
    use crate::test_support::{shader_library, shared_resources, MockDevice, MockEncoder, TestFrame};
    use prism_core::scene::Scene;
    use std::sync::Arc;

    #[test]
    fn test_needs_the_culling_buffers() {
        let device = Arc::new(MockDevice::default());
        let mut resources = shared_resources(&device, 32, 32);
        let shaders = shader_library(&device);
        let mut lane = LightCullDebugLane::new();
        lane.on_gpu_init(&mut resources, &shaders).unwrap();

        let scene = Scene::new();
        let mut frame = TestFrame::new(32, 32);
        let mut encoder = MockEncoder::new(&device);
        assert!(lane.render(&mut frame.ctx(&resources, &scene), &mut encoder).is_err());

        LightCullLane::default().on_gpu_init(&mut resources, &shaders).unwrap();
        lane.render(&mut frame.ctx(&resources, &scene), &mut encoder).unwrap();
        assert_eq!(frame.stats.draw_calls, 1);
    }
}
