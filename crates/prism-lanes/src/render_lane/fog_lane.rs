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

//! Exponential height fog composited over the lit scene.

use super::fullscreen::{FullscreenInput, FullscreenPass};
use super::shaders::FOG_FILE;
use super::{FrameContext, RenderLane};
use crate::resources::{GpuResourceManager, FOG_CONSTANTS, SCENE_DEPTH, SCREEN_CONSTANTS};
use crate::shader_library::{ShaderLibrary, ShaderSnapshot};
use prism_core::config::FogSettings;
use prism_core::math::Mat4;
use prism_core::renderer::{BlendMode, CommandEncoder, FogConstants, RenderError};
use prism_core::viewport::{ShowFlags, ViewState};

const INPUTS: &[FullscreenInput] = &[
    FullscreenInput::Uniform(FOG_CONSTANTS),
    FullscreenInput::Uniform(SCREEN_CONSTANTS),
    FullscreenInput::Depth(SCENE_DEPTH),
];

/// Builds the fog constants for one view. Positions are rebuilt from depth
/// with the inverse view projection.
pub fn fog_constants(fog: &FogSettings, view: &ViewState) -> FogConstants {
    FogConstants {
        inv_view_proj: view.view_projection().inverse().unwrap_or(Mat4::IDENTITY),
        color: fog.color,
        camera_pos: view.eye,
        density: fog.density.max(0.0),
        height_falloff: fog.height_falloff,
        start_distance: fog.start_distance.max(0.0),
        cutoff_distance: fog.cutoff_distance,
        max_opacity: fog.max_opacity.clamp(0.0, 1.0),
        fog_position: fog.position,
        near: view.near,
        far: view.far,
        _pad: [0.0; 3],
    }
}

/// Blends height fog over the scene color in viewports that show fog.
#[derive(Debug, Default)]
pub struct FogLane {
    pass: Option<FullscreenPass>,
    active: bool,
}

impl FogLane {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderLane for FogLane {
    fn name(&self) -> &'static str {
        "FogLane"
    }

    fn on_gpu_init(&mut self, resources: &mut GpuResourceManager, shaders: &ShaderLibrary) -> Result<(), RenderError> {
        resources.create_constant_buffer::<FogConstants>(FOG_CONSTANTS)?;
        self.pass = Some(FullscreenPass::new(
            resources,
            shaders,
            "Fog Pass",
            FOG_FILE,
            INPUTS,
            BlendMode::AlphaBlend,
        )?);
        log::info!("FogLane: initialized");
        Ok(())
    }

    fn on_shaders_changed(&mut self, shaders: &ShaderSnapshot) {
        if let Some(pass) = self.pass.as_mut() {
            pass.rebuild(shaders);
        }
    }

    fn prepare(&mut self, ctx: &mut FrameContext<'_>) -> Result<(), RenderError> {
        self.active = ctx.viewport.shows(ShowFlags::FOG) && ctx.settings.fog.density > 0.0;
        if self.active {
            ctx.resources
                .update_constant(FOG_CONSTANTS, &fog_constants(&ctx.settings.fog, ctx.view))?;
        }
        Ok(())
    }

    fn render(&mut self, ctx: &mut FrameContext<'_>, encoder: &mut dyn CommandEncoder) -> Result<(), RenderError> {
        let Some(pass) = self.pass.as_mut() else {
            return Err(RenderError::NotInitialized);
        };
        if !self.active {
            return Ok(());
        }
        pass.draw(ctx, encoder)
    }

    fn clear(&mut self) {
        self.active = false;
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
    use approx::assert_relative_eq;
    use prism_core::math::Vec3;
    use prism_core::scene::Scene;
    use std::sync::Arc;

    #[test]
    fn test_constants_clamp_and_invert() {
        let frame = TestFrame::new(64, 64);
        let fog = FogSettings {
            max_opacity: 3.0,
            density: -1.0,
            ..Default::default()
        };
        let c = fog_constants(&fog, &frame.view);
        assert_eq!(c.max_opacity, 1.0);
        assert_eq!(c.density, 0.0);
        assert_eq!(c.camera_pos, frame.view.eye);

        // The inverse view projection takes the clip-space image of a point
        // back to that point.
        let p = Vec3::new(1.0, 2.0, 0.5);
        let clip = frame.view.view_projection() * p.extend(1.0);
        let back = c.inv_view_proj * clip;
        let back = back.truncate() / back.w;
        assert_relative_eq!(back.x, p.x, epsilon = 1e-3);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-3);
        assert_relative_eq!(back.z, p.z, epsilon = 1e-3);
    }

    #[test]
    fn test_fog_flag_gates_the_pass() {
        let device = Arc::new(MockDevice::default());
        let mut resources = shared_resources(&device, 64, 64);
        let mut lane = FogLane::new();
        lane.on_gpu_init(&mut resources, &shader_library(&device)).unwrap();
        assert!(lane.is_ready());

        let scene = Scene::new();
        let mut frame = TestFrame::new(64, 64);
        let mut encoder = MockEncoder::new(&device);
        device.take_commands();
        {
            let mut ctx = frame.ctx(&resources, &scene);
            lane.prepare(&mut ctx).unwrap();
            lane.render(&mut ctx, &mut encoder).unwrap();
        }
        assert!(device.take_commands().contains(&Command::BeginRender("Fog Pass".into())));

        frame.viewport.show_flags.remove(ShowFlags::FOG);
        {
            let mut ctx = frame.ctx(&resources, &scene);
            lane.prepare(&mut ctx).unwrap();
            lane.render(&mut ctx, &mut encoder).unwrap();
        }
        assert!(device.take_commands().is_empty());
    }
}
