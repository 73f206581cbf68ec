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

//! Defines the RenderAgent, the central orchestrator for the rendering subsystem.

use super::pass::{pass_order, LaneSet, Pass};
use super::report::FrameReport;
use prism_core::config::RendererSettings;
use prism_core::renderer::{
    CameraConstants, GraphicsDevice, Operations, RenderError, RenderPassColorAttachment,
    RenderPassDepthStencilAttachment, RenderPassDescriptor, ScreenConstants, TextureFormat,
    TileGrid,
};
use prism_core::scene::SceneSource;
use prism_core::viewport::{ViewState, Viewport, ViewportGroup};
use prism_lanes::render_lane::{
    screen_constants, viewport_pixels, FrameContext, LightBufferLane, LightCullLane,
    PrimitiveBatch,
};
use prism_lanes::resources::{
    GpuResourceManager, CAMERA_CONSTANTS, SCENE_COLOR, SCENE_DEPTH, SCREEN_CONSTANTS,
};
use prism_lanes::shader_library::{DeviceShaderCompiler, ShaderLibrary};
use prism_lanes::RenderLane;
use prism_telemetry::{FrameStats, FrameStatsHistory};
use std::fmt;
use std::sync::Arc;

/// Frames kept in the statistics history.
const STATS_HISTORY: usize = 120;

/// Owns the shared targets, the shader library and the lanes, and records
/// every viewport of a frame.
///
/// Viewports share one color and one depth target sized by
/// [`RenderAgent::resize`]; each viewport draws into its own rectangle of
/// them. Each viewport is recorded into its own command buffer and
/// submitted before the next one starts, because the camera and screen
/// constants are rewritten per viewport.
pub struct RenderAgent {
    device: Arc<dyn GraphicsDevice>,
    settings: RendererSettings,
    resources: GpuResourceManager,
    shaders: Arc<ShaderLibrary>,
    lanes: LaneSet,
    // Debug primitives gathered by the lanes of the current viewport.
    primitives: PrimitiveBatch,
    // Generation of the shader table the lane pipelines were built from.
    shader_generation: u64,
    size: (u32, u32),
    frame_count: u64,
    history: FrameStatsHistory,
    shut_down: bool,
}

impl fmt::Debug for RenderAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderAgent")
            .field("size", &self.size)
            .field("frame_count", &self.frame_count)
            .field("shader_generation", &self.shader_generation)
            .finish_non_exhaustive()
    }
}

impl RenderAgent {
    /// Creates the agent with the built-in shaders compiled on `device`.
    ///
    /// Fails only when the shared targets cannot be created. A lane that
    /// fails to initialize is logged and skipped by every frame.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        settings: RendererSettings,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        let compiler = Arc::new(DeviceShaderCompiler::new(device.clone()));
        let shaders = Arc::new(ShaderLibrary::with_builtin_sources(compiler));
        Self::with_shader_library(device, settings, shaders, width, height)
    }

    /// Creates the agent around an existing shader library, for hosts that
    /// register extra sources or share the library with a watcher.
    pub fn with_shader_library(
        device: Arc<dyn GraphicsDevice>,
        settings: RendererSettings,
        shaders: Arc<ShaderLibrary>,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        let size = (width.max(1), height.max(1));
        let mut resources = GpuResourceManager::new(device.clone());
        create_targets(&mut resources, device.color_format(), size)?;
        resources.create_constant_buffer::<CameraConstants>(CAMERA_CONSTANTS)?;
        resources.create_constant_buffer::<ScreenConstants>(SCREEN_CONSTANTS)?;

        let mut lanes = LaneSet::new(&settings);
        for pass in Pass::ALL {
            let lane = lanes.get_mut(pass);
            if let Err(e) = lane.on_gpu_init(&mut resources, &shaders) {
                log::error!(
                    "RenderAgent: failed to initialize {}: {e}. The pass will be skipped.",
                    lane.name()
                );
            }
        }

        log::info!(
            "RenderAgent: ready at {}x{} on '{}'",
            size.0,
            size.1,
            device.get_adapter_info().name
        );
        Ok(Self {
            shader_generation: shaders.generation(),
            device,
            settings,
            resources,
            shaders,
            lanes,
            primitives: PrimitiveBatch::new(),
            size,
            frame_count: 0,
            history: FrameStatsHistory::new(STATS_HISTORY),
            shut_down: false,
        })
    }

    /// Recreates the shared targets and every size-dependent lane resource
    /// for a `width x height` surface.
    ///
    /// The old targets are released before the new ones are allocated.
    /// Resizing to the current size does nothing.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        let size = (width.max(1), height.max(1));
        if size == self.size {
            log::debug!("RenderAgent: resize to the current size {}x{} ignored", size.0, size.1);
            return Ok(());
        }
        create_targets(&mut self.resources, self.device.color_format(), size)?;
        self.size = size;

        for pass in Pass::ALL {
            let lane = self.lanes.get_mut(pass);
            if !lane.is_ready() {
                continue;
            }
            if let Err(e) = lane.on_resize(&mut self.resources, size.0, size.1) {
                log::error!("RenderAgent: {} failed to resize: {e}", lane.name());
            }
        }
        log::info!("RenderAgent: resized to {}x{}", size.0, size.1);
        Ok(())
    }

    /// Records and submits one frame for every viewport.
    ///
    /// Each viewport's camera is ticked before any culling. Viewports with
    /// an empty rectangle are skipped; a pass whose lane is not initialized
    /// or fails is skipped without affecting the other passes.
    pub fn render_frame(
        &mut self,
        scene: &dyn SceneSource,
        viewports: &mut [Viewport],
        group: &ViewportGroup,
    ) -> FrameReport {
        self.frame_count += 1;
        let mut report = FrameReport {
            frame: self.frame_count,
            ..Default::default()
        };
        if self.shut_down {
            log::warn!("RenderAgent: render_frame called after shutdown");
            return report;
        }

        self.sync_shaders();
        self.clear_targets();

        let mut stats = FrameStats::default();
        for viewport in viewports.iter_mut() {
            self.render_viewport(scene, viewport, group, &mut stats, &mut report);
        }

        stats.log(self.frame_count);
        self.history.record(stats);
        report.stats = stats;
        report
    }

    fn render_viewport(
        &mut self,
        scene: &dyn SceneSource,
        viewport: &mut Viewport,
        group: &ViewportGroup,
        stats: &mut FrameStats,
        report: &mut FrameReport,
    ) {
        let index = viewport.index;
        let (width, height) = viewport_pixels(viewport, self.size);
        if !viewport.rect.is_valid() || width == 0 || height == 0 {
            log::warn!("RenderAgent: viewport {index} has no pixels inside the target, skipped");
            report.skipped_viewports.push(index);
            return;
        }

        let view = viewport.camera.tick(group);
        let grid = self.settings.light_cull_config().tile_grid(width, height);
        if let Err(e) = self.write_view_constants(viewport, &view, grid) {
            log::error!("RenderAgent: viewport {index} skipped: {e}");
            report.skipped_viewports.push(index);
            return;
        }

        let viewport: &Viewport = viewport;
        let mut encoder = self.device.create_command_encoder(Some("Viewport Encoder"));
        {
            let mut ctx = FrameContext {
                resources: &self.resources,
                scene,
                viewport,
                view: &view,
                settings: &self.settings,
                primitives: &mut self.primitives,
                stats: &mut *stats,
                target_size: self.size,
            };

            for pass in pass_order(viewport.view_mode) {
                let lane = self.lanes.get_mut(pass);
                if !lane.is_ready() {
                    log::debug!("RenderAgent: {} is not initialized, skipped", lane.name());
                    report.skip(index, pass, "not initialized".to_string());
                    continue;
                }
                let result = lane
                    .prepare(&mut ctx)
                    .and_then(|()| lane.render(&mut ctx, encoder.as_mut()));
                match result {
                    Ok(()) => report.record(index, pass),
                    Err(e) => {
                        log::warn!("RenderAgent: {} skipped for viewport {index}: {e}", lane.name());
                        report.skip(index, pass, e.to_string());
                    }
                }
            }
        }

        // Per-viewport object lists never carry over to the next viewport.
        for pass in Pass::ALL {
            self.lanes.get_mut(pass).clear();
        }
        self.primitives.clear();

        self.device.submit_command_buffer(encoder.finish());
        stats.viewports += 1;
    }

    fn write_view_constants(
        &self,
        viewport: &Viewport,
        view: &ViewState,
        grid: TileGrid,
    ) -> Result<(), RenderError> {
        let camera = CameraConstants::new(view.view, view.projection, view.eye, view.near, view.far);
        self.resources.update_constant(CAMERA_CONSTANTS, &camera)?;
        self.resources
            .update_constant(SCREEN_CONSTANTS, &screen_constants(viewport, self.size, grid))?;
        Ok(())
    }

    /// Clears the shared targets once per frame; the lanes all load them.
    fn clear_targets(&self) {
        let (Some(color), Some(depth)) = (
            self.resources.target_view(SCENE_COLOR),
            self.resources.target_view(SCENE_DEPTH),
        ) else {
            log::error!("RenderAgent: scene targets are missing, nothing will be drawn");
            return;
        };
        let mut encoder = self.device.create_command_encoder(Some("Clear Encoder"));
        {
            let color_attachments = [RenderPassColorAttachment {
                view: color,
                ops: Operations::clear(self.settings.clear_color),
            }];
            let _pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: depth,
                    depth_ops: Some(Operations::clear(1.0)),
                }),
            });
        }
        self.device.submit_command_buffer(encoder.finish());
    }

    /// Rebuilds lane pipelines when the shader library published a new table.
    fn sync_shaders(&mut self) {
        let snapshot = self.shaders.snapshot();
        if snapshot.generation() == self.shader_generation {
            return;
        }
        log::info!(
            "RenderAgent: shader table generation {} published, rebuilding pipelines",
            snapshot.generation()
        );
        for pass in Pass::ALL {
            let lane = self.lanes.get_mut(pass);
            if lane.is_ready() {
                lane.on_shaders_changed(&snapshot);
            }
        }
        self.shader_generation = snapshot.generation();
    }

    /// Releases every lane and shared resource. Later frames record nothing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        for pass in Pass::ALL {
            self.lanes.get_mut(pass).on_gpu_shutdown();
        }
        self.primitives.clear();
        self.resources.release_all();
        self.shut_down = true;
        log::info!("RenderAgent: shut down after {} frames", self.frame_count);
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// The shared buffers and targets.
    pub fn resources(&self) -> &GpuResourceManager {
        &self.resources
    }

    /// The library the lanes compile from. Hand it to a shader watcher to
    /// hot-reload edits; the agent picks up new tables at the next frame.
    pub fn shader_library(&self) -> &Arc<ShaderLibrary> {
        &self.shaders
    }

    /// Size of the shared targets.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn stats_history(&self) -> &FrameStatsHistory {
        &self.history
    }

    /// Whether the lane behind `pass` initialized.
    pub fn is_pass_ready(&self, pass: Pass) -> bool {
        self.lanes.get(pass).is_ready()
    }

    pub fn light_buffer(&self) -> &LightBufferLane {
        &self.lanes.light_buffer
    }

    pub fn light_cull(&self) -> &LightCullLane {
        &self.lanes.light_cull
    }
}

impl Drop for RenderAgent {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// (Re)creates the shared color and depth targets.
fn create_targets(
    resources: &mut GpuResourceManager,
    color_format: TextureFormat,
    (width, height): (u32, u32),
) -> Result<(), RenderError> {
    resources.create_render_target(SCENE_COLOR, width, height, color_format)?;
    resources.create_render_target(SCENE_DEPTH, width, height, TextureFormat::Depth32Float)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::scene::Scene;
    use prism_core::viewport::ViewportRect;
    use prism_lanes::test_support::MockDevice;
    use std::sync::atomic::Ordering;

    fn agent(device: &Arc<MockDevice>, width: u32, height: u32) -> RenderAgent {
        RenderAgent::new(device.clone(), RendererSettings::default(), width, height).unwrap()
    }

    #[test]
    fn test_every_lane_initializes_on_a_working_device() {
        let device = Arc::new(MockDevice::default());
        let agent = agent(&device, 320, 240);
        assert!(Pass::ALL.iter().all(|p| agent.is_pass_ready(*p)));
        assert_eq!(agent.size(), (320, 240));
    }

    #[test]
    fn test_failed_pipelines_leave_lanes_inert_but_frames_run() {
        let device = Arc::new(MockDevice::default());
        device.fail_pipelines.store(true, Ordering::Relaxed);
        let mut agent = agent(&device, 320, 240);

        assert!(!agent.is_pass_ready(Pass::StaticMesh));
        // The light buffer has no render pipeline.
        assert!(agent.is_pass_ready(Pass::LightBuffer));

        let mut viewports = [Viewport::new(0, ViewportRect::new(0.0, 0.0, 320.0, 240.0))];
        let report = agent.render_frame(&Scene::new(), &mut viewports, &ViewportGroup::default());
        assert!(report.executed_for(0).contains(&Pass::LightBuffer));
        assert!(report.skipped.iter().any(|s| s.pass == Pass::StaticMesh));
        assert_eq!(report.stats.viewports, 1);
    }

    #[test]
    fn test_empty_viewport_is_skipped() {
        let device = Arc::new(MockDevice::default());
        let mut agent = agent(&device, 320, 240);
        let mut viewports = [
            Viewport::new(0, ViewportRect::new(0.0, 0.0, 0.0, 240.0)),
            Viewport::new(1, ViewportRect::new(400.0, 0.0, 100.0, 100.0)),
            Viewport::new(2, ViewportRect::new(0.0, 0.0, 320.0, 240.0)),
        ];
        let report = agent.render_frame(&Scene::new(), &mut viewports, &ViewportGroup::default());
        assert_eq!(report.skipped_viewports, vec![0, 1]);
        assert!(!report.executed_for(2).is_empty());
        assert_eq!(report.stats.viewports, 1);
    }

    #[test]
    fn test_shutdown_releases_resources() {
        let device = Arc::new(MockDevice::default());
        let mut agent = agent(&device, 64, 64);
        assert!(device.live_buffer_count() > 0);
        agent.shutdown();
        assert_eq!(agent.resources().live_buffers(), 0);
        assert_eq!(device.live_texture_count(), 0);

        let report = agent.render_frame(&Scene::new(), &mut [], &ViewportGroup::default());
        assert!(report.executed.is_empty());
    }
}
