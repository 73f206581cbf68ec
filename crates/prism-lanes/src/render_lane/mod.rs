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

//! Render lanes: one per pass of the frame.

mod billboard_lane;
mod depth_debug_lane;
mod fog_lane;
mod fullscreen;
mod gizmo_lane;
mod light_buffer_lane;
mod light_cull_debug_lane;
mod light_cull_lane;
mod line_lane;
mod primitive_batch;
pub mod shaders;
mod static_mesh_lane;

pub use billboard_lane::*;
pub use depth_debug_lane::*;
pub use fog_lane::*;
pub use gizmo_lane::*;
pub use light_buffer_lane::*;
pub use light_cull_debug_lane::*;
pub use light_cull_lane::*;
pub use line_lane::*;
pub use primitive_batch::*;
pub use static_mesh_lane::*;

use crate::resources::{GpuResourceManager, OwnedBindGroup};
use crate::shader_library::{ShaderLibrary, ShaderSnapshot};
use prism_core::config::RendererSettings;
use prism_core::renderer::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutId, CommandEncoder,
    GraphicsDevice, RenderError, SamplerId, ScreenConstants, TextureViewId, TileGrid,
};
use prism_core::scene::SceneSource;
use prism_core::viewport::{ViewState, Viewport};
use prism_telemetry::FrameStats;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a lane reads or writes while one viewport is rendered.
pub struct FrameContext<'a> {
    /// Shared buffers and targets.
    pub resources: &'a GpuResourceManager,
    /// The scene being drawn.
    pub scene: &'a dyn SceneSource,
    /// The viewport being drawn.
    pub viewport: &'a Viewport,
    /// Matrices and frustum computed for this viewport this frame.
    pub view: &'a ViewState,
    /// Renderer settings.
    pub settings: &'a RendererSettings,
    /// Debug primitives for the line lane.
    pub primitives: &'a mut PrimitiveBatch,
    /// Frame counters.
    pub stats: &'a mut FrameStats,
    /// Size of the shared render targets.
    pub target_size: (u32, u32),
}

impl FrameContext<'_> {
    /// Screen constants for the viewport: the target size, the viewport
    /// rectangle as a fraction of the target, and its culling tile grid.
    pub fn screen_constants(&self, grid: TileGrid) -> ScreenConstants {
        screen_constants(self.viewport, self.target_size, grid)
    }

    /// Viewport size in whole pixels, clamped to the target.
    pub fn viewport_pixels(&self) -> (u32, u32) {
        viewport_pixels(self.viewport, self.target_size)
    }
}

/// See [`FrameContext::screen_constants`].
pub fn screen_constants(viewport: &Viewport, target_size: (u32, u32), grid: TileGrid) -> ScreenConstants {
    let (tw, th) = (target_size.0.max(1) as f32, target_size.1.max(1) as f32);
    let rect = viewport.rect;
    ScreenConstants {
        screen_size: [target_size.0, target_size.1],
        uv_offset: prism_core::math::Vec2::new(rect.x / tw, rect.y / th),
        uv_scale: prism_core::math::Vec2::new(rect.width / tw, rect.height / th),
        tile_count: [grid.tiles_x, grid.tiles_y],
    }
}

/// See [`FrameContext::viewport_pixels`].
pub fn viewport_pixels(viewport: &Viewport, target_size: (u32, u32)) -> (u32, u32) {
    let rect = viewport.rect;
    // Extent of [start, start + len) inside [0, limit).
    let visible = |start: f32, len: f32, limit: u32| {
        let end = (start + len).min(limit as f32);
        (end - start.max(0.0)).max(0.0).ceil() as u32
    };
    (
        visible(rect.x, rect.width, target_size.0),
        visible(rect.y, rect.height, target_size.1),
    )
}

/// A pass of the frame.
///
/// Lanes are created inert; [`RenderLane::on_gpu_init`] builds their layouts
/// and pipelines. A lane whose initialization failed reports
/// [`RenderLane::is_ready`] as `false` and the orchestrator skips it, so a
/// broken pass never takes the frame down with it.
///
/// Per viewport the orchestrator calls [`RenderLane::prepare`] then
/// [`RenderLane::render`] on each lane in a fixed order, and
/// [`RenderLane::clear`] once the viewport has been submitted.
pub trait RenderLane: Send + Sync {
    /// Name used in logs and frame reports.
    fn name(&self) -> &'static str;

    /// Creates layouts, pipelines and lane-owned buffers.
    fn on_gpu_init(
        &mut self,
        resources: &mut GpuResourceManager,
        shaders: &ShaderLibrary,
    ) -> Result<(), RenderError>;

    /// Recreates size-dependent resources. Called right after the shared
    /// targets have been recreated for the new size.
    fn on_resize(
        &mut self,
        _resources: &mut GpuResourceManager,
        _width: u32,
        _height: u32,
    ) -> Result<(), RenderError> {
        Ok(())
    }

    /// Rebuilds pipelines from a newly published shader table. On failure
    /// the lane keeps its previous pipelines.
    fn on_shaders_changed(&mut self, _shaders: &ShaderSnapshot) {}

    /// Collects this viewport's objects and uploads their constants.
    fn prepare(&mut self, _ctx: &mut FrameContext<'_>) -> Result<(), RenderError> {
        Ok(())
    }

    /// Records the pass.
    fn render(
        &mut self,
        ctx: &mut FrameContext<'_>,
        encoder: &mut dyn CommandEncoder,
    ) -> Result<(), RenderError>;

    /// Drops the per-viewport object lists.
    fn clear(&mut self) {}

    /// Whether [`RenderLane::on_gpu_init`] succeeded.
    fn is_ready(&self) -> bool;

    /// Releases every GPU resource the lane owns.
    fn on_gpu_shutdown(&mut self);
}

/// A bind group over shared resources, rebuilt whenever one of them has
/// been recreated.
#[derive(Debug, Default)]
pub(crate) struct SharedBindGroup {
    group: Option<OwnedBindGroup>,
    revisions: Vec<Option<u64>>,
}

impl SharedBindGroup {
    /// Returns the cached group, calling `create` first when any of the
    /// named resources changed since it was built.
    pub(crate) fn get_or_create(
        &mut self,
        resources: &GpuResourceManager,
        names: &[&str],
        create: impl FnOnce() -> Result<BindGroupId, RenderError>,
    ) -> Result<&BindGroupId, RenderError> {
        let revisions: Vec<Option<u64>> = names.iter().map(|n| resources.revision(n)).collect();
        if let Some(missing) = names.iter().zip(&revisions).find(|(_, r)| r.is_none()) {
            return Err(RenderError::RenderingFailed(format!(
                "shared resource '{}' does not exist",
                missing.0
            )));
        }
        if self.group.is_none() || self.revisions != revisions {
            // Release the stale group before building its replacement.
            self.group = None;
            let id = create()?;
            self.group = Some(OwnedBindGroup::new(resources.device().clone(), id));
            self.revisions = revisions;
        }
        self.group
            .as_ref()
            .map(OwnedBindGroup::id_ref)
            .ok_or(RenderError::NotInitialized)
    }

    pub(crate) fn get(&self) -> Option<&BindGroupId> {
        self.group.as_ref().map(OwnedBindGroup::id_ref)
    }

    pub(crate) fn reset(&mut self) {
        self.group = None;
        self.revisions.clear();
    }
}

/// One `texture + sampler` bind group per texture view.
#[derive(Debug, Default)]
pub(crate) struct TextureBindGroups {
    groups: HashMap<TextureViewId, OwnedBindGroup>,
}

impl TextureBindGroups {
    /// Builds the group for `view` on first use.
    pub(crate) fn ensure(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        layout: BindGroupLayoutId,
        view: TextureViewId,
        sampler: SamplerId,
    ) -> Result<(), RenderError> {
        if self.groups.contains_key(&view) {
            return Ok(());
        }
        let id = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Texture Bind Group"),
            layout,
            entries: &[
                BindGroupEntry::texture_view(0, view),
                BindGroupEntry::sampler(1, sampler),
            ],
        })?;
        self.groups.insert(view, OwnedBindGroup::new(device.clone(), id));
        Ok(())
    }

    pub(crate) fn get(&self, view: &TextureViewId) -> Option<&BindGroupId> {
        self.groups.get(view).map(OwnedBindGroup::id_ref)
    }

    pub(crate) fn clear(&mut self) {
        self.groups.clear();
    }
}

/// Looks up a shared buffer, failing the pass when it is missing.
pub(crate) fn require_buffer(
    resources: &GpuResourceManager,
    name: &str,
) -> Result<prism_core::renderer::BufferId, RenderError> {
    resources
        .buffer(name)
        .copied()
        .ok_or_else(|| RenderError::RenderingFailed(format!("buffer '{name}' does not exist")))
}

/// Looks up the sampling view of a shared target, failing the pass when it
/// is missing.
pub(crate) fn require_sample_view(
    resources: &GpuResourceManager,
    name: &str,
) -> Result<prism_core::renderer::TextureViewId, RenderError> {
    resources
        .sample_view(name)
        .copied()
        .ok_or_else(|| RenderError::RenderingFailed(format!("target '{name}' does not exist")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockDevice;
    use prism_core::renderer::LightCullConfig;
    use prism_core::viewport::ViewportRect;

    #[test]
    fn test_screen_constants_for_split_viewport() {
        let viewport = Viewport::new(1, ViewportRect::new(960.0, 0.0, 960.0, 540.0));
        let grid = LightCullConfig::new().tile_grid(960, 540);
        let c = screen_constants(&viewport, (1920, 1080), grid);
        assert_eq!(c.screen_size, [1920, 1080]);
        assert_eq!(c.uv_offset.x, 0.5);
        assert_eq!(c.uv_scale.y, 0.5);
        assert_eq!(c.tile_count, [60, 34]);
        assert_eq!(viewport_pixels(&viewport, (1920, 1080)), (960, 540));
        assert_eq!(viewport_pixels(&viewport, (1000, 1080)), (40, 540));
    }

    #[test]
    fn test_viewport_partly_off_screen_keeps_visible_part() {
        let left = Viewport::new(0, ViewportRect::new(-100.0, -50.0, 400.0, 300.0));
        assert_eq!(viewport_pixels(&left, (1920, 1080)), (300, 250));

        let gone = Viewport::new(1, ViewportRect::new(-500.0, 0.0, 400.0, 300.0));
        assert_eq!(viewport_pixels(&gone, (1920, 1080)).0, 0);

        let both = Viewport::new(2, ViewportRect::new(-10.0, 0.0, 2000.0, 100.0));
        assert_eq!(viewport_pixels(&both, (1920, 1080)), (1920, 100));
    }

    #[test]
    fn test_shared_bind_group_follows_revisions() {
        let device = Arc::new(MockDevice::default());
        let mut resources = GpuResourceManager::new(device.clone());
        resources.create_structured_buffer("A", 64).unwrap();

        let mut shared = SharedBindGroup::default();
        let create = || {
            device
                .create_bind_group(&BindGroupDescriptor {
                    label: None,
                    layout: BindGroupLayoutId(0),
                    entries: &[],
                })
                .map_err(RenderError::from)
        };
        let first = *shared.get_or_create(&resources, &["A"], create).unwrap();
        let again = *shared.get_or_create(&resources, &["A"], create).unwrap();
        assert_eq!(first, again);

        resources.create_structured_buffer("A", 64).unwrap();
        let rebuilt = *shared.get_or_create(&resources, &["A"], create).unwrap();
        assert_ne!(first, rebuilt);
        assert_eq!(device.live_bind_group_count(), 1);

        assert!(shared.get_or_create(&resources, &["Missing"], create).is_err());
    }
}
