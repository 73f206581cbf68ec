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

//! The passes of a viewport and the lanes behind them.

use prism_core::config::RendererSettings;
use prism_core::viewport::ViewMode;
use prism_lanes::render_lane::{
    BillboardLane, DepthDebugLane, FogLane, GizmoLane, LightBufferLane, LightCullDebugLane,
    LightCullLane, LineLane, StaticMeshLane,
};
use prism_lanes::RenderLane;

/// One pass of the per-viewport sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    LightBuffer,
    LightCull,
    StaticMesh,
    Billboard,
    Fog,
    DepthDebug,
    LightCullDebug,
    Line,
    Gizmo,
}

impl Pass {
    /// Every pass, in the order lanes are initialized.
    pub const ALL: [Pass; 9] = [
        Pass::LightBuffer,
        Pass::LightCull,
        Pass::StaticMesh,
        Pass::Billboard,
        Pass::Fog,
        Pass::DepthDebug,
        Pass::LightCullDebug,
        Pass::Line,
        Pass::Gizmo,
    ];
}

/// The passes run for a viewport in `mode`, in recording order.
///
/// Depth visualization replaces fog. The light-tile heat map replaces the
/// line and gizmo passes.
pub fn pass_order(mode: ViewMode) -> Vec<Pass> {
    let mut order = vec![Pass::LightBuffer, Pass::LightCull, Pass::StaticMesh, Pass::Billboard];
    order.push(if mode == ViewMode::SceneDepth {
        Pass::DepthDebug
    } else {
        Pass::Fog
    });
    if mode == ViewMode::LightDebug {
        order.push(Pass::LightCullDebug);
    } else {
        order.extend([Pass::Line, Pass::Gizmo]);
    }
    order
}

/// The lanes owned by the agent, one per [`Pass`].
#[derive(Debug)]
pub(crate) struct LaneSet {
    pub(crate) light_buffer: LightBufferLane,
    pub(crate) light_cull: LightCullLane,
    pub(crate) static_mesh: StaticMeshLane,
    pub(crate) billboard: BillboardLane,
    pub(crate) fog: FogLane,
    pub(crate) depth_debug: DepthDebugLane,
    pub(crate) light_cull_debug: LightCullDebugLane,
    pub(crate) line: LineLane,
    pub(crate) gizmo: GizmoLane,
}

impl LaneSet {
    pub(crate) fn new(settings: &RendererSettings) -> Self {
        Self {
            light_buffer: LightBufferLane::new(settings.max_lights),
            light_cull: LightCullLane::new(settings.light_cull_config()),
            static_mesh: StaticMeshLane::new(),
            billboard: BillboardLane::new(),
            fog: FogLane::new(),
            depth_debug: DepthDebugLane::new(),
            light_cull_debug: LightCullDebugLane::new(),
            line: LineLane::new(),
            gizmo: GizmoLane::new(),
        }
    }

    pub(crate) fn get(&self, pass: Pass) -> &dyn RenderLane {
        match pass {
            Pass::LightBuffer => &self.light_buffer,
            Pass::LightCull => &self.light_cull,
            Pass::StaticMesh => &self.static_mesh,
            Pass::Billboard => &self.billboard,
            Pass::Fog => &self.fog,
            Pass::DepthDebug => &self.depth_debug,
            Pass::LightCullDebug => &self.light_cull_debug,
            Pass::Line => &self.line,
            Pass::Gizmo => &self.gizmo,
        }
    }

    pub(crate) fn get_mut(&mut self, pass: Pass) -> &mut dyn RenderLane {
        match pass {
            Pass::LightBuffer => &mut self.light_buffer,
            Pass::LightCull => &mut self.light_cull,
            Pass::StaticMesh => &mut self.static_mesh,
            Pass::Billboard => &mut self.billboard,
            Pass::Fog => &mut self.fog,
            Pass::DepthDebug => &mut self.depth_debug,
            Pass::LightCullDebug => &mut self.light_cull_debug,
            Pass::Line => &mut self.line,
            Pass::Gizmo => &mut self.gizmo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lit_modes_run_fog_lines_and_gizmos() {
        for mode in [ViewMode::LitPhong, ViewMode::Unlit, ViewMode::Wireframe, ViewMode::WorldNormal] {
            assert_eq!(
                pass_order(mode),
                vec![
                    Pass::LightBuffer,
                    Pass::LightCull,
                    Pass::StaticMesh,
                    Pass::Billboard,
                    Pass::Fog,
                    Pass::Line,
                    Pass::Gizmo,
                ]
            );
        }
    }

    #[test]
    fn test_scene_depth_replaces_fog() {
        let order = pass_order(ViewMode::SceneDepth);
        assert!(order.contains(&Pass::DepthDebug));
        assert!(!order.contains(&Pass::Fog));
        assert_eq!(order.last(), Some(&Pass::Gizmo));
    }

    #[test]
    fn test_light_debug_skips_lines_and_gizmos() {
        let order = pass_order(ViewMode::LightDebug);
        assert_eq!(order.last(), Some(&Pass::LightCullDebug));
        assert!(!order.contains(&Pass::Line));
        assert!(!order.contains(&Pass::Gizmo));
        assert!(order.contains(&Pass::Fog));
    }

    #[test]
    fn test_culling_always_precedes_shading() {
        for mode in ViewMode::ALL {
            let order = pass_order(mode);
            let cull = order.iter().position(|p| *p == Pass::LightCull).unwrap();
            let mesh = order.iter().position(|p| *p == Pass::StaticMesh).unwrap();
            assert!(order[0] == Pass::LightBuffer && cull < mesh);
        }
    }

    #[test]
    fn test_lane_names_match_passes() {
        let lanes = LaneSet::new(&RendererSettings::default());
        let names: Vec<_> = Pass::ALL.iter().map(|p| lanes.get(*p).name()).collect();
        assert_eq!(names[0], "LightBufferLane");
        assert_eq!(names[1], "LightCullLane");
        assert_eq!(names[8], "GizmoLane");
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), Pass::ALL.len());
    }
}
