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

//! Built-in WGSL sources.
//!
//! The sources are embedded at compile time so a renderer works without a
//! shader directory; the hot-reload watcher replaces them by file name.

/// Tiled light culling compute shader.
pub const LIGHT_CULL_WGSL: &str = include_str!("light_cull.wgsl");

/// Static mesh shading, one entry point pair per shading model.
pub const STATIC_MESH_WGSL: &str = include_str!("static_mesh.wgsl");

/// Camera-facing atlas quads.
pub const BILLBOARD_WGSL: &str = include_str!("billboard.wgsl");

/// Instanced debug lines.
pub const LINE_WGSL: &str = include_str!("line.wgsl");

/// Transform gizmo handles.
pub const GIZMO_WGSL: &str = include_str!("gizmo.wgsl");

/// Height fog composite.
pub const FOG_WGSL: &str = include_str!("fog.wgsl");

/// Linearized depth view.
pub const DEPTH_DEBUG_WGSL: &str = include_str!("depth_debug.wgsl");

/// Per-tile light count heat map.
pub const LIGHT_CULL_DEBUG_WGSL: &str = include_str!("light_cull_debug.wgsl");

pub const LIGHT_CULL_FILE: &str = "light_cull.wgsl";
pub const STATIC_MESH_FILE: &str = "static_mesh.wgsl";
pub const BILLBOARD_FILE: &str = "billboard.wgsl";
pub const LINE_FILE: &str = "line.wgsl";
pub const GIZMO_FILE: &str = "gizmo.wgsl";
pub const FOG_FILE: &str = "fog.wgsl";
pub const DEPTH_DEBUG_FILE: &str = "depth_debug.wgsl";
pub const LIGHT_CULL_DEBUG_FILE: &str = "light_cull_debug.wgsl";

/// Every built-in source as `(file name, text)`.
pub const BUILTIN_SOURCES: &[(&str, &str)] = &[
    (LIGHT_CULL_FILE, LIGHT_CULL_WGSL),
    (STATIC_MESH_FILE, STATIC_MESH_WGSL),
    (BILLBOARD_FILE, BILLBOARD_WGSL),
    (LINE_FILE, LINE_WGSL),
    (GIZMO_FILE, GIZMO_WGSL),
    (FOG_FILE, FOG_WGSL),
    (DEPTH_DEBUG_FILE, DEPTH_DEBUG_WGSL),
    (LIGHT_CULL_DEBUG_FILE, LIGHT_CULL_DEBUG_WGSL),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_shaders_have_both_stages() {
        for source in [
            STATIC_MESH_WGSL,
            BILLBOARD_WGSL,
            LINE_WGSL,
            GIZMO_WGSL,
            FOG_WGSL,
            DEPTH_DEBUG_WGSL,
            LIGHT_CULL_DEBUG_WGSL,
        ] {
            assert!(source.contains("@vertex"));
            assert!(source.contains("@fragment"));
        }
    }

    #[test]
    fn test_light_cull_is_compute() {
        assert!(LIGHT_CULL_WGSL.contains("@compute"));
        assert!(LIGHT_CULL_WGSL.contains("fn cs_main"));
        assert!(LIGHT_CULL_WGSL.contains("@workgroup_size(16, 16, 1)"));
    }

    #[test]
    fn test_mesh_entry_points() {
        for entry in [
            "fn vs_main",
            "fn vs_gouraud",
            "fn fs_phong",
            "fn fs_lambert",
            "fn fs_gouraud",
            "fn fs_unlit",
            "fn fs_world_normal",
        ] {
            assert!(STATIC_MESH_WGSL.contains(entry), "missing {entry}");
        }
    }

    #[test]
    fn test_sources_are_unique() {
        let mut names: Vec<&str> = BUILTIN_SOURCES.iter().map(|(f, _)| *f).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), BUILTIN_SOURCES.len());
    }
}
