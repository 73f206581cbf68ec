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

//! Drives the render agent against the recording mock device.

use bytemuck::Zeroable;
use prism_agents::render_agent::{Pass, RenderAgent};
use prism_core::config::RendererSettings;
use prism_core::math::{Aabb, Mat4, Vec3};
use prism_core::renderer::{GpuLightRecord, LightBufferHeader, LightKind, LightParams};
use prism_core::scene::{LightInstance, MeshInstance, Scene, Selection, WorldId};
use prism_core::viewport::{ViewMode, Viewport, ViewportCamera, ViewportGroup, ViewportRect};
use prism_lanes::render_lane::shaders::{FOG_FILE, FOG_WGSL};
use prism_lanes::resources::{LIGHT_BUFFER, LIGHT_HEADER};
use prism_lanes::test_support::{quad_mesh, Command, MockDevice};
use std::sync::Arc;

fn agent(device: &Arc<MockDevice>, width: u32, height: u32) -> RenderAgent {
    RenderAgent::new(device.clone(), RendererSettings::default(), width, height).unwrap()
}

fn full_viewport(width: u32, height: u32) -> Viewport {
    Viewport::new(0, ViewportRect::new(0.0, 0.0, width as f32, height as f32))
}

fn point_light(id: u32, at: Vec3) -> LightInstance {
    LightInstance {
        id,
        world: WorldId(0),
        kind: LightKind::Point,
        transform: Mat4::from_translation(at),
        params: LightParams::default(),
    }
}

/// A quad at the origin with a selected object, so every geometry pass
/// has something to draw.
fn furnished_scene() -> Scene {
    let mut scene = Scene::new();
    let mesh = scene.add_mesh_data(quad_mesh());
    scene.add_mesh(MeshInstance {
        id: 1,
        world: WorldId(0),
        transform: Mat4::IDENTITY,
        bounds: Aabb::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0)),
        mesh,
        subsets: Vec::new(),
        selected_sub_mesh: None,
        is_selected: true,
        is_gizmo: false,
    });
    scene.set_selection(Some(Selection {
        id: 1,
        transform: Mat4::IDENTITY,
    }));
    scene
}

fn pass_labels(commands: &[Command]) -> Vec<String> {
    commands
        .iter()
        .filter_map(|c| match c {
            Command::BeginRender(label) | Command::BeginCompute(label) => Some(label.clone()),
            _ => None,
        })
        .collect()
}

fn dispatches(commands: &[Command]) -> Vec<(u32, u32, u32)> {
    commands
        .iter()
        .filter_map(|c| match c {
            Command::Dispatch(x, y, z) => Some((*x, *y, *z)),
            _ => None,
        })
        .collect()
}

fn read_header(device: &MockDevice, agent: &RenderAgent) -> LightBufferHeader {
    let id = *agent.resources().buffer(LIGHT_HEADER).unwrap();
    let bytes = device.buffer_contents(id).unwrap();
    bytemuck::pod_read_unaligned(&bytes[..std::mem::size_of::<LightBufferHeader>()])
}

fn read_records(device: &MockDevice, agent: &RenderAgent, count: usize) -> Vec<GpuLightRecord> {
    let id = *agent.resources().buffer(LIGHT_BUFFER).unwrap();
    let bytes = device.buffer_contents(id).unwrap();
    bytes
        .chunks_exact(std::mem::size_of::<GpuLightRecord>())
        .take(count)
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

#[test]
fn lit_viewport_runs_passes_in_fixed_order() {
    let device = Arc::new(MockDevice::default());
    let mut agent = agent(&device, 320, 240);
    let mut viewports = [full_viewport(320, 240)];

    let report = agent.render_frame(&furnished_scene(), &mut viewports, &ViewportGroup::default());
    assert!(report.is_complete(), "skipped: {:?}", report.skipped);
    assert_eq!(
        report.executed_for(0),
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
    assert_eq!(
        pass_labels(&device.take_commands()),
        vec!["Clear Pass", "Light Cull Pass", "Static Mesh Pass", "Fog Pass", "Line Pass", "Gizmo Pass"]
    );
}

#[test]
fn scene_depth_mode_replaces_fog_with_depth_view() {
    let device = Arc::new(MockDevice::default());
    let mut agent = agent(&device, 320, 240);
    let mut viewports = [full_viewport(320, 240)];
    viewports[0].view_mode = ViewMode::SceneDepth;

    agent.render_frame(&furnished_scene(), &mut viewports, &ViewportGroup::default());
    let labels = pass_labels(&device.take_commands());
    assert!(labels.contains(&"Depth Debug Pass".to_string()));
    assert!(!labels.contains(&"Fog Pass".to_string()));
    assert_eq!(labels.last().map(String::as_str), Some("Gizmo Pass"));
}

#[test]
fn light_debug_mode_skips_lines_and_gizmos() {
    let device = Arc::new(MockDevice::default());
    let mut agent = agent(&device, 320, 240);
    let mut viewports = [full_viewport(320, 240)];
    viewports[0].view_mode = ViewMode::LightDebug;

    let report = agent.render_frame(&furnished_scene(), &mut viewports, &ViewportGroup::default());
    assert!(!report.executed_for(0).contains(&Pass::Line));
    assert!(!report.executed_for(0).contains(&Pass::Gizmo));

    let labels = pass_labels(&device.take_commands());
    assert_eq!(labels.last().map(String::as_str), Some("Light Cull Debug Pass"));
    assert!(!labels.contains(&"Line Pass".to_string()));
}

#[test]
fn cull_dispatch_covers_every_pixel() {
    let device = Arc::new(MockDevice::default());
    let mut agent = agent(&device, 1920, 1080);
    let mut viewports = [full_viewport(1920, 1080)];
    let group = ViewportGroup::default();

    agent.render_frame(&Scene::new(), &mut viewports, &group);
    assert_eq!(dispatches(&device.take_commands()), vec![(120, 68, 1)]);

    agent.resize(1921, 1080).unwrap();
    viewports[0].resize(ViewportRect::new(0.0, 0.0, 1921.0, 1080.0));
    let report = agent.render_frame(&Scene::new(), &mut viewports, &group);
    assert_eq!(dispatches(&device.take_commands()), vec![(121, 68, 1)]);
    assert_eq!(agent.light_cull().last_dispatch(), Some((121, 68, 1)));
    assert_eq!(report.stats.tiles, 121 * 68);
}

#[test]
fn tile_lists_are_cleared_before_each_dispatch() {
    let device = Arc::new(MockDevice::default());
    let mut agent = agent(&device, 320, 240);
    let mut viewports = [
        Viewport::new(0, ViewportRect::new(0.0, 0.0, 160.0, 240.0)),
        Viewport::new(1, ViewportRect::new(160.0, 0.0, 160.0, 240.0)),
    ];

    let report = agent.render_frame(&Scene::new(), &mut viewports, &ViewportGroup::default());
    assert_eq!(report.stats.viewports, 2);
    assert_eq!(report.stats.dispatches, 2);

    let commands = device.take_commands();
    assert_eq!(dispatches(&commands), vec![(10, 15, 1), (10, 15, 1)]);
    // Two clears (indices and counts) ahead of every dispatch.
    let mut clears_since_dispatch = 0;
    for command in &commands {
        match command {
            Command::ClearBuffer(_) => clears_since_dispatch += 1,
            Command::Dispatch(..) => {
                assert_eq!(clears_since_dispatch, 2);
                clears_since_dispatch = 0;
            }
            _ => {}
        }
    }
}

#[test]
fn repeated_resizes_do_not_leak() {
    let device = Arc::new(MockDevice::default());
    let mut agent = agent(&device, 800, 600);
    let mut viewports = [full_viewport(800, 600)];
    let scene = furnished_scene();
    let group = ViewportGroup::default();
    let counts = |device: &MockDevice| {
        (
            device.live_buffer_count(),
            device.live_texture_count(),
            device.live_view_count(),
            device.live_bind_group_count(),
        )
    };

    agent.resize(1024, 768).unwrap();
    agent.render_frame(&scene, &mut viewports, &group);
    let once = counts(&device);
    let tile_bytes = agent.resources().buffer_size(prism_lanes::resources::TILE_LIGHT_COUNTS);

    for _ in 0..4 {
        agent.resize(1024, 768).unwrap();
    }
    agent.render_frame(&scene, &mut viewports, &group);
    assert_eq!(counts(&device), once);
    assert_eq!(
        agent.resources().buffer_size(prism_lanes::resources::TILE_LIGHT_COUNTS),
        tile_bytes
    );

    agent.resize(640, 480).unwrap();
    agent.resize(1024, 768).unwrap();
    agent.render_frame(&scene, &mut viewports, &group);
    assert_eq!(counts(&device), once);

    let grid = agent.light_cull().buffer_grid().unwrap();
    assert_eq!((grid.tiles_x, grid.tiles_y), (64, 48));
    assert!(tile_bytes.unwrap() >= 64 * 48 * 4);
}

#[test]
fn light_buffer_is_fully_rewritten_each_frame() {
    let device = Arc::new(MockDevice::default());
    let mut agent = agent(&device, 320, 240);
    let mut viewports = [full_viewport(320, 240)];
    let group = ViewportGroup::default();

    let mut scene = Scene::new();
    for i in 0..5 {
        scene.add_light(point_light(i, Vec3::new(i as f32 + 1.0, 0.0, 0.0)));
    }
    let report = agent.render_frame(&scene, &mut viewports, &group);
    assert_eq!(report.stats.lights_written, 5);
    assert_eq!(read_header(&device, &agent).light_count, 5);

    scene.lights_mut().truncate(2);
    agent.render_frame(&scene, &mut viewports, &group);
    assert_eq!(read_header(&device, &agent).light_count, 2);

    let records = read_records(&device, &agent, 5);
    assert_eq!(records[1].position, [2.0, 0.0, 0.0]);
    for stale in &records[2..] {
        assert_eq!(*stale, GpuLightRecord::zeroed());
    }
}

#[test]
fn single_point_light_reaches_the_gpu() {
    let device = Arc::new(MockDevice::default());
    let mut agent = agent(&device, 640, 480);
    let mut viewport = full_viewport(640, 480);
    viewport.camera = ViewportCamera::new(Vec3::new(0.0, 0.0, 20.0), Vec3::new(0.0, -90.0, 0.0));
    viewport.camera.set_aspect_from_rect(&viewport.rect);
    let mut viewports = [viewport];

    let mut scene = furnished_scene();
    scene.add_light(point_light(7, Vec3::ZERO));

    let report = agent.render_frame(&scene, &mut viewports, &ViewportGroup::default());
    assert!(report.is_complete(), "skipped: {:?}", report.skipped);
    assert_eq!(report.stats.dispatches, 1);

    assert_eq!(read_header(&device, &agent).light_count, 1);
    let record = read_records(&device, &agent, 1)[0];
    assert_eq!(record.position, [0.0, 0.0, 0.0]);
    assert_eq!(record.intensity, 10.0);
    assert_eq!(record.radius, 10.0);
    assert_eq!(record.light_kind(), Some(LightKind::Point));
    // Pitch was clamped on the way in.
    assert_eq!(viewports[0].camera.rotation().y, -89.0);
}

#[test]
fn lights_of_other_worlds_are_ignored() {
    let device = Arc::new(MockDevice::default());
    let mut agent = agent(&device, 320, 240);
    let mut viewports = [full_viewport(320, 240)];

    let mut scene = Scene::new();
    scene.add_light(point_light(1, Vec3::ZERO));
    let mut elsewhere = point_light(2, Vec3::ONE);
    elsewhere.world = WorldId(3);
    scene.add_light(elsewhere);

    let report = agent.render_frame(&scene, &mut viewports, &ViewportGroup::default());
    assert_eq!(report.stats.lights_written, 1);
}

#[test]
fn reloaded_shaders_are_picked_up_next_frame() {
    let device = Arc::new(MockDevice::default());
    let mut agent = agent(&device, 320, 240);
    let mut viewports = [full_viewport(320, 240)];
    let group = ViewportGroup::default();
    let generation = agent.shader_library().generation();

    let edited = format!("{FOG_WGSL}\n// denser\n");
    agent.shader_library().reload_source(FOG_FILE, &edited).unwrap();
    assert!(agent.shader_library().generation() > generation);

    let report = agent.render_frame(&furnished_scene(), &mut viewports, &group);
    assert!(report.is_complete(), "skipped: {:?}", report.skipped);
    assert!(pass_labels(&device.take_commands()).contains(&"Fog Pass".to_string()));
}

#[test]
fn stats_history_tracks_frames() {
    let device = Arc::new(MockDevice::default());
    let mut agent = agent(&device, 320, 240);
    let mut viewports = [full_viewport(320, 240)];
    for _ in 0..3 {
        agent.render_frame(&furnished_scene(), &mut viewports, &ViewportGroup::default());
    }
    assert_eq!(agent.frame_count(), 3);
    assert_eq!(agent.stats_history().total_frames(), 3);
    assert!(agent.stats_history().latest().unwrap().draw_calls > 0);
}
