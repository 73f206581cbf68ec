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

//! Gathers the scene's lights into the shared light buffer.
//!
//! Runs first for every viewport: the culling pass and the lit mesh shaders
//! both index the records written here. Nothing is drawn.

use super::{FrameContext, RenderLane};
use crate::resources::{GpuResourceManager, LIGHT_BUFFER, LIGHT_HEADER};
use crate::shader_library::ShaderLibrary;
use prism_core::math::Aabb;
use prism_core::renderer::{
    CommandEncoder, GpuLightRecord, LightBufferHeader, LightKind, RenderError,
};
use prism_core::scene::SceneSource;
use prism_core::viewport::ShowFlags;
use std::mem::size_of;

const RECORD_SIZE: usize = size_of::<GpuLightRecord>();

/// Writes every light of the active world as a [`GpuLightRecord`].
///
/// Lights are collected point lights first, then spot lights, then
/// directional lights, each group in scene order. Lights beyond the buffer
/// capacity are dropped with a warning; disabled lights keep their slot and
/// are skipped by the shaders.
#[derive(Debug)]
pub struct LightBufferLane {
    capacity: usize,
    records: Vec<GpuLightRecord>,
    // Slots written by the previous upload, zeroed when the count shrinks.
    high_water: usize,
    ready: bool,
}

impl LightBufferLane {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Vec::with_capacity(capacity.min(1024)),
            high_water: 0,
            ready: false,
        }
    }

    /// Number of records the buffer holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records written by the last [`RenderLane::prepare`].
    pub fn records(&self) -> &[GpuLightRecord] {
        &self.records
    }

    /// Fills `records` with the active world's lights in collection order,
    /// stopping at `capacity`. Returns the number of lights dropped.
    pub fn collect(scene: &dyn SceneSource, capacity: usize, records: &mut Vec<GpuLightRecord>) -> usize {
        records.clear();
        let world = scene.active_world();
        let mut dropped = 0;
        for kind in LightKind::COLLECTION_ORDER {
            for light in scene
                .light_instances()
                .iter()
                .filter(|l| l.world == world && l.kind == kind)
            {
                if records.len() == capacity {
                    dropped += 1;
                    continue;
                }
                records.push(GpuLightRecord::from_parts(
                    kind,
                    light.position(),
                    light.direction(),
                    &light.params,
                ));
            }
        }
        dropped
    }

    fn push_volumes(&self, ctx: &mut FrameContext<'_>) {
        let show_volumes = ctx.settings.show_light_volumes && ctx.viewport.shows(ShowFlags::PRIMITIVES);
        let show_bounds = ctx.viewport.shows(ShowFlags::AABB);
        if !show_volumes && !show_bounds {
            return;
        }
        let color = ctx.settings.light_volume_color;
        for record in self.records.iter().filter(|r| r.enabled != 0) {
            let position = record.position.into();
            match record.light_kind() {
                Some(LightKind::Point) => {
                    if show_volumes {
                        ctx.primitives.add_sphere(position, record.radius, color);
                    }
                    if show_bounds {
                        let bounds = Aabb::from_center_half_extents(
                            position,
                            prism_core::math::Vec3::splat(record.radius),
                        );
                        ctx.primitives.add_aabb(&bounds, ctx.settings.bounds_color);
                    }
                }
                Some(LightKind::Spot) if show_volumes => {
                    ctx.primitives.add_cone(
                        position,
                        record.direction.into(),
                        record.radius,
                        record.outer_cone_angle,
                        color,
                    );
                }
                _ => {}
            }
        }
    }
}

impl Default for LightBufferLane {
    fn default() -> Self {
        Self::new(prism_core::renderer::MAX_LIGHTS)
    }
}

impl RenderLane for LightBufferLane {
    fn name(&self) -> &'static str {
        "LightBufferLane"
    }

    fn on_gpu_init(
        &mut self,
        resources: &mut GpuResourceManager,
        _shaders: &ShaderLibrary,
    ) -> Result<(), RenderError> {
        resources.create_constant_buffer::<LightBufferHeader>(LIGHT_HEADER)?;
        resources.create_structured_buffer(LIGHT_BUFFER, (self.capacity * RECORD_SIZE) as u64)?;
        self.high_water = 0;
        self.ready = true;
        log::info!("LightBufferLane: light buffer ready for {} lights", self.capacity);
        Ok(())
    }

    fn prepare(&mut self, ctx: &mut FrameContext<'_>) -> Result<(), RenderError> {
        let dropped = Self::collect(ctx.scene, self.capacity, &mut self.records);
        if dropped > 0 {
            log::warn!(
                "LightBufferLane: light buffer full, dropped {dropped} of {} lights",
                self.records.len() + dropped
            );
        }
        let count = self.records.len();
        ctx.stats.lights_written += count as u32;
        ctx.stats.lights_dropped += dropped as u32;

        if count > 0 {
            ctx.resources
                .update_structured(LIGHT_BUFFER, 0, bytemuck::cast_slice(&self.records))?;
        }
        if self.high_water > count {
            let stale = vec![0u8; (self.high_water - count) * RECORD_SIZE];
            ctx.resources
                .update_structured(LIGHT_BUFFER, (count * RECORD_SIZE) as u64, &stale)?;
        }
        self.high_water = count;
        ctx.resources
            .update_constant(LIGHT_HEADER, &LightBufferHeader::new(count as u32))?;

        self.push_volumes(ctx);
        Ok(())
    }

    fn render(
        &mut self,
        _ctx: &mut FrameContext<'_>,
        _encoder: &mut dyn CommandEncoder,
    ) -> Result<(), RenderError> {
        Ok(())
    }

    fn clear(&mut self) {
        self.records.clear();
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn on_gpu_shutdown(&mut self) {
        self.records.clear();
        self.high_water = 0;
        self.ready = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{shader_library, shared_resources, MockDevice, TestFrame};
    use prism_core::math::{LinearRgba, Mat4, Vec3};
    use prism_core::renderer::LightParams;
    use prism_core::scene::{LightInstance, Scene, WorldId};
    use std::sync::Arc;

    fn light(id: u32, kind: LightKind, x: f32) -> LightInstance {
        LightInstance {
            id,
            world: WorldId(0),
            kind,
            transform: Mat4::from_translation(Vec3::new(x, 0.0, 0.0)),
            params: LightParams::default(),
        }
    }

    fn header_count(device: &MockDevice, resources: &GpuResourceManager) -> u32 {
        let bytes = device
            .buffer_contents(*resources.buffer(LIGHT_HEADER).unwrap())
            .unwrap();
        u32::from_le_bytes(bytes[16..20].try_into().unwrap())
    }

    #[test]
    fn test_collection_order_and_world_filter() {
        let mut scene = Scene::new();
        scene.add_light(light(1, LightKind::Directional, 0.0));
        scene.add_light(light(2, LightKind::Spot, 1.0));
        scene.add_light(light(3, LightKind::Point, 2.0));
        let mut other = light(4, LightKind::Point, 3.0);
        other.world = WorldId(7);
        scene.add_light(other);

        let mut records = Vec::new();
        let dropped = LightBufferLane::collect(&scene, 16, &mut records);
        assert_eq!(dropped, 0);
        let kinds: Vec<_> = records.iter().map(|r| r.light_kind()).collect();
        assert_eq!(
            kinds,
            vec![Some(LightKind::Point), Some(LightKind::Spot), Some(LightKind::Directional)]
        );
    }

    #[test]
    fn test_overflow_is_dropped() {
        let mut scene = Scene::new();
        for i in 0..5 {
            scene.add_light(light(i, LightKind::Point, i as f32));
        }
        let mut records = Vec::new();
        assert_eq!(LightBufferLane::collect(&scene, 3, &mut records), 2);
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_shrinking_count_zeroes_stale_slots() {
        let device = Arc::new(MockDevice::default());
        let mut resources = shared_resources(&device, 64, 64);
        let mut lane = LightBufferLane::new(8);
        lane.on_gpu_init(&mut resources, &shader_library(&device)).unwrap();

        let mut scene = Scene::new();
        for i in 0..5 {
            scene.add_light(light(i, LightKind::Point, i as f32));
        }
        let mut frame = TestFrame::new(64, 64);
        lane.prepare(&mut frame.ctx(&resources, &scene)).unwrap();
        assert_eq!(header_count(&device, &resources), 5);

        scene.lights_mut().truncate(2);
        lane.prepare(&mut frame.ctx(&resources, &scene)).unwrap();
        assert_eq!(header_count(&device, &resources), 2);

        let contents = device
            .buffer_contents(*resources.buffer(LIGHT_BUFFER).unwrap())
            .unwrap();
        let records: Vec<GpuLightRecord> = contents[..8 * RECORD_SIZE]
            .chunks_exact(RECORD_SIZE)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        assert_eq!(records[1].kind, LightKind::Point.gpu_code());
        assert!(records[2..].iter().all(|r| r.kind == 0 && r.enabled == 0));
        assert_eq!(frame.stats.lights_written, 7);
    }

    #[test]
    fn test_light_volumes_follow_flags() {
        let device = Arc::new(MockDevice::default());
        let mut resources = shared_resources(&device, 64, 64);
        let mut lane = LightBufferLane::new(8);
        lane.on_gpu_init(&mut resources, &shader_library(&device)).unwrap();

        let mut scene = Scene::new();
        scene.add_light(light(1, LightKind::Point, 0.0));
        scene.add_light(light(2, LightKind::Spot, 0.0));
        let mut disabled = light(3, LightKind::Point, 0.0);
        disabled.params.enabled = false;
        scene.add_light(disabled);

        let mut frame = TestFrame::new(64, 64);
        frame.settings.light_volume_color = LinearRgba::RED;
        lane.prepare(&mut frame.ctx(&resources, &scene)).unwrap();
        assert_eq!(frame.primitives.spheres().len(), 1);
        assert_eq!(frame.primitives.cones().len(), 1);
        assert_eq!(frame.primitives.boxes().len(), 1);

        frame.primitives.clear();
        frame.viewport.show_flags = ShowFlags::empty();
        lane.prepare(&mut frame.ctx(&resources, &scene)).unwrap();
        assert!(frame.primitives.is_empty());
    }
}
