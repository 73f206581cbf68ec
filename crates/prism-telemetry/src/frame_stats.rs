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

//! Per-frame renderer counters.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::ops::AddAssign;

/// Counters accumulated while one frame is recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameStats {
    /// `draw` and `draw_indexed` calls.
    pub draw_calls: u32,
    /// Compute dispatches.
    pub dispatches: u32,
    /// Lights written into the light buffer.
    pub lights_written: u32,
    /// Lights dropped because the light buffer was full.
    pub lights_dropped: u32,
    /// Culling tiles dispatched.
    pub tiles: u32,
    /// Mesh instances and billboards rejected by frustum culling.
    pub culled_objects: u32,
    /// Debug line segments drawn.
    pub line_segments: u32,
    /// Viewports rendered.
    pub viewports: u32,
}

impl FrameStats {
    /// Serializes the counters as a compact JSON object.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Logs the counters at debug level.
    pub fn log(&self, frame: u64) {
        log::debug!(
            "Frame {frame}: {} draws, {} dispatches over {} tiles, {} lights ({} dropped), {} culled",
            self.draw_calls,
            self.dispatches,
            self.tiles,
            self.lights_written,
            self.lights_dropped,
            self.culled_objects
        );
    }
}

impl AddAssign for FrameStats {
    fn add_assign(&mut self, rhs: Self) {
        self.draw_calls += rhs.draw_calls;
        self.dispatches += rhs.dispatches;
        self.lights_written += rhs.lights_written;
        self.lights_dropped += rhs.lights_dropped;
        self.tiles += rhs.tiles;
        self.culled_objects += rhs.culled_objects;
        self.line_segments += rhs.line_segments;
        self.viewports += rhs.viewports;
    }
}

/// A bounded window of recent frames.
#[derive(Debug, Clone)]
pub struct FrameStatsHistory {
    frames: VecDeque<FrameStats>,
    capacity: usize,
    total_frames: u64,
}

impl FrameStatsHistory {
    /// Keeps the last `capacity` frames (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
            total_frames: 0,
        }
    }

    /// Appends a frame, evicting the oldest one when full, and logs it.
    pub fn record(&mut self, stats: FrameStats) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(stats);
        stats.log(self.total_frames);
        self.total_frames += 1;
    }

    /// The most recent frame.
    pub fn latest(&self) -> Option<&FrameStats> {
        self.frames.back()
    }

    /// Frames recorded since creation.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Mean draw calls over the window.
    pub fn average_draw_calls(&self) -> f32 {
        if self.frames.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.frames.iter().map(|f| u64::from(f.draw_calls)).sum();
        sum as f32 / self.frames.len() as f32
    }

    /// Whether any frame in the window dropped lights.
    pub fn dropped_lights(&self) -> bool {
        self.frames.iter().any(|f| f.lights_dropped > 0)
    }
}

impl Default for FrameStatsHistory {
    fn default() -> Self {
        Self::new(120)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate() {
        let mut total = FrameStats::default();
        total += FrameStats {
            draw_calls: 3,
            dispatches: 1,
            ..Default::default()
        };
        total += FrameStats {
            draw_calls: 2,
            lights_dropped: 4,
            ..Default::default()
        };
        assert_eq!(total.draw_calls, 5);
        assert_eq!(total.dispatches, 1);
        assert_eq!(total.lights_dropped, 4);
    }

    #[test]
    fn test_history_window() {
        let mut history = FrameStatsHistory::new(2);
        for draws in [10, 20, 30] {
            history.record(FrameStats {
                draw_calls: draws,
                ..Default::default()
            });
        }
        assert_eq!(history.total_frames(), 3);
        assert_eq!(history.latest().map(|f| f.draw_calls), Some(30));
        assert_eq!(history.average_draw_calls(), 25.0);
        assert!(!history.dropped_lights());
    }

    #[test]
    fn test_json_fields() {
        let json = FrameStats {
            tiles: 8160,
            ..Default::default()
        }
        .to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["tiles"], 8160);
        assert_eq!(value["draw_calls"], 0);
    }
}
