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

use super::pass::Pass;
use prism_telemetry::FrameStats;

/// A pass that recorded its commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassRecord {
    /// Index of the viewport it ran for.
    pub viewport: u32,
    pub pass: Pass,
}

/// A pass that did not run.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPass {
    pub viewport: u32,
    pub pass: Pass,
    /// Why it was skipped, as logged.
    pub reason: String,
}

/// What [`RenderAgent::render_frame`](super::RenderAgent::render_frame) did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Frame number, starting at 1.
    pub frame: u64,
    /// Passes that ran, in recording order.
    pub executed: Vec<PassRecord>,
    /// Passes that were skipped because their lane is not initialized or
    /// failed while recording.
    pub skipped: Vec<SkippedPass>,
    /// Viewports with an empty rectangle, or one outside the render target.
    pub skipped_viewports: Vec<u32>,
    pub stats: FrameStats,
}

impl FrameReport {
    /// The passes that ran for `viewport`, in order.
    pub fn executed_for(&self, viewport: u32) -> Vec<Pass> {
        self.executed
            .iter()
            .filter(|r| r.viewport == viewport)
            .map(|r| r.pass)
            .collect()
    }

    /// Whether every pass of every viewport ran.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.skipped_viewports.is_empty()
    }

    pub(crate) fn record(&mut self, viewport: u32, pass: Pass) {
        self.executed.push(PassRecord { viewport, pass });
    }

    pub(crate) fn skip(&mut self, viewport: u32, pass: Pass, reason: String) {
        self.skipped.push(SkippedPass { viewport, pass, reason });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executed_for_filters_by_viewport() {
        let mut report = FrameReport::default();
        report.record(0, Pass::LightBuffer);
        report.record(1, Pass::LightBuffer);
        report.record(0, Pass::LightCull);
        assert_eq!(report.executed_for(0), vec![Pass::LightBuffer, Pass::LightCull]);
        assert_eq!(report.executed_for(1), vec![Pass::LightBuffer]);
        assert!(report.is_complete());

        report.skip(1, Pass::Fog, "not initialized".into());
        assert!(!report.is_complete());
    }
}
