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

//! Acts as the orchestrator of the rendering subsystem.
//!
//! The agent decides *which* lanes run for a viewport and in what order; the
//! lanes record the GPU commands. Per viewport the order is fixed:
//!
//! 1. light buffer update
//! 2. tiled light culling
//! 3. static meshes
//! 4. billboards
//! 5. depth visualization *or* fog
//! 6. light-tile heat map *or* lines followed by gizmos
//!
//! Culling precedes mesh shading because the lit mesh shaders read the tile
//! lists written by the dispatch. Gizmos go last so nothing drawn later can
//! cover them.

mod agent;
mod pass;
mod report;

pub use agent::RenderAgent;
pub use pass::{pass_order, Pass};
pub use report::{FrameReport, PassRecord, SkippedPass};
