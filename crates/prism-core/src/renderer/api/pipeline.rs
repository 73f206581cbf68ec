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

//! Render and compute pipeline descriptors.

use super::{BindGroupLayoutId, ShaderModuleId, TextureFormat};
use std::borrow::Cow;

/// An opaque handle to a render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderPipelineId(pub usize);

/// An opaque handle to a compute pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputePipelineId(pub usize);

/// An opaque handle to a pipeline layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineLayoutId(pub usize);

/// Describes the bind group layouts used by a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineLayoutDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<&'a str>,
    /// Layouts in group order (`@group(0)`, `@group(1)`...).
    pub bind_group_layouts: &'a [BindGroupLayoutId],
}

/// How vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Every three vertices form a triangle.
    #[default]
    TriangleList,
    /// Triangles sharing edges with their predecessor.
    TriangleStrip,
    /// Every two vertices form a line.
    LineList,
}

/// How triangles are rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PolygonMode {
    /// Filled triangles.
    #[default]
    Fill,
    /// Triangle edges only.
    Line,
}

/// Which faces are culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Keep every face.
    #[default]
    None,
    /// Drop back faces.
    Back,
}

/// Rasterizer state of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PrimitiveState {
    /// Primitive assembly.
    pub topology: PrimitiveTopology,
    /// Fill or wireframe.
    pub polygon_mode: PolygonMode,
    /// Face culling.
    pub cull_mode: CullMode,
}

/// Depth comparison used by the depth test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    /// Passes if the new value is closer.
    Less,
    /// Passes if the new value is closer or equal.
    LessEqual,
    /// Always passes (depth test disabled).
    Always,
}

/// Depth state of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    /// Format of the depth attachment.
    pub format: TextureFormat,
    /// Whether passing fragments write depth.
    pub depth_write_enabled: bool,
    /// The depth comparison.
    pub depth_compare: CompareFunction,
}

impl DepthStencilState {
    /// Standard depth testing with writes.
    pub const fn opaque(format: TextureFormat) -> Self {
        Self {
            format,
            depth_write_enabled: true,
            depth_compare: CompareFunction::LessEqual,
        }
    }

    /// Depth attachment present but neither tested nor written.
    pub const fn disabled(format: TextureFormat) -> Self {
        Self {
            format,
            depth_write_enabled: false,
            depth_compare: CompareFunction::Always,
        }
    }
}

/// Blending applied to a color target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Replace the destination.
    #[default]
    Opaque,
    /// Classic `src * a + dst * (1 - a)`.
    AlphaBlend,
}

/// A color output of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorTargetState {
    /// Format of the attachment.
    pub format: TextureFormat,
    /// Blending applied when writing.
    pub blend: BlendMode,
}

/// Format of a single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// Two 32-bit floats.
    Float32x2,
    /// Three 32-bit floats.
    Float32x3,
    /// Four 32-bit floats.
    Float32x4,
}

impl VertexFormat {
    /// Size of the attribute in bytes.
    pub const fn size(&self) -> u64 {
        match self {
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

/// A vertex attribute inside a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Attribute format.
    pub format: VertexFormat,
    /// Byte offset inside one vertex.
    pub offset: u64,
    /// `@location(n)` in the shader.
    pub shader_location: u32,
}

/// Whether a buffer advances per vertex or per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexStepMode {
    /// Advance per vertex.
    #[default]
    Vertex,
    /// Advance per instance.
    Instance,
}

/// Layout of one vertex buffer slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexBufferLayout<'a> {
    /// Distance in bytes between consecutive elements.
    pub array_stride: u64,
    /// Per-vertex or per-instance stepping.
    pub step_mode: VertexStepMode,
    /// Attributes read from this buffer.
    pub attributes: Cow<'a, [VertexAttribute]>,
}

/// Describes a render pipeline to be created.
#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Pipeline layout; `None` lets the backend derive one.
    pub layout: Option<PipelineLayoutId>,
    /// Module holding both entry points.
    pub shader_module: ShaderModuleId,
    /// Vertex entry point.
    pub vertex_entry: Cow<'a, str>,
    /// Fragment entry point; `None` for depth-only pipelines.
    pub fragment_entry: Option<Cow<'a, str>>,
    /// Vertex buffer slots.
    pub vertex_buffers: Cow<'a, [VertexBufferLayout<'a>]>,
    /// Color output, if any.
    pub color_target: Option<ColorTargetState>,
    /// Rasterizer state.
    pub primitive: PrimitiveState,
    /// Depth state, if a depth attachment is bound.
    pub depth_stencil: Option<DepthStencilState>,
}

/// Describes a compute pipeline to be created.
#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Pipeline layout; `None` lets the backend derive one.
    pub layout: Option<PipelineLayoutId>,
    /// Module holding the entry point.
    pub shader_module: ShaderModuleId,
    /// Compute entry point.
    pub entry_point: Cow<'a, str>,
}
