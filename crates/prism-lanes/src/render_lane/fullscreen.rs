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

//! Shared plumbing of the full-screen passes: one triangle covering the
//! viewport, a single bind group over shared resources.

use super::{require_buffer, require_sample_view, FrameContext, SharedBindGroup};
use crate::resources::{
    GpuResourceManager, OwnedBindGroupLayout, OwnedPipelineLayout, OwnedRenderPipeline, SCENE_COLOR,
};
use crate::shader_library::{ShaderLibrary, ShaderSnapshot, VariantDesc};
use prism_core::renderer::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor, BindGroupLayoutEntry,
    BlendMode, ColorTargetState, CommandEncoder, GraphicsDevice, Operations,
    PipelineLayoutDescriptor, PrimitiveState, RenderError, RenderPassColorAttachment,
    RenderPassDescriptor, RenderPipelineDescriptor, ShaderStageFlags, TextureFormat,
    TextureSampleType,
};
use std::borrow::Cow;
use std::sync::Arc;

/// A shared resource read by a full-screen pass, bound at its index in the
/// input list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FullscreenInput {
    Uniform(&'static str),
    Storage(&'static str),
    Depth(&'static str),
}

impl FullscreenInput {
    fn name(self) -> &'static str {
        match self {
            Self::Uniform(n) | Self::Storage(n) | Self::Depth(n) => n,
        }
    }

    fn layout_entry(self, binding: u32) -> BindGroupLayoutEntry {
        let f = ShaderStageFlags::FRAGMENT;
        match self {
            Self::Uniform(_) => BindGroupLayoutEntry::uniform(binding, f),
            Self::Storage(_) => BindGroupLayoutEntry::storage(binding, f, true),
            Self::Depth(_) => BindGroupLayoutEntry::texture(binding, f, TextureSampleType::Depth),
        }
    }

    fn bind(self, binding: u32, resources: &GpuResourceManager) -> Result<BindGroupEntry, RenderError> {
        Ok(match self {
            Self::Uniform(n) | Self::Storage(n) => BindGroupEntry::buffer(binding, require_buffer(resources, n)?, None),
            Self::Depth(n) => BindGroupEntry::texture_view(binding, require_sample_view(resources, n)?),
        })
    }
}

#[derive(Debug)]
pub(crate) struct FullscreenPass {
    label: &'static str,
    inputs: &'static [FullscreenInput],
    blend: BlendMode,
    device: Arc<dyn GraphicsDevice>,
    layout: OwnedBindGroupLayout,
    pipeline_layout: OwnedPipelineLayout,
    variant: u64,
    color_format: TextureFormat,
    pipeline: Option<OwnedRenderPipeline>,
    bind_group: SharedBindGroup,
}

impl FullscreenPass {
    pub(crate) fn new(
        resources: &GpuResourceManager,
        shaders: &ShaderLibrary,
        label: &'static str,
        file: &str,
        inputs: &'static [FullscreenInput],
        blend: BlendMode,
    ) -> Result<Self, RenderError> {
        let device = resources.device().clone();
        let entries: Vec<_> = inputs
            .iter()
            .enumerate()
            .map(|(i, input)| input.layout_entry(i as u32))
            .collect();
        let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &entries,
        })?;
        let layout = OwnedBindGroupLayout::new(device.clone(), layout);
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[layout.id()],
        })?;
        let mut pass = Self {
            label,
            inputs,
            blend,
            pipeline_layout: OwnedPipelineLayout::new(device.clone(), pipeline_layout),
            layout,
            variant: shaders.register_variant(&VariantDesc::new(file, "fs_main"))?,
            color_format: resources
                .target_format(SCENE_COLOR)
                .unwrap_or_else(|| device.color_format()),
            pipeline: None,
            bind_group: SharedBindGroup::default(),
            device,
        };
        pass.pipeline = Some(pass.build_pipeline(&shaders.snapshot())?);
        Ok(pass)
    }

    fn build_pipeline(&self, snapshot: &ShaderSnapshot) -> Result<OwnedRenderPipeline, RenderError> {
        let id = self.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(Cow::Borrowed(self.label)),
            layout: Some(self.pipeline_layout.id()),
            shader_module: *snapshot.module(self.variant)?,
            vertex_entry: Cow::Borrowed("vs_fullscreen"),
            fragment_entry: Some(Cow::Borrowed("fs_main")),
            vertex_buffers: Cow::Borrowed(&[]),
            color_target: Some(ColorTargetState {
                format: self.color_format,
                blend: self.blend,
            }),
            primitive: PrimitiveState::default(),
            depth_stencil: None,
        })?;
        Ok(OwnedRenderPipeline::new(self.device.clone(), id))
    }

    /// Swaps in a pipeline built from `snapshot`, keeping the current one on
    /// failure.
    pub(crate) fn rebuild(&mut self, snapshot: &ShaderSnapshot) {
        match self.build_pipeline(snapshot) {
            Ok(pipeline) => self.pipeline = Some(pipeline),
            Err(e) => log::error!("{}: keeping previous pipeline: {e}", self.label),
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Draws the full-screen triangle into the scene color target, clipped
    /// to the viewport.
    pub(crate) fn draw(&mut self, ctx: &mut FrameContext<'_>, encoder: &mut dyn CommandEncoder) -> Result<(), RenderError> {
        let Some(pipeline) = &self.pipeline else {
            return Err(RenderError::NotInitialized);
        };
        let resources = ctx.resources;
        let names: Vec<&str> = self.inputs.iter().map(|i| i.name()).collect();
        let (device, layout, inputs, label) = (&self.device, self.layout.id(), self.inputs, self.label);
        let bind_group = self.bind_group.get_or_create(resources, &names, || {
            let entries = inputs
                .iter()
                .enumerate()
                .map(|(i, input)| input.bind(i as u32, resources))
                .collect::<Result<Vec<_>, _>>()?;
            device
                .create_bind_group(&BindGroupDescriptor {
                    label: Some(label),
                    layout,
                    entries: &entries,
                })
                .map_err(RenderError::from)
        })?;

        let Some(color) = resources.target_view(SCENE_COLOR) else {
            return Err(RenderError::RenderingFailed("scene color target is missing".into()));
        };
        let color_attachments = [RenderPassColorAttachment {
            view: color,
            ops: Operations::load(),
        }];
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some(label),
                color_attachments: &color_attachments,
                depth_stencil_attachment: None,
            });
            pass.set_viewport(&ctx.viewport.rect.to_gpu_viewport());
            pass.set_pipeline(pipeline.id_ref());
            pass.set_bind_group(0, bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        ctx.stats.draw_calls += 1;
        Ok(())
    }

    pub(crate) fn shutdown(&mut self) {
        self.bind_group.reset();
        self.pipeline = None;
    }
}
