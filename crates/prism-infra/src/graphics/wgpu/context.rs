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

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use wgpu::{Features, Instance};

/// Options for opening a graphics context.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Format of the offscreen color targets.
    pub color_format: wgpu::TextureFormat,
    /// Prefer a software adapter (CI machines without a GPU).
    pub force_fallback_adapter: bool,
    /// Backends the instance may pick from.
    pub backends: wgpu::Backends,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            color_format: wgpu::TextureFormat::Rgba8UnormSrgb,
            force_fallback_adapter: false,
            backends: wgpu::Backends::PRIMARY,
        }
    }
}

/// Holds the core wgpu state objects required for rendering.
///
/// The renderer draws into offscreen targets it owns; presenting them is the
/// host's business, so no surface is created here.
#[derive(Debug)]
pub struct WgpuGraphicsContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,

    pub color_format: wgpu::TextureFormat,

    // Store info for easy access
    pub adapter_name: String,
    pub adapter_backend: wgpu::Backend,
    pub adapter_device_type: wgpu::DeviceType,
    pub active_device_features: wgpu::Features,
    pub device_limits: wgpu::Limits,
}

impl WgpuGraphicsContext {
    /// Asynchronously picks an adapter and opens a logical device on it.
    ///
    /// ## Arguments
    /// * `options` - Adapter selection and target format.
    ///
    /// ## Returns
    /// * `Result<Self>` - The initialized context, or why no device could be opened.
    pub async fn new(options: &ContextOptions) -> Result<Self> {
        log::info!("Initializing wgpu graphics context (headless)...");

        let instance = Instance::new(&wgpu::InstanceDescriptor {
            backends: options.backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: options.force_fallback_adapter,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Using graphics adapter: \"{}\" (Backend: {:?})",
            adapter_info.name,
            adapter_info.backend
        );

        // Wireframe view mode needs line rasterization; the mesh pass falls
        // back to filled triangles when it is missing.
        let wanted: Features = Features::POLYGON_MODE_LINE;
        let features_to_enable = adapter.features() & wanted;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Prism Logical Device"),
                required_features: features_to_enable,
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| anyhow!("Failed to create logical device: {e}"))?;
        log::info!("Logical device and command queue created.");

        // Validation errors surface through the log instead of aborting; shader
        // compile failures are reported separately by the device.
        device.on_uncaptured_error(Arc::new(|e: wgpu::Error| {
            log::error!("wgpu uncaptured error: {e}");
        }));

        let active_device_features = device.features();
        let device_limits = device.limits();
        log::debug!("Active device features: {active_device_features:?}");

        Ok(WgpuGraphicsContext {
            adapter,
            device,
            queue,
            color_format: options.color_format,
            adapter_name: adapter_info.name,
            adapter_backend: adapter_info.backend,
            adapter_device_type: adapter_info.device_type,
            active_device_features,
            device_limits,
        })
    }

    /// Blocking wrapper around [`WgpuGraphicsContext::new`].
    pub fn new_blocking(options: &ContextOptions) -> Result<Self> {
        pollster::block_on(Self::new(options))
    }
}
