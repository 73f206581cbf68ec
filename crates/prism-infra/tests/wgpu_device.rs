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

//! Exercises the wgpu device on whatever adapter the machine offers. Every
//! test returns early when no adapter is available (headless CI).

use prism_core::renderer::api::{BufferDescriptor, BufferUsage, ComputePassDescriptor, ShaderModuleDescriptor, ShaderSourceData};
use prism_core::renderer::{GraphicsDevice, ResourceError, ShaderError};
use prism_infra::{ContextOptions, WgpuDevice};
use std::borrow::Cow;

fn device() -> Option<WgpuDevice> {
    let options = ContextOptions {
        backends: wgpu::Backends::all(),
        ..Default::default()
    };
    match WgpuDevice::headless(&options) {
        Ok(device) => Some(device),
        Err(e) => {
            eprintln!("skipping: no adapter ({e})");
            None
        }
    }
}

fn storage(device: &WgpuDevice, size: u64) -> prism_core::renderer::BufferId {
    device
        .create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed("test")),
            size,
            usage: BufferUsage::STORAGE | BufferUsage::COPY_DST | BufferUsage::COPY_SRC,
            mapped_at_creation: false,
        })
        .unwrap()
}

#[test]
fn buffer_write_then_read_back() {
    let Some(device) = device() else { return };
    let buffer = storage(&device, 16);
    device.write_buffer(buffer, 4, &[1, 2, 3, 4]).unwrap();
    let bytes = device.read_buffer(buffer, 0, 8).unwrap();
    assert_eq!(&bytes[4..8], &[1, 2, 3, 4]);

    assert_eq!(device.write_buffer(buffer, 14, &[0; 4]), Err(ResourceError::OutOfBounds));
    device.destroy_buffer(buffer).unwrap();
    assert_eq!(device.destroy_buffer(buffer), Err(ResourceError::NotFound));
}

#[test]
fn clear_buffer_zeroes_contents() {
    let Some(device) = device() else { return };
    let buffer = storage(&device, 16);
    device.write_buffer(buffer, 0, &[0xff; 16]).unwrap();

    let mut encoder = device.create_command_encoder(Some("clear"));
    encoder.clear_buffer(&buffer, 0, None);
    let commands = encoder.finish();
    device.submit_command_buffer(commands);

    assert_eq!(device.read_buffer(buffer, 0, 16).unwrap(), vec![0; 16]);
}

#[test]
fn invalid_shader_is_reported_and_device_stays_usable() {
    let Some(device) = device() else { return };
    let err = device
        .create_shader_module(&ShaderModuleDescriptor {
            label: Some("broken"),
            source: ShaderSourceData::Wgsl(Cow::Borrowed("fn main( {")),
        })
        .unwrap_err();
    assert!(matches!(err, ResourceError::Shader(ShaderError::CompilationError { .. })));

    let module = device
        .create_shader_module(&ShaderModuleDescriptor {
            label: Some("ok"),
            source: ShaderSourceData::Wgsl(Cow::Borrowed("@compute @workgroup_size(1) fn main() {}")),
        })
        .unwrap();
    device.destroy_shader_module(module).unwrap();
}

#[test]
fn empty_compute_pass_submits() {
    let Some(device) = device() else { return };
    let live = device.live_resource_count();
    let mut encoder = device.create_command_encoder(None);
    {
        let _pass = encoder.begin_compute_pass(&ComputePassDescriptor { label: Some("empty") });
    }
    device.submit_command_buffer(encoder.finish());
    device.poll_device_blocking();
    assert_eq!(device.live_resource_count(), live);
    assert!(!device.get_adapter_info().backend.is_empty());
}
