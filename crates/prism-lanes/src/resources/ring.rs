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

//! Growable ring of per-draw uniform blocks bound with dynamic offsets.

use super::handles::{OwnedBindGroup, OwnedBuffer};
use prism_core::renderer::{
    align_to, BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutId, BufferDescriptor,
    BufferUsage, GraphicsDevice, ResourceError,
};
use std::borrow::Cow;
use std::num::NonZeroU64;
use std::sync::Arc;

/// Minimum dynamic uniform offset alignment accepted by every backend.
pub const MIN_UNIFORM_ALIGNMENT: u64 = 256;

/// Blocks in the first chunk.
pub const DEFAULT_CHUNK_BLOCKS: u64 = 256;

/// Where a pushed block lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawSlot {
    /// Index of the chunk holding the block.
    pub chunk: usize,
    /// Dynamic offset to pass to `set_bind_group`.
    pub offset: u32,
}

#[derive(Debug)]
struct Chunk {
    bind_group: OwnedBindGroup,
    buffer: OwnedBuffer,
    capacity: u64,
    cursor: u64,
}

/// Each draw writes its own block before the pass is recorded, so every
/// draw reads exactly the constants written for it.
///
/// Chunks are never reallocated in place: when the active chunk is full a
/// new one of twice the capacity is appended, so the bind groups handed out
/// earlier in the frame stay valid until [`DrawConstantRing::reset`].
#[derive(Debug)]
pub struct DrawConstantRing {
    device: Arc<dyn GraphicsDevice>,
    layout: BindGroupLayoutId,
    binding: u32,
    block_size: u64,
    chunks: Vec<Chunk>,
    active: usize,
    label: &'static str,
}

impl DrawConstantRing {
    /// Creates a ring whose blocks are `block_size` bytes, bound at
    /// `binding` of `layout`.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        layout: BindGroupLayoutId,
        binding: u32,
        block_size: u64,
        label: &'static str,
    ) -> Result<Self, ResourceError> {
        let mut ring = Self {
            device,
            layout,
            binding,
            block_size: align_to(block_size, MIN_UNIFORM_ALIGNMENT),
            chunks: Vec::new(),
            active: 0,
            label,
        };
        ring.append_chunk(DEFAULT_CHUNK_BLOCKS)?;
        Ok(ring)
    }

    fn append_chunk(&mut self, blocks: u64) -> Result<(), ResourceError> {
        let capacity = blocks * self.block_size;
        let index = self.chunks.len();
        let label = match index {
            0 => Cow::Borrowed(self.label),
            _ => Cow::Owned(format!("{} [chunk {index}]", self.label)),
        };

        let buffer = self.device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size: capacity,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        })?;
        let buffer = OwnedBuffer::new(self.device.clone(), buffer);

        let bind_group = self.device.create_bind_group(&BindGroupDescriptor {
            label: Some(self.label),
            layout: self.layout,
            entries: &[BindGroupEntry::buffer(
                self.binding,
                buffer.id(),
                NonZeroU64::new(self.block_size),
            )],
        })?;

        self.chunks.push(Chunk {
            bind_group: OwnedBindGroup::new(self.device.clone(), bind_group),
            buffer,
            capacity,
            cursor: 0,
        });
        Ok(())
    }

    /// Writes one block and returns where it was placed.
    pub fn push(&mut self, data: &[u8]) -> Result<DrawSlot, ResourceError> {
        if data.len() as u64 > self.block_size {
            return Err(ResourceError::CapacityExceeded {
                what: "Draw constant block",
                requested: data.len(),
                capacity: self.block_size as usize,
            });
        }

        if self.chunks[self.active].cursor + self.block_size > self.chunks[self.active].capacity {
            if self.active + 1 < self.chunks.len() {
                self.active += 1;
            } else {
                let blocks = self.chunks[self.active].capacity / self.block_size * 2;
                log::debug!("{}: growing to {blocks} blocks", self.label);
                self.append_chunk(blocks)?;
                self.active = self.chunks.len() - 1;
            }
        }

        let chunk = &mut self.chunks[self.active];
        let offset = chunk.cursor;
        self.device.write_buffer(chunk.buffer.id(), offset, data)?;
        chunk.cursor += self.block_size;
        Ok(DrawSlot {
            chunk: self.active,
            offset: offset as u32,
        })
    }

    /// The bind group to set for `slot`, together with `slot.offset`.
    pub fn bind_group(&self, slot: DrawSlot) -> &BindGroupId {
        self.chunks[slot.chunk].bind_group.id_ref()
    }

    /// Rewinds every chunk. Blocks pushed before the reset must already
    /// have been submitted.
    pub fn reset(&mut self) {
        for chunk in &mut self.chunks {
            chunk.cursor = 0;
        }
        self.active = 0;
    }

    /// Blocks the ring can hold before growing again.
    pub fn capacity(&self) -> u64 {
        self.chunks.iter().map(|c| c.capacity / self.block_size).sum()
    }

    /// Stride between blocks.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockDevice;

    fn ring(device: &Arc<MockDevice>) -> DrawConstantRing {
        DrawConstantRing::new(device.clone(), BindGroupLayoutId(0), 0, 160, "Test Ring").unwrap()
    }

    #[test]
    fn test_blocks_use_aligned_stride() {
        let device = Arc::new(MockDevice::default());
        let mut ring = ring(&device);
        assert_eq!(ring.block_size(), 256);
        let a = ring.push(&[1u8; 160]).unwrap();
        let b = ring.push(&[2u8; 160]).unwrap();
        assert_eq!(a.offset, 0);
        assert_eq!(b.offset, 256);
        assert_eq!(ring.bind_group(a), ring.bind_group(b));
    }

    #[test]
    fn test_grows_without_moving_old_blocks() {
        let device = Arc::new(MockDevice::default());
        let mut ring = ring(&device);
        let first = ring.push(&[7u8; 16]).unwrap();
        for _ in 1..DEFAULT_CHUNK_BLOCKS {
            ring.push(&[0u8; 16]).unwrap();
        }
        let overflow = ring.push(&[9u8; 16]).unwrap();
        assert_eq!(overflow.chunk, 1);
        assert_eq!(overflow.offset, 0);
        assert_ne!(ring.bind_group(first), ring.bind_group(overflow));
        assert_eq!(ring.capacity(), DEFAULT_CHUNK_BLOCKS * 3);
        assert_eq!(device.live_buffer_count(), 2);

        ring.reset();
        assert_eq!(ring.push(&[0u8; 16]).unwrap(), DrawSlot { chunk: 0, offset: 0 });
        assert_eq!(device.live_buffer_count(), 2);
    }

    #[test]
    fn test_oversized_block_is_rejected() {
        let device = Arc::new(MockDevice::default());
        let mut ring = ring(&device);
        assert!(matches!(
            ring.push(&[0u8; 300]),
            Err(ResourceError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn test_drop_releases_chunks() {
        let device = Arc::new(MockDevice::default());
        {
            let _ring = ring(&device);
            assert_eq!(device.live_bind_group_count(), 1);
        }
        assert_eq!(device.live_buffer_count(), 0);
        assert_eq!(device.live_bind_group_count(), 0);
    }
}
