// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Texture-to-buffer copies mapped without blocking.

use std::sync::mpsc::{self, Receiver, TryRecvError};

use stasis_core::backend::{Extent, FenceStatus};

/// Bytes per RGBA8 texel.
const BYTES_PER_PIXEL: u32 = 4;

/// Row pitch of a buffer copy: `width * 4` rounded up to
/// [`wgpu::COPY_BYTES_PER_ROW_ALIGNMENT`].
pub(crate) fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * BYTES_PER_PIXEL;
    unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
}

/// Copies the first `width * 4` bytes of every padded row into `out`.
pub(crate) fn unpad_rows(mapped: &[u8], size: Extent, padded: u32, out: &mut Vec<u8>) {
    let row = (size.width * BYTES_PER_PIXEL) as usize;
    out.clear();
    out.reserve(row * size.height as usize);
    for chunk in mapped.chunks(padded as usize).take(size.height as usize) {
        out.extend_from_slice(&chunk[..row.min(chunk.len())]);
    }
}

/// A CPU-visible buffer receiving a copy of an offscreen target.
///
/// The map request is issued right after the copy is submitted; its
/// completion callback reports through a channel that
/// [`poll`](Self::poll) drains with `try_recv`.
pub struct WgpuReadback {
    buffer: wgpu::Buffer,
    size: Extent,
    padded_bytes_per_row: u32,
    map_result: Option<Receiver<Result<(), wgpu::BufferAsyncError>>>,
    bytes: Vec<u8>,
    has_bytes: bool,
}

impl core::fmt::Debug for WgpuReadback {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WgpuReadback")
            .field("size", &self.size)
            .field("pending", &self.map_result.is_some())
            .field("has_bytes", &self.has_bytes)
            .finish_non_exhaustive()
    }
}

impl WgpuReadback {
    pub(crate) fn new(device: &wgpu::Device, size: Extent) -> Self {
        let padded = padded_bytes_per_row(size.width);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("stasis readback"),
            size: u64::from(padded) * u64::from(size.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            size,
            padded_bytes_per_row: padded,
            map_result: None,
            bytes: Vec::new(),
            has_bytes: false,
        }
    }

    pub(crate) fn size(&self) -> Extent {
        self.size
    }

    /// Records the texture copy into `encoder`.
    pub(crate) fn encode_copy(&self, encoder: &mut wgpu::CommandEncoder, texture: &wgpu::Texture) {
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(self.size.height),
                },
            },
            crate::convert::extent3d(self.size),
        );
    }

    /// Requests a mapping of the buffer. Must follow the submission that
    /// carries the copy.
    pub(crate) fn request_map(&mut self) {
        let (sender, receiver) = mpsc::channel();
        self.buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = sender.send(result);
            });
        self.map_result = Some(receiver);
    }

    /// Checks the map request. The caller polls the device first.
    pub(crate) fn poll(&mut self) -> FenceStatus {
        let Some(receiver) = &self.map_result else {
            return FenceStatus::Pending;
        };
        match receiver.try_recv() {
            Err(TryRecvError::Empty) => FenceStatus::Pending,
            Err(TryRecvError::Disconnected) => {
                self.map_result = None;
                FenceStatus::Lost
            }
            Ok(Err(err)) => {
                log::debug!("readback map failed: {err}");
                self.map_result = None;
                FenceStatus::Lost
            }
            Ok(Ok(())) => {
                self.map_result = None;
                {
                    let mapped = self.buffer.slice(..).get_mapped_range();
                    unpad_rows(&mapped, self.size, self.padded_bytes_per_row, &mut self.bytes);
                }
                self.buffer.unmap();
                self.has_bytes = true;
                FenceStatus::Signaled
            }
        }
    }

    pub(crate) fn bytes(&self) -> Option<&[u8]> {
        self.has_bytes.then_some(self.bytes.as_slice())
    }

    /// Cancels an outstanding map request.
    pub(crate) fn abandon(&mut self) {
        if self.map_result.take().is_some() {
            self.buffer.unmap();
        }
    }
}
