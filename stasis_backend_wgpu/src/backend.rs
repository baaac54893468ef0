// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`CacheBackend`] implementation on wgpu.

use std::ops::Range;

use kurbo::Rect;
use stasis_core::backend::{CacheBackend, DepthState, Extent, FenceStatus, TextureId};
use stasis_core::blend::BlendState;
use stasis_core::error::BackendError;
use wgpu::util::DeviceExt as _;

use crate::convert::{self, DEPTH_FORMAT, TARGET_FORMAT};
use crate::pipeline::{
    COMPOSITE_SAMPLERS, FULLSCREEN_QUAD, FillVertex, PipelineKey, PipelineKind, Pipelines,
};
use crate::readback::WgpuReadback;

/// An offscreen color+depth target owned by a [`WgpuBackend`].
#[derive(Debug)]
pub struct WgpuTarget {
    texture: TextureId,
    size: Extent,
}

impl WgpuTarget {
    /// Size of the target.
    #[must_use]
    pub fn size(&self) -> Extent {
        self.size
    }
}

#[derive(Debug)]
struct TargetTextures {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Bound {
    Screen,
    Offscreen(TextureId),
}

#[derive(Debug)]
enum DrawOp {
    Fill {
        vertices: Range<u32>,
        blend: BlendState,
        depth: DepthState,
    },
    Composite {
        slots: [Option<TextureId>; COMPOSITE_SAMPLERS],
        blend: BlendState,
        depth: DepthState,
    },
}

impl DrawOp {
    fn key(&self, format: wgpu::TextureFormat) -> PipelineKey {
        let (kind, blend, depth) = match *self {
            Self::Fill { blend, depth, .. } => (PipelineKind::Fill, blend, depth),
            Self::Composite { blend, depth, .. } => (PipelineKind::Composite, blend, depth),
        };
        PipelineKey {
            kind,
            blend,
            depth,
            format,
        }
    }
}

/// A [`CacheBackend`] recording draws into wgpu render passes.
///
/// Drawing is deferred: [`fill_rect`](Self::fill_rect) and composite draws
/// are recorded for the bound target and encoded into one render pass on
/// [`flush`](CacheBackend::flush), on rebinding, or before a readback.
///
/// The host hands over the swapchain view each frame with
/// [`begin_frame`](Self::begin_frame) and calls [`end_frame`](Self::end_frame)
/// before presenting.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_format: wgpu::TextureFormat,
    screen: Option<wgpu::TextureView>,
    screen_size: Extent,
    screen_depth: Option<(Extent, wgpu::TextureView)>,
    screen_clear: wgpu::Color,
    textures: Vec<Option<TargetTextures>>,
    free: Vec<u32>,
    bound: Bound,
    clear_color: bool,
    clear_depth: bool,
    ops: Vec<DrawOp>,
    vertices: Vec<FillVertex>,
    pipelines: Pipelines,
    quad: wgpu::Buffer,
    sampler: wgpu::Sampler,
    empty_view: wgpu::TextureView,
    blend: BlendState,
    depth: DepthState,
    layer_depth: f32,
    draws: u64,
}

impl core::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("surface_format", &self.surface_format)
            .field("screen_size", &self.screen_size)
            .field("bound", &self.bound)
            .field("pending_ops", &self.ops.len())
            .field("pipelines", &self.pipelines)
            .field("draws", &self.draws)
            .finish_non_exhaustive()
    }
}

impl WgpuBackend {
    /// Creates a backend drawing to surfaces of `surface_format`.
    #[must_use]
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        size: Extent,
    ) -> Self {
        let pipelines = Pipelines::new(&device);
        let quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("stasis fullscreen quad"),
            contents: bytemuck::cast_slice(&FULLSCREEN_QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("stasis composite sampler"),
            ..wgpu::SamplerDescriptor::default()
        });
        // Resources are zero-initialized, so this reads as transparent black.
        let empty = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("stasis empty texture"),
            size: convert::extent3d(Extent::new(1, 1)),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let empty_view = empty.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            device,
            queue,
            surface_format,
            screen: None,
            screen_size: size,
            screen_depth: None,
            screen_clear: wgpu::Color::BLACK,
            textures: Vec::new(),
            free: Vec::new(),
            bound: Bound::Screen,
            clear_color: false,
            clear_depth: false,
            ops: Vec::new(),
            vertices: Vec::new(),
            pipelines,
            quad,
            sampler,
            empty_view,
            blend: BlendState::INITIAL,
            depth: DepthState::ENABLED,
            layer_depth: 0.0,
            draws: 0,
        }
    }

    /// The wgpu device.
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// The wgpu queue.
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Number of distinct render pipelines built so far.
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Sets the color the swapchain texture is cleared to at the start of
    /// each frame.
    pub fn set_clear_color(&mut self, color: wgpu::Color) {
        self.screen_clear = color;
    }

    /// Starts a frame drawing onto `view`, the swapchain texture of the
    /// given size. Binds the on-screen target and schedules a clear.
    pub fn begin_frame(&mut self, view: wgpu::TextureView, size: Extent) {
        self.flush_ops();
        self.screen = Some(view);
        self.screen_size = size;
        if self.screen_depth.as_ref().is_none_or(|(s, _)| *s != size) && !size.is_empty() {
            let depth = self.create_depth(size, "stasis screen depth");
            self.screen_depth = Some((size, depth.create_view(&wgpu::TextureViewDescriptor::default())));
        }
        self.bound = Bound::Screen;
        self.clear_color = true;
        self.clear_depth = true;
    }

    /// Submits everything recorded for the frame and releases the swapchain
    /// view. Call before presenting.
    pub fn end_frame(&mut self) {
        self.flush_ops();
        self.screen = None;
    }

    /// Draws a solid rectangle (in physical pixels) into the bound target
    /// with the ambient blend and depth state. `color` is straight RGBA.
    pub fn fill_rect(&mut self, rect: Rect, color: [f32; 4]) {
        self.draws += 1;
        let size = self.bound_size();
        let z = convert::ndc_depth(self.layer_depth);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "vertex count per flush stays far below u32::MAX"
        )]
        let start = self.vertices.len() as u32;
        self.vertices.extend(
            convert::rect_to_clip(rect, size)
                .into_iter()
                .map(|[x, y]| FillVertex {
                    position: [x, y, z],
                    color,
                }),
        );
        let end = start + 6;
        let (blend, depth) = (self.blend, self.depth);
        if let Some(DrawOp::Fill {
            vertices,
            blend: b,
            depth: d,
        }) = self.ops.last_mut()
            && *b == blend
            && *d == depth
            && vertices.end == start
        {
            vertices.end = end;
            return;
        }
        self.ops.push(DrawOp::Fill {
            vertices: start..end,
            blend,
            depth,
        });
    }

    fn bound_size(&self) -> Extent {
        match self.bound {
            Bound::Screen => self.screen_size,
            Bound::Offscreen(id) => self
                .textures
                .get(id.0 as usize)
                .and_then(Option::as_ref)
                .map_or(self.screen_size, |t| {
                    let s = t.color.size();
                    Extent::new(s.width, s.height)
                }),
        }
    }

    fn create_depth(&self, size: Extent, label: &str) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: convert::extent3d(size),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
    }

    fn composite_bind_group(&self, slots: &[Option<TextureId>]) -> wgpu::BindGroup {
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Sampler(&self.sampler),
        }];
        for (binding, slot) in (1_u32..).zip(slots) {
            let view = slot
                .and_then(|id| self.textures.get(id.0 as usize)?.as_ref())
                .map_or(&self.empty_view, |t| &t.color_view);
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("stasis composite bind group"),
            layout: &self.pipelines.composite_bind_group_layout,
            entries: &entries,
        })
    }

    /// Encodes and submits the recorded draws for the bound target.
    fn flush_ops(&mut self) {
        if self.ops.is_empty() && !self.clear_color {
            return;
        }
        let ops = core::mem::take(&mut self.ops);
        let vertices = core::mem::take(&mut self.vertices);
        let clear_color = core::mem::replace(&mut self.clear_color, false);
        let clear_depth = core::mem::replace(&mut self.clear_depth, false);

        let (format, clear_value) = match self.bound {
            Bound::Screen => (self.surface_format, self.screen_clear),
            Bound::Offscreen(_) => (TARGET_FORMAT, wgpu::Color::TRANSPARENT),
        };
        for op in &ops {
            self.pipelines.ensure(&self.device, op.key(format));
        }
        let vertex_buffer = (!vertices.is_empty()).then(|| {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("stasis fill vertices"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                })
        });
        let bind_groups: Vec<Option<wgpu::BindGroup>> = ops
            .iter()
            .map(|op| match op {
                DrawOp::Composite { slots, .. } => Some(self.composite_bind_group(slots)),
                DrawOp::Fill { .. } => None,
            })
            .collect();

        let attachments = match self.bound {
            Bound::Screen => self
                .screen
                .as_ref()
                .zip(self.screen_depth.as_ref().map(|(_, view)| view)),
            Bound::Offscreen(id) => self
                .textures
                .get(id.0 as usize)
                .and_then(Option::as_ref)
                .map(|t| (&t.color_view, &t.depth_view)),
        };
        let Some((color_view, depth_view)) = attachments else {
            log::warn!("dropping {} draws: no attachment bound", ops.len());
            return;
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("stasis draw encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("stasis draw pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: if clear_color {
                            wgpu::LoadOp::Clear(clear_value)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: if clear_color || clear_depth {
                            wgpu::LoadOp::Clear(1.0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_blend_constant(wgpu::Color::WHITE);

            for (op, bind_group) in ops.iter().zip(&bind_groups) {
                let Some(pipeline) = self.pipelines.cached(&op.key(format)) else {
                    continue;
                };
                pass.set_pipeline(pipeline);
                match op {
                    DrawOp::Fill { vertices, .. } => {
                        if let Some(buffer) = &vertex_buffer {
                            pass.set_vertex_buffer(0, buffer.slice(..));
                            pass.draw(vertices.clone(), 0..1);
                        }
                    }
                    DrawOp::Composite { .. } => {
                        if let Some(bind_group) = bind_group {
                            pass.set_bind_group(0, bind_group, &[]);
                            pass.set_vertex_buffer(0, self.quad.slice(..));
                            pass.draw(0..6, 0..1);
                        }
                    }
                }
            }
        }
        self.queue.submit([encoder.finish()]);
    }
}

impl CacheBackend for WgpuBackend {
    type Target = WgpuTarget;
    type Readback = WgpuReadback;

    fn viewport(&self) -> Extent {
        self.screen_size
    }

    fn create_target(&mut self, size: Extent) -> Result<WgpuTarget, BackendError> {
        if size.is_empty() {
            return Err(BackendError::ZeroSizedViewport);
        }
        let max = self.device.limits().max_texture_dimension_2d;
        if size.width > max || size.height > max {
            return Err(BackendError::Allocation("target exceeds device texture limits"));
        }
        let color = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("stasis cache color"),
            size: convert::extent3d(size),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = self.create_depth(size, "stasis cache depth");
        let textures = TargetTextures {
            color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
            depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            color,
            depth,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.textures[index as usize] = Some(textures);
                index
            }
            None => {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "texture count stays far below u32::MAX"
                )]
                let index = self.textures.len() as u32;
                self.textures.push(Some(textures));
                index
            }
        };
        log::debug!("cache target {index} created at {size:?}");
        Ok(WgpuTarget {
            texture: TextureId(index),
            size,
        })
    }

    fn release_target(&mut self, target: WgpuTarget) {
        if self.bound == Bound::Offscreen(target.texture) {
            self.flush_ops();
            self.bound = Bound::Screen;
        }
        if let Some(slot) = self.textures.get_mut(target.texture.0 as usize)
            && let Some(textures) = slot.take()
        {
            textures.color.destroy();
            textures.depth.destroy();
            self.free.push(target.texture.0);
        }
    }

    fn target_texture(&self, target: &WgpuTarget) -> TextureId {
        target.texture
    }

    fn bind_target(&mut self, target: &WgpuTarget) {
        self.flush_ops();
        self.bound = Bound::Offscreen(target.texture);
        self.clear_color = true;
        self.clear_depth = true;
    }

    fn bind_default_target(&mut self) {
        self.flush_ops();
        self.bound = Bound::Screen;
    }

    fn flush(&mut self) {
        self.flush_ops();
    }

    fn draw_count(&self) -> u64 {
        self.draws
    }

    fn create_readback(&mut self, size: Extent) -> Result<WgpuReadback, BackendError> {
        if size.is_empty() {
            return Err(BackendError::ZeroSizedViewport);
        }
        Ok(WgpuReadback::new(&self.device, size))
    }

    fn release_readback(&mut self, mut readback: WgpuReadback) {
        readback.abandon();
    }

    fn begin_readback(
        &mut self,
        target: &WgpuTarget,
        readback: &mut WgpuReadback,
    ) -> Result<(), BackendError> {
        if readback.size() != target.size {
            return Err(BackendError::Allocation("readback size mismatch"));
        }
        self.flush_ops();
        let textures = self
            .textures
            .get(target.texture.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(BackendError::Allocation("readback of released target"))?;
        readback.abandon();
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("stasis readback encoder"),
            });
        readback.encode_copy(&mut encoder, &textures.color);
        self.queue.submit([encoder.finish()]);
        readback.request_map();
        Ok(())
    }

    fn poll_readback(&mut self, readback: &mut WgpuReadback) -> FenceStatus {
        if let Err(err) = self.device.poll(wgpu::PollType::Poll) {
            log::warn!("device poll failed: {err}");
            readback.abandon();
            return FenceStatus::Lost;
        }
        readback.poll()
    }

    fn readback_bytes<'r>(&self, readback: &'r WgpuReadback) -> Option<&'r [u8]> {
        readback.bytes()
    }

    fn abandon_readback(&mut self, readback: &mut WgpuReadback) {
        readback.abandon();
    }

    fn blend_state(&self) -> BlendState {
        self.blend
    }

    fn apply_blend(&mut self, state: BlendState) {
        self.blend = state;
    }

    fn depth_state(&self) -> DepthState {
        self.depth
    }

    fn set_depth_state(&mut self, state: DepthState) {
        self.depth = state;
    }

    fn set_layer_depth(&mut self, depth: f32) {
        self.layer_depth = depth;
    }

    fn max_samplers(&self) -> usize {
        COMPOSITE_SAMPLERS
    }

    fn draw_composite(&mut self, slots: &[Option<TextureId>]) {
        self.draws += 1;
        let mut fixed = [None; COMPOSITE_SAMPLERS];
        for (dst, src) in fixed.iter_mut().zip(slots) {
            *dst = *src;
        }
        self.ops.push(DrawOp::Composite {
            slots: fixed,
            blend: self.blend,
            depth: self.depth,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_ops_key_pipelines_by_kind_and_state() {
        let fill = DrawOp::Fill {
            vertices: 0..6,
            blend: BlendState::STANDARD,
            depth: DepthState::ENABLED,
        };
        let composite = DrawOp::Composite {
            slots: [None; COMPOSITE_SAMPLERS],
            blend: BlendState::COMPOSITE,
            depth: DepthState::DISABLED,
        };
        let format = wgpu::TextureFormat::Bgra8UnormSrgb;

        let key = fill.key(format);
        assert_eq!(key.kind, PipelineKind::Fill);
        assert_eq!(key.blend, BlendState::STANDARD);
        assert_eq!(key.format, format);

        let key = composite.key(TARGET_FORMAT);
        assert_eq!(key.kind, PipelineKind::Composite);
        assert_eq!(key.depth, DepthState::DISABLED);
        assert_ne!(fill.key(TARGET_FORMAT), key, "kinds never share a pipeline");
    }
}
