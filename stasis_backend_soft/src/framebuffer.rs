// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! RGBA8 pixel storage and fixed-point blending.

use kurbo::Rect;
use stasis_core::backend::Extent;
use stasis_core::blend::{BlendFactor, BlendState};

/// A tightly packed RGBA8 image.
#[derive(Clone, PartialEq, Eq)]
pub struct Framebuffer {
    size: Extent,
    pixels: Vec<u8>,
}

impl core::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Framebuffer")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl Framebuffer {
    /// Creates a framebuffer cleared to transparent black.
    #[must_use]
    pub fn new(size: Extent) -> Self {
        Self {
            size,
            pixels: vec![0; size.rgba8_len()],
        }
    }

    /// Size in pixels.
    #[must_use]
    pub fn size(&self) -> Extent {
        self.size
    }

    /// Raw RGBA8 bytes, row-major, top row first.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// The pixel at `(x, y)`, or `None` outside the framebuffer.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let i = (y as usize * self.size.width as usize + x as usize) * 4;
        let p = &self.pixels[i..i + 4];
        Some([p[0], p[1], p[2], p[3]])
    }

    /// Sets every pixel to `color`.
    pub fn clear(&mut self, color: [u8; 4]) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&color);
        }
    }

    /// Blends `color` into every pixel whose center lies inside `rect`.
    pub fn fill_rect(&mut self, rect: Rect, color: [u8; 4], blend: BlendState) {
        let (x0, x1) = pixel_span(rect.x0, rect.x1, self.size.width);
        let (y0, y1) = pixel_span(rect.y0, rect.y1, self.size.height);
        let width = self.size.width as usize;
        for y in y0..y1 {
            for x in x0..x1 {
                let i = (y * width + x) * 4;
                let dst = &mut self.pixels[i..i + 4];
                let out = blend_pixel(color, [dst[0], dst[1], dst[2], dst[3]], blend);
                dst.copy_from_slice(&out);
            }
        }
    }

    /// Blends every pixel of `src` onto this framebuffer.
    ///
    /// Both framebuffers must have the same size; a mismatched source is
    /// ignored.
    pub fn blend_from(&mut self, src: &Self, blend: BlendState) {
        if src.size != self.size {
            log::warn!(
                "composite source {:?} does not match destination {:?}",
                src.size,
                self.size
            );
            return;
        }
        for (dst, s) in self
            .pixels
            .chunks_exact_mut(4)
            .zip(src.pixels.chunks_exact(4))
        {
            let out = blend_pixel(
                [s[0], s[1], s[2], s[3]],
                [dst[0], dst[1], dst[2], dst[3]],
                blend,
            );
            dst.copy_from_slice(&out);
        }
    }
}

/// Half-open range of pixel indices whose centers lie in `[lo, hi)`.
fn pixel_span(lo: f64, hi: f64, limit: u32) -> (usize, usize) {
    let clamp = |v: f64| {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "value is clamped to the framebuffer dimension first"
        )]
        let i = (v - 0.5).ceil().clamp(0.0, f64::from(limit)) as usize;
        i
    };
    let (start, end) = (clamp(lo), clamp(hi));
    (start, end.max(start))
}

/// Applies the blend equation `src * fs + dst * fd` to one pixel in 8-bit
/// fixed point. The blend constant is opaque white.
#[must_use]
pub fn blend_pixel(src: [u8; 4], dst: [u8; 4], blend: BlendState) -> [u8; 4] {
    if !blend.enabled {
        return src;
    }
    let func = blend.func;
    let mut out = [0_u8; 4];
    for c in 0..4 {
        let (fs, fd) = if c == 3 {
            (func.src_alpha, func.dst_alpha)
        } else {
            (func.src_rgb, func.dst_rgb)
        };
        let s = u32::from(src[c]) * factor(fs, src, dst, c);
        let d = u32::from(dst[c]) * factor(fd, src, dst, c);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "result is clamped to 255"
        )]
        let v = ((s + d + 127) / 255).min(255) as u8;
        out[c] = v;
    }
    out
}

fn factor(f: BlendFactor, src: [u8; 4], dst: [u8; 4], c: usize) -> u32 {
    let v = match f {
        BlendFactor::Zero
        | BlendFactor::OneMinusConstantColor
        | BlendFactor::OneMinusConstantAlpha => 0,
        BlendFactor::One | BlendFactor::ConstantColor | BlendFactor::ConstantAlpha => 255,
        BlendFactor::SrcColor => src[c],
        BlendFactor::OneMinusSrcColor => 255 - src[c],
        BlendFactor::DstColor => dst[c],
        BlendFactor::OneMinusDstColor => 255 - dst[c],
        BlendFactor::SrcAlpha => src[3],
        BlendFactor::OneMinusSrcAlpha => 255 - src[3],
        BlendFactor::DstAlpha => dst[3],
        BlendFactor::OneMinusDstAlpha => 255 - dst[3],
    };
    u32::from(v)
}
