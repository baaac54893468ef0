// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mapping of stasis state values onto wgpu descriptors.

use kurbo::Rect;
use stasis_core::backend::{DepthState, Extent};
use stasis_core::blend::{BlendFactor, BlendState};

/// Format of offscreen color attachments. Readbacks return these bytes.
pub(crate) const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Format of every depth attachment.
pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

/// Layer depth mapped to the far plane. Deeper layers clamp to the near
/// plane.
const DEPTH_RANGE: f32 = 1_000_000.0;

pub(crate) fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        // The blend constant is bound as opaque white, so constant color and
        // constant alpha coincide.
        BlendFactor::ConstantColor | BlendFactor::ConstantAlpha => wgpu::BlendFactor::Constant,
        BlendFactor::OneMinusConstantColor | BlendFactor::OneMinusConstantAlpha => {
            wgpu::BlendFactor::OneMinusConstant
        }
    }
}

/// The color target blend for an ambient blend state. `None` disables
/// blending.
pub(crate) fn blend_state(state: BlendState) -> Option<wgpu::BlendState> {
    if !state.enabled {
        return None;
    }
    let func = state.func;
    Some(wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: blend_factor(func.src_rgb),
            dst_factor: blend_factor(func.dst_rgb),
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: blend_factor(func.src_alpha),
            dst_factor: blend_factor(func.dst_alpha),
            operation: wgpu::BlendOperation::Add,
        },
    })
}

pub(crate) fn depth_stencil(state: DepthState) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: state.write,
        depth_compare: if state.test {
            wgpu::CompareFunction::LessEqual
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

/// Normalized device depth of a layer depth offset. Later layers are
/// nearer.
pub(crate) fn ndc_depth(layer_depth: f32) -> f32 {
    1.0 - (layer_depth / DEPTH_RANGE).clamp(0.0, 1.0)
}

/// Two triangles covering `rect` (in physical pixels, y down) in clip space.
pub(crate) fn rect_to_clip(rect: Rect, size: Extent) -> [[f32; 2]; 6] {
    let w = f64::from(size.width.max(1));
    let h = f64::from(size.height.max(1));
    #[expect(
        clippy::cast_possible_truncation,
        reason = "clip-space coordinates fit in f32"
    )]
    let to_clip = |x: f64, y: f64| [(x / w * 2.0 - 1.0) as f32, (1.0 - y / h * 2.0) as f32];
    let tl = to_clip(rect.x0, rect.y0);
    let tr = to_clip(rect.x1, rect.y0);
    let bl = to_clip(rect.x0, rect.y1);
    let br = to_clip(rect.x1, rect.y1);
    [tl, bl, br, tl, br, tr]
}

pub(crate) fn extent3d(size: Extent) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: size.width,
        height: size.height,
        depth_or_array_layers: 1,
    }
}
