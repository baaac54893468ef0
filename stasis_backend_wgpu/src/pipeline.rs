// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shaders and render pipelines, cached by ambient state.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use stasis_core::backend::DepthState;
use stasis_core::blend::BlendState;

use crate::convert;

/// Number of textures one composite draw samples.
pub(crate) const COMPOSITE_SAMPLERS: usize = 8;

const FILL_SHADER: &str = r"
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = vec4(in.position, 1.0);
    out.color = in.color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
";

/// Samples up to eight premultiplied textures and stacks them in slot order
/// with source-over, then applies an opaque white tint.
const COMPOSITE_SHADER: &str = r"
@group(0) @binding(0) var samp: sampler;
@group(0) @binding(1) var t0: texture_2d<f32>;
@group(0) @binding(2) var t1: texture_2d<f32>;
@group(0) @binding(3) var t2: texture_2d<f32>;
@group(0) @binding(4) var t3: texture_2d<f32>;
@group(0) @binding(5) var t4: texture_2d<f32>;
@group(0) @binding(6) var t5: texture_2d<f32>;
@group(0) @binding(7) var t6: texture_2d<f32>;
@group(0) @binding(8) var t7: texture_2d<f32>;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@location(0) pos: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = vec4(pos, 0.0, 1.0);
    out.uv = vec2(pos.x * 0.5 + 0.5, 0.5 - pos.y * 0.5);
    return out;
}

fn over(acc: vec4<f32>, src: vec4<f32>) -> vec4<f32> {
    return src + acc * (1.0 - src.a);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var acc = vec4(0.0);
    acc = over(acc, textureSample(t0, samp, in.uv));
    acc = over(acc, textureSample(t1, samp, in.uv));
    acc = over(acc, textureSample(t2, samp, in.uv));
    acc = over(acc, textureSample(t3, samp, in.uv));
    acc = over(acc, textureSample(t4, samp, in.uv));
    acc = over(acc, textureSample(t5, samp, in.uv));
    acc = over(acc, textureSample(t6, samp, in.uv));
    acc = over(acc, textureSample(t7, samp, in.uv));
    let tint = vec4(1.0, 1.0, 1.0, 1.0);
    return acc * tint;
}
";

/// Fullscreen quad: two triangles covering clip-space (-1..1).
pub(crate) const FULLSCREEN_QUAD: [[f32; 2]; 6] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [1.0, 1.0],
    [-1.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
];

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct FillVertex {
    pub(crate) position: [f32; 3],
    pub(crate) color: [f32; 4],
}

impl FillVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x4];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

fn quad_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
    wgpu::VertexBufferLayout {
        array_stride: size_of::<[f32; 2]>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

/// Which shader a pipeline runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum PipelineKind {
    Fill,
    Composite,
}

/// Everything a render pipeline bakes in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub(crate) kind: PipelineKind,
    pub(crate) blend: BlendState,
    pub(crate) depth: DepthState,
    pub(crate) format: wgpu::TextureFormat,
}

/// Compiled shaders, layouts, and one pipeline per distinct [`PipelineKey`].
pub(crate) struct Pipelines {
    fill_shader: wgpu::ShaderModule,
    composite_shader: wgpu::ShaderModule,
    fill_layout: wgpu::PipelineLayout,
    composite_layout: wgpu::PipelineLayout,
    pub(crate) composite_bind_group_layout: wgpu::BindGroupLayout,
    cache: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl core::fmt::Debug for Pipelines {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pipelines")
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl Pipelines {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let fill_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("stasis fill shader"),
            source: wgpu::ShaderSource::Wgsl(FILL_SHADER.into()),
        });
        let composite_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("stasis composite shader"),
            source: wgpu::ShaderSource::Wgsl(COMPOSITE_SHADER.into()),
        });

        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        }];
        for slot in 0..COMPOSITE_SAMPLERS {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "sampler count is a small constant"
            )]
            let binding = slot as u32 + 1;
            entries.push(wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }
        let composite_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("stasis composite bind group layout"),
                entries: &entries,
            });

        let fill_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("stasis fill layout"),
            bind_group_layouts: &[],
            immediate_size: 0,
        });
        let composite_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("stasis composite layout"),
            bind_group_layouts: &[&composite_bind_group_layout],
            immediate_size: 0,
        });

        Self {
            fill_shader,
            composite_shader,
            fill_layout,
            composite_layout,
            composite_bind_group_layout,
            cache: HashMap::new(),
        }
    }

    /// Number of distinct pipelines built so far.
    pub(crate) fn len(&self) -> usize {
        self.cache.len()
    }

    /// Builds the pipeline for `key` unless it is cached already.
    pub(crate) fn ensure(&mut self, device: &wgpu::Device, key: PipelineKey) {
        if !self.cache.contains_key(&key) {
            log::debug!("building pipeline {key:?}");
            let pipeline = self.build(device, key);
            self.cache.insert(key, pipeline);
        }
    }

    /// A previously [`ensure`](Self::ensure)d pipeline.
    pub(crate) fn cached(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.cache.get(key)
    }

    fn build(&self, device: &wgpu::Device, key: PipelineKey) -> wgpu::RenderPipeline {
        let (label, shader, layout, buffers) = match key.kind {
            PipelineKind::Fill => (
                "stasis fill pipeline",
                &self.fill_shader,
                &self.fill_layout,
                [FillVertex::layout()],
            ),
            PipelineKind::Composite => (
                "stasis composite pipeline",
                &self.composite_shader,
                &self.composite_layout,
                [quad_layout()],
            ),
        };
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                buffers: &buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.format,
                    blend: convert::blend_state(key.blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..wgpu::PrimitiveState::default()
            },
            depth_stencil: Some(convert::depth_stencil(key.depth)),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }
}
