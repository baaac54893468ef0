// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Adaptive render cache for layered UI overlays.
//!
//! `stasis_core` keeps a tree of UI layers, partitions the flattened layer
//! list into cache elements, and renders each element into an offscreen
//! target at an adaptive frequency. Every frame the cached textures are
//! composited onto the screen in a handful of batched draws. Elements whose
//! output stops changing are checked less often; elements that change every
//! frame can be split apart. It is `no_std` compatible (with `alloc`) and
//! talks to the GPU only through the [`CacheBackend`](backend::CacheBackend)
//! trait.
//!
//! # Architecture
//!
//! ```text
//!   LayerTree::update() ──► flatten() ──► Partition::chunked()
//!                                              │
//!                 ┌────────────────────────────┘
//!                 ▼
//!   CacheElement::update() ──► OffscreenTarget ──► ReadbackPair::snapshot()
//!                 │                                        │
//!                 ▼                                        ▼
//!   CompositionBatcher::composite_all()        CacheElement::poll()
//!                                                          │
//!                                                          ▼
//!                                              CacheScheduler::observe()
//! ```
//!
//! **[`cache`]**: [`RenderCache`](cache::RenderCache), the per-frame
//! orchestrator. Owns the layer tree and the partitioned cache elements.
//!
//! **[`layer`]**: Layer tree with generational handles, conditional groups,
//! and the [`DrawContext`](layer::DrawContext) passed to render callbacks.
//!
//! **[`element`]**: One cached partition. Combines a target, a readback pair,
//! and a scheduler.
//!
//! **[`scheduler`]**: Streak-based render and check frequencies.
//!
//! **[`readback`]**: Double-buffered asynchronous pixel snapshots guarded by
//! fences.
//!
//! **[`target`]**: Offscreen render target sized to the viewport.
//!
//! **[`blend`]**: Blend state values and the interceptor that keeps layer
//! code from corrupting the cached alpha channel.
//!
//! **[`composite`]**: Batched composition of cached textures.
//!
//! **[`screen`]**: Single-element cache for whole modal screens.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and events for cache
//! instrumentation.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `serde` (disabled by default): Derives `Serialize`/`Deserialize` for
//!   configuration and value types.
//! - `trace` (disabled by default): Enables `Tracer` method bodies.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod backend;
pub mod blend;
pub mod cache;
pub mod composite;
pub mod config;
pub mod element;
pub mod error;
pub mod layer;
pub mod partition;
pub mod readback;
pub mod scheduler;
pub mod screen;
pub mod target;
pub mod time;
pub mod trace;

#[cfg(test)]
mod testing;
