// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The render-cache orchestrator.
//!
//! [`RenderCache`] owns the [`LayerTree`], chunks its flattened layer list
//! into [`Partition`]s, gives each partition a [`CacheElement`], and drives
//! the per-frame cycle:
//!
//! 1. Evaluate every group condition.
//! 2. Rebuild partitions if the tree changed shape or the viewport resized.
//! 3. Poll fences and redraw every partition that is due.
//! 4. Rebind the on-screen target if anything was redrawn.
//! 5. Walk partitions in order, compositing runs of cached textures and
//!    drawing partitions without a usable texture directly.
//!
//! When caching is disabled every layer is drawn directly and all elements
//! are released, so that re-enabling starts from a clean state.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::backend::{CacheBackend, Extent, TextureId};
use crate::composite::CompositionBatcher;
use crate::config::{CacheConfig, DisableSource, NeverDisabled};
use crate::element::{CacheElement, UpdateOutcome};
use crate::layer::{DrawContext, GroupId, LayerId, LayerTree};
use crate::partition::{self, Partition};
use crate::time::{FrameInfo, HostTime};
use crate::trace::{
    CheckEvent, CompositeEvent, ElementRedrawEvent, FallbackEvent, FallbackReason,
    RepartitionEvent, RepartitionKind, TeardownEvent, TeardownReason, Tracer,
};

struct Slot<B: CacheBackend> {
    partition: Partition,
    element: CacheElement<B>,
}

/// Diagnostic snapshot of one partition.
#[derive(Clone, Debug, PartialEq)]
pub struct PartitionStats {
    /// Layer names joined with `/`.
    pub layers: String,
    /// Number of layers.
    pub len: usize,
    /// Render frequency, floored to whole updates per second.
    pub render_frequency: u32,
    /// Check frequency in updates per second.
    pub check_frequency: f64,
    /// Signed streak counter.
    pub streak: i32,
    /// Whether the partition changes on most checks.
    pub often_changing: bool,
    /// Whether the last redraw drew nothing.
    pub is_empty: bool,
    /// Whether a cached texture is available for compositing.
    pub has_texture: bool,
}

/// What one call to [`RenderCache::render`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Whether the cached path was taken.
    pub cached: bool,
    /// Partitions redrawn into their offscreen targets.
    pub redrawn: usize,
    /// Snapshot comparisons consumed.
    pub comparisons: usize,
    /// Composite draw calls issued.
    pub composite_draws: usize,
    /// Partitions drawn directly.
    pub fallbacks: usize,
}

/// Caches a layered overlay in offscreen textures and redraws each partition
/// only as often as its content actually changes.
pub struct RenderCache<B: CacheBackend> {
    tree: LayerTree<B>,
    config: CacheConfig,
    disable: Box<dyn DisableSource>,
    slots: Vec<Slot<B>>,
    built_revision: Option<u64>,
    viewport: Option<Extent>,
    batcher: CompositionBatcher,
    run: Vec<TextureId>,
    rng: SmallRng,
    frame_index: u64,
}

impl<B: CacheBackend> fmt::Debug for RenderCache<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCache")
            .field("tree", &self.tree)
            .field("config", &self.config)
            .field("partitions", &self.slots.len())
            .field("viewport", &self.viewport)
            .field("frame_index", &self.frame_index)
            .finish_non_exhaustive()
    }
}

impl<B: CacheBackend> Default for RenderCache<B> {
    fn default() -> Self {
        Self::new(CacheConfig::new())
    }
}

impl<B: CacheBackend> RenderCache<B> {
    /// Creates an empty cache. Out-of-range configuration values are
    /// repaired.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        let config = config.validated();
        Self {
            tree: LayerTree::new(),
            config,
            disable: Box::new(NeverDisabled),
            slots: Vec::new(),
            built_revision: None,
            viewport: None,
            batcher: CompositionBatcher::new(),
            run: Vec::new(),
            rng: SmallRng::seed_from_u64(config.jitter_seed),
            frame_index: 0,
        }
    }

    /// Sets the runtime kill switch polled once per frame.
    #[must_use]
    pub fn with_disable_source(mut self, source: impl DisableSource + 'static) -> Self {
        self.set_disable_source(source);
        self
    }

    /// Replaces the runtime kill switch.
    pub fn set_disable_source(&mut self, source: impl DisableSource + 'static) {
        self.disable = Box::new(source);
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Replaces the configuration and releases all elements so that the new
    /// bounds apply from the next frame.
    pub fn set_config(&mut self, backend: &mut B, config: CacheConfig) {
        self.config = config.validated();
        let frame_index = self.frame_index;
        self.teardown(backend, TeardownReason::Invalidate, frame_index, &mut Tracer::none());
    }

    // -- Tree mutation --

    /// The layer tree.
    #[must_use]
    pub fn tree(&self) -> &LayerTree<B> {
        &self.tree
    }

    /// Mutable access to the layer tree. Shape changes repartition on the
    /// next frame.
    pub fn tree_mut(&mut self) -> &mut LayerTree<B> {
        &mut self.tree
    }

    /// Appends a layer. See [`LayerTree::add_layer`].
    pub fn add_layer(
        &mut self,
        parent: Option<GroupId>,
        name: impl Into<String>,
        render: impl FnMut(&mut DrawContext<'_, B>) + 'static,
    ) -> LayerId {
        self.tree.add_layer(parent, name, render)
    }

    /// Appends a group. See [`LayerTree::add_group`].
    pub fn add_group(
        &mut self,
        parent: Option<GroupId>,
        name: impl Into<String>,
        condition: impl FnMut() -> bool + 'static,
    ) -> GroupId {
        self.tree.add_group(parent, name, condition)
    }

    /// Removes a layer. See [`LayerTree::remove_layer`].
    pub fn remove_layer(&mut self, id: LayerId) {
        self.tree.remove_layer(id);
    }

    /// Removes a group and its subtree. See [`LayerTree::remove_group`].
    pub fn remove_group(&mut self, id: GroupId) {
        self.tree.remove_group(id);
    }

    // -- Lifecycle --

    /// Releases every cache element. Partitions are rebuilt from the current
    /// tree on the next [`render`](Self::render). Call on viewport resize.
    pub fn invalidate(&mut self, backend: &mut B) {
        let frame_index = self.frame_index;
        self.teardown(backend, TeardownReason::Invalidate, frame_index, &mut Tracer::none());
    }

    /// Polls outstanding fences and consumes completed comparisons without
    /// rendering. Returns the number of comparisons consumed.
    ///
    /// For hosts whose simulation tick runs at a different cadence than
    /// rendering.
    pub fn tick(&mut self, backend: &mut B) -> usize {
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.element.poll(backend))
            .count()
    }

    /// Renders one frame. See [`render_traced`](Self::render_traced).
    pub fn render(&mut self, backend: &mut B, frame: FrameInfo) -> FrameReport {
        self.render_traced(backend, frame, &mut Tracer::none())
    }

    /// Renders one frame onto the bound on-screen target, reporting each
    /// step to `tracer`.
    pub fn render_traced(
        &mut self,
        backend: &mut B,
        frame: FrameInfo,
        tracer: &mut Tracer<'_>,
    ) -> FrameReport {
        let frame_index = self.frame_index;
        self.frame_index += 1;

        if !self.config.enabled || self.disable.is_caching_disabled() {
            self.teardown(backend, TeardownReason::Disabled, frame_index, tracer);
            self.tree.update();
            tracer.fallback(&FallbackEvent {
                frame_index,
                partition: None,
                reason: FallbackReason::Disabled,
            });
            self.tree.render_direct(backend, frame);
            return FrameReport::default();
        }

        let viewport = backend.viewport();
        if self.viewport.is_some_and(|previous| previous != viewport) {
            self.teardown(backend, TeardownReason::Resize, frame_index, tracer);
        }
        self.viewport = Some(viewport);

        self.tree.update();
        if self.built_revision != Some(self.tree.revision()) {
            self.rebuild(backend, frame.now, frame_index, tracer);
        }

        let mut report = FrameReport {
            cached: true,
            ..FrameReport::default()
        };
        self.update_elements(backend, frame, frame_index, tracer, &mut report);
        self.composite(backend, frame, frame_index, tracer, &mut report);

        if self.config.adaptive_partitioning {
            self.adapt(backend, frame.now, frame_index, tracer);
        }
        report
    }

    // -- Queries --

    /// Number of partitions currently built.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.slots.len()
    }

    /// The current partitions, in draw order.
    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.slots.iter().map(|slot| &slot.partition)
    }

    /// One diagnostic entry per partition.
    ///
    /// Layers removed since the last [`render`](Self::render) are left out
    /// of the names; partitions are rebuilt on the next frame.
    #[must_use]
    pub fn stats(&self, backend: &B) -> Vec<PartitionStats> {
        self.slots
            .iter()
            .map(|slot| {
                let mut layers = String::new();
                let live = slot
                    .partition
                    .entries()
                    .iter()
                    .filter(|entry| self.tree.contains_layer(entry.layer));
                for (i, entry) in live.enumerate() {
                    if i > 0 {
                        layers.push('/');
                    }
                    layers.push_str(self.tree.layer_name(entry.layer));
                }
                let scheduler = slot.element.scheduler();
                PartitionStats {
                    layers,
                    len: slot.partition.len(),
                    render_frequency: whole_frequency(scheduler.render_frequency()),
                    check_frequency: scheduler.check_frequency(),
                    streak: scheduler.streak(),
                    often_changing: scheduler.is_often_changing(),
                    is_empty: slot.element.is_empty(),
                    has_texture: slot.element.texture(backend).is_some(),
                }
            })
            .collect()
    }

    // -- Frame steps --

    fn update_elements(
        &mut self,
        backend: &mut B,
        frame: FrameInfo,
        frame_index: u64,
        tracer: &mut Tracer<'_>,
        report: &mut FrameReport,
    ) {
        let Self { tree, slots, .. } = self;
        let mut bound = false;
        for (i, slot) in slots.iter_mut().enumerate() {
            let Slot { partition, element } = slot;

            if let Some(matched) = element.poll(backend) {
                report.comparisons += 1;
                let scheduler = element.scheduler();
                tracer.check(&CheckEvent {
                    frame_index,
                    partition: i,
                    matched,
                    render_frequency: scheduler.render_frequency(),
                    check_frequency: scheduler.check_frequency(),
                    streak: scheduler.streak(),
                });
            }

            let forced = partition.entries().iter().any(|e| tree.entry_changed(e));
            let outcome = element.update(backend, frame, forced, |ctx| {
                for entry in partition.entries() {
                    if tree.entry_visible(entry) {
                        tree.render_layer(entry.layer, ctx);
                    }
                }
            });
            if let UpdateOutcome::Redrawn {
                empty,
                snapshot,
                rejected_blends,
            } = outcome
            {
                bound = true;
                report.redrawn += 1;
                tracer.element_redraw(&ElementRedrawEvent {
                    frame_index,
                    partition: i,
                    layers: partition.len(),
                    forced,
                    empty,
                    snapshot,
                    rejected_blends,
                });
            }
        }
        if bound {
            backend.bind_default_target();
        }
    }

    fn composite(
        &mut self,
        backend: &mut B,
        frame: FrameInfo,
        frame_index: u64,
        tracer: &mut Tracer<'_>,
        report: &mut FrameReport,
    ) {
        let Self {
            tree,
            slots,
            batcher,
            run,
            ..
        } = self;
        run.clear();
        for (i, slot) in slots.iter().enumerate() {
            if let Some(texture) = slot.element.texture(backend) {
                run.push(texture);
                continue;
            }
            flush_run(batcher, backend, run, frame_index, tracer, report);

            let reason = if slot.element.target().is_valid() {
                FallbackReason::NoTexture
            } else {
                FallbackReason::TargetUnavailable
            };
            tracer.fallback(&FallbackEvent {
                frame_index,
                partition: Some(i),
                reason,
            });
            report.fallbacks += 1;
            let mut ctx = DrawContext::direct(backend, frame);
            for entry in slot.partition.entries() {
                if tree.entry_visible(entry) {
                    tree.render_layer(entry.layer, &mut ctx);
                }
            }
        }
        flush_run(batcher, backend, run, frame_index, tracer, report);
    }

    // -- Partition maintenance --

    fn new_element(&mut self, now: HostTime) -> CacheElement<B> {
        let jitter: f64 = self.rng.r#gen();
        CacheElement::new(&self.config, now, jitter)
    }

    fn rebuild(
        &mut self,
        backend: &mut B,
        now: HostTime,
        frame_index: u64,
        tracer: &mut Tracer<'_>,
    ) {
        self.teardown(backend, TeardownReason::Rebuild, frame_index, tracer);
        let flat = self.tree.flatten();
        let partitions = partition::chunked(&flat, self.config.partition_count);
        self.slots = Vec::with_capacity(partitions.len());
        for partition in partitions {
            let element = self.new_element(now);
            self.slots.push(Slot { partition, element });
        }
        self.built_revision = Some(self.tree.revision());
        log::debug!(
            "render cache partitioned {} layers into {} partitions",
            flat.len(),
            self.slots.len()
        );
        tracer.repartition(&RepartitionEvent {
            frame_index,
            kind: RepartitionKind::Rebuild,
            partitions: self.slots.len(),
            layers: flat.len(),
        });
    }

    fn teardown(
        &mut self,
        backend: &mut B,
        reason: TeardownReason,
        frame_index: u64,
        tracer: &mut Tracer<'_>,
    ) {
        self.built_revision = None;
        if self.slots.is_empty() {
            return;
        }
        let elements = self.slots.len();
        for mut slot in self.slots.drain(..) {
            slot.element.release(backend);
        }
        log::debug!("render cache released {elements} elements ({reason:?})");
        tracer.teardown(&TeardownEvent {
            frame_index,
            elements,
            reason,
        });
    }

    /// Splits the first often-changing partition, or else merges the first
    /// pair of stable neighbours. At most one change per frame.
    fn adapt(
        &mut self,
        backend: &mut B,
        now: HostTime,
        frame_index: u64,
        tracer: &mut Tracer<'_>,
    ) {
        let kind = if let Some(i) = self.slots.iter().position(|slot| {
            slot.element.scheduler().is_often_changing() && slot.partition.can_split()
        }) {
            let tail = match self.slots[i].partition.split() {
                Ok(tail) => tail,
                Err(err) => {
                    log::error!("adaptive split rejected: {err}");
                    return;
                }
            };
            self.slots[i].element.release(backend);
            self.slots[i].element = self.new_element(now);
            let element = self.new_element(now);
            self.slots.insert(
                i + 1,
                Slot {
                    partition: tail,
                    element,
                },
            );
            RepartitionKind::Split
        } else if let Some(i) = self.merge_candidate() {
            let right = self.slots.remove(i + 1);
            if let Err(err) = self.slots[i].partition.join(&right.partition) {
                log::error!("adaptive merge rejected: {err}");
                self.slots.insert(i + 1, right);
                return;
            }
            let mut right_element = right.element;
            right_element.release(backend);
            self.slots[i].element.release(backend);
            self.slots[i].element = self.new_element(now);
            RepartitionKind::Merge
        } else {
            return;
        };
        log::debug!("render cache {kind:?}: now {} partitions", self.slots.len());
        tracer.repartition(&RepartitionEvent {
            frame_index,
            kind,
            partitions: self.slots.len(),
            layers: self.tree.len(),
        });
    }

    fn merge_candidate(&self) -> Option<usize> {
        let threshold = self.config.merge_streak_threshold;
        let cap = 2 * self.tree.len().div_ceil(self.config.partition_count.max(1));
        self.slots.windows(2).position(|pair| {
            pair[0].element.scheduler().stable_streak() >= threshold
                && pair[1].element.scheduler().stable_streak() >= threshold
                && pair[0].partition.len() + pair[1].partition.len() <= cap
        })
    }
}

fn flush_run<B: CacheBackend>(
    batcher: &mut CompositionBatcher,
    backend: &mut B,
    run: &mut Vec<TextureId>,
    frame_index: u64,
    tracer: &mut Tracer<'_>,
    report: &mut FrameReport,
) {
    if run.is_empty() {
        return;
    }
    let draws = batcher.composite_all(backend, run);
    report.composite_draws += draws;
    tracer.composite(&CompositeEvent {
        frame_index,
        textures: run.len(),
        draws,
    });
    run.clear();
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "frequencies are bounded by the configured maximum"
)]
fn whole_frequency(frequency: f64) -> u32 {
    libm::floor(frequency) as u32
}
