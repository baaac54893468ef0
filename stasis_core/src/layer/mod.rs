// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer tree data model.
//!
//! A *layer* is a leaf unit of drawable content: a render callback, a display
//! name, and a draw-order index assigned at registration. Layers are grouped
//! into *groups*, each gated by a boolean condition. Groups nest.
//!
//! - Identity: [`LayerId`] and [`GroupId`] are generational handles that
//!   become stale when the node is removed.
//! - Evaluation: [`LayerTree::update`] re-evaluates every condition
//!   top-down once per frame and records which groups flipped.
//! - Flattening: [`LayerTree::flatten`] produces the layers in traversal
//!   order, each paired with its innermost group. Partitions are contiguous
//!   slices of this list.
//! - Drawing: layer callbacks receive a [`DrawContext`], which routes blend
//!   state mutations through a [`BlendStrategy`](crate::blend::BlendStrategy).
//!
//! A layer is drawn when its innermost group and all of that group's
//! ancestors evaluated `true`.

mod context;
mod id;
mod tree;

pub use context::DrawContext;
pub use id::{GroupId, LayerId, Node};
pub use tree::{ConditionFn, FlatEntry, LayerTree, RenderFn};
