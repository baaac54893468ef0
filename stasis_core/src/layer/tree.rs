// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arena storage for leaf layers and condition-gated groups.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::backend::{CacheBackend, LAYER_DEPTH_SEPARATION};
use crate::time::FrameInfo;

use super::context::DrawContext;
use super::id::{GroupId, LayerId, Node};

/// Draws one layer's content.
pub type RenderFn<B> = Box<dyn FnMut(&mut DrawContext<'_, B>)>;

/// Evaluates a group's visibility condition.
pub type ConditionFn = Box<dyn FnMut() -> bool>;

/// One entry of the flattened layer list.
///
/// `group` is the innermost group containing the layer, or `None` for
/// layers attached directly to the root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FlatEntry {
    /// The layer.
    pub layer: LayerId,
    /// The innermost group owning the layer.
    pub group: Option<GroupId>,
}

struct LayerEntry<B: CacheBackend> {
    name: String,
    order: u32,
    parent: Option<GroupId>,
    render: RenderFn<B>,
}

struct GroupEntry {
    name: String,
    parent: Option<GroupId>,
    children: Vec<Node>,
    condition: ConditionFn,
    // -- Evaluated by `update` --
    condition_result: bool,
    changed_recently: bool,
    visible: bool,
    chain_changed: bool,
}

struct Slot<T> {
    generation: u32,
    entry: Option<T>,
}

/// An ordered forest of leaf layers and boolean-gated groups.
///
/// Layers are addressed by [`LayerId`] handles and groups by [`GroupId`]
/// handles. Removed slots are recycled via free lists, and generation
/// counters prevent stale handle access.
///
/// Each layer receives a draw-order index at registration. The index never
/// changes and determines the layer's depth offset
/// (`index * LAYER_DEPTH_SEPARATION`) on every path, so cached and direct
/// drawing place a layer at the same depth.
///
/// Every mutation of the tree's shape bumps [`revision`](Self::revision).
pub struct LayerTree<B: CacheBackend> {
    layers: Vec<Slot<LayerEntry<B>>>,
    layer_free: Vec<u32>,
    groups: Vec<Slot<GroupEntry>>,
    group_free: Vec<u32>,
    roots: Vec<Node>,
    next_order: u32,
    layer_count: usize,
    revision: u64,
}

impl<B: CacheBackend> fmt::Debug for LayerTree<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerTree")
            .field("layers", &self.layer_count)
            .field("roots", &self.roots)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl<B: CacheBackend> Default for LayerTree<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: CacheBackend> LayerTree<B> {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            layer_free: Vec::new(),
            groups: Vec::new(),
            group_free: Vec::new(),
            roots: Vec::new(),
            next_order: 0,
            layer_count: 0,
            revision: 0,
        }
    }

    // -- Mutation API --

    /// Appends a layer to `parent` (or to the root) and returns its handle.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is stale.
    pub fn add_layer(
        &mut self,
        parent: Option<GroupId>,
        name: impl Into<String>,
        render: impl FnMut(&mut DrawContext<'_, B>) + 'static,
    ) -> LayerId {
        if let Some(parent) = parent {
            self.validate_group(parent);
        }
        let entry = LayerEntry {
            name: name.into(),
            order: self.next_order,
            parent,
            render: Box::new(render),
        };
        self.next_order += 1;
        let (idx, generation) = insert_slot(&mut self.layers, &mut self.layer_free, entry);
        let id = LayerId { idx, generation };
        self.children_mut(parent).push(Node::Layer(id));
        self.layer_count += 1;
        self.revision += 1;
        id
    }

    /// Appends a group to `parent` (or to the root) and returns its handle.
    ///
    /// The group's condition is first evaluated by the next
    /// [`update`](Self::update). Until then the group reports `false`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is stale.
    pub fn add_group(
        &mut self,
        parent: Option<GroupId>,
        name: impl Into<String>,
        condition: impl FnMut() -> bool + 'static,
    ) -> GroupId {
        if let Some(parent) = parent {
            self.validate_group(parent);
        }
        let entry = GroupEntry {
            name: name.into(),
            parent,
            children: Vec::new(),
            condition: Box::new(condition),
            condition_result: false,
            changed_recently: false,
            visible: false,
            chain_changed: false,
        };
        let (idx, generation) = insert_slot(&mut self.groups, &mut self.group_free, entry);
        let id = GroupId { idx, generation };
        self.children_mut(parent).push(Node::Group(id));
        self.revision += 1;
        id
    }

    /// Removes a layer.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn remove_layer(&mut self, id: LayerId) {
        self.validate_layer(id);
        let parent = self.layer(id).parent;
        self.children_mut(parent)
            .retain(|node| *node != Node::Layer(id));
        remove_slot(&mut self.layers, &mut self.layer_free, id.idx);
        self.layer_count -= 1;
        self.revision += 1;
    }

    /// Removes a group together with every layer and group nested in it.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn remove_group(&mut self, id: GroupId) {
        self.validate_group(id);
        let parent = self.group(id).parent;
        self.children_mut(parent)
            .retain(|node| *node != Node::Group(id));
        self.drop_subtree(id);
        self.revision += 1;
    }

    // -- Evaluation --

    /// Re-evaluates every group condition top-down.
    ///
    /// Nested groups are evaluated even when an ancestor is hidden, so that
    /// [`changed_recently`](Self::changed_recently) keeps tracking flips
    /// while the subtree is invisible.
    pub fn update(&mut self) {
        for i in 0..self.roots.len() {
            if let Node::Group(group) = self.roots[i] {
                self.update_group(group.idx, true, false);
            }
        }
    }

    fn update_group(&mut self, idx: u32, parent_visible: bool, parent_changed: bool) {
        let Some(entry) = self.groups[idx as usize].entry.as_mut() else {
            return;
        };
        let previous = entry.condition_result;
        entry.condition_result = (entry.condition)();
        entry.changed_recently = previous != entry.condition_result;
        entry.visible = parent_visible && entry.condition_result;
        entry.chain_changed = parent_changed || entry.changed_recently;
        let (visible, changed) = (entry.visible, entry.chain_changed);

        let child_count = entry.children.len();
        for i in 0..child_count {
            let child = match &self.groups[idx as usize].entry {
                Some(entry) => entry.children[i],
                None => return,
            };
            if let Node::Group(group) = child {
                self.update_group(group.idx, visible, changed);
            }
        }
    }

    /// Returns the layers in traversal order, each paired with its innermost
    /// group.
    #[must_use]
    pub fn flatten(&self) -> Vec<FlatEntry> {
        let mut out = Vec::with_capacity(self.layer_count);
        self.flatten_nodes(&self.roots, None, &mut out);
        out
    }

    fn flatten_nodes(&self, nodes: &[Node], group: Option<GroupId>, out: &mut Vec<FlatEntry>) {
        for node in nodes {
            match *node {
                Node::Layer(layer) => out.push(FlatEntry { layer, group }),
                Node::Group(child) => {
                    self.flatten_nodes(&self.group(child).children, Some(child), out);
                }
            }
        }
    }

    // -- Drawing --

    /// Draws one layer through `ctx` at its depth offset.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn render_layer(&mut self, id: LayerId, ctx: &mut DrawContext<'_, B>) {
        self.validate_layer(id);
        let Some(entry) = self.layers[id.idx as usize].entry.as_mut() else {
            return;
        };
        ctx.backend().set_layer_depth(layer_depth(entry.order));
        (entry.render)(ctx);
    }

    /// Draws every visible layer straight to whatever target is bound, in
    /// traversal order, with blend requests applied unchanged.
    pub fn render_direct(&mut self, backend: &mut B, frame: FrameInfo) {
        let flat = self.flatten();
        let mut ctx = DrawContext::direct(backend, frame);
        for entry in flat {
            if self.entry_visible(&entry) {
                self.render_layer(entry.layer, &mut ctx);
            }
        }
    }

    // -- Queries --

    /// Number of leaf layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layer_count
    }

    /// Returns `true` if the tree holds no leaf layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layer_count == 0
    }

    /// Counter bumped on every structural change.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The top-level nodes, in draw order.
    #[must_use]
    pub fn roots(&self) -> &[Node] {
        &self.roots
    }

    /// The children of a group, in draw order.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn children(&self, id: GroupId) -> &[Node] {
        self.validate_group(id);
        &self.group(id).children
    }

    /// Returns whether the handle refers to a live layer.
    #[must_use]
    pub fn contains_layer(&self, id: LayerId) -> bool {
        self.layers
            .get(id.idx as usize)
            .is_some_and(|slot| slot.generation == id.generation && slot.entry.is_some())
    }

    /// Returns whether the handle refers to a live group.
    #[must_use]
    pub fn contains_group(&self, id: GroupId) -> bool {
        self.groups
            .get(id.idx as usize)
            .is_some_and(|slot| slot.generation == id.generation && slot.entry.is_some())
    }

    /// The layer's display name.
    #[must_use]
    pub fn layer_name(&self, id: LayerId) -> &str {
        self.validate_layer(id);
        &self.layer(id).name
    }

    /// The layer's draw-order index, assigned at registration.
    #[must_use]
    pub fn layer_order(&self, id: LayerId) -> u32 {
        self.validate_layer(id);
        self.layer(id).order
    }

    /// The group's display name.
    #[must_use]
    pub fn group_name(&self, id: GroupId) -> &str {
        self.validate_group(id);
        &self.group(id).name
    }

    /// The group's own condition as of the last [`update`](Self::update).
    #[must_use]
    pub fn condition_result(&self, id: GroupId) -> bool {
        self.validate_group(id);
        self.group(id).condition_result
    }

    /// Whether the group's own condition flipped during the last
    /// [`update`](Self::update).
    ///
    /// Only meaningful until the next `update`.
    #[must_use]
    pub fn changed_recently(&self, id: GroupId) -> bool {
        self.validate_group(id);
        self.group(id).changed_recently
    }

    /// Whether the group or any ancestor flipped during the last
    /// [`update`](Self::update).
    #[must_use]
    pub fn visibility_changed(&self, id: GroupId) -> bool {
        self.validate_group(id);
        self.group(id).chain_changed
    }

    /// Whether the group and all of its ancestors evaluated `true`.
    #[must_use]
    pub fn is_visible(&self, id: GroupId) -> bool {
        self.validate_group(id);
        self.group(id).visible
    }

    /// Whether the entry's layer should be drawn this frame.
    #[must_use]
    pub fn entry_visible(&self, entry: &FlatEntry) -> bool {
        entry.group.is_none_or(|group| self.is_visible(group))
    }

    /// Whether the entry's visibility flipped this frame.
    #[must_use]
    pub fn entry_changed(&self, entry: &FlatEntry) -> bool {
        entry.group.is_some_and(|group| self.visibility_changed(group))
    }

    // -- Internal helpers --

    fn layer(&self, id: LayerId) -> &LayerEntry<B> {
        match &self.layers[id.idx as usize].entry {
            Some(entry) => entry,
            None => unreachable!("validated layer slot is empty"),
        }
    }

    fn group(&self, id: GroupId) -> &GroupEntry {
        match &self.groups[id.idx as usize].entry {
            Some(entry) => entry,
            None => unreachable!("validated group slot is empty"),
        }
    }

    fn children_mut(&mut self, parent: Option<GroupId>) -> &mut Vec<Node> {
        match parent {
            None => &mut self.roots,
            Some(id) => match &mut self.groups[id.idx as usize].entry {
                Some(entry) => &mut entry.children,
                None => unreachable!("validated group slot is empty"),
            },
        }
    }

    fn drop_subtree(&mut self, id: GroupId) {
        let Some(entry) = remove_slot(&mut self.groups, &mut self.group_free, id.idx) else {
            return;
        };
        for child in entry.children {
            match child {
                Node::Layer(layer) => {
                    remove_slot(&mut self.layers, &mut self.layer_free, layer.idx);
                    self.layer_count -= 1;
                }
                Node::Group(group) => self.drop_subtree(group),
            }
        }
    }

    /// Panics if the handle is stale.
    fn validate_layer(&self, id: LayerId) {
        assert!(
            self.contains_layer(id),
            "stale LayerId: {id:?} (current gen: {})",
            self.layers
                .get(id.idx as usize)
                .map_or(u32::MAX, |slot| slot.generation)
        );
    }

    /// Panics if the handle is stale.
    fn validate_group(&self, id: GroupId) {
        assert!(
            self.contains_group(id),
            "stale GroupId: {id:?} (current gen: {})",
            self.groups
                .get(id.idx as usize)
                .map_or(u32::MAX, |slot| slot.generation)
        );
    }
}

/// Depth offset of the layer with the given draw-order index.
fn layer_depth(order: u32) -> f32 {
    order as f32 * LAYER_DEPTH_SEPARATION
}

fn insert_slot<T>(slots: &mut Vec<Slot<T>>, free: &mut Vec<u32>, entry: T) -> (u32, u32) {
    if let Some(idx) = free.pop() {
        let slot = &mut slots[idx as usize];
        slot.entry = Some(entry);
        (idx, slot.generation)
    } else {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "slot counts never approach u32::MAX"
        )]
        let idx = slots.len() as u32;
        slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        (idx, 0)
    }
}

fn remove_slot<T>(slots: &mut [Slot<T>], free: &mut Vec<u32>, idx: u32) -> Option<T> {
    let slot = &mut slots[idx as usize];
    let entry = slot.entry.take()?;
    // Bump generation so old handles immediately fail validation.
    slot.generation += 1;
    free.push(idx);
    Some(entry)
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::Cell;

    use super::*;
    use crate::testing::MockBackend;

    fn tagged(tag: u8) -> impl FnMut(&mut DrawContext<'_, MockBackend>) + 'static {
        move |ctx| ctx.backend().draw(tag)
    }

    #[test]
    fn flatten_follows_traversal_order() {
        let mut tree = LayerTree::<MockBackend>::new();
        let a = tree.add_layer(None, "a", tagged(1));
        let group = tree.add_group(None, "g", || true);
        let b = tree.add_layer(Some(group), "b", tagged(2));
        let inner = tree.add_group(Some(group), "inner", || true);
        let c = tree.add_layer(Some(inner), "c", tagged(3));
        let d = tree.add_layer(None, "d", tagged(4));

        let flat = tree.flatten();
        assert_eq!(
            flat,
            vec![
                FlatEntry { layer: a, group: None },
                FlatEntry { layer: b, group: Some(group) },
                FlatEntry { layer: c, group: Some(inner) },
                FlatEntry { layer: d, group: None },
            ]
        );
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn update_detects_flips() {
        let flag = Rc::new(Cell::new(true));
        let mut tree = LayerTree::<MockBackend>::new();
        let source = flag.clone();
        let group = tree.add_group(None, "g", move || source.get());

        tree.update();
        assert!(tree.condition_result(group));
        assert!(tree.changed_recently(group), "false -> true is a flip");

        tree.update();
        assert!(!tree.changed_recently(group), "no flip on a steady condition");

        flag.set(false);
        tree.update();
        assert!(tree.changed_recently(group));
        assert!(!tree.is_visible(group));
    }

    #[test]
    fn nested_groups_update_while_parent_hidden() {
        let outer_flag = Rc::new(Cell::new(false));
        let inner_flag = Rc::new(Cell::new(false));
        let mut tree = LayerTree::<MockBackend>::new();
        let o = outer_flag.clone();
        let outer = tree.add_group(None, "outer", move || o.get());
        let i = inner_flag.clone();
        let inner = tree.add_group(Some(outer), "inner", move || i.get());

        tree.update();
        inner_flag.set(true);
        tree.update();
        assert!(tree.changed_recently(inner), "evaluated while parent is false");
        assert!(tree.condition_result(inner));
        assert!(!tree.is_visible(inner), "hidden by its parent");

        outer_flag.set(true);
        tree.update();
        assert!(tree.is_visible(inner));
        assert!(!tree.changed_recently(inner));
        assert!(tree.visibility_changed(inner), "parent flip propagates");
    }

    #[test]
    fn render_direct_skips_hidden_groups() {
        let mut backend = MockBackend::new(4, 4);
        let mut tree = LayerTree::<MockBackend>::new();
        tree.add_layer(None, "a", tagged(1));
        let hidden = tree.add_group(None, "hidden", || false);
        tree.add_layer(Some(hidden), "b", tagged(2));
        tree.add_layer(None, "c", tagged(3));
        tree.update();

        tree.render_direct(&mut backend, FrameInfo::default());
        assert_eq!(backend.screen, vec![1, 3]);
        assert_eq!(
            backend.layer_depths,
            vec![0.0, 2.0 * LAYER_DEPTH_SEPARATION],
            "depth follows the registration index, not the drawn count"
        );
    }

    #[test]
    fn remove_group_drops_subtree() {
        let mut tree = LayerTree::<MockBackend>::new();
        let group = tree.add_group(None, "g", || true);
        let inner = tree.add_group(Some(group), "inner", || true);
        let a = tree.add_layer(Some(group), "a", tagged(1));
        let b = tree.add_layer(Some(inner), "b", tagged(2));
        let c = tree.add_layer(None, "c", tagged(3));
        let revision = tree.revision();

        tree.remove_group(group);
        assert!(!tree.contains_group(group));
        assert!(!tree.contains_group(inner));
        assert!(!tree.contains_layer(a));
        assert!(!tree.contains_layer(b));
        assert!(tree.contains_layer(c));
        assert_eq!(tree.len(), 1);
        assert!(tree.revision() > revision);
    }

    #[test]
    fn removed_slots_are_recycled_with_new_generation() {
        let mut tree = LayerTree::<MockBackend>::new();
        let a = tree.add_layer(None, "a", tagged(1));
        tree.remove_layer(a);
        let b = tree.add_layer(None, "b", tagged(2));
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert!(!tree.contains_layer(a));
        assert_eq!(tree.layer_order(b), 1, "registration index keeps growing");
    }

    #[test]
    #[should_panic(expected = "stale LayerId")]
    fn removed_layer_handle_panics() {
        let mut tree = LayerTree::<MockBackend>::new();
        let a = tree.add_layer(None, "a", tagged(1));
        tree.remove_layer(a);
        let _ = tree.layer_name(a);
    }

    #[test]
    #[should_panic(expected = "stale GroupId")]
    fn adding_to_removed_group_panics() {
        let mut tree = LayerTree::<MockBackend>::new();
        let group = tree.add_group(None, "g", || true);
        tree.remove_group(group);
        tree.add_layer(Some(group), "a", tagged(1));
    }
}
