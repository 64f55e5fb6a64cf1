//! Child Reconciliation
//!
//! Compares the old children of a fiber with a new child description and
//! produces the new child chain, reusing old fibers where identity (key
//! plus kind) allows it.
//!
//! # Algorithm
//!
//! Lists are diffed with a single forward pass. Old children are indexed
//! by key, or by position when unkeyed. Each new entry either reuses the
//! old fiber found under its slot or creates a fresh one.
//!
//! Moves are detected with a watermark, `last_placed_index`: the highest
//! old index among the reused fibers seen so far. A reused fiber whose old
//! index is below the watermark has moved to the right of something that
//! used to follow it, and is marked for placement. Fibers that stay in
//! relative order are left alone.
//!
//! ```text
//! old: a(0) b(1) c(2)
//! new: c    a    b
//!
//! c: old 2 >= 0   watermark = 2
//! a: old 0 <  2   PLACEMENT
//! b: old 1 <  2   PLACEMENT
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{trace, warn};

use crate::config::RuntimeConfig;
use crate::element::{Child, Element, Key};
use crate::error::Result;
use crate::fiber::{FiberArena, FiberId, FiberKind, Flags, Payload};

/// Slot under which an old child is looked up.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SlotKey {
    Key(Key),
    Index(usize),
}

impl SlotKey {
    fn of(key: Option<&Key>, index: usize) -> Self {
        match key {
            Some(key) => SlotKey::Key(key.clone()),
            None => SlotKey::Index(index),
        }
    }
}

/// Diffs the children of one fiber.
///
/// A tracking reconciler records placements and deletions on the fibers
/// it touches. A mounting reconciler builds the same chain without
/// recording anything, for subtrees whose root is already being placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildReconciler {
    track_effects: bool,
}

impl ChildReconciler {
    pub const fn tracking() -> Self {
        Self {
            track_effects: true,
        }
    }

    pub const fn mounting() -> Self {
        Self {
            track_effects: false,
        }
    }

    pub fn tracks_effects(&self) -> bool {
        self.track_effects
    }

    /// Reconcile the old children starting at `current_first_child` with
    /// `new_child`, returning the first fiber of the new chain.
    ///
    /// Every fiber in the new chain has `parent` set to `return_fiber` and
    /// `index` set to its position.
    pub fn reconcile(
        &self,
        arena: &mut FiberArena,
        return_fiber: FiberId,
        current_first_child: Option<FiberId>,
        new_child: &Child,
    ) -> Result<Option<FiberId>> {
        let new_child = match new_child {
            Child::Element(element) if element.is_fragment() && element.key.is_none() => {
                element.props.children()
            }
            other => other,
        };

        match new_child {
            Child::Element(element) => {
                let fiber =
                    self.reconcile_single_element(arena, return_fiber, current_first_child, element)?;
                self.place_single_child(arena, fiber).map(Some)
            }
            Child::Text(content) => {
                let fiber =
                    self.reconcile_single_text(arena, return_fiber, current_first_child, content)?;
                self.place_single_child(arena, fiber).map(Some)
            }
            Child::List(children) => {
                self.reconcile_child_array(arena, return_fiber, current_first_child, children)
            }
            Child::Empty => {
                trace!(target: "trellis::reconciler", parent = ?return_fiber, "no children rendered");
                self.delete_remaining_children(arena, return_fiber, current_first_child)?;
                Ok(None)
            }
        }
    }

    fn delete_child(&self, arena: &mut FiberArena, return_fiber: FiberId, child: FiberId) -> Result<()> {
        if !self.track_effects {
            return Ok(());
        }
        let parent = arena.fiber_mut(return_fiber)?;
        if !parent.deletions.contains(&child) {
            parent.deletions.push(child);
        }
        parent.flags |= Flags::CHILD_DELETION;
        trace!(target: "trellis::reconciler", parent = ?return_fiber, ?child, "child deleted");
        Ok(())
    }

    fn delete_remaining_children(
        &self,
        arena: &mut FiberArena,
        return_fiber: FiberId,
        first: Option<FiberId>,
    ) -> Result<()> {
        if !self.track_effects {
            return Ok(());
        }
        let remaining: Vec<FiberId> = arena.siblings(first).collect();
        for child in remaining {
            self.delete_child(arena, return_fiber, child)?;
        }
        Ok(())
    }

    /// Get a work-in-progress clone of `fiber` detached from its old
    /// position.
    fn use_fiber(arena: &mut FiberArena, fiber: FiberId, pending_props: Payload) -> Result<FiberId> {
        let clone = arena.create_work_in_progress(fiber, pending_props)?;
        let node = arena.fiber_mut(clone)?;
        node.index = 0;
        node.sibling = None;
        Ok(clone)
    }

    fn reconcile_single_element(
        &self,
        arena: &mut FiberArena,
        return_fiber: FiberId,
        current_first_child: Option<FiberId>,
        element: &Element,
    ) -> Result<FiberId> {
        let mut current = current_first_child;
        while let Some(id) = current {
            let fiber = arena.fiber(id)?;
            let sibling = fiber.sibling;

            if fiber.key == element.key {
                if fiber.kind.matches(&element.ty) {
                    let existing = Self::use_fiber(arena, id, element_payload(element))?;
                    arena.fiber_mut(existing)?.parent = Some(return_fiber);
                    self.delete_remaining_children(arena, return_fiber, sibling)?;
                    return Ok(existing);
                }
                // Same key, different type: nothing after it can match.
                self.delete_remaining_children(arena, return_fiber, Some(id))?;
                break;
            }

            self.delete_child(arena, return_fiber, id)?;
            current = sibling;
        }

        let created = arena.create_from_element(element);
        arena.fiber_mut(created)?.parent = Some(return_fiber);
        Ok(created)
    }

    fn reconcile_single_text(
        &self,
        arena: &mut FiberArena,
        return_fiber: FiberId,
        current_first_child: Option<FiberId>,
        content: &Arc<str>,
    ) -> Result<FiberId> {
        let mut current = current_first_child;
        while let Some(id) = current {
            let fiber = arena.fiber(id)?;
            let sibling = fiber.sibling;

            if fiber.is_text() {
                let existing = Self::use_fiber(arena, id, Payload::Text(content.clone()))?;
                arena.fiber_mut(existing)?.parent = Some(return_fiber);
                self.delete_remaining_children(arena, return_fiber, sibling)?;
                return Ok(existing);
            }

            self.delete_child(arena, return_fiber, id)?;
            current = sibling;
        }

        let created = arena.create_text(content.clone());
        arena.fiber_mut(created)?.parent = Some(return_fiber);
        Ok(created)
    }

    fn place_single_child(&self, arena: &mut FiberArena, fiber: FiberId) -> Result<FiberId> {
        let node = arena.fiber_mut(fiber)?;
        if self.track_effects && node.alternate.is_none() {
            node.flags |= Flags::PLACEMENT;
        }
        Ok(fiber)
    }

    fn reconcile_child_array(
        &self,
        arena: &mut FiberArena,
        return_fiber: FiberId,
        current_first_child: Option<FiberId>,
        new_children: &[Child],
    ) -> Result<Option<FiberId>> {
        let old_children: Vec<FiberId> = arena.siblings(current_first_child).collect();
        let mut existing: IndexMap<SlotKey, FiberId> = IndexMap::with_capacity(old_children.len());
        for id in old_children {
            let fiber = arena.fiber(id)?;
            let slot = SlotKey::of(fiber.key.as_ref(), fiber.index);
            // Only the last old child under a slot can be claimed; earlier
            // ones are removed outright.
            if let Some(displaced) = existing.insert(slot, id) {
                if RuntimeConfig::diagnostics_enabled() {
                    warn!(
                        target: "trellis::reconciler",
                        parent = ?return_fiber,
                        key = ?arena.fiber(id)?.key,
                        "duplicate key among children; earlier child dropped"
                    );
                }
                self.delete_child(arena, return_fiber, displaced)?;
            }
        }

        let mut last_placed_index = 0;
        let mut first_new: Option<FiberId> = None;
        let mut last_new: Option<FiberId> = None;

        for (index, child) in new_children.iter().enumerate() {
            let Some(new_fiber) =
                self.update_from_map(arena, return_fiber, &mut existing, index, child)?
            else {
                continue;
            };

            {
                let node = arena.fiber_mut(new_fiber)?;
                node.index = index;
                node.parent = Some(return_fiber);
                node.sibling = None;
            }
            match last_new {
                Some(previous) => arena.fiber_mut(previous)?.sibling = Some(new_fiber),
                None => first_new = Some(new_fiber),
            }
            last_new = Some(new_fiber);

            if !self.track_effects {
                continue;
            }

            match arena.fiber(new_fiber)?.alternate {
                Some(current) => {
                    let old_index = arena.fiber(current)?.index;
                    if old_index < last_placed_index {
                        arena.fiber_mut(new_fiber)?.flags |= Flags::PLACEMENT;
                        trace!(target: "trellis::reconciler", fiber = ?new_fiber, old_index, index, "child moved");
                    } else {
                        last_placed_index = old_index;
                    }
                }
                None => arena.fiber_mut(new_fiber)?.flags |= Flags::PLACEMENT,
            }
        }

        for (_, leftover) in existing {
            self.delete_child(arena, return_fiber, leftover)?;
        }

        Ok(first_new)
    }

    /// Produce the fiber for the new entry at `index`, taking a reusable
    /// old fiber out of `existing` when there is one.
    fn update_from_map(
        &self,
        arena: &mut FiberArena,
        return_fiber: FiberId,
        existing: &mut IndexMap<SlotKey, FiberId>,
        index: usize,
        child: &Child,
    ) -> Result<Option<FiberId>> {
        match child {
            Child::Text(content) => {
                let slot = SlotKey::Index(index);
                if let Some(&before) = existing.get(&slot) {
                    if arena.fiber(before)?.is_text() {
                        existing.shift_remove(&slot);
                        return Self::use_fiber(arena, before, Payload::Text(content.clone())).map(Some);
                    }
                }
                Ok(Some(arena.create_text(content.clone())))
            }
            Child::Element(element) => {
                let slot = SlotKey::of(element.key.as_ref(), index);
                if let Some(&before) = existing.get(&slot) {
                    let reusable = if element.is_fragment() {
                        arena.fiber(before)?.kind == FiberKind::Fragment
                    } else {
                        arena.fiber(before)?.kind.matches(&element.ty)
                    };
                    if reusable {
                        existing.shift_remove(&slot);
                        return Self::use_fiber(arena, before, element_payload(element)).map(Some);
                    }
                }
                Ok(Some(arena.create_from_element(element)))
            }
            Child::List(_) => {
                if RuntimeConfig::diagnostics_enabled() {
                    warn!(
                        target: "trellis::reconciler",
                        parent = ?return_fiber,
                        index,
                        "nested child lists are not supported; entry skipped"
                    );
                }
                Ok(None)
            }
            Child::Empty => Ok(None),
        }
    }
}

/// The pending props a fiber for `element` is rendered with.
fn element_payload(element: &Element) -> Payload {
    if element.is_fragment() {
        Payload::Fragment(element.fragment_children())
    } else {
        Payload::Props(element.props.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Component, Props};

    /// A committed parent with `children` as its current child chain,
    /// plus its work-in-progress counterpart.
    struct Tree {
        arena: FiberArena,
        current: FiberId,
        wip: FiberId,
    }

    impl Tree {
        fn new() -> Self {
            let mut arena = FiberArena::new();
            let current = arena.create_root(Props::new());
            let wip = arena
                .create_work_in_progress(current, Payload::Props(Props::new()))
                .unwrap();
            Self {
                arena,
                current,
                wip,
            }
        }

        fn mounted(children: Child) -> Self {
            let mut tree = Self::new();
            tree.render(&children);
            tree.commit();
            tree
        }

        fn render(&mut self, child: &Child) -> Option<FiberId> {
            let current_first = self.arena.get(self.current).unwrap().child;
            let first = ChildReconciler::tracking()
                .reconcile(&mut self.arena, self.wip, current_first, child)
                .unwrap();
            self.arena.get_mut(self.wip).unwrap().child = first;
            first
        }

        /// Swap generations: the work in progress becomes current.
        fn commit(&mut self) {
            let ids: Vec<FiberId> = self.arena.children(self.wip).collect();
            for id in ids {
                let fiber = self.arena.get_mut(id).unwrap();
                fiber.flags = Flags::empty();
            }
            std::mem::swap(&mut self.current, &mut self.wip);
            let wip = self
                .arena
                .create_work_in_progress(self.current, Payload::Props(Props::new()))
                .unwrap();
            self.wip = wip;
        }

        fn keys(&self) -> Vec<String> {
            self.arena
                .children(self.wip)
                .map(|id| {
                    let fiber = self.arena.get(id).unwrap();
                    match &fiber.key {
                        Some(key) => key.to_string(),
                        None => fiber.pending_props.text().unwrap_or("?").to_string(),
                    }
                })
                .collect()
        }

        fn placed(&self) -> Vec<String> {
            self.arena
                .children(self.wip)
                .filter(|&id| self.arena.get(id).unwrap().flags.contains(Flags::PLACEMENT))
                .map(|id| self.arena.get(id).unwrap().key.as_ref().unwrap().to_string())
                .collect()
        }

        fn deleted_keys(&self) -> Vec<String> {
            self.arena
                .get(self.wip)
                .unwrap()
                .deletions
                .iter()
                .map(|&id| {
                    let fiber = self.arena.get(id).unwrap();
                    fiber.key.as_ref().map(Key::to_string).unwrap_or_default()
                })
                .collect()
        }
    }

    fn keyed(tag: &str, keys: &[&str]) -> Child {
        Child::List(
            keys.iter()
                .map(|key| Child::from(Element::host(tag).key(*key)))
                .collect(),
        )
    }

    #[test]
    fn single_element_reuses_matching_fiber() {
        let mut tree = Tree::mounted(Element::host("div").key("a").into());
        let old = tree.arena.get(tree.current).unwrap().child.unwrap();

        let first = tree
            .render(&Element::host("div").key("a").prop("id", 1).into())
            .unwrap();

        let fiber = tree.arena.get(first).unwrap();
        assert_eq!(fiber.alternate, Some(old));
        assert_eq!(fiber.parent, Some(tree.wip));
        assert!(!fiber.flags.contains(Flags::PLACEMENT));
        assert!(tree.arena.get(tree.wip).unwrap().deletions.is_empty());
    }

    #[test]
    fn single_element_type_change_replaces_fiber() {
        let mut tree = Tree::mounted(Element::host("div").key("a").into());
        let old = tree.arena.get(tree.current).unwrap().child.unwrap();

        let first = tree.render(&Element::host("span").key("a").into()).unwrap();

        let fiber = tree.arena.get(first).unwrap();
        assert!(fiber.is_fresh());
        assert!(fiber.flags.contains(Flags::PLACEMENT));
        assert_eq!(tree.arena.get(tree.wip).unwrap().deletions, vec![old]);
        assert!(tree
            .arena
            .get(tree.wip)
            .unwrap()
            .flags
            .contains(Flags::CHILD_DELETION));
    }

    #[test]
    fn single_element_key_mismatch_deletes_everything_before_match() {
        let mut tree = Tree::mounted(Child::List(vec![
            Element::host("a").key("1").into(),
            Element::host("b").key("2").into(),
        ]));

        let first = tree.render(&Element::host("x").key("2").into()).unwrap();

        // Key "2" matches but the type differs, so both old children go.
        assert!(tree.arena.get(first).unwrap().is_fresh());
        assert_eq!(tree.deleted_keys(), vec!["1", "2"]);
    }

    #[test]
    fn single_element_keeps_match_and_drops_rest() {
        let mut tree = Tree::mounted(keyed("li", &["a", "b", "c"]));

        let first = tree.render(&Element::host("li").key("b").into()).unwrap();

        assert!(!tree.arena.get(first).unwrap().is_fresh());
        assert_eq!(tree.deleted_keys(), vec!["a", "c"]);
    }

    #[test]
    fn single_text_reuses_text_fiber() {
        let mut tree = Tree::mounted(Child::text("hello"));

        let first = tree.render(&Child::text("world")).unwrap();

        let fiber = tree.arena.get(first).unwrap();
        assert!(!fiber.is_fresh());
        assert_eq!(fiber.pending_props.text(), Some("world"));
        assert!(!fiber.flags.contains(Flags::PLACEMENT));
    }

    #[test]
    fn single_text_replaces_element() {
        let mut tree = Tree::mounted(Element::host("b").key("x").into());

        let first = tree.render(&Child::text("plain")).unwrap();

        assert!(tree.arena.get(first).unwrap().flags.contains(Flags::PLACEMENT));
        assert_eq!(tree.deleted_keys(), vec!["x"]);
    }

    #[test]
    fn array_mount_places_every_child() {
        let mut tree = Tree::new();

        tree.render(&keyed("li", &["a", "b", "c"]));

        assert_eq!(tree.keys(), vec!["a", "b", "c"]);
        assert_eq!(tree.placed(), vec!["a", "b", "c"]);
        let indices: Vec<usize> = tree
            .arena
            .children(tree.wip)
            .map(|id| tree.arena.get(id).unwrap().index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn array_move_marks_only_displaced_children() {
        let mut tree = Tree::mounted(keyed("li", &["a", "b", "c"]));

        tree.render(&keyed("li", &["c", "a", "b"]));

        assert_eq!(tree.keys(), vec!["c", "a", "b"]);
        assert_eq!(tree.placed(), vec!["a", "b"]);
        assert!(tree.deleted_keys().is_empty());
    }

    #[test]
    fn array_move_to_end_places_one_child() {
        let mut tree = Tree::mounted(keyed("li", &["a", "b", "c"]));

        tree.render(&keyed("li", &["b", "c", "a"]));

        assert_eq!(tree.placed(), vec!["a"]);
    }

    #[test]
    fn array_insert_between_moved_children() {
        let mut tree = Tree::mounted(keyed("li", &["a", "b", "c"]));

        tree.render(&keyed("li", &["c", "x", "a"]));

        // c keeps its place, x is new, a moved behind c, b is gone.
        assert_eq!(tree.keys(), vec!["c", "x", "a"]);
        assert_eq!(tree.placed(), vec!["x", "a"]);
        assert_eq!(tree.deleted_keys(), vec!["b"]);
    }

    #[test]
    fn array_deletes_leftovers_once_in_old_order() {
        let mut tree = Tree::mounted(keyed("li", &["a", "b", "c", "d"]));

        tree.render(&keyed("li", &["c"]));

        assert_eq!(tree.deleted_keys(), vec!["a", "b", "d"]);
    }

    #[test]
    fn duplicate_old_keys_are_each_deleted_once() {
        let mut tree = Tree::mounted(keyed("li", &["k", "k"]));
        let old: Vec<FiberId> = tree.arena.children(tree.current).collect();
        assert_eq!(old.len(), 2);

        tree.render(&Child::List(Vec::new()));

        assert_eq!(tree.arena.get(tree.wip).unwrap().deletions, old);
    }

    #[test]
    fn duplicate_old_keys_reuse_the_last_one() {
        let mut tree = Tree::mounted(keyed("li", &["k", "k"]));
        let old: Vec<FiberId> = tree.arena.children(tree.current).collect();

        let first = tree.render(&keyed("li", &["k"])).unwrap();

        assert_eq!(tree.arena.get(first).unwrap().alternate, Some(old[1]));
        assert_eq!(tree.arena.get(tree.wip).unwrap().deletions, vec![old[0]]);
    }

    #[test]
    fn array_reuses_unkeyed_children_by_position() {
        let mut tree = Tree::mounted(Child::List(vec![
            Child::text("one"),
            Element::host("p").into(),
        ]));

        tree.render(&Child::List(vec![Child::text("uno"), Element::host("p").into()]));

        let children: Vec<FiberId> = tree.arena.children(tree.wip).collect();
        assert_eq!(children.len(), 2);
        assert!(children
            .iter()
            .all(|&id| !tree.arena.get(id).unwrap().is_fresh()));
        assert_eq!(
            tree.arena.get(children[0]).unwrap().pending_props.text(),
            Some("uno")
        );
    }

    #[test]
    fn array_skips_empty_and_nested_list_entries() {
        let mut tree = Tree::new();

        tree.render(&Child::List(vec![
            Element::host("li").key("a").into(),
            Child::Empty,
            Child::List(vec![Child::text("nested")]),
            Element::host("li").key("b").into(),
        ]));

        assert_eq!(tree.keys(), vec!["a", "b"]);
        let indices: Vec<usize> = tree
            .arena
            .children(tree.wip)
            .map(|id| tree.arena.get(id).unwrap().index)
            .collect();
        assert_eq!(indices, vec![0, 3]);
    }

    #[test]
    fn unkeyed_fragment_is_flattened() {
        let mut tree = Tree::new();

        tree.render(&Element::fragment(vec![Child::text("a"), Child::text("b")]).into());

        let kinds: Vec<FiberKind> = tree
            .arena
            .children(tree.wip)
            .map(|id| tree.arena.get(id).unwrap().kind.clone())
            .collect();
        assert_eq!(kinds, vec![FiberKind::Text, FiberKind::Text]);
    }

    #[test]
    fn keyed_fragment_in_array_is_reused() {
        let fragment = |label: &str| -> Child {
            Element::fragment(vec![Child::text(label)]).key("group").into()
        };
        let mut tree = Tree::mounted(Child::List(vec![fragment("first")]));

        let first = tree.render(&Child::List(vec![fragment("second")])).unwrap();

        let fiber = tree.arena.get(first).unwrap();
        assert_eq!(fiber.kind, FiberKind::Fragment);
        assert!(!fiber.is_fresh());
        assert!(matches!(&fiber.pending_props, Payload::Fragment(children) if children.len() == 1));
    }

    #[test]
    fn empty_child_deletes_all_old_children() {
        let mut tree = Tree::mounted(keyed("li", &["a", "b"]));

        let first = tree.render(&Child::Empty);

        assert_eq!(first, None);
        assert_eq!(tree.deleted_keys(), vec!["a", "b"]);
    }

    #[test]
    fn component_identity_decides_reuse() {
        let row = Component::new("Row", |_, _| Ok(Child::Empty));
        let other = Component::new("Row", |_, _| Ok(Child::Empty));
        let mut tree = Tree::mounted(Element::component(&row).into());

        let same = tree.render(&Element::component(&row).into()).unwrap();
        assert!(!tree.arena.get(same).unwrap().is_fresh());

        let replaced = tree.render(&Element::component(&other).into()).unwrap();
        assert!(tree.arena.get(replaced).unwrap().is_fresh());
    }

    #[test]
    fn mounting_reconciler_records_nothing() {
        let mut arena = FiberArena::new();
        let parent = arena.create_root(Props::new());

        let first = ChildReconciler::mounting()
            .reconcile(&mut arena, parent, None, &keyed("li", &["a", "b"]))
            .unwrap()
            .unwrap();

        assert!(!ChildReconciler::mounting().tracks_effects());
        let ids: Vec<FiberId> = arena.siblings(Some(first)).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids
            .iter()
            .all(|&id| arena.get(id).unwrap().flags.is_empty()));
        assert!(arena.get(parent).unwrap().deletions.is_empty());
    }
}
