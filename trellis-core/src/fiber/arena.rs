//! Fiber Arena
//!
//! All fibers of both generations live in one arena and refer to each other
//! by [`FiberId`]. The arena also provides the node factories the reconciler
//! consumes.
//!
//! # Double Buffering
//!
//! [`FiberArena::create_work_in_progress`] returns the alternate of a
//! current fiber, allocating it only the first time. After that the two
//! fibers of a position are recycled for as long as the position lives.
//!
//! # Removal
//!
//! Deleted children stay in the arena until the host has committed the
//! deletion. [`FiberArena::remove_subtree`] then frees the deleted fiber,
//! its alternate and everything below both, so the arena holds at most two
//! fibers per live tree position no matter how many updates are rendered.
//! Handles to removed fibers stop resolving.

use std::sync::Arc;

use slotmap::SlotMap;
use tracing::trace;

use crate::element::{Child, Element, Key, Props};
use crate::error::{Error, Result};

use super::node::{Fiber, FiberId, FiberKind, Flags, Payload};

/// Storage for fibers, indexed by ID.
#[derive(Debug, Default)]
pub struct FiberArena {
    fibers: SlotMap<FiberId, Fiber>,
}

impl FiberArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self {
            fibers: SlotMap::with_key(),
        }
    }

    /// Add a fiber to the arena.
    pub fn insert(&mut self, fiber: Fiber) -> FiberId {
        self.fibers.insert(fiber)
    }

    pub fn get(&self, id: FiberId) -> Option<&Fiber> {
        self.fibers.get(id)
    }

    pub fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber> {
        self.fibers.get_mut(id)
    }

    pub fn contains(&self, id: FiberId) -> bool {
        self.fibers.contains_key(id)
    }

    /// Free a committed deletion: `root`, its alternate, and every fiber
    /// below either of them. Returns the number of fibers removed.
    ///
    /// Fibers already removed are skipped, so stale child pointers left on
    /// an old generation are harmless.
    pub fn remove_subtree(&mut self, root: FiberId) -> usize {
        // The flag says whether the fiber's siblings belong to the subtree.
        // They do for everything except `root` and its alternate.
        let mut pending = vec![(root, false)];
        let mut removed = 0;

        while let Some((id, with_siblings)) = pending.pop() {
            let Some(fiber) = self.fibers.remove(id) else {
                continue;
            };
            removed += 1;

            if let Some(alternate) = fiber.alternate {
                pending.push((alternate, with_siblings));
            }
            if let Some(child) = fiber.child {
                pending.push((child, true));
            }
            if with_siblings {
                if let Some(sibling) = fiber.sibling {
                    pending.push((sibling, true));
                }
            }
        }

        trace!(target: "trellis::fiber", ?root, removed, "subtree removed");
        removed
    }

    /// Like [`get`](Self::get), but an unknown ID is an error.
    pub fn fiber(&self, id: FiberId) -> Result<&Fiber> {
        self.get(id).ok_or(Error::UnknownFiber(id))
    }

    /// Like [`get_mut`](Self::get_mut), but an unknown ID is an error.
    pub fn fiber_mut(&mut self, id: FiberId) -> Result<&mut Fiber> {
        self.get_mut(id).ok_or(Error::UnknownFiber(id))
    }

    /// Get the total number of fibers.
    pub fn len(&self) -> usize {
        self.fibers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fibers.is_empty()
    }

    /// Create the root fiber of a tree.
    pub fn create_root(&mut self, props: Props) -> FiberId {
        self.insert(Fiber::new(FiberKind::Root, Payload::Props(props), None))
    }

    /// Create a fiber for an element description.
    pub fn create_from_element(&mut self, element: &Element) -> FiberId {
        if element.is_fragment() {
            return self.create_from_fragment(element.fragment_children(), element.key.clone());
        }
        self.insert(Fiber::new(
            FiberKind::from_element_type(&element.ty),
            Payload::Props(element.props.clone()),
            element.key.clone(),
        ))
    }

    /// Create a fragment fiber whose payload is its child list.
    pub fn create_from_fragment(&mut self, children: Vec<Child>, key: Option<Key>) -> FiberId {
        self.insert(Fiber::new(
            FiberKind::Fragment,
            Payload::Fragment(children),
            key,
        ))
    }

    /// Create a text fiber.
    pub fn create_text(&mut self, content: Arc<str>) -> FiberId {
        self.insert(Fiber::new(FiberKind::Text, Payload::Text(content), None))
    }

    /// Get the work-in-progress counterpart of `current`, assigning it new
    /// pending props.
    ///
    /// The counterpart keeps the committed state of `current` (child
    /// pointer, memoized props, hooks, effects, pending lanes) and drops
    /// the per-pass fields (flags, deletions).
    pub fn create_work_in_progress(
        &mut self,
        current: FiberId,
        pending_props: Payload,
    ) -> Result<FiberId> {
        let source = self.fiber(current)?;
        let kind = source.kind.clone();
        let key = source.key.clone();
        let child = source.child;
        let sibling = source.sibling;
        let index = source.index;
        let memoized_props = source.memoized_props.clone();
        let hooks = source.hooks.clone();
        let effects = source.effects.clone();
        let lanes = source.lanes;
        let alternate = source.alternate;

        let wip = match alternate {
            Some(wip) => {
                let fiber = self.fiber_mut(wip)?;
                fiber.pending_props = pending_props;
                fiber.flags = Flags::empty();
                fiber.deletions.clear();
                wip
            }
            None => {
                let mut fiber = Fiber::new(kind, pending_props, key);
                fiber.alternate = Some(current);
                let wip = self.insert(fiber);
                self.fiber_mut(current)?.alternate = Some(wip);
                wip
            }
        };

        let fiber = self.fiber_mut(wip)?;
        fiber.child = child;
        fiber.sibling = sibling;
        fiber.index = index;
        fiber.memoized_props = memoized_props;
        fiber.hooks = hooks;
        fiber.effects = effects;
        fiber.lanes = lanes;
        Ok(wip)
    }

    /// Record the pending props as committed.
    pub fn complete(&mut self, id: FiberId) -> Result<()> {
        let fiber = self.fiber_mut(id)?;
        fiber.memoized_props = Some(fiber.pending_props.clone());
        Ok(())
    }

    /// Iterate over a sibling chain starting at `first`.
    pub fn siblings(&self, first: Option<FiberId>) -> Siblings<'_> {
        Siblings {
            arena: self,
            next: first,
        }
    }

    /// Iterate over the children of `parent`.
    pub fn children(&self, parent: FiberId) -> Siblings<'_> {
        self.siblings(self.get(parent).and_then(|fiber| fiber.child))
    }
}

/// Iterator over a sibling chain.
pub struct Siblings<'a> {
    arena: &'a FiberArena,
    next: Option<FiberId>,
}

impl Iterator for Siblings<'_> {
    type Item = FiberId;

    fn next(&mut self) -> Option<FiberId> {
        let id = self.next?;
        self.next = self.arena.get(id)?.sibling;
        Some(id)
    }
}
