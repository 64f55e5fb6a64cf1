//! Fiber Nodes
//!
//! This module defines the work node that lives in the fiber arena. One
//! fiber describes one tree position for one generation.

use std::sync::Arc;

use bitflags::bitflags;
use slotmap::{Key as _, KeyData};

use crate::element::{Child, Component, ElementType, Key, Props};
use crate::hooks::{EffectQueue, Hook};

use super::lane::Lane;

slotmap::new_key_type! {
    /// Handle to a fiber in a [`FiberArena`](super::FiberArena).
    ///
    /// Handles are generational: once a fiber is removed, its handle never
    /// resolves again, even after the slot is reused.
    pub struct FiberId;
}

impl FiberId {
    /// Rebuild a handle from the value returned by [`raw`](Self::raw).
    pub fn from_raw(raw: u64) -> Self {
        KeyData::from_ffi(raw).into()
    }

    /// Get a stable integer form of the handle.
    pub fn raw(self) -> u64 {
        self.data().as_ffi()
    }
}

bitflags! {
    /// Pending structural effects on a fiber.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u16 {
        /// The fiber must be (re)inserted at its rendered position.
        const PLACEMENT = 1 << 1;

        /// At least one child is listed in `deletions`.
        const CHILD_DELETION = 1 << 4;

        /// At least one effect record carries `HAS_EFFECT`.
        const PASSIVE_EFFECT = 1 << 3;
    }
}

/// What a fiber is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FiberKind {
    /// The root of a tree.
    Root,
    /// A function component.
    Function(Component),
    /// A host element with its tag.
    Host(Arc<str>),
    /// A text leaf.
    Text,
    /// A grouping of children.
    Fragment,
}

impl FiberKind {
    pub fn from_element_type(ty: &ElementType) -> Self {
        match ty {
            ElementType::Host(tag) => FiberKind::Host(tag.clone()),
            ElementType::Function(component) => FiberKind::Function(component.clone()),
            ElementType::Fragment => FiberKind::Fragment,
        }
    }

    /// Check whether a fiber of this kind can be reused for `ty`.
    pub fn matches(&self, ty: &ElementType) -> bool {
        match (self, ty) {
            (FiberKind::Host(a), ElementType::Host(b)) => a == b,
            (FiberKind::Function(a), ElementType::Function(b)) => a == b,
            (FiberKind::Fragment, ElementType::Fragment) => true,
            _ => false,
        }
    }

    /// A readable name, used in errors and traces.
    pub fn name(&self) -> &str {
        match self {
            FiberKind::Root => "#root",
            FiberKind::Function(component) => component.name(),
            FiberKind::Host(tag) => tag,
            FiberKind::Text => "#text",
            FiberKind::Fragment => "#fragment",
        }
    }
}

/// The props a fiber is rendered with.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Props of a host element, component or root.
    Props(Props),
    /// Content of a text fiber.
    Text(Arc<str>),
    /// Children of a fragment fiber.
    Fragment(Vec<Child>),
}

impl Payload {
    pub fn props(&self) -> Option<&Props> {
        match self {
            Payload::Props(props) => Some(props),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Payload::Text(content) => Some(content),
            _ => None,
        }
    }
}

/// A work node.
#[derive(Debug)]
pub struct Fiber {
    pub kind: FiberKind,
    pub key: Option<Key>,

    /// Props assigned for the pass being built.
    pub pending_props: Payload,

    /// Props of the last completed pass.
    pub memoized_props: Option<Payload>,

    pub parent: Option<FiberId>,
    pub sibling: Option<FiberId>,
    pub child: Option<FiberId>,

    /// Position among siblings in the generation that produced this fiber.
    pub index: usize,

    /// Counterpart in the other generation.
    pub alternate: Option<FiberId>,

    pub flags: Flags,

    /// Old-generation children slated for removal.
    pub deletions: Vec<FiberId>,

    /// Hook records in call order.
    pub hooks: Vec<Hook>,

    /// Effects produced by the last render of this fiber.
    pub effects: EffectQueue,

    /// Lanes with pending work on this fiber.
    pub lanes: Lane,
}

impl Fiber {
    pub fn new(kind: FiberKind, pending_props: Payload, key: Option<Key>) -> Self {
        Self {
            kind,
            key,
            pending_props,
            memoized_props: None,
            parent: None,
            sibling: None,
            child: None,
            index: 0,
            alternate: None,
            flags: Flags::empty(),
            deletions: Vec::new(),
            hooks: Vec::new(),
            effects: EffectQueue::new(),
            lanes: Lane::NO_LANE,
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == FiberKind::Text
    }

    /// Check whether this fiber was created for the pass being built.
    pub fn is_fresh(&self) -> bool {
        self.alternate.is_none()
    }

    pub fn component(&self) -> Option<&Component> {
        match &self.kind {
            FiberKind::Function(component) => Some(component),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Child;

    #[test]
    fn new_fiber_is_fresh_and_clean() {
        let fiber = Fiber::new(FiberKind::Text, Payload::Text("hi".into()), None);

        assert!(fiber.is_fresh());
        assert!(fiber.is_text());
        assert!(fiber.flags.is_empty());
        assert!(fiber.deletions.is_empty());
        assert_eq!(fiber.pending_props.text(), Some("hi"));
    }

    #[test]
    fn kind_matches_element_type() {
        let component = Component::new("Row", |_, _| Ok(Child::Empty));
        let other = Component::new("Row", |_, _| Ok(Child::Empty));

        assert!(FiberKind::Host("div".into()).matches(&ElementType::Host("div".into())));
        assert!(!FiberKind::Host("div".into()).matches(&ElementType::Host("span".into())));
        assert!(FiberKind::Function(component.clone())
            .matches(&ElementType::Function(component.clone())));
        assert!(!FiberKind::Function(component).matches(&ElementType::Function(other)));
        assert!(FiberKind::Fragment.matches(&ElementType::Fragment));
        assert!(!FiberKind::Text.matches(&ElementType::Fragment));
    }

    #[test]
    fn flags_combine() {
        let mut flags = Flags::PLACEMENT;
        flags |= Flags::CHILD_DELETION;

        assert!(flags.contains(Flags::PLACEMENT));
        assert!(!flags.contains(Flags::PASSIVE_EFFECT));
    }
}
