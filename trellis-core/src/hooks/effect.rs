//! Effect Records
//!
//! An effect cell produces one [`Effect`] record per render. The records of
//! a fiber are kept in its [`EffectQueue`] in call order and consumed after
//! the generation commits by [`flush_passive_effects`].
//!
//! # Firing Rules
//!
//! A record carries [`HookFlags::HAS_EFFECT`] when its `create` callback
//! must run at commit. On mount every record has it. On update it is set
//! unless both the previous and the new dependency snapshots are present
//! and identical element by element (see [`Value::same_value`]). Either
//! way the previous record's `destroy` is carried into the new record:
//! a firing effect runs it before `create`, a skipped one keeps it for the
//! next firing or for unmount.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use smallvec::SmallVec;
use tracing::trace;

use crate::element::Value;
use crate::error::Result;
use crate::fiber::{FiberArena, FiberId, Flags};

bitflags! {
    /// Tags on an effect record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HookFlags: u8 {
        /// The effect must fire at commit.
        const HAS_EFFECT = 1 << 0;

        /// The effect runs after commit.
        const PASSIVE = 1 << 3;
    }
}

/// Cleanup returned by an effect.
pub type Destroy = Rc<dyn Fn()>;

/// Effect callback. Its return value becomes the record's `destroy`.
pub type Create = Rc<dyn Fn() -> Option<Destroy>>;

/// Ordered snapshot of dependency values.
pub type Deps = SmallVec<[Value; 4]>;

/// Build a [`Deps`] snapshot from values convertible into [`Value`].
///
/// ```rust
/// use trellis_core::deps;
///
/// let deps = deps![1, "two", true];
/// assert_eq!(deps.len(), 3);
/// ```
#[macro_export]
macro_rules! deps {
    ($($value:expr),* $(,)?) => {
        <$crate::hooks::Deps as ::core::iter::FromIterator<$crate::element::Value>>::from_iter([
            $($crate::element::Value::from($value)),*
        ])
    };
}

/// A queued side effect.
pub struct Effect {
    pub tag: HookFlags,
    pub create: Create,
    pub destroy: Option<Destroy>,
    pub deps: Option<Deps>,
}

impl Effect {
    pub fn has_effect(&self) -> bool {
        self.tag.contains(HookFlags::HAS_EFFECT)
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("tag", &self.tag)
            .field("has_destroy", &self.destroy.is_some())
            .field("deps", &self.deps)
            .finish()
    }
}

/// Shared handle to an effect record. The hook record and the effect queue
/// of a fiber point at the same record.
pub type EffectRef = Rc<RefCell<Effect>>;

/// Effect records of one fiber, in call order.
///
/// Iteration starts at the first record; [`last_effect`](Self::last_effect)
/// is the most recently pushed one.
#[derive(Debug, Clone, Default)]
pub struct EffectQueue {
    effects: Vec<EffectRef>,
}

impl EffectQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return the shared handle to it.
    pub fn push(&mut self, effect: Effect) -> EffectRef {
        let effect = Rc::new(RefCell::new(effect));
        self.effects.push(Rc::clone(&effect));
        effect
    }

    pub fn last_effect(&self) -> Option<&EffectRef> {
        self.effects.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EffectRef> {
        self.effects.iter()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Number of records that will fire at commit.
    pub fn firing_count(&self) -> usize {
        self.effects
            .iter()
            .filter(|effect| effect.borrow().has_effect())
            .count()
    }
}

/// Check whether two dependency snapshots are identical.
///
/// A missing snapshot never matches, so effects without dependencies fire
/// on every render.
pub fn are_deps_equal(next: Option<&Deps>, prev: Option<&Deps>) -> bool {
    match (next, prev) {
        (Some(next), Some(prev)) => {
            next.len() == prev.len()
                && next.iter().zip(prev.iter()).all(|(a, b)| a.same_value(b))
        }
        _ => false,
    }
}

/// Run the firing effects of a committed fiber.
///
/// For every record tagged `HAS_EFFECT`, in order, the carried `destroy`
/// runs first and then `create`, whose result replaces `destroy`. Clears
/// [`Flags::PASSIVE_EFFECT`] on the fiber. Returns the number of effects
/// that fired.
pub fn flush_passive_effects(arena: &mut FiberArena, fiber: FiberId) -> Result<usize> {
    let effects = arena.fiber(fiber)?.effects.clone();
    let mut fired = 0;

    for effect in effects.iter() {
        let (create, destroy) = {
            let mut record = effect.borrow_mut();
            if !record.has_effect() {
                continue;
            }
            (Rc::clone(&record.create), record.destroy.take())
        };

        if let Some(destroy) = destroy {
            destroy();
        }
        let next_destroy = create();
        effect.borrow_mut().destroy = next_destroy;
        fired += 1;
    }

    arena.fiber_mut(fiber)?.flags.remove(Flags::PASSIVE_EFFECT);
    trace!(target: "trellis::hooks", ?fiber, fired, "flushed passive effects");
    Ok(fired)
}

/// Run every pending `destroy` of a fiber that is leaving the tree.
pub fn unmount_effects(arena: &FiberArena, fiber: FiberId) -> Result<usize> {
    let mut destroyed = 0;
    for effect in arena.fiber(fiber)?.effects.iter() {
        let destroy = effect.borrow_mut().destroy.take();
        if let Some(destroy) = destroy {
            destroy();
            destroyed += 1;
        }
    }
    Ok(destroyed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::element::Value;

    fn noop() -> Create {
        Rc::new(|| None)
    }

    #[test]
    fn deps_compare_pairwise() {
        let a = deps![1, 2];
        let b = deps![1, 2];
        let c = deps![1, 3];
        let shorter = deps![1];

        assert!(are_deps_equal(Some(&a), Some(&b)));
        assert!(!are_deps_equal(Some(&a), Some(&c)));
        assert!(!are_deps_equal(Some(&a), Some(&shorter)));
        assert!(!are_deps_equal(None, Some(&a)));
        assert!(!are_deps_equal(Some(&a), None));
        assert!(!are_deps_equal(None, None));
    }

    #[test]
    fn deps_compare_references_by_identity() {
        let shared = Value::reference(String::from("config"));
        let a: Deps = Deps::from_iter([shared.clone()]);
        let b: Deps = Deps::from_iter([shared]);
        let c: Deps = Deps::from_iter([Value::reference(String::from("config"))]);

        assert!(are_deps_equal(Some(&a), Some(&b)));
        assert!(!are_deps_equal(Some(&a), Some(&c)));
    }

    #[test]
    fn queue_keeps_call_order() {
        let mut queue = EffectQueue::new();
        queue.push(Effect {
            tag: HookFlags::PASSIVE | HookFlags::HAS_EFFECT,
            create: noop(),
            destroy: None,
            deps: None,
        });
        let last = queue.push(Effect {
            tag: HookFlags::PASSIVE,
            create: noop(),
            destroy: None,
            deps: Some(deps![1]),
        });

        assert_eq!(queue.len(), 2);
        assert!(Rc::ptr_eq(queue.last_effect().unwrap(), &last));
        assert_eq!(queue.firing_count(), 1);
        assert!(queue.iter().next().unwrap().borrow().has_effect());
    }

    #[test]
    fn flush_runs_destroy_before_create() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut arena = FiberArena::new();
        let fiber = arena.create_text("x".into());

        let create_log = Rc::clone(&log);
        let destroy_log = Rc::clone(&log);
        let destroy: Destroy = Rc::new(move || destroy_log.borrow_mut().push("destroy"));
        {
            let node = arena.get_mut(fiber).unwrap();
            node.flags |= Flags::PASSIVE_EFFECT;
            node.effects.push(Effect {
                tag: HookFlags::PASSIVE | HookFlags::HAS_EFFECT,
                create: Rc::new(move || {
                    create_log.borrow_mut().push("create");
                    None
                }),
                destroy: Some(destroy),
                deps: None,
            });
            node.effects.push(Effect {
                tag: HookFlags::PASSIVE,
                create: Rc::new(|| panic!("skipped effect must not fire")),
                destroy: None,
                deps: Some(deps![1]),
            });
        }

        assert_eq!(flush_passive_effects(&mut arena, fiber).unwrap(), 1);
        assert_eq!(*log.borrow(), vec!["destroy", "create"]);
        assert!(!arena.get(fiber).unwrap().flags.contains(Flags::PASSIVE_EFFECT));
    }

    #[test]
    fn unmount_runs_each_destroy_once() {
        let count = Rc::new(Cell::new(0));
        let mut arena = FiberArena::new();
        let fiber = arena.create_text("x".into());

        let counter = Rc::clone(&count);
        arena.get_mut(fiber).unwrap().effects.push(Effect {
            tag: HookFlags::PASSIVE,
            create: noop(),
            destroy: Some(Rc::new(move || counter.set(counter.get() + 1))),
            deps: None,
        });

        assert_eq!(unmount_effects(&arena, fiber).unwrap(), 1);
        assert_eq!(unmount_effects(&arena, fiber).unwrap(), 0);
        assert_eq!(count.get(), 1);
    }
}
