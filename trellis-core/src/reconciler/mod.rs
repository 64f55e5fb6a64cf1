//! Child Reconciler
//!
//! This module turns a rendered [`Child`] description into the child chain
//! of a work-in-progress fiber, reusing the previous generation's fibers
//! where their identity allows it.
//!
//! # Modes
//!
//! A fiber that already has a committed counterpart is reconciled in
//! tracking mode: new and moved children get `PLACEMENT`, removed ones are
//! listed in the parent's `deletions`. A freshly mounted fiber is placed as
//! a whole, so its children are built with the mounting reconciler and
//! carry no flags of their own.

mod child;

pub use child::ChildReconciler;

use crate::element::Child;
use crate::error::Result;
use crate::fiber::{FiberArena, FiberId};

/// Reconcile the children of `wip` against `child` and store the new
/// first child on it.
pub fn reconcile_children(
    arena: &mut FiberArena,
    wip: FiberId,
    child: &Child,
) -> Result<Option<FiberId>> {
    let current_first = match arena.fiber(wip)?.alternate {
        Some(current) => Some(arena.fiber(current)?.child),
        None => None,
    };

    let first = match current_first {
        Some(current_first) => {
            ChildReconciler::tracking().reconcile(arena, wip, current_first, child)?
        }
        None => ChildReconciler::mounting().reconcile(arena, wip, None, child)?,
    };

    arena.fiber_mut(wip)?.child = first;
    Ok(first)
}
