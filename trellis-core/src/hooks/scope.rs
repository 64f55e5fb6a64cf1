//! Render Scope
//!
//! At most one component may be rendering on a thread at any instant. The
//! render scope records which fiber that is, so a nested render attempt
//! is refused and hook primitives can check that their context is still
//! the live one.
//!
//! # Implementation
//!
//! A thread-local slot holds the rendering fiber. [`RenderScope::enter`]
//! fills it and returns a guard; dropping the guard empties it again, so
//! the slot is reset on every exit path, including `?` returns and panics
//! unwinding out of a component.

use std::cell::Cell;

use crate::error::{Error, Result};
use crate::fiber::FiberId;

thread_local! {
    static RENDERING: Cell<Option<FiberId>> = const { Cell::new(None) };
}

/// Guard that marks a fiber as rendering until dropped.
#[derive(Debug)]
pub struct RenderScope {
    fiber: FiberId,
}

impl RenderScope {
    /// Mark `fiber` as the rendering fiber of this thread.
    ///
    /// Fails if another render is already in progress.
    pub fn enter(fiber: FiberId) -> Result<Self> {
        RENDERING.with(|slot| match slot.get() {
            Some(active) => Err(Error::RenderInProgress {
                active,
                requested: fiber,
            }),
            None => {
                slot.set(Some(fiber));
                Ok(Self { fiber })
            }
        })
    }

    /// Check if a render is in progress on this thread.
    pub fn is_active() -> bool {
        RENDERING.with(|slot| slot.get().is_some())
    }

    /// The fiber rendering on this thread, if any.
    pub fn current_fiber() -> Option<FiberId> {
        RENDERING.with(Cell::get)
    }

    pub fn fiber(&self) -> FiberId {
        self.fiber
    }
}

impl Drop for RenderScope {
    fn drop(&mut self) {
        RENDERING.with(|slot| {
            let popped = slot.take();
            debug_assert_eq!(
                popped,
                Some(self.fiber),
                "RenderScope mismatch: expected {:?}, got {:?}",
                self.fiber,
                popped
            );
        });
    }
}
