//! Hook Runtime
//!
//! This module implements component-local state that survives re-renders:
//! state cells, effect cells, and the render context that binds them to a
//! fiber by call position.
//!
//! # Concepts
//!
//! ## State Cells
//!
//! `use_state` returns the current value and a [`Dispatch`] handle. The
//! handle appends updates to a queue shared by every generation of the
//! cell; the next render of the fiber folds them into the new value.
//!
//! ## Effect Cells
//!
//! `use_effect` records a side effect to run after commit, and whether it
//! must fire this time given its dependency snapshot.
//!
//! ## The Render Context
//!
//! Hook primitives are methods on [`HookCx`], which [`render_component`]
//! creates for exactly one component invocation. A thread-local
//! [`RenderScope`] guard makes sure only one invocation is rendering at a
//! time and is released on every exit path.

mod effect;
mod runtime;
mod scope;
mod state;
mod update_queue;

pub use effect::{
    are_deps_equal, flush_passive_effects, unmount_effects, Create, Deps, Destroy, Effect,
    EffectQueue, EffectRef, HookFlags,
};
pub use runtime::{render_component, Hook, HookCx, HookMode};
pub use scope::RenderScope;
pub use state::{Dispatch, Initial};
pub use update_queue::{process_update_queue, Action, SharedQueue, Update, UpdateQueue};
