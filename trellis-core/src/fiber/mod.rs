//! Fiber Tree
//!
//! Work nodes ("fibers") and the arena that owns them.
//!
//! # Overview
//!
//! Every tree position has up to two fibers: the *current* one, which was
//! committed by the previous pass and is read-only, and the
//! *work-in-progress* one being built by the pass in flight. The two point
//! at each other through `alternate`. A fiber without an alternate is a
//! fresh mount.
//!
//! Fibers reference each other (parent, child, sibling, alternate) by
//! [`FiberId`] handles into a [`FiberArena`] instead of by pointer, which
//! keeps the mutually referencing generations free of lifetime tangles.

mod arena;
mod lane;
mod node;

pub use arena::{FiberArena, Siblings};
pub use lane::Lane;
pub use node::{Fiber, FiberId, FiberKind, Flags, Payload};
