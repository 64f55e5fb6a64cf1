//! Trellis Core
//!
//! This crate provides the incremental update engine of the Trellis
//! declarative UI runtime. It implements:
//!
//! - Dual-generation fiber trees stored in an arena
//! - Child reconciliation (keyed diffing with move detection)
//! - Hook state: state cells, effect cells and shared update queues
//! - A scheduler interface and a reference render queue
//!
//! Host mutation, commit and scheduling policy live outside this crate;
//! it only computes what changed.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `element`: Child descriptions produced by components
//! - `fiber`: Work nodes, the arena that owns them, and lanes
//! - `hooks`: The render context and hook records
//! - `reconciler`: Diffing old children against a new description
//! - `scheduler`: How state updates request renders
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use trellis_core::{
//!     reconcile_children, render_component, Child, Component, Element, FiberArena, Lane,
//!     RenderQueue, Scheduler,
//! };
//!
//! let counter = Component::new("Counter", |cx, _props| {
//!     let (count, _set_count) = cx.use_state(0i64)?;
//!     Ok(Element::host("span").child(count).into())
//! });
//!
//! let queue = Arc::new(RenderQueue::new());
//! let scheduler: Arc<dyn Scheduler> = queue.clone();
//!
//! let mut arena = FiberArena::new();
//! let fiber = arena.create_from_element(&Element::component(&counter));
//! let children: Child = render_component(&mut arena, fiber, Lane::DEFAULT, &scheduler)?;
//! let first = reconcile_children(&mut arena, fiber, &children)?;
//! assert!(first.is_some());
//! # Ok::<(), trellis_core::Error>(())
//! ```

pub mod config;
pub mod element;
pub mod error;
pub mod fiber;
pub mod hooks;
pub mod reconciler;
pub mod scheduler;

pub use config::RuntimeConfig;
pub use element::{Child, Component, ComponentId, Element, ElementType, Key, Props, Value};
pub use error::{Error, Result};
pub use fiber::{Fiber, FiberArena, FiberId, FiberKind, Flags, Lane, Payload};
pub use hooks::{
    flush_passive_effects, render_component, unmount_effects, Deps, Destroy, Dispatch, HookCx,
    Initial,
};
pub use reconciler::{reconcile_children, ChildReconciler};
pub use scheduler::{RenderQueue, Scheduler};
