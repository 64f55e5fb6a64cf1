//! State Cells
//!
//! A state cell is the record behind `use_state`. It holds the memoized
//! value for one render, the queue shared by every generation of the cell,
//! and the [`Dispatch`] handle returned to the component.
//!
//! # Dispatch
//!
//! A dispatch never touches the memoized value. It asks the scheduler for
//! a lane, appends `{ action, lane }` to the shared queue and requests a
//! render of the fiber that mounted the cell. The value changes only when
//! that render drains the queue.
//!
//! Dispatch handles are `Send + Sync`, so updates may be triggered from
//! other threads while rendering stays on one.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::fiber::FiberId;
use crate::scheduler::Scheduler;

use super::update_queue::{Action, SharedQueue, Update};

/// Initial value of a state cell: either the value or a function that
/// computes it on mount.
pub enum Initial<T> {
    Value(T),
    Lazy(Box<dyn FnOnce() -> T>),
}

impl<T> Initial<T> {
    /// Defer computing the initial value until the cell mounts.
    pub fn lazy<F>(init: F) -> Self
    where
        F: FnOnce() -> T + 'static,
    {
        Initial::Lazy(Box::new(init))
    }

    pub(crate) fn resolve(self) -> T {
        match self {
            Initial::Value(value) => value,
            Initial::Lazy(init) => init(),
        }
    }
}

impl<T> From<T> for Initial<T> {
    fn from(value: T) -> Self {
        Initial::Value(value)
    }
}

/// Handle for enqueueing updates to a state cell.
///
/// The handle is created on mount and returned unchanged by every later
/// render of the same cell.
pub struct Dispatch<T> {
    fiber: FiberId,
    queue: SharedQueue<T>,
    scheduler: Arc<dyn Scheduler>,
}

impl<T: Send + 'static> Dispatch<T> {
    pub(crate) fn new(fiber: FiberId, queue: SharedQueue<T>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            fiber,
            queue,
            scheduler,
        }
    }

    /// Enqueue an action and request a render.
    pub fn dispatch(&self, action: Action<T>) {
        let lane = self.scheduler.request_lane();
        self.queue.lock().enqueue(Update::new(action, lane));
        debug!(target: "trellis::hooks", fiber = ?self.fiber, ?lane, "state update enqueued");
        self.scheduler.schedule_render(self.fiber, lane);
    }

    /// Replace the state.
    pub fn set(&self, value: T) {
        self.dispatch(Action::Replace(value));
    }

    /// Compute the next state from the state at the time it is applied.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T + Send + 'static,
    {
        self.dispatch(Action::apply(f));
    }
}

impl<T> Dispatch<T> {
    /// The fiber this cell was mounted on.
    pub fn fiber(&self) -> FiberId {
        self.fiber
    }

    /// Check whether both handles feed the same queue.
    pub fn same_queue(&self, other: &Dispatch<T>) -> bool {
        Arc::ptr_eq(&self.queue, &other.queue)
    }

    /// Number of updates waiting for the next render.
    pub fn pending_len(&self) -> usize {
        self.queue.lock().pending_len()
    }
}

impl<T> Clone for Dispatch<T> {
    fn clone(&self) -> Self {
        Self {
            fiber: self.fiber,
            queue: Arc::clone(&self.queue),
            scheduler: Arc::clone(&self.scheduler),
        }
    }
}

impl<T> PartialEq for Dispatch<T> {
    fn eq(&self, other: &Self) -> bool {
        self.same_queue(other)
    }
}

impl<T> fmt::Debug for Dispatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("fiber", &self.fiber)
            .field("pending", &self.pending_len())
            .finish()
    }
}

/// The record stored for a state cell.
pub(crate) struct StateCell<T> {
    pub value: T,
    pub queue: SharedQueue<T>,
    pub dispatch: Dispatch<T>,
}
