//! Update Queue
//!
//! Each state cell owns one queue of pending updates. The queue instance
//! is created when the cell mounts and is shared, by reference, between
//! the cell's records in both generations and every [`Dispatch`] handle
//! bound to it. Dispatches only ever append; the queue is drained by the
//! next render of the owning fiber.
//!
//! [`Dispatch`]: super::Dispatch

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::fiber::Lane;

/// What an update does to the state it is applied to.
pub enum Action<T> {
    /// Replace the state.
    Replace(T),
    /// Compute the next state from the running state.
    Apply(Box<dyn FnOnce(&T) -> T + Send>),
}

impl<T> Action<T> {
    /// Wrap an updater function.
    pub fn apply<F>(f: F) -> Self
    where
        F: FnOnce(&T) -> T + Send + 'static,
    {
        Action::Apply(Box::new(f))
    }

    /// Apply this action to `state`.
    pub fn reduce(self, state: T) -> T {
        match self {
            Action::Replace(value) => value,
            Action::Apply(f) => f(&state),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Action<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Replace(value) => f.debug_tuple("Replace").field(value).finish(),
            Action::Apply(_) => f.write_str("Apply(..)"),
        }
    }
}

/// A pending update.
#[derive(Debug)]
pub struct Update<T> {
    pub action: Action<T>,
    pub lane: Lane,
}

impl<T> Update<T> {
    pub fn new(action: Action<T>, lane: Lane) -> Self {
        Self { action, lane }
    }
}

/// Pending updates of one state cell, in arrival order.
#[derive(Debug)]
pub struct UpdateQueue<T> {
    pending: Vec<Update<T>>,
}

/// The queue as shared between generations and dispatch handles.
pub type SharedQueue<T> = Arc<Mutex<UpdateQueue<T>>>;

impl<T> UpdateQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Create an empty queue ready to be shared.
    pub fn shared() -> SharedQueue<T> {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Append an update.
    pub fn enqueue(&mut self, update: Update<T>) {
        self.pending.push(update);
    }

    /// Remove and return every pending update, oldest first.
    pub fn take_pending(&mut self) -> Vec<Update<T>> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl<T> Default for UpdateQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold `pending` over `base` in arrival order.
///
/// Lanes do not reorder updates: an idle update enqueued before a sync one
/// is still applied first.
pub fn process_update_queue<T>(base: T, pending: Vec<Update<T>>) -> T {
    pending
        .into_iter()
        .fold(base, |state, update| update.action.reduce(state))
}
