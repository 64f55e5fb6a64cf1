//! Scheduler Interface
//!
//! The hook runtime never decides *when* a render happens. State changes
//! made outside a render ask a [`Scheduler`] for a lane and then request a
//! render of the affected fiber at that lane. Timing and batching policy
//! belong to the scheduler.
//!
//! [`RenderQueue`] is a reference implementation: it records the latest
//! request per fiber and lets the host drain them in priority order. It
//! is safe to share across threads, so dispatch handles may be used from
//! anywhere.

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use tracing::debug;

use crate::config::RuntimeConfig;
use crate::fiber::{FiberArena, FiberId, Lane};

/// What the hook runtime needs from a scheduler.
pub trait Scheduler: Send + Sync {
    /// The lane to attach to an update triggered right now.
    fn request_lane(&self) -> Lane;

    /// Ask for `fiber` to be rendered at `lane`.
    fn schedule_render(&self, fiber: FiberId, lane: Lane);
}

/// Pending render requests keyed by fiber.
#[derive(Debug)]
pub struct RenderQueue {
    ambient: AtomicU32,
    requests: DashMap<FiberId, Lane>,
}

impl RenderQueue {
    /// Create a queue whose ambient lane comes from the installed
    /// [`RuntimeConfig`].
    pub fn new() -> Self {
        Self::with_ambient_lane(RuntimeConfig::current().ambient_lane)
    }

    pub fn with_ambient_lane(lane: Lane) -> Self {
        Self {
            ambient: AtomicU32::new(lane.bits()),
            requests: DashMap::new(),
        }
    }

    pub fn ambient_lane(&self) -> Lane {
        Lane::from_bits(self.ambient.load(Ordering::Acquire))
    }

    pub fn set_ambient_lane(&self, lane: Lane) {
        self.ambient.store(lane.bits(), Ordering::Release);
    }

    /// Run `f` with a different ambient lane, restoring the old one after.
    pub fn with_lane<R>(&self, lane: Lane, f: impl FnOnce() -> R) -> R {
        let previous = self.ambient.swap(lane.bits(), Ordering::AcqRel);
        let result = f();
        self.ambient.store(previous, Ordering::Release);
        result
    }

    /// The lane `fiber` is currently scheduled at, if any.
    pub fn scheduled_lane(&self, fiber: FiberId) -> Option<Lane> {
        self.requests.get(&fiber).map(|entry| *entry.value())
    }

    pub fn is_scheduled(&self, fiber: FiberId) -> bool {
        self.requests.contains_key(&fiber)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Remove every request, most urgent lane first. Requests at the same
    /// lane come out in fiber order.
    pub fn take_pending(&self) -> Vec<(FiberId, Lane)> {
        let fibers: Vec<FiberId> = self.requests.iter().map(|entry| *entry.key()).collect();
        let mut pending: Vec<(FiberId, Lane)> = fibers
            .into_iter()
            .filter_map(|fiber| self.requests.remove(&fiber))
            .collect();
        pending.sort_by_key(|(fiber, lane)| (lane.highest_priority().bits(), *fiber));
        pending
    }

    /// Drain every request like [`take_pending`](Self::take_pending) and
    /// record its lane on the fiber and on its alternate, so whichever of
    /// the two is rendered next sees the pending work.
    ///
    /// Requests for fibers that have since been removed are dropped.
    pub fn drain_into(&self, arena: &mut FiberArena) -> Vec<(FiberId, Lane)> {
        let mut drained = Vec::new();
        for (fiber, lane) in self.take_pending() {
            let Some(node) = arena.get_mut(fiber) else {
                debug!(target: "trellis::scheduler", ?fiber, ?lane, "render request for removed fiber dropped");
                continue;
            };
            node.lanes = node.lanes.merge(lane);
            let alternate = node.alternate;

            if let Some(node) = alternate.and_then(|id| arena.get_mut(id)) {
                node.lanes = node.lanes.merge(lane);
            }
            drained.push((fiber, lane));
        }
        drained
    }
}

impl Default for RenderQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for RenderQueue {
    fn request_lane(&self) -> Lane {
        self.ambient_lane()
    }

    /// A later request replaces an earlier one for the same fiber, at
    /// whatever priority it carries.
    fn schedule_render(&self, fiber: FiberId, lane: Lane) {
        if let Some(previous) = self.requests.insert(fiber, lane) {
            if previous != lane {
                debug!(target: "trellis::scheduler", ?fiber, ?previous, ?lane, "render request superseded");
            }
        } else {
            debug!(target: "trellis::scheduler", ?fiber, ?lane, "render requested");
        }
    }
}
