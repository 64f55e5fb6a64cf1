//! Hook Runtime
//!
//! [`render_component`] runs one component function with a [`HookCx`], the
//! render context every hook primitive goes through. The context is the
//! only place render-pass state lives:
//!
//! - the fiber being rendered and the lane of the pass,
//! - the strategy, [`HookMode::Mount`] or [`HookMode::Update`], chosen once
//!   from whether the fiber has an alternate,
//! - a cursor into the previous generation's hook records,
//! - the hook records, effects and flags produced so far.
//!
//! # Positional Identity
//!
//! The Nth hook call of a render binds to the Nth record of the previous
//! render. Nothing else identifies a record. A call past the end of the
//! previous list is fatal ([`Error::TooManyHooks`]), and so is a call that
//! lands on a record of another kind ([`Error::HookKindMismatch`]).
//!
//! # Failure
//!
//! The produced records are installed on the fiber only when the component
//! returns `Ok`. On error the work-in-progress fiber is left without hooks
//! and the current generation is never touched; the caller discards the
//! work-in-progress tree.

use std::any::{type_name, Any};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::config::RuntimeConfig;
use crate::element::{Child, Component, Props};
use crate::error::{Error, Result};
use crate::fiber::{FiberArena, FiberId, Flags, Lane, Payload};
use crate::scheduler::Scheduler;

use super::effect::{are_deps_equal, Create, Deps, Destroy, Effect, EffectQueue, EffectRef, HookFlags};
use super::scope::RenderScope;
use super::state::{Dispatch, Initial, StateCell};
use super::update_queue::{process_update_queue, UpdateQueue};

/// A hook record.
#[derive(Clone)]
pub enum Hook {
    /// A state cell, type-erased.
    State {
        cell: Rc<dyn Any>,
        type_name: &'static str,
    },
    /// An effect cell.
    Effect(EffectRef),
}

impl Hook {
    fn state<T: 'static>(cell: StateCell<T>) -> Self {
        Hook::State {
            cell: Rc::new(cell),
            type_name: type_name::<T>(),
        }
    }

    fn state_cell<T: 'static>(&self) -> Option<&StateCell<T>> {
        match self {
            Hook::State { cell, .. } => cell.downcast_ref::<StateCell<T>>(),
            Hook::Effect(_) => None,
        }
    }

    /// The memoized value of a state record holding a `T`.
    pub fn state_value<T: 'static>(&self) -> Option<&T> {
        self.state_cell::<T>().map(|cell| &cell.value)
    }

    /// The effect record of an effect hook.
    pub fn effect(&self) -> Option<&EffectRef> {
        match self {
            Hook::Effect(effect) => Some(effect),
            Hook::State { .. } => None,
        }
    }

    /// A readable description, used in mismatch errors.
    pub fn describe(&self) -> String {
        match self {
            Hook::State { type_name, .. } => format!("state<{type_name}>"),
            Hook::Effect(_) => "effect".to_string(),
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::State { type_name, .. } => f.debug_struct("State").field("type", type_name).finish(),
            Hook::Effect(effect) => f.debug_tuple("Effect").field(&effect.borrow()).finish(),
        }
    }
}

/// How hook primitives behave during a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookMode {
    /// First render of the fiber: records are created.
    Mount,
    /// Later render: records are derived from the previous generation.
    Update,
}

/// Render-pass state while a component runs.
struct ActiveRender<'a> {
    fiber: FiberId,
    component: &'a Component,
    lane: Lane,
    mode: HookMode,
    scheduler: &'a Arc<dyn Scheduler>,

    /// Hook records of the previous generation.
    current_hooks: &'a [Hook],

    /// Index of the next previous-generation record to bind.
    cursor: usize,

    hooks: Vec<Hook>,
    effects: EffectQueue,
    flags: Flags,
}

impl<'a> ActiveRender<'a> {
    /// Advance to the previous-generation record matching this call.
    fn next_current_hook(&mut self) -> Result<(usize, &'a Hook)> {
        let index = self.cursor;
        let current_hooks: &'a [Hook] = self.current_hooks;
        let hook = current_hooks.get(index).ok_or_else(|| Error::TooManyHooks {
            fiber: self.fiber,
            component: self.component.name().to_string(),
        })?;
        self.cursor += 1;
        Ok((index, hook))
    }

    fn mismatch(&self, index: usize, expected: String, found: &Hook) -> Error {
        Error::HookKindMismatch {
            fiber: self.fiber,
            component: self.component.name().to_string(),
            index,
            expected,
            found: found.describe(),
        }
    }

    fn push_effect(&mut self, tag: HookFlags, create: Create, destroy: Option<Destroy>, deps: Option<Deps>) {
        let effect = self.effects.push(Effect {
            tag,
            create,
            destroy,
            deps,
        });
        self.hooks.push(Hook::Effect(effect));
    }
}

/// What a finished render produced.
struct RenderOutput {
    hooks: Vec<Hook>,
    effects: EffectQueue,
    flags: Flags,
    bound: usize,
}

/// The render context passed to a component.
///
/// Hook primitives are methods on this type. Calls must happen in the same
/// order on every render of a component.
pub struct HookCx<'a> {
    active: Option<ActiveRender<'a>>,
}

impl<'a> HookCx<'a> {
    fn active(&mut self) -> Result<&mut ActiveRender<'a>> {
        let active = self.active.as_mut().ok_or(Error::OutsideRender)?;
        if RenderScope::current_fiber() != Some(active.fiber) {
            return Err(Error::OutsideRender);
        }
        Ok(active)
    }

    fn release(&mut self) -> Option<RenderOutput> {
        self.active.take().map(|active| RenderOutput {
            hooks: active.hooks,
            effects: active.effects,
            flags: active.flags,
            bound: active.cursor,
        })
    }

    /// The fiber being rendered.
    pub fn fiber(&self) -> Option<FiberId> {
        self.active.as_ref().map(|active| active.fiber)
    }

    /// The lane of this render pass.
    pub fn lane(&self) -> Lane {
        self.active.as_ref().map_or(Lane::NO_LANE, |active| active.lane)
    }

    /// Whether this render mounts or updates the fiber.
    pub fn mode(&self) -> Option<HookMode> {
        self.active.as_ref().map(|active| active.mode)
    }

    /// A state cell.
    ///
    /// On mount, `initial` becomes the value. On later renders `initial` is
    /// ignored and the value is the previous one with every pending update
    /// applied in arrival order. The returned [`Dispatch`] is the same
    /// handle on every render.
    pub fn use_state<T>(&mut self, initial: impl Into<Initial<T>>) -> Result<(T, Dispatch<T>)>
    where
        T: Clone + Send + 'static,
    {
        let active = self.active()?;
        match active.mode {
            HookMode::Mount => {
                let value = initial.into().resolve();
                let queue = UpdateQueue::shared();
                let dispatch = Dispatch::new(active.fiber, Arc::clone(&queue), Arc::clone(active.scheduler));
                active.hooks.push(Hook::state(StateCell {
                    value: value.clone(),
                    queue,
                    dispatch: dispatch.clone(),
                }));
                Ok((value, dispatch))
            }
            HookMode::Update => {
                let (index, hook) = active.next_current_hook()?;
                let previous = hook
                    .state_cell::<T>()
                    .ok_or_else(|| active.mismatch(index, format!("state<{}>", type_name::<T>()), hook))?;

                let pending = previous.queue.lock().take_pending();
                let drained = pending.len();
                let value = process_update_queue(previous.value.clone(), pending);
                trace!(target: "trellis::hooks", fiber = ?active.fiber, index, drained, "state cell updated");

                let dispatch = previous.dispatch.clone();
                active.hooks.push(Hook::state(StateCell {
                    value: value.clone(),
                    queue: Arc::clone(&previous.queue),
                    dispatch: dispatch.clone(),
                }));
                Ok((value, dispatch))
            }
        }
    }

    /// A passive effect cell.
    ///
    /// `create` runs after commit when the effect fires; whatever it
    /// returns runs before the next firing or on unmount. With `deps` set
    /// the effect fires only when the snapshot differs from the previous
    /// render's. With `None` it fires on every render.
    pub fn use_effect<F>(&mut self, create: F, deps: Option<Deps>) -> Result<()>
    where
        F: Fn() -> Option<Destroy> + 'static,
    {
        let active = self.active()?;
        let create: Create = Rc::new(create);
        match active.mode {
            HookMode::Mount => {
                active.flags |= Flags::PASSIVE_EFFECT;
                active.push_effect(HookFlags::PASSIVE | HookFlags::HAS_EFFECT, create, None, deps);
            }
            HookMode::Update => {
                let (index, hook) = active.next_current_hook()?;
                let previous = hook
                    .effect()
                    .ok_or_else(|| active.mismatch(index, "effect".to_string(), hook))?;
                let (destroy, unchanged) = {
                    let previous = previous.borrow();
                    (
                        previous.destroy.clone(),
                        are_deps_equal(deps.as_ref(), previous.deps.as_ref()),
                    )
                };

                if unchanged {
                    active.push_effect(HookFlags::PASSIVE, create, destroy, deps);
                } else {
                    active.flags |= Flags::PASSIVE_EFFECT;
                    active.push_effect(HookFlags::PASSIVE | HookFlags::HAS_EFFECT, create, destroy, deps);
                }
            }
        }
        Ok(())
    }
}

/// Render the function component at `wip`.
///
/// Clears the fiber's hook records and effects, runs the component with
/// its pending props and, on success, installs the records it produced and
/// returns its child description for reconciliation.
pub fn render_component(
    arena: &mut FiberArena,
    wip: FiberId,
    lane: Lane,
    scheduler: &Arc<dyn Scheduler>,
) -> Result<Child> {
    let _scope = RenderScope::enter(wip)?;

    let component = arena
        .fiber(wip)?
        .component()
        .cloned()
        .ok_or(Error::NotAComponent(wip))?;
    {
        let fiber = arena.fiber_mut(wip)?;
        fiber.hooks.clear();
        fiber.effects = EffectQueue::new();
    }

    let fiber = arena.fiber(wip)?;
    let alternate = fiber.alternate;
    let current_hooks: &[Hook] = match alternate {
        Some(current) => &arena.fiber(current)?.hooks,
        None => &[],
    };
    let mode = if alternate.is_some() {
        HookMode::Update
    } else {
        HookMode::Mount
    };
    let expected = current_hooks.len();
    let empty = Props::default();
    let props = match &fiber.pending_props {
        Payload::Props(props) => props,
        _ => &empty,
    };

    trace!(target: "trellis::hooks", fiber = ?wip, component = component.name(), ?lane, ?mode, "render start");

    let (children, output) = {
        let mut cx = HookCx {
            active: Some(ActiveRender {
                fiber: wip,
                component: &component,
                lane,
                mode,
                scheduler,
                current_hooks,
                cursor: 0,
                hooks: Vec::new(),
                effects: EffectQueue::new(),
                flags: Flags::empty(),
            }),
        };
        let children = component.render(&mut cx, props);
        (children, cx.release())
    };
    let children = children?;
    let output = output.ok_or(Error::OutsideRender)?;

    if mode == HookMode::Update && output.bound < expected && RuntimeConfig::diagnostics_enabled() {
        warn!(
            target: "trellis::hooks",
            fiber = ?wip,
            component = component.name(),
            rendered = output.bound,
            expected,
            "component rendered fewer hooks than during the previous render"
        );
    }

    let fiber = arena.fiber_mut(wip)?;
    fiber.hooks = output.hooks;
    fiber.effects = output.effects;
    fiber.flags |= output.flags;
    fiber.lanes = fiber.lanes.remove(lane);

    trace!(target: "trellis::hooks", fiber = ?wip, hooks = fiber.hooks.len(), "render complete");
    Ok(children)
}
