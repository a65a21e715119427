//! Per-component hook state.
//!
//! Hooks are addressed by call order. While a component's producer runs, a
//! [`RenderScope`] sits on a thread-local stack; every `use_*` call takes the
//! next index and looks up the record at the same index on the previous
//! generation. Calling hooks conditionally breaks this addressing and is the
//! caller's responsibility to avoid.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use crate::element::{Component, Element, Props};
use crate::fiber::InstanceId;
use crate::runtime::RuntimeHandle;

type StateUpdate = Rc<dyn Fn(&dyn Any) -> Rc<dyn Any>>;

/// State of one `use_state` call site, shared by every generation of its
/// component instance.
///
/// Renders fold the queue without consuming it; only a commit stores the
/// folded value and drops the updates that went into it.
pub(crate) struct StateSlot {
    committed: RefCell<Rc<dyn Any>>,
    queue: RefCell<Vec<StateUpdate>>,
}

impl StateSlot {
    fn new(value: Rc<dyn Any>) -> Rc<Self> {
        Rc::new(Self {
            committed: RefCell::new(value),
            queue: RefCell::new(Vec::new()),
        })
    }

    fn enqueue(&self, update: StateUpdate) {
        self.queue.borrow_mut().push(update);
    }

    /// The committed value with every queued update applied, and how many
    /// updates that took.
    fn fold(&self) -> (Rc<dyn Any>, usize) {
        let pending = self.queue.borrow().clone();
        let mut value = Rc::clone(&self.committed.borrow());
        for update in &pending {
            value = update(&*value);
        }
        (value, pending.len())
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.queue.borrow().is_empty()
    }
}

/// What one render read from a [`StateSlot`].
pub(crate) struct StateHook {
    pub(crate) slot: Rc<StateSlot>,
    value: Rc<dyn Any>,
    folded: usize,
}

impl StateHook {
    /// Stores the rendered value and drops the updates folded into it.
    ///
    /// Returns whether updates queued after the render are still pending.
    pub(crate) fn commit(&self) -> bool {
        *self.slot.committed.borrow_mut() = Rc::clone(&self.value);
        let mut queue = self.slot.queue.borrow_mut();
        let folded = self.folded.min(queue.len());
        queue.drain(..folded);
        !queue.is_empty()
    }
}

/// Cleanup returned by an effect callback.
#[derive(Default)]
pub struct EffectCleanup(Option<Box<dyn FnOnce()>>);

impl EffectCleanup {
    pub fn new(cleanup: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(cleanup)))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl From<()> for EffectCleanup {
    fn from(_: ()) -> Self {
        Self::none()
    }
}

impl fmt::Debug for EffectCleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EffectCleanup")
            .field(&self.0.is_some())
            .finish()
    }
}

pub(crate) struct EffectRecord {
    callback: Option<Box<dyn FnOnce() -> EffectCleanup>>,
    pub(crate) deps: Vec<u64>,
    cleanup: Option<Box<dyn FnOnce()>>,
}

impl EffectRecord {
    pub(crate) fn run(&mut self) {
        if let Some(callback) = self.callback.take() {
            self.cleanup = callback().0;
        }
    }

    pub(crate) fn run_cleanup(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }

    /// Keeps the cleanup of an effect that did not re-run.
    pub(crate) fn adopt_cleanup(&mut self, older: &mut EffectRecord) {
        self.cleanup = older.cleanup.take();
    }
}

#[derive(Default)]
pub(crate) struct HookList {
    pub(crate) states: Vec<StateHook>,
    pub(crate) effects: Vec<EffectRecord>,
}

impl HookList {
    pub(crate) fn state_slots(&self) -> Vec<Rc<StateSlot>> {
        self.states.iter().map(|hook| Rc::clone(&hook.slot)).collect()
    }
}

struct RenderScope {
    instance: InstanceId,
    runtime: RuntimeHandle,
    previous: Vec<Rc<StateSlot>>,
    hooks: HookList,
}

thread_local! {
    static RENDER_SCOPES: RefCell<Vec<RenderScope>> = const { RefCell::new(Vec::new()) };
}

fn with_current_scope<R>(f: impl FnOnce(&mut RenderScope) -> R) -> R {
    RENDER_SCOPES.with(|stack| {
        let mut stack = stack.borrow_mut();
        let scope = stack
            .last_mut()
            .expect("hooks may only be called while a component is rendering");
        f(scope)
    })
}

/// Runs `component` with a fresh hook scope and returns its single child
/// together with the hook records it registered.
pub(crate) fn render_component(
    component: &Component,
    props: &Props,
    instance: InstanceId,
    runtime: RuntimeHandle,
    previous: Vec<Rc<StateSlot>>,
) -> (Element, HookList) {
    struct Guard {
        armed: bool,
    }
    impl Drop for Guard {
        fn drop(&mut self) {
            if self.armed {
                RENDER_SCOPES.with(|stack| {
                    stack.borrow_mut().pop();
                });
            }
        }
    }

    RENDER_SCOPES.with(|stack| {
        stack.borrow_mut().push(RenderScope {
            instance,
            runtime,
            previous,
            hooks: HookList::default(),
        })
    });
    let mut guard = Guard { armed: true };
    let element = component.render(props);
    guard.armed = false;
    let scope = RENDER_SCOPES
        .with(|stack| stack.borrow_mut().pop())
        .expect("render scope stack underflow");
    (element, scope.hooks)
}

/// Reads the state cell at the next call index.
///
/// On the first render the cell starts from `initial()`. Later renders start
/// from the last committed value with its queued updates applied in order.
pub fn use_state<T>(initial: impl FnOnce() -> T) -> (T, SetState<T>)
where
    T: Clone + PartialEq + 'static,
{
    let (index, previous) = with_current_scope(|scope| {
        let index = scope.hooks.states.len();
        (index, scope.previous.get(index).cloned())
    });
    let (slot, value, folded) = match previous {
        Some(slot) => {
            let (value, folded) = slot.fold();
            (slot, value, folded)
        }
        None => {
            let value: Rc<dyn Any> = Rc::new(initial());
            (StateSlot::new(Rc::clone(&value)), value, 0)
        }
    };
    let current = value
        .downcast_ref::<T>()
        .cloned()
        .unwrap_or_else(|| panic!("state hook {index} changed type between renders"));
    let weak = Rc::downgrade(&slot);
    let (instance, runtime) = with_current_scope(|scope| {
        scope.hooks.states.push(StateHook {
            slot,
            value,
            folded,
        });
        (scope.instance, scope.runtime.clone())
    });
    let setter = SetState {
        slot: weak,
        instance,
        runtime,
        _marker: PhantomData,
    };
    (current, setter)
}

/// Updater returned by [`use_state`].
///
/// It addresses the call site, not the render that returned it, so a setter
/// captured in an earlier render keeps working until the component unmounts.
pub struct SetState<T> {
    slot: Weak<StateSlot>,
    instance: InstanceId,
    runtime: RuntimeHandle,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Weak::clone(&self.slot),
            instance: self.instance,
            runtime: self.runtime.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for SetState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetState")
            .field("instance", &self.instance)
            .finish()
    }
}

impl<T> SetState<T>
where
    T: Clone + PartialEq + 'static,
{
    pub fn set(&self, value: T) {
        self.update(move |_| value.clone());
    }

    /// Queues `action` and schedules a re-render of the owning component.
    ///
    /// Nothing is queued when `action` maps the latest value to an equal one.
    pub fn update(&self, action: impl Fn(&T) -> T + 'static) {
        let Some(slot) = self.slot.upgrade() else {
            log::debug!("state of {:?} is gone; update ignored", self.instance);
            return;
        };
        let (latest, _) = slot.fold();
        let latest = latest
            .downcast_ref::<T>()
            .expect("state cell holds a different type");
        if action(latest) == *latest {
            return;
        }
        slot.enqueue(Rc::new(move |value: &dyn Any| {
            let value = value
                .downcast_ref::<T>()
                .expect("state cell holds a different type");
            Rc::new(action(value)) as Rc<dyn Any>
        }));
        self.runtime.request_update(self.instance);
    }
}

/// Registers an effect at the next call index.
///
/// The callback runs during commit: always on the component's first commit,
/// afterwards only when `deps` is non-empty and differs element-wise from the
/// previous generation's list. Build `deps` with [`deps!`](crate::deps).
pub fn use_effect<F, R>(callback: F, deps: Vec<u64>)
where
    F: FnOnce() -> R + 'static,
    R: Into<EffectCleanup>,
{
    with_current_scope(|scope| {
        scope.hooks.effects.push(EffectRecord {
            callback: Some(Box::new(move || callback().into())),
            deps,
            cleanup: None,
        });
    });
}

/// Returns a trigger that re-renders the current component when invoked.
pub fn schedule_self_update() -> UpdateTrigger {
    with_current_scope(|scope| UpdateTrigger {
        instance: scope.instance,
        runtime: scope.runtime.clone(),
    })
}

#[derive(Clone, Debug)]
pub struct UpdateTrigger {
    instance: InstanceId,
    runtime: RuntimeHandle,
}

impl UpdateTrigger {
    pub fn trigger(&self) {
        self.runtime.request_update(self.instance);
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }
}

/// Hashes each dependency into the list expected by [`use_effect`].
#[macro_export]
macro_rules! deps {
    () => {
        ::std::vec::Vec::<u64>::new()
    };
    ($($dep:expr),+ $(,)?) => {
        ::std::vec![$($crate::hash::hash_one(&$dep)),+]
    };
}

#[cfg(test)]
#[path = "tests/hooks_tests.rs"]
mod tests;
