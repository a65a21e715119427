use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::collections::QueuedInstances;
use crate::fiber::InstanceId;
use crate::platform::RuntimeScheduler;

struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    needs_frame: Cell<bool>,
    update_queue: RefCell<VecDeque<InstanceId>>,
    queued: RefCell<QueuedInstances>,
    next_instance: Cell<u64>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            scheduler,
            needs_frame: Cell::new(false),
            update_queue: RefCell::new(VecDeque::new()),
            queued: RefCell::new(QueuedInstances::default()),
            next_instance: Cell::new(1),
        }
    }

    fn schedule(&self) {
        self.needs_frame.set(true);
        self.scheduler.schedule_frame();
    }

    fn request_update(&self, instance: InstanceId) {
        if self.queued.borrow_mut().insert(instance) {
            self.update_queue.borrow_mut().push_back(instance);
            log::debug!("update requested for {instance:?}");
        }
        self.schedule();
    }

    fn take_next_update(&self) -> Option<InstanceId> {
        let instance = self.update_queue.borrow_mut().pop_front()?;
        self.queued.borrow_mut().remove(&instance);
        Some(instance)
    }

    fn has_pending_updates(&self) -> bool {
        !self.update_queue.borrow().is_empty()
    }

    fn allocate_instance(&self) -> InstanceId {
        let id = self.next_instance.get();
        self.next_instance.set(id + 1);
        InstanceId(id)
    }
}

/// Owner of the update queue shared by a reconciler and its updaters.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn has_pending_updates(&self) -> bool {
        self.inner.has_pending_updates()
    }

    pub fn needs_frame(&self) -> bool {
        self.inner.needs_frame.get()
    }

    pub fn set_needs_frame(&self, value: bool) {
        self.inner.needs_frame.set(value);
    }

    pub(crate) fn take_next_update(&self) -> Option<InstanceId> {
        self.inner.take_next_update()
    }

    pub(crate) fn allocate_instance(&self) -> InstanceId {
        self.inner.allocate_instance()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(Arc::new(DefaultScheduler))
    }
}

#[derive(Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_frame(&self) {}
}

/// Weak handle captured by state updaters and update triggers.
///
/// Once the owning [`Runtime`] is dropped every request becomes a no-op.
#[derive(Clone)]
pub struct RuntimeHandle(pub(crate) Weak<RuntimeInner>);

impl RuntimeHandle {
    pub fn schedule(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.schedule();
        }
    }

    /// Queue a re-render rooted at `instance`.
    pub fn request_update(&self, instance: InstanceId) {
        match self.0.upgrade() {
            Some(inner) => inner.request_update(instance),
            None => log::debug!("runtime dropped; ignoring update for {instance:?}"),
        }
    }

    pub fn has_pending_updates(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.has_pending_updates())
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("alive", &(self.0.strong_count() > 0))
            .finish()
    }
}
