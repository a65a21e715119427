//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the platform
//! abstraction traits defined in `sprout-core`, plus an [`IdleLoop`] that
//! drives a [`Reconciler`] in wall-clock slices the way a host's idle
//! callback would.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use sprout_core::{
    Clock, ClockDeadline, HostError, HostRenderer, Reconciler, Runtime, RuntimeHandle,
    RuntimeScheduler, SchedulerConfig, WorkStatus,
};

type FrameWaker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Frame requests from the reconciler, as seen by an `std` host loop.
///
/// A request sets a pending flag that the loop consumes, bumps a running
/// count and calls the registered waker, if any.
pub struct StdScheduler {
    pending: AtomicBool,
    requested: AtomicUsize,
    waker: RwLock<Option<FrameWaker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            requested: AtomicUsize::new(0),
            waker: RwLock::new(None),
        }
    }

    /// Consumes the pending frame request, if there is one.
    pub fn take_frame_request(&self) -> bool {
        self.pending.swap(false, Ordering::SeqCst)
    }

    /// Frame requests received since creation.
    pub fn frames_requested(&self) -> usize {
        self.requested.load(Ordering::SeqCst)
    }

    /// Calls `waker` on every frame request, replacing any previous waker.
    pub fn set_frame_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(waker));
    }

    pub fn clear_frame_waker(&self) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field("pending", &self.pending.load(Ordering::SeqCst))
            .field("requested", &self.frames_requested())
            .finish()
    }
}

impl RuntimeScheduler for StdScheduler {
    fn schedule_frame(&self) {
        self.pending.store(true, Ordering::SeqCst);
        self.requested.fetch_add(1, Ordering::SeqCst);
        // clone out so the waker may re-enter the scheduler
        let waker = self
            .waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

/// Clock implementation backed by [`std::time`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn elapsed(&self, since: Self::Instant) -> Duration {
        since.elapsed()
    }
}

/// Convenience container bundling the standard scheduler and clock.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    clock: StdClock,
    runtime: Runtime,
}

impl StdRuntime {
    pub fn new() -> Self {
        let scheduler = Arc::new(StdScheduler::default());
        let runtime = Runtime::new(scheduler.clone());
        Self {
            scheduler,
            clock: StdClock,
            runtime,
        }
    }

    /// Returns a [`sprout_core::Runtime`] configured with the standard scheduler.
    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn clock(&self) -> StdClock {
        self.clock
    }

    /// Builds a reconciler that reports new work to this runtime's scheduler.
    pub fn reconciler<H: HostRenderer>(&self, host: H, config: SchedulerConfig) -> Reconciler<H> {
        Reconciler::with_runtime(host, self.runtime(), config)
    }

    /// A deadline that expires `budget` from now.
    pub fn deadline(&self, budget: Duration) -> ClockDeadline<StdClock> {
        ClockDeadline::new(self.clock, budget)
    }

    /// Returns whether a frame was requested since the last poll.
    pub fn take_frame_request(&self) -> bool {
        self.scheduler.take_frame_request()
    }

    pub fn set_frame_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_frame_waker(waker);
    }

    pub fn clear_frame_waker(&self) {
        self.scheduler.clear_frame_waker();
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("clock", &self.clock)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct IdleLoopConfig {
    /// Wall-clock budget handed to each invocation of the work loop.
    pub slice: Duration,
    /// Upper bound on slices per [`IdleLoop::run_until_idle`] call.
    pub max_slices: usize,
}

impl Default for IdleLoopConfig {
    fn default() -> Self {
        Self {
            slice: Duration::from_millis(16),
            max_slices: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdleLoopError {
    Host(HostError),
    /// Work was still pending after the configured number of slices.
    SliceLimit { slices: usize },
}

impl fmt::Display for IdleLoopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdleLoopError::Host(err) => write!(f, "{err}"),
            IdleLoopError::SliceLimit { slices } => {
                write!(f, "work still pending after {slices} slices")
            }
        }
    }
}

impl std::error::Error for IdleLoopError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IdleLoopError::Host(err) => Some(err),
            IdleLoopError::SliceLimit { .. } => None,
        }
    }
}

impl From<HostError> for IdleLoopError {
    fn from(err: HostError) -> Self {
        IdleLoopError::Host(err)
    }
}

/// Drives a reconciler in wall-clock slices, standing in for a host's idle
/// callback.
#[derive(Clone, Debug, Default)]
pub struct IdleLoop {
    clock: StdClock,
    config: IdleLoopConfig,
}

impl IdleLoop {
    pub fn new(config: IdleLoopConfig) -> Self {
        Self {
            clock: StdClock,
            config,
        }
    }

    pub fn config(&self) -> IdleLoopConfig {
        self.config
    }

    /// Invokes the work loop once with a fresh slice.
    pub fn run_slice<H: HostRenderer>(
        &self,
        reconciler: &mut Reconciler<H>,
    ) -> Result<WorkStatus, HostError> {
        let deadline = ClockDeadline::new(self.clock, self.config.slice);
        reconciler.step(&deadline)
    }

    /// Services frame requests until the scheduler has none pending, the way
    /// a host re-registers its idle callback after every invocation.
    ///
    /// Returns how many frames were run.
    pub fn run_requested_frames<H: HostRenderer>(
        &self,
        runtime: &StdRuntime,
        reconciler: &mut Reconciler<H>,
    ) -> Result<usize, IdleLoopError> {
        let mut frames = 0;
        while runtime.take_frame_request() {
            frames += 1;
            let slices = self.run_until_idle(reconciler)?;
            log::trace!("frame {frames} took {slices} slices");
        }
        Ok(frames)
    }

    /// Runs slices until nothing is pending and returns how many were used.
    pub fn run_until_idle<H: HostRenderer>(
        &self,
        reconciler: &mut Reconciler<H>,
    ) -> Result<usize, IdleLoopError> {
        let mut slices = 0;
        loop {
            if slices == self.config.max_slices {
                log::warn!("idle loop gave up after {slices} slices");
                return Err(IdleLoopError::SliceLimit { slices });
            }
            slices += 1;
            if self.run_slice(reconciler)? == WorkStatus::Done {
                log::debug!("idle after {slices} slices");
                return Ok(slices);
            }
        }
    }
}
