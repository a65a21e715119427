//! Platform abstraction traits for the reconciliation runtime.
//!
//! These traits let the host environment own scheduling and time: the core
//! never sleeps, spawns or reads a clock on its own. A host plugs in a
//! [`RuntimeScheduler`] to hear about new work and hands the work loop a
//! [`Deadline`] describing the current time slice.

use std::cell::Cell;
use std::time::Duration;

/// Receives requests to run the work loop again.
///
/// Implementations are typically the host's idle-callback registration: when
/// a state update or a new render arrives, the runtime asks for one more
/// invocation of [`Reconciler::step`](crate::Reconciler::step).
pub trait RuntimeScheduler: Send + Sync {
    /// Request that the host invoke the work loop again.
    fn schedule_frame(&self);
}

/// Provides timing information for the runtime.
pub trait Clock {
    /// Instant type produced by this clock implementation.
    type Instant: Copy;

    /// Returns the current instant.
    fn now(&self) -> Self::Instant;

    /// Returns the time elapsed since `since`.
    fn elapsed(&self, since: Self::Instant) -> Duration;
}

/// Time remaining in the current scheduling slice.
pub trait Deadline {
    fn time_remaining(&self) -> Duration;
}

/// A deadline that never runs out.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unbounded;

impl Deadline for Unbounded {
    fn time_remaining(&self) -> Duration {
        Duration::MAX
    }
}

/// Wall-clock slice measured by a [`Clock`].
#[derive(Clone)]
pub struct ClockDeadline<C: Clock> {
    clock: C,
    start: C::Instant,
    budget: Duration,
}

impl<C: Clock> ClockDeadline<C> {
    pub fn new(clock: C, budget: Duration) -> Self {
        let start = clock.now();
        Self {
            clock,
            start,
            budget,
        }
    }
}

impl<C: Clock> Deadline for ClockDeadline<C> {
    fn time_remaining(&self) -> Duration {
        self.budget
            .saturating_sub(self.clock.elapsed(self.start))
    }
}

/// Deterministic slice that runs out after a fixed number of queries.
///
/// The work loop consults the deadline once per unit of work, so
/// `UnitBudget::new(3)` lets exactly three units run before yielding under the
/// default one-millisecond threshold.
#[derive(Debug)]
pub struct UnitBudget {
    remaining: Cell<u64>,
}

impl UnitBudget {
    pub fn new(units: u64) -> Self {
        Self {
            remaining: Cell::new(units),
        }
    }

    pub fn remaining_units(&self) -> u64 {
        self.remaining.get()
    }
}

impl Deadline for UnitBudget {
    fn time_remaining(&self) -> Duration {
        let left = self.remaining.get().saturating_sub(1);
        self.remaining.set(left);
        Duration::from_millis(left)
    }
}
