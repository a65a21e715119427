#![doc = r"Incremental, interruptible reconciliation of declarative UI trees."]

pub mod collections;
pub mod element;
pub mod fiber;
pub mod hash;
pub mod hooks;
pub mod host;
pub mod memory;
pub mod platform;
pub mod runtime;
pub mod scheduler;

mod commit;
mod reconcile;

pub use element::{
    event_name, Component, Element, ElementType, EventHandler, PropValue, Properties, Props,
    NODE_VALUE, TEXT_ELEMENT,
};
pub use fiber::{FiberId, InstanceId, Intent};
pub use hooks::{schedule_self_update, use_effect, use_state, EffectCleanup, SetState, UpdateTrigger};
pub use host::{apply_initial_properties, apply_property_diff, HostError, HostRenderer};
pub use memory::{HostOp, MemoryHost, MemoryNodeId};
pub use platform::{Clock, ClockDeadline, Deadline, RuntimeScheduler, Unbounded, UnitBudget};
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle};
pub use scheduler::{CommitSummary, Phase, Reconciler, SchedulerConfig, WorkStatus};
