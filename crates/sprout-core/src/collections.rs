//! Hash-backed collections used by the engine.
//!
//! `hashbrown` by default; enabling `std-hash` swaps in the standard library
//! types.

use crate::fiber::{FiberId, InstanceId};

#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use hashbrown::{HashMap, HashSet};
}

/// Committed work node of every mounted component instance.
pub(crate) type InstanceIndex = map::HashMap<InstanceId, FiberId>;

/// Instances with a re-render request waiting in the update queue.
pub(crate) type QueuedInstances = map::HashSet<InstanceId>;
