//! The cooperative work loop.
//!
//! A [`Reconciler`] owns both generations of the work tree. The host calls
//! [`Reconciler::step`] from its idle callback with the time left in the
//! current slice; the loop expands one work node at a time and yields between
//! nodes once the slice runs low. When a pass has no units left it is
//! committed in one go.

use std::fmt::Write as _;
use std::rc::Rc;
use std::time::Duration;

use crate::collections::InstanceIndex;
use crate::element::{Element, Props};
use crate::fiber::{Fiber, FiberArena, FiberId, FiberKind, InstanceId, Intent};
use crate::host::{HostError, HostRenderer};
use crate::platform::{Deadline, Unbounded};
use crate::runtime::Runtime;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Reconciling,
    Committing,
}

/// Result of one invocation of the work loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorkStatus {
    /// Work remains; invoke [`Reconciler::step`] again.
    Continue,
    /// Nothing is pending.
    Done,
}

#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    /// The loop yields once the slice has less than this left.
    pub yield_threshold: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            yield_threshold: Duration::from_millis(1),
        }
    }
}

/// Counts of the intents applied by the last commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub placements: usize,
    pub updates: usize,
    pub deletions: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PassKind {
    /// Rooted at the container installed by `render`.
    Full,
    /// Rooted at one component, diffed against its own committed self.
    Subtree { instance: InstanceId },
}

pub struct Reconciler<H: HostRenderer> {
    pub(crate) host: H,
    pub(crate) arena: FiberArena<H::Node>,
    pub(crate) runtime: Runtime,
    config: SchedulerConfig,
    pub(crate) current: Option<FiberId>,
    pub(crate) wip_root: Option<FiberId>,
    next_unit: Option<FiberId>,
    pub(crate) deletions: Vec<FiberId>,
    pub(crate) instances: InstanceIndex,
    pub(crate) phase: Phase,
    pub(crate) pass: PassKind,
    pub(crate) last_commit: CommitSummary,
}

impl<H: HostRenderer> Reconciler<H> {
    pub fn new(host: H) -> Self {
        Self::with_runtime(host, Runtime::default(), SchedulerConfig::default())
    }

    pub fn with_runtime(host: H, runtime: Runtime, config: SchedulerConfig) -> Self {
        Self {
            host,
            arena: FiberArena::default(),
            runtime,
            config,
            current: None,
            wip_root: None,
            next_unit: None,
            deletions: Vec::new(),
            instances: InstanceIndex::default(),
            phase: Phase::Idle,
            pass: PassKind::Full,
            last_commit: CommitSummary::default(),
        }
    }

    /// Starts a pass that renders `element` into `container`.
    ///
    /// Any pass still in flight is abandoned; the new one diffs against the
    /// last committed tree.
    pub fn render(&mut self, element: Element, container: H::Node) {
        self.abandon_in_flight();
        let mut props = Props::new();
        props.push_child(Some(element));
        let mut root = Fiber::new(FiberKind::Root, Rc::new(props), None);
        root.host = Some(container);
        root.alternate = self.current;
        let root = self.arena.insert(root);
        self.wip_root = Some(root);
        self.next_unit = Some(root);
        self.deletions.clear();
        self.pass = PassKind::Full;
        self.phase = Phase::Reconciling;
        log::debug!("render pass installed at {root:?}");
        self.runtime.handle().schedule();
    }

    fn abandon_in_flight(&mut self) {
        if let Some(root) = self.wip_root.take() {
            for id in self.arena.subtree(root) {
                let fiber = &self.arena[id];
                let Some(node) = fiber.host.as_ref().filter(|_| fiber.intent == Intent::Placement)
                else {
                    continue;
                };
                if let Err(err) = self.host.release_node(node) {
                    log::warn!("releasing {node:?} of an abandoned pass failed: {err}");
                }
            }
            let freed = self.arena.free_subtree(root);
            log::debug!("abandoned in-flight pass, freed {freed} work nodes");
        }
        self.next_unit = None;
    }

    /// Runs units of work until `deadline` runs low or the pass completes.
    ///
    /// A completed pass is committed before returning. Host failures
    /// propagate to the caller.
    pub fn step(&mut self, deadline: &dyn Deadline) -> Result<WorkStatus, HostError> {
        if self.wip_root.is_none() {
            self.begin_queued_update();
        }
        let mut should_yield = false;
        while !should_yield {
            let Some(unit) = self.next_unit else {
                break;
            };
            self.next_unit = self.perform_unit(unit)?;
            should_yield = deadline.time_remaining() < self.config.yield_threshold;
        }
        if self.next_unit.is_some() {
            log::debug!("yielding with pending unit {:?}", self.next_unit);
            return Ok(WorkStatus::Continue);
        }
        if self.wip_root.is_some() {
            self.commit()?;
        }
        if self.runtime.has_pending_updates() {
            return Ok(WorkStatus::Continue);
        }
        self.runtime.set_needs_frame(false);
        Ok(WorkStatus::Done)
    }

    /// Steps with an unbounded deadline until nothing is pending.
    pub fn flush(&mut self) -> Result<(), HostError> {
        while self.step(&Unbounded)? == WorkStatus::Continue {}
        Ok(())
    }

    pub fn is_idle(&self) -> bool {
        self.wip_root.is_none() && !self.runtime.has_pending_updates()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    pub fn last_commit(&self) -> CommitSummary {
        self.last_commit
    }

    /// Number of live work nodes across both generations.
    pub fn work_node_count(&self) -> usize {
        self.arena.len()
    }

    /// Starts a subtree pass for the oldest queued update, if any.
    fn begin_queued_update(&mut self) {
        while let Some(instance) = self.runtime.take_next_update() {
            let mounted = self.instances.get(&instance).copied();
            let Some(old) = mounted.filter(|id| self.arena.contains(*id)) else {
                log::debug!("dropping update for unmounted {instance:?}");
                continue;
            };
            let previous = &self.arena[old];
            let mut root = Fiber::new(
                previous.kind.clone(),
                Rc::clone(&previous.props),
                previous.parent,
            );
            root.sibling = previous.sibling;
            root.alternate = Some(old);
            root.instance = Some(instance);
            let root = self.arena.insert(root);
            self.wip_root = Some(root);
            self.next_unit = Some(root);
            self.deletions.clear();
            self.pass = PassKind::Subtree { instance };
            self.phase = Phase::Reconciling;
            log::debug!("update pass for {instance:?} installed at {root:?}");
            return;
        }
    }

    /// Expands one work node and returns the next one in depth-first order.
    fn perform_unit(&mut self, id: FiberId) -> Result<Option<FiberId>, HostError> {
        log::trace!("unit {id:?} ({})", self.arena[id].kind.label());
        if self.arena[id].kind.is_component() {
            self.update_component(id);
        } else {
            self.update_host(id)?;
        }

        if let Some(child) = self.arena[id].child {
            return Ok(Some(child));
        }
        let mut node = id;
        loop {
            if Some(node) == self.wip_root {
                return Ok(None);
            }
            let fiber = &self.arena[node];
            if let Some(sibling) = fiber.sibling {
                return Ok(Some(sibling));
            }
            match fiber.parent {
                Some(parent) => node = parent,
                None => return Ok(None),
            }
        }
    }

    fn update_component(&mut self, id: FiberId) {
        let instance = match self.arena[id].instance {
            Some(instance) => instance,
            None => {
                let instance = self.runtime.allocate_instance();
                self.arena[id].instance = Some(instance);
                instance
            }
        };
        let fiber = &self.arena[id];
        let FiberKind::Component(component) = fiber.kind.clone() else {
            unreachable!("update_component called on a host node");
        };
        let props = Rc::clone(&fiber.props);
        let previous = fiber
            .alternate
            .map(|alternate| self.arena[alternate].hooks.state_slots())
            .unwrap_or_default();
        let (element, hooks) = crate::hooks::render_component(
            &component,
            &props,
            instance,
            self.runtime.handle(),
            previous,
        );
        self.arena[id].hooks = hooks;
        self.reconcile_children(id, &[Some(element)]);
    }

    fn update_host(&mut self, id: FiberId) -> Result<(), HostError> {
        let fiber = &self.arena[id];
        if fiber.host.is_none() {
            if let FiberKind::Host(tag) = &fiber.kind {
                let node = self.host.create_node(tag)?;
                let props = self.arena[id].props.values();
                crate::host::apply_initial_properties(&mut self.host, &node, props)?;
                self.arena[id].host = Some(node);
            }
        }
        let props = Rc::clone(&self.arena[id].props);
        self.reconcile_children(id, props.children());
        Ok(())
    }

    /// Indented outline of the committed tree.
    pub fn describe_tree(&self) -> String {
        let mut output = String::new();
        if let Some(root) = self.current {
            self.describe_node(&mut output, root, 0);
        } else {
            output.push_str("(no root)\n");
        }
        output
    }

    fn describe_node(&self, output: &mut String, id: FiberId, depth: usize) {
        let fiber = &self.arena[id];
        let indent = "  ".repeat(depth);
        let _ = write!(output, "{indent}{}", fiber.kind.label());
        if let Some(instance) = fiber.instance {
            let _ = write!(output, " #{}", instance.0);
        }
        if let Some(host) = &fiber.host {
            let _ = write!(output, " -> {host:?}");
        }
        output.push('\n');
        let mut child = fiber.child;
        while let Some(id) = child {
            self.describe_node(output, id, depth + 1);
            child = self.arena[id].sibling;
        }
    }

    /// Host handles of the committed tree in depth-first pre-order, excluding
    /// the container.
    pub fn host_nodes(&self) -> Vec<H::Node> {
        let Some(root) = self.current else {
            return Vec::new();
        };
        self.arena
            .subtree(root)
            .into_iter()
            .skip(1)
            .filter_map(|id| self.arena[id].host.clone())
            .collect()
    }
}

impl<H> std::fmt::Debug for Reconciler<H>
where
    H: HostRenderer,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("phase", &self.phase)
            .field("current", &self.current)
            .field("wip_root", &self.wip_root)
            .field("next_unit", &self.next_unit)
            .field("work_nodes", &self.arena.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/scheduler_tests.rs"]
mod tests;
