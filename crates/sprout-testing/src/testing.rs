use sprout_core::{
    Element, HostError, HostOp, MemoryHost, MemoryNodeId, Reconciler, UnitBudget, WorkStatus,
};

/// Headless harness for exercising reconciliation in tests.
///
/// `TestRoot` owns a [`MemoryHost`] with a single container node and exposes
/// helpers for rendering into it, driving the work loop either to completion
/// or a fixed number of units at a time, and inspecting the resulting host
/// tree.
pub struct TestRoot {
    reconciler: Reconciler<MemoryHost>,
    container: MemoryNodeId,
}

impl TestRoot {
    pub fn new() -> Self {
        let mut host = MemoryHost::new();
        let container = host.create_container("root");
        Self {
            reconciler: Reconciler::new(host),
            container,
        }
    }

    /// Render `element` into the container and drive the work loop until idle.
    pub fn set_content(&mut self, element: Element) -> Result<(), HostError> {
        self.render(element);
        self.pump_until_idle()
    }

    /// Install a render pass without running any work.
    pub fn render(&mut self, element: Element) {
        self.reconciler.render(element, self.container);
    }

    /// Run at most `units` units of work in one slice.
    pub fn step_units(&mut self, units: u64) -> Result<WorkStatus, HostError> {
        self.reconciler.step(&UnitBudget::new(units))
    }

    /// Drive the work loop until no render pass or state update is pending.
    pub fn pump_until_idle(&mut self) -> Result<(), HostError> {
        self.reconciler.flush()
    }

    /// Fire `event` on the first attached node with `tag`.
    pub fn dispatch(&self, tag: &str, event: &str) -> Result<usize, HostError> {
        let node = self.find_by_tag(tag).into_iter().next().ok_or_else(|| HostError::Missing {
            node: format!("<{tag}>"),
        })?;
        self.host().dispatch(node, event)
    }

    /// Attached nodes with `tag` in document order.
    pub fn find_by_tag(&self, tag: &str) -> Vec<MemoryNodeId> {
        self.host()
            .descendants(self.container)
            .into_iter()
            .filter(|node| self.host().tag(*node) == Some(tag))
            .collect()
    }

    pub fn text(&self) -> String {
        self.host().text_content(self.container)
    }

    pub fn dump(&self) -> String {
        self.host().dump_tree(self.container)
    }

    pub fn ops(&self) -> &[HostOp] {
        self.host().ops()
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        self.reconciler.host_mut().take_ops()
    }

    pub fn container(&self) -> MemoryNodeId {
        self.container
    }

    pub fn host(&self) -> &MemoryHost {
        self.reconciler.host()
    }

    pub fn reconciler(&self) -> &Reconciler<MemoryHost> {
        &self.reconciler
    }

    /// Gain mutable access to the raw reconciler for advanced scenarios.
    pub fn reconciler_mut(&mut self) -> &mut Reconciler<MemoryHost> {
        &mut self.reconciler
    }
}

impl Default for TestRoot {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `TestRoot`.
pub fn run_test_root<R>(f: impl FnOnce(&mut TestRoot) -> R) -> R {
    let mut root = TestRoot::new();
    f(&mut root)
}
