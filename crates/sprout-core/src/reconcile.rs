use crate::element::Element;
use crate::fiber::{Fiber, FiberId, FiberKind, Intent};
use crate::host::HostRenderer;
use crate::scheduler::Reconciler;

impl<H: HostRenderer> Reconciler<H> {
    /// Builds the next generation of `parent`'s children.
    ///
    /// New descriptions are walked in lockstep with the previous generation's
    /// children, matching by position only. Same type at the same position is
    /// an update that keeps the host handle; anything else places a new node
    /// and queues the old one for deletion.
    pub(crate) fn reconcile_children(&mut self, parent: FiberId, children: &[Option<Element>]) {
        let mut old = self.arena[parent]
            .alternate
            .and_then(|alternate| self.arena[alternate].child);
        let mut previous_new: Option<FiberId> = None;

        for element in children {
            let old_id = old;
            old = old_id.and_then(|id| self.arena[id].sibling);

            let Some(element) = element else {
                if let Some(old_id) = old_id {
                    self.deletions.push(old_id);
                }
                continue;
            };

            let kind = element.kind();
            let mut fiber = Fiber::new(FiberKind::from(kind), element.shared_props(), Some(parent));
            match old_id {
                Some(old_id) if self.arena[old_id].kind.matches(kind) => {
                    let previous = &self.arena[old_id];
                    fiber.host = previous.host.clone();
                    fiber.instance = previous.instance;
                    fiber.alternate = Some(old_id);
                    fiber.intent = Intent::Update;
                }
                Some(old_id) => {
                    fiber.intent = Intent::Placement;
                    self.deletions.push(old_id);
                }
                None => fiber.intent = Intent::Placement,
            }

            let id = self.arena.insert(fiber);
            match previous_new {
                Some(previous) => self.arena[previous].sibling = Some(id),
                None => self.arena[parent].child = Some(id),
            }
            previous_new = Some(id);
        }

        while let Some(old_id) = old {
            self.deletions.push(old_id);
            old = self.arena[old_id].sibling;
        }
    }
}

#[cfg(test)]
#[path = "tests/reconcile_tests.rs"]
mod tests;
