//! Applying a finished pass to the host.
//!
//! Commit runs to completion once started: deletions first, then placements
//! and updates in tree order, then effects, and finally the finished tree
//! replaces its previous generation.

use std::mem;
use std::rc::Rc;

use crate::fiber::{FiberId, FiberKind, Intent};
use crate::host::{HostError, HostRenderer};
use crate::scheduler::{CommitSummary, PassKind, Phase, Reconciler};

impl<H: HostRenderer> Reconciler<H> {
    pub(crate) fn commit(&mut self) -> Result<(), HostError> {
        let Some(root) = self.wip_root else {
            return Ok(());
        };
        self.phase = Phase::Committing;

        let deletions = mem::take(&mut self.deletions);
        let mut summary = CommitSummary {
            deletions: deletions.len(),
            ..CommitSummary::default()
        };
        for &deleted in &deletions {
            self.commit_deletion(deleted)?;
        }

        let order = self.arena.subtree(root);
        let mut anchors = AnchorCache::default();
        for &id in order.iter().skip(1) {
            match self.arena[id].intent {
                Intent::Update => {
                    summary.updates += 1;
                    self.commit_update(id)?;
                }
                Intent::Placement => {
                    summary.placements += 1;
                    self.commit_placement(id, &mut anchors)?;
                }
                Intent::None => {}
            }
        }

        self.run_effect_cleanups(&order);
        self.run_effects(&order);
        self.promote(root, &order);

        self.wip_root = None;
        self.phase = Phase::Idle;
        self.last_commit = summary;
        log::debug!(
            "committed {:?}: {} placements, {} updates, {} deletions",
            self.pass,
            summary.placements,
            summary.updates,
            summary.deletions
        );
        Ok(())
    }

    fn commit_update(&mut self, id: FiberId) -> Result<(), HostError> {
        let fiber = &self.arena[id];
        let (FiberKind::Host(_), Some(node), Some(alternate)) =
            (&fiber.kind, fiber.host.clone(), fiber.alternate)
        else {
            return Ok(());
        };
        let next = Rc::clone(&fiber.props);
        let previous = Rc::clone(&self.arena[alternate].props);
        if Rc::ptr_eq(&previous, &next) {
            return Ok(());
        }
        self.host
            .update_properties(&node, previous.values(), next.values())
    }

    fn commit_placement(
        &mut self,
        id: FiberId,
        anchors: &mut AnchorCache<H::Node>,
    ) -> Result<(), HostError> {
        let Some(node) = self.arena[id].host.clone() else {
            return Ok(());
        };
        let parent = self.host_parent(id)?;
        let before = self.host_sibling(id, anchors);
        self.host.insert_child(&parent, &node, before.as_ref())
    }

    fn commit_deletion(&mut self, id: FiberId) -> Result<(), HostError> {
        for node in self.arena.subtree(id) {
            let fiber = &mut self.arena[node];
            for effect in &mut fiber.hooks.effects {
                effect.run_cleanup();
            }
            if let Some(instance) = fiber.instance {
                if self.instances.get(&instance) == Some(&node) {
                    self.instances.remove(&instance);
                }
            }
        }

        let mut node = id;
        let child = loop {
            let fiber = &self.arena[node];
            if let Some(host) = &fiber.host {
                break host.clone();
            }
            match fiber.child {
                Some(child) => node = child,
                None => return Ok(()),
            }
        };
        let parent = self.host_parent(id)?;
        self.host.remove_child(&parent, &child)?;
        self.host.release_node(&child)
    }

    /// Nearest ancestor carrying a host handle.
    fn host_parent(&self, id: FiberId) -> Result<H::Node, HostError> {
        let mut cursor = self.arena[id].parent;
        while let Some(parent) = cursor {
            let fiber = &self.arena[parent];
            if let Some(host) = &fiber.host {
                return Ok(host.clone());
            }
            cursor = fiber.parent;
        }
        Err(HostError::Missing {
            node: format!("host parent of {id:?}"),
        })
    }

    /// The attached host node that `id` must be inserted before, if any.
    ///
    /// Later siblings that are themselves being placed are not attached yet
    /// and are skipped; the search never leaves the host parent. A run of
    /// placed siblings shares one search through `anchors`.
    fn host_sibling(&self, id: FiberId, anchors: &mut AnchorCache<H::Node>) -> Option<H::Node> {
        let mut node = id;
        let mut first_skipped = None;
        let anchor = 'siblings: loop {
            loop {
                if anchors.resume == Some(node) {
                    anchors.resume = self.arena[node]
                        .sibling
                        .filter(|sibling| self.arena[*sibling].intent == Intent::Placement);
                    return anchors.anchor.clone();
                }
                let fiber = &self.arena[node];
                if let Some(sibling) = fiber.sibling {
                    node = sibling;
                    break;
                }
                let parent = fiber.parent?;
                if self.arena[parent].host.is_some() {
                    break 'siblings None;
                }
                node = parent;
            }
            loop {
                let fiber = &self.arena[node];
                if fiber.intent == Intent::Placement {
                    first_skipped.get_or_insert(node);
                    continue 'siblings;
                }
                if let Some(host) = &fiber.host {
                    break 'siblings Some(host.clone());
                }
                match fiber.child {
                    Some(child) => node = child,
                    None => continue 'siblings,
                }
            }
        };
        if first_skipped.is_some() {
            anchors.resume = first_skipped;
            anchors.anchor = anchor.clone();
        }
        anchor
    }

    /// Runs the stored cleanup of every dependency-bearing effect that is
    /// re-evaluated in this commit, before any callback runs.
    fn run_effect_cleanups(&mut self, order: &[FiberId]) {
        for &id in order {
            let Some(alternate) = self.arena[id].alternate else {
                continue;
            };
            let tracked: Vec<usize> = self.arena[id]
                .hooks
                .effects
                .iter()
                .enumerate()
                .filter(|(_, effect)| !effect.deps.is_empty())
                .map(|(index, _)| index)
                .collect();
            let previous = &mut self.arena[alternate].hooks.effects;
            for index in tracked {
                if let Some(record) = previous.get_mut(index) {
                    record.run_cleanup();
                }
            }
        }
    }

    fn run_effects(&mut self, order: &[FiberId]) {
        for &id in order {
            let mut previous = self.arena[id]
                .alternate
                .map(|alternate| mem::take(&mut self.arena[alternate].hooks.effects));
            let effects = &mut self.arena[id].hooks.effects;
            for (index, effect) in effects.iter_mut().enumerate() {
                let older = previous.as_mut().and_then(|records| records.get_mut(index));
                match older {
                    None => effect.run(),
                    Some(older) if !effect.deps.is_empty() && older.deps != effect.deps => {
                        effect.run()
                    }
                    Some(older) => effect.adopt_cleanup(older),
                }
            }
        }
    }

    /// Makes the finished tree current and frees the generation it replaces.
    fn promote(&mut self, root: FiberId, order: &[FiberId]) {
        for &id in order {
            self.commit_state(id);
        }

        let previous = self.arena[root].alternate;
        match self.pass {
            PassKind::Full => {
                self.current = Some(root);
                self.instances.clear();
            }
            PassKind::Subtree { instance } => {
                if let Some(previous) = previous {
                    self.splice(previous, root);
                }
                log::trace!("spliced {instance:?} into the committed tree");
            }
        }
        if let Some(previous) = previous {
            let freed = self.arena.free_subtree(previous);
            log::trace!("freed {freed} work nodes of the previous generation");
        }

        for &id in order {
            let fiber = &mut self.arena[id];
            fiber.alternate = None;
            fiber.intent = Intent::None;
            if let Some(instance) = fiber.instance {
                self.instances.insert(instance, id);
            }
        }
    }

    /// Replaces `previous` by `next` in its parent's child list.
    fn splice(&mut self, previous: FiberId, next: FiberId) {
        let Some(parent) = self.arena[next].parent else {
            return;
        };
        if self.arena[parent].child == Some(previous) {
            self.arena[parent].child = Some(next);
            return;
        }
        let mut cursor = self.arena[parent].child;
        while let Some(id) = cursor {
            if self.arena[id].sibling == Some(previous) {
                self.arena[id].sibling = Some(next);
                return;
            }
            cursor = self.arena[id].sibling;
        }
    }

    /// Stores the values `id` rendered with. Updates queued after its render
    /// stay on the slot for the follow-up pass.
    fn commit_state(&self, id: FiberId) {
        for hook in &self.arena[id].hooks.states {
            if hook.commit() {
                log::debug!("state updates still queued after committing {id:?}");
            }
        }
    }
}

/// Result of the last sibling search, reusable by any search that reaches
/// `resume`. Intents do not change during commit, so an entry stays valid
/// for the whole commit.
struct AnchorCache<N> {
    resume: Option<FiberId>,
    anchor: Option<N>,
}

impl<N> Default for AnchorCache<N> {
    fn default() -> Self {
        Self {
            resume: None,
            anchor: None,
        }
    }
}

#[cfg(test)]
#[path = "tests/commit_tests.rs"]
mod tests;
