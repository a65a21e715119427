//! Work nodes and the arena that owns them.
//!
//! Parent, child, sibling and previous-generation links are [`FiberId`]s into
//! a generational arena. A freed slot bumps its generation, so an id kept
//! past the lifetime of its node simply stops resolving.

use std::ops::{Index, IndexMut};
use std::rc::Rc;

use crate::element::{Component, ElementType, Props};
use crate::hooks::HookList;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FiberId {
    index: u32,
    generation: u32,
}

/// Stable identity of a component across generations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub(crate) u64);

/// Mutation decided during reconciliation and consumed by commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Intent {
    #[default]
    None,
    Placement,
    Update,
}

#[derive(Clone, Debug)]
pub(crate) enum FiberKind {
    /// The container installed by `render`; its host handle is the container.
    Root,
    Host(Rc<str>),
    Component(Component),
}

impl FiberKind {
    pub(crate) fn matches(&self, kind: &ElementType) -> bool {
        match (self, kind) {
            (FiberKind::Host(tag), ElementType::Host(other)) => tag == other,
            (FiberKind::Component(component), ElementType::Component(other)) => component == other,
            _ => false,
        }
    }

    pub(crate) fn is_component(&self) -> bool {
        matches!(self, FiberKind::Component(_))
    }

    pub(crate) fn label(&self) -> &str {
        match self {
            FiberKind::Root => "#root",
            FiberKind::Host(tag) => tag,
            FiberKind::Component(component) => component.name(),
        }
    }
}

impl From<&ElementType> for FiberKind {
    fn from(kind: &ElementType) -> Self {
        match kind {
            ElementType::Host(tag) => FiberKind::Host(Rc::clone(tag)),
            ElementType::Component(component) => FiberKind::Component(component.clone()),
        }
    }
}

pub(crate) struct Fiber<N> {
    pub(crate) kind: FiberKind,
    pub(crate) props: Rc<Props>,
    pub(crate) parent: Option<FiberId>,
    pub(crate) child: Option<FiberId>,
    pub(crate) sibling: Option<FiberId>,
    pub(crate) host: Option<N>,
    pub(crate) alternate: Option<FiberId>,
    pub(crate) intent: Intent,
    pub(crate) instance: Option<InstanceId>,
    pub(crate) hooks: HookList,
}

impl<N> Fiber<N> {
    pub(crate) fn new(kind: FiberKind, props: Rc<Props>, parent: Option<FiberId>) -> Self {
        Self {
            kind,
            props,
            parent,
            child: None,
            sibling: None,
            host: None,
            alternate: None,
            intent: Intent::None,
            instance: None,
            hooks: HookList::default(),
        }
    }
}

struct Slot<N> {
    generation: u32,
    fiber: Option<Fiber<N>>,
}

pub(crate) struct FiberArena<N> {
    slots: Vec<Slot<N>>,
    free: Vec<u32>,
    live: usize,
}

impl<N> Default for FiberArena<N> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }
}

impl<N> FiberArena<N> {
    pub(crate) fn insert(&mut self, fiber: Fiber<N>) -> FiberId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.fiber = Some(fiber);
            return FiberId {
                index,
                generation: slot.generation,
            };
        }
        let index = u32::try_from(self.slots.len()).expect("fiber arena exhausted");
        self.slots.push(Slot {
            generation: 0,
            fiber: Some(fiber),
        });
        FiberId {
            index,
            generation: 0,
        }
    }

    pub(crate) fn get(&self, id: FiberId) -> Option<&Fiber<N>> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.fiber.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber<N>> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.fiber.as_mut())
    }

    pub(crate) fn contains(&self, id: FiberId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn remove(&mut self, id: FiberId) -> Option<Fiber<N>> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let fiber = slot.fiber.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(fiber)
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    /// Collects `root` and everything below it in depth-first pre-order.
    ///
    /// The root's own siblings are not part of its subtree.
    pub(crate) fn subtree(&self, root: FiberId) -> Vec<FiberId> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            order.push(id);
            let fiber = &self[id];
            if id != root {
                if let Some(sibling) = fiber.sibling {
                    stack.push(sibling);
                }
            }
            if let Some(child) = fiber.child {
                stack.push(child);
            }
        }
        order
    }

    /// Frees `root` and its descendants, returning how many nodes were freed.
    pub(crate) fn free_subtree(&mut self, root: FiberId) -> usize {
        let ids = self.subtree(root);
        let count = ids.len();
        for id in ids {
            self.remove(id);
        }
        count
    }
}

impl<N> Index<FiberId> for FiberArena<N> {
    type Output = Fiber<N>;

    fn index(&self, id: FiberId) -> &Self::Output {
        self.get(id)
            .unwrap_or_else(|| panic!("stale fiber id {id:?}"))
    }
}

impl<N> IndexMut<FiberId> for FiberArena<N> {
    fn index_mut(&mut self, id: FiberId) -> &mut Self::Output {
        self.get_mut(id)
            .unwrap_or_else(|| panic!("stale fiber id {id:?}"))
    }
}

#[cfg(test)]
#[path = "tests/fiber_tests.rs"]
mod tests;
