use std::fmt::Write as _;

use indexmap::IndexMap;

use crate::element::{EventHandler, PropValue, Properties, NODE_VALUE, TEXT_ELEMENT};
use crate::host::{HostError, HostRenderer};

/// Handle to a [`MemoryHost`] node. Released slots are reused under a new
/// generation, so a handle to a released node stops resolving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryNodeId {
    index: usize,
    generation: u32,
}

/// One call made by the engine, in the order it was made.
#[derive(Clone, Debug, PartialEq)]
pub enum HostOp {
    Create {
        node: MemoryNodeId,
        tag: String,
    },
    SetProperty {
        node: MemoryNodeId,
        name: String,
        value: PropValue,
    },
    RemoveProperty {
        node: MemoryNodeId,
        name: String,
    },
    AddListener {
        node: MemoryNodeId,
        event: String,
    },
    RemoveListener {
        node: MemoryNodeId,
        event: String,
    },
    Insert {
        parent: MemoryNodeId,
        child: MemoryNodeId,
        before: Option<MemoryNodeId>,
    },
    Remove {
        parent: MemoryNodeId,
        child: MemoryNodeId,
    },
    Release {
        node: MemoryNodeId,
    },
}

impl HostOp {
    pub fn is_insert(&self) -> bool {
        matches!(self, HostOp::Insert { .. })
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, HostOp::Remove { .. })
    }

    pub fn is_create(&self) -> bool {
        matches!(self, HostOp::Create { .. })
    }

    pub fn is_property_change(&self) -> bool {
        matches!(
            self,
            HostOp::SetProperty { .. } | HostOp::RemoveProperty { .. }
        )
    }
}

struct MemoryNode {
    tag: String,
    properties: Properties,
    listeners: IndexMap<String, Vec<EventHandler>>,
    children: Vec<MemoryNodeId>,
    parent: Option<MemoryNodeId>,
}

struct MemorySlot {
    generation: u32,
    node: Option<MemoryNode>,
}

/// Host tree kept in memory, recording every operation it receives.
#[derive(Default)]
pub struct MemoryHost {
    slots: Vec<MemorySlot>,
    free: Vec<usize>,
    live: usize,
    ops: Vec<HostOp>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detached node to render into. Not recorded as an operation.
    pub fn create_container(&mut self, tag: &str) -> MemoryNodeId {
        self.alloc(tag)
    }

    fn alloc(&mut self, tag: &str) -> MemoryNodeId {
        let node = MemoryNode {
            tag: tag.to_owned(),
            properties: Properties::new(),
            listeners: IndexMap::new(),
            children: Vec::new(),
            parent: None,
        };
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.node = Some(node);
            return MemoryNodeId {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(MemorySlot {
            generation: 0,
            node: Some(node),
        });
        MemoryNodeId {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    fn get(&self, id: MemoryNodeId) -> Option<&MemoryNode> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node(&self, id: MemoryNodeId) -> Result<&MemoryNode, HostError> {
        self.get(id).ok_or_else(|| HostError::Missing {
            node: format!("{id:?}"),
        })
    }

    fn node_mut(&mut self, id: MemoryNodeId) -> Result<&mut MemoryNode, HostError> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or_else(|| HostError::Missing {
                node: format!("{id:?}"),
            })
    }

    /// Number of live nodes, containers included.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn tag(&self, id: MemoryNodeId) -> Option<&str> {
        self.get(id).map(|node| node.tag.as_str())
    }

    pub fn property(&self, id: MemoryNodeId, name: &str) -> Option<&PropValue> {
        self.get(id)?.properties.get(name)
    }

    pub fn children(&self, id: MemoryNodeId) -> &[MemoryNodeId] {
        self.get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    pub fn parent(&self, id: MemoryNodeId) -> Option<MemoryNodeId> {
        self.get(id)?.parent
    }

    pub fn listener_count(&self, id: MemoryNodeId, event: &str) -> usize {
        self.get(id)
            .and_then(|node| node.listeners.get(event))
            .map_or(0, Vec::len)
    }

    /// Invokes every listener registered for `event` on `id`.
    pub fn dispatch(&self, id: MemoryNodeId, event: &str) -> Result<usize, HostError> {
        let handlers = self
            .node(id)?
            .listeners
            .get(event)
            .cloned()
            .unwrap_or_default();
        for handler in &handlers {
            handler.call();
        }
        Ok(handlers.len())
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// Concatenated `nodeValue` of every text leaf under `id`.
    pub fn text_content(&self, id: MemoryNodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: MemoryNodeId, out: &mut String) {
        let Some(node) = self.get(id) else {
            return;
        };
        if node.tag == TEXT_ELEMENT {
            if let Some(value) = node.properties.get(NODE_VALUE) {
                let _ = write!(out, "{value}");
            }
        }
        for child in &node.children {
            self.collect_text(*child, out);
        }
    }

    /// Attached descendants of `root` in depth-first pre-order.
    pub fn descendants(&self, root: MemoryNodeId) -> Vec<MemoryNodeId> {
        let mut order = Vec::new();
        let mut stack: Vec<MemoryNodeId> = self.children(root).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    pub fn dump_tree(&self, root: MemoryNodeId) -> String {
        let mut output = String::new();
        self.dump_node(&mut output, root, 0);
        output
    }

    fn dump_node(&self, output: &mut String, id: MemoryNodeId, depth: usize) {
        let indent = "  ".repeat(depth);
        let Some(node) = self.get(id) else {
            let _ = writeln!(output, "{indent}{id:?} (missing)");
            return;
        };
        if node.tag == TEXT_ELEMENT {
            let value = node
                .properties
                .get(NODE_VALUE)
                .map(ToString::to_string)
                .unwrap_or_default();
            let _ = writeln!(output, "{indent}{value:?}");
            return;
        }
        let _ = write!(output, "{indent}<{}", node.tag);
        for (name, value) in &node.properties {
            let _ = write!(output, " {name}={value:?}");
        }
        for event in node.listeners.keys() {
            let _ = write!(output, " on:{event}");
        }
        let _ = writeln!(output, ">");
        for child in &node.children {
            self.dump_node(output, *child, depth + 1);
        }
    }

    fn detach(&mut self, child: MemoryNodeId) -> Result<(), HostError> {
        if let Some(parent) = self.node(child)?.parent {
            self.node_mut(parent)?.children.retain(|c| *c != child);
            self.node_mut(child)?.parent = None;
        }
        Ok(())
    }
}

impl HostRenderer for MemoryHost {
    type Node = MemoryNodeId;

    fn create_node(&mut self, tag: &str) -> Result<Self::Node, HostError> {
        let node = self.alloc(tag);
        self.ops.push(HostOp::Create {
            node,
            tag: tag.to_owned(),
        });
        Ok(node)
    }

    fn set_property(
        &mut self,
        node: &Self::Node,
        name: &str,
        value: &PropValue,
    ) -> Result<(), HostError> {
        self.node_mut(*node)?
            .properties
            .insert(name.to_owned(), value.clone());
        self.ops.push(HostOp::SetProperty {
            node: *node,
            name: name.to_owned(),
            value: value.clone(),
        });
        Ok(())
    }

    fn remove_property(&mut self, node: &Self::Node, name: &str) -> Result<(), HostError> {
        self.node_mut(*node)?.properties.shift_remove(name);
        self.ops.push(HostOp::RemoveProperty {
            node: *node,
            name: name.to_owned(),
        });
        Ok(())
    }

    fn add_event_listener(
        &mut self,
        node: &Self::Node,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError> {
        self.node_mut(*node)?
            .listeners
            .entry(event.to_owned())
            .or_default()
            .push(handler.clone());
        self.ops.push(HostOp::AddListener {
            node: *node,
            event: event.to_owned(),
        });
        Ok(())
    }

    fn remove_event_listener(
        &mut self,
        node: &Self::Node,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError> {
        if let Some(handlers) = self.node_mut(*node)?.listeners.get_mut(event) {
            handlers.retain(|h| !h.ptr_eq(handler));
        }
        self.ops.push(HostOp::RemoveListener {
            node: *node,
            event: event.to_owned(),
        });
        Ok(())
    }

    fn insert_child(
        &mut self,
        parent: &Self::Node,
        child: &Self::Node,
        before: Option<&Self::Node>,
    ) -> Result<(), HostError> {
        self.node(*parent)?;
        self.detach(*child)?;
        let siblings = &mut self.node_mut(*parent)?.children;
        let position = match before {
            Some(anchor) => siblings
                .iter()
                .position(|c| c == anchor)
                .ok_or_else(|| HostError::NotAChild {
                    parent: format!("{parent:?}"),
                    child: format!("{anchor:?}"),
                })?,
            None => siblings.len(),
        };
        siblings.insert(position, *child);
        self.node_mut(*child)?.parent = Some(*parent);
        self.ops.push(HostOp::Insert {
            parent: *parent,
            child: *child,
            before: before.copied(),
        });
        Ok(())
    }

    fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), HostError> {
        let siblings = &mut self.node_mut(*parent)?.children;
        let Some(position) = siblings.iter().position(|c| c == child) else {
            return Err(HostError::NotAChild {
                parent: format!("{parent:?}"),
                child: format!("{child:?}"),
            });
        };
        siblings.remove(position);
        self.node_mut(*child)?.parent = None;
        self.ops.push(HostOp::Remove {
            parent: *parent,
            child: *child,
        });
        Ok(())
    }

    fn release_node(&mut self, node: &Self::Node) -> Result<(), HostError> {
        self.detach(*node)?;
        let mut stack = vec![*node];
        while let Some(id) = stack.pop() {
            let Some(slot) = self
                .slots
                .get_mut(id.index)
                .filter(|slot| slot.generation == id.generation)
            else {
                continue;
            };
            if let Some(released) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
                self.live -= 1;
                stack.extend(released.children);
            }
        }
        self.ops.push(HostOp::Release { node: *node });
        Ok(())
    }
}

impl std::fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHost")
            .field("nodes", &self.live)
            .field("ops", &self.ops.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/memory_tests.rs"]
mod tests;
