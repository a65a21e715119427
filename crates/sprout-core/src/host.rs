//! The seam between the engine and the platform-native tree.

use std::fmt;

use crate::element::{event_name, EventHandler, PropValue, Properties};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The host does not know the node it was asked to touch.
    Missing { node: String },
    /// A node that should have been attached to a host parent is not.
    NotAChild { parent: String, child: String },
    /// The host refused the operation.
    Rejected {
        operation: &'static str,
        reason: String,
    },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Missing { node } => write!(f, "host node {node} missing"),
            HostError::NotAChild { parent, child } => {
                write!(f, "host node {child} is not a child of {parent}")
            }
            HostError::Rejected { operation, reason } => {
                write!(f, "host rejected {operation}: {reason}")
            }
        }
    }
}

impl std::error::Error for HostError {}

/// Operations the engine needs from the platform-native tree.
///
/// The engine never inspects host nodes; it only stores the handles returned
/// by [`create_node`](HostRenderer::create_node) and passes them back.
pub trait HostRenderer {
    type Node: Clone + PartialEq + fmt::Debug;

    fn create_node(&mut self, tag: &str) -> Result<Self::Node, HostError>;

    fn set_property(
        &mut self,
        node: &Self::Node,
        name: &str,
        value: &PropValue,
    ) -> Result<(), HostError>;

    fn remove_property(&mut self, node: &Self::Node, name: &str) -> Result<(), HostError>;

    fn add_event_listener(
        &mut self,
        node: &Self::Node,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError>;

    fn remove_event_listener(
        &mut self,
        node: &Self::Node,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError>;

    /// Inserts `child` under `parent`, before `before` when given and at the
    /// end otherwise.
    fn insert_child(
        &mut self,
        parent: &Self::Node,
        child: &Self::Node,
        before: Option<&Self::Node>,
    ) -> Result<(), HostError>;

    fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), HostError>;

    /// Called once the engine holds no handle to `node` or anything below it:
    /// after a deleted subtree is removed, and for nodes created by a pass
    /// that was abandoned before commit.
    fn release_node(&mut self, node: &Self::Node) -> Result<(), HostError> {
        let _ = node;
        Ok(())
    }

    /// Brings `node` from `previous` to `next`, touching only what changed.
    fn update_properties(
        &mut self,
        node: &Self::Node,
        previous: &Properties,
        next: &Properties,
    ) -> Result<(), HostError> {
        apply_property_diff(self, node, previous, next)
    }
}

fn listener(name: &str, value: &PropValue) -> Option<(String, EventHandler)> {
    let handler = value.as_handler()?;
    let event = event_name(name)?;
    Some((event, handler.clone()))
}

/// Applies the full property set of a freshly created node.
pub fn apply_initial_properties<H>(
    host: &mut H,
    node: &H::Node,
    properties: &Properties,
) -> Result<(), HostError>
where
    H: HostRenderer + ?Sized,
{
    for (name, value) in properties {
        match listener(name, value) {
            Some((event, handler)) => host.add_event_listener(node, &event, &handler)?,
            None => host.set_property(node, name, value)?,
        }
    }
    Ok(())
}

/// Removes properties missing from `next`, then sets the ones that changed.
///
/// A changed handler is unregistered before its replacement is added.
pub fn apply_property_diff<H>(
    host: &mut H,
    node: &H::Node,
    previous: &Properties,
    next: &Properties,
) -> Result<(), HostError>
where
    H: HostRenderer + ?Sized,
{
    for (name, old) in previous {
        if next.contains_key(name) {
            continue;
        }
        match listener(name, old) {
            Some((event, handler)) => host.remove_event_listener(node, &event, &handler)?,
            None => host.remove_property(node, name)?,
        }
    }
    for (name, value) in next {
        let old = previous.get(name);
        if old == Some(value) {
            continue;
        }
        if let Some((event, handler)) = old.and_then(|old| listener(name, old)) {
            host.remove_event_listener(node, &event, &handler)?;
        }
        match listener(name, value) {
            Some((event, handler)) => host.add_event_listener(node, &event, &handler)?,
            None => host.set_property(node, name, value)?,
        }
    }
    Ok(())
}
