//! Immutable node descriptions.
//!
//! An [`Element`] names either a host tag or a component producer, carries an
//! ordered property map and an ordered list of children. Descriptions are
//! cheap to clone: the property payload sits behind an `Rc` and is only
//! copied when a builder method mutates a shared value.

use std::any::{type_name, TypeId};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// Tag used for text leaves.
pub const TEXT_ELEMENT: &str = "TEXT_ELEMENT";

/// Property holding the character data of a text leaf.
pub const NODE_VALUE: &str = "nodeValue";

/// Property names starting with this prefix and holding a handler are event
/// listeners rather than host properties.
pub const EVENT_PREFIX: &str = "on";

/// Event callback stored in a property map.
///
/// Two handlers are equal only when they share the same allocation, so a
/// closure rebuilt on every render always counts as a changed property.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn()>);

impl EventHandler {
    pub fn new(handler: impl Fn() + 'static) -> Self {
        Self(Rc::new(handler))
    }

    pub fn call(&self) {
        (self.0)()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    Text(Rc<str>),
    Int(i64),
    Float(f64),
    Bool(bool),
    Handler(EventHandler),
}

impl PropValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            PropValue::Handler(handler) => Some(handler),
            _ => None,
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Text(text) => f.write_str(text),
            PropValue::Int(value) => write!(f, "{value}"),
            PropValue::Float(value) => write!(f, "{value}"),
            PropValue::Bool(value) => write!(f, "{value}"),
            PropValue::Handler(_) => f.write_str("<handler>"),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Text(Rc::from(value))
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Text(Rc::from(value))
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(i64::from(value))
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(value: EventHandler) -> Self {
        PropValue::Handler(value)
    }
}

/// Insertion-ordered property map, excluding children.
pub type Properties = IndexMap<String, PropValue>;

/// Returns the listener name for an event property (`onClick` -> `click`).
pub fn event_name(property: &str) -> Option<String> {
    let rest = property.strip_prefix(EVENT_PREFIX)?;
    if rest.is_empty() {
        return None;
    }
    Some(rest.to_lowercase())
}

/// Properties of a node together with its children.
///
/// A `None` child is an empty position: it still occupies a slot when
/// matching children against the previous generation.
#[derive(Clone, Debug, Default)]
pub struct Props {
    values: Properties,
    children: Vec<Option<Element>>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropValue::as_text)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(PropValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn values(&self) -> &Properties {
        &self.values
    }

    pub fn children(&self) -> &[Option<Element>] {
        &self.children
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn push_child(&mut self, child: Option<Element>) {
        self.children.push(child);
    }
}

type Producer = dyn Fn(&Props) -> Element;

/// A producer function together with its identity.
///
/// Identity is the `TypeId` of the closure or fn item, so the same producer
/// compares equal across renders while two different producers never do.
#[derive(Clone)]
pub struct Component {
    id: TypeId,
    name: &'static str,
    render: Rc<Producer>,
}

impl Component {
    pub fn new<F>(producer: F) -> Self
    where
        F: Fn(&Props) -> Element + 'static,
    {
        Self {
            id: TypeId::of::<F>(),
            name: type_name::<F>(),
            render: Rc::new(producer),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn render(&self, props: &Props) -> Element {
        (self.render)(props)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Component").field(&self.name).finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ElementType {
    Host(Rc<str>),
    Component(Component),
}

impl ElementType {
    pub fn tag(&self) -> Option<&str> {
        match self {
            ElementType::Host(tag) => Some(tag),
            ElementType::Component(_) => None,
        }
    }
}

/// Declarative description of one node.
#[derive(Clone)]
pub struct Element {
    kind: ElementType,
    props: Rc<Props>,
}

impl Element {
    pub fn host(tag: &str) -> Self {
        Self {
            kind: ElementType::Host(Rc::from(tag)),
            props: Rc::new(Props::new()),
        }
    }

    pub fn text(value: impl fmt::Display) -> Self {
        Self::host(TEXT_ELEMENT).prop(NODE_VALUE, value.to_string())
    }

    pub fn component<F>(producer: F) -> Self
    where
        F: Fn(&Props) -> Element + 'static,
    {
        Self::from_component(Component::new(producer), Props::new())
    }

    pub fn from_component(component: Component, props: Props) -> Self {
        Self {
            kind: ElementType::Component(component),
            props: Rc::new(props),
        }
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        Rc::make_mut(&mut self.props).set(name, value);
        self
    }

    /// Attaches `handler` under the event property `name`, e.g. `onClick`.
    pub fn on(self, name: impl Into<String>, handler: impl Fn() + 'static) -> Self {
        self.prop(name, EventHandler::new(handler))
    }

    pub fn child(mut self, child: impl Into<Element>) -> Self {
        Rc::make_mut(&mut self.props).push_child(Some(child.into()));
        self
    }

    pub fn maybe_child(mut self, child: Option<Element>) -> Self {
        Rc::make_mut(&mut self.props).push_child(child);
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Element>,
    {
        let props = Rc::make_mut(&mut self.props);
        for child in children {
            props.push_child(Some(child.into()));
        }
        self
    }

    pub fn kind(&self) -> &ElementType {
        &self.kind
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub(crate) fn shared_props(&self) -> Rc<Props> {
        Rc::clone(&self.props)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Element");
        match &self.kind {
            ElementType::Host(tag) => debug.field("tag", tag),
            ElementType::Component(component) => debug.field("component", &component.name()),
        };
        debug
            .field("props", &self.props.values)
            .field("children", &self.props.children)
            .finish()
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Element::text(value)
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        Element::text(value)
    }
}

impl From<i64> for Element {
    fn from(value: i64) -> Self {
        Element::text(value)
    }
}

impl From<i32> for Element {
    fn from(value: i32) -> Self {
        Element::text(value)
    }
}
