//! Child Descriptions
//!
//! A component returns a [`Child`]: a closed, tagged description of what
//! it wants rendered beneath it. The reconciler compares these against the
//! fibers of the previous generation.
//!
//! # Shapes
//!
//! - [`Child::Empty`] renders nothing.
//! - [`Child::Text`] is a text leaf. Text has no key and no type.
//! - [`Child::Element`] is a host element, a function component, or a
//!   fragment, optionally keyed.
//! - [`Child::List`] is an ordered list of children, diffed by key or
//!   position.

use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::Result;
use crate::hooks::HookCx;

/// Unique identifier for a component definition.
///
/// Two elements have the same component type exactly when their
/// components share an ID. Cloning a [`Component`] keeps its ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(u64);

impl ComponentId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Signature of a component's render function.
pub type RenderFn = dyn Fn(&mut HookCx<'_>, &Props) -> Result<Child>;

/// A function component.
#[derive(Clone)]
pub struct Component {
    id: ComponentId,
    name: Arc<str>,
    render: Rc<RenderFn>,
}

impl Component {
    /// Define a new component.
    pub fn new<F>(name: impl Into<Arc<str>>, render: F) -> Self
    where
        F: Fn(&mut HookCx<'_>, &Props) -> Result<Child> + 'static,
    {
        Self {
            id: ComponentId::next(),
            name: name.into(),
            render: Rc::new(render),
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn render(&self, cx: &mut HookCx<'_>, props: &Props) -> Result<Child> {
        (self.render)(cx, props)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Component {}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Sibling-scoped identity of an element.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Key(Arc<str>);

impl Key {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:?})", &*self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Self(key.into())
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Self(key.into())
    }
}

impl From<usize> for Key {
    fn from(key: usize) -> Self {
        Self(key.to_string().into())
    }
}

impl From<i64> for Key {
    fn from(key: i64) -> Self {
        Self(key.to_string().into())
    }
}

/// A prop value or an effect dependency.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    /// An opaque reference, compared by identity.
    Ref(Rc<dyn Any>),
}

impl Value {
    /// Wrap an arbitrary value as an identity-compared reference.
    pub fn reference<T: Any>(value: T) -> Self {
        Value::Ref(Rc::new(value))
    }

    /// Identity comparison.
    ///
    /// Scalars compare by value, with `NaN` equal to itself and `0.0`
    /// distinct from `-0.0`. References compare by pointer.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a.to_bits() == b.to_bits()
                }
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Str(v) => write!(f, "Str({:?})", &**v),
            Value::Ref(v) => write!(f, "Ref({:p})", Rc::as_ptr(v)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v.into())
    }
}

/// Props of an element: named values plus nested children.
#[derive(Debug, Clone, Default)]
pub struct Props {
    attrs: IndexMap<Arc<str>, Value>,
    children: Box<Child>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a named prop.
    pub fn with(mut self, name: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Set the nested children.
    pub fn with_children(mut self, children: impl Into<Child>) -> Self {
        self.children = Box::new(children.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    pub fn children(&self) -> &Child {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

/// What an element instantiates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementType {
    /// A host element, identified by its tag.
    Host(Arc<str>),
    /// A function component.
    Function(Component),
    /// A grouping of children with no node of its own.
    Fragment,
}

/// A keyed, typed element description.
#[derive(Debug, Clone)]
pub struct Element {
    pub ty: ElementType,
    pub key: Option<Key>,
    pub props: Props,
}

impl Element {
    pub fn new(ty: ElementType, props: Props) -> Self {
        Self {
            ty,
            key: None,
            props,
        }
    }

    /// A host element with no props.
    pub fn host(tag: impl Into<Arc<str>>) -> Self {
        Self::new(ElementType::Host(tag.into()), Props::new())
    }

    /// An element rendering `component`.
    pub fn component(component: &Component) -> Self {
        Self::new(ElementType::Function(component.clone()), Props::new())
    }

    /// A fragment grouping `children`.
    pub fn fragment(children: Vec<Child>) -> Self {
        Self::new(
            ElementType::Fragment,
            Props::new().with_children(Child::List(children)),
        )
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn prop(mut self, name: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        self.props = self.props.with(name, value);
        self
    }

    pub fn child(mut self, child: impl Into<Child>) -> Self {
        self.props = self.props.with_children(child);
        self
    }

    pub fn is_fragment(&self) -> bool {
        self.ty == ElementType::Fragment
    }

    /// The children of a fragment, as a list.
    pub(crate) fn fragment_children(&self) -> Vec<Child> {
        match &*self.props.children {
            Child::List(children) => children.clone(),
            Child::Empty => Vec::new(),
            other => vec![other.clone()],
        }
    }
}

/// A child description.
#[derive(Debug, Clone, Default)]
pub enum Child {
    #[default]
    Empty,
    Text(Arc<str>),
    Element(Element),
    List(Vec<Child>),
}

impl Child {
    pub fn text(content: impl Into<Arc<str>>) -> Self {
        Child::Text(content.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Child::Empty)
    }
}

impl From<Element> for Child {
    fn from(element: Element) -> Self {
        Child::Element(element)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(text.into())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(text.into())
    }
}

impl From<i64> for Child {
    fn from(number: i64) -> Self {
        Child::Text(number.to_string().into())
    }
}

impl From<Vec<Child>> for Child {
    fn from(children: Vec<Child>) -> Self {
        Child::List(children)
    }
}

impl From<Vec<Element>> for Child {
    fn from(elements: Vec<Element>) -> Self {
        Child::List(elements.into_iter().map(Child::Element).collect())
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(child: Option<T>) -> Self {
        child.map_or(Child::Empty, Into::into)
    }
}
