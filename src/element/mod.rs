//! The element tree produced by the parser and consumed by the
//! translation engine.
//!
//! An [Element] is a cheap-clone handle to a shared tree node. Children
//! are owned by their parent; the parent link is weak and is only used
//! for namespace resolution walks, never for keeping a node alive.

use std::cell::RefCell;
use std::fmt::Debug;
use std::fmt::Display;
use std::rc::Rc;
use std::rc::Weak;

use serde_json::Map;
use serde_json::Value;

use crate::entities::escape;
use crate::entities::escape_attribute;

pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// One ordered child of an element: a text run or a nested element.
#[derive(Clone)]
pub enum Child {
    Text(String),
    Element(Element),
}

struct ElementNode {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Child>,
    parent: Weak<RefCell<ElementNode>>,
    // Namespaces that may be declared lazily when a prefix is requested.
    optional_namespaces: Vec<(String, String)>,
}

#[derive(Clone)]
pub struct Element {
    node: Rc<RefCell<ElementNode>>,
}

impl Element {
    pub fn new(name: &str) -> Element {
        Element {
            node: Rc::new(RefCell::new(ElementNode {
                name: name.to_string(),
                attributes: Vec::new(),
                children: Vec::new(),
                parent: Weak::new(),
                optional_namespaces: Vec::new(),
            })),
        }
    }

    /// The full tag name, including a namespace prefix if one was used.
    pub fn name(&self) -> String {
        self.node.borrow().name.clone()
    }

    /// The tag name without its namespace prefix.
    pub fn local_name(&self) -> String {
        let name = self.node.borrow().name.clone();
        match name.split_once(':') {
            Some((_, local)) => local.to_string(),
            None => name,
        }
    }

    pub fn parent(&self) -> Option<Element> {
        self.node
            .borrow()
            .parent
            .upgrade()
            .map(|node| Element { node })
    }

    //
    // Attributes
    //

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.node
            .borrow()
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    /// Looks up an attribute declared under a specific namespace,
    /// resolving whatever prefix the document happened to bind to it.
    pub fn namespaced_attribute(&self, namespace: &str, name: &str) -> Option<String> {
        if namespace == XML_NS {
            return self.attribute(&format!("xml:{name}"));
        }
        for (key, value) in self.node.borrow().attributes.iter() {
            if let Some((prefix, local)) = key.split_once(':') {
                if local == name
                    && prefix != "xmlns"
                    && self.prefix_namespace(prefix).as_deref() == Some(namespace)
                {
                    return Some(value.clone());
                }
            }
        }
        None
    }

    /// Sets, replaces, or removes an attribute. `None` and the empty
    /// string both remove it.
    pub fn set_attribute(&self, name: &str, value: Option<&str>) {
        match value {
            None | Some("") => self.remove_attribute(name),
            Some(value) => self.put_attribute(name, value),
        }
    }

    /// Like [set_attribute](Element::set_attribute), but keeps an
    /// attribute with an empty value instead of removing it.
    pub fn set_attribute_emit_empty(&self, name: &str, value: &str) {
        self.put_attribute(name, value);
    }

    fn put_attribute(&self, name: &str, value: &str) {
        let mut node = self.node.borrow_mut();
        if let Some(entry) = node.attributes.iter_mut().find(|(key, _)| key == name) {
            entry.1 = value.to_string();
        } else {
            node.attributes.push((name.to_string(), value.to_string()));
        }
    }

    fn remove_attribute(&self, name: &str) {
        self.node
            .borrow_mut()
            .attributes
            .retain(|(key, _)| key != name);
    }

    pub fn attributes(&self) -> Vec<(String, String)> {
        self.node.borrow().attributes.clone()
    }

    //
    // Children
    //

    // Attaches a parent link without inserting into the parent's child
    // list, so namespace walks work while a subtree is being built.
    pub(crate) fn set_parent(&self, parent: &Element) {
        self.node.borrow_mut().parent = Rc::downgrade(&parent.node);
    }

    pub fn append_child(&self, child: Element) -> Element {
        child.node.borrow_mut().parent = Rc::downgrade(&self.node);
        self.node
            .borrow_mut()
            .children
            .push(Child::Element(child.clone()));
        child
    }

    pub fn append_text(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut node = self.node.borrow_mut();
        if let Some(Child::Text(existing)) = node.children.last_mut() {
            existing.push_str(text);
        } else {
            node.children.push(Child::Text(text.to_string()));
        }
    }

    pub fn children(&self) -> Vec<Child> {
        self.node.borrow().children.clone()
    }

    pub fn child_elements(&self) -> Vec<Element> {
        self.node
            .borrow()
            .children
            .iter()
            .filter_map(|child| match child {
                Child::Element(el) => Some(el.clone()),
                Child::Text(_) => None,
            })
            .collect()
    }

    /// All child elements with the given local name, optionally
    /// restricted to one effective namespace.
    pub fn get_children(&self, name: &str, namespace: Option<&str>) -> Vec<Element> {
        self.child_elements()
            .into_iter()
            .filter(|child| {
                child.local_name() == name
                    && namespace.is_none_or(|ns| child.namespace() == ns)
            })
            .collect()
    }

    pub fn get_child(&self, name: &str, namespace: Option<&str>) -> Option<Element> {
        self.get_children(name, namespace).into_iter().next()
    }

    /// The concatenation of the direct text children.
    pub fn text(&self) -> String {
        let mut buf = String::new();
        for child in self.node.borrow().children.iter() {
            if let Child::Text(text) = child {
                buf.push_str(text);
            }
        }
        buf
    }

    //
    // Namespaces
    //

    /// The effective namespace of this element: its own declaration if
    /// present, else the nearest ancestor's.
    pub fn namespace(&self) -> String {
        let name = self.name();
        match name.split_once(':') {
            Some((prefix, _)) => self.prefix_namespace(prefix).unwrap_or_default(),
            None => self.default_namespace(),
        }
    }

    /// Resolves the default (`xmlns`) namespace by walking the parent
    /// chain.
    pub fn default_namespace(&self) -> String {
        let mut current = Some(self.clone());
        while let Some(el) = current {
            if let Some(ns) = el.attribute("xmlns") {
                return ns;
            }
            current = el.parent();
        }
        String::new()
    }

    fn prefix_namespace(&self, prefix: &str) -> Option<String> {
        if prefix == "xml" {
            return Some(XML_NS.to_string());
        }
        let key = format!("xmlns:{prefix}");
        let mut current = Some(self.clone());
        while let Some(el) = current {
            if let Some(ns) = el.attribute(&key) {
                return Some(ns);
            }
            current = el.parent();
        }
        None
    }

    /// The nearest element (self or ancestor) able to provide a prefix
    /// for the given namespace, either because it already declares one
    /// or because the namespace was registered as optional on it.
    pub fn namespace_root(&self, namespace: &str) -> Option<Element> {
        let mut current = Some(self.clone());
        while let Some(el) = current {
            {
                let node = el.node.borrow();
                let declared = node.attributes.iter().any(|(key, value)| {
                    key.starts_with("xmlns:") && value == namespace
                });
                let optional = node
                    .optional_namespaces
                    .iter()
                    .any(|(_, ns)| ns == namespace);
                if declared || optional {
                    drop(node);
                    return Some(el);
                }
            }
            current = el.parent();
        }
        None
    }

    /// Returns the prefix bound to a namespace within this scope,
    /// declaring one on this element if none exists yet.
    pub fn use_namespace(&self, prefix: &str, namespace: &str) -> String {
        // Existing prefixed declaration in scope wins.
        let mut current = Some(self.clone());
        while let Some(el) = current {
            for (key, value) in el.node.borrow().attributes.iter() {
                if value == namespace {
                    if let Some(existing) = key.strip_prefix("xmlns:") {
                        return existing.to_string();
                    }
                }
            }
            current = el.parent();
        }
        let chosen = if !prefix.is_empty() {
            prefix.to_string()
        } else if let Some(optional) = self
            .node
            .borrow()
            .optional_namespaces
            .iter()
            .find(|(_, ns)| ns == namespace)
            .map(|(prefix, _)| prefix.clone())
        {
            optional
        } else {
            format!("ns{}", self.node.borrow().attributes.len() + 1)
        };
        self.put_attribute(&format!("xmlns:{chosen}"), namespace);
        chosen
    }

    pub fn add_optional_namespace(&self, prefix: &str, namespace: &str) {
        self.node
            .borrow_mut()
            .optional_namespaces
            .push((prefix.to_string(), namespace.to_string()));
    }

    //
    // Serialization
    //

    /// Serializes the subtree to XML text.
    pub fn to_xml(&self) -> String {
        self.to_string()
    }

    /// Converts the subtree into a plain JSON-like tree of
    /// `{name, attributes, children}` objects.
    pub fn to_value(&self) -> Value {
        let node = self.node.borrow();
        let mut attributes = Map::new();
        for (key, value) in node.attributes.iter() {
            attributes.insert(key.clone(), Value::String(value.clone()));
        }
        let children: Vec<Value> = node
            .children
            .iter()
            .map(|child| match child {
                Child::Text(text) => Value::String(text.clone()),
                Child::Element(el) => el.to_value(),
            })
            .collect();
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(node.name.clone()));
        map.insert("attributes".to_string(), Value::Object(attributes));
        map.insert("children".to_string(), Value::Array(children));
        Value::Object(map)
    }

    /// Rebuilds an element from the JSON-like tree form.
    pub fn from_value(value: &Value) -> Option<Element> {
        let map = value.as_object()?;
        let name = map.get("name")?.as_str()?;
        let element = Element::new(name);
        if let Some(Value::Object(attributes)) = map.get("attributes") {
            for (key, value) in attributes {
                if let Value::String(value) = value {
                    element.set_attribute_emit_empty(key, value);
                }
            }
        }
        if let Some(Value::Array(children)) = map.get("children") {
            for child in children {
                match child {
                    Value::String(text) => element.append_text(text),
                    Value::Object(_) => {
                        if let Some(child) = Element::from_value(child) {
                            element.append_child(child);
                        }
                    }
                    _ => {}
                }
            }
        }
        Some(element)
    }

    /// Pointer identity of the underlying node.
    pub fn same_node(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let node = self.node.borrow();
        write!(f, "<{}", node.name)?;
        for (key, value) in node.attributes.iter() {
            write!(f, " {}=\"{}\"", key, escape_attribute(value))?;
        }
        if node.children.is_empty() {
            return write!(f, "/>");
        }
        write!(f, ">")?;
        for child in node.children.iter() {
            match child {
                Child::Text(text) => write!(f, "{}", escape(text))?,
                Child::Element(el) => write!(f, "{}", el)?,
            }
        }
        write!(f, "</{}>", node.name)
    }
}

impl Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Element({self})")
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        if self.name() != other.name() {
            return false;
        }
        let mut ours = self.attributes();
        let mut theirs = other.attributes();
        ours.sort();
        theirs.sort();
        if ours != theirs {
            return false;
        }
        let a = self.children();
        let b = other.children();
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b.iter()).all(|(x, y)| match (x, y) {
            (Child::Text(x), Child::Text(y)) => x == y,
            (Child::Element(x), Child::Element(y)) => x == y,
            _ => false,
        })
    }
}

impl Eq for Element {}

#[cfg(test)]
mod tests;
