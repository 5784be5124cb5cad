//! The field combinator family. Each function builds a
//! [FieldDefinition] binding one record field to a piece of XML:
//! an attribute, child text, a nested element, or a whole raw subtree.

use std::collections::HashSet;
use std::rc::Rc;

use serde_json::Map;
use serde_json::Value;

use crate::element::Element;
use crate::parser::parse;

use super::context::TranslationContext;
use super::translator::Exporter;
use super::translator::FieldDefinition;
use super::translator::Importer;

//
// Element helpers shared by combinators and the export engine.
//

/// Creates an element for `namespace`, reusing a prefix from the parent
/// scope when one is available and declaring `xmlns` only when the
/// namespace differs from the inherited default.
pub(crate) fn create_element(
    namespace: &str,
    name: &str,
    parent_namespace: Option<&str>,
    parent: Option<&Element>,
) -> Element {
    let mut namespace = namespace.to_string();
    let mut name = name.to_string();
    if let Some(parent) = parent {
        if namespace.is_empty() {
            namespace = parent.namespace();
        }
        if let Some(root) = parent.namespace_root(&namespace) {
            let prefix = root.use_namespace("", &namespace);
            name = format!("{prefix}:{name}");
        }
    }
    let element = Element::new(&name);
    let parent_namespace = parent_namespace.unwrap_or("");
    if !name.contains(':') && (parent_namespace.is_empty() || namespace != parent_namespace) {
        element.set_attribute("xmlns", Some(&namespace));
    }
    element
}

pub(crate) fn get_lang(xml: &Element, fallback: &str) -> String {
    xml.attribute("xml:lang")
        .filter(|lang| !lang.is_empty())
        .unwrap_or_else(|| fallback.to_string())
        .to_lowercase()
}

pub(crate) fn get_target_lang(children: &[Element], context: &TranslationContext) -> String {
    let available: Vec<String> = children
        .iter()
        .map(|child| get_lang(child, &context.lang))
        .collect();
    context.resolve_language(&available)
}

pub(crate) fn find_all(
    xml: &Element,
    namespace: &str,
    element: &str,
    lang: Option<&str>,
) -> Vec<Element> {
    let existing = xml.get_children(element, Some(namespace));
    match lang {
        Some(lang) if !lang.is_empty() => {
            let parent_lang = get_lang(xml, "");
            existing
                .into_iter()
                .filter(|child| get_lang(child, &parent_lang) == lang)
                .collect()
        }
        _ => existing,
    }
}

pub(crate) fn find_or_create(
    xml: &Element,
    namespace: &str,
    element: &str,
    lang: Option<&str>,
) -> Element {
    if let Some(first) = find_all(xml, namespace, element, lang).into_iter().next() {
        return first;
    }
    let created = create_element(namespace, element, Some(&xml.default_namespace()), Some(xml));
    if let Some(lang) = lang.filter(|lang| !lang.is_empty()) {
        if get_lang(xml, lang) != lang {
            created.set_attribute("xml:lang", Some(lang));
        }
    }
    xml.append_child(created.clone());
    created
}

//
// Value codecs.
//

#[derive(Clone, Copy)]
struct Codec {
    parse: fn(&str) -> Option<Value>,
    write: fn(&Value) -> Option<String>,
}

fn parse_string(raw: &str) -> Option<Value> {
    Some(Value::String(raw.to_string()))
}

fn write_string(value: &Value) -> Option<String> {
    value.as_str().map(String::from)
}

fn parse_integer(raw: &str) -> Option<Value> {
    raw.trim().parse::<i64>().ok().map(Value::from)
}

fn write_integer(value: &Value) -> Option<String> {
    value.as_i64().map(|n| n.to_string())
}

fn parse_float(raw: &str) -> Option<Value> {
    let parsed: f64 = raw.trim().parse().ok()?;
    serde_json::Number::from_f64(parsed).map(Value::Number)
}

fn write_float(value: &Value) -> Option<String> {
    value.as_f64().map(|n| n.to_string())
}

fn parse_boolean(raw: &str) -> Option<Value> {
    match raw {
        "true" | "1" => Some(Value::Bool(true)),
        "false" | "0" => Some(Value::Bool(false)),
        _ => None,
    }
}

fn write_boolean(value: &Value) -> Option<String> {
    value
        .as_bool()
        .map(|flag| if flag { "true" } else { "false" }.to_string())
}

const STRING: Codec = Codec {
    parse: parse_string,
    write: write_string,
};
const INTEGER: Codec = Codec {
    parse: parse_integer,
    write: write_integer,
};
const FLOAT: Codec = Codec {
    parse: parse_float,
    write: write_float,
};
const BOOLEAN: Codec = Codec {
    parse: parse_boolean,
    write: write_boolean,
};
// Timestamps travel in their wire form; callers parse them if needed.
const DATE: Codec = STRING;

//
// Attributes
//

fn attribute_field(
    name: String,
    namespace: Option<(String, String)>,
    codec: Codec,
    default: Option<Value>,
    emit_empty: bool,
) -> FieldDefinition {
    let importer: Importer = {
        let name = name.clone();
        let namespace = namespace.clone();
        Rc::new(move |xml: &Element, _context: &TranslationContext| {
            let raw = match &namespace {
                Some((_, namespace)) => xml.namespaced_attribute(namespace, &name),
                None => xml.attribute(&name),
            };
            match raw {
                Some(value) if !value.is_empty() => (codec.parse)(&value),
                Some(value) if emit_empty => Some(Value::String(value)),
                _ => default.clone(),
            }
        })
    };
    let exporter: Exporter =
        Rc::new(move |xml: &Element, value: &Value, _context: &TranslationContext| {
            if value.is_null() {
                return;
            }
            let Some(output) = (codec.write)(value) else {
                return;
            };
            if output.is_empty() && !emit_empty {
                return;
            }
            let attr = match &namespace {
                Some((prefix, namespace)) => {
                    let prefix = match xml.namespace_root(namespace) {
                        Some(root) => root.use_namespace(prefix, namespace),
                        None => xml.use_namespace(prefix, namespace),
                    };
                    format!("{prefix}:{name}")
                }
                None => name.clone(),
            };
            if emit_empty {
                xml.set_attribute_emit_empty(&attr, &output);
            } else {
                xml.set_attribute(&attr, Some(&output));
            }
        });
    FieldDefinition::new(importer, exporter)
}

pub fn attribute(name: &str) -> FieldDefinition {
    attribute_field(name.to_string(), None, STRING, None, false)
}

pub fn attribute_default(name: &str, default: &str) -> FieldDefinition {
    attribute_field(
        name.to_string(),
        None,
        STRING,
        Some(Value::String(default.to_string())),
        false,
    )
}

pub fn attribute_emit_empty(name: &str) -> FieldDefinition {
    attribute_field(name.to_string(), None, STRING, None, true)
}

pub fn boolean_attribute(name: &str) -> FieldDefinition {
    attribute_field(name.to_string(), None, BOOLEAN, None, false)
}

pub fn integer_attribute(name: &str) -> FieldDefinition {
    attribute_field(name.to_string(), None, INTEGER, None, false)
}

pub fn integer_attribute_default(name: &str, default: i64) -> FieldDefinition {
    attribute_field(name.to_string(), None, INTEGER, Some(Value::from(default)), false)
}

pub fn float_attribute(name: &str) -> FieldDefinition {
    attribute_field(name.to_string(), None, FLOAT, None, false)
}

pub fn date_attribute(name: &str) -> FieldDefinition {
    attribute_field(name.to_string(), None, DATE, None, false)
}

pub fn namespaced_attribute(prefix: &str, namespace: &str, name: &str) -> FieldDefinition {
    attribute_field(
        name.to_string(),
        Some((prefix.to_string(), namespace.to_string())),
        STRING,
        None,
        false,
    )
}

pub fn namespaced_boolean_attribute(prefix: &str, namespace: &str, name: &str) -> FieldDefinition {
    attribute_field(
        name.to_string(),
        Some((prefix.to_string(), namespace.to_string())),
        BOOLEAN,
        None,
        false,
    )
}

pub fn namespaced_integer_attribute(prefix: &str, namespace: &str, name: &str) -> FieldDefinition {
    attribute_field(
        name.to_string(),
        Some((prefix.to_string(), namespace.to_string())),
        INTEGER,
        None,
        false,
    )
}

pub fn namespaced_float_attribute(prefix: &str, namespace: &str, name: &str) -> FieldDefinition {
    attribute_field(
        name.to_string(),
        Some((prefix.to_string(), namespace.to_string())),
        FLOAT,
        None,
        false,
    )
}

pub fn namespaced_date_attribute(prefix: &str, namespace: &str, name: &str) -> FieldDefinition {
    attribute_field(
        name.to_string(),
        Some((prefix.to_string(), namespace.to_string())),
        DATE,
        None,
        false,
    )
}

/// The `xml:lang` attribute, emitted only when it differs from the
/// inherited language.
pub fn language_attribute() -> FieldDefinition {
    let importer: Importer = Rc::new(|xml: &Element, context: &TranslationContext| {
        Some(Value::String(get_lang(xml, &context.lang)))
    });
    let exporter: Exporter = Rc::new(|xml: &Element, value: &Value, context: &TranslationContext| {
        match value.as_str() {
            Some(lang) if !lang.is_empty() && lang.to_lowercase() != context.lang => {
                xml.set_attribute("xml:lang", Some(lang));
            }
            _ => xml.set_attribute("xml:lang", None),
        }
    });
    FieldDefinition::new(importer, exporter)
}

//
// Child attributes
//

fn child_attribute_with(
    namespace: Option<String>,
    element: String,
    name: String,
    codec: Codec,
    default: Option<Value>,
) -> FieldDefinition {
    let converter = attribute_field(name, None, codec, None, false);
    let importer: Importer = {
        let namespace = namespace.clone();
        let element = element.clone();
        let converter = converter.importer.clone();
        Rc::new(move |xml: &Element, context: &TranslationContext| {
            let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
            match xml.get_child(&element, Some(&ns)) {
                Some(child) => converter(&child, context),
                None => default.clone(),
            }
        })
    };
    let exporter: Exporter = {
        let converter = converter.exporter.clone();
        Rc::new(move |xml: &Element, value: &Value, context: &TranslationContext| {
            if value.is_null() {
                return;
            }
            let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
            let child = find_or_create(xml, &ns, &element, None);
            converter(&child, value, context);
        })
    };
    FieldDefinition::new(importer, exporter)
}

pub fn child_attribute(namespace: Option<&str>, element: &str, name: &str) -> FieldDefinition {
    child_attribute_with(
        namespace.map(String::from),
        element.to_string(),
        name.to_string(),
        STRING,
        None,
    )
}

pub fn child_boolean_attribute(
    namespace: Option<&str>,
    element: &str,
    name: &str,
) -> FieldDefinition {
    child_attribute_with(
        namespace.map(String::from),
        element.to_string(),
        name.to_string(),
        BOOLEAN,
        None,
    )
}

pub fn child_integer_attribute(
    namespace: Option<&str>,
    element: &str,
    name: &str,
) -> FieldDefinition {
    child_attribute_with(
        namespace.map(String::from),
        element.to_string(),
        name.to_string(),
        INTEGER,
        None,
    )
}

pub fn child_float_attribute(
    namespace: Option<&str>,
    element: &str,
    name: &str,
) -> FieldDefinition {
    child_attribute_with(
        namespace.map(String::from),
        element.to_string(),
        name.to_string(),
        FLOAT,
        None,
    )
}

pub fn child_date_attribute(
    namespace: Option<&str>,
    element: &str,
    name: &str,
) -> FieldDefinition {
    child_attribute_with(
        namespace.map(String::from),
        element.to_string(),
        name.to_string(),
        DATE,
        None,
    )
}

//
// Text content
//

fn text_field(codec: Codec, default: Option<Value>) -> FieldDefinition {
    let importer: Importer = {
        let default = default.clone();
        Rc::new(move |xml: &Element, _context: &TranslationContext| {
            let raw = xml.text();
            if raw.is_empty() {
                default.clone()
            } else {
                (codec.parse)(&raw)
            }
        })
    };
    let exporter: Exporter = Rc::new(move |xml: &Element, value: &Value, _context| {
        if value.is_null() {
            return;
        }
        if let Some(output) = (codec.write)(value) {
            xml.append_text(&output);
        }
    });
    FieldDefinition::new(importer, exporter)
}

pub fn text() -> FieldDefinition {
    text_field(STRING, None)
}

pub fn text_default(default: &str) -> FieldDefinition {
    text_field(STRING, Some(Value::String(default.to_string())))
}

fn child_text_field(
    namespace: Option<String>,
    element: String,
    codec: Codec,
    default: Option<Value>,
    match_language: bool,
) -> FieldDefinition {
    let text = text_field(codec, default.clone());
    let importer: Importer = {
        let namespace = namespace.clone();
        let element = element.clone();
        let converter = text.importer.clone();
        Rc::new(move |xml: &Element, context: &TranslationContext| {
            let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
            let children = find_all(xml, &ns, &element, None);
            let target = get_target_lang(&children, context);
            if children.is_empty() {
                return default.clone();
            }
            if match_language {
                for child in &children {
                    if get_lang(child, &context.lang) == target {
                        return converter(child, context);
                    }
                }
            }
            converter(&children[0], context)
        })
    };
    let exporter: Exporter = {
        let converter = text.exporter.clone();
        Rc::new(move |xml: &Element, value: &Value, context: &TranslationContext| {
            if value.is_null() {
                return;
            }
            let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
            let lang = if match_language && !context.lang.is_empty() {
                Some(context.lang.as_str())
            } else {
                None
            };
            let child = find_or_create(xml, &ns, &element, lang);
            converter(&child, value, context);
        })
    };
    FieldDefinition::new(importer, exporter)
}

pub fn child_text(namespace: Option<&str>, element: &str) -> FieldDefinition {
    child_text_field(namespace.map(String::from), element.to_string(), STRING, None, true)
}

pub fn child_text_default(namespace: Option<&str>, element: &str, default: &str) -> FieldDefinition {
    child_text_field(
        namespace.map(String::from),
        element.to_string(),
        STRING,
        Some(Value::String(default.to_string())),
        true,
    )
}

pub fn child_integer(namespace: Option<&str>, element: &str) -> FieldDefinition {
    child_text_field(namespace.map(String::from), element.to_string(), INTEGER, None, false)
}

pub fn child_float(namespace: Option<&str>, element: &str) -> FieldDefinition {
    child_text_field(namespace.map(String::from), element.to_string(), FLOAT, None, false)
}

pub fn child_date(namespace: Option<&str>, element: &str) -> FieldDefinition {
    child_text_field(namespace.map(String::from), element.to_string(), DATE, None, false)
}

/// Presence of the child element maps to `true`.
pub fn child_boolean(namespace: Option<&str>, element: &str) -> FieldDefinition {
    let namespace = namespace.map(String::from);
    let element = element.to_string();
    let importer: Importer = {
        let namespace = namespace.clone();
        let element = element.clone();
        Rc::new(move |xml: &Element, _context: &TranslationContext| {
            let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
            xml.get_child(&element, Some(&ns)).map(|_| Value::Bool(true))
        })
    };
    let exporter: Exporter = Rc::new(move |xml: &Element, value: &Value, _context| {
        if value.as_bool() == Some(true) {
            let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
            find_or_create(xml, &ns, &element, None);
        }
    });
    FieldDefinition::new(importer, exporter)
}

//
// Deep paths
//

fn owned_path(path: &[(Option<&str>, &str)]) -> Vec<(Option<String>, String)> {
    path.iter()
        .map(|(namespace, element)| (namespace.map(String::from), element.to_string()))
        .collect()
}

fn walk_deep(xml: &Element, path: &[(Option<String>, String)]) -> Option<Element> {
    let mut current = xml.clone();
    for (namespace, element) in path {
        let ns = namespace.clone().unwrap_or_else(|| current.namespace());
        current = current.get_child(element, Some(&ns))?;
    }
    Some(current)
}

fn create_deep(xml: &Element, path: &[(Option<String>, String)]) -> Element {
    let mut current = xml.clone();
    for (namespace, element) in path {
        let ns = namespace.clone().unwrap_or_else(|| current.namespace());
        current = find_or_create(&current, &ns, element, None);
    }
    current
}

pub fn deep_child_text(path: &[(Option<&str>, &str)], default: Option<&str>) -> FieldDefinition {
    let path = owned_path(path);
    let default = default.map(|d| Value::String(d.to_string()));
    let importer: Importer = {
        let path = path.clone();
        let default = default.clone();
        Rc::new(move |xml: &Element, _context: &TranslationContext| {
            let target = walk_deep(xml, &path)?;
            let raw = target.text();
            if raw.is_empty() {
                default.clone()
            } else {
                Some(Value::String(raw))
            }
        })
    };
    let exporter: Exporter = Rc::new(move |xml: &Element, value: &Value, _context| {
        let Some(output) = value.as_str().filter(|s| !s.is_empty()) else {
            return;
        };
        create_deep(xml, &path).append_text(output);
    });
    FieldDefinition::new(importer, exporter)
}

pub fn deep_child_integer(path: &[(Option<&str>, &str)], default: Option<i64>) -> FieldDefinition {
    let path = owned_path(path);
    let importer: Importer = {
        let path = path.clone();
        Rc::new(move |xml: &Element, _context: &TranslationContext| {
            let target = walk_deep(xml, &path)?;
            let raw = target.text();
            if raw.is_empty() {
                default.map(Value::from)
            } else {
                parse_integer(&raw)
            }
        })
    };
    let exporter: Exporter = Rc::new(move |xml: &Element, value: &Value, _context| {
        let Some(output) = value.as_i64() else {
            return;
        };
        create_deep(xml, &path).append_text(&output.to_string());
    });
    FieldDefinition::new(importer, exporter)
}

pub fn deep_child_boolean(path: &[(Option<&str>, &str)]) -> FieldDefinition {
    let path = owned_path(path);
    let importer: Importer = {
        let path = path.clone();
        Rc::new(move |xml: &Element, _context: &TranslationContext| {
            Some(Value::Bool(walk_deep(xml, &path).is_some()))
        })
    };
    let exporter: Exporter = Rc::new(move |xml: &Element, value: &Value, _context| {
        if value.as_bool() == Some(true) {
            create_deep(xml, &path);
        }
    });
    FieldDefinition::new(importer, exporter)
}

//
// Enumerations
//

pub fn child_enum(
    namespace: Option<&str>,
    elements: &[&str],
    default: Option<&str>,
) -> FieldDefinition {
    let namespace = namespace.map(String::from);
    let names: HashSet<String> = elements.iter().map(|e| e.to_string()).collect();
    let default = default.map(|d| Value::String(d.to_string()));
    let importer: Importer = {
        let namespace = namespace.clone();
        let names = names.clone();
        Rc::new(move |xml: &Element, _context: &TranslationContext| {
            let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
            for child in xml.child_elements() {
                if child.namespace() == ns && names.contains(&child.local_name()) {
                    return Some(Value::String(child.local_name()));
                }
            }
            default.clone()
        })
    };
    let exporter: Exporter = Rc::new(move |xml: &Element, value: &Value, _context| {
        let Some(name) = value.as_str() else {
            return;
        };
        let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
        find_or_create(xml, &ns, name, None);
    });
    FieldDefinition::new(importer, exporter)
}

/// Child text constrained to a fixed value set, like the presence
/// `show` element. Values outside the set are dropped on both sides.
pub fn child_text_enum(
    namespace: Option<&str>,
    element: &str,
    values: &[&str],
) -> FieldDefinition {
    let allowed: HashSet<String> = values.iter().map(|v| v.to_string()).collect();
    let inner = child_text_field(
        namespace.map(String::from),
        element.to_string(),
        STRING,
        None,
        false,
    );
    let importer: Importer = {
        let allowed = allowed.clone();
        let convert = inner.importer.clone();
        Rc::new(move |xml: &Element, context: &TranslationContext| {
            let value = convert(xml, context)?;
            match value.as_str() {
                Some(text) if allowed.contains(text) => Some(value),
                _ => None,
            }
        })
    };
    let exporter: Exporter = {
        let convert = inner.exporter.clone();
        Rc::new(move |xml: &Element, value: &Value, context: &TranslationContext| {
            if let Some(text) = value.as_str() {
                if allowed.contains(text) {
                    convert(xml, value, context);
                }
            }
        })
    };
    FieldDefinition::new(importer, exporter)
}

/// A two-level enumeration like RFC 6121 error conditions: the value is
/// `[parent]` or `[parent, child]`.
pub fn child_double_enum(
    namespace: Option<&str>,
    parent_elements: &[&str],
    child_elements: &[&str],
) -> FieldDefinition {
    let namespace = namespace.map(String::from);
    let parent_names: HashSet<String> = parent_elements.iter().map(|e| e.to_string()).collect();
    let child_names: HashSet<String> = child_elements.iter().map(|e| e.to_string()).collect();
    let importer: Importer = {
        let namespace = namespace.clone();
        Rc::new(move |xml: &Element, _context: &TranslationContext| {
            let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
            for parent in xml.child_elements() {
                if parent.namespace() != ns || !parent_names.contains(&parent.local_name()) {
                    continue;
                }
                for child in parent.child_elements() {
                    if child.namespace() == ns && child_names.contains(&child.local_name()) {
                        return Some(Value::Array(vec![
                            Value::String(parent.local_name()),
                            Value::String(child.local_name()),
                        ]));
                    }
                }
                return Some(Value::Array(vec![Value::String(parent.local_name())]));
            }
            None
        })
    };
    let exporter: Exporter = Rc::new(move |xml: &Element, value: &Value, _context| {
        let Some(items) = value.as_array() else {
            return;
        };
        let Some(first) = items.first().and_then(Value::as_str) else {
            return;
        };
        let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
        let parent = find_or_create(xml, &ns, first, None);
        if let Some(second) = items.get(1).and_then(Value::as_str) {
            find_or_create(&parent, &ns, second, None);
        }
    });
    FieldDefinition::new(importer, exporter)
}

//
// Repeated children
//

pub fn multiple_child_text(namespace: Option<&str>, element: &str) -> FieldDefinition {
    let namespace = namespace.map(String::from);
    let element = element.to_string();
    let importer: Importer = {
        let namespace = namespace.clone();
        let element = element.clone();
        Rc::new(move |xml: &Element, context: &TranslationContext| {
            let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
            let children = find_all(xml, &ns, &element, None);
            let target = get_target_lang(&children, context);
            let result: Vec<Value> = children
                .iter()
                .filter(|child| get_lang(child, &context.lang) == target)
                .map(|child| Value::String(child.text()))
                .collect();
            Some(Value::Array(result))
        })
    };
    let exporter: Exporter = Rc::new(move |xml: &Element, values: &Value, context| {
        let Some(values) = values.as_array() else {
            return;
        };
        let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
        for value in values {
            let Some(text) = value.as_str() else {
                continue;
            };
            let child = create_element(&ns, &element, context.namespace.as_deref(), Some(xml));
            child.append_text(text);
            xml.append_child(child);
        }
    });
    FieldDefinition::new(importer, exporter)
}

fn multiple_child_attribute_field(
    namespace: Option<String>,
    element: String,
    name: String,
    codec: Codec,
) -> FieldDefinition {
    let importer: Importer = {
        let namespace = namespace.clone();
        let element = element.clone();
        let name = name.clone();
        Rc::new(move |xml: &Element, _context: &TranslationContext| {
            let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
            let result: Vec<Value> = xml
                .get_children(&element, Some(&ns))
                .iter()
                .filter_map(|child| child.attribute(&name))
                .filter_map(|raw| (codec.parse)(&raw))
                .collect();
            Some(Value::Array(result))
        })
    };
    let exporter: Exporter = Rc::new(move |xml: &Element, values: &Value, context| {
        let Some(values) = values.as_array() else {
            return;
        };
        let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
        for value in values {
            let Some(output) = (codec.write)(value) else {
                continue;
            };
            let child = create_element(&ns, &element, context.namespace.as_deref(), Some(xml));
            child.set_attribute(&name, Some(&output));
            xml.append_child(child);
        }
    });
    FieldDefinition::new(importer, exporter)
}

pub fn multiple_child_attribute(
    namespace: Option<&str>,
    element: &str,
    name: &str,
) -> FieldDefinition {
    multiple_child_attribute_field(
        namespace.map(String::from),
        element.to_string(),
        name.to_string(),
        STRING,
    )
}

pub fn multiple_child_integer_attribute(
    namespace: Option<&str>,
    element: &str,
    name: &str,
) -> FieldDefinition {
    multiple_child_attribute_field(
        namespace.map(String::from),
        element.to_string(),
        name.to_string(),
        INTEGER,
    )
}

//
// Alternate language forms
//

pub fn child_alternate_language_text(namespace: Option<&str>, element: &str) -> FieldDefinition {
    let namespace = namespace.map(String::from);
    let element = element.to_string();
    let importer: Importer = {
        let namespace = namespace.clone();
        let element = element.clone();
        Rc::new(move |xml: &Element, context: &TranslationContext| {
            let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
            let mut results = Vec::new();
            let mut seen = HashSet::new();
            for child in find_all(xml, &ns, &element, None) {
                let text = child.text();
                if text.is_empty() {
                    continue;
                }
                let lang = get_lang(&child, &context.lang);
                if !seen.insert(lang.clone()) {
                    continue;
                }
                let mut entry = Map::new();
                entry.insert("lang".to_string(), Value::String(lang));
                entry.insert("value".to_string(), Value::String(text));
                results.push(Value::Object(entry));
            }
            if results.is_empty() {
                None
            } else {
                Some(Value::Array(results))
            }
        })
    };
    let exporter: Exporter = Rc::new(move |xml: &Element, values: &Value, context| {
        let Some(values) = values.as_array() else {
            return;
        };
        let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
        for entry in values {
            let Some(text) = entry.get("value").and_then(Value::as_str).filter(|t| !t.is_empty())
            else {
                continue;
            };
            let lang = entry.get("lang").and_then(Value::as_str).unwrap_or("");
            let child = create_element(&ns, &element, context.namespace.as_deref(), Some(xml));
            if lang != context.lang {
                child.set_attribute("xml:lang", Some(lang));
            }
            child.append_text(text);
            xml.append_child(child);
        }
    });
    FieldDefinition::new(importer, exporter)
}

pub fn multiple_child_alternate_language_text(
    namespace: Option<&str>,
    element: &str,
) -> FieldDefinition {
    let namespace = namespace.map(String::from);
    let element = element.to_string();
    let importer: Importer = {
        let namespace = namespace.clone();
        let element = element.clone();
        Rc::new(move |xml: &Element, context: &TranslationContext| {
            let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
            let mut order: Vec<String> = Vec::new();
            let mut by_lang: std::collections::HashMap<String, Vec<Value>> =
                std::collections::HashMap::new();
            for child in find_all(xml, &ns, &element, None) {
                let text = child.text();
                if text.is_empty() {
                    continue;
                }
                let lang = get_lang(&child, &context.lang);
                if !by_lang.contains_key(&lang) {
                    order.push(lang.clone());
                }
                by_lang.entry(lang).or_default().push(Value::String(text));
            }
            if order.is_empty() {
                return None;
            }
            let results: Vec<Value> = order
                .into_iter()
                .map(|lang| {
                    let values = by_lang.remove(&lang).unwrap_or_default();
                    let mut entry = Map::new();
                    entry.insert("lang".to_string(), Value::String(lang));
                    entry.insert("value".to_string(), Value::Array(values));
                    Value::Object(entry)
                })
                .collect();
            Some(Value::Array(results))
        })
    };
    let exporter: Exporter = Rc::new(move |xml: &Element, values: &Value, context| {
        let Some(values) = values.as_array() else {
            return;
        };
        let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
        for entry in values {
            let lang = entry.get("lang").and_then(Value::as_str).unwrap_or("");
            let Some(texts) = entry.get("value").and_then(Value::as_array) else {
                continue;
            };
            for text in texts.iter().filter_map(Value::as_str) {
                let child = create_element(&ns, &element, context.namespace.as_deref(), Some(xml));
                if lang != context.lang {
                    child.set_attribute("xml:lang", Some(lang));
                }
                child.append_text(text);
                xml.append_child(child);
            }
        }
    });
    FieldDefinition::new(importer, exporter)
}

//
// Structural combinators
//

/// Imports and exports records defined at another registry path, found
/// inside a wrapper child element.
pub fn splice_path(
    namespace: Option<&str>,
    element: &str,
    path: &str,
    multiple: bool,
) -> FieldDefinition {
    let namespace = namespace.map(String::from);
    let element = element.to_string();
    let path = path.to_string();
    let importer: Importer = {
        let namespace = namespace.clone();
        let element = element.clone();
        let path = path.clone();
        Rc::new(move |xml: &Element, context: &TranslationContext| {
            let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
            let child = xml.get_child(&element, Some(&ns))?;
            let mut results = Vec::new();
            for grandchild in child.child_elements() {
                if context.registry.get_import_key(&grandchild).as_deref() == Some(path.as_str()) {
                    if let Some(imported) = context.registry.import(&grandchild) {
                        results.push(imported);
                    }
                }
            }
            if multiple {
                Some(Value::Array(results))
            } else {
                results.into_iter().next()
            }
        })
    };
    let exporter: Exporter = Rc::new(move |xml: &Element, data: &Value, context| {
        let values: Vec<&Value> = match data.as_array() {
            Some(items) => items.iter().collect(),
            None => vec![data],
        };
        let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
        let mut children = Vec::new();
        for value in values {
            let sub_context = TranslationContext {
                registry: context.registry,
                lang: context.lang.clone(),
                accept_languages: context.accept_languages.clone(),
                path: path.clone(),
                path_selector: context.path_selector.clone(),
                namespace: Some(ns.clone()),
                element: context.element.clone(),
            };
            if let Some(child) = context.registry.export_in_context(&path, value, &sub_context) {
                children.push(child);
            }
        }
        if !children.is_empty() {
            let wrapper = find_or_create(xml, &ns, &element, None);
            for child in children {
                wrapper.append_child(child);
            }
        }
    });
    FieldDefinition::new(importer, exporter)
}

/// A set of key/value parameter children, as used by data forms and
/// similar protocols.
pub fn parameter_map(
    namespace: Option<&str>,
    element: &str,
    key_name: &str,
    value_name: &str,
) -> FieldDefinition {
    let namespace = namespace.map(String::from);
    let element = element.to_string();
    let key_name = key_name.to_string();
    let value_name = value_name.to_string();
    let importer: Importer = {
        let namespace = namespace.clone();
        let element = element.clone();
        let key_name = key_name.clone();
        let value_name = value_name.clone();
        Rc::new(move |xml: &Element, _context: &TranslationContext| {
            let mut result = Map::new();
            for param in xml.get_children(&element, namespace.as_deref()) {
                let Some(key) = param.attribute(&key_name) else {
                    continue;
                };
                let value = param
                    .attribute(&value_name)
                    .map(Value::String)
                    .unwrap_or(Value::Null);
                result.insert(key, value);
            }
            Some(Value::Object(result))
        })
    };
    let exporter: Exporter = Rc::new(move |xml: &Element, values: &Value, context| {
        let Some(values) = values.as_object() else {
            return;
        };
        let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
        for (key, value) in values {
            let param = create_element(&ns, &element, context.namespace.as_deref(), Some(xml));
            param.set_attribute(&key_name, Some(key));
            if let Some(value) = value.as_str().filter(|v| !v.is_empty()) {
                param.set_attribute(&value_name, Some(value));
            }
            xml.append_child(param);
        }
    });
    FieldDefinition::new(importer, exporter)
}

/// A constant injected into every imported record; never exported.
pub fn static_value(value: Value) -> FieldDefinition {
    let importer: Importer =
        Rc::new(move |_xml: &Element, _context: &TranslationContext| Some(value.clone()));
    let exporter: Exporter = Rc::new(|_xml: &Element, _value: &Value, _context| {});
    FieldDefinition::new(importer, exporter)
}

//
// Raw subtrees
//

fn wrap_raw_string(raw: &str, namespace: &str, element: &str) -> Option<Value> {
    let wrapped = parse(&format!("<{element} xmlns=\"{namespace}\">{raw}</{element}>")).ok()?;
    Some(wrapped.to_value())
}

fn apply_sanitizer(
    sanitizer: &Option<String>,
    context: &TranslationContext,
    value: Value,
) -> Option<Value> {
    match sanitizer {
        Some(name) => (context.sanitizer(name)?)(&value),
        None => Some(value),
    }
}

/// A child element captured as a JSON tree, optionally passed through a
/// named sanitizer from the registry.
pub fn child_raw_element(
    namespace: Option<&str>,
    element: &str,
    sanitizer: Option<&str>,
) -> FieldDefinition {
    let namespace = namespace.map(String::from);
    let element = element.to_string();
    let sanitizer = sanitizer.map(String::from);
    let importer: Importer = {
        let namespace = namespace.clone();
        let element = element.clone();
        let sanitizer = sanitizer.clone();
        Rc::new(move |xml: &Element, context: &TranslationContext| {
            let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
            let child = xml.get_child(&element, Some(&ns))?;
            apply_sanitizer(&sanitizer, context, child.to_value())
        })
    };
    let exporter: Exporter = Rc::new(move |xml: &Element, value: &Value, context| {
        let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
        let tree = match value.as_str() {
            Some(raw) => match wrap_raw_string(raw, &ns, &element) {
                Some(tree) => tree,
                None => return,
            },
            None => value.clone(),
        };
        let Some(tree) = apply_sanitizer(&sanitizer, context, tree) else {
            return;
        };
        if let Some(child) = Element::from_value(&tree) {
            xml.append_child(child);
        }
    });
    FieldDefinition::new(importer, exporter)
}

/// Like [child_raw_element], but selects among language-tagged
/// alternatives on import and tags the created child on export.
pub fn child_language_raw_element(
    namespace: Option<&str>,
    element: &str,
    sanitizer: Option<&str>,
) -> FieldDefinition {
    let namespace = namespace.map(String::from);
    let element = element.to_string();
    let sanitizer = sanitizer.map(String::from);
    let importer: Importer = {
        let namespace = namespace.clone();
        let element = element.clone();
        let sanitizer = sanitizer.clone();
        Rc::new(move |xml: &Element, context: &TranslationContext| {
            let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
            let children = find_all(xml, &ns, &element, None);
            let target = get_target_lang(&children, context);
            for child in &children {
                if get_lang(child, &context.lang) == target {
                    return apply_sanitizer(&sanitizer, context, child.to_value());
                }
            }
            let first = children.first()?;
            apply_sanitizer(&sanitizer, context, first.to_value())
        })
    };
    let exporter: Exporter = Rc::new(move |xml: &Element, value: &Value, context| {
        let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
        let tree = match value.as_str() {
            Some(raw) => match wrap_raw_string(raw, &ns, &element) {
                Some(tree) => tree,
                None => return,
            },
            None => value.clone(),
        };
        let Some(tree) = apply_sanitizer(&sanitizer, context, tree) else {
            return;
        };
        let lang = if context.lang.is_empty() {
            None
        } else {
            Some(context.lang.as_str())
        };
        let raw_element = find_or_create(xml, &ns, &element, lang);
        append_tree_children(&raw_element, &tree);
    });
    FieldDefinition::new(importer, exporter)
}

/// Raw subtree alternatives indexed by language.
pub fn child_alternate_language_raw_element(
    namespace: Option<&str>,
    element: &str,
    sanitizer: Option<&str>,
) -> FieldDefinition {
    let namespace = namespace.map(String::from);
    let element = element.to_string();
    let sanitizer = sanitizer.map(String::from);
    let importer: Importer = {
        let namespace = namespace.clone();
        let element = element.clone();
        let sanitizer = sanitizer.clone();
        Rc::new(move |xml: &Element, context: &TranslationContext| {
            let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
            let mut results = Vec::new();
            let mut seen = HashSet::new();
            for child in find_all(xml, &ns, &element, None) {
                let Some(tree) = apply_sanitizer(&sanitizer, context, child.to_value()) else {
                    continue;
                };
                let lang = get_lang(&child, &context.lang);
                if !seen.insert(lang.clone()) {
                    continue;
                }
                let mut entry = Map::new();
                entry.insert("lang".to_string(), Value::String(lang));
                entry.insert("value".to_string(), tree);
                results.push(Value::Object(entry));
            }
            if results.is_empty() {
                None
            } else {
                Some(Value::Array(results))
            }
        })
    };
    let exporter: Exporter = Rc::new(move |xml: &Element, values: &Value, context| {
        let Some(values) = values.as_array() else {
            return;
        };
        let ns = namespace.clone().unwrap_or_else(|| xml.namespace());
        for entry in values {
            let lang = entry.get("lang").and_then(Value::as_str).unwrap_or("");
            let Some(raw) = entry.get("value") else {
                continue;
            };
            let tree = match raw.as_str() {
                Some(raw) => match wrap_raw_string(raw, &ns, &element) {
                    Some(tree) => tree,
                    None => continue,
                },
                None => raw.clone(),
            };
            let Some(tree) = apply_sanitizer(&sanitizer, context, tree) else {
                continue;
            };
            let raw_element = create_element(&ns, &element, context.namespace.as_deref(), Some(xml));
            xml.append_child(raw_element.clone());
            if lang != context.lang {
                raw_element.set_attribute("xml:lang", Some(lang));
            }
            append_tree_children(&raw_element, &tree);
        }
    });
    FieldDefinition::new(importer, exporter)
}

// Appends the children of a JSON element tree, skipping its wrapper.
fn append_tree_children(target: &Element, tree: &Value) {
    let Some(children) = tree.get("children").and_then(Value::as_array) else {
        return;
    };
    for child in children {
        match child {
            Value::String(text) => target.append_text(text),
            Value::Object(_) => {
                if let Some(el) = Element::from_value(child) {
                    target.append_child(el);
                }
            }
            _ => {}
        }
    }
}
