//! Sanitizers for raw subtrees. Operates on the JSON tree form of
//! elements so translators can run untrusted markup through a named
//! policy during both import and export.

use serde_json::Map;
use serde_json::Value;

const ALLOWED_ELEMENTS: &[&str] = &[
    "a",
    "blockquote",
    "br",
    "cite",
    "em",
    "img",
    "li",
    "ol",
    "p",
    "span",
    "strong",
    "ul",
];

const ALLOWED_SCHEMES: &[&str] = &[
    "bitcoin", "cid", "ftp", "ftps", "geo", "http", "https", "im", "irc", "ircs", "magnet",
    "mailto", "sips", "sip", "tel", "xmpp",
];

const ALLOWED_CSS: &[(&str, &[&str])] = &[
    ("font-style", &["normal", "italic", "oblique", "inherit"]),
    (
        "font-weight",
        &["normal", "bold", "bolder", "lighter", "inherit"],
    ),
    (
        "text-decoration",
        &[
            "none",
            "underline",
            "overline",
            "line-through",
            "blink",
            "inherit",
        ],
    ),
];

fn local_name(tree: &Value) -> Option<String> {
    let name = tree.get("name")?.as_str()?;
    Some(match name.split_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.to_string(),
    })
}

fn tree_attribute<'a>(tree: &'a Value, name: &str) -> Option<&'a str> {
    tree.get("attributes")?.get(name)?.as_str()
}

fn sanitize_url(raw: &str) -> Option<String> {
    let scheme = raw.split(':').next()?.to_lowercase();
    if ALLOWED_SCHEMES.contains(&scheme.as_str()) {
        Some(raw.to_string())
    } else {
        None
    }
}

fn sanitize_size(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() { None } else { Some(digits) }
}

fn sanitize_css(raw: &str) -> Option<String> {
    // Strip comments before splitting declarations.
    let mut stripped = String::new();
    let mut rest = raw;
    while let Some(start) = rest.find("/*") {
        stripped.push_str(&rest[..start]);
        match rest[start..].find("*/") {
            Some(end) => rest = &rest[start + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
    }
    stripped.push_str(rest);

    let mut kept = Vec::new();
    for declaration in stripped.split(';') {
        let Some((property, value)) = declaration.split_once(':') else {
            continue;
        };
        let property = property.trim().to_lowercase();
        let value = value.trim().to_lowercase();
        let Some((_, allowed)) = ALLOWED_CSS.iter().find(|(name, _)| *name == property) else {
            continue;
        };
        let valid = allowed.contains(&value.as_str())
            || (property == "font-weight"
                && value.len() == 3
                && value.chars().all(|c| c.is_ascii_digit()));
        if valid {
            kept.push(format!("{property}:{value}"));
        }
    }
    if kept.is_empty() {
        None
    } else {
        Some(kept.join(";"))
    }
}

fn sanitize_attribute(name: &str, value: &str) -> Option<String> {
    match name {
        "alt" => Some(value.to_string()),
        "href" | "src" => sanitize_url(value),
        "height" | "width" => sanitize_size(value),
        "style" => sanitize_css(value),
        _ => None,
    }
}

fn allowed_attributes(element: &str) -> &'static [&'static str] {
    match element {
        "a" => &["href", "style"],
        "img" => &["alt", "height", "src", "style", "width"],
        _ => &["style"],
    }
}

// Sanitizes one interior node, returning the nodes that replace it.
// Disallowed wrappers are spliced out, keeping their children.
fn sanitize_interior(tree: &Value) -> Vec<Value> {
    if tree.is_string() {
        return vec![tree.clone()];
    }
    let Some(name) = local_name(tree) else {
        return Vec::new();
    };
    let children: Vec<Value> = tree
        .get("children")
        .and_then(Value::as_array)
        .map(|children| children.iter().flat_map(sanitize_interior).collect())
        .unwrap_or_default();
    if !ALLOWED_ELEMENTS.contains(&name.as_str()) {
        if name == "script" {
            return Vec::new();
        }
        return children;
    }
    let mut attributes = Map::new();
    for allowed in allowed_attributes(&name) {
        if let Some(raw) = tree_attribute(tree, allowed) {
            if let Some(clean) = sanitize_attribute(allowed, raw) {
                attributes.insert(allowed.to_string(), Value::String(clean));
            }
        }
    }
    let mut result = Map::new();
    result.insert("name".to_string(), Value::String(name));
    result.insert("attributes".to_string(), Value::Object(attributes));
    result.insert("children".to_string(), Value::Array(children));
    vec![Value::Object(result)]
}

/// The XEP-0071 XHTML-IM content policy. The input must be a `body`
/// element tree; anything outside the allowed element and attribute
/// sets is stripped or spliced away.
pub fn xhtml_im(input: &Value) -> Option<Value> {
    if local_name(input)? != "body" {
        return None;
    }
    let mut attributes = Map::new();
    for name in ["xmlns", "style", "xml:lang"] {
        if let Some(value) = tree_attribute(input, name) {
            attributes.insert(name.to_string(), Value::String(value.to_string()));
        }
    }
    let children: Vec<Value> = input
        .get("children")
        .and_then(Value::as_array)
        .map(|children| children.iter().flat_map(sanitize_interior).collect())
        .unwrap_or_default();
    let mut result = Map::new();
    result.insert("name".to_string(), Value::String("body".to_string()));
    result.insert("attributes".to_string(), Value::Object(attributes));
    result.insert("children".to_string(), Value::Array(children));
    Some(Value::Object(result))
}
