use super::*;

use crate::parser::parse;

#[test]
fn builds_and_serializes() {
    let message = Element::new("message");
    message.set_attribute("to", Some("juliet@example.com"));
    let body = message.append_child(Element::new("body"));
    body.append_text("hi ");
    body.append_text("there");
    message.append_child(Element::new("thread"));
    assert_eq!(
        message.to_string(),
        r#"<message to="juliet@example.com"><body>hi there</body><thread/></message>"#
    );
    assert_eq!(body.text(), "hi there");
    assert!(body.parent().unwrap().same_node(&message));
}

#[test]
fn serialization_escapes() {
    let el = Element::new("a");
    el.set_attribute("b", Some("\"x\" & y"));
    el.append_text("1 < 2");
    assert_eq!(el.to_string(), r#"<a b="&quot;x&quot; &amp; y">1 &lt; 2</a>"#);
}

#[test]
fn attribute_removal() {
    let el = Element::new("a");
    el.set_attribute("b", Some("1"));
    el.set_attribute("b", Some("2"));
    assert_eq!(el.attribute("b").as_deref(), Some("2"));
    el.set_attribute("b", None);
    assert_eq!(el.attribute("b"), None);
    el.set_attribute("c", Some(""));
    assert_eq!(el.attribute("c"), None);
    el.set_attribute_emit_empty("c", "");
    assert_eq!(el.attribute("c").as_deref(), Some(""));
}

#[test]
fn namespace_resolution() {
    let root = parse(
        r#"<stream:stream xmlns="jabber:client" xmlns:stream="http://etherx.jabber.org/streams"><message><body/></message></stream:stream>"#,
    )
    .unwrap();
    assert_eq!(root.namespace(), "http://etherx.jabber.org/streams");
    assert_eq!(root.local_name(), "stream");
    let message = root.get_child("message", None).unwrap();
    assert_eq!(message.namespace(), "jabber:client");
    // The default namespace is inherited through the whole chain.
    let body = message.get_child("body", Some("jabber:client")).unwrap();
    assert_eq!(body.namespace(), "jabber:client");
}

#[test]
fn namespaced_attributes() {
    let root = parse(r#"<a xmlns:x="urn:test"><b x:k="v" xml:lang="en"/></a>"#).unwrap();
    let b = root.get_child("b", None).unwrap();
    assert_eq!(b.namespaced_attribute("urn:test", "k").as_deref(), Some("v"));
    assert_eq!(b.namespaced_attribute("urn:missing", "k"), None);
    assert_eq!(b.namespaced_attribute(XML_NS, "lang").as_deref(), Some("en"));
}

#[test]
fn prefix_allocation() {
    let root = Element::new("root");
    root.set_attribute("xmlns:p", Some("urn:one"));
    let child = root.append_child(Element::new("child"));
    // An in-scope declaration is reused.
    assert_eq!(child.use_namespace("q", "urn:one"), "p");
    // A new declaration lands on the requesting element.
    assert_eq!(child.use_namespace("q", "urn:two"), "q");
    assert_eq!(child.attribute("xmlns:q").as_deref(), Some("urn:two"));
    // With no requested prefix an optional registration wins.
    child.add_optional_namespace("opt", "urn:three");
    assert_eq!(child.use_namespace("", "urn:three"), "opt");
    assert!(root.namespace_root("urn:three").is_none());
    assert!(child.namespace_root("urn:two").unwrap().same_node(&child));
}

#[test]
fn value_round_trip() {
    let root = parse(r#"<a b="1">x<c/>y</a>"#).unwrap();
    let value = root.to_value();
    assert_eq!(value["name"], "a");
    assert_eq!(value["attributes"]["b"], "1");
    assert_eq!(value["children"][0], "x");
    let rebuilt = Element::from_value(&value).unwrap();
    assert_eq!(rebuilt, root);
}

#[test]
fn structural_equality() {
    let a = parse(r#"<a x="1" y="2"><b/>t</a>"#).unwrap();
    let b = parse(r#"<a y="2" x="1"><b/>t</a>"#).unwrap();
    let c = parse(r#"<a y="2" x="1"><b/>u</a>"#).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(!a.same_node(&b));
}
