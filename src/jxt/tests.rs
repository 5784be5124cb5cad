use serde_json::json;

use crate::parser::parse;

use super::Definition;
use super::LinkPath;
use super::Registry;
use super::TranslationOptions;
use super::types;
use super::xhtml_im;

fn message_definition() -> Definition {
    Definition {
        namespace: "jabber:client".to_string(),
        element: "message".to_string(),
        path: "message".to_string(),
        fields: vec![
            ("to".to_string(), types::attribute("to")),
            ("id".to_string(), types::attribute("id")),
            ("body".to_string(), types::child_text(None, "body")),
        ],
        ..Definition::default()
    }
}

#[test]
fn imports_and_exports_a_message() {
    let mut registry = Registry::new();
    registry.define(message_definition());

    let xml = parse("<message xmlns=\"jabber:client\" to=\"a@b\"><body>hi</body></message>")
        .unwrap();
    let imported = registry.import(&xml).unwrap();
    assert_eq!(imported, json!({"to": "a@b", "body": "hi"}));

    let exported = registry.export("message", &imported).unwrap();
    assert_eq!(exported, xml);
}

#[test]
fn unknown_elements_do_not_import() {
    let registry = Registry::new();
    let xml = parse("<message xmlns=\"jabber:client\"/>").unwrap();
    assert_eq!(registry.import(&xml), None);
    assert_eq!(registry.get_import_key(&xml), None);
}

#[test]
fn placeholder_parents_are_vivified_and_reused() {
    let mut registry = Registry::new();
    // The child arrives before its parent exists.
    registry.define(Definition {
        namespace: "urn:xmpp:delay".to_string(),
        element: "delay".to_string(),
        path: "message.delay".to_string(),
        fields: vec![
            ("from".to_string(), types::attribute("from")),
            ("stamp".to_string(), types::attribute("stamp")),
        ],
        ..Definition::default()
    });
    registry.define(message_definition());

    let xml = parse(concat!(
        "<message xmlns=\"jabber:client\">",
        "<delay xmlns=\"urn:xmpp:delay\" stamp=\"2020-01-01T00:00:00Z\"/>",
        "<body>hi</body>",
        "</message>",
    ))
    .unwrap();
    let imported = registry.import(&xml).unwrap();
    assert_eq!(
        imported,
        json!({
            "body": "hi",
            "delay": {"stamp": "2020-01-01T00:00:00Z"},
        })
    );

    let exported = registry.export("message", &imported).unwrap();
    assert_eq!(registry.import(&exported).unwrap(), imported);
}

#[test]
fn repeated_children_collect_into_arrays() {
    let mut registry = Registry::new();
    registry.define(Definition {
        namespace: "test:roster".to_string(),
        element: "roster".to_string(),
        path: "roster".to_string(),
        ..Definition::default()
    });
    registry.define(Definition {
        namespace: "test:roster".to_string(),
        element: "item".to_string(),
        aliases: vec![LinkPath::multiple("roster.items")],
        fields: vec![("jid".to_string(), types::attribute("jid"))],
        ..Definition::default()
    });

    let xml = parse(concat!(
        "<roster xmlns=\"test:roster\">",
        "<item jid=\"a@b\"/>",
        "<item jid=\"c@d\"/>",
        "</roster>",
    ))
    .unwrap();
    let imported = registry.import(&xml).unwrap();
    assert_eq!(
        imported,
        json!({"items": [{"jid": "a@b"}, {"jid": "c@d"}]})
    );

    let exported = registry.export("roster", &imported).unwrap();
    assert_eq!(exported, xml);
}

#[test]
fn sibling_collisions_resolve_by_type_order() {
    let mut registry = Registry::new();
    registry.define(Definition {
        namespace: "test:col".to_string(),
        element: "root".to_string(),
        path: "root".to_string(),
        ..Definition::default()
    });
    registry.define(Definition {
        namespace: "test:col".to_string(),
        element: "a".to_string(),
        path: "root.item".to_string(),
        type_field: "kind".to_string(),
        default_type: "a".to_string(),
        type_value: "a".to_string(),
        type_order: Some(1),
        ..Definition::default()
    });
    registry.define(Definition {
        namespace: "test:col".to_string(),
        element: "b".to_string(),
        path: "root.item".to_string(),
        type_value: "b".to_string(),
        type_order: Some(2),
        ..Definition::default()
    });

    // The lower-ordered type wins regardless of document order.
    for doc in [
        "<root xmlns=\"test:col\"><a/><b/></root>",
        "<root xmlns=\"test:col\"><b/><a/></root>",
    ] {
        let xml = parse(doc).unwrap();
        let imported = registry.import(&xml).unwrap();
        assert_eq!(imported, json!({"item": {}}), "{doc}");
    }
}

#[test]
fn implied_types_select_export_variations() {
    let mut registry = Registry::new();
    registry.define(Definition {
        namespace: "test:imp".to_string(),
        element: "root".to_string(),
        path: "root".to_string(),
        ..Definition::default()
    });
    registry.define(Definition {
        namespace: "test:imp".to_string(),
        element: "item".to_string(),
        path: "root.item".to_string(),
        type_field: "kind".to_string(),
        default_type: "normal".to_string(),
        type_value: "normal".to_string(),
        ..Definition::default()
    });
    registry.define(Definition {
        namespace: "test:imp".to_string(),
        element: "special".to_string(),
        path: "root.item".to_string(),
        type_value: "special".to_string(),
        aliases: vec![LinkPath {
            path: "root.special".to_string(),
            implied_type: true,
            ..LinkPath::default()
        }],
        ..Definition::default()
    });

    // The explicit type field picks the variation.
    let exported = registry.export("root.item", &json!({"kind": "special"})).unwrap();
    assert_eq!(exported.name(), "special");
    let exported = registry.export("root.item", &json!({})).unwrap();
    assert_eq!(exported.name(), "item");

    // At the implied path no type field is needed.
    let exported = registry.export("root.special", &json!({})).unwrap();
    assert_eq!(exported.name(), "special");

    // The implied alias claims the element on import, and the record
    // carries no redundant type field there.
    let xml = parse("<root xmlns=\"test:imp\"><special/></root>").unwrap();
    let imported = registry.import(&xml).unwrap();
    assert_eq!(imported, json!({"special": {}}));

    let xml = parse("<root xmlns=\"test:imp\"><item/></root>").unwrap();
    let imported = registry.import(&xml).unwrap();
    assert_eq!(imported, json!({"item": {}}));
}

#[test]
fn typed_imports_record_nondefault_types() {
    let mut registry = Registry::new();
    registry.define(Definition {
        namespace: "test:typ".to_string(),
        element: "root".to_string(),
        path: "root".to_string(),
        ..Definition::default()
    });
    registry.define(Definition {
        namespace: "test:typ".to_string(),
        element: "item".to_string(),
        path: "root.item".to_string(),
        type_field: "kind".to_string(),
        default_type: "normal".to_string(),
        type_value: "normal".to_string(),
        ..Definition::default()
    });
    registry.define(Definition {
        namespace: "test:typ".to_string(),
        element: "special".to_string(),
        path: "root.item".to_string(),
        type_value: "special".to_string(),
        ..Definition::default()
    });

    let xml = parse("<root xmlns=\"test:typ\"><special/></root>").unwrap();
    assert_eq!(registry.import(&xml).unwrap(), json!({"item": {"kind": "special"}}));

    let xml = parse("<root xmlns=\"test:typ\"><item/></root>").unwrap();
    assert_eq!(registry.import(&xml).unwrap(), json!({"item": {}}));
}

#[test]
fn language_selection_follows_accept_languages() {
    let mut registry = Registry::new();
    registry.define(Definition {
        namespace: "jabber:client".to_string(),
        element: "message".to_string(),
        path: "message".to_string(),
        fields: vec![
            ("lang".to_string(), types::language_attribute()),
            ("body".to_string(), types::child_text(None, "body")),
        ],
        ..Definition::default()
    });

    let xml = parse(concat!(
        "<message xmlns=\"jabber:client\" xml:lang=\"en\">",
        "<body>hello</body>",
        "<body xml:lang=\"de\">hallo</body>",
        "</message>",
    ))
    .unwrap();

    let imported = registry.import(&xml).unwrap();
    assert_eq!(imported, json!({"lang": "en", "body": "hello"}));

    let options = TranslationOptions {
        accept_languages: vec!["de".to_string()],
        ..TranslationOptions::default()
    };
    let imported = registry.import_with(&xml, &options).unwrap();
    assert_eq!(imported, json!({"lang": "en", "body": "hallo"}));

    // Exporting tags the element when its language differs from the
    // stream language.
    let options = TranslationOptions {
        lang: Some("en".to_string()),
        ..TranslationOptions::default()
    };
    let exported = registry
        .export_with("message", &json!({"lang": "de", "body": "hallo"}), &options)
        .unwrap();
    assert_eq!(exported.attribute("xml:lang").as_deref(), Some("de"));
    let body = exported.get_child("body", None).unwrap();
    assert_eq!(body.attribute("xml:lang"), None);
    assert_eq!(body.text(), "hallo");
}

#[test]
fn raw_elements_pass_through_named_sanitizers() {
    const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";
    let mut registry = Registry::new();
    registry.define(Definition {
        namespace: "jabber:client".to_string(),
        element: "message".to_string(),
        path: "message".to_string(),
        fields: vec![(
            "html".to_string(),
            types::child_raw_element(Some(XHTML_NS), "body", Some("xhtmlim")),
        )],
        ..Definition::default()
    });

    let xml = parse(concat!(
        "<message xmlns=\"jabber:client\">",
        "<body xmlns=\"http://www.w3.org/1999/xhtml\">",
        "<p>hi<script>evil()</script></p>",
        "<font size=\"7\">big</font>",
        "</body>",
        "</message>",
    ))
    .unwrap();
    let imported = registry.import(&xml).unwrap();
    let body = &imported["html"];
    let children = body["children"].as_array().unwrap();
    // script is dropped, the unknown font wrapper is spliced away.
    assert_eq!(children.len(), 2);
    assert_eq!(children[0]["name"], "p");
    assert_eq!(children[0]["children"], json!(["hi"]));
    assert_eq!(children[1], json!("big"));
}

#[test]
fn xhtml_sanitizer_filters_attributes() {
    let xml = parse(concat!(
        "<body xmlns=\"http://www.w3.org/1999/xhtml\">",
        "<a href=\"javascript:alert(1)\" style=\"font-weight:bold\">x</a>",
        "<img src=\"https://example.org/i.png\" width=\"10px\" onload=\"evil()\"/>",
        "</body>",
    ))
    .unwrap();
    let clean = xhtml_im(&xml.to_value()).unwrap();
    let children = clean["children"].as_array().unwrap();

    let link = &children[0];
    assert_eq!(link["attributes"].get("href"), None);
    assert_eq!(link["attributes"]["style"], "font-weight:bold");

    let image = &children[1];
    assert_eq!(image["attributes"]["src"], "https://example.org/i.png");
    assert_eq!(image["attributes"]["width"], "10");
    assert_eq!(image["attributes"].get("onload"), None);
}

#[test]
fn splice_paths_reuse_definitions_inside_wrappers() {
    let mut registry = Registry::new();
    registry.define(message_definition());
    registry.define(Definition {
        namespace: "urn:xmpp:forward:0".to_string(),
        element: "forwarded".to_string(),
        path: "message.forwarded".to_string(),
        fields: vec![(
            "message".to_string(),
            types::splice_path(None, "forwarded", "message", false),
        )],
        ..Definition::default()
    });

    // The spliced importer runs against the wrapper's parent element.
    let xml = parse(concat!(
        "<message xmlns=\"jabber:client\">",
        "<forwarded xmlns=\"urn:xmpp:forward:0\">",
        "<forwarded>",
        "<message xmlns=\"jabber:client\" to=\"a@b\"><body>inner</body></message>",
        "</forwarded>",
        "</forwarded>",
        "</message>",
    ))
    .unwrap();
    let imported = registry.import(&xml).unwrap();
    assert_eq!(
        imported["forwarded"]["message"],
        json!({"to": "a@b", "body": "inner"})
    );
}

#[test]
fn custom_language_resolvers_are_honored() {
    let mut registry = Registry::new();
    registry.set_language_resolver(|available, _accept, _current| {
        available.last().cloned().unwrap_or_default()
    });
    registry.define(Definition {
        namespace: "jabber:client".to_string(),
        element: "message".to_string(),
        path: "message".to_string(),
        fields: vec![("body".to_string(), types::child_text(None, "body"))],
        ..Definition::default()
    });

    let xml = parse(concat!(
        "<message xmlns=\"jabber:client\">",
        "<body xml:lang=\"en\">hello</body>",
        "<body xml:lang=\"de\">hallo</body>",
        "</message>",
    ))
    .unwrap();
    let imported = registry.import(&xml).unwrap();
    assert_eq!(imported, json!({"body": "hallo"}));
}
