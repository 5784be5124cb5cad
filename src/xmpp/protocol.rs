//! Schema definitions for the core client stanzas and the stream
//! management elements.

use serde_json::Value;
use serde_json::json;

use crate::jxt::Definition;
use crate::jxt::types;
use crate::sm::SmPayload;

pub const CLIENT_NS: &str = "jabber:client";
pub const SM_NS: &str = "urn:xmpp:sm:3";
pub const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";
pub const XHTML_IM_NS: &str = "http://jabber.org/protocol/xhtml-im";

/// The RFC 6120 client stanzas: message, presence, and iq.
pub fn stanza_definitions() -> Vec<Definition> {
    vec![
        Definition {
            namespace: CLIENT_NS.to_string(),
            element: "message".to_string(),
            path: "message".to_string(),
            fields: vec![
                ("lang".to_string(), types::language_attribute()),
                ("to".to_string(), types::attribute("to")),
                ("from".to_string(), types::attribute("from")),
                ("id".to_string(), types::attribute("id")),
                ("type".to_string(), types::attribute_default("type", "normal")),
                ("body".to_string(), types::child_text(None, "body")),
                ("subject".to_string(), types::child_text(None, "subject")),
                ("thread".to_string(), types::child_text(None, "thread")),
                (
                    "html".to_string(),
                    types::child_raw_element(Some(XHTML_NS), "body", Some("xhtmlim")),
                ),
            ],
            ..Definition::default()
        },
        Definition {
            namespace: CLIENT_NS.to_string(),
            element: "presence".to_string(),
            path: "presence".to_string(),
            fields: vec![
                ("lang".to_string(), types::language_attribute()),
                ("to".to_string(), types::attribute("to")),
                ("from".to_string(), types::attribute("from")),
                ("id".to_string(), types::attribute("id")),
                ("type".to_string(), types::attribute("type")),
                (
                    "show".to_string(),
                    types::child_text_enum(None, "show", &["away", "chat", "dnd", "xa"])
                        .with_export_order(1),
                ),
                (
                    "status".to_string(),
                    types::child_text(None, "status").with_export_order(2),
                ),
                (
                    "priority".to_string(),
                    types::child_integer(None, "priority").with_export_order(3),
                ),
            ],
            ..Definition::default()
        },
        Definition {
            namespace: CLIENT_NS.to_string(),
            element: "iq".to_string(),
            path: "iq".to_string(),
            fields: vec![
                ("lang".to_string(), types::language_attribute()),
                ("to".to_string(), types::attribute("to")),
                ("from".to_string(), types::attribute("from")),
                ("id".to_string(), types::attribute("id")),
                ("type".to_string(), types::attribute("type")),
            ],
            ..Definition::default()
        },
    ]
}

/// The XEP-0198 negotiation and acknowledgement elements.
pub fn stream_management_definitions() -> Vec<Definition> {
    vec![
        Definition {
            namespace: SM_NS.to_string(),
            element: "enable".to_string(),
            path: "enable".to_string(),
            fields: vec![("resume".to_string(), types::boolean_attribute("resume"))],
            ..Definition::default()
        },
        Definition {
            namespace: SM_NS.to_string(),
            element: "enabled".to_string(),
            path: "enabled".to_string(),
            fields: vec![
                ("id".to_string(), types::attribute("id")),
                ("resume".to_string(), types::boolean_attribute("resume")),
                ("max".to_string(), types::integer_attribute("max")),
                ("location".to_string(), types::attribute("location")),
            ],
            ..Definition::default()
        },
        Definition {
            namespace: SM_NS.to_string(),
            element: "resume".to_string(),
            path: "resume".to_string(),
            fields: vec![
                ("h".to_string(), types::integer_attribute("h")),
                ("previd".to_string(), types::attribute("previd")),
            ],
            ..Definition::default()
        },
        Definition {
            namespace: SM_NS.to_string(),
            element: "resumed".to_string(),
            path: "resumed".to_string(),
            fields: vec![
                ("h".to_string(), types::integer_attribute("h")),
                ("previd".to_string(), types::attribute("previd")),
            ],
            ..Definition::default()
        },
        Definition {
            namespace: SM_NS.to_string(),
            element: "failed".to_string(),
            path: "failed".to_string(),
            fields: vec![("h".to_string(), types::integer_attribute("h"))],
            ..Definition::default()
        },
        Definition {
            namespace: SM_NS.to_string(),
            element: "a".to_string(),
            path: "ack".to_string(),
            fields: vec![("h".to_string(), types::integer_attribute("h"))],
            ..Definition::default()
        },
        Definition {
            namespace: SM_NS.to_string(),
            element: "r".to_string(),
            path: "request".to_string(),
            ..Definition::default()
        },
    ]
}

/// Maps an outbound control payload to the export path and record for
/// the registry.
pub fn sm_payload_record(payload: &SmPayload) -> (&'static str, Value) {
    match payload {
        SmPayload::Enable { allow_resumption } => ("enable", json!({ "resume": allow_resumption })),
        SmPayload::Resume {
            handled,
            previous_session,
        } => ("resume", json!({ "h": handled, "previd": previous_session })),
        SmPayload::Ack { handled } => ("ack", json!({ "h": handled })),
        SmPayload::Request => ("request", json!({})),
    }
}
