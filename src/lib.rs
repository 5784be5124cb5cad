//! Streaming XML plumbing for XMPP clients.
//!
//! The crate has three layers. [parser] turns incoming bytes into
//! events or [element](crate::element) trees without ever needing a
//! complete document, which is what an XMPP stream requires. [jxt]
//! translates between element trees and JSON records through a
//! declarative schema registry. [sm] implements the XEP-0198
//! acknowledgement counters and resumption queue on top of whatever
//! session loop the caller runs.
//!
//! The `xmpp` feature adds address handling, SASL mechanisms, and
//! ready-made schema definitions for the core client protocol.

pub mod element;
pub mod entities;
pub mod jxt;
pub mod parser;
pub mod sm;
#[cfg(feature = "xmpp")]
pub mod xmpp;

pub use element::Child;
pub use element::Element;
pub use element::XML_NS;
pub use jxt::Definition;
pub use jxt::FieldDefinition;
pub use jxt::LinkPath;
pub use jxt::Registry;
pub use jxt::TranslationContext;
pub use jxt::TranslationOptions;
pub use parser::ParseError;
pub use parser::Parser;
pub use parser::ParserEvent;
pub use parser::ParserHandler;
pub use parser::ParserOptions;
pub use parser::TreeBuilder;
pub use parser::parse;
pub use sm::SmHandler;
pub use sm::SmPayload;
pub use sm::SmState;
pub use sm::StanzaKind;
pub use sm::StreamManagement;
#[cfg(feature = "xmpp")]
pub use xmpp::Jid;
