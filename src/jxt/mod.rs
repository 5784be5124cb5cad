//! The translation engine between XML elements and JSON records.
//!
//! A [Registry] holds a tree of translators built from declarative
//! [Definition]s. Each definition binds one `(namespace, element)` pair
//! to a path in the record tree and a set of field combinators from
//! [types]. Importing walks an element tree and produces a
//! [serde_json::Value] record; exporting rebuilds the XML.

mod context;
mod registry;
mod sanitizer;
mod translator;
pub mod types;

pub use context::TranslationContext;
pub use context::TranslationOptions;
pub use context::basic_language_resolver;
pub use registry::Definition;
pub use registry::LanguageResolver;
pub use registry::LinkPath;
pub use registry::Registry;
pub use registry::Sanitizer;
pub use sanitizer::xhtml_im;
pub use translator::Exporter;
pub use translator::FieldDefinition;
pub use translator::Importer;
pub use translator::TranslatorId;
pub use translator::XName;

#[cfg(test)]
mod tests;
