//! XMPP client plumbing built on the parser and the translation
//! engine: addresses, SASL mechanisms, and the core protocol schema.

pub mod jid;
pub mod protocol;
pub mod sasl;

pub use jid::Jid;
pub use jid::JidError;
pub use sasl::Anonymous;
pub use sasl::Credentials;
pub use sasl::Mechanism;
pub use sasl::Plain;
pub use sasl::choose_mechanism;
