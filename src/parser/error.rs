use std::error::Error;
use std::fmt::Display;

use crate::entities::EntityError;

/// Messages carried by [ParseError](crate::ParseError) values.
pub mod description {
    pub const INVALID_TAG_NAME: &str = "invalid character in tag name";
    pub const INVALID_MARKUP: &str = "unrecognized markup declaration";
    pub const INVALID_ATTRIBUTE_NAME: &str = "invalid character in attribute name";
    pub const ATTRIBUTE_WITHOUT_VALUE: &str = "attribute without a value";
    pub const UNQUOTED_ATTRIBUTE: &str = "attribute value must be quoted";
    pub const DUPLICATE_ATTRIBUTE: &str = "attribute appears more than once";
    pub const INVALID_END_TAG: &str = "unexpected character in end tag";
    pub const UNEXPECTED_END: &str = "input ended inside markup";
    pub const TAG_MISMATCH: &str = "end tag does not match the open element";
    pub const UNEXPECTED_END_TAG: &str = "end tag without an open element";
    pub const MULTIPLE_ROOTS: &str = "content after the root element";
    pub const MISSING_ROOT: &str = "no root element";
    pub const UNCLOSED_ELEMENT: &str = "input ended before the root element was closed";
    pub const COMMENTS_NOT_ALLOWED: &str = "comments are not allowed";
    pub const PROCESSING_INSTRUCTION: &str = "processing instructions are not allowed";
    pub const DUPLICATE_DECLARATION: &str = "multiple xml declarations";
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ParseError {
    /// Markup that can never be valid XML.
    NotWellFormed(&'static str),
    /// Markup that is valid XML but not accepted on a stanza stream.
    RestrictedXml(&'static str),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::NotWellFormed(msg) => write!(f, "not well-formed: {msg}"),
            ParseError::RestrictedXml(msg) => write!(f, "restricted XML: {msg}"),
        }
    }
}

impl Error for ParseError {}

impl From<EntityError> for ParseError {
    fn from(err: EntityError) -> ParseError {
        ParseError::NotWellFormed(err.0)
    }
}
