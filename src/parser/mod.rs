//! Incremental streaming XML parser.
//!
//! Input arrives in arbitrary string chunks via [Parser::write]. A token
//! split across a chunk boundary is carried over in an internal buffer
//! and completed by the next write, so the emitted events never depend
//! on where the input was cut. The accepted language is the restricted
//! XML profile used on stanza streams: no DOCTYPE, no processing
//! instructions other than a single `<?xml ...?>` declaration, and
//! comments only when enabled.

mod error;

use crate::element::Element;
use crate::entities::unescape;

pub use error::ParseError;
pub use error::description;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    TagName,
    Tag,
    AttrName,
    AttrEq,
    AttrQuote,
    AttrValue,
    Cdata,
    IgnoreComment,
    IgnoreInstruction,
    XmlDeclaration,
}

// Markup declarations recognized after "<!".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Comment,
    Cdata,
}

impl Marker {
    fn pattern(self) -> &'static [u8] {
        match self {
            Marker::Comment => b"!--",
            Marker::Cdata => b"![CDATA[",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParserOptions {
    pub allow_comments: bool,
}

impl Default for ParserOptions {
    fn default() -> ParserOptions {
        ParserOptions {
            allow_comments: true,
        }
    }
}

/// One parsing event. A self-closing tag produces a start event
/// immediately followed by an end event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserEvent {
    StartElement {
        name: String,
        attributes: Vec<(String, String)>,
    },
    EndElement {
        name: String,
    },
    Text(String),
}

/// Receiver for parsing events. Returning an error aborts the parse.
pub trait ParserHandler {
    fn handle_event(&mut self, event: ParserEvent) -> Result<(), ParseError>;
}

pub struct Parser {
    state: State,
    // Partial token carried over from previous writes.
    buffer: String,
    tag_name: String,
    attribute_name: String,
    attributes: Vec<(String, String)>,
    attribute_quote: u8,
    end_tag: bool,
    self_closing: bool,
    marker: Option<(Marker, usize)>,
    // Last two bytes seen inside comments, instructions and CDATA,
    // so a terminator split across chunks is still recognized.
    trail: [u8; 2],
    decl_matched: usize,
    have_declaration: bool,
    // Text after a comment or instruction is dropped until the next '<'.
    discard_text: bool,
    allow_comments: bool,
    finished: bool,
    failed: bool,
}

impl Parser {
    pub fn new() -> Parser {
        Parser::with_options(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Parser {
        Parser {
            state: State::Text,
            buffer: String::new(),
            tag_name: String::new(),
            attribute_name: String::new(),
            attributes: Vec::new(),
            attribute_quote: 0,
            end_tag: false,
            self_closing: false,
            marker: None,
            trail: [0, 0],
            decl_matched: 0,
            have_declaration: false,
            discard_text: false,
            allow_comments: options.allow_comments,
            finished: false,
            failed: false,
        }
    }

    /// Feeds one chunk. After an error or [end](Parser::end), further
    /// writes are ignored.
    pub fn write<H: ParserHandler>(
        &mut self,
        handler: &mut H,
        data: &str,
    ) -> Result<(), ParseError> {
        if self.finished || self.failed {
            return Ok(());
        }
        let result = self.scan(handler, data);
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    /// Feeds an optional final chunk and shuts the parser down.
    pub fn end<H: ParserHandler>(
        &mut self,
        handler: &mut H,
        data: Option<&str>,
    ) -> Result<(), ParseError> {
        if self.finished || self.failed {
            return Ok(());
        }
        if let Some(data) = data {
            self.write(handler, data)?;
        }
        self.finished = true;
        let result = self.finish_text(handler);
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn finish_text<H: ParserHandler>(&mut self, handler: &mut H) -> Result<(), ParseError> {
        if self.state != State::Text {
            return Err(ParseError::NotWellFormed(description::UNEXPECTED_END));
        }
        let text = std::mem::take(&mut self.buffer);
        if !text.is_empty() {
            handler.handle_event(ParserEvent::Text(unescape(&text)?))?;
        }
        Ok(())
    }

    fn scan<H: ParserHandler>(&mut self, handler: &mut H, data: &str) -> Result<(), ParseError> {
        let bytes = data.as_bytes();
        // Byte offset where the token currently being collected began
        // in this chunk. Delimiters are all ASCII, so these offsets
        // always fall on character boundaries.
        let mut record: Option<usize> = if self.recording() { Some(0) } else { None };
        let mut pos = 0;
        while pos < bytes.len() {
            let b = bytes[pos];
            match self.state {
                State::Text => {
                    if b == b'<' {
                        let text = self.take_run(data, &mut record, pos);
                        if !text.is_empty() {
                            handler.handle_event(ParserEvent::Text(unescape(&text)?))?;
                        }
                        self.begin_tag();
                    }
                }
                State::TagName => {
                    if let Some((kind, matched)) = self.marker {
                        let pattern = kind.pattern();
                        if b == pattern[matched] {
                            if matched + 1 == pattern.len() {
                                self.marker = None;
                                self.trail = [0, 0];
                                match kind {
                                    Marker::Comment => {
                                        if !self.allow_comments {
                                            return Err(ParseError::RestrictedXml(
                                                description::COMMENTS_NOT_ALLOWED,
                                            ));
                                        }
                                        self.state = State::IgnoreComment;
                                    }
                                    Marker::Cdata => {
                                        self.state = State::Cdata;
                                        record = Some(pos + 1);
                                    }
                                }
                            } else {
                                self.marker = Some((kind, matched + 1));
                            }
                        } else if kind == Marker::Comment && matched == 1 && b == b'[' {
                            self.marker = Some((Marker::Cdata, 2));
                        } else {
                            return Err(ParseError::NotWellFormed(description::INVALID_MARKUP));
                        }
                    } else if record.is_none() && self.buffer.is_empty() {
                        // First byte after '<' (or after "</").
                        match b {
                            b'/' if !self.end_tag => self.end_tag = true,
                            b'!' if !self.end_tag => self.marker = Some((Marker::Comment, 1)),
                            b'?' if !self.end_tag => {
                                if self.have_declaration {
                                    return Err(ParseError::RestrictedXml(
                                        description::DUPLICATE_DECLARATION,
                                    ));
                                }
                                self.decl_matched = 0;
                                self.state = State::XmlDeclaration;
                            }
                            b'/' | b'!' | b'?' | b'<' | b'>' | b'=' => {
                                return Err(ParseError::NotWellFormed(
                                    description::INVALID_TAG_NAME,
                                ));
                            }
                            b if is_space(b) => {
                                return Err(ParseError::NotWellFormed(
                                    description::INVALID_TAG_NAME,
                                ));
                            }
                            _ => record = Some(pos),
                        }
                    } else {
                        match b {
                            b'>' => {
                                self.tag_name = self.take_run(data, &mut record, pos);
                                self.fire_tag(handler)?;
                                record = Some(pos + 1);
                            }
                            b'/' => {
                                if self.end_tag {
                                    return Err(ParseError::NotWellFormed(
                                        description::INVALID_END_TAG,
                                    ));
                                }
                                self.tag_name = self.take_run(data, &mut record, pos);
                                self.self_closing = true;
                                self.state = State::Tag;
                            }
                            b'<' => {
                                self.tag_name = self.take_run(data, &mut record, pos);
                                self.fire_tag(handler)?;
                                self.begin_tag();
                            }
                            b'=' => {
                                return Err(ParseError::NotWellFormed(
                                    description::INVALID_TAG_NAME,
                                ));
                            }
                            b if is_space(b) => {
                                self.tag_name = self.take_run(data, &mut record, pos);
                                self.state = State::Tag;
                            }
                            _ => {}
                        }
                    }
                }
                State::Tag => match b {
                    b'>' => {
                        self.fire_tag(handler)?;
                        record = Some(pos + 1);
                    }
                    b'/' => {
                        if self.end_tag || self.self_closing {
                            return Err(ParseError::NotWellFormed(description::INVALID_END_TAG));
                        }
                        self.self_closing = true;
                    }
                    b'<' => {
                        self.fire_tag(handler)?;
                        self.begin_tag();
                    }
                    b'=' => {
                        return Err(ParseError::NotWellFormed(
                            description::INVALID_ATTRIBUTE_NAME,
                        ));
                    }
                    b if is_space(b) => {}
                    _ => {
                        if self.end_tag {
                            return Err(ParseError::NotWellFormed(description::INVALID_END_TAG));
                        }
                        if self.self_closing {
                            return Err(ParseError::NotWellFormed(
                                description::INVALID_ATTRIBUTE_NAME,
                            ));
                        }
                        self.state = State::AttrName;
                        record = Some(pos);
                    }
                },
                State::AttrName => match b {
                    b'=' => {
                        self.attribute_name = self.take_run(data, &mut record, pos);
                        self.state = State::AttrQuote;
                    }
                    b'/' | b'<' | b'>' => {
                        return Err(ParseError::NotWellFormed(
                            description::INVALID_ATTRIBUTE_NAME,
                        ));
                    }
                    b if is_space(b) => {
                        self.attribute_name = self.take_run(data, &mut record, pos);
                        self.state = State::AttrEq;
                    }
                    _ => {}
                },
                State::AttrEq => match b {
                    b'=' => self.state = State::AttrQuote,
                    b if is_space(b) => {}
                    _ => {
                        return Err(ParseError::NotWellFormed(
                            description::ATTRIBUTE_WITHOUT_VALUE,
                        ));
                    }
                },
                State::AttrQuote => match b {
                    b'"' | b'\'' => {
                        self.attribute_quote = b;
                        self.state = State::AttrValue;
                        record = Some(pos + 1);
                    }
                    b if is_space(b) => {}
                    _ => {
                        return Err(ParseError::NotWellFormed(description::UNQUOTED_ATTRIBUTE));
                    }
                },
                State::AttrValue => {
                    if b == self.attribute_quote {
                        let raw = self.take_run(data, &mut record, pos);
                        let value = unescape(&raw)?;
                        let name = std::mem::take(&mut self.attribute_name);
                        if self.attributes.iter().any(|(existing, _)| *existing == name) {
                            return Err(ParseError::NotWellFormed(
                                description::DUPLICATE_ATTRIBUTE,
                            ));
                        }
                        self.attributes.push((name, value));
                        self.state = State::Tag;
                    }
                }
                State::Cdata => {
                    if b == b'>' && self.trail == *b"]]" {
                        let mut content = self.take_run(data, &mut record, pos);
                        content.truncate(content.len() - 2);
                        if !content.is_empty() {
                            handler.handle_event(ParserEvent::Text(content))?;
                        }
                        self.trail = [0, 0];
                        self.state = State::Text;
                        record = Some(pos + 1);
                    } else {
                        self.trail = [self.trail[1], b];
                    }
                }
                State::IgnoreComment => {
                    if b == b'>' && (self.trail == *b"--" || self.trail == *b"]]") {
                        self.state = State::Text;
                        self.discard_text = true;
                    } else {
                        self.trail = [self.trail[1], b];
                    }
                }
                State::IgnoreInstruction => {
                    if b == b'>' && self.trail[1] == b'?' {
                        self.state = State::Text;
                        self.discard_text = true;
                    } else {
                        self.trail = [self.trail[1], b];
                    }
                }
                State::XmlDeclaration => {
                    if self.decl_matched < 3 {
                        if b.eq_ignore_ascii_case(&b"xml"[self.decl_matched]) {
                            self.decl_matched += 1;
                        } else {
                            return Err(ParseError::RestrictedXml(
                                description::PROCESSING_INSTRUCTION,
                            ));
                        }
                    } else if is_space(b) {
                        self.have_declaration = true;
                        self.trail = [0, 0];
                        self.state = State::IgnoreInstruction;
                    } else {
                        return Err(ParseError::RestrictedXml(
                            description::PROCESSING_INSTRUCTION,
                        ));
                    }
                }
            }
            pos += 1;
        }
        // Carry the unfinished token over to the next write.
        if let Some(start) = record {
            self.buffer.push_str(&data[start..]);
        }
        Ok(())
    }

    // True when bytes at the start of a new chunk continue a token
    // begun in a previous one.
    fn recording(&self) -> bool {
        match self.state {
            State::Text => !self.discard_text,
            State::Cdata | State::AttrValue | State::AttrName => true,
            State::TagName => self.marker.is_none() && !self.buffer.is_empty(),
            _ => false,
        }
    }

    fn take_run(&mut self, data: &str, record: &mut Option<usize>, end: usize) -> String {
        let mut run = std::mem::take(&mut self.buffer);
        if let Some(start) = record.take() {
            run.push_str(&data[start..end]);
        }
        run
    }

    fn begin_tag(&mut self) {
        self.state = State::TagName;
        self.discard_text = false;
        self.end_tag = false;
        self.self_closing = false;
        self.marker = None;
        self.tag_name.clear();
    }

    fn fire_tag<H: ParserHandler>(&mut self, handler: &mut H) -> Result<(), ParseError> {
        if self.tag_name.is_empty() {
            return Err(ParseError::NotWellFormed(description::INVALID_TAG_NAME));
        }
        let name = std::mem::take(&mut self.tag_name);
        if self.end_tag {
            handler.handle_event(ParserEvent::EndElement { name })?;
        } else {
            let attributes = std::mem::take(&mut self.attributes);
            handler.handle_event(ParserEvent::StartElement {
                name: name.clone(),
                attributes,
            })?;
            if self.self_closing {
                handler.handle_event(ParserEvent::EndElement { name })?;
            }
        }
        self.state = State::Text;
        Ok(())
    }
}

impl Default for Parser {
    fn default() -> Parser {
        Parser::new()
    }
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

/// Builds an [Element] tree from parsing events. Text outside the root
/// element is dropped.
pub struct TreeBuilder {
    root: Option<Element>,
    stack: Vec<Element>,
}

impl TreeBuilder {
    pub fn new() -> TreeBuilder {
        TreeBuilder {
            root: None,
            stack: Vec::new(),
        }
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The completed tree, once the root element has been closed.
    pub fn finish(self) -> Result<Element, ParseError> {
        if !self.stack.is_empty() {
            return Err(ParseError::NotWellFormed(description::UNCLOSED_ELEMENT));
        }
        self.root
            .ok_or(ParseError::NotWellFormed(description::MISSING_ROOT))
    }
}

impl Default for TreeBuilder {
    fn default() -> TreeBuilder {
        TreeBuilder::new()
    }
}

impl ParserHandler for TreeBuilder {
    fn handle_event(&mut self, event: ParserEvent) -> Result<(), ParseError> {
        match event {
            ParserEvent::StartElement { name, attributes } => {
                let element = Element::new(&name);
                for (key, value) in attributes {
                    element.set_attribute_emit_empty(&key, &value);
                }
                match self.stack.last() {
                    Some(parent) => {
                        parent.append_child(element.clone());
                    }
                    None => {
                        if self.root.is_some() {
                            return Err(ParseError::NotWellFormed(description::MULTIPLE_ROOTS));
                        }
                        self.root = Some(element.clone());
                    }
                }
                self.stack.push(element);
            }
            ParserEvent::EndElement { name } => {
                let element = self
                    .stack
                    .pop()
                    .ok_or(ParseError::NotWellFormed(description::UNEXPECTED_END_TAG))?;
                if element.name() != name {
                    return Err(ParseError::NotWellFormed(description::TAG_MISMATCH));
                }
            }
            ParserEvent::Text(text) => {
                if let Some(current) = self.stack.last() {
                    current.append_text(&text);
                }
            }
        }
        Ok(())
    }
}

/// Parses a complete document into an [Element] tree.
pub fn parse(input: &str) -> Result<Element, ParseError> {
    let mut parser = Parser::new();
    let mut builder = TreeBuilder::new();
    parser.end(&mut builder, Some(input))?;
    builder.finish()
}

#[cfg(test)]
mod tests;
