use super::*;

fn start(name: &str, attributes: &[(&str, &str)]) -> ParserEvent {
    ParserEvent::StartElement {
        name: name.to_string(),
        attributes: attributes
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
    }
}

fn end(name: &str) -> ParserEvent {
    ParserEvent::EndElement {
        name: name.to_string(),
    }
}

fn text(content: &str) -> ParserEvent {
    ParserEvent::Text(content.to_string())
}

struct Tester {
    expected: Vec<ParserEvent>,
    position: usize,
}

impl Tester {
    fn new(expected: Vec<ParserEvent>) -> Tester {
        Tester {
            expected,
            position: 0,
        }
    }

    // Runs the document through the parser twice: as a single chunk and
    // one character at a time. Both runs must produce the same events.
    fn verify(doc: &str, expected: Vec<ParserEvent>) {
        let mut tester = Tester::new(expected.clone());
        let mut parser = Parser::new();
        parser.end(&mut tester, Some(doc)).unwrap();
        assert_eq!(
            tester.position,
            tester.expected.len(),
            "missing events for {doc}"
        );

        let mut tester = Tester::new(expected);
        let mut parser = Parser::new();
        for c in doc.chars() {
            parser.write(&mut tester, &c.to_string()).unwrap();
        }
        parser.end(&mut tester, None).unwrap();
        assert_eq!(
            tester.position,
            tester.expected.len(),
            "missing events for char-fed {doc}"
        );
    }
}

impl ParserHandler for Tester {
    fn handle_event(&mut self, event: ParserEvent) -> Result<(), ParseError> {
        assert!(
            self.position < self.expected.len(),
            "unexpected extra event {event:?}"
        );
        assert_eq!(event, self.expected[self.position]);
        self.position += 1;
        Ok(())
    }
}

struct Sink;

impl ParserHandler for Sink {
    fn handle_event(&mut self, _event: ParserEvent) -> Result<(), ParseError> {
        Ok(())
    }
}

// The same error must surface no matter how the input is chunked.
fn verify_error(doc: &str, expected: ParseError) {
    let mut parser = Parser::new();
    assert_eq!(parser.end(&mut Sink, Some(doc)).unwrap_err(), expected);

    let mut parser = Parser::new();
    let mut result = Ok(());
    for c in doc.chars() {
        result = parser.write(&mut Sink, &c.to_string());
        if result.is_err() {
            break;
        }
    }
    if result.is_ok() {
        result = parser.end(&mut Sink, None);
    }
    assert_eq!(result.unwrap_err(), expected, "char-fed {doc}");
}

#[test]
fn empty_element() {
    Tester::verify("<a/>", vec![start("a", &[]), end("a")]);
    Tester::verify("<a></a>", vec![start("a", &[]), end("a")]);
    Tester::verify("<a ></a >", vec![start("a", &[]), end("a")]);
}

#[test]
fn attributes() {
    Tester::verify(
        r#"<presence from="juliet@example.com/balcony" type='away'/>"#,
        vec![
            start(
                "presence",
                &[("from", "juliet@example.com/balcony"), ("type", "away")],
            ),
            end("presence"),
        ],
    );
    Tester::verify(
        "<a b = \"c\" d='e' />",
        vec![start("a", &[("b", "c"), ("d", "e")]), end("a")],
    );
    Tester::verify(
        r#"<a b="&lt;&amp;&gt;"/>"#,
        vec![start("a", &[("b", "<&>")]), end("a")],
    );
}

#[test]
fn text_content() {
    Tester::verify(
        "<body>hello world</body>",
        vec![start("body", &[]), text("hello world"), end("body")],
    );
    Tester::verify(
        "<body>1 &lt; 2 &amp;&amp; true</body>",
        vec![start("body", &[]), text("1 < 2 && true"), end("body")],
    );
    Tester::verify(
        "<body>&#65;&#x1F600;</body>",
        vec![start("body", &[]), text("A\u{1F600}"), end("body")],
    );
    Tester::verify(
        "<a>çağrı&amp;ünal</a>",
        vec![start("a", &[]), text("çağrı&ünal"), end("a")],
    );
}

#[test]
fn nested_elements() {
    Tester::verify(
        r#"<message to="juliet@example.com"><body>hi</body><active xmlns="http://jabber.org/protocol/chatstates"/></message>"#,
        vec![
            start("message", &[("to", "juliet@example.com")]),
            start("body", &[]),
            text("hi"),
            end("body"),
            start(
                "active",
                &[("xmlns", "http://jabber.org/protocol/chatstates")],
            ),
            end("active"),
            end("message"),
        ],
    );
}

#[test]
fn cdata_sections() {
    Tester::verify(
        "<a><![CDATA[1 < 2 & <b>raw</b>]]></a>",
        vec![start("a", &[]), text("1 < 2 & <b>raw</b>"), end("a")],
    );
    Tester::verify("<a><![CDATA[]]></a>", vec![start("a", &[]), end("a")]);
    Tester::verify(
        "<a><![CDATA[x]]]></a>",
        vec![start("a", &[]), text("x]"), end("a")],
    );
}

#[test]
fn comments_are_skipped() {
    // Text between a comment and the next tag is dropped with it.
    Tester::verify(
        "<a>x<!-- a comment <not a tag> -->y</a>",
        vec![start("a", &[]), text("x"), end("a")],
    );
    Tester::verify("<!-- leading --><a/>", vec![start("a", &[]), end("a")]);
    Tester::verify(
        "<a><!--c-->skipped<b/>kept</a>",
        vec![
            start("a", &[]),
            start("b", &[]),
            end("b"),
            text("kept"),
            end("a"),
        ],
    );
}

#[test]
fn comments_can_be_disallowed() {
    let mut parser = Parser::with_options(ParserOptions {
        allow_comments: false,
    });
    assert_eq!(
        parser.end(&mut Sink, Some("<a><!-- no --></a>")).unwrap_err(),
        ParseError::RestrictedXml(description::COMMENTS_NOT_ALLOWED)
    );
}

#[test]
fn xml_declaration() {
    Tester::verify(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<a/>",
        vec![start("a", &[]), end("a")],
    );
    // Whitespace must follow the "xml" target.
    verify_error(
        "<?xml?><a/>",
        ParseError::RestrictedXml(description::PROCESSING_INSTRUCTION),
    );
}

#[test]
fn restricted_markup() {
    verify_error(
        "<?xml version=\"1.0\"?><?xml version=\"1.0\"?><a/>",
        ParseError::RestrictedXml(description::DUPLICATE_DECLARATION),
    );
    verify_error(
        "<a><?php echo ?></a>",
        ParseError::RestrictedXml(description::PROCESSING_INSTRUCTION),
    );
    verify_error(
        "<!DOCTYPE html><a/>",
        ParseError::NotWellFormed(description::INVALID_MARKUP),
    );
}

#[test]
fn malformed_markup() {
    verify_error("<>", ParseError::NotWellFormed(description::INVALID_TAG_NAME));
    verify_error(
        "< a></a>",
        ParseError::NotWellFormed(description::INVALID_TAG_NAME),
    );
    verify_error(
        "<a b=\"1\" b=\"2\"/>",
        ParseError::NotWellFormed(description::DUPLICATE_ATTRIBUTE),
    );
    verify_error(
        "<a b ></a>",
        ParseError::NotWellFormed(description::ATTRIBUTE_WITHOUT_VALUE),
    );
    verify_error(
        "<a b></a>",
        ParseError::NotWellFormed(description::INVALID_ATTRIBUTE_NAME),
    );
    verify_error(
        "<a b=c></a>",
        ParseError::NotWellFormed(description::UNQUOTED_ATTRIBUTE),
    );
    verify_error(
        "</a b=\"1\">",
        ParseError::NotWellFormed(description::INVALID_END_TAG),
    );
    verify_error(
        "<a>&nbsp;</a>",
        ParseError::NotWellFormed(crate::entities::description::UNKNOWN_ENTITY),
    );
    verify_error(
        "<a",
        ParseError::NotWellFormed(description::UNEXPECTED_END),
    );
}

// A '<' inside an open tag fires the accumulated tag and starts the
// next one.
#[test]
fn open_bracket_fires_the_pending_tag() {
    Tester::verify(
        "<a<b/></a>",
        vec![start("a", &[]), start("b", &[]), end("b"), end("a")],
    );
    Tester::verify(
        "<a <b/></a>",
        vec![start("a", &[]), start("b", &[]), end("b"), end("a")],
    );
}

#[test]
fn writes_after_failure_are_ignored() {
    let mut parser = Parser::new();
    assert!(parser.write(&mut Sink, "<a><b=\"").is_err());
    assert_eq!(parser.write(&mut Sink, "more"), Ok(()));
}

// Splitting the document at every possible boundary must not change
// the result.
#[test]
fn chunk_boundary_invariance() {
    let doc = r#"<m a="x&amp;y"><![CDATA[z]]><!--c-->skip<b>t&#33;</b></m>"#;
    // Tree comparison hides the text-run segmentation differences.
    let whole = parse(doc).unwrap();
    for split in 1..doc.len() - 1 {
        if !doc.is_char_boundary(split) {
            continue;
        }
        let mut parser = Parser::new();
        let mut builder = TreeBuilder::new();
        parser.write(&mut builder, &doc[..split]).unwrap();
        parser.end(&mut builder, Some(&doc[split..])).unwrap();
        assert_eq!(builder.finish().unwrap(), whole, "split at {split}");
    }
}

#[test]
fn parse_builds_a_tree() {
    let root = parse(r#"<message to="a@b"><body>hi</body></message>"#).unwrap();
    assert_eq!(root.name(), "message");
    assert_eq!(root.attribute("to").as_deref(), Some("a@b"));
    let body = root.get_child("body", None).unwrap();
    assert_eq!(body.text(), "hi");
    assert!(body.parent().unwrap().same_node(&root));
}

#[test]
fn parse_errors() {
    assert_eq!(
        parse("").unwrap_err(),
        ParseError::NotWellFormed(description::MISSING_ROOT)
    );
    assert_eq!(
        parse("<a><b></b>").unwrap_err(),
        ParseError::NotWellFormed(description::UNCLOSED_ELEMENT)
    );
    assert_eq!(
        parse("<a><b></a></b>").unwrap_err(),
        ParseError::NotWellFormed(description::TAG_MISMATCH)
    );
    assert_eq!(
        parse("<a/><b/>").unwrap_err(),
        ParseError::NotWellFormed(description::MULTIPLE_ROOTS)
    );
    assert_eq!(
        parse("</a>").unwrap_err(),
        ParseError::NotWellFormed(description::UNEXPECTED_END_TAG)
    );
}
