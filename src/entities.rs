//! Escaping and unescaping of XML character data and attribute values.
//!
//! Only the five predefined entities and numeric character references
//! are supported; an unknown named entity is a syntax error.

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct EntityError(pub &'static str);

impl std::fmt::Display for EntityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bad entity reference: {}", self.0)
    }
}

impl std::error::Error for EntityError {}

pub(crate) mod description {
    pub const UNKNOWN_ENTITY: &str = "non-predefined entity reference";
    pub const UNTERMINATED_ENTITY: &str = "entity reference without terminating ';'";
    pub const BAD_DECIMAL_REFERENCE: &str = "non digit in decimal character reference";
    pub const BAD_HEX_REFERENCE: &str = "non hex digit in hexadecimal character reference";
    pub const BAD_CODEPOINT: &str = "character reference outside the unicode range";
}

/// Escapes `&`, `<` and `>` for use in text content.
pub fn escape(s: &str) -> String {
    let mut buf = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => buf.push_str("&amp;"),
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            _ => buf.push(c),
        }
    }
    buf
}

/// Escapes `&`, `<`, `>` and `"` for use in double-quoted attribute values.
pub fn escape_attribute(s: &str) -> String {
    let mut buf = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => buf.push_str("&amp;"),
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            '"' => buf.push_str("&quot;"),
            _ => buf.push(c),
        }
    }
    buf
}

/// Replaces predefined entities and numeric character references with
/// the actual characters.
pub fn unescape(s: &str) -> Result<String, EntityError> {
    if !s.contains('&') {
        return Ok(s.to_string());
    }
    let mut buf = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        buf.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let semi = tail
            .find(';')
            .ok_or(EntityError(description::UNTERMINATED_ENTITY))?;
        let name = &tail[..semi];
        match name {
            "amp" => buf.push('&'),
            "lt" => buf.push('<'),
            "gt" => buf.push('>'),
            "apos" => buf.push('\''),
            "quot" => buf.push('"'),
            _ => {
                if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                    buf.push(char_reference(hex, 16, description::BAD_HEX_REFERENCE)?);
                } else if let Some(dec) = name.strip_prefix('#') {
                    buf.push(char_reference(dec, 10, description::BAD_DECIMAL_REFERENCE)?);
                } else {
                    return Err(EntityError(description::UNKNOWN_ENTITY));
                }
            }
        }
        rest = &tail[semi + 1..];
    }
    buf.push_str(rest);
    Ok(buf)
}

fn char_reference(digits: &str, radix: u32, bad_digit: &'static str) -> Result<char, EntityError> {
    if digits.is_empty() {
        return Err(EntityError(bad_digit));
    }
    let value = u32::from_str_radix(digits, radix).map_err(|_| EntityError(bad_digit))?;
    char::from_u32(value).ok_or(EntityError(description::BAD_CODEPOINT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes() {
        const NOESCAPE: &str = "abc$#@!%^*(){}[]=-+/.,;:FDSF3443";
        assert_eq!(escape(NOESCAPE), NOESCAPE);
        assert_eq!(escape("a & b < c > d"), "a &amp; b &lt; c &gt; d");
        assert_eq!(escape("\"quoted\""), "\"quoted\"");
        assert_eq!(
            escape_attribute("\"quoted\" & more"),
            "&quot;quoted&quot; &amp; more"
        );
    }

    #[test]
    fn unescapes() {
        assert_eq!(unescape("plain text").unwrap(), "plain text");
        assert_eq!(unescape("&amp;&lt;&gt;&apos;&quot;").unwrap(), "&<>'\"");
        assert_eq!(unescape("a&#65;b").unwrap(), "aAb");
        assert_eq!(unescape("a&#x41;b").unwrap(), "aAb");
        assert_eq!(unescape("&#x1F600;").unwrap(), "\u{1F600}");
    }

    #[test]
    fn unescape_errors() {
        assert_eq!(
            unescape("&nbsp;").unwrap_err(),
            EntityError(description::UNKNOWN_ENTITY)
        );
        assert_eq!(
            unescape("&amp").unwrap_err(),
            EntityError(description::UNTERMINATED_ENTITY)
        );
        assert_eq!(
            unescape("&#12a;").unwrap_err(),
            EntityError(description::BAD_DECIMAL_REFERENCE)
        );
        assert_eq!(
            unescape("&#xZZ;").unwrap_err(),
            EntityError(description::BAD_HEX_REFERENCE)
        );
        assert_eq!(
            unescape("&#xD800;").unwrap_err(),
            EntityError(description::BAD_CODEPOINT)
        );
    }
}
