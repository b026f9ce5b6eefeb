use std::ops::Deref;

use axum::response::{Html, IntoResponse, Response};

const DEFAULT_BUFFER_SIZE: usize = 1024;

/// HTML output buffer with escaping helpers.
#[derive(Debug)]
pub struct Buffer {
    content: String,
}

impl Deref for Buffer {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.content
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self {
            content: String::with_capacity(DEFAULT_BUFFER_SIZE),
        }
    }
}

impl<T: AsRef<str>> From<T> for Buffer {
    fn from(s: T) -> Self {
        Self {
            content: s.as_ref().to_string(),
        }
    }
}

impl Buffer {
    pub fn empty() -> Self {
        Self {
            content: String::new(),
        }
    }

    pub fn push_str(&mut self, s: &str) {
        self.content.push_str(s);
    }

    /// Escaped text content.
    pub fn push_html(&mut self, s: &str) {
        html_escape::encode_safe_to_string(s, &mut self.content);
    }

    /// Escaped double-quoted attribute value.
    pub fn push_attr_value(&mut self, s: &str) {
        html_escape::encode_double_quoted_attribute_to_string(s, &mut self.content);
    }

    /// ` name="value"` with the value escaped.
    pub fn push_attr(&mut self, name: &str, value: &str) {
        self.content.push(' ');
        self.content.push_str(name);
        self.content.push_str("=\"");
        self.push_attr_value(value);
        self.content.push('"');
    }

    pub fn push_uri(&mut self, s: &str) {
        let encoded = uri_encode::encode_uri_component(s);
        self.content.push_str(&encoded);
    }

    pub fn push_url(&mut self, s: &str) {
        let encoded = uri_encode::encode_uri(s);
        self.content.push_str(&encoded);
    }

    pub fn push_char(&mut self, c: char) {
        self.content.push(c);
    }

    pub fn into_html(self) -> Html<String> {
        Html(self.content)
    }

    pub fn into_string(self) -> String {
        self.content
    }
}

impl From<Buffer> for String {
    fn from(buffer: Buffer) -> Self {
        buffer.content
    }
}

impl IntoResponse for Buffer {
    fn into_response(self) -> Response {
        self.into_html().into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_html_escapes() {
        let mut buffer = Buffer::empty();
        buffer.push_html("<b>5 & 6</b>");
        assert_eq!(&*buffer, "&lt;b&gt;5 &amp; 6&lt;&#x2F;b&gt;");
    }

    #[test]
    fn test_push_attr_escapes_quotes() {
        let mut buffer = Buffer::empty();
        buffer.push_attr("value", r#""Click Me#1""#);
        assert_eq!(&*buffer, r#" value="&quot;Click Me#1&quot;""#);
    }
}
