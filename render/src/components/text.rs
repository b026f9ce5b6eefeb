use super::{Component, Content, render_open_tag};
use crate::{Buffer, Settings};

/// Plain text; rendered bare unless it carries settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    pub body: String,
    settings: Settings,
}

impl Text {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            settings: Settings::new(),
        }
    }

    pub(super) fn render(&self, output: &mut Buffer) {
        if self.settings.is_empty() {
            output.push_html(&self.body);
            return;
        }

        render_open_tag(output, "span", &self.settings, &[]);
        output.push_html(&self.body);
        output.push_str("</span>");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub body: String,
    pub level: u8,
    settings: Settings,
}

impl Header {
    pub fn new(body: impl Into<String>) -> Self {
        Self::with_level(body, 1)
    }

    /// Levels outside `1..=6` are clamped.
    pub fn with_level(body: impl Into<String>, level: u8) -> Self {
        Self {
            body: body.into(),
            level: level.clamp(1, 6),
            settings: Settings::new(),
        }
    }

    pub(super) fn render(&self, output: &mut Buffer) {
        let tag = format!("h{}", self.level);
        render_open_tag(output, &tag, &self.settings, &[]);
        output.push_html(&self.body);
        output.push_str("</");
        output.push_str(&tag);
        output.push_char('>');
    }
}

/// Preformatted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pre {
    pub body: String,
    settings: Settings,
}

impl Pre {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            settings: Settings::new(),
        }
    }

    pub(super) fn render(&self, output: &mut Buffer) {
        render_open_tag(output, "pre", &self.settings, &[]);
        output.push_html(&self.body);
        output.push_str("</pre>");
    }
}

impl_component!(Text, Header, Pre);

pub fn bold(body: impl Into<String>) -> Text {
    Text::new(body).with("style_font_weight", "bold")
}

pub fn italic(body: impl Into<String>) -> Text {
    Text::new(body).with("style_font_style", "italic")
}

pub fn underline(body: impl Into<String>) -> Text {
    Text::new(body).with("style_text_decoration", "underline")
}

pub fn strikethrough(body: impl Into<String>) -> Text {
    Text::new(body).with("style_text_decoration", "line-through")
}

pub fn monospace(body: impl Into<String>) -> Text {
    Text::new(body).with("style_font_family", "monospace")
}

pub fn small_font(body: impl Into<String>) -> Text {
    Text::new(body).with("style_font_size", "small")
}

pub fn large_font(body: impl Into<String>) -> Text {
    Text::new(body).with("style_font_size", "large")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::testing::render;

    #[test]
    fn test_plain_text_is_escaped() {
        assert_eq!(render(Text::new("1 < 2")), "1 &lt; 2");
    }

    #[test]
    fn test_bold_uses_span() {
        assert_eq!(
            render(bold("Hi")),
            r#"<span style="font-weight: bold">Hi</span>"#
        );
    }

    #[test]
    fn test_header_level_clamped() {
        assert_eq!(render(Header::with_level("Title", 9)), "<h6>Title</h6>");
    }
}
