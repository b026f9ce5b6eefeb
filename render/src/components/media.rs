use base64::{Engine, engine::general_purpose::STANDARD};

use super::{Component, Content};
use crate::{Buffer, Settings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub alt: String,
    settings: Settings,
}

impl Image {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            width: None,
            height: None,
            alt: String::new(),
            settings: Settings::new(),
        }
    }

    /// Inline image as a `data:` url.
    pub fn from_bytes(bytes: &[u8], mime_type: &str) -> Self {
        Self::new(format!("data:{mime_type};base64,{}", STANDARD.encode(bytes)))
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_alt(mut self, alt: impl Into<String>) -> Self {
        self.alt = alt.into();
        self
    }

    pub(super) fn render(&self, output: &mut Buffer) {
        output.push_str("<img");
        output.push_attr("src", &self.url);
        if let Some(width) = self.width {
            output.push_attr("width", &width.to_string());
        }
        if let Some(height) = self.height {
            output.push_attr("height", &height.to_string());
        }
        output.push_attr("alt", &self.alt);
        self.settings.render(output, &["loading"]);
        output.push_char('>');
    }
}

impl_component!(Image);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::testing::render;

    #[test]
    fn test_image_with_size() {
        let html = render(Image::new("/static/cat.png").with_size(64, 32).with_alt("cat"));
        assert_eq!(
            html,
            r#"<img src="/static/cat.png" width="64" height="32" alt="cat">"#
        );
    }

    #[test]
    fn test_image_from_bytes() {
        let image = Image::from_bytes(b"abc", "image/png");
        assert_eq!(image.url, "data:image/png;base64,YWJj");
    }
}
