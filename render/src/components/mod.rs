//! Declarative component tree.
//!
//! Components are plain values; [`Component`] tags them and dispatches
//! rendering and verification through one static table.

use std::sync::atomic::{AtomicU64, Ordering};

use drafter_core::{RouteTable, ServerConfig, StateSnapshot};

use crate::{Buffer, Settings};

pub use form::{CheckBox, FileUpload, SelectBox, TextArea, TextBox};
pub use layout::{Div, List, Row, Span};
pub use link::{Argument, Button, Link};
pub use media::Image;
pub use table::Table;
pub use text::{
    Header, Pre, Text, bold, italic, large_font, monospace, small_font, strikethrough, underline,
};

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique per constructed component; distinguishes same-label buttons.
pub(crate) fn next_instance_id() -> u64 {
    NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed)
}

macro_rules! impl_component {
    ($($name:ident),+) => {
        $(
            impl $name {
                /// Add an attribute or style override.
                pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
                    self.settings.set(key, value);
                    self
                }

                pub fn settings(&self) -> &crate::Settings {
                    &self.settings
                }
            }

            impl From<$name> for Component {
                fn from(component: $name) -> Self {
                    Component::$name(component)
                }
            }

            impl From<$name> for Content {
                fn from(component: $name) -> Self {
                    Content::Component(Component::$name(component))
                }
            }
        )+
    };
}

mod form;
mod layout;
mod link;
mod media;
mod table;
mod text;

pub struct RenderContext<'a> {
    pub state: Option<&'a StateSnapshot>,
    pub config: &'a ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {reason}")]
pub struct VerifyError {
    /// Location of the offending component, e.g. `Page.content[2].Link`.
    pub path: String,
    pub reason: String,
}

impl VerifyError {
    pub fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Either a bare string or a component.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    Component(Component),
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<Component> for Content {
    fn from(component: Component) -> Self {
        Content::Component(component)
    }
}

impl Content {
    pub fn render(&self, ctx: &RenderContext<'_>, output: &mut Buffer) {
        match self {
            Content::Text(text) => output.push_html(text),
            Content::Component(component) => component.render(ctx, output),
        }
    }

    pub fn verify(&self, routes: &dyn RouteTable, path: &str) -> Result<(), VerifyError> {
        match self {
            Content::Text(_) => Ok(()),
            Content::Component(component) => component.verify(routes, path),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Text(Text),
    Header(Header),
    Pre(Pre),
    Link(Link),
    Button(Button),
    Argument(Argument),
    Image(Image),
    TextBox(TextBox),
    TextArea(TextArea),
    SelectBox(SelectBox),
    CheckBox(CheckBox),
    FileUpload(FileUpload),
    Span(Span),
    Div(Div),
    Row(Row),
    NumberedList(List),
    BulletedList(List),
    Table(Table),
    LineBreak,
    HorizontalRule,
}

impl Component {
    pub fn name(&self) -> &'static str {
        match self {
            Component::Text(_) => "Text",
            Component::Header(_) => "Header",
            Component::Pre(_) => "Pre",
            Component::Link(_) => "Link",
            Component::Button(_) => "Button",
            Component::Argument(_) => "Argument",
            Component::Image(_) => "Image",
            Component::TextBox(_) => "TextBox",
            Component::TextArea(_) => "TextArea",
            Component::SelectBox(_) => "SelectBox",
            Component::CheckBox(_) => "CheckBox",
            Component::FileUpload(_) => "FileUpload",
            Component::Span(_) => "Span",
            Component::Div(_) => "Div",
            Component::Row(_) => "Row",
            Component::NumberedList(_) => "NumberedList",
            Component::BulletedList(_) => "BulletedList",
            Component::Table(_) => "Table",
            Component::LineBreak => "LineBreak",
            Component::HorizontalRule => "HorizontalRule",
        }
    }

    pub fn render(&self, ctx: &RenderContext<'_>, output: &mut Buffer) {
        match self {
            Component::Text(text) => text.render(output),
            Component::Header(header) => header.render(output),
            Component::Pre(pre) => pre.render(output),
            Component::Link(link) => link.render(output),
            Component::Button(button) => button.render(output),
            Component::Argument(argument) => argument.render(output),
            Component::Image(image) => image.render(output),
            Component::TextBox(text_box) => text_box.render(output),
            Component::TextArea(text_area) => text_area.render(output),
            Component::SelectBox(select_box) => select_box.render(output),
            Component::CheckBox(check_box) => check_box.render(output),
            Component::FileUpload(file_upload) => file_upload.render(output),
            Component::Span(span) => span.render(ctx, output),
            Component::Div(div) => div.render(ctx, output),
            Component::Row(row) => row.render(ctx, output),
            Component::NumberedList(list) => list.render(ctx, output, "ol"),
            Component::BulletedList(list) => list.render(ctx, output, "ul"),
            Component::Table(table) => table.render(output),
            Component::LineBreak => output.push_str("<br>"),
            Component::HorizontalRule => output.push_str("<hr>"),
        }
    }

    /// Recursively check links, buttons and form field names.
    pub fn verify(&self, routes: &dyn RouteTable, path: &str) -> Result<(), VerifyError> {
        let path = format!("{path}.{}", self.name());
        match self {
            Component::Link(link) => link.verify(routes, &path),
            Component::Button(button) => button.verify(routes, &path),
            Component::Argument(argument) => argument.verify(&path),
            Component::TextBox(text_box) => form::verify_name(&text_box.name, &path),
            Component::TextArea(text_area) => form::verify_name(&text_area.name, &path),
            Component::SelectBox(select_box) => select_box.verify(&path),
            Component::CheckBox(check_box) => form::verify_name(&check_box.name, &path),
            Component::FileUpload(file_upload) => form::verify_name(&file_upload.name, &path),
            Component::Span(span) => layout::verify_children(&span.content, routes, &path),
            Component::Div(div) => layout::verify_children(&div.content, routes, &path),
            Component::Row(row) => layout::verify_children(&row.content, routes, &path),
            Component::NumberedList(list) | Component::BulletedList(list) => {
                layout::verify_children(&list.items, routes, &path)
            }
            Component::Table(table) => table.verify(&path),
            Component::Text(_)
            | Component::Header(_)
            | Component::Pre(_)
            | Component::Image(_)
            | Component::LineBreak
            | Component::HorizontalRule => Ok(()),
        }
    }

    pub fn render_to_string(&self, ctx: &RenderContext<'_>) -> String {
        let mut output = Buffer::empty();
        self.render(ctx, &mut output);
        output.into_string()
    }
}

pub(crate) fn render_open_tag(
    output: &mut Buffer,
    tag: &str,
    settings: &Settings,
    extra_attributes: &[&str],
) {
    output.push_char('<');
    output.push_str(tag);
    settings.render(output, extra_attributes);
    output.push_char('>');
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeSet;

    use drafter_core::{RouteTable, RouteUrl, ServerConfig};

    use super::RenderContext;

    pub struct Routes(pub BTreeSet<RouteUrl>);

    impl Routes {
        pub fn of(urls: &[&str]) -> Self {
            Self(urls.iter().map(|url| RouteUrl::new(url)).collect())
        }
    }

    impl RouteTable for Routes {
        fn has_route(&self, url: &RouteUrl) -> bool {
            self.0.contains(url)
        }

        fn route_urls(&self) -> Vec<RouteUrl> {
            self.0.iter().cloned().collect()
        }
    }

    pub fn render(component: impl Into<super::Component>) -> String {
        let config = ServerConfig::default();
        let ctx = RenderContext {
            state: None,
            config: &config,
        };
        component.into().render_to_string(&ctx)
    }
}
