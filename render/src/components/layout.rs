use drafter_core::RouteTable;

use super::{Component, Content, RenderContext, VerifyError, render_open_tag};
use crate::{Buffer, Settings};

pub(super) fn verify_children(
    children: &[Content],
    routes: &dyn RouteTable,
    path: &str,
) -> Result<(), VerifyError> {
    children
        .iter()
        .enumerate()
        .try_for_each(|(index, child)| child.verify(routes, &format!("{path}.content[{index}]")))
}

fn render_children(children: &[Content], ctx: &RenderContext<'_>, output: &mut Buffer) {
    for child in children {
        child.render(ctx, output);
    }
}

macro_rules! container {
    ($name:ident, $tag:literal $(, $style_key:literal => $style_value:literal)*) => {
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            pub content: Vec<Content>,
            settings: Settings,
        }

        impl $name {
            pub fn new<I, C>(content: I) -> Self
            where
                I: IntoIterator<Item = C>,
                C: Into<Content>,
            {
                #[allow(unused_mut)]
                let mut settings = Settings::new();
                $(settings.set($style_key, $style_value);)*
                Self {
                    content: content.into_iter().map(Into::into).collect(),
                    settings,
                }
            }

            pub(super) fn render(&self, ctx: &RenderContext<'_>, output: &mut Buffer) {
                render_open_tag(output, $tag, &self.settings, &[]);
                render_children(&self.content, ctx, output);
                output.push_str(concat!("</", $tag, ">"));
            }
        }
    };
}

container!(Span, "span");
container!(Div, "div");
container!(Row, "div", "style_display" => "flex", "style_flex_direction" => "row", "style_align_items" => "center");

impl_component!(Span, Div, Row);

/// Numbered (`<ol>`) or bulleted (`<ul>`) list.
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub items: Vec<Content>,
    pub ordered: bool,
    settings: Settings,
}

impl List {
    fn new<I, C>(items: I, ordered: bool) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Content>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
            ordered,
            settings: Settings::new(),
        }
    }

    pub fn numbered<I, C>(items: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Content>,
    {
        Self::new(items, true)
    }

    pub fn bulleted<I, C>(items: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Content>,
    {
        Self::new(items, false)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.set(key, value);
        self
    }

    pub(super) fn render(&self, ctx: &RenderContext<'_>, output: &mut Buffer, tag: &str) {
        render_open_tag(output, tag, &self.settings, &[]);
        for item in &self.items {
            output.push_str("<li>");
            item.render(ctx, output);
            output.push_str("</li>");
        }
        output.push_str("</");
        output.push_str(tag);
        output.push_char('>');
    }
}

impl From<List> for Component {
    fn from(list: List) -> Self {
        if list.ordered {
            Component::NumberedList(list)
        } else {
            Component::BulletedList(list)
        }
    }
}

impl From<List> for Content {
    fn from(list: List) -> Self {
        Content::Component(list.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Button, Link, testing::{Routes, render}};

    #[test]
    fn test_div_renders_children() {
        let html = render(Div::new(vec![
            Content::from("Balance: "),
            Content::from(super::super::bold("120")),
        ]));
        assert_eq!(
            html,
            r#"<div>Balance: <span style="font-weight: bold">120</span></div>"#
        );
    }

    #[test]
    fn test_row_is_flex() {
        let html = render(Row::new(["a"]));
        assert!(html.starts_with(r#"<div style="display: flex; flex-direction: row; align-items: center">"#));
    }

    #[test]
    fn test_lists() {
        assert_eq!(
            render(List::numbered(["one", "two"])),
            "<ol><li>one</li><li>two</li></ol>"
        );
        assert_eq!(render(List::bulleted(["x"])), "<ul><li>x</li></ul>");
    }

    #[test]
    fn test_nested_verification_path() {
        let routes = Routes::of(&["index"]);
        let div = Div::new(vec![
            Content::from(Link::new("Home", "index")),
            Content::from(Button::new("Save", "save")),
        ]);

        let error = Component::from(div).verify(&routes, "Page.content[0]").unwrap_err();
        assert_eq!(error.path, "Page.content[0].Div.content[1].Button");
    }
}
