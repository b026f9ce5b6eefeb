use std::fmt;

use drafter_core::{
    Message, MessageKind, RouteTable,
    message::{AudioAction, CHANNEL_AFTER, CHANNEL_AUDIO, CHANNEL_BEFORE},
};
use drafter_render::{Buffer, Content, RenderContext, VerifyError, render_page_body};
use serde::Serialize;

use super::StateValue;

/// A full page: the new state plus the content rendered into the body.
pub struct Page {
    state: Box<dyn StateValue>,
    pub content: Vec<Content>,
    pub css: Vec<String>,
    pub js: Vec<String>,
    pub audio: Vec<String>,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("state", &self.state.type_name())
            .field("content", &self.content)
            .field("css", &self.css)
            .field("js", &self.js)
            .field("audio", &self.audio)
            .finish()
    }
}

impl Page {
    pub fn new<S, I, C>(state: S, content: I) -> Self
    where
        S: Serialize + Send + 'static,
        I: IntoIterator<Item = C>,
        C: Into<Content>,
    {
        Self {
            state: Box::new(state),
            content: content.into_iter().map(Into::into).collect(),
            css: Vec::new(),
            js: Vec::new(),
            audio: Vec::new(),
        }
    }

    /// Inline stylesheet injected before the body is replaced.
    pub fn with_css(mut self, css: impl Into<String>) -> Self {
        self.css.push(css.into());
        self
    }

    /// Script run after the body is replaced.
    pub fn with_js(mut self, js: impl Into<String>) -> Self {
        self.js.push(js.into());
        self
    }

    /// Sound played once the page is shown.
    pub fn with_audio(mut self, url: impl Into<String>) -> Self {
        self.audio.push(url.into());
        self
    }

    pub fn state(&self) -> &dyn StateValue {
        &*self.state
    }

    pub(super) fn verify(&self, routes: &dyn RouteTable) -> Result<(), VerifyError> {
        self.content
            .iter()
            .enumerate()
            .try_for_each(|(index, item)| item.verify(routes, &format!("Page.content[{index}]")))
    }

    pub(super) fn render(&self, ctx: &RenderContext<'_>) -> String {
        let mut body = Buffer::default();
        for item in &self.content {
            match item {
                Content::Text(text) => {
                    body.push_str("<p>");
                    body.push_html(text);
                    body.push_str("</p>");
                }
                Content::Component(component) => component.render(ctx, &mut body),
            }
        }

        let mut output = Buffer::default();
        render_page_body(ctx.config, &body, &mut output);
        output.into_string()
    }

    pub(super) fn messages(&self) -> Vec<Message> {
        let styles = self
            .css
            .iter()
            .map(|css| Message::new(CHANNEL_BEFORE, MessageKind::Style, css.as_str()));
        let scripts = self
            .js
            .iter()
            .map(|js| Message::new(CHANNEL_AFTER, MessageKind::Script, js.as_str()));
        let sounds = self.audio.iter().map(|url| {
            Message::new(
                CHANNEL_AUDIO,
                MessageKind::Audio(AudioAction::Play),
                url.as_str(),
            )
        });

        styles.chain(scripts).chain(sounds).collect()
    }
}

#[cfg(test)]
mod tests {
    use drafter_core::ServerConfig;
    use drafter_render::components::{Button, Link, TextBox};

    use super::*;
    use crate::payload::testing::Routes;

    fn render(page: &Page, config: &ServerConfig) -> String {
        page.render(&RenderContext {
            state: None,
            config,
        })
    }

    #[test]
    fn test_strings_become_paragraphs() {
        let config = ServerConfig {
            debug: false,
            ..ServerConfig::default()
        };
        let page = Page::new(0, ["Hello", "<World>"]);

        assert_eq!(
            render(&page, &config),
            r#"<form id="drafter-form" method="post" enctype="multipart/form-data" accept-charset="utf-8"><p>Hello</p><p>&lt;World&gt;</p></form>"#
        );
    }

    #[test]
    fn test_debug_mode_wraps_in_frame() {
        let page = Page::new(0, [TextBox::new("amount")]);
        let html = render(&page, &ServerConfig::default());

        assert!(html.starts_with(r#"<div id="drafter-frame">"#));
        assert!(html.contains(r#"<input type="text" name="amount" value="">"#));
    }

    #[test]
    fn test_verify_walks_content() {
        let routes = Routes::of(&["index", "deposit"]);
        let page = Page::new(
            0,
            [
                Content::from("Pick one"),
                Content::from(Button::new("Deposit", "deposit")),
                Content::from(Link::new("Go", "nonexistent_route")),
            ],
        );

        let error = page.verify(&routes).unwrap_err();
        assert_eq!(error.path, "Page.content[2].Link");
    }

    #[test]
    fn test_audio_message() {
        let page = Page::new(0, ["x"]).with_audio("/static/ding.mp3");
        let messages = page.messages();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].channel_name, CHANNEL_AUDIO);
        assert_eq!(messages[0].kind, MessageKind::Audio(AudioAction::Play));
    }
}
