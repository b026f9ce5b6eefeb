use drafter_core::{DrafterError, ServerConfig};
use drafter_render::{Buffer, render_page_body};

/// The framework's own fault page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPage {
    pub error: DrafterError,
}

impl ErrorPage {
    pub fn new(error: DrafterError) -> Self {
        Self { error }
    }

    pub(super) fn render(&self, config: &ServerConfig) -> String {
        let mut body = Buffer::default();
        if config.debug {
            self.render_detailed(&mut body);
        } else {
            self.render_brief(&mut body);
        }

        let mut output = Buffer::default();
        render_page_body(config, &body, &mut output);
        output.into_string()
    }

    fn render_detailed(&self, output: &mut Buffer) {
        let error = &self.error;
        output.push_str(
            "<div class=\"drafter-error\" style=\"border: 2px solid #c33; padding: 1em; margin: 1em 0\">",
        );
        output.push_str("<h3>An error occurred</h3><pre>");
        for (label, value) in [
            ("Message", error.message.as_str()),
            ("Details", error.details.as_str()),
            ("Where", error.location.as_str()),
            ("URL", error.url.as_str()),
        ] {
            output.push_str("<strong>");
            output.push_str(label);
            output.push_str(":</strong> ");
            output.push_html(value);
            output.push_char('\n');
        }
        if let Some(traceback) = &error.traceback {
            output.push_str("<strong>Traceback:</strong>\n");
            output.push_html(traceback);
        }
        output.push_str("</pre></div>");
    }

    fn render_brief(&self, output: &mut Buffer) {
        output.push_str("<div class=\"drafter-error\"><p>");
        output.push_html(&self.error.message);
        output.push_str("</p><pre>");
        output.push_html(&self.error.details);
        output.push_str("</pre></div>");
    }
}

/// Last-resort page used when the error page itself cannot be rendered.
pub fn simple_error_page(error: &DrafterError) -> String {
    let mut output = Buffer::empty();
    output.push_str("<pre>");
    output.push_html(&error.to_string());
    output.push_str("</pre>");
    output.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error() -> DrafterError {
        DrafterError::new(
            "No route found for \"/missing\"",
            "Router.resolve",
            "Known routes: index",
        )
        .with_url("/missing")
    }

    #[test]
    fn test_detailed_error_page_lists_fields() {
        let html = ErrorPage::new(error()).render(&ServerConfig::default());

        for label in ["Message", "Details", "Where", "URL"] {
            assert!(html.contains(&format!("<strong>{label}:</strong>")));
        }
        assert!(html.contains("Router.resolve"));
        assert!(!html.contains("Traceback"));
    }

    #[test]
    fn test_brief_error_page_without_debug() {
        let config = ServerConfig {
            debug: false,
            ..ServerConfig::default()
        };
        let html = ErrorPage::new(error()).render(&config);

        assert!(html.contains("Known routes: index"));
        assert!(!html.contains("<strong>Where:</strong>"));
    }

    #[test]
    fn test_simple_error_page_escapes() {
        let html = simple_error_page(&DrafterError::new("<boom>", "here", "x"));
        assert_eq!(html, "<pre>&lt;boom&gt; (here): x</pre>");
    }
}
