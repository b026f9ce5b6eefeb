//! Outer HTML frame shared by server-rendered pages and the client bridge.

use drafter_core::ServerConfig;

use crate::{Buffer, Theme};

pub const ROOT_ID: &str = "drafter-root";
pub const SITE_ID: &str = "drafter-site";
pub const FRAME_ID: &str = "drafter-frame";
pub const HEADER_ID: &str = "drafter-header";
pub const BODY_ID: &str = "drafter-body";
pub const FOOTER_ID: &str = "drafter-footer";
pub const FORM_ID: &str = "drafter-form";
pub const DEBUG_ID: &str = "drafter-debug";

const CLIENT_SCRIPT: &str = "drafter.js";

/// Asset urls the frame pulls in, theme first.
pub struct SiteAssets {
    pub css: Vec<String>,
    pub js: Vec<String>,
}

impl SiteAssets {
    pub fn enumerate(config: &ServerConfig, theme: &Theme) -> Self {
        let mut js = theme.js_paths.clone();
        js.push(format!(
            "{}/{CLIENT_SCRIPT}",
            config.assets_url.trim_end_matches('/')
        ));

        Self {
            css: theme.css_paths.clone(),
            js,
        }
    }
}

impl Buffer {
    /// Document head plus the opening root and site containers.
    pub fn with_site_header(config: &ServerConfig, assets: &SiteAssets) -> Self {
        let mut output = Self::default();
        output.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        output.push_str(
            "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n<title>",
        );
        output.push_html(&config.title);
        output.push_str("</title>\n");

        for css in &assets.css {
            output.push_str("<link rel=\"stylesheet\"");
            output.push_attr("href", css);
            output.push_str(">\n");
        }
        for js in &assets.js {
            output.push_str("<script defer");
            output.push_attr("src", js);
            output.push_str("></script>\n");
        }

        output.push_str("</head>\n<body>\n");
        output.open_frame();
        output
    }

    /// Close the site container and append the debug slot.
    pub fn add_site_footer(&mut self) {
        self.close_frame();
        self.push_str("\n</body></html>");
    }

    fn open_frame(&mut self) {
        self.push_str("<div");
        self.push_attr("id", ROOT_ID);
        self.push_str("><div");
        self.push_attr("id", SITE_ID);
        self.push_char('>');
    }

    fn close_frame(&mut self) {
        self.push_str("</div><div");
        self.push_attr("id", DEBUG_ID);
        self.push_str("></div></div>");
    }
}

/// Empty root, site and debug containers for a host that owns the document.
pub fn render_frame() -> Buffer {
    let mut output = Buffer::default();
    output.open_frame();
    output.close_frame();
    output
}

/// Full document around an already rendered page body.
pub fn render_site(config: &ServerConfig, theme: &Theme, body: &str) -> Buffer {
    tracing::debug!("rendering site frame with theme '{}'", theme.name);

    let assets = SiteAssets::enumerate(config, theme);
    let mut output = Buffer::with_site_header(config, &assets);
    output.push_str(body);
    output.add_site_footer();
    output
}

/// Wrap page content in the form and, in debug mode, in the framed
/// header/body/footer container.
pub fn render_page_body(config: &ServerConfig, content: &str, output: &mut Buffer) {
    let framed = config.debug && config.framed;
    if framed {
        output.push_str("<div");
        output.push_attr("id", FRAME_ID);
        output.push_str("><div");
        output.push_attr("id", HEADER_ID);
        output.push_char('>');
        output.push_html(&config.title);
        output.push_str("</div><div");
        output.push_attr("id", BODY_ID);
        output.push_char('>');
    }

    output.push_str("<form");
    output.push_attr("id", FORM_ID);
    output.push_str(" method=\"post\" enctype=\"multipart/form-data\" accept-charset=\"utf-8\">");
    output.push_str(content);
    output.push_str("</form>");

    if framed {
        output.push_str("</div><div");
        output.push_attr("id", FOOTER_ID);
        output.push_str("></div></div>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_has_landmarks() {
        let config = ServerConfig::default();
        let theme = Theme::lookup("default", &config).unwrap();
        let html = render_site(&config, &theme, "<p>hi</p>").into_string();

        for id in [ROOT_ID, SITE_ID, DEBUG_ID] {
            assert!(html.contains(&format!("id=\"{id}\"")), "missing {id}");
        }
        assert!(html.contains(r#"<link rel="stylesheet" href="/assets/themes/default.css">"#));
        assert!(html.contains(r#"<script defer src="/assets/drafter.js"></script>"#));
        assert!(html.contains("<title>Drafter Website</title>"));
    }

    #[test]
    fn test_framed_page_body() {
        let config = ServerConfig::default();
        let mut output = Buffer::empty();
        render_page_body(&config, "<p>x</p>", &mut output);
        let html = output.into_string();

        for id in [FRAME_ID, HEADER_ID, BODY_ID, FOOTER_ID, FORM_ID] {
            assert!(html.contains(&format!("id=\"{id}\"")), "missing {id}");
        }
    }

    #[test]
    fn test_unframed_page_body_is_just_the_form() {
        let config = ServerConfig {
            debug: false,
            ..ServerConfig::default()
        };
        let mut output = Buffer::empty();
        render_page_body(&config, "<p>x</p>", &mut output);

        assert!(output.starts_with("<form id=\"drafter-form\""));
        assert!(output.ends_with("<p>x</p></form>"));
    }

    #[test]
    fn test_none_theme_only_loads_client_script() {
        let config = ServerConfig::default();
        let theme = Theme::lookup("none", &config).unwrap();
        let assets = SiteAssets::enumerate(&config, &theme);

        assert!(assets.css.is_empty());
        assert_eq!(assets.js, ["/assets/drafter.js"]);
    }

    #[test]
    fn test_bare_frame() {
        assert_eq!(
            render_frame().into_string(),
            r#"<div id="drafter-root"><div id="drafter-site"></div><div id="drafter-debug"></div></div>"#
        );
    }
}
