use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use drafter_core::{
    Message, MessageKind, RouteTable, RouteUrl,
    message::{CHANNEL_AFTER, DownloadInfo},
};
use drafter_render::{Buffer, Content, RenderContext, VerifyError};
use serde::Serialize;

use super::{Payload, StateValue};

#[derive(Debug)]
enum FragmentBody {
    Html(String),
    Content(Vec<Content>),
}

/// Replacement for one named region of the page. Leaves the state alone.
#[derive(Debug)]
pub struct Fragment {
    pub target_id: String,
    body: FragmentBody,
}

impl Fragment {
    pub fn new<I, C>(target_id: impl Into<String>, content: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Content>,
    {
        Self {
            target_id: target_id.into(),
            body: FragmentBody::Content(content.into_iter().map(Into::into).collect()),
        }
    }

    /// Pre-rendered HTML, used as is.
    pub fn html(target_id: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            body: FragmentBody::Html(html.into()),
        }
    }

    pub(super) fn render(&self, ctx: &RenderContext<'_>) -> String {
        match &self.body {
            FragmentBody::Html(html) => html.clone(),
            FragmentBody::Content(content) => {
                let mut output = Buffer::default();
                for item in content {
                    item.render(ctx, &mut output);
                }
                output.into_string()
            }
        }
    }

    pub(super) fn verify(&self, routes: &dyn RouteTable) -> Result<(), VerifyError> {
        if self.target_id.is_empty() {
            return Err(VerifyError::new("Fragment", "fragment target id is empty"));
        }
        match &self.body {
            FragmentBody::Html(_) => Ok(()),
            FragmentBody::Content(content) => {
                content.iter().enumerate().try_for_each(|(index, item)| {
                    item.verify(routes, &format!("Fragment.content[{index}]"))
                })
            }
        }
    }
}

/// New state without any visible change.
pub struct Update {
    state: Box<dyn StateValue>,
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Update")
            .field("state", &self.state.type_name())
            .finish()
    }
}

impl Update {
    pub fn new<S: Serialize + Send + 'static>(state: S) -> Self {
        Self {
            state: Box::new(state),
        }
    }

    pub fn state(&self) -> &dyn StateValue {
        &*self.state
    }
}

/// Navigate the client to another route, optionally showing a payload there.
#[derive(Debug)]
pub struct Redirect {
    target_route: String,
    next: Option<Box<Payload>>,
}

impl Redirect {
    pub fn new(target_route: impl Into<String>) -> Self {
        Self {
            target_route: target_route.into(),
            next: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Payload>) -> Self {
        self.next = Some(Box::new(payload.into()));
        self
    }

    /// Normalized target url.
    pub fn target(&self) -> String {
        RouteUrl::new(&self.target_route).to_string()
    }

    pub fn next(&self) -> Option<&Payload> {
        self.next.as_deref()
    }

    pub(super) fn verify(&self, routes: &dyn RouteTable) -> Result<(), VerifyError> {
        if !routes.has_route(&RouteUrl::new(&self.target_route)) {
            return Err(VerifyError::new(
                "Redirect",
                format!(
                    "redirect target \"{}\" is not a registered route",
                    self.target_route
                ),
            ));
        }
        match self.next() {
            Some(next) => next.verify(routes),
            None => Ok(()),
        }
    }
}

pub const PROGRESS_TARGET_ID: &str = "drafter-progress";

/// Intermediate update for a long running operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub message: String,
    pub percent: Option<f64>,
    pub html: Option<String>,
    pub target_id: String,
}

impl Progress {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            percent: None,
            html: None,
            target_id: PROGRESS_TARGET_ID.into(),
        }
    }

    pub fn with_percent(mut self, percent: f64) -> Self {
        self.percent = Some(percent);
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn with_target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = target_id.into();
        self
    }

    pub(super) fn render(&self) -> String {
        if let Some(html) = &self.html {
            return html.clone();
        }

        let mut output = Buffer::empty();
        output.push_str("<p>");
        output.push_html(&self.message);
        output.push_str("</p>");
        if let Some(percent) = self.percent {
            output.push_str("<progress max=\"100\"");
            output.push_attr("value", &format!("{percent}"));
            output.push_str("></progress>");
        }
        output.into_string()
    }

    pub(super) fn verify(&self) -> Result<(), VerifyError> {
        match self.percent {
            Some(percent) if !(0.0..=100.0).contains(&percent) => Err(VerifyError::new(
                "Progress",
                format!("progress percentage {percent} is outside 0..=100"),
            )),
            _ => Ok(()),
        }
    }
}

/// File handed to the browser for saving. Produces no body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub content: Vec<u8>,
    pub mime_type: String,
}

impl Download {
    pub fn new(file_name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let file_name = file_name.into();
        let mime_type = guess_mime_type(&file_name).to_string();
        Self {
            file_name,
            content: content.into(),
            mime_type,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn info(&self) -> DownloadInfo {
        DownloadInfo {
            file_name: self.file_name.clone(),
            mime_type: self.mime_type.clone(),
            size: self.content.len(),
        }
    }

    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            STANDARD.encode(&self.content)
        )
    }

    pub(super) fn verify(&self) -> Result<(), VerifyError> {
        if self.file_name.is_empty() || self.file_name.contains(['/', '\\']) {
            return Err(VerifyError::new(
                "Download",
                format!("\"{}\" is not a valid file name", self.file_name),
            ));
        }
        Ok(())
    }

    pub(super) fn messages(&self) -> Result<Message, serde_json::Error> {
        Ok(Message::new(
            CHANNEL_AFTER,
            MessageKind::Script,
            format!(
                "Drafter.download({}, {});",
                serde_json::to_string(&self.file_name)?,
                serde_json::to_string(&self.data_url())?
            ),
        )
        .with_sigil("download"))
    }
}

fn guess_mime_type(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "txt" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
