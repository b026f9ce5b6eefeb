use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    AuditRecord,
    event::Event,
    id::{RequestId, ResponseId},
};

pub const CHANNEL_BEFORE: &str = "before";
pub const CHANNEL_AFTER: &str = "after";
pub const CHANNEL_AUDIO: &str = "audio";
pub const CHANNEL_DEBUG: &str = "debug";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Load,
    Submit,
    Navigate,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Load => "load",
            Action::Submit => "submit",
            Action::Navigate => "navigate",
        }
    }
}

/// One client request. Immutable once created by the transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    #[serde(default)]
    pub action: Action,
    pub url: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    #[serde(default)]
    pub kwargs: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub event: serde_json::Map<String, serde_json::Value>,
}

impl Request {
    pub fn new(id: u64, action: Action, url: impl Into<String>) -> Self {
        Self {
            id: RequestId(id),
            action,
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_kwarg(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.kwargs.insert(name.into(), value);
        self
    }

    pub fn with_arg(mut self, value: serde_json::Value) -> Self {
        self.args.push(value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AudioAction {
    Play,
    Pause,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Script,
    Style,
    Html,
    #[serde(untagged)]
    Audio(AudioAction),
}

/// Auxiliary instruction carried on a response channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub channel_name: String,
    pub kind: MessageKind,
    #[serde(default)]
    pub sigil: Option<String>,
    pub content: String,
}

impl Message {
    pub fn new(channel_name: &str, kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            channel_name: channel_name.to_string(),
            kind,
            sigil: None,
            content: content.into(),
        }
    }

    pub fn with_sigil(mut self, sigil: impl Into<String>) -> Self {
        self.sigil = Some(sigil.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadKind {
    #[default]
    Page,
    Fragment,
    Update,
    Redirect,
    Progress,
    Download,
    ErrorPage,
    SimpleErrorPage,
}

impl PayloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadKind::Page => "Page",
            PayloadKind::Fragment => "Fragment",
            PayloadKind::Update => "Update",
            PayloadKind::Redirect => "Redirect",
            PayloadKind::Progress => "Progress",
            PayloadKind::Download => "Download",
            PayloadKind::ErrorPage => "ErrorPage",
            PayloadKind::SimpleErrorPage => "SimpleErrorPage",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadInfo {
    pub file_name: String,
    pub mime_type: String,
    pub size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// DOM id the body replaces; `None` means the page body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<DownloadInfo>,
    /// Pretty representation of the route call, e.g. `deposit(state, amount=20)`.
    #[serde(default)]
    pub call: String,
    #[serde(default)]
    pub state_changed: bool,
}

/// Result of one visit. Never mutated after emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: ResponseId,
    pub request_id: RequestId,
    pub url: String,
    pub status_code: u16,
    pub message: String,
    pub body: Option<String>,
    pub payload: PayloadKind,
    pub channels: BTreeMap<String, Vec<Message>>,
    pub errors: Vec<AuditRecord>,
    pub warnings: Vec<AuditRecord>,
    pub metadata: ResponseMetadata,
}

impl Response {
    pub fn is_success(&self) -> bool {
        self.status_code < 300
    }

    pub fn channel(&self, name: &str) -> &[Message] {
        self.channels.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "response")]
    Response { response: Box<Response> },
    #[serde(rename = "event")]
    Event { event: Box<Event> },
    #[serde(rename = "reload")]
    Reload,
    #[serde(rename = "error")]
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "visit")]
    Visit { request: Request },
}
