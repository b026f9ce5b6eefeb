//! Running a site inside a host page.
//!
//! In the browser there is no HTTP round trip: a [`Bridge`] owns the DOM and
//! every navigation goes straight through [`ClientServer::visit`].

use std::sync::Arc;

use drafter_core::{Action, Event, Request, Response, ServerConfig};
use drafter_render::{SiteAssets, Theme, UnknownTheme};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    client_server::{ClientServer, StartError},
    monitor::ListenerId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runtime {
    /// Inside a browser page, talking to a [`Bridge`].
    Browser,
    /// Behind the local HTTP and websocket shim.
    Local,
}

impl Runtime {
    pub fn detect() -> Self {
        if cfg!(target_arch = "wasm32") {
            Runtime::Browser
        } else {
            Runtime::Local
        }
    }
}

/// The host side of a browser deployment.
pub trait Bridge: Send + Sync + 'static {
    /// Install the empty site frame.
    fn mount(&self, frame: &str);

    fn inject_css(&self, url: &str);

    fn inject_js(&self, url: &str);

    /// Apply a response: swap the body or target, run channel messages.
    fn apply(&self, response: &Response);

    /// Monitor telemetry for the client-side debug view.
    fn telemetry(&self, _event: &Event) {}
}

/// A DOM event that should turn into a visit.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationEvent {
    pub action: Action,
    pub url: String,
    pub kwargs: Map<String, Value>,
    /// Raw DOM event details, passed through untouched.
    pub details: Map<String, Value>,
}

impl NavigationEvent {
    pub fn load(url: impl Into<String>) -> Self {
        Self::new(Action::Load, url)
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        Self::new(Action::Navigate, url)
    }

    pub fn submit(url: impl Into<String>, kwargs: Map<String, Value>) -> Self {
        Self {
            kwargs,
            ..Self::new(Action::Submit, url)
        }
    }

    fn new(action: Action, url: impl Into<String>) -> Self {
        Self {
            action,
            url: url.into(),
            kwargs: Map::new(),
            details: Map::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error(transparent)]
    Theme(#[from] UnknownTheme),
    #[error(transparent)]
    Start(#[from] StartError),
}

/// Routes DOM events through the server and hands responses to the bridge.
pub struct Navigator<B: Bridge> {
    server: ClientServer,
    bridge: Arc<B>,
    listener: ListenerId,
    next_request_id: u64,
}

impl<B: Bridge> Navigator<B> {
    pub fn navigate(&mut self, event: NavigationEvent) -> Response {
        self.next_request_id += 1;
        let mut request = Request::new(self.next_request_id, event.action, event.url);
        request.kwargs = event.kwargs;
        request.event = event.details;

        let response = self.server.visit(request);
        self.bridge.apply(&response);
        response
    }

    pub fn server(&self) -> &ClientServer {
        &self.server
    }

    pub fn server_mut(&mut self) -> &mut ClientServer {
        &mut self.server
    }

    pub fn config(&self) -> &ServerConfig {
        self.server.config()
    }

    /// Detach the bridge and give the server back.
    pub fn into_server(self) -> ClientServer {
        self.server.monitor().remove_listener(self.listener);
        self.server
    }
}

/// Mount the site through `bridge` and show the index page.
pub fn launch_in_browser<B, S>(
    mut server: ClientServer,
    bridge: Arc<B>,
    initial_state: &S,
) -> Result<Navigator<B>, LaunchError>
where
    B: Bridge,
    S: Serialize + ?Sized,
{
    let theme = Theme::from_config(server.config())?;

    let telemetry = bridge.clone();
    let listener = server
        .monitor()
        .add_listener(move |event| telemetry.telemetry(event));

    bridge.mount(&drafter_render::render_frame());
    let assets = SiteAssets::enumerate(server.config(), &theme);
    for css in &assets.css {
        bridge.inject_css(css);
    }
    // the client script is the bridge itself here
    for js in &theme.js_paths {
        bridge.inject_js(js);
    }

    if let Err(error) = server.start(initial_state) {
        server.monitor().remove_listener(listener);
        return Err(error.into());
    }
    tracing::info!("launched \"{}\" in the browser", server.config().title);

    let mut navigator = Navigator {
        server,
        bridge,
        listener,
        next_request_id: 0,
    };
    navigator.navigate(NavigationEvent::load("index"));
    Ok(navigator)
}
