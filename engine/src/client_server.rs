//! The request pipeline.
//!
//! [`ClientServer::visit`] turns one [`Request`] into exactly one
//! [`Response`]. Each stage has its own failure code so the debug panel shows
//! where a visit went wrong:
//!
//! | stage | code |
//! |-------|------|
//! | resolve route | 404 |
//! | prepare arguments | 400 |
//! | run route | 500 |
//! | check payload type | 501 |
//! | verify payload | 502 |
//! | render | 503 |
//! | format for history | 509 |
//! | state update | 403 / 501 |
//! | collect messages | 510 |

use std::{
    collections::BTreeMap,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use drafter_core::{
    AuditRecord, Correlation, DrafterError, Event, EventBus, EventData, Level, Message,
    MessageKind, PayloadKind, Request, Response, ResponseId, RouteTable, RouteUrl, ServerConfig,
    SiteState, StateSnapshot, message::{CHANNEL_DEBUG, ResponseMetadata},
};
use drafter_render::{Buffer, RenderContext, Theme, UnknownTheme};
use serde::Serialize;

use crate::{
    audit::Audit,
    handler::{Handler, RouteOutput},
    monitor::{Monitor, VisitRecord, panic_message},
    payload::{ErrorPage, Payload, simple_error_page},
    router::{RouteError, Router},
};

const SOURCE: &str = "server";

/// A stage failure inside [`ClientServer::visit`]. Never escapes it.
#[derive(Debug)]
pub struct VisitError {
    pub error: DrafterError,
    pub status_code: u16,
}

impl VisitError {
    fn new(
        status_code: u16,
        message: impl Into<String>,
        location: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            error: DrafterError::new(message, location, details),
            status_code,
        }
    }

    fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.error = self.error.with_traceback(traceback);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("the initial state cannot be captured: {0}")]
    State(#[from] serde_json::Error),
    #[error(transparent)]
    Theme(#[from] UnknownTheme),
}

/// What a successful run of the pipeline hands to the response builder.
struct Outcome {
    url: String,
    body: Option<String>,
    payload: PayloadKind,
    messages: Vec<Message>,
    metadata: ResponseMetadata,
    formatted: String,
}

pub struct ClientServer {
    config: ServerConfig,
    router: Router,
    state: SiteState,
    bus: Arc<EventBus>,
    monitor: Monitor,
    audit: Audit,
    next_response_id: u64,
}

impl std::fmt::Debug for ClientServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientServer")
            .field("config", &self.config)
            .field("routes", &self.router.len())
            .field("state", &self.state.current())
            .finish_non_exhaustive()
    }
}

impl Default for ClientServer {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl ClientServer {
    pub fn new(config: ServerConfig) -> Self {
        let bus = Arc::new(EventBus::with_capacity(config.event_queue_capacity));
        let monitor = Monitor::attach(&bus, config.monitor_capacity);
        let audit = Audit::new(bus.clone());

        Self {
            config,
            router: Router::new(),
            state: SiteState::new(),
            bus,
            monitor,
            audit,
            next_response_id: 0,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ServerConfig {
        &mut self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn state(&self) -> &SiteState {
        &self.state
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn audit(&self) -> &Audit {
        &self.audit
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Register a route function; see [`Router::add_route`].
    pub fn add_route<F, Args>(
        &mut self,
        url: &str,
        names: &[&str],
        handler: F,
    ) -> Result<(), RouteError>
    where
        F: Handler<Args>,
        Args: 'static,
    {
        let route = self.router.add_route(url, names, handler)?;
        let data = EventData::RouteAdded {
            url: route.url.to_string(),
            signature: route.signature.to_string(),
        };
        self.bus.publish(Event::new(SOURCE, Correlation::default(), data));
        Ok(())
    }

    /// Install the initial state. Also checks that the configured theme exists.
    pub fn start<S: Serialize + ?Sized>(&mut self, initial_state: &S) -> Result<(), StartError> {
        Theme::from_config(&self.config)?;
        let snapshot = StateSnapshot::capture(initial_state)?;
        tracing::info!(
            "starting \"{}\" with {} routes and a {} state",
            self.config.title,
            self.router.len(),
            snapshot.short_type_name()
        );
        self.state.update(snapshot);

        let data = EventData::ServerStarted {
            routes: self.router.len(),
        };
        self.bus.publish(Event::new(SOURCE, Correlation::default(), data));
        Ok(())
    }

    /// Restore the initial state.
    pub fn reset(&mut self) {
        self.state.reset();
        let type_name = self
            .state
            .current()
            .map(|snapshot| snapshot.short_type_name().to_string());
        tracing::info!("state reset");

        let data = EventData::StateUpdated {
            changed: type_name.is_some(),
            type_name,
        };
        self.bus.publish(Event::new(SOURCE, Correlation::default(), data));
    }

    /// Wrap a rendered body in the full HTML document.
    pub fn render_site(&self, body: &str) -> Result<Buffer, UnknownTheme> {
        let theme = Theme::from_config(&self.config)?;
        Ok(drafter_render::render_site(&self.config, &theme, body))
    }

    /// HTML of the monitor's debug panel.
    pub fn debug_panel(&self) -> String {
        self.monitor
            .render_panel(self.state.current(), &self.router.route_urls())
    }

    /// Run `request` through the pipeline. Always returns a response.
    pub fn visit(&mut self, request: Request) -> Response {
        let url = RouteUrl::new(&request.url);
        let _scope = self.audit.enter(request.id, &url);
        let mut correlation = Correlation::for_request(request.id, &url);
        tracing::debug!("visit #{} {} {}", request.id, request.action.as_str(), url);

        self.publish(
            &mut correlation,
            EventData::RequestReceived {
                url: url.to_string(),
                action: request.action.as_str().to_string(),
            },
        );

        let mut call = String::new();
        let response = match self.run(&request, &url, &mut correlation, &mut call) {
            Ok(outcome) => self.make_response(&request, outcome, call),
            Err(error) => self.make_error_response(&request, error, call),
        };

        correlation.response_id = Some(response.id);
        self.publish(
            &mut correlation,
            EventData::ResponseSent {
                status_code: response.status_code,
                payload: response.payload,
            },
        );
        response
    }

    fn run(
        &mut self,
        request: &Request,
        url: &RouteUrl,
        correlation: &mut Correlation,
        call_repr: &mut String,
    ) -> Result<Outcome, VisitError> {
        let route = self.router.resolve(url).ok_or_else(|| {
            let known: Vec<_> = self.router.routes().map(|route| route.name()).collect();
            VisitError::new(
                404,
                format!("No route found for \"{}\"", url.name()),
                "Router.resolve",
                format!("Known routes: {}", known.join(", ")),
            )
        })?;
        let route_name = route.name().to_string();
        let location = format!("route {route_name}");
        self.publish(correlation, EventData::RouteResolved { url: url.to_string() });

        let prepared = self
            .router
            .prepare_arguments(route, request, self.state.current())
            .map_err(|error| {
                VisitError::new(
                    400,
                    format!("Could not prepare the arguments for {route_name}"),
                    "Router.prepare_arguments",
                    error.to_string(),
                )
            })?;
        for warning in &prepared.warnings {
            self.audit
                .warning("Too many arguments", "Router.prepare_arguments", warning.as_str());
        }
        *call_repr = prepared.repr.clone();
        let call = route.bind(prepared).map_err(|error| {
            VisitError::new(
                400,
                format!("Could not prepare the arguments for {route_name}"),
                "Router.prepare_arguments",
                error.to_string(),
            )
        })?;
        tracing::debug!("calling {call_repr}");
        self.publish(
            correlation,
            EventData::ArgumentsPrepared {
                call: call_repr.clone(),
            },
        );

        let output = catch_unwind(AssertUnwindSafe(call)).map_err(|panic| {
            let message = panic_message(panic.as_ref());
            VisitError::new(
                500,
                format!("Error while running {route_name}"),
                &location,
                format!("the route panicked: {message}"),
            )
            .with_traceback(message)
        })?;

        let payload = match output {
            RouteOutput::Payload(payload) => payload,
            RouteOutput::Failed(error) => {
                return Err(VisitError::new(
                    500,
                    format!("Error while running {route_name}"),
                    &location,
                    format!("{error:#}"),
                )
                .with_traceback(format!("{error:?}")));
            }
            RouteOutput::NotPayload { type_name, value } => {
                return Err(VisitError::new(
                    501,
                    format!("{route_name} did not return a page"),
                    &location,
                    format!(
                        "expected a Page or another payload, but the route returned a {type_name}: {value}"
                    ),
                ));
            }
        };
        self.publish(correlation, EventData::RouteExecuted { url: url.to_string() });

        let kind = payload.kind();
        payload.verify(&self.router).map_err(|error| {
            VisitError::new(
                502,
                format!("{} returned by {route_name} failed verification", kind.as_str()),
                error.path,
                error.reason,
            )
        })?;
        self.publish(correlation, EventData::PayloadVerified { payload: kind });

        let body = {
            let ctx = RenderContext {
                state: self.state.current(),
                config: &self.config,
            };
            catch_unwind(AssertUnwindSafe(|| payload.render(&ctx))).map_err(|panic| {
                VisitError::new(
                    503,
                    format!("Could not render the {} returned by {route_name}", kind.as_str()),
                    format!("{}.render", kind.as_str()),
                    panic_message(panic.as_ref()),
                )
            })?
        };
        self.publish(
            correlation,
            EventData::PayloadRendered {
                payload: kind,
                length: body.as_ref().map_or(0, String::len),
            },
        );

        let formatted = payload.format().map_err(|error| {
            VisitError::new(
                509,
                format!("Could not format the {} for the history", kind.as_str()),
                format!("{}.format", kind.as_str()),
                error.to_string(),
            )
        })?;
        self.publish(
            correlation,
            EventData::PayloadFormatted {
                summary: formatted.lines().next().unwrap_or_default().to_string(),
            },
        );

        let staged = payload.get_state_updates().map_err(|error| {
            VisitError::new(
                403,
                format!("Could not capture the state returned by {route_name}"),
                &location,
                error.to_string(),
            )
        })?;
        if let Some(candidate) = &staged {
            self.state.check_type(candidate).map_err(|mismatch| {
                VisitError::new(
                    501,
                    "The state changed type",
                    &location,
                    format!(
                        "{route_name} was given a {} state, but returned a {} state: {}",
                        short(mismatch.expected),
                        short(mismatch.found),
                        mismatch.value
                    ),
                )
            })?;
        }

        let messages = payload.get_messages(&self.config).map_err(|error| {
            VisitError::new(
                510,
                format!("Could not collect the messages of the {}", kind.as_str()),
                format!("{}.get_messages", kind.as_str()),
                error.to_string(),
            )
        })?;
        self.publish(
            correlation,
            EventData::MessagesCollected {
                count: messages.len(),
            },
        );

        let changed = staged.is_some();
        let type_name = staged
            .as_ref()
            .map(|snapshot| snapshot.short_type_name().to_string());
        if let Some(snapshot) = staged {
            self.state.update(snapshot);
        }
        self.publish(correlation, EventData::StateUpdated { changed, type_name });

        let mut metadata = ResponseMetadata {
            call: call_repr.clone(),
            state_changed: changed,
            ..ResponseMetadata::default()
        };
        payload.apply_metadata(&mut metadata);

        Ok(Outcome {
            url: metadata.redirect.clone().unwrap_or_else(|| url.to_string()),
            body,
            payload: kind,
            messages,
            metadata,
            formatted,
        })
    }

    fn make_response(&mut self, request: &Request, outcome: Outcome, call: String) -> Response {
        self.monitor.record_visit(VisitRecord {
            request_id: request.id,
            url: outcome.url.clone(),
            call,
            status_code: 200,
            payload: outcome.payload,
            formatted: outcome.formatted,
        });

        let mut messages = outcome.messages;
        if self.config.debug {
            messages.push(
                Message::new(CHANNEL_DEBUG, MessageKind::Html, self.debug_panel())
                    .with_sigil("debug-panel"),
            );
        }
        let (errors, warnings) = split_records(self.audit.records());

        Response {
            id: self.next_response_id(),
            request_id: request.id,
            url: outcome.url,
            status_code: 200,
            message: "OK".into(),
            body: outcome.body,
            payload: outcome.payload,
            channels: group_by_channel(messages),
            errors,
            warnings,
            metadata: outcome.metadata,
        }
    }

    /// Render an error page for a failed visit, falling back to a bare one if
    /// that fails too.
    fn make_error_response(
        &mut self,
        request: &Request,
        failure: VisitError,
        call: String,
    ) -> Response {
        let VisitError {
            mut error,
            status_code,
        } = failure;
        if error.url.is_empty() {
            error.url = request.url.clone();
        }
        tracing::warn!("visit #{} failed with {status_code}: {error}", request.id);
        self.audit.error(
            error.message.clone(),
            &error.location,
            error.details.clone(),
            error.traceback.clone(),
        );

        let page = Payload::from(ErrorPage::new(error.clone()));
        let ctx = RenderContext {
            state: self.state.current(),
            config: &self.config,
        };
        let (body, payload) = match catch_unwind(AssertUnwindSafe(|| page.render(&ctx))) {
            Ok(Some(body)) => (body, PayloadKind::ErrorPage),
            Ok(None) | Err(_) => (simple_error_page(&error), PayloadKind::SimpleErrorPage),
        };

        self.monitor.record_visit(VisitRecord {
            request_id: request.id,
            url: request.url.clone(),
            call: call.clone(),
            status_code,
            payload,
            formatted: format!("{}({:?})", payload.as_str(), error.message),
        });
        let (errors, warnings) = split_records(self.audit.records());

        Response {
            id: self.next_response_id(),
            request_id: request.id,
            url: request.url.clone(),
            status_code,
            message: error.message,
            body: Some(body),
            payload,
            channels: BTreeMap::new(),
            errors,
            warnings,
            metadata: ResponseMetadata {
                call,
                ..ResponseMetadata::default()
            },
        }
    }

    fn next_response_id(&mut self) -> ResponseId {
        self.next_response_id += 1;
        ResponseId(self.next_response_id)
    }

    /// Publish `data`, chaining it to the previous event of the same visit.
    fn publish(&self, correlation: &mut Correlation, data: EventData) {
        let id = self
            .bus
            .publish(Event::new(SOURCE, correlation.clone(), data));
        correlation.causation_id = Some(id);
    }
}

fn short(type_name: &'static str) -> &'static str {
    drafter_core::state::short_type_name(type_name)
}

fn split_records(records: Vec<AuditRecord>) -> (Vec<AuditRecord>, Vec<AuditRecord>) {
    let (errors, rest): (Vec<_>, Vec<_>) = records
        .into_iter()
        .partition(|record| record.level == Level::Error);
    let warnings = rest
        .into_iter()
        .filter(|record| record.level == Level::Warning)
        .collect();
    (errors, warnings)
}

fn group_by_channel(messages: Vec<Message>) -> BTreeMap<String, Vec<Message>> {
    let mut channels: BTreeMap<String, Vec<Message>> = BTreeMap::new();
    for message in messages {
        channels
            .entry(message.channel_name.clone())
            .or_default()
            .push(message);
    }
    channels
}

#[cfg(test)]
mod tests {
    use drafter_core::{Action, message::CHANNEL_BEFORE};
    use drafter_render::components::{Button, Link};
    use serde::Deserialize;

    use super::*;
    use crate::{
        extract::State,
        payload::{Fragment, Page, Redirect, Update},
    };

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Counter {
        count: i64,
    }

    fn server() -> ClientServer {
        let mut server = ClientServer::new(ServerConfig {
            debug: false,
            ..ServerConfig::default()
        });
        let index = |State(counter): State<Counter>| {
            Page::new(counter.clone(), vec![format!("Count: {}", counter.count)])
        };
        server.add_route("index", &[], index).unwrap();
        server.start(&Counter { count: 0 }).unwrap();
        server
    }

    fn get(url: &str) -> Request {
        Request::new(1, Action::Load, url)
    }

    #[test]
    fn test_index_renders() {
        let mut server = server();
        let response = server.visit(get("/"));

        assert_eq!(response.status_code, 200);
        assert_eq!(response.payload, PayloadKind::Page);
        assert!(response.body.unwrap().contains("<p>Count: 0</p>"));
        assert_eq!(response.request_id.0, 1);
    }

    #[test]
    fn test_unknown_route_is_404() {
        let mut server = server();
        let response = server.visit(get("/missing"));

        assert_eq!(response.status_code, 404);
        assert_eq!(response.payload, PayloadKind::ErrorPage);
        assert!(response.message.contains("missing"));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(server.state().history().len(), 1);
    }

    #[test]
    fn test_bad_argument_is_400() {
        let mut server = server();
        let add = |State(mut counter): State<Counter>, amount: i64| {
            counter.count += amount;
            Page::new(counter, Vec::<String>::new())
        };
        server.add_route("add", &["amount"], add).unwrap();

        let response = server.visit(get("/add").with_kwarg("amount", "lots".into()));
        assert_eq!(response.status_code, 400);
        assert!(response.errors[0].details.contains("cannot convert"));
    }

    #[test]
    fn test_panicking_route_is_500() {
        let mut server = server();
        let boom = || -> Page { panic!("kaboom") };
        server.add_route("boom", &[], boom).unwrap();

        let response = server.visit(get("/boom"));
        assert_eq!(response.status_code, 500);
        assert!(response.errors[0].details.contains("kaboom"));
        assert_eq!(server.audit().depth(), 0);
    }

    #[test]
    fn test_failed_route_is_500() {
        let mut server = server();
        let fail = || -> anyhow::Result<Page> { anyhow::bail!("no such account") };
        server.add_route("fail", &[], fail).unwrap();

        let response = server.visit(get("/fail"));
        assert_eq!(response.status_code, 500);
        assert!(response.errors[0].details.contains("no such account"));
    }

    #[test]
    fn test_string_return_is_501() {
        let mut server = server();
        let oops = || "just text";
        server.add_route("oops", &[], oops).unwrap();

        let response = server.visit(get("/oops"));
        assert_eq!(response.status_code, 501);
        assert!(response.errors[0].details.contains("&str"));
    }

    #[test]
    fn test_broken_link_is_502() {
        let mut server = server();
        let page = |State(counter): State<Counter>| {
            Page::new(counter, vec![Link::new("Go", "nowhere")])
        };
        server.add_route("links", &[], page).unwrap();

        let response = server.visit(get("/links"));
        assert_eq!(response.status_code, 502);
        assert_eq!(response.errors[0].location, "Page.content[0].Link");
    }

    #[test]
    fn test_fragment_keeps_state() {
        let mut server = server();
        let fragment = || Fragment::html("total", "<b>3</b>");
        server.add_route("total", &[], fragment).unwrap();

        let response = server.visit(get("/total"));
        assert_eq!(response.status_code, 200);
        assert_eq!(response.metadata.target_id.as_deref(), Some("total"));
        assert!(!response.metadata.state_changed);
        assert_eq!(server.state().history().len(), 1);
    }

    #[test]
    fn test_update_commits_state_without_body() {
        let mut server = server();
        let bump = |State(counter): State<Counter>| {
            Update::new(Counter {
                count: counter.count + 1,
            })
        };
        server.add_route("bump", &[], bump).unwrap();

        let response = server.visit(get("/bump"));
        assert_eq!(response.body, None);
        assert!(response.metadata.state_changed);
        let current = server.state().current().unwrap().restore::<Counter>().unwrap();
        assert_eq!(current.count, 1);
    }

    #[test]
    fn test_redirect_changes_url() {
        let mut server = server();
        let go_home = || Redirect::new("index");
        server.add_route("home", &[], go_home).unwrap();

        let response = server.visit(get("/home"));
        assert_eq!(response.status_code, 200);
        assert_eq!(response.url, "/");
        assert_eq!(response.metadata.redirect.as_deref(), Some("/"));
    }

    #[test]
    fn test_debug_panel_message() {
        let mut server = server();
        server.config_mut().debug = true;

        let response = server.visit(get("/"));
        let debug = response.channel(CHANNEL_DEBUG);
        assert_eq!(debug.len(), 1);
        assert_eq!(debug[0].kind, MessageKind::Html);
        assert!(response.channel(CHANNEL_BEFORE).is_empty());
    }

    #[test]
    fn test_response_ids_increase() {
        let mut server = server();
        let first = server.visit(get("/"));
        let second = server.visit(get("/missing"));
        assert!(second.id > first.id);
    }

    #[test]
    fn test_events_are_chained() {
        let mut server = server();
        let events = server.monitor().clone();
        server.visit(get("/"));

        let snapshot = events.snapshot();
        let sent = snapshot
            .events
            .iter()
            .find(|event| event.event_type == "response.sent")
            .unwrap();
        assert!(sent.correlation.causation_id.is_some());
        assert_eq!(sent.correlation.request_id.map(|id| id.0), Some(1));
        assert!(sent.correlation.response_id.is_some());
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut server = server();
        let bump = |State(counter): State<Counter>| {
            Update::new(Counter {
                count: counter.count + 5,
            })
        };
        server.add_route("bump", &[], bump).unwrap();
        server.visit(get("/bump"));
        server.reset();

        let current = server.state().current().unwrap().restore::<Counter>().unwrap();
        assert_eq!(current.count, 0);
    }

    #[test]
    fn test_unknown_theme_fails_start() {
        let mut server = ClientServer::new(ServerConfig {
            theme: "sakuraa".into(),
            ..ServerConfig::default()
        });
        let error = server.start(&Counter { count: 0 }).unwrap_err();
        assert!(error.to_string().contains("sakura"));
    }

    #[test]
    fn test_button_namespace_reaches_route() {
        let mut server = server();
        let show = |State(counter): State<Counter>| {
            Page::new(counter, vec![Button::new("Go", "index")])
        };
        server.add_route("show", &[], show).unwrap();
        assert_eq!(server.visit(get("/show")).status_code, 200);
    }
}
