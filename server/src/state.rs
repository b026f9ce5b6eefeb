use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use drafter_core::{Action, Request, RequestId, Response, ServerMessage};
use drafter_engine::ClientServer;
use drafter_render::{Buffer, UnknownTheme};
use flume::{Receiver, Sender};

const CHANNEL_BUFFER_SIZE: usize = 100;

/// Script tag the client reads on page load to apply the initial response.
const INITIAL_RESPONSE_ID: &str = "drafter-initial";

#[derive(Clone)]
pub(crate) struct AppState(Arc<AppStateInner>);

struct AppStateInner {
    server: Mutex<ClientServer>,
    hub: Arc<Hub>,
    next_request_id: AtomicU64,
}

impl AppState {
    pub fn new(server: ClientServer) -> Self {
        let hub = Arc::new(Hub::default());

        let telemetry = hub.clone();
        server.monitor().add_listener(move |event| {
            telemetry.broadcast(&ServerMessage::Event {
                event: Box::new(event.clone()),
            });
        });

        Self(Arc::new(AppStateInner {
            server: Mutex::new(server),
            hub,
            next_request_id: AtomicU64::new(0),
        }))
    }

    fn server(&self) -> MutexGuard<'_, ClientServer> {
        self.0.server.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a visit. Ids are assigned while the server lock is held, so id
    /// order is also execution order, whichever transport the visit came
    /// through.
    pub fn visit(&self, mut request: Request) -> Response {
        let mut server = self.server();
        request.id = RequestId(self.0.next_request_id.fetch_add(1, Ordering::SeqCst) + 1);
        server.visit(request)
    }

    /// Full document for `url`, rendered server-side.
    pub fn render_page(&self, url: &str) -> Result<(u16, Buffer), UnknownTheme> {
        let response = self.visit(Request::new(0, Action::Load, url));

        let mut body = response.body.clone().unwrap_or_default();
        body.push_str(&initial_response_script(&response));
        let page = self.server().render_site(&body)?;
        Ok((response.status_code, page))
    }

    pub fn reset(&self) {
        self.server().reset();
        self.0.hub.broadcast(&ServerMessage::Reload);
    }

    pub fn subscribe(&self) -> Subscription {
        self.0.hub.subscribe()
    }
}

/// `<script type="application/json">` carrying the response, with `</` escaped
/// so page content cannot close the tag.
fn initial_response_script(response: &Response) -> String {
    match serde_json::to_string(response) {
        Ok(json) => format!(
            "<script type=\"application/json\" id=\"{INITIAL_RESPONSE_ID}\">{}</script>",
            json.replace("</", "<\\/")
        ),
        Err(error) => {
            tracing::error!("failed to serialize the initial response: {error}");
            String::new()
        }
    }
}

/// Fan-out of server messages to every open websocket.
#[derive(Default)]
pub(crate) struct Hub {
    subscribers: Mutex<Vec<Sender<ServerMessage>>>,
}

impl Hub {
    fn subscribers(&self) -> MutexGuard<'_, Vec<Sender<ServerMessage>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = flume::bounded(CHANNEL_BUFFER_SIZE);
        let mut subscribers = self.subscribers();
        subscribers.push(sender.clone());
        tracing::info!("new subscription, {} open", subscribers.len());

        Subscription { sender, receiver }
    }

    /// Deliver to every subscriber; full or closed ones are skipped or dropped.
    pub fn broadcast(&self, message: &ServerMessage) {
        self.subscribers().retain(|sender| match sender.try_send(message.clone()) {
            Ok(()) => true,
            Err(flume::TrySendError::Full(_)) => {
                tracing::warn!("subscriber is lagging, dropping a message");
                true
            }
            Err(flume::TrySendError::Disconnected(_)) => false,
        });
    }
}

/// One websocket's view of the hub, plus a direct line for its own replies.
pub(crate) struct Subscription {
    sender: Sender<ServerMessage>,
    receiver: Receiver<ServerMessage>,
}

impl Subscription {
    pub async fn recv(&self) -> Result<ServerMessage, flume::RecvError> {
        self.receiver.recv_async().await
    }

    pub fn replier(&self) -> Sender<ServerMessage> {
        self.sender.clone()
    }
}

#[cfg(test)]
mod tests {
    use drafter_core::ServerConfig;
    use drafter_engine::{Page, State};

    use super::*;

    fn app() -> AppState {
        let mut server = ClientServer::new(ServerConfig::default());
        let index = |State(count): State<i64>| Page::new(count, ["</script><b>hi</b>"]);
        server.add_route("index", &[], index).unwrap();
        server.start(&1_i64).unwrap();
        AppState::new(server)
    }

    #[test]
    fn test_request_ids_are_assigned_in_order() {
        let app = app();
        let first = app.visit(Request::new(40, Action::Load, "/"));
        let second = app.visit(Request::new(7, Action::Load, "/"));
        assert_eq!(first.request_id, RequestId(1));
        assert_eq!(second.request_id, RequestId(2));
    }

    #[test]
    fn test_concurrent_visits_run_in_id_order() {
        let app = app();
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let app = app.clone();
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        app.visit(Request::new(0, Action::Load, "/"));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let ids: Vec<_> = app
            .server()
            .monitor()
            .visits()
            .iter()
            .map(|visit| visit.request_id)
            .collect();
        assert_eq!(ids.len(), 160);
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_rendered_page_embeds_initial_response() {
        let app = app();
        let (status, page) = app.render_page("/").unwrap();
        let html = page.into_string();

        assert_eq!(status, 200);
        assert!(html.contains("id=\"drafter-initial\""));
        assert_eq!(html.matches("</script>").count(), html.matches("<script").count());
    }

    #[test]
    fn test_reset_broadcasts_reload() {
        let app = app();
        let subscription = app.subscribe();
        app.reset();

        let mut reloaded = false;
        while let Ok(message) = subscription.receiver.try_recv() {
            reloaded |= matches!(message, ServerMessage::Reload);
        }
        assert!(reloaded);
    }

    #[test]
    fn test_closed_subscribers_are_dropped() {
        let hub = Hub::default();
        let subscription = hub.subscribe();
        drop(subscription);
        hub.broadcast(&ServerMessage::Reload);
        assert!(hub.subscribers().is_empty());
    }
}
