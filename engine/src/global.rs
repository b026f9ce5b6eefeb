//! Process-wide default server, for programs that register routes from
//! anywhere and start once at the end.

use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use drafter_core::ServerConfig;
use serde::Serialize;

use crate::{
    client_server::{ClientServer, StartError},
    handler::Handler,
    router::RouteError,
};

static DEFAULT_SERVER: LazyLock<Mutex<ClientServer>> =
    LazyLock::new(|| Mutex::new(ClientServer::default()));

/// Lock the default server.
pub fn default_server() -> MutexGuard<'static, ClientServer> {
    DEFAULT_SERVER
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Register a route on the default server.
pub fn route<F, Args>(url: &str, names: &[&str], handler: F) -> Result<(), RouteError>
where
    F: Handler<Args>,
    Args: 'static,
{
    default_server().add_route(url, names, handler)
}

pub fn configure(update: impl FnOnce(&mut ServerConfig)) {
    update(default_server().config_mut());
}

/// Start the default server with `initial_state`.
pub fn start<S: Serialize + ?Sized>(initial_state: &S) -> Result<(), StartError> {
    default_server().start(initial_state)
}

/// Move the default server out, leaving a fresh one behind.
pub fn take_default_server() -> ClientServer {
    std::mem::take(&mut *default_server())
}

#[cfg(test)]
mod tests {
    use drafter_core::{Action, Request};

    use super::*;
    use crate::payload::Page;

    #[test]
    fn test_routes_land_on_default_server() {
        let hello = || Page::new(0, ["hello"]);
        route("global_hello", &[], hello).unwrap();
        assert!(matches!(
            route("global_hello", &[], hello),
            Err(RouteError::Duplicate(_))
        ));
        configure(|config| config.title = "Global".into());
        start(&0).unwrap();

        let mut server = take_default_server();
        assert_eq!(server.config().title, "Global");
        let response = server.visit(Request::new(1, Action::Load, "/global_hello"));
        assert_eq!(response.status_code, 200);
        assert!(default_server().router().is_empty());
    }
}
