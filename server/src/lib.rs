//! Local development shim: serves a [`ClientServer`] over HTTP and a
//! websocket.

use anyhow::Context;
use axum::{
    Router,
    http::{Method, header},
    routing::{get, post},
};
use drafter_engine::ClientServer;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

mod handlers;
mod state;
mod websocket;

pub mod args;

pub use crate::args::{Args, BindAddress};
use crate::state::AppState;

const ASSETS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets");

fn app(server: ClientServer, origin: &str) -> anyhow::Result<Router> {
    let assets_url = server.config().assets_url.clone();
    let state = AppState::new(server);

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(
            origin.parse().context("invalid origin")?,
        ))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Ok(Router::new()
        .route("/", get(handlers::get_index))
        .route("/--reset", get(handlers::reset))
        .route("/api/visit", post(handlers::post_visit))
        .route("/api/ws", get(websocket::websocket_handler))
        .route("/{route}", get(handlers::get_route))
        .nest_service(&assets_url, ServeDir::new(ASSETS_DIR))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}

/// Serve `server`, which must already be started, until the process ends.
pub async fn run(mut server: ClientServer, bind_addr: BindAddress) -> anyhow::Result<()> {
    let listener = bind_addr
        .bind()
        .await
        .with_context(|| format!("failed to bind to {bind_addr}"))?;

    let local_addr = listener.local_addr()?;
    let origin = format!("http://{local_addr}");
    let config = server.config_mut();
    config.host = local_addr.ip().to_string();
    config.port = local_addr.port();

    let app = app(server, &origin)?;

    tracing::info!("server listening on {origin}");
    axum::serve(listener, app).await?;

    Ok(())
}
