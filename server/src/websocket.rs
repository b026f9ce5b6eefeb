use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use drafter_core::{ClientMessage, ServerMessage};
use flume::Sender;
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};

use crate::state::{AppState, Subscription};

pub(crate) async fn websocket_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

async fn handle_websocket(socket: WebSocket, state: AppState) {
    let subscription = state.subscribe();
    let replier = subscription.replier();
    let (tx, rx) = socket.split();

    let mut send_task = tokio::spawn(handle_outgoing_messages(tx, subscription));
    let mut recv_task = tokio::spawn(handle_incoming_messages(state, replier, rx));

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    tracing::info!("websocket closed");
}

async fn handle_outgoing_messages(
    mut sender: SplitSink<WebSocket, Message>,
    subscription: Subscription,
) {
    while let Ok(msg) = subscription.recv().await {
        let json = match serde_json::to_string(&msg) {
            Ok(json) => json,
            Err(error) => {
                tracing::error!("failed to serialize server message: {error}");
                continue;
            }
        };

        if sender.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }
}

async fn handle_incoming_messages(
    state: AppState,
    replier: Sender<ServerMessage>,
    mut receiver: SplitStream<WebSocket>,
) {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let reply = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Visit { request }) => {
                        let state = state.clone();
                        match tokio::task::spawn_blocking(move || state.visit(request)).await {
                            Ok(response) => ServerMessage::Response {
                                response: Box::new(response),
                            },
                            Err(error) => {
                                tracing::error!("visit task failed: {error}");
                                ServerMessage::Error {
                                    message: error.to_string(),
                                }
                            }
                        }
                    }
                    Err(error) => {
                        tracing::error!("failed to parse client message: {error}");
                        ServerMessage::Error {
                            message: error.to_string(),
                        }
                    }
                };

                if replier.send_async(reply).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(error) => {
                tracing::error!("websocket error: {error}");
                break;
            }
        }
    }
}
