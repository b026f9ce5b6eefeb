use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use drafter_core::Request;

use crate::state::AppState;

pub(crate) async fn get_index(State(state): State<AppState>) -> Response {
    render_page(state, "/".to_string()).await
}

pub(crate) async fn get_route(
    Path(route): Path<String>,
    State(state): State<AppState>,
) -> Response {
    render_page(state, route).await
}

/// Route functions are blocking user code, so they run off the async workers.
async fn render_page(state: AppState, url: String) -> Response {
    let rendered = tokio::task::spawn_blocking({
        let url = url.clone();
        move || state.render_page(&url)
    })
    .await;

    match rendered {
        Ok(Ok((status_code, page))) => {
            let status = StatusCode::from_u16(status_code).unwrap_or(StatusCode::OK);
            (status, page).into_response()
        }
        Ok(Err(error)) => {
            tracing::error!("failed to render {url}: {error}");
            internal_error(error.to_string())
        }
        Err(error) => {
            tracing::error!("render task for {url} failed: {error}");
            internal_error(error.to_string())
        }
    }
}

fn internal_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(format!("<pre>{}</pre>", html_escape::encode_text(&message))),
    )
        .into_response()
}

pub(crate) async fn post_visit(
    State(state): State<AppState>,
    Json(request): Json<Request>,
) -> Response {
    tracing::info!("visit {} via http", request.url);
    match tokio::task::spawn_blocking(move || state.visit(request)).await {
        Ok(response) => Json(response).into_response(),
        Err(error) => {
            tracing::error!("visit task failed: {error}");
            (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
        }
    }
}

pub(crate) async fn reset(State(state): State<AppState>) -> Redirect {
    tracing::info!("resetting state");
    state.reset();
    Redirect::to("/")
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use drafter_core::{Action, ServerConfig};
    use drafter_engine::{ClientServer, Page, State as Site};

    use super::*;

    fn app() -> AppState {
        let mut server = ClientServer::new(ServerConfig::default());
        let index = |Site(count): Site<i64>| Page::new(count, [format!("count {count}")]);
        server.add_route("index", &[], index).unwrap();
        server.start(&3_i64).unwrap();
        AppState::new(server)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_post_visit_runs_route() {
        let request = Request::new(0, Action::Load, "/");
        let response = post_visit(State(app()), Json(request)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let visit: drafter_core::Response = serde_json::from_slice(&body).unwrap();
        assert_eq!(visit.status_code, 200);
        assert!(visit.body.unwrap_or_default().contains("count 3"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_missing_route_page_keeps_status() {
        let response = get_route(Path("nowhere".to_string()), State(app())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
