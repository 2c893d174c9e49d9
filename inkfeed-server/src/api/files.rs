//! GET /:name : stored photos and composites
//!
//! Only plain `.jpg` names resolve, and only inside the uploads folder.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::AppState;

const NOT_FOUND_BODY: &str = "文件不存在";

/// A bare file name ending in `.jpg`; no separators or parent references
fn is_servable_name(name: &str) -> bool {
    name.len() > ".jpg".len()
        && name.ends_with(".jpg")
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        NOT_FOUND_BODY,
    )
        .into_response()
}

pub async fn serve_file(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    if !is_servable_name(&name) {
        tracing::debug!(name = %name, "Rejected file request");
        return not_found();
    }

    let path = state.config.uploads_path().join(&name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response(),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "File not served");
            not_found()
        }
    }
}

pub fn file_routes() -> Router<AppState> {
    Router::new().route("/:name", get(serve_file))
}
