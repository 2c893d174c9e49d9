//! Teacher-facing upload page

use axum::{
    response::{Html, Redirect},
    routing::get,
    Router,
};

use crate::AppState;

const UPLOAD_HTML: &str = include_str!("../../static/upload.html");

async fn root_redirect() -> Redirect {
    Redirect::to("/upload")
}

async fn upload_page() -> Html<&'static str> {
    Html(UPLOAD_HTML)
}

pub fn ui_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root_redirect))
        .route("/upload", get(upload_page))
}
