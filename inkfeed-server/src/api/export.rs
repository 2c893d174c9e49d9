//! GET /export?class=&date= : CSV download

use axum::extract::{Query, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use inkfeed_common::RecordFilter;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::reports::{export_file_name, records_to_csv};
use crate::AppState;

const NO_MATCH: &str = "没有找到符合条件的记录";

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub class: Option<String>,
    pub date: Option<String>,
}

pub async fn export_csv(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Response> {
    let filter = RecordFilter::new(query.class, query.date);
    let records = state.store.filter(&filter).await;

    if records.is_empty() {
        return Err(ApiError::BadRequest(NO_MATCH.to_string()));
    }

    let body = records_to_csv(&records).map_err(|e| {
        tracing::error!(error = %e, "CSV rendering failed");
        ApiError::Internal(e.to_string())
    })?;

    let today_compact = inkfeed_common::time::now().format("%Y%m%d").to_string();
    let file_name = export_file_name(&filter, &today_compact);
    tracing::info!(file_name = %file_name, rows = records.len(), "CSV export");

    let disposition = HeaderValue::from_str(&content_disposition(&file_name))
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// `attachment` with an ASCII fallback name plus the UTF-8 `filename*` form
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(file_name)
    )
}

pub fn export_routes() -> Router<AppState> {
    Router::new().route("/export", get(export_csv))
}
