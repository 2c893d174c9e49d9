//! POST /api/submit
//!
//! Always answers 200 with `{success, msg, ...}`; the upload page shows `msg`
//! as-is on failure.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use crate::services::{SubmissionForm, SubmissionReceipt};
use crate::AppState;

/// Submission outcome; absent keys are omitted
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_url: Option<String>,
}

impl SubmitResponse {
    fn failure(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            msg: msg.into(),
            record_id: None,
            comment: None,
            archive_url: None,
        }
    }
}

impl From<SubmissionReceipt> for SubmitResponse {
    fn from(receipt: SubmissionReceipt) -> Self {
        Self {
            success: true,
            msg: receipt.message(),
            record_id: Some(receipt.record.id),
            comment: Some(receipt.record.comment),
            archive_url: Some(receipt.archive_url),
        }
    }
}

pub async fn submit(State(state): State<AppState>, multipart: Multipart) -> Json<SubmitResponse> {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(e) => {
            tracing::warn!(error = %e, "Cannot read submission form");
            return Json(SubmitResponse::failure(format!("上传数据读取失败: {e}")));
        }
    };

    let submission = match form.validate() {
        Ok(submission) => submission,
        Err(e) => {
            tracing::warn!(error = %e, "Submission rejected");
            return Json(SubmitResponse::failure(e.to_string()));
        }
    };

    match state.pipeline.run(submission).await {
        Ok(receipt) => Json(receipt.into()),
        Err(e) => Json(SubmitResponse::failure(e.to_string())),
    }
}

/// Collect known fields; unknown fields are skipped
async fn read_form(mut multipart: Multipart) -> Result<SubmissionForm, MultipartError> {
    let mut form = SubmissionForm::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "class_name" => form.class_name = Some(field.text().await?),
            "student_name" => form.student_name = Some(field.text().await?),
            "comment" => form.comment = Some(field.text().await?),
            "style" => form.style = Some(field.text().await?),
            "posture" => form.posture = Some(field.bytes().await?.to_vec()),
            "work" => form.work = Some(field.bytes().await?.to_vec()),
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(form)
}

pub fn submit_routes() -> Router<AppState> {
    Router::new().route("/api/submit", post(submit))
}
