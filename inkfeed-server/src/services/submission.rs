//! Submission pipeline
//!
//! Receive → store photos → resolve comment → composite → notify → persist.
//! Each step's failure ends the run; nothing written before the failure is
//! removed.

use std::path::Path;
use std::sync::Arc;

use inkfeed_common::records::{CommentOrigin, ImageSet};
use inkfeed_common::{time, uuid_utils, Record, RecordStore};
use thiserror::Error;

use crate::config::ServiceConfig;
use crate::services::comment_generator::{CommentGenerator, CommentStyle};
use crate::services::composite::{CompositeBuilder, CompositeError, CompositeRequest};
use crate::services::notifier::{ClassroomPost, Notifier, NotifyError};

/// Comment used when generation was requested but failed
pub const FALLBACK_COMMENT: &str = "今天的书法作品进步很棒！继续加油！";

const SUCCESS_MESSAGE: &str = "已发送到家长群！";
const AI_SUFFIX: &str = "（AI生成评语）";

/// Pipeline failures; the display text is returned to the teacher as `msg`
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("缺少必填字段: {0}")]
    MissingField(&'static str),

    #[error("照片保存失败: {0}")]
    PhotoStorage(#[source] std::io::Error),

    #[error("拼图生成失败")]
    Composite(#[source] CompositeError),

    #[error("群推送失败: {0}")]
    Notify(#[from] NotifyError),

    #[error("记录保存失败")]
    Persist(#[source] inkfeed_common::Error),
}

/// Raw form fields as received; any of them may be absent
#[derive(Debug, Clone, Default)]
pub struct SubmissionForm {
    pub class_name: Option<String>,
    pub student_name: Option<String>,
    pub comment: Option<String>,
    pub style: Option<String>,
    pub posture: Option<Vec<u8>>,
    pub work: Option<Vec<u8>>,
}

/// A validated submission
#[derive(Debug, Clone)]
pub struct Submission {
    pub class_name: String,
    pub student_name: String,
    /// Trimmed; empty requests a generated comment
    pub comment: String,
    pub style: CommentStyle,
    pub posture: Vec<u8>,
    pub work: Vec<u8>,
}

impl SubmissionForm {
    pub fn validate(self) -> Result<Submission, SubmissionError> {
        let class_name = required_text(self.class_name, "class_name")?;
        let student_name = required_text(self.student_name, "student_name")?;
        let posture = required_file(self.posture, "posture")?;
        let work = required_file(self.work, "work")?;

        Ok(Submission {
            class_name,
            student_name,
            comment: self.comment.unwrap_or_default().trim().to_string(),
            style: self
                .style
                .as_deref()
                .map(CommentStyle::from_key)
                .unwrap_or_default(),
            posture,
            work,
        })
    }
}

fn required_text(value: Option<String>, field: &'static str) -> Result<String, SubmissionError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(SubmissionError::MissingField(field))
}

fn required_file(value: Option<Vec<u8>>, field: &'static str) -> Result<Vec<u8>, SubmissionError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(SubmissionError::MissingField(field))
}

/// Successful run
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    pub record: Record,
    pub archive_url: String,
}

impl SubmissionReceipt {
    pub fn message(&self) -> String {
        if self.record.ai_generated {
            format!("{SUCCESS_MESSAGE}{AI_SUFFIX}")
        } else {
            SUCCESS_MESSAGE.to_string()
        }
    }
}

/// Drives one submission through every step; collaborators are injected
pub struct SubmissionPipeline {
    config: Arc<ServiceConfig>,
    store: Arc<RecordStore>,
    generator: Arc<dyn CommentGenerator>,
    notifier: Arc<dyn Notifier>,
    composer: Arc<CompositeBuilder>,
}

impl SubmissionPipeline {
    pub fn new(
        config: Arc<ServiceConfig>,
        store: Arc<RecordStore>,
        generator: Arc<dyn CommentGenerator>,
        notifier: Arc<dyn Notifier>,
        composer: Arc<CompositeBuilder>,
    ) -> Self {
        Self {
            config,
            store,
            generator,
            notifier,
            composer,
        }
    }

    pub async fn run(&self, submission: Submission) -> Result<SubmissionReceipt, SubmissionError> {
        let id = uuid_utils::short_id();
        let images = ImageSet::for_token(&id);
        let uploads = self.config.uploads_path();

        tracing::info!(
            record_id = %id,
            student = %submission.student_name,
            class_name = %submission.class_name,
            "Submission received"
        );

        // Photos are stored under a `.jpg` name whatever their actual format
        let posture_path = uploads.join(&images.posture);
        let work_path = uploads.join(&images.work);
        store_photo(&uploads, &posture_path, &submission.posture).await?;
        store_photo(&uploads, &work_path, &submission.work).await?;

        let (comment, origin) = self.resolve_comment(&submission, &work_path).await;

        let request = CompositeRequest {
            posture_path,
            work_path,
            output_path: uploads.join(&images.collage),
            class_name: submission.class_name.clone(),
            student_name: submission.student_name.clone(),
            comment: comment.clone(),
            caption_time: time::caption_time(&time::now()),
        };
        self.build_composite(request).await?;

        let post = ClassroomPost {
            image_url: self.config.public_file_url(&images.collage),
            class_name: submission.class_name.clone(),
            student_name: submission.student_name.clone(),
            comment: comment.clone(),
        };
        self.notifier.notify(&post).await.map_err(|e| {
            tracing::error!(record_id = %id, error = %e, "Notification failed, submission aborted");
            SubmissionError::from(e)
        })?;

        let record = Record::new(
            id.clone(),
            submission.class_name.clone(),
            submission.student_name.clone(),
            comment,
            origin,
            &images,
            time::now_record_timestamp(),
        );
        self.store.append(record.clone()).await.map_err(|e| {
            tracing::error!(record_id = %id, error = %e, "Record could not be saved after notification");
            SubmissionError::Persist(e)
        })?;

        let archive_url = self
            .config
            .archive_url(&submission.student_name, &submission.class_name);

        tracing::info!(record_id = %id, ai_generated = record.ai_generated, "Submission complete");
        Ok(SubmissionReceipt {
            record,
            archive_url,
        })
    }

    /// Typed comment verbatim; otherwise generate, falling back to the fixed text
    async fn resolve_comment(&self, submission: &Submission, work_path: &Path) -> (String, CommentOrigin) {
        if !submission.comment.is_empty() {
            return (submission.comment.clone(), CommentOrigin::Manual);
        }

        match self
            .generator
            .generate(work_path, &submission.student_name, submission.style)
            .await
        {
            Ok(generated) => (
                generated.text,
                CommentOrigin::Generated {
                    model: generated.model,
                    elapsed_ms: generated.elapsed_ms,
                },
            ),
            Err(e) => {
                tracing::warn!(student = %submission.student_name, error = %e, "Using fallback comment");
                (FALLBACK_COMMENT.to_string(), CommentOrigin::Manual)
            }
        }
    }

    async fn build_composite(&self, request: CompositeRequest) -> Result<(), SubmissionError> {
        let composer = Arc::clone(&self.composer);
        let outcome = tokio::task::spawn_blocking(move || composer.build(&request))
            .await
            .unwrap_or_else(|e| Err(CompositeError::Worker(e.to_string())));

        match outcome {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, "Composite failed, submission aborted");
                Err(SubmissionError::Composite(e))
            }
        }
    }
}

async fn store_photo(uploads: &Path, path: &Path, bytes: &[u8]) -> Result<(), SubmissionError> {
    tokio::fs::create_dir_all(uploads)
        .await
        .map_err(SubmissionError::PhotoStorage)?;
    tokio::fs::write(path, bytes).await.map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "Cannot store photo");
        SubmissionError::PhotoStorage(e)
    })
}
