//! Submission collaborators and the pipeline that drives them

pub mod comment_generator;
pub mod composite;
pub mod notifier;
pub mod submission;

pub use comment_generator::{
    CommentError, CommentGenerator, CommentStyle, GeneratedComment, QwenVlClient,
};
pub use composite::{CaptionFont, CompositeBuilder, CompositeError, CompositeInfo, CompositeRequest};
pub use notifier::{ClassroomPost, Notifier, NotifyError, WebhookNotifier};
pub use submission::{
    Submission, SubmissionError, SubmissionForm, SubmissionPipeline, SubmissionReceipt,
    FALLBACK_COMMENT,
};
