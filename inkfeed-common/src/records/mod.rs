//! Submission records
//!
//! One [`Record`] is written per successful submission. Records are immutable
//! once persisted; the store only ever appends.

mod store;

pub use store::RecordStore;

use serde::{Deserialize, Serialize};

/// Where the final comment text came from
#[derive(Debug, Clone, PartialEq)]
pub enum CommentOrigin {
    /// Typed by the teacher, or the fixed fallback after a failed generation
    Manual,
    /// Produced by the inference endpoint
    Generated { model: String, elapsed_ms: u64 },
}

/// File names of the three images stored for one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSet {
    pub posture: String,
    pub work: String,
    pub collage: String,
}

impl ImageSet {
    pub fn for_token(token: &str) -> Self {
        Self {
            posture: format!("p_{token}.jpg"),
            work: format!("w_{token}.jpg"),
            collage: format!("c_{token}.jpg"),
        }
    }
}

/// One persisted submission
///
/// Missing fields in a hand-edited store file fall back to defaults instead of
/// invalidating the whole file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    pub id: String,
    #[serde(rename = "class")]
    pub class_name: String,
    #[serde(rename = "student")]
    pub student_name: String,
    pub comment: String,
    pub ai_generated: bool,
    /// Comment length in characters
    pub comment_length: usize,
    pub posture_url: String,
    pub work_url: String,
    pub collage_url: String,
    /// Local ISO-8601 timestamp
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_time_ms: Option<u64>,
}

impl Record {
    /// Build a record, deriving the length and AI fields from `origin`
    pub fn new(
        id: impl Into<String>,
        class_name: impl Into<String>,
        student_name: impl Into<String>,
        comment: impl Into<String>,
        origin: CommentOrigin,
        images: &ImageSet,
        created_at: impl Into<String>,
    ) -> Self {
        let comment = comment.into();
        let comment_length = comment.chars().count();
        let (ai_generated, ai_model, generation_time_ms) = match origin {
            CommentOrigin::Manual => (false, None, None),
            CommentOrigin::Generated { model, elapsed_ms } => (true, Some(model), Some(elapsed_ms)),
        };

        Self {
            id: id.into(),
            class_name: class_name.into(),
            student_name: student_name.into(),
            comment,
            ai_generated,
            comment_length,
            posture_url: format!("/{}", images.posture),
            work_url: format!("/{}", images.work),
            collage_url: format!("/{}", images.collage),
            created_at: created_at.into(),
            ai_model,
            generation_time_ms,
        }
    }

    /// `YYYY-MM-DD` prefix of the timestamp
    pub fn date(&self) -> &str {
        crate::time::truncate_chars(&self.created_at, 10)
    }
}

/// Sorted distinct non-empty class names
pub fn distinct_classes(records: &[Record]) -> Vec<String> {
    let mut classes: Vec<String> = records
        .iter()
        .filter(|r| !r.class_name.is_empty())
        .map(|r| r.class_name.clone())
        .collect();
    classes.sort();
    classes.dedup();
    classes
}

/// Optional class/date filter; both conditions must hold
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub class_name: Option<String>,
    /// `YYYY-MM-DD`, matched as a prefix of `created_at`
    pub date: Option<String>,
}

impl RecordFilter {
    /// Build a filter, treating empty strings as "no filter"
    pub fn new(class_name: Option<String>, date: Option<String>) -> Self {
        Self {
            class_name: class_name.filter(|c| !c.is_empty()),
            date: date.filter(|d| !d.is_empty()),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        if let Some(class_name) = &self.class_name {
            if &record.class_name != class_name {
                return false;
            }
        }
        if let Some(date) = &self.date {
            if !record.created_at.starts_with(date.as_str()) {
                return false;
            }
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        self.class_name.is_none() && self.date.is_none()
    }
}
