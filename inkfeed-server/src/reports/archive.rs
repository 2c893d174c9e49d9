//! Per-student archive listing

use inkfeed_common::Record;

/// Records of one student in one class, newest first
///
/// Both names must match exactly. Timestamps share one fixed-width format, so
/// string order is chronological order.
pub fn student_archive(records: Vec<Record>, student_name: &str, class_name: &str) -> Vec<Record> {
    let mut matching: Vec<Record> = records
        .into_iter()
        .filter(|r| r.student_name == student_name && r.class_name == class_name)
        .collect();
    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    matching
}

/// `YYYY-MM-DD HH:MM` label for an archive entry
pub fn entry_label(record: &Record) -> String {
    inkfeed_common::time::truncate_chars(&record.created_at, 16).replacen('T', " ", 1)
}
