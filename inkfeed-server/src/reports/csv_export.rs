//! CSV export of filtered records

use inkfeed_common::{time, Record, RecordFilter};

/// Fixed column order
pub const CSV_HEADER: [&str; 7] = [
    "时间",
    "班级",
    "学生姓名",
    "评语类型",
    "评语内容",
    "评语长度",
    "生成耗时(ms)",
];

/// Render records as CSV with a header row; rows end in CRLF
pub fn records_to_csv(records: &[Record]) -> csv::Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for record in records {
        let generation_time = match (record.ai_generated, record.generation_time_ms) {
            (true, Some(ms)) => ms.to_string(),
            _ => "-".to_string(),
        };
        writer.write_record([
            time::truncate_chars(&record.created_at, 16),
            record.class_name.as_str(),
            record.student_name.as_str(),
            if record.ai_generated { "AI" } else { "手动" },
            record.comment.as_str(),
            record.comment_length.to_string().as_str(),
            generation_time.as_str(),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    // Every field came from a `&str`
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Download file name for a filter; `today_compact` is `YYYYMMDD`
pub fn export_file_name(filter: &RecordFilter, today_compact: &str) -> String {
    if let Some(date) = &filter.date {
        format!("classroom_records_{date}.csv")
    } else if let Some(class_name) = &filter.class_name {
        let safe = class_name.replace(['/', '\\'], "_");
        format!("classroom_records_{safe}.csv")
    } else {
        format!("classroom_records_{today_compact}.csv")
    }
}
