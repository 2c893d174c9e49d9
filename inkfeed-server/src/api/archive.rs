//! GET /archive?student=&class= : one student's record history for parents

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use super::html::{escape, page};
use crate::reports::archive::{entry_label, student_archive};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ArchiveQuery {
    pub student: String,
    pub class: String,
}

const ARCHIVE_STYLE: &str = r#"        body { background:#f8f9fa; padding:15px; }
        .header { text-align:center; padding:20px 0; background:white; border-radius:16px; margin-bottom:20px; box-shadow:0 2px 10px rgba(0,0,0,0.05); }
        h1 { color:#e74c3c; font-size:24px; }
        .record { background:white; border-radius:16px; padding:20px; margin-bottom:15px; box-shadow:0 2px 8px rgba(0,0,0,0.08); }
        .record-date { color:#7f8c8d; font-size:14px; margin-bottom:10px; }
        .record-img { width:100%; border-radius:12px; margin:10px 0; }
        .record-comment { color:#27ae60; font-size:16px; padding:8px 0; }
        .tips { background:#e8f4fd; padding:15px; border-radius:12px; margin-top:20px; font-size:14px; }"#;

pub async fn archive_page(
    State(state): State<AppState>,
    Query(query): Query<ArchiveQuery>,
) -> Html<String> {
    let records = student_archive(state.store.load().await, &query.student, &query.class);
    tracing::debug!(student = %query.student, class_name = %query.class, count = records.len(), "Archive requested");

    let student = escape(&query.student);
    let class_name = escape(&query.class);

    let mut body = format!(
        r#"    <div class="header">
        <h1>🎨 {student}的墨香成长</h1>
        <p>{class_name} · 共 {count} 次课堂记录</p>
    </div>
"#,
        count = records.len(),
    );

    for record in &records {
        body.push_str(&format!(
            r#"    <div class="record">
        <div class="record-date">{date}</div>
        <img class="record-img" src="{src}" alt="课堂记录">
        <div class="record-comment">📝 {comment}</div>
    </div>
"#,
            date = escape(&entry_label(record)),
            src = escape(&record.collage_url),
            comment = escape(&record.comment),
        ));
    }

    body.push_str(
        r#"    <div class="tips">
        <strong>💡 小提示</strong><br>
        • 长按图片可保存到手机<br>
        • 点右上角「···」可分享给家人
    </div>"#,
    );

    let title = format!("{}的成长档案 - {}", query.student, state.config.school_name);
    Html(page(&title, ARCHIVE_STYLE, &body))
}

pub fn archive_routes() -> Router<AppState> {
    Router::new().route("/archive", get(archive_page))
}
