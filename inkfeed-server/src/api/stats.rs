//! GET /stats : dashboard with export links

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::Router;

use super::html::{escape, page};
use crate::reports::{compute_stats, StatsSummary};
use crate::AppState;

const EMPTY_STYLE: &str = r#"        body { padding:20px; background:#f8f9fa; }
        .container { max-width:600px; margin:0 auto; background:white; border-radius:16px; padding:25px; box-shadow:0 4px 12px rgba(0,0,0,0.05); }
        h1 { color:#e74c3c; text-align:center; margin-bottom:20px; }
        .empty { text-align:center; color:#999; padding:20px; }"#;

const STATS_STYLE: &str = r#"        body { padding:20px; background:#f8f9fa; }
        .container { max-width:700px; margin:0 auto; }
        h1 { color:#e74c3c; text-align:center; margin-bottom:30px; font-size:28px; }
        h3 { color:#2c3e50; margin-top:25px; margin-bottom:12px; font-size:16px; }
        .stat-box { background:white; border-radius:12px; padding:20px; margin-bottom:15px; box-shadow:0 2px 8px rgba(0,0,0,0.05); }
        .stat-label { color:#666; font-size:14px; margin-bottom:8px; }
        .stat-value { color:#2c3e50; font-size:32px; font-weight:600; }
        .stat-unit { color:#999; font-size:14px; margin-left:8px; }
        .buttons { display:flex; flex-wrap:wrap; gap:10px; margin-top:20px; }
        .btn { flex:1; min-width:150px; background:#e74c3c; color:white; border:none; border-radius:8px; padding:12px; font-size:14px; text-decoration:none; text-align:center; }
        .btn-secondary { background:#3498db; min-width:auto; flex:0 1 auto; }"#;

pub async fn stats_page(State(state): State<AppState>) -> Html<String> {
    let records = state.store.load().await;
    let stats = compute_stats(&records, &inkfeed_common::time::today());
    Html(render_stats(&stats))
}

fn render_stats(stats: &StatsSummary) -> String {
    if stats.is_empty() {
        return page(
            "统计信息",
            EMPTY_STYLE,
            r#"    <div class="container">
        <h1>📊 统计信息</h1>
        <div class="empty">暂无数据，请先在上传页提交记录。</div>
    </div>"#,
        );
    }

    let (active_class, active_count) = stats
        .most_active_class
        .as_ref()
        .map(|(name, count)| (escape(name), *count))
        .unwrap_or_default();

    let class_buttons: String = stats
        .classes
        .iter()
        .map(|class_name| {
            format!(
                r#"<a href="/export?class={encoded}" class="btn btn-secondary" title="导出 {label}">📤 {label}</a>"#,
                encoded = urlencoding::encode(class_name),
                label = escape(class_name),
            )
        })
        .collect();

    let body = format!(
        r#"    <div class="container">
        <h1>📊 统计信息</h1>
{today}{usage}{active}{length}
        <h3>按班级导出</h3>
        <div class="buttons">
            {class_buttons}
        </div>

        <h3>全量导出</h3>
        <div class="buttons">
            <a href="/export" class="btn">📋 导出所有记录</a>
            <a href="/upload" class="btn">📱 返回上传</a>
        </div>
    </div>"#,
        today = stat_box("今日提交总数", &stats.today_count.to_string(), "条"),
        usage = stat_box("AI 使用率", &format!("{:.1}", stats.ai_usage_percent), "%"),
        active = stat_box("最活跃班级", &active_class, &format!("({active_count}条)")),
        length = stat_box(
            "平均 AI 评语长度",
            &format!("{:.1}", stats.avg_ai_comment_length),
            "字"
        ),
    );

    page("统计信息", STATS_STYLE, &body)
}

/// `value` must already be escaped
fn stat_box(label: &str, value: &str, unit: &str) -> String {
    format!(
        r#"        <div class="stat-box">
            <div class="stat-label">{label}</div>
            <div class="stat-value">{value} <span class="stat-unit">{unit}</span></div>
        </div>
"#
    )
}

pub fn stats_routes() -> Router<AppState> {
    Router::new().route("/stats", get(stats_page))
}
