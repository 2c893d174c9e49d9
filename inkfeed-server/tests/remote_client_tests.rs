//! Inference and webhook clients against local stand-in servers

mod helpers;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use helpers::{FakeNotifier, TestEnv};
use inkfeed_server::config::{AiSettings, WebhookSettings};
use inkfeed_server::services::{
    ClassroomPost, CommentError, CommentGenerator, CommentStyle, Notifier, NotifyError,
    QwenVlClient, SubmissionForm, WebhookNotifier, FALLBACK_COMMENT,
};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Serve `router` on an ephemeral port; returns the base URL
async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[derive(Clone, Default)]
struct Recorder {
    calls: Arc<AtomicUsize>,
    last_auth: Arc<Mutex<Option<String>>>,
    last_body: Arc<Mutex<Option<Value>>>,
}

impl Recorder {
    fn record(&self, headers: &HeaderMap, body: Value) -> usize {
        *self.last_auth.lock().unwrap() = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        *self.last_body.lock().unwrap() = Some(body);
        self.calls.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn work_photo(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("w_test.jpg");
    std::fs::write(&path, helpers::png_bytes(8, 8, [0, 0, 0])).unwrap();
    path
}

fn ai_settings(base_url: &str) -> AiSettings {
    AiSettings {
        api_key: Some("sk-test".to_string()),
        endpoint: format!("{base_url}/generation"),
        retry_delay: Duration::ZERO,
        timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn text_reply(text: &str) -> Value {
    json!({
        "output": {"choices": [{"message": {"role": "assistant", "content": text}}]},
        "request_id": "req-1"
    })
}

#[tokio::test]
async fn test_generation_retries_then_succeeds() {
    async fn handler(
        State(rec): State<Recorder>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        match rec.record(&headers, body) {
            1 => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"code": "InternalError", "message": "busy"})),
            ),
            _ => (StatusCode::OK, Json(text_reply("字迹工整，结构匀称。"))),
        }
    }

    let rec = Recorder::default();
    let base = spawn(
        Router::new()
            .route("/generation", post(handler))
            .with_state(rec.clone()),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let client = QwenVlClient::new(ai_settings(&base)).unwrap();
    let comment = client
        .generate(&work_photo(&dir), "张三", CommentStyle::Warm)
        .await
        .unwrap();

    assert_eq!(comment.text, "字迹工整，结构匀称。");
    assert_eq!(comment.model, "qwen-vl-max");
    assert_eq!(rec.calls(), 2);

    assert_eq!(rec.last_auth.lock().unwrap().as_deref(), Some("Bearer sk-test"));
    let body = rec.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "qwen-vl-max");
    let content = &body["input"]["messages"][0]["content"];
    assert!(content[0]["image"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
    assert_eq!(content[1]["text"], CommentStyle::Warm.prompt());
}

#[tokio::test]
async fn test_generation_gives_up_after_max_attempts() {
    async fn handler(
        State(rec): State<Recorder>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> StatusCode {
        rec.record(&headers, body);
        StatusCode::SERVICE_UNAVAILABLE
    }

    let rec = Recorder::default();
    let base = spawn(
        Router::new()
            .route("/generation", post(handler))
            .with_state(rec.clone()),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let client = QwenVlClient::new(ai_settings(&base)).unwrap();
    let result = client
        .generate(&work_photo(&dir), "张三", CommentStyle::Strict)
        .await;

    assert_eq!(result, Err(CommentError::Unavailable));
    assert_eq!(rec.calls(), 2);
}

#[tokio::test]
async fn test_generation_reads_content_blocks() {
    async fn handler() -> Json<Value> {
        Json(json!({
            "output": {"choices": [{"message": {"role": "assistant", "content": [
                {"image": "https://example.invalid/x.jpg"},
                {"text": "笔力遒劲。"}
            ]}}]}
        }))
    }

    let base = spawn(Router::new().route("/generation", post(handler))).await;
    let dir = TempDir::new().unwrap();
    let client = QwenVlClient::new(ai_settings(&base)).unwrap();

    let comment = client
        .generate(&work_photo(&dir), "李四", CommentStyle::Encouraging)
        .await
        .unwrap();
    assert_eq!(comment.text, "笔力遒劲。");
}

#[tokio::test]
async fn test_generation_without_text_is_unavailable() {
    async fn handler() -> Json<Value> {
        Json(json!({"output": {"choices": []}}))
    }

    let base = spawn(Router::new().route("/generation", post(handler))).await;
    let dir = TempDir::new().unwrap();
    let client = QwenVlClient::new(AiSettings {
        max_attempts: 1,
        ..ai_settings(&base)
    })
    .unwrap();

    let result = client
        .generate(&work_photo(&dir), "李四", CommentStyle::Warm)
        .await;
    assert_eq!(result, Err(CommentError::Unavailable));
}

#[tokio::test]
async fn test_generation_with_empty_text_is_unavailable() {
    async fn handler(
        State(rec): State<Recorder>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        match rec.record(&headers, body) % 2 {
            1 => Json(text_reply("")),
            _ => Json(json!({
                "output": {"choices": [{"message": {"role": "assistant", "content": [{"type": "text"}]}}]}
            })),
        }
    }

    let rec = Recorder::default();
    let base = spawn(
        Router::new()
            .route("/generation", post(handler))
            .with_state(rec.clone()),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let client = QwenVlClient::new(ai_settings(&base)).unwrap();
    let result = client
        .generate(&work_photo(&dir), "张三", CommentStyle::Warm)
        .await;

    assert_eq!(result, Err(CommentError::Unavailable));
    // Both replies were treated as failed attempts
    assert_eq!(rec.calls(), 2);
}

#[tokio::test]
async fn test_empty_generated_text_leads_to_fallback_comment() {
    async fn handler() -> Json<Value> {
        Json(text_reply("   "))
    }

    let base = spawn(Router::new().route("/generation", post(handler))).await;
    let client = Arc::new(QwenVlClient::new(ai_settings(&base)).unwrap());
    let notifier = FakeNotifier::accepting();
    let env = TestEnv::with_generator(client, notifier.clone());

    let form = SubmissionForm {
        class_name: Some("一年级楷书基础班".to_string()),
        student_name: Some("张三".to_string()),
        comment: None,
        style: None,
        posture: Some(helpers::png_bytes(60, 80, [200, 40, 40])),
        work: Some(helpers::jpeg_bytes(120, 90, [40, 40, 200])),
    };
    let receipt = env.state.pipeline.run(form.validate().unwrap()).await.unwrap();

    assert_eq!(receipt.record.comment, FALLBACK_COMMENT);
    assert!(!receipt.record.ai_generated);
    assert_eq!(receipt.record.comment_length, FALLBACK_COMMENT.chars().count());
    assert_eq!(notifier.posts()[0].comment, FALLBACK_COMMENT);
}

fn post_fixture() -> ClassroomPost {
    ClassroomPost {
        image_url: "http://class.test/c_ab12cd34.jpg".to_string(),
        class_name: "一年级楷书基础班".to_string(),
        student_name: "张三".to_string(),
        comment: "横平竖直".to_string(),
    }
}

fn webhook_settings(base_url: &str) -> WebhookSettings {
    WebhookSettings {
        url: format!("{base_url}/send?key=test"),
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_webhook_accepts_errcode_zero() {
    async fn handler(
        State(rec): State<Recorder>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        rec.record(&headers, body);
        Json(json!({"errcode": 0, "errmsg": "ok"}))
    }

    let rec = Recorder::default();
    let base = spawn(Router::new().route("/send", post(handler)).with_state(rec.clone())).await;

    let notifier = WebhookNotifier::new(webhook_settings(&base)).unwrap();
    notifier.notify(&post_fixture()).await.unwrap();

    let body = rec.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["msgtype"], "news");
    assert_eq!(body["news"]["articles"][0]["title"], "【课堂记录】张三 (一年级楷书基础班)");
    assert_eq!(body["news"]["articles"][0]["picurl"], "http://class.test/c_ab12cd34.jpg");
}

#[tokio::test]
async fn test_webhook_rejection_carries_errmsg() {
    async fn handler() -> Json<Value> {
        Json(json!({"errcode": 93000, "errmsg": "invalid webhook url"}))
    }

    let base = spawn(Router::new().route("/send", post(handler))).await;
    let notifier = WebhookNotifier::new(webhook_settings(&base)).unwrap();

    assert_eq!(
        notifier.notify(&post_fixture()).await,
        Err(NotifyError::Rejected("invalid webhook url".to_string()))
    );
}

#[tokio::test]
async fn test_webhook_rejection_without_errmsg() {
    async fn handler() -> Json<Value> {
        Json(json!({"errcode": 40001}))
    }

    let base = spawn(Router::new().route("/send", post(handler))).await;
    let notifier = WebhookNotifier::new(webhook_settings(&base)).unwrap();

    assert_eq!(
        notifier.notify(&post_fixture()).await,
        Err(NotifyError::Rejected("未知错误".to_string()))
    );
}

#[tokio::test]
async fn test_webhook_non_json_reply() {
    async fn handler() -> &'static str {
        "gateway error"
    }

    let base = spawn(Router::new().route("/send", post(handler))).await;
    let notifier = WebhookNotifier::new(webhook_settings(&base)).unwrap();

    assert!(matches!(
        notifier.notify(&post_fixture()).await,
        Err(NotifyError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_webhook_timeout() {
    async fn handler() -> Json<Value> {
        tokio::time::sleep(Duration::from_secs(3)).await;
        Json(json!({"errcode": 0}))
    }

    let base = spawn(Router::new().route("/send", post(handler))).await;
    let notifier = WebhookNotifier::new(WebhookSettings {
        timeout: Duration::from_millis(200),
        ..webhook_settings(&base)
    })
    .unwrap();

    assert_eq!(notifier.notify(&post_fixture()).await, Err(NotifyError::Timeout));
}
